//! Provider collections.
//!
//! A [`Collection`] is the configuration of one namespace: an ordered list of
//! providers and a cache of resolved values.
//!
//! Resolution queries every provider that has the key, in order, and merges
//! the results so that earlier providers win field by field while zero fields
//! are filled from later ones. A key no provider knows resolves to `None`,
//! which is not an error.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

use crate::merge::merge_missing;
use crate::provider::Provider;
use crate::schema::Schema;
use crate::ConfigError;

/// Ordered providers plus a resolution cache for one namespace.
#[derive(Default)]
pub struct Collection {
    providers: RwLock<Vec<Arc<dyn Provider>>>,
    cache: RwLock<HashMap<String, Value>>,
    temporary: AtomicBool,
}

impl Collection {
    /// Creates an empty, permanent collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty collection that is dropped by
    /// [`ConfigStore::remove_temporary`](crate::ConfigStore::remove_temporary).
    pub fn temporary() -> Self {
        let collection = Self::new();
        collection.set_temporary(true);
        collection
    }

    /// Appends a provider, returning the collection for chaining.
    #[must_use]
    pub fn with_provider(self, provider: impl Provider) -> Self {
        self.add_provider(Arc::new(provider));
        self
    }

    /// Appends a shared provider.
    pub fn add_provider(&self, provider: Arc<dyn Provider>) {
        self.add_providers([provider]);
    }

    /// Appends providers and clears the cache.
    pub fn add_providers(&self, providers: impl IntoIterator<Item = Arc<dyn Provider>>) {
        self.providers.write().extend(providers);
        self.clear_cache();
    }

    /// Number of providers.
    pub fn provider_count(&self) -> usize {
        self.providers.read().len()
    }

    /// Marks the collection temporary or permanent.
    pub fn set_temporary(&self, temporary: bool) {
        self.temporary.store(temporary, Ordering::Relaxed);
    }

    /// Returns true if the collection is temporary.
    pub fn is_temporary(&self) -> bool {
        self.temporary.load(Ordering::Relaxed)
    }

    /// Drops every cached value.
    pub fn clear_cache(&self) {
        self.cache.write().clear();
    }

    /// Reloads every provider, then clears the cache.
    pub fn reload(&self) {
        let providers = self.providers.read().clone();
        for provider in &providers {
            provider.reload();
        }
        self.clear_cache();
    }

    /// Resolves `key`, consulting the cache first.
    ///
    /// Non-empty results are cached.
    pub fn get(&self, key: &str, schema: &Schema) -> Result<Option<Value>, ConfigError> {
        if let Some(value) = self.cache.read().get(key) {
            return Ok(Some(value.clone()));
        }

        let found = self.find(key, schema)?;
        if let Some(value) = &found {
            self.cache.write().insert(key.to_string(), value.clone());
        }
        Ok(found)
    }

    /// Resolves `key` from the providers, bypassing the cache.
    pub fn find(&self, key: &str, schema: &Schema) -> Result<Option<Value>, ConfigError> {
        let providers = self.providers.read().clone();
        let shape = schema.shape()?;
        let mut merged: Option<Value> = None;

        // Partial values are merged before defaults are applied, so a
        // non-zero `Default` never shadows a later provider.
        for provider in providers.iter().filter(|p| p.has(key)) {
            let partial = provider.unmarshal(key, &shape)?;
            match merged.as_mut() {
                Some(acc) => merge_missing(acc, partial),
                None => merged = Some(partial),
            }
        }

        merged.map(|value| schema.normalize(value)).transpose()
    }

    /// Saves `value` with the first provider able to save `key`.
    ///
    /// The cache is updated on success.
    pub fn set(&self, key: &str, value: Value) -> Result<(), ConfigError> {
        let providers = self.providers.read().clone();
        let writer = providers
            .iter()
            .filter_map(|p| p.as_writable())
            .find(|w| w.can_save(key))
            .ok_or_else(|| ConfigError::NoWritableProvider {
                key: key.to_string(),
            })?;

        writer.save(key, &value)?;
        tracing::debug!(key, provider = writer.name(), "configuration saved");
        self.cache.write().insert(key.to_string(), value);
        Ok(())
    }
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let providers: Vec<&'static str> = self.providers.read().iter().map(|p| p.name()).collect();
        f.debug_struct("Collection")
            .field("providers", &providers)
            .field("cached", &self.cache.read().len())
            .field("temporary", &self.is_temporary())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MemoryProvider;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
    struct Sample {
        a: i64,
        b: String,
        c: bool,
    }

    #[test]
    fn test_earlier_provider_wins_per_field() {
        let collection = Collection::new()
            .with_provider(MemoryProvider::new().with_value("k", json!({"c": true})))
            .with_provider(
                MemoryProvider::new().with_value("k", json!({"a": 5, "b": "x", "c": false})),
            );

        let value = collection.get("k", &Schema::of::<Sample>()).unwrap().unwrap();
        let sample: Sample = serde_json::from_value(value).unwrap();
        assert_eq!(
            sample,
            Sample {
                a: 5,
                b: "x".to_string(),
                c: true
            }
        );
    }

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    #[serde(default)]
    struct WithDefaults {
        level: String,
        port: u16,
    }

    impl Default for WithDefaults {
        fn default() -> Self {
            Self {
                level: "info".to_string(),
                port: 8080,
            }
        }
    }

    #[test]
    fn test_defaults_do_not_shadow_later_providers() {
        let collection = Collection::new()
            .with_provider(MemoryProvider::new().with_value("k", json!({"port": 9000})))
            .with_provider(MemoryProvider::new().with_value("k", json!({"level": "debug"})));

        let value = collection.get("k", &Schema::of::<WithDefaults>()).unwrap().unwrap();
        assert_eq!(value, json!({"level": "debug", "port": 9000}));

        let collection = Collection::new()
            .with_provider(MemoryProvider::new().with_value("k", json!({})));
        let value = collection.get("k", &Schema::of::<WithDefaults>()).unwrap().unwrap();
        assert_eq!(value, json!({"level": "info", "port": 8080}));
    }

    #[test]
    fn test_missing_key_is_none() {
        let collection = Collection::new().with_provider(MemoryProvider::new());
        assert!(collection.get("k", &Schema::of::<Sample>()).unwrap().is_none());
    }

    #[test]
    fn test_cache_until_cleared() {
        let memory = Arc::new(MemoryProvider::new().with_value("k", json!({"a": 1})));
        let collection = Collection::new();
        collection.add_provider(memory.clone());
        let schema = Schema::of::<Sample>();

        assert_eq!(collection.get("k", &schema).unwrap().unwrap()["a"], 1);

        memory.insert("k", json!({"a": 2}));
        assert_eq!(collection.get("k", &schema).unwrap().unwrap()["a"], 1);

        collection.clear_cache();
        assert_eq!(collection.get("k", &schema).unwrap().unwrap()["a"], 2);
    }

    #[test]
    fn test_set_uses_first_writable() {
        let first = Arc::new(MemoryProvider::new());
        let second = Arc::new(MemoryProvider::new());
        let collection = Collection::new();
        collection.add_providers([first.clone() as Arc<dyn Provider>, second.clone() as Arc<dyn Provider>]);

        collection.set("k", json!({"a": 3})).unwrap();
        assert!(first.has("k"));
        assert!(!second.has("k"));
    }

    #[test]
    fn test_set_without_writable_provider() {
        let collection = Collection::new();
        let err = collection.set("k", json!({})).unwrap_err();
        assert!(matches!(err, ConfigError::NoWritableProvider { .. }));
    }

    #[test]
    fn test_unmarshal_error_aborts() {
        let collection = Collection::new()
            .with_provider(MemoryProvider::new().with_value("k", json!({"a": "nope"})));
        assert!(collection.get("k", &Schema::of::<Sample>()).is_err());
    }

    #[test]
    fn test_temporary_flag() {
        assert!(Collection::temporary().is_temporary());
        let collection = Collection::new();
        assert!(!collection.is_temporary());
        collection.set_temporary(true);
        assert!(collection.is_temporary());
    }
}
