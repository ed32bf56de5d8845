//! The namespaced configuration store.
//!
//! A [`ConfigStore`] owns one [`Collection`] per namespace, the schema
//! registry and the lazy [`CollectionLoader`]s. It is a cheap handle: clones
//! share the same state.
//!
//! # Example
//!
//! ```
//! use serde::{Deserialize, Serialize};
//! use serde_json::json;
//! use warren_config::{Collection, ConfigStore, MemoryProvider};
//!
//! #[derive(Debug, Default, Serialize, Deserialize)]
//! struct Site {
//!     name: String,
//! }
//!
//! # fn main() -> Result<(), warren_config::ConfigError> {
//! let store = ConfigStore::new();
//! store.register_schema::<Site>("site");
//! store.add_collection(
//!     "default",
//!     Collection::new().with_provider(MemoryProvider::new().with_value("site", json!({"name": "demo"}))),
//! );
//!
//! let config = store.get("default").expect("namespace exists");
//! let site: Site = config.get("site")?.unwrap_or_default();
//! assert_eq!(site.name, "demo");
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::collection::Collection;
use crate::instance::{Config, WritableConfig};
use crate::loader::CollectionLoader;
use crate::matcher::Matcher;
use crate::schema::{ConfigValue, Schema};
use crate::ConfigError;

/// Name of the namespace that holds process-wide configuration.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Shared handle to namespaced configuration.
#[derive(Clone, Default)]
pub struct ConfigStore {
    inner: Arc<StoreInner>,
}

#[derive(Default)]
struct StoreInner {
    state: RwLock<StoreState>,
    loaders: RwLock<Vec<Arc<dyn CollectionLoader>>>,
    // One lock per namespace being loaded, so each is materialized once.
    loading: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

#[derive(Default)]
struct StoreState {
    namespaces: HashMap<String, Arc<Collection>>,
    schemas: Matcher<Schema>,
}

impl ConfigStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `T` as the type of `key`.
    ///
    /// Registering the same type again is a no-op.
    ///
    /// # Panics
    ///
    /// Panics if `key` already resolves to a different type.
    pub fn register_schema<T: ConfigValue>(&self, key: &str) {
        self.register(key, Schema::of::<T>());
    }

    /// Registers `T` as the type of `key`, returning conflicts as errors.
    pub fn try_register_schema<T: ConfigValue>(&self, key: &str) -> Result<(), ConfigError> {
        self.try_register(key, Schema::of::<T>())
    }

    /// Registers a schema for `key`.
    ///
    /// # Panics
    ///
    /// Panics if `key` already resolves to a different type.
    pub fn register(&self, key: &str, schema: Schema) {
        if let Err(e) = self.try_register(key, schema) {
            panic!("{e}");
        }
    }

    /// Registers a schema for `key`, returning conflicts as errors.
    pub fn try_register(&self, key: &str, schema: Schema) -> Result<(), ConfigError> {
        let mut state = self.inner.state.write();
        if let Some(existing) = state.schemas.get(key) {
            if *existing == schema {
                return Ok(());
            }
            return Err(ConfigError::SchemaConflict {
                key: key.to_string(),
                registered: existing.type_name(),
                requested: schema.type_name(),
            });
        }

        tracing::debug!(key, schema = schema.type_name(), "registered config schema");
        state.schemas.set(key, schema);
        Ok(())
    }

    /// Registers a batch of `(key pattern, schema)` pairs.
    ///
    /// # Panics
    ///
    /// Panics on the first conflicting registration.
    pub fn register_schemas<K: AsRef<str>>(&self, schemas: impl IntoIterator<Item = (K, Schema)>) {
        for (key, schema) in schemas {
            self.register(key.as_ref(), schema);
        }
    }

    /// Returns the schema registered for `key`, if any.
    pub fn schema(&self, key: &str) -> Option<Schema> {
        self.inner.state.read().schemas.get(key).copied()
    }

    /// Adds or replaces the collection of `namespace`.
    pub fn add_collection(&self, namespace: impl Into<String>, collection: Collection) {
        let namespace = namespace.into();
        tracing::debug!(namespace = %namespace, temporary = collection.is_temporary(), "collection added");
        self.inner
            .state
            .write()
            .namespaces
            .insert(namespace, Arc::new(collection));
    }

    /// Appends a lazy loader for unknown namespaces.
    pub fn add_collection_loader(&self, loader: impl CollectionLoader) {
        self.add_collection_loaders([Arc::new(loader) as Arc<dyn CollectionLoader>]);
    }

    /// Appends lazy loaders, consulted in order.
    pub fn add_collection_loaders(
        &self,
        loaders: impl IntoIterator<Item = Arc<dyn CollectionLoader>>,
    ) {
        self.inner.loaders.write().extend(loaders);
    }

    /// Returns the collection of `namespace`, loading it if needed.
    pub fn collection(&self, namespace: &str) -> Option<Arc<Collection>> {
        self.ensure_namespace(namespace)
    }

    /// Names of the materialized namespaces, sorted.
    pub fn namespaces(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.state.read().namespaces.keys().cloned().collect();
        names.sort();
        names
    }

    /// Read-only accessor for `namespace`, or `None` if it is unknown.
    pub fn get(&self, namespace: &str) -> Option<Config> {
        self.ensure_namespace(namespace)
            .map(|_| Config::new(self.clone(), namespace))
    }

    /// Writable accessor for `namespace`, or `None` if it is unknown.
    pub fn get_writable(&self, namespace: &str) -> Option<WritableConfig> {
        self.ensure_namespace(namespace)
            .map(|_| WritableConfig::new(self.clone(), namespace))
    }

    /// Drops every temporary collection.
    pub fn remove_temporary(&self) {
        let mut state = self.inner.state.write();
        let before = state.namespaces.len();
        state.namespaces.retain(|_, c| !c.is_temporary());
        tracing::debug!(
            removed = before - state.namespaces.len(),
            "removed temporary collections"
        );
    }

    /// Clears the cache of every collection.
    pub fn clear_all_caches(&self) {
        let collections: Vec<Arc<Collection>> =
            self.inner.state.read().namespaces.values().cloned().collect();
        for collection in &collections {
            collection.clear_cache();
        }
        tracing::debug!(collections = collections.len(), "cleared configuration caches");
    }

    /// Reloads the providers of every collection and clears their caches.
    pub fn reload(&self) {
        let collections: Vec<Arc<Collection>> =
            self.inner.state.read().namespaces.values().cloned().collect();
        for collection in &collections {
            collection.reload();
        }
        tracing::debug!(collections = collections.len(), "reloaded configuration providers");
    }

    pub(crate) fn get_value<T: ConfigValue>(
        &self,
        namespace: &str,
        key: &str,
    ) -> Result<Option<T>, ConfigError> {
        let collection = self
            .ensure_namespace(namespace)
            .ok_or_else(|| ConfigError::collection_not_found(namespace))?;
        let schema = self.checked_schema::<T>(key)?;

        match collection.get(key, &schema)? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    pub(crate) fn set_value<T: ConfigValue>(
        &self,
        namespace: &str,
        key: &str,
        value: &T,
    ) -> Result<(), ConfigError> {
        let collection = self
            .ensure_namespace(namespace)
            .ok_or_else(|| ConfigError::collection_not_found(namespace))?;
        self.checked_schema::<T>(key)?;

        collection.set(key, serde_json::to_value(value)?)
    }

    fn checked_schema<T: ConfigValue>(&self, key: &str) -> Result<Schema, ConfigError> {
        let schema = self
            .schema(key)
            .ok_or_else(|| ConfigError::schema_not_found(key))?;
        if !schema.is::<T>() {
            return Err(ConfigError::TypeMismatch {
                key: key.to_string(),
                expected: schema.type_name(),
                found: std::any::type_name::<T>(),
            });
        }
        Ok(schema)
    }

    fn cached(&self, namespace: &str) -> Option<Arc<Collection>> {
        self.inner.state.read().namespaces.get(namespace).cloned()
    }

    fn ensure_namespace(&self, namespace: &str) -> Option<Arc<Collection>> {
        if let Some(collection) = self.cached(namespace) {
            return Some(collection);
        }

        let slot = Arc::clone(
            self.inner
                .loading
                .lock()
                .entry(namespace.to_string())
                .or_default(),
        );
        let loaded = {
            let _loading = slot.lock();
            self.cached(namespace).or_else(|| self.run_loaders(namespace))
        };

        // Drop the slot once no other caller waits on it.
        let mut loading = self.inner.loading.lock();
        if Arc::strong_count(&slot) == 2 {
            loading.remove(namespace);
        }
        loaded
    }

    fn run_loaders(&self, namespace: &str) -> Option<Arc<Collection>> {
        let loaders = self.inner.loaders.read().clone();
        for loader in &loaders {
            match loader.load(namespace) {
                Ok(Some(collection)) => {
                    tracing::debug!(namespace, loader = loader.name(), "collection loaded");
                    let collection = Arc::new(collection);
                    self.inner
                        .state
                        .write()
                        .namespaces
                        .insert(namespace.to_string(), collection.clone());
                    return Some(collection);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(
                        namespace,
                        loader = loader.name(),
                        error = %e,
                        "collection loader failed"
                    );
                }
            }
        }

        None
    }
}

impl std::fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.read();
        f.debug_struct("ConfigStore")
            .field("namespaces", &state.namespaces.len())
            .field("schemas", &state.schemas.len())
            .field("loaders", &self.inner.loaders.read().len())
            .finish()
    }
}
