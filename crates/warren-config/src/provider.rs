//! Configuration providers.
//!
//! A provider is one backing source of configuration values for a
//! [`Collection`](crate::Collection). Providers are queried in the order they
//! were added to the collection. Read-only providers implement [`Provider`];
//! providers that can persist values also implement [`WritableProvider`] and
//! expose it through [`Provider::as_writable`].

use std::collections::HashMap;

use parking_lot::RwLock;
use serde_json::Value;

use crate::ConfigError;

/// A read-only source of configuration values.
pub trait Provider: Send + Sync + 'static {
    /// Short provider name used in logs.
    fn name(&self) -> &'static str;

    /// Returns true if the provider holds a value for `key`.
    fn has(&self, key: &str) -> bool;

    /// Reads the value for `key`.
    ///
    /// `shape` is the zero value of the registered schema. Providers that
    /// carry untyped data (such as environment variables) use it to decide
    /// which entries to read and how to coerce them. The returned value may
    /// be partial.
    fn unmarshal(&self, key: &str, shape: &Value) -> Result<Value, ConfigError>;

    /// Returns the writable view of this provider, if it has one.
    fn as_writable(&self) -> Option<&dyn WritableProvider> {
        None
    }

    /// Drops any snapshot of the backing source so later reads see it again.
    fn reload(&self) {}
}

/// A provider that can persist values.
pub trait WritableProvider: Provider {
    /// Returns true if the provider is able to save `key` right now.
    fn can_save(&self, key: &str) -> bool;

    /// Persists `value` under `key`.
    fn save(&self, key: &str, value: &Value) -> Result<(), ConfigError>;
}

/// In-memory provider backed by a map.
///
/// Always writable. Mostly used for defaults and tests.
#[derive(Debug, Default)]
pub struct MemoryProvider {
    values: RwLock<HashMap<String, Value>>,
}

impl MemoryProvider {
    /// Creates an empty memory provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a value, returning the provider for chaining.
    #[must_use]
    pub fn with_value(self, key: impl Into<String>, value: Value) -> Self {
        self.values.write().insert(key.into(), value);
        self
    }

    /// Stores a value directly.
    pub fn insert(&self, key: impl Into<String>, value: Value) {
        self.values.write().insert(key.into(), value);
    }

    /// Removes every stored value.
    pub fn reset(&self) {
        self.values.write().clear();
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }
}

impl Provider for MemoryProvider {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn has(&self, key: &str) -> bool {
        self.values.read().contains_key(key)
    }

    fn unmarshal(&self, key: &str, _shape: &Value) -> Result<Value, ConfigError> {
        Ok(self.values.read().get(key).cloned().unwrap_or(Value::Null))
    }

    fn as_writable(&self) -> Option<&dyn WritableProvider> {
        Some(self)
    }
}

impl WritableProvider for MemoryProvider {
    fn can_save(&self, _key: &str) -> bool {
        true
    }

    fn save(&self, key: &str, value: &Value) -> Result<(), ConfigError> {
        self.values.write().insert(key.to_string(), value.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_memory_provider_roundtrip() {
        let provider = MemoryProvider::new().with_value("site", json!({"name": "x"}));
        assert!(provider.has("site"));
        assert!(!provider.has("other"));
        assert_eq!(
            provider.unmarshal("site", &Value::Null).unwrap(),
            json!({"name": "x"})
        );
    }

    #[test]
    fn test_memory_provider_is_writable() {
        let provider = MemoryProvider::new();
        let writable = provider.as_writable().expect("memory provider is writable");
        assert!(writable.can_save("anything"));
        writable.save("k", &json!(1)).unwrap();
        assert!(provider.has("k"));
    }

    #[test]
    fn test_memory_provider_reset() {
        let provider = MemoryProvider::new()
            .with_value("a", json!(1))
            .with_value("b", json!(2));
        assert_eq!(provider.len(), 2);
        provider.reset();
        assert!(provider.is_empty());
        assert!(!provider.has("a"));
    }
}
