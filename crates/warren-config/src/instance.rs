//! Namespace-scoped configuration accessors.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::schema::ConfigValue;
use crate::store::ConfigStore;
use crate::ConfigError;

/// Read-only view of one namespace.
#[derive(Clone, Debug)]
pub struct Config {
    store: ConfigStore,
    namespace: Arc<str>,
}

impl Config {
    pub(crate) fn new(store: ConfigStore, namespace: &str) -> Self {
        Self {
            store,
            namespace: Arc::from(namespace),
        }
    }

    /// The namespace this accessor reads from.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Resolves `key` as `T`.
    ///
    /// Returns `Ok(None)` when no provider of the namespace has the key.
    pub fn get<T: ConfigValue>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        self.store.get_value(&self.namespace, key)
    }
}

/// Read-write view of one namespace.
///
/// An accessor converted from a [`Config`] stays read-only: its
/// [`get_writable`](Self::get_writable) fails with
/// [`ConfigError::ReadOnlyInstance`].
#[derive(Clone, Debug)]
pub struct WritableConfig {
    config: Config,
    read_only: bool,
}

impl WritableConfig {
    pub(crate) fn new(store: ConfigStore, namespace: &str) -> Self {
        Self {
            config: Config::new(store, namespace),
            read_only: false,
        }
    }

    /// The namespace this accessor reads from.
    pub fn namespace(&self) -> &str {
        self.config.namespace()
    }

    /// Returns true if writes are refused.
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Resolves `key` as `T`.
    pub fn get<T: ConfigValue>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        self.config.get(key)
    }

    /// Resolves `key` as `T` together with a [`Saver`] that writes it back.
    pub fn get_writable<T: ConfigValue>(
        &self,
        key: &str,
    ) -> Result<(Option<T>, Saver<T>), ConfigError> {
        if self.read_only {
            return Err(ConfigError::ReadOnlyInstance);
        }

        let value = self.config.get(key)?;
        let saver = Saver {
            store: self.config.store.clone(),
            namespace: self.config.namespace.clone(),
            key: key.to_string(),
            _marker: PhantomData,
        };
        Ok((value, saver))
    }

    /// Read-only view of the same namespace.
    pub fn as_config(&self) -> &Config {
        &self.config
    }
}

impl From<Config> for WritableConfig {
    fn from(config: Config) -> Self {
        Self {
            config,
            read_only: true,
        }
    }
}

/// Writes a configuration value back to its namespace.
pub struct Saver<T> {
    store: ConfigStore,
    namespace: Arc<str>,
    key: String,
    _marker: PhantomData<fn(&T)>,
}

impl<T: ConfigValue> Saver<T> {
    /// Saves `value` under the key this saver was created for.
    pub fn save(&self, value: &T) -> Result<(), ConfigError> {
        self.store.set_value(&self.namespace, &self.key, value)
    }

    /// The key this saver writes.
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl<T> fmt::Debug for Saver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Saver")
            .field("namespace", &self.namespace)
            .field("key", &self.key)
            .finish()
    }
}
