//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while registering, resolving or saving configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No collection is registered or loadable for a namespace.
    #[error("collection not found: {name}")]
    CollectionNotFound {
        /// The namespace that was requested.
        name: String,
    },

    /// A key was resolved without a registered schema.
    #[error("schema not found: {key}")]
    SchemaNotFound {
        /// The configuration key.
        key: String,
    },

    /// A key pattern was registered twice with different types.
    #[error("schema for {key} is already registered as {registered}, cannot register {requested}")]
    SchemaConflict {
        /// The key pattern.
        key: String,
        /// Type name already registered for the pattern.
        registered: &'static str,
        /// Type name of the rejected registration.
        requested: &'static str,
    },

    /// A typed access used a type other than the registered one.
    #[error("invalid type for {key}: expected {expected}, got {found}")]
    TypeMismatch {
        /// The configuration key.
        key: String,
        /// Type name registered for the key.
        expected: &'static str,
        /// Type name used by the caller.
        found: &'static str,
    },

    /// No provider in the collection was able to save the key.
    #[error("failed to save config {key}: no writable provider")]
    NoWritableProvider {
        /// The configuration key.
        key: String,
    },

    /// A read-only accessor was used for a write.
    #[error("readonly instance cannot be used as writable")]
    ReadOnlyInstance,

    /// A directory provider has no file types registered.
    #[error("no file types registered for directory {path}")]
    NoFileTypes {
        /// Base directory of the provider.
        path: PathBuf,
    },

    /// Failed to read configuration file.
    #[error("failed to read configuration file: {path}")]
    ReadError {
        /// Path to the file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to write configuration file.
    #[error("failed to write configuration file: {path}")]
    WriteError {
        /// Path to the file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// JSON parsing or conversion error.
    #[error("failed to parse JSON configuration: {0}")]
    JsonError(#[from] serde_json::Error),

    /// YAML parsing error.
    #[error("failed to parse YAML configuration: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// TOML parsing error.
    #[error("failed to parse TOML configuration: {0}")]
    TomlError(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("failed to serialize TOML configuration: {0}")]
    TomlWriteError(#[from] toml::ser::Error),

    /// Environment variable parsing error.
    #[error("failed to parse environment variable {var}: {reason}")]
    EnvParseError {
        /// The environment variable name.
        var: String,
        /// Explanation of the parsing error.
        reason: String,
    },

    /// `.env` file could not be loaded.
    #[error("failed to load env file: {0}")]
    DotenvError(#[from] dotenvy::Error),

    /// A collection loader failed for a namespace.
    #[error("failed to load collection {namespace}: {reason}")]
    LoaderError {
        /// The namespace being loaded.
        namespace: String,
        /// Explanation of the failure.
        reason: String,
    },

    /// Invalid configuration for a component.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the configuration error.
        message: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    /// Create a new collection not found error.
    pub fn collection_not_found(name: impl Into<String>) -> Self {
        Self::CollectionNotFound { name: name.into() }
    }

    /// Create a new schema not found error.
    pub fn schema_not_found(key: impl Into<String>) -> Self {
        Self::SchemaNotFound { key: key.into() }
    }

    /// Create a new read error.
    pub fn read_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ReadError {
            path: path.into(),
            source,
        }
    }

    /// Create a new write error.
    pub fn write_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::WriteError {
            path: path.into(),
            source,
        }
    }

    /// Create a new environment variable parse error.
    pub fn env_parse_error(var: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::EnvParseError {
            var: var.into(),
            reason: reason.into(),
        }
    }

    /// Create a new loader error.
    pub fn loader_error(namespace: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::LoaderError {
            namespace: namespace.into(),
            reason: reason.into(),
        }
    }

    /// Returns true for the "collection not found" class of errors.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::CollectionNotFound { .. })
    }
}
