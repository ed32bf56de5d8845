//! Namespaced configuration for Warren.
//!
//! This crate resolves typed configuration per namespace (usually one per
//! site or host) from layered providers:
//!
//! - [`Matcher`] - segment trie with `*` wildcards, used for the schema registry
//! - [`Schema`] - the Rust type registered for a key pattern
//! - [`Provider`] / [`WritableProvider`] - backing sources: [`MemoryProvider`],
//!   [`EnvProvider`], [`DirectoryProvider`]
//! - [`Collection`] - ordered providers and a resolution cache for one namespace
//! - [`ConfigStore`] - namespaces, schemas and lazy [`CollectionLoader`]s
//! - [`Config`] / [`WritableConfig`] - namespace-scoped accessors
//! - [`ConfigWatcher`] - hot reload of file-backed collections
//!
//! # Resolution
//!
//! A key is resolved by asking every provider of the namespace that has the
//! key, in order, and merging the partial values. Earlier providers win per
//! field; zero fields are filled from later providers. A registered key that
//! no provider has resolves to `None`. An unregistered key is an error.
//!
//! # Example
//!
//! ```no_run
//! use serde::{Deserialize, Serialize};
//! use warren_config::{ConfigStore, DirectoryCollectionLoader};
//!
//! #[derive(Debug, Default, Serialize, Deserialize)]
//! struct Theme {
//!     color: String,
//! }
//!
//! # fn main() -> Result<(), warren_config::ConfigError> {
//! let store = ConfigStore::new();
//! store.register_schema::<Theme>("theme");
//! store.add_collection_loader(DirectoryCollectionLoader::new("sites").read_only(true));
//!
//! if let Some(config) = store.get("example.com") {
//!     let theme: Theme = config.get("theme")?.unwrap_or_default();
//!     println!("{}", theme.color);
//! }
//! # Ok(())
//! # }
//! ```

mod collection;
pub mod directory;
pub mod env;
mod error;
mod instance;
pub mod loader;
mod matcher;
pub mod merge;
mod provider;
mod schema;
mod store;
mod watcher;

pub use collection::Collection;
pub use directory::{DirectoryProvider, FileType, JsonFile, TomlFile, YamlFile};
pub use env::EnvProvider;
pub use error::ConfigError;
pub use instance::{Config, Saver, WritableConfig};
pub use loader::{loader_fn, CollectionLoader, DirectoryCollectionLoader, LoaderFn};
pub use matcher::{Matcher, WILDCARD};
pub use provider::{MemoryProvider, Provider, WritableProvider};
pub use schema::{ConfigValue, Schema};
pub use store::{ConfigStore, DEFAULT_NAMESPACE};
pub use watcher::{ConfigWatcher, ConfigWatcherBuilder, FileChangeEvent, FileChangeKind};
