//! Lazy collection loaders.
//!
//! Loaders materialize the [`Collection`] of a namespace the first time the
//! store is asked for it. They are consulted in registration order; the
//! first one returning `Ok(Some(_))` wins. `Ok(None)` means the loader does
//! not know the namespace. Errors are logged by the store and the next
//! loader is tried.

use std::collections::HashMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};

use parking_lot::RwLock;

use crate::collection::Collection;
use crate::directory::DirectoryProvider;
use crate::env::EnvProvider;
use crate::ConfigError;

/// Produces the collection of a namespace on demand.
pub trait CollectionLoader: Send + Sync + 'static {
    /// Loader name used in logs.
    fn name(&self) -> &str {
        "loader"
    }

    /// Builds the collection for `namespace`, if this loader knows it.
    fn load(&self, namespace: &str) -> Result<Option<Collection>, ConfigError>;
}

/// Loader backed by a closure. See [`loader_fn`].
pub struct LoaderFn<F> {
    f: F,
}

/// Wraps a closure as a [`CollectionLoader`].
pub fn loader_fn<F>(f: F) -> LoaderFn<F>
where
    F: Fn(&str) -> Result<Option<Collection>, ConfigError> + Send + Sync + 'static,
{
    LoaderFn { f }
}

impl<F> CollectionLoader for LoaderFn<F>
where
    F: Fn(&str) -> Result<Option<Collection>, ConfigError> + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        "fn"
    }

    fn load(&self, namespace: &str) -> Result<Option<Collection>, ConfigError> {
        (self.f)(namespace)
    }
}

/// Loads namespaces from sub-directories of a base directory.
///
/// Namespace `example.com` maps to `<base>/example.com` unless an alias
/// redirects it. The resulting collection is temporary and holds two
/// providers in this order:
///
/// 1. environment variables prefixed with `SITE_<NAME>`
/// 2. the files of the directory (JSON, YAML, TOML)
pub struct DirectoryCollectionLoader {
    base: PathBuf,
    aliases: RwLock<HashMap<String, String>>,
    read_only: bool,
}

impl DirectoryCollectionLoader {
    /// Creates a loader rooted at `base`.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            aliases: RwLock::new(HashMap::new()),
            read_only: false,
        }
    }

    /// Makes the loaded directory providers read-only.
    #[must_use]
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Maps `namespace` onto the directory `target`.
    #[must_use]
    pub fn with_alias(self, namespace: impl Into<String>, target: impl Into<String>) -> Self {
        self.add_alias(namespace, target);
        self
    }

    /// Maps `namespace` onto the directory `target`.
    pub fn add_alias(&self, namespace: impl Into<String>, target: impl Into<String>) {
        self.aliases.write().insert(namespace.into(), target.into());
    }

    /// Removes the alias of `namespace`.
    pub fn remove_alias(&self, namespace: &str) -> Option<String> {
        self.aliases.write().remove(namespace)
    }

    /// Base directory.
    pub fn base(&self) -> &Path {
        &self.base
    }

    fn resolve(&self, namespace: &str) -> String {
        self.aliases
            .read()
            .get(namespace)
            .cloned()
            .unwrap_or_else(|| namespace.to_string())
    }
}

/// Returns true if `name` is a single plain path component.
fn is_plain_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

impl CollectionLoader for DirectoryCollectionLoader {
    fn name(&self) -> &str {
        "directory"
    }

    fn load(&self, namespace: &str) -> Result<Option<Collection>, ConfigError> {
        let name = self.resolve(namespace);
        if !is_plain_name(&name) {
            return Ok(None);
        }

        let dir = self.base.join(&name);
        match std::fs::metadata(&dir) {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ConfigError::read_error(dir, e)),
        }

        let env = EnvProvider::new().with_prefix(format!("SITE_{name}"));
        let files = DirectoryProvider::with_default_file_types(&dir).read_only(self.read_only);

        Ok(Some(Collection::temporary().with_provider(env).with_provider(files)))
    }
}

impl fmt::Debug for DirectoryCollectionLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryCollectionLoader")
            .field("base", &self.base)
            .field("aliases", &*self.aliases.read())
            .field("read_only", &self.read_only)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_loads_directory() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("example.com")).unwrap();

        let loader = DirectoryCollectionLoader::new(dir.path());
        let collection = loader.load("example.com").unwrap().unwrap();
        assert!(collection.is_temporary());
        assert_eq!(collection.provider_count(), 2);
    }

    #[test]
    fn test_missing_directory_is_none() {
        let dir = TempDir::new().unwrap();
        let loader = DirectoryCollectionLoader::new(dir.path());
        assert!(loader.load("missing").unwrap().is_none());
    }

    #[test]
    fn test_file_is_not_a_namespace() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();
        let loader = DirectoryCollectionLoader::new(dir.path());
        assert!(loader.load("notes.txt").unwrap().is_none());
    }

    #[test]
    fn test_rejects_path_traversal() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("inner")).unwrap();
        let loader = DirectoryCollectionLoader::new(dir.path().join("inner"));
        assert!(loader.load("..").unwrap().is_none());
        assert!(loader.load("a/b").unwrap().is_none());
    }

    #[test]
    fn test_alias() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("fixtures")).unwrap();

        let loader = DirectoryCollectionLoader::new(dir.path()).with_alias("localhost", "fixtures");
        assert!(loader.load("localhost").unwrap().is_some());

        assert_eq!(loader.remove_alias("localhost").as_deref(), Some("fixtures"));
        assert!(loader.load("localhost").unwrap().is_none());
    }

    #[test]
    fn test_loader_fn() {
        let loader = loader_fn(|namespace: &str| Ok((namespace == "a").then(Collection::new)));
        assert_eq!(loader.name(), "fn");
        assert!(loader.load("a").unwrap().is_some());
        assert!(loader.load("b").unwrap().is_none());
    }
}
