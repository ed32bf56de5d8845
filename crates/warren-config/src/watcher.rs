//! Hot reload of file-backed configuration.
//!
//! A [`ConfigWatcher`] watches configuration directories and keeps a
//! [`ConfigStore`] in step with them. On every relevant change it:
//!
//! 1. clears the value cache of every collection
//! 2. drops temporary collections, so directory-loaded namespaces are
//!    materialized again on next access
//! 3. invokes the optional change callback
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use warren_config::{ConfigStore, ConfigWatcher};
//!
//! # async fn example() -> Result<(), warren_config::ConfigError> {
//! let store = ConfigStore::new();
//! let mut watcher = ConfigWatcher::builder(store.clone())
//!     .with_debounce(Duration::from_millis(250))
//!     .watch_path("sites/")?
//!     .build()?;
//!
//! tokio::spawn(async move {
//!     watcher.run().await.ok();
//! });
//! # Ok(())
//! # }
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::store::ConfigStore;
use crate::ConfigError;

/// Extensions that trigger a reload by default.
pub const DEFAULT_EXTENSIONS: &[&str] = &["json", "yml", "yaml", "toml", "env"];

/// A change to a watched file.
#[derive(Debug, Clone)]
pub struct FileChangeEvent {
    /// Path to the changed file.
    pub path: PathBuf,
    /// Kind of change.
    pub kind: FileChangeKind,
    /// When the change was observed.
    pub timestamp: Instant,
}

/// Kind of file change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileChangeKind {
    /// File was created.
    Created,
    /// File was modified.
    Modified,
    /// File was deleted.
    Deleted,
}

impl FileChangeKind {
    fn from_event(kind: &EventKind) -> Option<Self> {
        match kind {
            EventKind::Create(_) => Some(Self::Created),
            EventKind::Modify(_) => Some(Self::Modified),
            EventKind::Remove(_) => Some(Self::Deleted),
            _ => None,
        }
    }
}

type ChangeCallback = Arc<dyn Fn(&FileChangeEvent) + Send + Sync>;

/// Builder for [`ConfigWatcher`].
pub struct ConfigWatcherBuilder {
    store: ConfigStore,
    paths: Vec<PathBuf>,
    debounce: Duration,
    extensions: HashSet<String>,
    callback: Option<ChangeCallback>,
}

impl ConfigWatcherBuilder {
    fn new(store: ConfigStore) -> Self {
        Self {
            store,
            paths: Vec::new(),
            debounce: Duration::from_millis(500),
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| (*s).to_string()).collect(),
            callback: None,
        }
    }

    /// Coalesces repeated changes of one file within `duration`.
    #[must_use]
    pub fn with_debounce(mut self, duration: Duration) -> Self {
        self.debounce = duration;
        self
    }

    /// Watches a file or directory, recursively.
    pub fn watch_path<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("path does not exist: {}", path.display()),
            )));
        }
        self.paths.push(path.to_path_buf());
        Ok(self)
    }

    /// Replaces the set of extensions that trigger a reload.
    ///
    /// An empty slice accepts every file.
    #[must_use]
    pub fn watch_extensions(mut self, extensions: &[&str]) -> Self {
        self.extensions = extensions.iter().map(|s| (*s).to_string()).collect();
        self
    }

    /// Sets a callback invoked after the store was refreshed.
    #[must_use]
    pub fn on_change<F>(mut self, callback: F) -> Self
    where
        F: Fn(&FileChangeEvent) + Send + Sync + 'static,
    {
        self.callback = Some(Arc::new(callback));
        self
    }

    /// Starts watching.
    pub fn build(self) -> Result<ConfigWatcher, ConfigError> {
        if self.paths.is_empty() {
            return Err(ConfigError::InvalidConfig {
                message: "no paths configured for config watcher".to_string(),
            });
        }

        let (tx, rx) = mpsc::channel(100);
        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            if let Ok(event) = res {
                let _ = tx.blocking_send(event);
            }
        })
        .map_err(|e| ConfigError::InvalidConfig {
            message: format!("failed to create config watcher: {e}"),
        })?;

        for path in &self.paths {
            watcher
                .watch(path, RecursiveMode::Recursive)
                .map_err(|e| ConfigError::InvalidConfig {
                    message: format!("failed to watch {}: {e}", path.display()),
                })?;
        }

        Ok(ConfigWatcher {
            _watcher: watcher,
            rx,
            filter: EventFilter {
                debounce: self.debounce,
                extensions: self.extensions,
                last: None,
            },
            store: self.store,
            callback: self.callback,
        })
    }
}

/// Extension filter plus per-path debouncing.
#[derive(Debug)]
struct EventFilter {
    debounce: Duration,
    extensions: HashSet<String>,
    last: Option<(PathBuf, Instant)>,
}

impl EventFilter {
    fn accept(&mut self, event: &Event, now: Instant) -> Option<FileChangeEvent> {
        let kind = FileChangeKind::from_event(&event.kind)?;
        let path = event.paths.first()?.clone();

        if !self.extensions.is_empty() && !self.matches_extension(&path) {
            return None;
        }

        if let Some((last_path, last_time)) = &self.last {
            if last_path == &path && now.duration_since(*last_time) < self.debounce {
                return None;
            }
        }
        self.last = Some((path.clone(), now));

        Some(FileChangeEvent {
            path,
            kind,
            timestamp: now,
        })
    }

    fn matches_extension(&self, path: &Path) -> bool {
        // `.env` has no extension, only a file name
        let ext = path
            .extension()
            .or_else(|| path.file_name())
            .and_then(|e| e.to_str())
            .map(|e| e.trim_start_matches('.'));
        ext.map_or(false, |e| self.extensions.contains(e))
    }
}

/// Keeps a [`ConfigStore`] in sync with configuration files on disk.
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<Event>,
    filter: EventFilter,
    store: ConfigStore,
    callback: Option<ChangeCallback>,
}

impl ConfigWatcher {
    /// Creates a builder refreshing `store`.
    pub fn builder(store: ConfigStore) -> ConfigWatcherBuilder {
        ConfigWatcherBuilder::new(store)
    }

    /// Processes events until the watcher is dropped.
    pub async fn run(&mut self) -> Result<(), ConfigError> {
        while self.next().await.is_some() {}
        Ok(())
    }

    /// Waits for the next relevant change and applies it to the store.
    pub async fn next(&mut self) -> Option<FileChangeEvent> {
        loop {
            let event = self.rx.recv().await?;
            if let Some(change) = self.filter.accept(&event, Instant::now()) {
                self.apply(&change);
                return Some(change);
            }
        }
    }

    fn apply(&self, change: &FileChangeEvent) {
        tracing::info!(
            path = %change.path.display(),
            kind = ?change.kind,
            "configuration changed, refreshing store"
        );
        self.store.reload();
        self.store.remove_temporary();
        if let Some(callback) = &self.callback {
            callback(change);
        }
    }
}

impl std::fmt::Debug for ConfigWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigWatcher")
            .field("filter", &self.filter)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Collection, EnvProvider};
    use notify::event::{CreateKind, DataChange, ModifyKind};
    use std::fs;
    use tempfile::TempDir;
    use tokio::time::{sleep, timeout};

    fn filter(debounce: Duration) -> EventFilter {
        EventFilter {
            debounce,
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| (*s).to_string()).collect(),
            last: None,
        }
    }

    fn modified(path: &str) -> Event {
        Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Any))).add_path(PathBuf::from(path))
    }

    #[test]
    fn test_filter_extensions() {
        let mut f = filter(Duration::ZERO);
        let now = Instant::now();
        assert!(f.accept(&modified("site/theme.yaml"), now).is_some());
        assert!(f.accept(&modified("site/.env"), now).is_some());
        assert!(f.accept(&modified("site/readme.txt"), now).is_none());
    }

    #[test]
    fn test_filter_ignores_access_events() {
        let mut f = filter(Duration::ZERO);
        let event = Event::new(EventKind::Access(notify::event::AccessKind::Any))
            .add_path(PathBuf::from("a.json"));
        assert!(f.accept(&event, Instant::now()).is_none());
    }

    #[test]
    fn test_filter_debounces_same_path() {
        let mut f = filter(Duration::from_secs(1));
        let start = Instant::now();
        assert!(f.accept(&modified("a.json"), start).is_some());
        assert!(f.accept(&modified("a.json"), start + Duration::from_millis(10)).is_none());
        assert!(f.accept(&modified("b.json"), start + Duration::from_millis(20)).is_some());
        assert!(f.accept(&modified("b.json"), start + Duration::from_secs(2)).is_some());
    }

    #[test]
    fn test_change_kind() {
        assert_eq!(
            FileChangeKind::from_event(&EventKind::Create(CreateKind::File)),
            Some(FileChangeKind::Created)
        );
        assert_eq!(FileChangeKind::from_event(&EventKind::Other), None);
    }

    #[test]
    fn test_build_requires_paths() {
        let err = ConfigWatcher::builder(ConfigStore::new()).build().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidConfig { .. }));
    }

    #[test]
    fn test_watch_missing_path() {
        let result = ConfigWatcher::builder(ConfigStore::new()).watch_path("/nonexistent/sites");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_apply_refreshes_store() {
        let dir = TempDir::new().unwrap();
        let store = ConfigStore::new();
        store.add_collection("dynamic", Collection::temporary());
        store.add_collection("permanent", Collection::new());

        let watcher = ConfigWatcher::builder(store.clone())
            .watch_path(dir.path())
            .unwrap()
            .build()
            .unwrap();
        watcher.apply(&FileChangeEvent {
            path: dir.path().join("x.json"),
            kind: FileChangeKind::Modified,
            timestamp: Instant::now(),
        });

        assert_eq!(store.namespaces(), vec!["permanent"]);
    }

    #[test]
    fn test_apply_rereads_env_file() {
        #[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
        struct Site {
            name: String,
        }

        let dir = TempDir::new().unwrap();
        let env_path = dir.path().join(".env");
        fs::write(&env_path, "SITE_NAME=old\n").unwrap();

        let store = ConfigStore::new();
        store.register_schema::<Site>("site");
        store.add_collection(
            "default",
            Collection::new().with_provider(EnvProvider::from_dotenv(&env_path).unwrap()),
        );
        let read = || -> String {
            let site: Site = store.get("default").unwrap().get("site").unwrap().unwrap();
            site.name
        };
        assert_eq!(read(), "old");

        fs::write(&env_path, "SITE_NAME=new\n").unwrap();
        let watcher = ConfigWatcher::builder(store.clone())
            .watch_path(dir.path())
            .unwrap()
            .build()
            .unwrap();
        watcher.apply(&FileChangeEvent {
            path: env_path.clone(),
            kind: FileChangeKind::Modified,
            timestamp: Instant::now(),
        });

        assert_eq!(read(), "new");
    }

    #[tokio::test]
    async fn test_detects_file_change() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("site.json");
        fs::write(&path, "{}").unwrap();

        let store = ConfigStore::new();
        store.add_collection("dynamic", Collection::temporary());

        let mut watcher = ConfigWatcher::builder(store.clone())
            .with_debounce(Duration::from_millis(50))
            .watch_path(dir.path())
            .unwrap()
            .build()
            .unwrap();

        sleep(Duration::from_millis(100)).await;
        fs::write(&path, "{\"name\": \"x\"}").unwrap();

        // File system events can be slow or missing in CI sandboxes
        if let Ok(Some(event)) = timeout(Duration::from_secs(2), watcher.next()).await {
            assert_eq!(event.path.file_name(), path.file_name());
            assert!(store.namespaces().is_empty());
        }
    }
}
