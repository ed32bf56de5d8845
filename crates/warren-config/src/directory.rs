//! Directory-of-files provider.
//!
//! Each key is stored in its own file directly under the base directory:
//! `<base>/<key>.<extension>`. The registered [`FileType`]s are tried in
//! order and the first existing file wins.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;

use crate::provider::{Provider, WritableProvider};
use crate::ConfigError;

/// A configuration file format.
pub trait FileType: Send + Sync + 'static {
    /// File extensions handled by this format, without the leading dot.
    fn extensions(&self) -> &[&'static str];

    /// Parses file content.
    fn decode(&self, content: &str) -> Result<Value, ConfigError>;

    /// Renders a value as file content.
    fn encode(&self, value: &Value) -> Result<String, ConfigError>;
}

/// JSON files (`.json`).
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFile {
    /// Pretty-print on save.
    pub pretty: bool,
}

impl FileType for JsonFile {
    fn extensions(&self) -> &[&'static str] {
        &["json"]
    }

    fn decode(&self, content: &str) -> Result<Value, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    fn encode(&self, value: &Value) -> Result<String, ConfigError> {
        let out = if self.pretty {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        };
        Ok(out)
    }
}

/// YAML files (`.yml`, `.yaml`).
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlFile;

impl FileType for YamlFile {
    fn extensions(&self) -> &[&'static str] {
        &["yml", "yaml"]
    }

    fn decode(&self, content: &str) -> Result<Value, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    fn encode(&self, value: &Value) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(value)?)
    }
}

/// TOML files (`.toml`).
#[derive(Debug, Clone, Copy, Default)]
pub struct TomlFile;

impl FileType for TomlFile {
    fn extensions(&self) -> &[&'static str] {
        &["toml"]
    }

    fn decode(&self, content: &str) -> Result<Value, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    fn encode(&self, value: &Value) -> Result<String, ConfigError> {
        // TOML has no null
        Ok(toml::to_string(&strip_nulls(value.clone()))?)
    }
}

fn strip_nulls(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, strip_nulls(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(strip_nulls).collect()),
        other => other,
    }
}

/// All built-in file types in their default order.
pub fn default_file_types() -> Vec<Arc<dyn FileType>> {
    vec![
        Arc::new(JsonFile { pretty: true }),
        Arc::new(YamlFile),
        Arc::new(TomlFile),
    ]
}

/// Provider reading one file per key from a directory.
pub struct DirectoryProvider {
    base: PathBuf,
    read_only: bool,
    file_types: Vec<Arc<dyn FileType>>,
}

impl DirectoryProvider {
    /// Creates a writable provider rooted at `base` with no file types.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            read_only: false,
            file_types: Vec::new(),
        }
    }

    /// Creates a provider with every built-in file type registered.
    pub fn with_default_file_types(base: impl Into<PathBuf>) -> Self {
        let mut provider = Self::new(base);
        provider.file_types = default_file_types();
        provider
    }

    /// Registers a file type. Earlier registrations take precedence.
    #[must_use]
    pub fn with_file_type(mut self, file_type: impl FileType) -> Self {
        self.file_types.push(Arc::new(file_type));
        self
    }

    /// Marks the provider read-only.
    #[must_use]
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Base directory.
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Returns true if saving is disabled.
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn path_for(&self, key: &str, extension: &str) -> PathBuf {
        self.base.join(format!("{key}.{extension}"))
    }

    fn find(&self, key: &str) -> Option<(PathBuf, &dyn FileType)> {
        self.file_types.iter().find_map(|file_type| {
            file_type.extensions().iter().find_map(|ext| {
                let path = self.path_for(key, ext);
                path.is_file().then(|| (path, file_type.as_ref()))
            })
        })
    }
}

impl std::fmt::Debug for DirectoryProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryProvider")
            .field("base", &self.base)
            .field("read_only", &self.read_only)
            .field("file_types", &self.file_types.len())
            .finish()
    }
}

impl Provider for DirectoryProvider {
    fn name(&self) -> &'static str {
        "directory"
    }

    fn has(&self, key: &str) -> bool {
        self.find(key).is_some()
    }

    fn unmarshal(&self, key: &str, _shape: &Value) -> Result<Value, ConfigError> {
        let Some((path, file_type)) = self.find(key) else {
            return Ok(Value::Null);
        };
        let content = fs::read_to_string(&path).map_err(|e| ConfigError::read_error(&path, e))?;
        file_type.decode(&content)
    }

    fn as_writable(&self) -> Option<&dyn WritableProvider> {
        Some(self)
    }
}

impl WritableProvider for DirectoryProvider {
    fn can_save(&self, _key: &str) -> bool {
        !self.read_only
    }

    fn save(&self, key: &str, value: &Value) -> Result<(), ConfigError> {
        let (path, file_type) = match self.find(key) {
            Some(found) => found,
            None => {
                let file_type = self.file_types.first().ok_or_else(|| ConfigError::NoFileTypes {
                    path: self.base.clone(),
                })?;
                let ext = file_type.extensions().first().copied().unwrap_or("conf");
                (self.path_for(key, ext), file_type.as_ref())
            }
        };

        let content = file_type.encode(value)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::write_error(parent, e))?;
        }
        fs::write(&path, content).map_err(|e| ConfigError::write_error(&path, e))?;
        tracing::debug!(path = %path.display(), key, "saved configuration file");
        Ok(())
    }
}
