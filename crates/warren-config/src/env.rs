//! Environment variable provider.
//!
//! Values are read from variables named after the key and the fields of the
//! registered schema. With prefix `SITE_EXAMPLE` and the default `_`
//! separator, the field `d.e` of key `test` is read from
//! `SITE_EXAMPLE_TEST_D_E`. Names are upper-cased and every character
//! that is not ASCII alphanumeric becomes `_`.
//!
//! The variable snapshot is taken lazily on first use and kept until
//! [`EnvProvider::reset`] is called. Providers built from a `.env` file
//! re-read the file after a reset.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde_json::{Map, Number, Value};

use crate::provider::Provider;
use crate::ConfigError;

/// Default separator between name segments.
pub const DEFAULT_SEPARATOR: &str = "_";

#[derive(Debug, Clone)]
enum Source {
    Process,
    Fixed(HashMap<String, String>),
    Dotenv(PathBuf),
}

/// Read-only provider backed by environment variables.
#[derive(Debug)]
pub struct EnvProvider {
    prefix: String,
    separator: String,
    source: Source,
    variables: RwLock<Option<HashMap<String, String>>>,
}

impl EnvProvider {
    /// Creates a provider over the process environment without a prefix.
    pub fn new() -> Self {
        Self {
            prefix: String::new(),
            separator: DEFAULT_SEPARATOR.to_string(),
            source: Source::Process,
            variables: RwLock::new(None),
        }
    }

    /// Creates a provider over an explicit set of variables.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: HashMap<String, String> =
            vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        Self {
            source: Source::Fixed(vars),
            ..Self::new()
        }
    }

    /// Creates a provider over the variables of a `.env` file.
    ///
    /// The process environment is not modified. The file is read now, and
    /// again on the first access after [`EnvProvider::reset`].
    pub fn from_dotenv(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref().to_path_buf();
        let vars = read_dotenv(&path)?;
        Ok(Self {
            source: Source::Dotenv(path),
            variables: RwLock::new(Some(vars)),
            ..Self::new()
        })
    }

    /// Sets the variable name prefix.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl AsRef<str>) -> Self {
        self.prefix = env_segment(prefix.as_ref());
        self
    }

    /// Sets the separator placed between name segments.
    #[must_use]
    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    /// Returns the variable name prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Drops the variable snapshot so the next access re-reads it.
    pub fn reset(&self) {
        *self.variables.write() = None;
    }

    /// Variable name holding `key`.
    pub fn variable_name(&self, key: &str) -> String {
        let key = env_segment(key);
        if self.prefix.is_empty() {
            key
        } else {
            format!("{}{}{}", self.prefix, self.separator, key)
        }
    }

    fn with_variables<R>(&self, f: impl FnOnce(&HashMap<String, String>) -> R) -> R {
        if let Some(vars) = self.variables.read().as_ref() {
            return f(vars);
        }

        let mut guard = self.variables.write();
        let vars = guard.get_or_insert_with(|| match &self.source {
            Source::Process => std::env::vars().collect(),
            Source::Fixed(vars) => vars.clone(),
            Source::Dotenv(path) => read_dotenv(path).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "failed to re-read env file");
                HashMap::new()
            }),
        });
        f(vars)
    }

    fn read(
        &self,
        vars: &HashMap<String, String>,
        name: &str,
        shape: &Value,
    ) -> Result<Option<Value>, ConfigError> {
        match shape {
            Value::Object(fields) => {
                let mut out = Map::new();
                for (field, field_shape) in fields {
                    let child = format!("{}{}{}", name, self.separator, env_segment(field));
                    if let Some(value) = self.read(vars, &child, field_shape)? {
                        out.insert(field.clone(), value);
                    }
                }
                Ok((!out.is_empty()).then_some(Value::Object(out)))
            }
            leaf => match vars.get(name) {
                Some(raw) => coerce(name, raw, leaf).map(Some),
                None => Ok(None),
            },
        }
    }
}

impl Default for EnvProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl Provider for EnvProvider {
    fn name(&self) -> &'static str {
        "env"
    }

    fn has(&self, key: &str) -> bool {
        let name = self.variable_name(key);
        let nested = format!("{}{}", name, self.separator);
        self.with_variables(|vars| {
            vars.keys()
                .any(|k| k == &name || k.starts_with(&nested))
        })
    }

    fn unmarshal(&self, key: &str, shape: &Value) -> Result<Value, ConfigError> {
        let name = self.variable_name(key);
        let value = self.with_variables(|vars| self.read(vars, &name, shape))?;
        Ok(value.unwrap_or(Value::Null))
    }

    fn reload(&self) {
        self.reset();
    }
}

fn read_dotenv(path: &Path) -> Result<HashMap<String, String>, ConfigError> {
    let mut vars = HashMap::new();
    for item in dotenvy::from_path_iter(path)? {
        let (key, value) = item?;
        vars.insert(key, value);
    }
    Ok(vars)
}

/// Upper-cases `s` and replaces non-alphanumeric characters with `_`.
fn env_segment(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

fn coerce(var: &str, raw: &str, shape: &Value) -> Result<Value, ConfigError> {
    match shape {
        Value::Bool(_) => match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(Value::Bool(true)),
            "false" | "0" | "no" | "off" | "" => Ok(Value::Bool(false)),
            _ => Err(ConfigError::env_parse_error(var, "expected boolean")),
        },
        Value::Number(n) if n.is_f64() => raw
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| ConfigError::env_parse_error(var, "expected float")),
        Value::Number(_) => {
            let raw = raw.trim();
            if let Ok(i) = raw.parse::<i64>() {
                Ok(Value::from(i))
            } else if let Ok(u) = raw.parse::<u64>() {
                Ok(Value::from(u))
            } else {
                Err(ConfigError::env_parse_error(var, "expected integer"))
            }
        }
        Value::String(_) => Ok(Value::String(raw.to_string())),
        Value::Array(_) => serde_json::from_str::<Value>(raw)
            .ok()
            .filter(Value::is_array)
            .ok_or_else(|| ConfigError::env_parse_error(var, "expected JSON array")),
        Value::Null | Value::Object(_) => Ok(serde_json::from_str::<Value>(raw)
            .unwrap_or_else(|_| Value::String(raw.to_string()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn shape() -> Value {
        json!({"a": 0, "b": "", "c": false, "d": {"e": 0, "f": 0.0}, "g": ""})
    }

    #[test]
    fn test_variable_name() {
        let provider = EnvProvider::new();
        assert_eq!(provider.variable_name("test.0"), "TEST_0");

        let provider = EnvProvider::new().with_prefix("site_example.com");
        assert_eq!(provider.prefix(), "SITE_EXAMPLE_COM");
        assert_eq!(provider.variable_name("log"), "SITE_EXAMPLE_COM_LOG");
    }

    #[test]
    fn test_has_requires_segment_boundary() {
        let provider = EnvProvider::from_vars([("CONFIG_TEST_10_G", "x")]).with_prefix("CONFIG");
        assert!(provider.has("test.10"));
        assert!(!provider.has("test.1"));
    }

    #[test]
    fn test_unmarshal_type_directed() {
        let provider = EnvProvider::from_vars([
            ("CONFIG_TEST_A", "5"),
            ("CONFIG_TEST_C", "true"),
            ("CONFIG_TEST_D_E", "-2"),
            ("CONFIG_TEST_D_F", "-1.2"),
            ("UNRELATED", "1"),
        ])
        .with_prefix("CONFIG");

        let value = provider.unmarshal("test", &shape()).unwrap();
        assert_eq!(value, json!({"a": 5, "c": true, "d": {"e": -2, "f": -1.2}}));
    }

    #[test]
    fn test_unmarshal_missing_is_null() {
        let provider = EnvProvider::from_vars(Vec::<(String, String)>::new());
        assert_eq!(provider.unmarshal("test", &shape()).unwrap(), Value::Null);
    }

    #[test]
    fn test_unmarshal_parse_error() {
        let provider = EnvProvider::from_vars([("TEST_A", "five")]);
        let err = provider.unmarshal("test", &shape()).unwrap_err();
        match err {
            ConfigError::EnvParseError { var, .. } => assert_eq!(var, "TEST_A"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_custom_separator() {
        let provider = EnvProvider::from_vars([("APP__TEST__D__E", "3")])
            .with_prefix("APP")
            .with_separator("__");
        assert!(provider.has("test"));
        let value = provider.unmarshal("test", &shape()).unwrap();
        assert_eq!(value, json!({"d": {"e": 3}}));
    }

    #[test]
    fn test_from_dotenv() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "SITE_LOG_LEVEL=debug\n").unwrap();

        let provider = EnvProvider::from_dotenv(&path).unwrap().with_prefix("SITE");
        assert!(provider.has("log"));
        let value = provider
            .unmarshal("log", &json!({"level": ""}))
            .unwrap();
        assert_eq!(value, json!({"level": "debug"}));
    }

    #[test]
    fn test_dotenv_reread_after_reload() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "SITE_NAME=old\n").unwrap();

        let provider = EnvProvider::from_dotenv(&path).unwrap().with_prefix("SITE");
        assert_eq!(provider.unmarshal("name", &json!("")).unwrap(), json!("old"));

        std::fs::write(&path, "SITE_NAME=new\n").unwrap();
        assert_eq!(provider.unmarshal("name", &json!("")).unwrap(), json!("old"));

        Provider::reload(&provider);
        assert_eq!(provider.unmarshal("name", &json!("")).unwrap(), json!("new"));

        std::fs::remove_file(&path).unwrap();
        provider.reset();
        assert!(!provider.has("name"));
    }

    #[test]
    fn test_reset_refreshes_snapshot() {
        let provider = EnvProvider::from_vars([("K", "1")]);
        assert!(provider.has("k"));
        provider.reset();
        assert!(provider.has("k"));
    }
}
