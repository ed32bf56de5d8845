//! Layered resolution across environment, directory and memory providers.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use warren_config::{
    loader_fn, Collection, ConfigError, ConfigStore, DirectoryCollectionLoader, DirectoryProvider,
    EnvProvider, FileType, JsonFile, MemoryProvider, Provider, TomlFile, YamlFile,
};

#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq)]
struct Nested {
    e: i64,
    f: f64,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq)]
struct Test {
    a: i64,
    b: String,
    c: bool,
    d: Nested,
    g: String,
}

fn expected() -> Test {
    Test {
        a: 5,
        b: "asdf".to_string(),
        c: true,
        d: Nested { e: -2, f: -1.2 },
        g: "zxcvbn".to_string(),
    }
}

fn fixtures() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/config")
}

fn env_provider() -> EnvProvider {
    EnvProvider::from_vars(
        ["TEST_0", "TEST_1", "TEST_2"].map(|key| (format!("CONFIG_{key}_G"), "zxcvbn".to_string())),
    )
    .with_prefix("CONFIG")
}

fn layered_store() -> ConfigStore {
    let store = ConfigStore::new();
    store.register_schema::<Test>("test.*");
    store.add_collection(
        "config",
        Collection::new()
            .with_provider(env_provider())
            .with_provider(DirectoryProvider::with_default_file_types(fixtures()).read_only(true)),
    );
    store
}

#[test]
fn test_loads_every_file_type() {
    let store = layered_store();
    let config = store.get("config").expect("config namespace");

    for key in ["test.0", "test.1", "test.2"] {
        let value: Test = config.get(key).unwrap().expect(key);
        assert_eq!(value, expected(), "key {key}");
    }
}

#[test]
fn test_unknown_collection() {
    let store = layered_store();
    assert!(store.get("test").is_none());
}

#[test]
fn test_registered_key_without_data() {
    let store = layered_store();
    let config = store.get("config").unwrap();
    assert_eq!(config.get::<Test>("test.9").unwrap(), None);
}

#[test]
fn test_earlier_provider_overrides_file() {
    let store = ConfigStore::new();
    store.register_schema::<Test>("test.*");
    store.add_collection(
        "config",
        Collection::new()
            .with_provider(EnvProvider::from_vars([("CONFIG_TEST_0_A", "7")]).with_prefix("CONFIG"))
            .with_provider(DirectoryProvider::with_default_file_types(fixtures()).read_only(true)),
    );

    let value: Test = store.get("config").unwrap().get("test.0").unwrap().unwrap();
    assert_eq!(value.a, 7);
    assert_eq!(value.b, "asdf");
    assert_eq!(value.d, Nested { e: -2, f: -1.2 });
}

fn save_with(file_type: impl FileType, extension: &str, decode: fn(&str) -> Test) {
    let tmp = TempDir::new().unwrap();
    let writable = DirectoryProvider::new(tmp.path())
        .with_file_type(file_type)
        .with_file_type(JsonFile::default())
        .with_file_type(YamlFile)
        .with_file_type(TomlFile);

    let collection = Collection::new()
        .with_provider(env_provider())
        .with_provider(writable)
        .with_provider(DirectoryProvider::with_default_file_types(fixtures()).read_only(true));

    let store = ConfigStore::new();
    store.register_schema::<Test>("test.*");
    store.add_collection("config", collection);

    let config = store.get_writable("config").unwrap();
    let (value, saver) = config.get_writable::<Test>("test.0").unwrap();
    let mut value = value.unwrap();
    assert_eq!(value, expected());

    value.b = "qwer".to_string();
    saver.save(&value).unwrap();

    let written = std::fs::read_to_string(tmp.path().join(format!("test.0.{extension}"))).unwrap();
    assert_eq!(decode(&written), value);

    store.clear_all_caches();
    let reread: Test = store.get("config").unwrap().get("test.0").unwrap().unwrap();
    assert_eq!(reread.b, "qwer");
}

#[test]
fn test_save_json() {
    save_with(JsonFile { pretty: true }, "json", |s| serde_json::from_str(s).unwrap());
}

#[test]
fn test_save_yaml() {
    save_with(YamlFile, "yml", |s| serde_yaml::from_str(s).unwrap());
}

#[test]
fn test_save_toml() {
    save_with(TomlFile, "toml", |s| toml::from_str(s).unwrap());
}

#[test]
fn test_only_readonly_providers() {
    let store = ConfigStore::new();
    store.register_schema::<Test>("test.*");
    store.add_collection(
        "config",
        Collection::new()
            .with_provider(DirectoryProvider::with_default_file_types(fixtures()).read_only(true)),
    );

    let (value, saver) = store
        .get_writable("config")
        .unwrap()
        .get_writable::<Test>("test.0")
        .unwrap();
    let err = saver.save(&value.unwrap()).unwrap_err();
    assert!(matches!(err, ConfigError::NoWritableProvider { .. }));
}

#[test]
fn test_loader_backed_memory_collection() {
    let memory = Arc::new(MemoryProvider::new());
    let loader_memory = memory.clone();

    let store = ConfigStore::new();
    store.register_schema::<Test>("test");
    store.add_collection_loader(loader_fn(move |name: &str| {
        if name != "test" {
            return Err(ConfigError::collection_not_found(name));
        }
        let collection = Collection::temporary();
        collection.add_provider(loader_memory.clone() as Arc<dyn Provider>);
        Ok(Some(collection))
    }));

    assert_eq!(store.get("test").unwrap().get::<Test>("test").unwrap(), None);

    let (_, saver) = store
        .get_writable("test")
        .unwrap()
        .get_writable::<Test>("test")
        .unwrap();
    saver.save(&expected()).unwrap();

    store.remove_temporary();
    let value = store.get("test").unwrap().get::<Test>("test").unwrap();
    assert_eq!(value, Some(expected()));
    assert!(memory.has("test"));

    assert!(store.get("other").is_none());
}

#[test]
fn test_directory_collection_loader() {
    let base = fixtures().parent().unwrap().to_path_buf();
    let store = ConfigStore::new();
    store.register_schema::<Test>("test.*");
    store.add_collection_loader(
        DirectoryCollectionLoader::new(base)
            .with_alias("localhost", "config")
            .read_only(true),
    );

    let config = store.get("localhost").expect("aliased namespace");
    let value: Test = config.get("test.1").unwrap().unwrap();
    assert_eq!(value.a, 5);
    assert_eq!(value.b, "asdf");

    assert!(store.get("asdf").is_none());
    assert!(store.get("test.0.json").is_none());
}
