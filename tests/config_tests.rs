use std::fs::{self, File};
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use tempfile::tempdir;
use wallflow::config::{ConfigStore, Configuration, DEFAULT_CHANGE_INTERVAL_SECS};

#[test]
fn parse_camel_case_config() {
    let json = r#"{
        "wallpaperDir": "/walls",
        "changeInterval": 60,
        "shuffle": false,
        "applyCommand": ["swaybg", "-m", "tile", "-i"]
    }"#;
    let cfg: Configuration = serde_json::from_str(json).unwrap();
    assert_eq!(cfg.wallpaper_dir, PathBuf::from("/walls"));
    assert_eq!(cfg.change_interval(), Duration::from_secs(60));
    assert!(!cfg.shuffle);
    assert_eq!(cfg.apply_command.unwrap()[0], "swaybg");
}

#[test]
fn missing_fields_take_defaults() {
    let cfg: Configuration = serde_json::from_str(r#"{"wallpaperDir": "/w"}"#).unwrap();
    assert_eq!(cfg.change_interval, DEFAULT_CHANGE_INTERVAL_SECS);
    assert!(cfg.shuffle);
    assert!(cfg.apply_command.is_none());
}

#[test]
fn zero_interval_is_rejected() {
    let cfg: Configuration = serde_json::from_str(r#"{"changeInterval": 0}"#).unwrap();
    let err = cfg.validated().unwrap_err();
    assert!(err.to_string().contains("changeInterval"));
}

#[test]
fn empty_apply_command_is_rejected() {
    let cfg: Configuration = serde_json::from_str(r#"{"applyCommand": []}"#).unwrap();
    assert!(cfg.validated().is_err());
}

#[test]
fn open_writes_defaults_when_missing() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("config.json");
    let store = ConfigStore::open(&path).unwrap();
    assert!(path.exists());
    assert_eq!(store.snapshot().change_interval, DEFAULT_CHANGE_INTERVAL_SECS);

    let raw = fs::read_to_string(&path).unwrap();
    assert!(raw.contains("\"changeInterval\": 300"));
    assert!(raw.contains("\"shuffle\": true"));
}

#[test]
fn update_persists_to_disk() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("config.json");
    let store = ConfigStore::open(&path).unwrap();
    let cfg = store.update(|cfg| cfg.shuffle = false).unwrap();
    assert!(!cfg.shuffle);

    let reread = Configuration::from_json_file(&path).unwrap();
    assert!(!reread.shuffle);
    assert!(!store.reload_if_modified().unwrap());
}

#[test]
fn invalid_update_leaves_config_alone() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("config.json");
    let store = ConfigStore::open(&path).unwrap();
    assert!(store.update(|cfg| cfg.change_interval = 0).is_err());
    assert_eq!(store.snapshot().change_interval, DEFAULT_CHANGE_INTERVAL_SECS);
}

#[test]
fn external_edits_are_reloaded() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("config.json");
    let store = ConfigStore::open(&path).unwrap();
    assert!(!store.reload_if_modified().unwrap());

    fs::write(&path, r#"{"wallpaperDir": "/elsewhere", "changeInterval": 10}"#).unwrap();
    // Coarse filesystem clocks may not move the mtime on their own.
    File::options()
        .write(true)
        .open(&path)
        .unwrap()
        .set_modified(SystemTime::now() + Duration::from_secs(5))
        .unwrap();

    assert!(store.reload_if_modified().unwrap());
    let cfg = store.snapshot();
    assert_eq!(cfg.wallpaper_dir, PathBuf::from("/elsewhere"));
    assert_eq!(cfg.change_interval, 10);
}

#[test]
fn in_memory_store_never_reloads() {
    let store = ConfigStore::in_memory(Configuration::default());
    assert!(!store.reload_if_modified().unwrap());
    store.update(|cfg| cfg.change_interval = 5).unwrap();
    assert_eq!(store.snapshot().change_interval, 5);
}
