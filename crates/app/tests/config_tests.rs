//! Configuration tests
//!
//! Defaults, TOML round-trips, partial files, and error cases.

use std::fs;

// The binary crate exposes no library; exercise the config through a
// compiled-in copy of the module.
#[path = "../src/config.rs"]
mod config;

use config::AppConfig;

#[test]
fn test_defaults() {
    let config = AppConfig::default();
    assert_eq!(config.preview.width, 640);
    assert_eq!(config.preview.height, 480);
    assert_eq!(config.log_level, "info");
    assert!(config.usb.filters.is_empty());
    assert!(!config.capture.directory.as_os_str().is_empty());
}

#[test]
fn test_save_and_load_round_trip() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("nested").join("config.toml");

    let mut config = AppConfig::default();
    config.preview.width = 1920;
    config.preview.height = 1080;
    config.usb.filters.push("0x046d:*".to_string());
    config.log_level = "debug".to_string();

    config.save(&path).unwrap();
    assert!(path.exists(), "save must create parent directories");

    let loaded = AppConfig::load(&path).unwrap();
    assert_eq!(loaded.preview.width, 1920);
    assert_eq!(loaded.preview.height, 1080);
    assert_eq!(loaded.usb.filters, vec!["0x046d:*".to_string()]);
    assert_eq!(loaded.log_level, "debug");
}

#[test]
fn test_partial_file_fills_defaults() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("config.toml");
    fs::write(
        &path,
        r#"
        log_level = "trace"

        [usb]
        filters = ["0x1871:0x0101"]
        "#,
    )
    .unwrap();

    let config = AppConfig::load(&path).unwrap();
    assert_eq!(config.log_level, "trace");
    assert_eq!(config.usb.filters.len(), 1);
    assert_eq!(config.preview.width, 640, "missing section uses defaults");
}

#[test]
fn test_invalid_toml_is_an_error() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("config.toml");
    fs::write(&path, "this is not toml {{{{").unwrap();

    assert!(AppConfig::load(&path).is_err());
}

#[test]
fn test_missing_file_is_an_error() {
    let tmp = tempfile::tempdir().unwrap();
    assert!(AppConfig::load(&tmp.path().join("absent.toml")).is_err());
}

#[test]
fn test_aspect_ratio_follows_dimensions() {
    let mut config = AppConfig::default();
    config.preview.width = 1280;
    config.preview.height = 720;
    assert!((config.preview.aspect_ratio() - 16.0 / 9.0).abs() < 0.001);
}
