//! Tests for settings persistence.

use std::fs;

use horizon_linewire::LinewireError;
use horizon_linewire::settings::{ClientSettings, DEFAULT_PORT, ServerSettings, SettingsFile};

#[test]
fn test_missing_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let settings = ClientSettings::load_from(&dir.path().join("client.toml")).unwrap();
    assert_eq!(settings, ClientSettings::default());
    assert_eq!(settings.address, "127.0.0.1");
    assert_eq!(settings.port, DEFAULT_PORT);
}

#[test]
fn test_save_then_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("deeper").join("client.toml");

    let settings = ClientSettings {
        address: "example.org".into(),
        port: 2323,
        repeat_interval_ms: 250,
        send_text: "PING".into(),
    };
    settings.save_to(&path).unwrap();

    assert!(path.exists());
    assert!(!path.with_extension("toml.tmp").exists());
    assert_eq!(ClientSettings::load_from(&path).unwrap(), settings);
}

#[test]
fn test_save_overwrites_previous_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("server.toml");

    let mut settings = ServerSettings::default();
    settings.save_to(&path).unwrap();
    settings.port = 9100;
    settings.send_text = "bye".into();
    settings.save_to(&path).unwrap();

    let loaded = ServerSettings::load_from(&path).unwrap();
    assert_eq!(loaded.port, 9100);
    assert_eq!(loaded.send_text, "bye");
}

#[test]
fn test_corrupt_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("server.toml");
    fs::write(&path, "port = \"not a number\"").unwrap();

    let err = ServerSettings::load_from(&path).unwrap_err();
    assert!(matches!(err, LinewireError::Parse { .. }), "{err:?}");
    assert!(err.to_string().contains("server.toml"));
}

#[test]
fn test_unknown_keys_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("client.toml");
    fs::write(&path, "port = 8080\nwindow_width = 640\n").unwrap();

    let settings = ClientSettings::load_from(&path).unwrap();
    assert_eq!(settings.port, 8080);
    assert_eq!(settings.address, "127.0.0.1");
}
