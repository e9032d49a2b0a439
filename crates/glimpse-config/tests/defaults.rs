//! Tests for default values and edge cases.

use glimpse_config::{PreviewSettings, SettingsOverrides, UpdateMode, load_layered, validate};
use tempfile::TempDir;

#[test]
fn preview_settings_defaults() {
    let settings = PreviewSettings::default();
    assert_eq!(settings.update_mode, UpdateMode::OnType);
    assert_eq!(settings.debounce_ms, 300);
    assert!(!settings.scripts_enabled);
    assert_eq!(settings.handshake_timeout_ms, 10_000);
    assert!(settings.roots.is_empty());
    assert!(settings.plugins.is_empty());
    assert!(!settings.development);
    assert!(settings.trusted_folders.is_empty());
}

#[test]
fn missing_config_yields_defaults() {
    let dir = TempDir::new().unwrap();
    let settings = load_layered(dir.path(), None, &SettingsOverrides::default()).unwrap();
    assert_eq!(settings, PreviewSettings::default());
}

#[test]
fn oversized_debounce_is_rejected() {
    let settings = PreviewSettings {
        debounce_ms: 120_000,
        ..Default::default()
    };
    assert!(validate(&settings).is_err());
}

#[test]
fn zero_handshake_timeout_is_rejected() {
    let settings = PreviewSettings {
        handshake_timeout_ms: 0,
        ..Default::default()
    };
    assert!(validate(&settings).is_err());
}
