//! Subscription behaviour of the settings store.

use glimpse_config::{PreviewSettings, SettingsStore, UpdateMode};

#[tokio::test]
async fn subscribers_see_replacements() {
    let store = SettingsStore::default();
    let mut rx = store.subscribe();

    let next = PreviewSettings {
        update_mode: UpdateMode::OnSave,
        ..Default::default()
    };
    assert!(store.replace(next.clone()));

    rx.changed().await.unwrap();
    assert_eq!(*rx.borrow_and_update(), next);
    assert_eq!(store.current().update_mode, UpdateMode::OnSave);
}

#[tokio::test]
async fn identical_replacement_is_not_published() {
    let store = SettingsStore::default();
    let rx = store.subscribe();

    assert!(!store.replace(PreviewSettings::default()));
    assert!(!rx.has_changed().unwrap());
}
