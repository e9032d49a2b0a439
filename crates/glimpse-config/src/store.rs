//! Observable settings holder.

use crate::settings::PreviewSettings;
use tokio::sync::watch;

/// Owns the current [`PreviewSettings`] and notifies subscribers on change.
#[derive(Debug)]
pub struct SettingsStore {
    tx: watch::Sender<PreviewSettings>,
}

impl SettingsStore {
    pub fn new(initial: PreviewSettings) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    pub fn current(&self) -> PreviewSettings {
        self.tx.borrow().clone()
    }

    /// Receiver that observes every future replacement.
    pub fn subscribe(&self) -> watch::Receiver<PreviewSettings> {
        self.tx.subscribe()
    }

    /// Replace the settings. Subscribers are only woken if the value differs.
    ///
    /// Returns whether a change was published.
    pub fn replace(&self, next: PreviewSettings) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                tracing::debug!("preview settings changed");
                *current = next;
                true
            }
        })
    }
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::new(PreviewSettings::default())
    }
}
