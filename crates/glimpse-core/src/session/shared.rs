//! Session state reachable from outside the event loop.

use glimpse_config::{PreviewSettings, UpdateMode};
use indexmap::IndexSet;
use parking_lot::{Mutex, RwLock};
use path_clean::PathClean;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Notify, watch};

use crate::fetch::FetchTarget;
use crate::markup::LoadedPlugin;
use crate::surface::PreviewSurface;

/// Observable bookkeeping of a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStatus {
    pub current_version: i64,
    pub last_rendered_version: i64,
    pub stale: bool,
    pub renders: u64,
}

pub struct SessionShared {
    entry: PathBuf,
    entry_dir: PathBuf,
    settings: RwLock<PreviewSettings>,
    surface: RwLock<Option<Arc<dyn PreviewSurface>>>,
    ready: watch::Sender<bool>,
    status: watch::Sender<SessionStatus>,
    dependent_paths: Mutex<IndexSet<PathBuf>>,
    dependents_changed: Notify,
    plugins: RwLock<Vec<LoadedPlugin>>,
}

impl SessionShared {
    pub fn new(entry: PathBuf, settings: PreviewSettings) -> Self {
        let entry = entry.clean();
        let entry_dir = entry.parent().unwrap_or_else(|| Path::new("")).to_path_buf();
        let mut dependent_paths = IndexSet::new();
        dependent_paths.insert(entry.clone());
        Self {
            entry,
            entry_dir,
            settings: RwLock::new(settings),
            surface: RwLock::new(None),
            ready: watch::Sender::new(false),
            status: watch::Sender::new(SessionStatus::default()),
            dependent_paths: Mutex::new(dependent_paths),
            dependents_changed: Notify::new(),
            plugins: RwLock::new(Vec::new()),
        }
    }

    pub fn entry(&self) -> &Path {
        &self.entry
    }

    pub fn settings(&self) -> PreviewSettings {
        self.settings.read().clone()
    }

    pub(crate) fn set_settings(&self, settings: PreviewSettings) {
        *self.settings.write() = settings;
    }

    /// Attach a (new) surface. It is not ready until it handshakes.
    pub fn attach_surface(&self, surface: Arc<dyn PreviewSurface>) {
        *self.surface.write() = Some(surface);
        self.ready.send_replace(false);
    }

    pub fn detach_surface(&self) {
        *self.surface.write() = None;
        self.ready.send_replace(false);
    }

    pub fn handshake(&self) {
        tracing::debug!(entry = %self.entry.display(), "surface handshake");
        self.ready.send_replace(true);
    }

    pub(crate) fn ready(&self) -> watch::Receiver<bool> {
        self.ready.subscribe()
    }

    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    pub(crate) fn publish_status(&self, status: SessionStatus) {
        self.status.send_if_modified(|current| {
            if *current == status {
                return false;
            }
            *current = status;
            true
        });
    }

    pub fn is_dependent(&self, path: &Path) -> bool {
        self.dependent_paths.lock().contains(&path.to_path_buf().clean())
    }

    pub fn dependent_paths(&self) -> Vec<PathBuf> {
        self.dependent_paths.lock().iter().cloned().collect()
    }

    /// Restart the dependent set from the entry and its direct imports. The
    /// surface re-fetches everything else on the next module evaluation.
    pub(crate) fn reset_dependent_paths(&self, direct: impl IntoIterator<Item = PathBuf>) {
        let mut paths = self.dependent_paths.lock();
        paths.clear();
        paths.insert(self.entry.clone());
        paths.extend(direct.into_iter().map(|path| path.clean()));
    }

    /// Resolves once a fetch has added a path since the last call.
    pub(crate) async fn dependents_changed(&self) {
        self.dependents_changed.notified().await;
    }

    pub(crate) fn set_plugins(&self, plugins: Vec<LoadedPlugin>) {
        *self.plugins.write() = plugins;
    }
}

impl FetchTarget for SessionShared {
    fn entry_dir(&self) -> &Path {
        &self.entry_dir
    }

    fn update_mode(&self) -> UpdateMode {
        self.settings.read().update_mode
    }

    fn surface(&self) -> Option<Arc<dyn PreviewSurface>> {
        self.surface.read().clone()
    }

    fn plugins(&self) -> Vec<LoadedPlugin> {
        self.plugins.read().clone()
    }

    fn add_dependent_path(&self, path: &Path) -> bool {
        let added = self.dependent_paths.lock().insert(path.to_path_buf().clean());
        if added {
            tracing::trace!(path = %path.display(), "dependent path added");
            self.dependents_changed.notify_one();
        }
        added
    }

    fn development(&self) -> bool {
        self.settings.read().development
    }
}

impl std::fmt::Debug for SessionShared {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionShared")
            .field("entry", &self.entry)
            .field("status", &self.status())
            .field("dependent_paths", &self.dependent_paths.lock().len())
            .finish_non_exhaustive()
    }
}
