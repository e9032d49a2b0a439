//! Live watch set for a session's local dependencies.
//!
//! [`DependencyWatcher::update_dependencies`] reconciles the watched set
//! against the latest dependency list: removed paths are disposed, new paths
//! get a watch, paths present in both are left alone.
//!
//! Watches are native by nature, so this module probes the real filesystem
//! rather than going through [`crate::runtime::Runtime`].

#![allow(clippy::disallowed_methods)]

use indexmap::{IndexMap, IndexSet};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use path_clean::PathClean;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::disposable::Disposable;
use crate::resolver::is_vendored;

/// Extensions tried when a local specifier has none.
pub const WATCH_EXTENSIONS: [&str; 9] = [
    ".tsx", ".ts", ".jsx", ".js", ".mjs", ".mdx", ".md", ".json", ".css",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChange {
    Modified(PathBuf),
    Removed(PathBuf),
}

impl FileChange {
    pub fn path(&self) -> &Path {
        match self {
            FileChange::Modified(path) | FileChange::Removed(path) => path,
        }
    }
}

pub type ChangeCallback = Arc<dyn Fn(FileChange) + Send + Sync>;

#[derive(Debug, thiserror::Error)]
#[error("failed to watch {}: {source}", path.display())]
pub struct WatchError {
    pub path: PathBuf,
    #[source]
    pub source: notify::Error,
}

/// Creates one filesystem watch per path.
pub trait WatchFactory: Send + Sync {
    fn watch(&self, path: &Path, on_change: ChangeCallback) -> Result<Disposable, WatchError>;
}

/// Watches through `notify`. The parent directory is watched (non-recursive)
/// and events filtered to the file, so editors that save by rename keep
/// reporting changes.
#[derive(Debug, Default, Clone, Copy)]
pub struct NotifyWatchFactory;

impl WatchFactory for NotifyWatchFactory {
    fn watch(&self, path: &Path, on_change: ChangeCallback) -> Result<Disposable, WatchError> {
        let target = path.to_path_buf();
        let dir = path.parent().unwrap_or(path).to_path_buf();
        let filter = target.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let Ok(event) = res else { return };
            if !event.paths.iter().any(|p| p == &filter) {
                return;
            }
            let change = match event.kind {
                EventKind::Remove(_) if !filter.exists() => FileChange::Removed(filter.clone()),
                EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => {
                    FileChange::Modified(filter.clone())
                }
                _ => return,
            };
            on_change(change);
        })
        .map_err(|source| WatchError {
            path: target.clone(),
            source,
        })?;
        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|source| WatchError {
                path: target.clone(),
                source,
            })?;
        tracing::trace!(path = %target.display(), "watch created");
        Ok(Disposable::new(move || {
            drop(watcher);
            tracing::trace!(path = %target.display(), "watch disposed");
        }))
    }
}

/// `./x` and `../x` only. URLs and scheme-qualified specifiers are never local.
pub fn is_local_specifier(specifier: &str) -> bool {
    specifier.starts_with("./") || specifier.starts_with("../")
}

/// First existing file for a local specifier: exact, with an extension, then
/// an `index` file inside it.
pub fn resolve_local(base_dir: &Path, specifier: &str) -> Option<PathBuf> {
    let base = base_dir.join(specifier).clean();
    if base.is_file() {
        return Some(base);
    }
    let file_name = base.file_name()?.to_str()?.to_string();
    WATCH_EXTENSIONS
        .iter()
        .map(|ext| base.with_file_name(format!("{file_name}{ext}")))
        .chain(WATCH_EXTENSIONS.iter().map(|ext| base.join(format!("index{ext}"))))
        .find(|candidate| candidate.is_file())
}

pub struct DependencyWatcher {
    factory: Arc<dyn WatchFactory>,
    base_dir: PathBuf,
    on_change: ChangeCallback,
    entries: IndexMap<PathBuf, Disposable>,
}

impl DependencyWatcher {
    pub fn new(factory: Arc<dyn WatchFactory>, base_dir: impl Into<PathBuf>, on_change: ChangeCallback) -> Self {
        Self {
            factory,
            base_dir: base_dir.into(),
            on_change,
            entries: IndexMap::new(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn set_base_dir(&mut self, base_dir: impl Into<PathBuf>) {
        self.base_dir = base_dir.into();
    }

    pub fn update_dependencies<S: AsRef<str>>(&mut self, specifiers: &[S]) {
        let resolved = self.resolve_specifiers(specifiers);
        self.update_paths(resolved);
    }

    /// Files the local specifiers among `specifiers` point at.
    pub fn resolve_specifiers<S: AsRef<str>>(&self, specifiers: &[S]) -> Vec<PathBuf> {
        specifiers
            .iter()
            .map(AsRef::as_ref)
            .filter(|s| is_local_specifier(s))
            .filter_map(|s| resolve_local(&self.base_dir, s))
            .collect()
    }

    /// Reconcile the watch set against already-resolved paths, such as the
    /// transitive imports a session has fetched.
    pub fn update_paths(&mut self, paths: impl IntoIterator<Item = PathBuf>) {
        let next: IndexSet<PathBuf> = paths
            .into_iter()
            .map(|path| path.clean())
            .filter(|path| !is_vendored(path))
            .collect();

        let stale: Vec<PathBuf> = self
            .entries
            .keys()
            .filter(|path| !next.contains(*path))
            .cloned()
            .collect();
        for path in stale {
            if let Some(handle) = self.entries.shift_remove(&path) {
                handle.dispose();
            }
        }

        for path in next {
            if self.entries.contains_key(&path) {
                continue;
            }
            match self.factory.watch(&path, self.on_change.clone()) {
                Ok(handle) => {
                    tracing::trace!(path = %path.display(), "dependency watched");
                    self.entries.insert(path, handle);
                }
                Err(err) => tracing::warn!(error = %err, "dependency not watched"),
            }
        }
    }

    /// Forget a deleted file so a recreated one gets a fresh watch.
    pub fn handle_removed(&mut self, path: &Path) {
        if let Some(handle) = self.entries.shift_remove(path) {
            handle.dispose();
        }
    }

    pub fn clear(&mut self) {
        for (_, handle) in self.entries.drain(..) {
            handle.dispose();
        }
    }

    pub fn watched(&self) -> Vec<PathBuf> {
        self.entries.keys().cloned().collect()
    }

    pub fn is_watching(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }
}

impl Drop for DependencyWatcher {
    fn drop(&mut self) {
        self.clear();
    }
}
