//! Project filesystem boundary.
//!
//! Containment is lexical: paths are normalized (`.` and `..` folded) and then
//! compared component by component, so `/projects/ab` is never inside
//! `/projects/a` and `/a/../b` payloads cannot climb out of a root.

use parking_lot::{Mutex, RwLock};
use path_clean::PathClean;
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Default)]
pub struct PathBoundary {
    roots: RwLock<Vec<PathBuf>>,
    /// entry dir -> narrowest containing root. Cleared when roots change.
    root_cache: Mutex<FxHashMap<PathBuf, Option<PathBuf>>>,
}

impl PathBoundary {
    pub fn new(roots: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            roots: RwLock::new(roots.into_iter().map(|path| path.clean()).collect()),
            root_cache: Mutex::new(FxHashMap::default()),
        }
    }

    pub fn roots(&self) -> Vec<PathBuf> {
        self.roots.read().clone()
    }

    /// Replace the declared roots and drop every cached lookup.
    pub fn set_roots(&self, roots: impl IntoIterator<Item = PathBuf>) {
        *self.roots.write() = roots.into_iter().map(|path| path.clean()).collect();
        self.invalidate();
    }

    pub fn invalidate(&self) {
        self.root_cache.lock().clear();
    }

    /// Narrowest declared root containing `entry_dir`, ties going to the
    /// shortest root path.
    pub fn root_for(&self, entry_dir: &Path) -> Option<PathBuf> {
        let entry_dir = entry_dir.to_path_buf().clean();
        if let Some(cached) = self.root_cache.lock().get(&entry_dir) {
            return cached.clone();
        }

        let root = self
            .roots
            .read()
            .iter()
            .filter(|root| entry_dir.starts_with(root))
            .max_by(|a, b| {
                let depth = a.components().count().cmp(&b.components().count());
                depth.then_with(|| b.as_os_str().len().cmp(&a.as_os_str().len()))
            })
            .cloned();

        self.root_cache.lock().insert(entry_dir, root.clone());
        root
    }

    /// Whether `candidate` is a strict descendant of the root governing
    /// `entry_dir`. Relative candidates are taken relative to `entry_dir`.
    /// Fails closed when no root contains `entry_dir`.
    pub fn is_inside_project(&self, entry_dir: &Path, candidate: &Path) -> bool {
        let Some(root) = self.root_for(entry_dir) else {
            tracing::debug!(entry_dir = %entry_dir.display(), "no project root contains entry dir");
            return false;
        };
        let candidate = if candidate.is_absolute() {
            candidate.to_path_buf().clean()
        } else {
            entry_dir.join(candidate).clean()
        };
        candidate != root && candidate.starts_with(&root)
    }
}
