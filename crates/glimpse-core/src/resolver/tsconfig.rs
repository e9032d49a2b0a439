//! Type-config aware resolution (`tsconfig.json` / `jsconfig.json`).
//!
//! Each discovered config gets its own `oxc_resolver` instance, which takes
//! care of `baseUrl`, `paths`, `extends` (relative files and packages) and
//! project `references`. A hit on a declaration-only file counts as a miss so
//! the caller falls through to package resolution.

#![allow(clippy::disallowed_methods)]

use oxc_resolver::{ResolveOptions, Resolver, TsconfigDiscovery, TsconfigOptions, TsconfigReferences};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const CONFIG_NAMES: [&str; 2] = ["tsconfig.json", "jsconfig.json"];

pub fn is_declaration(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    name.ends_with(".d.ts") || name.ends_with(".d.mts") || name.ends_with(".d.cts")
}

/// `./util.js` written against `util.ts`.
fn script_extension_alias() -> Vec<(String, Vec<String>)> {
    [
        (".js", &[".ts", ".tsx", ".js"][..]),
        (".jsx", &[".tsx", ".jsx"][..]),
        (".mjs", &[".mts", ".mjs"][..]),
        (".cjs", &[".cts", ".cjs"][..]),
    ]
    .into_iter()
    .map(|(from, to)| (from.to_string(), to.iter().map(|ext| ext.to_string()).collect()))
    .collect()
}

pub struct TypeConfig {
    path: PathBuf,
    resolver: Resolver,
}

impl TypeConfig {
    /// Resolver for the config at `path`, layered over the package options.
    ///
    /// Manual configs are cached at the root of a resolver's cache, so every
    /// config gets a resolver (and cache) of its own.
    pub fn new(path: &Path, base: &ResolveOptions) -> Self {
        let resolver = Resolver::new(ResolveOptions {
            tsconfig: Some(TsconfigDiscovery::Manual(TsconfigOptions {
                config_file: path.to_path_buf(),
                references: TsconfigReferences::Auto,
            })),
            extension_alias: script_extension_alias(),
            ..base.clone()
        });
        Self {
            path: path.to_path_buf(),
            resolver,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Resolve `specifier` from `from_dir`. `None` means "not handled here".
    pub fn resolve(&self, specifier: &str, from_dir: &Path) -> Option<PathBuf> {
        match self.resolver.resolve(from_dir, specifier) {
            Ok(resolution) => {
                let hit = resolution.into_path_buf();
                if is_declaration(&hit) {
                    tracing::trace!(path = %hit.display(), "declaration-only hit treated as miss");
                    return None;
                }
                Some(hit)
            }
            Err(err) => {
                tracing::trace!(specifier, config = %self.path.display(), error = %err, "type config miss");
                None
            }
        }
    }

    pub fn clear_cache(&self) {
        self.resolver.clear_cache();
    }
}

impl std::fmt::Debug for TypeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeConfig").field("path", &self.path).finish_non_exhaustive()
    }
}

/// Nearest type config per directory, cached until invalidated.
#[derive(Debug, Default)]
pub struct TypeConfigCache {
    by_dir: Mutex<FxHashMap<PathBuf, Option<Arc<TypeConfig>>>>,
    by_config: Mutex<FxHashMap<PathBuf, Arc<TypeConfig>>>,
}

impl TypeConfigCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Walk up from `dir` looking for a config, never past `stop_at`.
    pub fn for_dir(&self, dir: &Path, stop_at: Option<&Path>, base: &ResolveOptions) -> Option<Arc<TypeConfig>> {
        if let Some(cached) = self.by_dir.lock().get(dir) {
            return cached.clone();
        }

        let found = nearest_config(dir, stop_at).map(|path| {
            self.by_config
                .lock()
                .entry(path.clone())
                .or_insert_with(|| {
                    tracing::debug!(config = %path.display(), "type config discovered");
                    Arc::new(TypeConfig::new(&path, base))
                })
                .clone()
        });

        self.by_dir.lock().insert(dir.to_path_buf(), found.clone());
        found
    }

    /// Called when a type config file changes on disk.
    pub fn invalidate(&self) {
        self.by_dir.lock().clear();
        self.by_config.lock().clear();
    }
}

fn nearest_config(dir: &Path, stop_at: Option<&Path>) -> Option<PathBuf> {
    for candidate_dir in dir.ancestors() {
        if let Some(path) = CONFIG_NAMES
            .iter()
            .map(|name| candidate_dir.join(name))
            .find(|path| path.is_file())
        {
            return Some(path);
        }
        if stop_at.is_some_and(|stop| candidate_dir == stop) {
            break;
        }
    }
    None
}
