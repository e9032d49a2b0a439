//! Import specifier resolution.
//!
//! Layered: the nearest type config (`tsconfig.json`/`jsconfig.json`) gets the
//! first attempt unless the importer lives in `node_modules`; generic package
//! resolution (`exports` > `browser` > `module` > `main`) is the fallback.
//! Containment is always judged against the boundary root of the session's
//! entry directory: the importing file must sit inside it, and so must every
//! resolved path before it is returned.

pub mod builtins;
pub mod tsconfig;

use oxc_resolver::{ResolveOptions, Resolver};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::boundary::PathBoundary;
use crate::error::{PreviewError, Result};

pub use builtins::{BUILTIN_STUB, is_builtin};
pub use tsconfig::{TypeConfig, TypeConfigCache, is_declaration};

/// Extensions tried by package resolution, in order.
pub const RESOLVE_EXTENSIONS: [&str; 10] = [
    ".tsx", ".ts", ".jsx", ".js", ".mjs", ".cjs", ".mdx", ".md", ".json", ".css",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleRequest {
    pub specifier: String,
    /// The importing file.
    pub parent_path: PathBuf,
    pub is_bare: bool,
}

impl ModuleRequest {
    pub fn new(specifier: impl Into<String>, parent_path: impl Into<PathBuf>, is_bare: bool) -> Self {
        Self {
            specifier: specifier.into(),
            parent_path: parent_path.into(),
            is_bare,
        }
    }

    /// Classify `specifier` as bare when it is neither relative nor absolute.
    pub fn infer(specifier: impl Into<String>, parent_path: impl Into<PathBuf>) -> Self {
        let specifier = specifier.into();
        let is_bare = is_bare_specifier(&specifier);
        Self::new(specifier, parent_path, is_bare)
    }

    pub fn parent_dir(&self) -> &Path {
        self.parent_path.parent().unwrap_or(&self.parent_path)
    }
}

pub fn is_bare_specifier(specifier: &str) -> bool {
    !(specifier.starts_with("./")
        || specifier.starts_with("../")
        || specifier == "."
        || specifier == ".."
        || Path::new(specifier).is_absolute())
}

/// Whether `path` sits inside a vendored-dependency directory.
pub fn is_vendored(path: &Path) -> bool {
    path.components()
        .any(|c| matches!(c, Component::Normal(name) if name == "node_modules"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedModule {
    File(PathBuf),
    /// A platform built-in, served as [`BUILTIN_STUB`].
    Builtin(String),
}

impl ResolvedModule {
    pub fn file(&self) -> Option<&Path> {
        match self {
            ResolvedModule::File(path) => Some(path),
            ResolvedModule::Builtin(_) => None,
        }
    }
}

pub struct ModuleResolver {
    boundary: Arc<PathBoundary>,
    options: ResolveOptions,
    type_configs: TypeConfigCache,
    packages: Resolver,
}

impl ModuleResolver {
    pub fn new(boundary: Arc<PathBoundary>) -> Self {
        let options = ResolveOptions {
            extensions: RESOLVE_EXTENSIONS.iter().map(|ext| ext.to_string()).collect(),
            main_fields: vec!["browser".into(), "module".into(), "main".into()],
            alias_fields: vec![vec!["browser".into()]],
            condition_names: vec![
                "browser".into(),
                "import".into(),
                "module".into(),
                "default".into(),
            ],
            main_files: vec!["index".into()],
            ..Default::default()
        };
        Self {
            boundary,
            packages: Resolver::new(options.clone()),
            options,
            type_configs: TypeConfigCache::new(),
        }
    }

    pub fn boundary(&self) -> &Arc<PathBoundary> {
        &self.boundary
    }

    /// Resolve `request` for the session whose entry document lives in
    /// `entry_dir`.
    pub fn resolve(&self, request: &ModuleRequest, entry_dir: &Path) -> Result<ResolvedModule> {
        let specifier = request.specifier.as_str();
        if !self.boundary.is_inside_project(entry_dir, &request.parent_path) {
            tracing::warn!(
                specifier,
                parent = %request.parent_path.display(),
                "importer is outside the project boundary"
            );
            return Err(PreviewError::PathAccessDenied {
                path: request.parent_path.clone(),
            });
        }
        if (request.is_bare && is_builtin(specifier)) || specifier.starts_with("node:") {
            tracing::trace!(specifier, "built-in module stubbed");
            return Ok(ResolvedModule::Builtin(specifier.to_string()));
        }

        let from_dir = request.parent_dir();
        let resolved = self.resolve_path(specifier, from_dir, entry_dir, &request.parent_path)?;

        if !self.boundary.is_inside_project(entry_dir, &resolved) {
            if is_builtin(specifier) {
                tracing::debug!(specifier, "built-in resolved outside project, stubbed");
                return Ok(ResolvedModule::Builtin(specifier.to_string()));
            }
            tracing::warn!(
                specifier,
                path = %resolved.display(),
                "resolved module is outside the project boundary"
            );
            return Err(PreviewError::PathAccessDenied { path: resolved });
        }

        tracing::trace!(specifier, path = %resolved.display(), "resolved");
        Ok(ResolvedModule::File(resolved))
    }

    fn resolve_path(&self, specifier: &str, from_dir: &Path, entry_dir: &Path, parent: &Path) -> Result<PathBuf> {
        if !is_vendored(from_dir) {
            let stop_at = self.boundary.root_for(entry_dir);
            if let Some(config) = self.type_configs.for_dir(from_dir, stop_at.as_deref(), &self.options) {
                if let Some(hit) = config.resolve(specifier, from_dir) {
                    tracing::trace!(
                        specifier,
                        config = %config.path().display(),
                        "resolved through type config"
                    );
                    return Ok(hit);
                }
            }
        }

        self.packages
            .resolve(from_dir, specifier)
            .map(|resolution| resolution.path().to_path_buf())
            .map_err(|err| {
                tracing::debug!(specifier, error = ?err, "package resolution failed");
                PreviewError::ModuleNotFound {
                    specifier: specifier.to_string(),
                    from: parent.to_path_buf(),
                }
            })
    }

    /// Drop cached type configs and package metadata.
    pub fn invalidate(&self) {
        self.type_configs.invalidate();
        self.packages.clear_cache();
    }
}

impl std::fmt::Debug for ModuleResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleResolver")
            .field("roots", &self.boundary.roots())
            .finish_non_exhaustive()
    }
}
