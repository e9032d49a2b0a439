//! Content fetching.
//!
//! Turns a [`ModuleRequest`] into a [`ResolvedUnit`]: resolve, re-check the
//! boundary, read (edit buffer or disk), then transform by content kind.
//! [`ContentFetcher::fetch`] never fails to its caller; errors go to the
//! surface and the result is `None`.

pub mod script;
mod style;

use glimpse_config::UpdateMode;
use indexmap::IndexSet;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

use crate::error::{PreviewError, Result};
use crate::markup::{LoadedPlugin, MarkupCompiler};
use crate::resolver::{BUILTIN_STUB, ModuleRequest, ModuleResolver, ResolvedModule};
use crate::runtime::{DocumentBuffers, Runtime};
use crate::surface::PreviewSurface;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ContentKind {
    Script,
    Style,
    Data,
    Image,
    Markup,
}

impl ContentKind {
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "css" => ContentKind::Style,
            "json" => ContentKind::Data,
            "png" | "jpg" | "jpeg" | "gif" | "svg" | "webp" | "avif" | "ico" | "bmp" => {
                ContentKind::Image
            }
            "md" | "mdx" | "markdown" => ContentKind::Markup,
            _ => ContentKind::Script,
        }
    }
}

/// One fetched module, ready for the surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedUnit {
    pub resolved_path: String,
    pub content_kind: ContentKind,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style_text: Option<String>,
    pub local_dependencies: IndexSet<String>,
}

impl ResolvedUnit {
    fn new(path: &Path, kind: ContentKind, code: String) -> Self {
        Self {
            resolved_path: path.display().to_string(),
            content_kind: kind,
            code,
            style_text: None,
            local_dependencies: IndexSet::new(),
        }
    }
}

/// The preview a fetch is performed for.
pub trait FetchTarget: Send + Sync {
    /// Directory of the session's entry document. Boundary checks anchor here,
    /// never on the importer a request names.
    fn entry_dir(&self) -> &Path;

    fn update_mode(&self) -> UpdateMode;

    fn surface(&self) -> Option<Arc<dyn PreviewSurface>>;

    /// Plugins for markup modules pulled in as dependencies.
    fn plugins(&self) -> Vec<LoadedPlugin>;

    /// Record a local file for change tracking. Returns true when new.
    fn add_dependent_path(&self, path: &Path) -> bool;

    /// Include stack traces in error payloads.
    fn development(&self) -> bool;
}

#[derive(Debug)]
pub struct ContentFetcher {
    resolver: Arc<ModuleResolver>,
    runtime: Arc<dyn Runtime>,
    buffers: Arc<DocumentBuffers>,
    compiler: Arc<dyn MarkupCompiler>,
}

impl ContentFetcher {
    pub fn new(
        resolver: Arc<ModuleResolver>,
        runtime: Arc<dyn Runtime>,
        buffers: Arc<DocumentBuffers>,
        compiler: Arc<dyn MarkupCompiler>,
    ) -> Self {
        Self {
            resolver,
            runtime,
            buffers,
            compiler,
        }
    }

    pub fn resolver(&self) -> &Arc<ModuleResolver> {
        &self.resolver
    }

    pub async fn fetch(&self, request: &ModuleRequest, target: &dyn FetchTarget) -> Option<ResolvedUnit> {
        match self.try_fetch(request, target).await {
            Ok(unit) => Some(unit),
            Err(err) => {
                if err.is_security_relevant() {
                    tracing::warn!(
                        specifier = %request.specifier,
                        parent = %request.parent_path.display(),
                        error = %err,
                        "fetch denied"
                    );
                } else {
                    tracing::error!(specifier = %request.specifier, error = %err, "fetch failed");
                }
                if let Some(surface) = target.surface() {
                    surface
                        .show_preview_error(&err.to_payload(target.development()))
                        .await;
                }
                None
            }
        }
    }

    pub async fn try_fetch(&self, request: &ModuleRequest, target: &dyn FetchTarget) -> Result<ResolvedUnit> {
        let entry_dir = target.entry_dir();
        let path = match self.resolver.resolve(request, entry_dir)? {
            ResolvedModule::File(path) => path,
            ResolvedModule::Builtin(name) => {
                return Ok(ResolvedUnit::new(
                    Path::new(&format!("builtin:{name}")),
                    ContentKind::Script,
                    BUILTIN_STUB.to_string(),
                ));
            }
        };

        if !self
            .resolver
            .boundary()
            .is_inside_project(entry_dir, &path)
        {
            tracing::warn!(path = %path.display(), "boundary re-check failed");
            return Err(PreviewError::PathAccessDenied { path });
        }
        target.add_dependent_path(&path);

        let kind = ContentKind::from_path(&path);
        tracing::debug!(path = %path.display(), kind = ?kind, "fetching");
        match kind {
            ContentKind::Image => {
                let surface = target.surface().ok_or(PreviewError::PreviewNotInitialized)?;
                let uri = surface
                    .webview_uri(&path)
                    .ok_or(PreviewError::PreviewNotInitialized)?;
                let code = format!("module.exports = {};", js_string(&uri));
                Ok(ResolvedUnit::new(&path, kind, code))
            }
            ContentKind::Data => {
                let text = self.read_source(&path, target.update_mode()).await?;
                serde_json::from_str::<serde_json::Value>(&text)
                    .map_err(|e| PreviewError::transform(&path, format!("invalid JSON: {e}")))?;
                Ok(ResolvedUnit::new(&path, kind, format!("module.exports = {};", text.trim())))
            }
            ContentKind::Style => {
                let text = self.read_source(&path, target.update_mode()).await?;
                let css = self.process_style(&path, text, target).await?;
                let mut unit = ResolvedUnit::new(&path, kind, String::new());
                unit.style_text = Some(css);
                Ok(unit)
            }
            ContentKind::Markup => {
                let text = self.read_source(&path, target.update_mode()).await?;
                let module = self.compiler.compile_module(&text, &path, &target.plugins())?;
                self.script_unit(&path, kind, &module)
            }
            ContentKind::Script => {
                let text = self.read_source(&path, target.update_mode()).await?;
                self.script_unit(&path, kind, &text)
            }
        }
    }

    fn script_unit(&self, path: &Path, kind: ContentKind, source: &str) -> Result<ResolvedUnit> {
        let transformed = script::transform(source, path)?;
        let mut unit = ResolvedUnit::new(path, kind, transformed.code);
        unit.local_dependencies = transformed.imports;
        Ok(unit)
    }

    /// Buffer text when the mode renders as-you-type and a buffer is open for
    /// exactly this path; disk otherwise.
    pub async fn read_source(&self, path: &Path, mode: UpdateMode) -> Result<String> {
        if mode == UpdateMode::OnType {
            if let Some(buffer) = self.buffers.get(path) {
                tracing::trace!(path = %path.display(), version = buffer.version, "reading edit buffer");
                return Ok(buffer.text);
            }
        }
        Ok(self.runtime.read_to_string(path).await?)
    }
}

fn js_string(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| "\"\"".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_extension() {
        assert_eq!(ContentKind::from_path(Path::new("a.CSS")), ContentKind::Style);
        assert_eq!(ContentKind::from_path(Path::new("a.json")), ContentKind::Data);
        assert_eq!(ContentKind::from_path(Path::new("a.svg")), ContentKind::Image);
        assert_eq!(ContentKind::from_path(Path::new("a.mdx")), ContentKind::Markup);
        assert_eq!(ContentKind::from_path(Path::new("a.tsx")), ContentKind::Script);
        assert_eq!(ContentKind::from_path(Path::new("Makefile")), ContentKind::Script);
    }

    #[test]
    fn unit_serializes_camel_case() {
        let unit = ResolvedUnit::new(Path::new("/p/a.js"), ContentKind::Script, "x".into());
        let json = serde_json::to_value(&unit).unwrap();
        assert_eq!(json["resolvedPath"], "/p/a.js");
        assert_eq!(json["contentKind"], "script");
        assert!(json.get("styleText").is_none());
    }
}
