//! Style sheet processing: `@import` inlining and `url()` rewriting.

use regex::Regex;
use rustc_hash::FxHashSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::LazyLock;

use super::{ContentFetcher, ContentKind, FetchTarget};
use crate::error::{PreviewError, Result};
use crate::resolver::{ModuleRequest, ResolvedModule};

const MAX_IMPORT_DEPTH: usize = 16;

static IMPORT_RULE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"@import\s+(?:url\(\s*)?["']?([^"')\s;]+)["']?\s*\)?[^;]*;"#)
        .expect("import pattern is valid")
});

static URL_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"url\(\s*["']?([^"')]+?)["']?\s*\)"#).expect("url pattern is valid")
});

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

fn is_external(target: &str) -> bool {
    target.contains("://")
        || target.starts_with("//")
        || target.starts_with("data:")
        || target.starts_with('#')
}

/// CSS references are relative unless they say otherwise; `~pkg` is a package.
fn to_request(target: &str, parent: &Path) -> ModuleRequest {
    if let Some(package) = target.strip_prefix('~') {
        return ModuleRequest::new(package, parent, true);
    }
    if target.starts_with("./") || target.starts_with("../") || target.starts_with('/') {
        return ModuleRequest::new(target, parent, false);
    }
    ModuleRequest::new(format!("./{target}"), parent, false)
}

impl ContentFetcher {
    pub(super) async fn process_style(
        &self,
        path: &Path,
        text: String,
        target: &dyn FetchTarget,
    ) -> Result<String> {
        let mut seen = FxHashSet::default();
        seen.insert(path.to_path_buf());
        let inlined = self.inline_imports(path, text, target, 0, &mut seen).await?;
        self.rewrite_urls(path, &inlined, target)
    }

    fn inline_imports<'a>(
        &'a self,
        path: &'a Path,
        text: String,
        target: &'a dyn FetchTarget,
        depth: usize,
        seen: &'a mut FxHashSet<PathBuf>,
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            if depth >= MAX_IMPORT_DEPTH {
                return Err(PreviewError::transform(path, "style imports nested too deeply"));
            }
            let rules: Vec<(std::ops::Range<usize>, String)> = IMPORT_RULE
                .captures_iter(&text)
                .filter_map(|caps| Some((caps.get(0)?.range(), caps.get(1)?.as_str().to_string())))
                .collect();
            if rules.is_empty() {
                return Ok(text);
            }

            let mut out = String::with_capacity(text.len());
            let mut cursor = 0;
            for (range, reference) in rules {
                out.push_str(&text[cursor..range.start]);
                cursor = range.end;
                if is_external(&reference) {
                    out.push_str(&text[range]);
                    continue;
                }
                let imported = match self.resolve_style_ref(&reference, path, target)? {
                    Some(imported) => imported,
                    None => {
                        out.push_str(&text[range]);
                        continue;
                    }
                };
                target.add_dependent_path(&imported);
                if !seen.insert(imported.clone()) {
                    tracing::debug!(path = %imported.display(), "style import cycle skipped");
                    continue;
                }
                let nested = self.read_source(&imported, target.update_mode()).await?;
                let nested = self
                    .inline_imports(&imported, nested, target, depth + 1, seen)
                    .await?;
                out.push_str(&nested);
            }
            out.push_str(&text[cursor..]);
            Ok(out)
        })
    }

    fn rewrite_urls(&self, path: &Path, text: &str, target: &dyn FetchTarget) -> Result<String> {
        let mut out = String::with_capacity(text.len());
        let mut cursor = 0;
        for caps in URL_REF.captures_iter(text) {
            let (Some(whole), Some(reference)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let reference = reference.as_str().trim();
            if is_external(reference) {
                continue;
            }
            let Some(resolved) = self.resolve_style_ref(reference, path, target)? else {
                continue;
            };
            if ContentKind::from_path(&resolved) == ContentKind::Style {
                continue;
            }
            let surface = target.surface().ok_or(PreviewError::PreviewNotInitialized)?;
            let uri = surface
                .webview_uri(&resolved)
                .ok_or(PreviewError::PreviewNotInitialized)?;
            out.push_str(&text[cursor..whole.start()]);
            out.push_str(&format!("url(\"{uri}\")"));
            cursor = whole.end();
        }
        out.push_str(&text[cursor..]);
        Ok(out)
    }

    /// `Ok(None)` for references that do not resolve; boundary denials propagate.
    fn resolve_style_ref(
        &self,
        reference: &str,
        parent: &Path,
        target: &dyn FetchTarget,
    ) -> Result<Option<PathBuf>> {
        match self.resolver.resolve(&to_request(reference, parent), target.entry_dir()) {
            Ok(ResolvedModule::File(path)) => Ok(Some(path)),
            Ok(ResolvedModule::Builtin(_)) => Ok(None),
            Err(err) if err.is_security_relevant() => Err(err),
            Err(err) => {
                tracing::debug!(reference, error = %err, "style reference left as-is");
                Ok(None)
            }
        }
    }
}
