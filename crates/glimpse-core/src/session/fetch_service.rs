//! The surface's single entry point for pulling modules.

use serde_json::Value;
use std::sync::Arc;

use super::shared::SessionShared;
use crate::document::DocumentRef;
use crate::error::{PreviewError, Result};
use crate::fetch::{ContentFetcher, FetchTarget, ResolvedUnit};
use crate::resolver::ModuleRequest;
use crate::trust::TrustGate;

pub const MAX_SPECIFIER_LEN: usize = 2048;

/// Package-registry pseudo-scheme accepted on fetch requests.
pub const PACKAGE_SCHEME: &str = "npm";

#[derive(Clone)]
pub struct FetchService {
    fetcher: Arc<ContentFetcher>,
    trust: Arc<TrustGate>,
    document: DocumentRef,
    shared: Arc<SessionShared>,
}

impl FetchService {
    pub fn new(
        fetcher: Arc<ContentFetcher>,
        trust: Arc<TrustGate>,
        document: DocumentRef,
        shared: Arc<SessionShared>,
    ) -> Self {
        Self {
            fetcher,
            trust,
            document,
            shared,
        }
    }

    /// Validate, trust-check, then fetch. Failures are reported to the
    /// surface and yield `None`.
    pub async fn fetch(&self, raw: &Value) -> Option<ResolvedUnit> {
        let request = match self.admit(raw) {
            Ok(request) => request,
            Err(err) => {
                if err.is_security_relevant() {
                    tracing::warn!(error = %err, "fetch refused");
                } else {
                    tracing::debug!(error = %err, "fetch rejected");
                }
                if let Some(surface) = self.shared.surface() {
                    surface
                        .show_preview_error(&err.to_payload(self.shared.development()))
                        .await;
                }
                return None;
            }
        };
        self.fetcher.fetch(&request, self.shared.as_ref()).await
    }

    fn admit(&self, raw: &Value) -> Result<ModuleRequest> {
        let request = validate_request(raw)?;
        let state = self.trust.state_for_document(&self.document);
        if !state.can_execute {
            return Err(PreviewError::TrustViolation {
                reason: state.reason.unwrap_or_else(|| "execution disabled".to_string()),
            });
        }
        Ok(request)
    }
}

/// Shape and content checks on a raw `{specifier, isBare, parentPath}` call.
pub fn validate_request(raw: &Value) -> Result<ModuleRequest> {
    let field = |name: &str| raw.get(name).unwrap_or(&Value::Null);
    let Value::String(specifier) = field("specifier") else {
        return Err(PreviewError::InvalidRequest("specifier must be a string".into()));
    };
    let Value::Bool(is_bare) = field("isBare") else {
        return Err(PreviewError::InvalidRequest("isBare must be a boolean".into()));
    };
    let Value::String(parent_path) = field("parentPath") else {
        return Err(PreviewError::InvalidRequest("parentPath must be a string".into()));
    };

    if specifier.is_empty() {
        return Err(PreviewError::InvalidRequest("specifier is empty".into()));
    }
    if specifier.contains('\0') || parent_path.contains('\0') {
        return Err(PreviewError::InvalidRequest("null byte in request".into()));
    }
    if specifier.chars().count() > MAX_SPECIFIER_LEN {
        return Err(PreviewError::InvalidRequest(format!(
            "specifier longer than {MAX_SPECIFIER_LEN} characters"
        )));
    }

    match url_scheme(specifier) {
        None => Ok(ModuleRequest::new(specifier.as_str(), parent_path.as_str(), *is_bare)),
        Some(PACKAGE_SCHEME) => {
            let package = &specifier[PACKAGE_SCHEME.len() + 1..];
            if package.is_empty() {
                return Err(PreviewError::InvalidRequest("empty package specifier".into()));
            }
            Ok(ModuleRequest::new(package, parent_path.as_str(), true))
        }
        Some(scheme) => Err(PreviewError::InvalidRequest(format!(
            "scheme '{scheme}' is not allowed"
        ))),
    }
}

/// `scheme` from `scheme:rest`; single letters are drive prefixes, not schemes.
fn url_scheme(specifier: &str) -> Option<&str> {
    let (scheme, _) = specifier.split_once(':')?;
    let mut chars = scheme.chars();
    let valid = scheme.len() > 1
        && chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    valid.then_some(scheme)
}
