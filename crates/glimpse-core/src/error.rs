//! Error taxonomy for the preview pipeline.

use serde::Serialize;
use std::error::Error as _;
use std::path::PathBuf;
use std::time::Duration;

use crate::runtime::RuntimeError;

pub type Result<T> = std::result::Result<T, PreviewError>;

#[derive(Debug, thiserror::Error)]
pub enum PreviewError {
    #[error("Cannot find module '{specifier}' from '{}'", from.display())]
    ModuleNotFound { specifier: String, from: PathBuf },

    /// Resolved path escapes the project boundary.
    #[error("Access denied: {} is outside the project", path.display())]
    PathAccessDenied { path: PathBuf },

    #[error("Failed to transform {}: {message}", path.display())]
    TransformFailure { path: PathBuf, message: String },

    #[error("Preview surface did not initialize within {}ms", .0.as_millis())]
    HandshakeTimeout(Duration),

    /// An execution-only operation was attempted while the document cannot execute.
    #[error("Execution is disabled: {reason}")]
    TrustViolation { reason: String },

    #[error("Preview surface is not initialized")]
    PreviewNotInitialized,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Io(#[from] RuntimeError),
}

/// Error shape handed to the rendering surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorPayload {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ErrorPayload {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: None,
            code: None,
        }
    }
}

impl PreviewError {
    pub fn transform(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        PreviewError::TransformFailure {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            PreviewError::ModuleNotFound { .. } => "module-not-found",
            PreviewError::PathAccessDenied { .. } => "path-access-denied",
            PreviewError::TransformFailure { .. } => "transform-failure",
            PreviewError::HandshakeTimeout(_) => "handshake-timeout",
            PreviewError::TrustViolation { .. } => "trust-violation",
            PreviewError::PreviewNotInitialized => "preview-not-initialized",
            PreviewError::InvalidRequest(_) => "invalid-request",
            PreviewError::Io(_) => "io",
        }
    }

    /// Boundary and trust denials. Always logged, never retried.
    pub fn is_security_relevant(&self) -> bool {
        matches!(
            self,
            PreviewError::PathAccessDenied { .. } | PreviewError::TrustViolation { .. }
        )
    }

    /// Build the surface payload.
    ///
    /// Security-relevant denials get a fixed message with no path and no stack.
    /// Everything else carries its own message, plus the source chain when
    /// `include_stack` is set.
    pub fn to_payload(&self, include_stack: bool) -> ErrorPayload {
        let code = Some(self.code().to_string());
        match self {
            PreviewError::PathAccessDenied { .. } => ErrorPayload {
                message: "Access to a file outside the project was blocked.".to_string(),
                stack: None,
                code,
            },
            PreviewError::TrustViolation { reason } => ErrorPayload {
                message: format!("Scripts are disabled for this document ({reason})."),
                stack: None,
                code,
            },
            _ => ErrorPayload {
                message: self.to_string(),
                stack: include_stack.then(|| self.chain()),
                code,
            },
        }
    }

    fn chain(&self) -> String {
        let mut lines = vec![format!("{self:?}")];
        let mut source = self.source();
        while let Some(err) = source {
            lines.push(format!("caused by: {err}"));
            source = err.source();
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_payload_does_not_leak_path() {
        let err = PreviewError::PathAccessDenied {
            path: PathBuf::from("/etc/passwd"),
        };
        let payload = err.to_payload(true);
        assert!(!payload.message.contains("passwd"));
        assert!(payload.stack.is_none());
        assert_eq!(payload.code.as_deref(), Some("path-access-denied"));
    }

    #[test]
    fn stack_only_in_development() {
        let err = PreviewError::transform("/proj/a.ts", "unexpected token");
        assert!(err.to_payload(false).stack.is_none());
        let payload = err.to_payload(true);
        assert!(payload.message.contains("unexpected token"));
        assert!(payload.stack.is_some());
    }

    #[test]
    fn payload_serializes_without_empty_fields() {
        let json = serde_json::to_value(ErrorPayload::message("boom")).unwrap();
        assert_eq!(json, serde_json::json!({"message": "boom"}));
    }
}
