//! The rendering collaborator.
//!
//! A surface displays whatever the session sends it and pulls modules back
//! through [`crate::session::FetchService`]. Every outgoing call is a
//! [`SurfaceMessage`], so transports (SSE, recording for tests) only need
//! [`PreviewSurface::post`].

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ErrorPayload;
use crate::trust::TrustState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum SurfaceMessage {
    SetTrustState {
        project_trusted: bool,
        scripts_enabled: bool,
        can_execute: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    UpdatePreview {
        code: String,
        entry_path: String,
        dependencies: Vec<String>,
    },
    UpdatePreviewSafe {
        html: String,
    },
    ShowPreviewError {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stack: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },
    Invalidate {
        path: String,
    },
    SetStale {
        stale: bool,
    },
}

impl SurfaceMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            SurfaceMessage::SetTrustState { .. } => "setTrustState",
            SurfaceMessage::UpdatePreview { .. } => "updatePreview",
            SurfaceMessage::UpdatePreviewSafe { .. } => "updatePreviewSafe",
            SurfaceMessage::ShowPreviewError { .. } => "showPreviewError",
            SurfaceMessage::Invalidate { .. } => "invalidate",
            SurfaceMessage::SetStale { .. } => "setStale",
        }
    }
}

impl From<&TrustState> for SurfaceMessage {
    fn from(state: &TrustState) -> Self {
        SurfaceMessage::SetTrustState {
            project_trusted: state.project_trusted,
            scripts_enabled: state.scripts_enabled,
            can_execute: state.can_execute,
            reason: state.reason.clone(),
        }
    }
}

impl From<&ErrorPayload> for SurfaceMessage {
    fn from(error: &ErrorPayload) -> Self {
        SurfaceMessage::ShowPreviewError {
            message: error.message.clone(),
            stack: error.stack.clone(),
            code: error.code.clone(),
        }
    }
}

#[async_trait]
pub trait PreviewSurface: Send + Sync {
    async fn post(&self, message: SurfaceMessage);

    /// Mint a URI the surface can load `path` from. `None` until the surface
    /// exists.
    fn webview_uri(&self, path: &Path) -> Option<String>;

    async fn set_trust_state(&self, state: &TrustState) {
        self.post(state.into()).await;
    }

    async fn update_preview(&self, code: String, entry_path: &Path, dependencies: Vec<String>) {
        self.post(SurfaceMessage::UpdatePreview {
            code,
            entry_path: entry_path.display().to_string(),
            dependencies,
        })
        .await;
    }

    async fn update_preview_safe(&self, html: String) {
        self.post(SurfaceMessage::UpdatePreviewSafe { html }).await;
    }

    async fn show_preview_error(&self, error: &ErrorPayload) {
        self.post(error.into()).await;
    }

    async fn invalidate(&self, path: &Path) {
        self.post(SurfaceMessage::Invalidate {
            path: path.display().to_string(),
        })
        .await;
    }

    async fn set_stale(&self, stale: bool) {
        self.post(SurfaceMessage::SetStale { stale }).await;
    }
}

/// Surface that records every message. Used by `glimpse render` and tests.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    messages: Mutex<Vec<SurfaceMessage>>,
    uri_base: Option<String>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Surface that can mint URIs under `base`.
    pub fn with_uri_base(base: impl Into<String>) -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
            uri_base: Some(base.into()),
        }
    }

    pub fn messages(&self) -> Vec<SurfaceMessage> {
        self.messages.lock().clone()
    }

    pub fn take(&self) -> Vec<SurfaceMessage> {
        std::mem::take(&mut *self.messages.lock())
    }

    pub fn count(&self, kind: &str) -> usize {
        self.messages.lock().iter().filter(|m| m.kind() == kind).count()
    }

    pub fn last(&self, kind: &str) -> Option<SurfaceMessage> {
        self.messages
            .lock()
            .iter()
            .rev()
            .find(|m| m.kind() == kind)
            .cloned()
    }
}

#[async_trait]
impl PreviewSurface for RecordingSurface {
    async fn post(&self, message: SurfaceMessage) {
        tracing::trace!(kind = message.kind(), "surface message");
        self.messages.lock().push(message);
    }

    fn webview_uri(&self, path: &Path) -> Option<String> {
        let base = self.uri_base.as_ref()?;
        Some(format!("{}/{}", base.trim_end_matches('/'), path.display().to_string().trim_start_matches('/')))
    }
}
