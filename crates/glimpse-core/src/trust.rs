//! Execution trust.
//!
//! [`TrustGate`] answers one question: may this document run code? It reads
//! the host's trust inputs through [`TrustSource`] on every query and keeps no
//! cached state apart from its listener list.

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use crate::disposable::Disposable;
use crate::document::DocumentRef;

/// Host-provided trust inputs.
pub trait TrustSource: Send + Sync {
    /// The user vetted the opened project as safe to run code from.
    fn is_workspace_trusted(&self) -> bool;

    /// The user enabled document script execution.
    fn scripts_enabled(&self) -> bool;

    /// Name of the remote or virtual context the host is running in, if any.
    fn remote_name(&self) -> Option<String> {
        None
    }
}

/// A [`TrustSource`] whose inputs are set directly by the host.
#[derive(Debug, Default)]
pub struct HostTrust {
    workspace_trusted: AtomicBool,
    scripts_enabled: AtomicBool,
    remote_name: RwLock<Option<String>>,
}

impl HostTrust {
    pub fn new(workspace_trusted: bool, scripts_enabled: bool) -> Self {
        Self {
            workspace_trusted: AtomicBool::new(workspace_trusted),
            scripts_enabled: AtomicBool::new(scripts_enabled),
            remote_name: RwLock::new(None),
        }
    }

    /// Returns true when the value changed.
    pub fn set_workspace_trusted(&self, trusted: bool) -> bool {
        self.workspace_trusted.swap(trusted, Ordering::SeqCst) != trusted
    }

    /// Returns true when the value changed.
    pub fn set_scripts_enabled(&self, enabled: bool) -> bool {
        self.scripts_enabled.swap(enabled, Ordering::SeqCst) != enabled
    }

    pub fn set_remote_name(&self, name: Option<String>) {
        *self.remote_name.write() = name;
    }
}

impl TrustSource for HostTrust {
    fn is_workspace_trusted(&self) -> bool {
        self.workspace_trusted.load(Ordering::SeqCst)
    }

    fn scripts_enabled(&self) -> bool {
        self.scripts_enabled.load(Ordering::SeqCst)
    }

    fn remote_name(&self) -> Option<String> {
        self.remote_name.read().clone()
    }
}

/// Snapshot of the trust decision. Never cached across trust events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustState {
    pub project_trusted: bool,
    pub scripts_enabled: bool,
    pub can_execute: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl TrustState {
    pub fn mode(&self) -> SecurityMode {
        if self.can_execute {
            SecurityMode::Trusted
        } else {
            SecurityMode::Safe
        }
    }

    fn denied(project_trusted: bool, scripts_enabled: bool, reason: impl Into<String>) -> Self {
        Self {
            project_trusted,
            scripts_enabled,
            can_execute: false,
            reason: Some(reason.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SecurityMode {
    /// Static markup only.
    Safe,
    /// Document code and its local imports execute.
    Trusted,
}

type Listener = Arc<dyn Fn(&TrustState) + Send + Sync>;
type ListenerList = Mutex<Vec<(u64, Listener)>>;

pub struct TrustGate {
    source: Arc<dyn TrustSource>,
    listeners: Arc<ListenerList>,
    next_id: AtomicU64,
}

impl TrustGate {
    pub fn new(source: Arc<dyn TrustSource>) -> Self {
        Self {
            source,
            listeners: Arc::new(Mutex::new(Vec::new())),
            next_id: AtomicU64::new(0),
        }
    }

    /// Base state from the two host inputs.
    pub fn state(&self) -> TrustState {
        let project_trusted = self.source.is_workspace_trusted();
        let scripts_enabled = self.source.scripts_enabled();
        if !project_trusted {
            return TrustState::denied(project_trusted, scripts_enabled, "workspace not trusted");
        }
        if !scripts_enabled {
            return TrustState::denied(project_trusted, scripts_enabled, "scripts not enabled");
        }
        TrustState {
            project_trusted,
            scripts_enabled,
            can_execute: true,
            reason: None,
        }
    }

    /// Base state plus the per-document eligibility rules.
    ///
    /// A remote context is checked before the document scheme, so an untitled
    /// buffer in a remote session cannot execute.
    pub fn state_for_document(&self, document: &DocumentRef) -> TrustState {
        let state = self.state();
        if !state.can_execute {
            return state;
        }
        if let Some(remote) = self.source.remote_name() {
            return TrustState::denied(
                state.project_trusted,
                state.scripts_enabled,
                format!("remote context '{remote}' cannot execute scripts"),
            );
        }
        if !document.scheme.is_local() {
            return TrustState::denied(
                state.project_trusted,
                state.scripts_enabled,
                format!("documents with scheme '{}' cannot execute scripts", document.scheme),
            );
        }
        state
    }

    /// Register a listener for trust-affecting events.
    pub fn subscribe(&self, listener: impl Fn(&TrustState) + Send + Sync + 'static) -> Disposable {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().push((id, Arc::new(listener)));
        let listeners: Weak<ListenerList> = Arc::downgrade(&self.listeners);
        Disposable::new(move || {
            if let Some(listeners) = listeners.upgrade() {
                listeners.lock().retain(|(existing, _)| *existing != id);
            }
        })
    }

    /// Notify every listener with a freshly computed base state.
    ///
    /// The host calls this on grant/revoke of project trust and when the
    /// execution setting changes. A panicking listener is logged and skipped.
    pub fn trust_changed(&self) {
        let state = self.state();
        tracing::info!(
            can_execute = state.can_execute,
            reason = state.reason.as_deref().unwrap_or(""),
            "trust state changed"
        );
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(&state))).is_err() {
                tracing::error!("trust listener panicked");
            }
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }
}

impl std::fmt::Debug for TrustGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrustGate")
            .field("state", &self.state())
            .field("listeners", &self.listener_count())
            .finish()
    }
}
