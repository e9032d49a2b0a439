//! Rendering surface backed by Server-Sent Events.
//!
//! Every connected browser tab is a client of the same surface. Messages are
//! broadcast as JSON; clients whose channel closed are dropped on the next
//! broadcast.

use async_trait::async_trait;
use glimpse_core::{PreviewSurface, SurfaceMessage};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;

/// Route prefix for images minted by [`SseSurface::webview_uri`].
pub const ASSET_ROUTE: &str = "/__glimpse/asset";

/// Connected SSE clients.
pub type ClientRegistry = RwLock<HashMap<usize, mpsc::Sender<String>>>;

pub struct SseSurface {
    origin: String,
    clients: ClientRegistry,
    next_client_id: AtomicUsize,
}

impl SseSurface {
    /// `origin` is the server's own origin, e.g. `http://127.0.0.1:4317`.
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            clients: RwLock::new(HashMap::new()),
            next_client_id: AtomicUsize::new(0),
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Register a new SSE client.
    ///
    /// Returns the client id and the receiver its stream reads from.
    pub fn register_client(&self) -> (usize, mpsc::Receiver<String>) {
        let id = self.next_client_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(100);
        self.clients.write().insert(id, tx);
        (id, rx)
    }

    pub fn unregister_client(&self, id: usize) {
        self.clients.write().remove(&id);
    }

    pub fn client_count(&self) -> usize {
        self.clients.read().len()
    }

    /// Send `message` to every connected client.
    pub async fn broadcast(&self, message: &SurfaceMessage) {
        let json = match serde_json::to_string(message) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(kind = message.kind(), error = %e, "failed to encode surface message");
                return;
            }
        };

        let clients = self.clients.read().clone();
        let mut failed_ids = Vec::new();
        for (id, tx) in clients {
            if tx.send(json.clone()).await.is_err() {
                failed_ids.push(id);
            }
        }
        for id in failed_ids {
            tracing::debug!(client = id, "dropping disconnected client");
            self.unregister_client(id);
        }
    }
}

#[async_trait]
impl PreviewSurface for SseSurface {
    async fn post(&self, message: SurfaceMessage) {
        tracing::trace!(kind = message.kind(), clients = self.client_count(), "broadcast");
        self.broadcast(&message).await;
    }

    fn webview_uri(&self, path: &Path) -> Option<String> {
        let path = path.to_str()?;
        Some(format!(
            "{}{}/{}",
            self.origin.trim_end_matches('/'),
            ASSET_ROUTE,
            path.trim_start_matches('/')
        ))
    }
}

impl std::fmt::Debug for SseSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SseSurface")
            .field("origin", &self.origin)
            .field("clients", &self.client_count())
            .finish()
    }
}
