//! Preview session: version tracking, staleness and the update-mode policy.
//!
//! A session is one event-loop task ([`PreviewSession::run`]) fed through a
//! [`SessionHandle`]. Every mutation of versions, staleness and the watch set
//! happens on that task, so render passes never overlap. The surface's
//! handshake and module fetches go through [`SessionShared`] and
//! [`FetchService`] instead, since a render pass waits on them.

mod debounce;
mod fetch_service;
mod shared;

pub use debounce::Debouncer;
pub use fetch_service::{FetchService, MAX_SPECIFIER_LEN, PACKAGE_SCHEME, validate_request};
pub use shared::{SessionShared, SessionStatus};

use glimpse_config::{PreviewSettings, UpdateMode};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

use crate::context::PreviewContext;
use crate::disposable::Disposable;
use crate::document::{DocumentRef, DocumentScheme};
use crate::error::{PreviewError, Result};
use crate::fetch::{FetchTarget, script};
use crate::surface::PreviewSurface;
use crate::trust::{SecurityMode, TrustState};
use crate::watcher::{DependencyWatcher, FileChange};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Buffer text changed. The text itself lives in `DocumentBuffers`.
    Edit { path: PathBuf, version: i64 },
    Save { path: PathBuf },
    /// Reported by a dependency watch (or the host's own watch of the entry).
    FileChanged(FileChange),
    TrustChanged,
    /// Forced render, e.g. after a surface (re)attaches.
    Refresh,
    Close,
}

/// Cloneable front door to a running session.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<SessionEvent>,
    shared: Arc<SessionShared>,
    ctx: PreviewContext,
    fetch: FetchService,
}

impl SessionHandle {
    /// Record new buffer text and notify the session.
    ///
    /// Returns false when `version` is older than the buffer already held.
    pub fn edit(&self, path: impl AsRef<Path>, text: impl Into<String>, version: i64) -> bool {
        let path = path.as_ref();
        if !self.ctx.buffers.update(path, text, version) {
            tracing::trace!(path = %path.display(), version, "out-of-order edit ignored");
            return false;
        }
        self.send(SessionEvent::Edit {
            path: path.to_path_buf(),
            version,
        })
    }

    pub fn save(&self, path: impl Into<PathBuf>) -> bool {
        self.send(SessionEvent::Save { path: path.into() })
    }

    pub fn file_changed(&self, change: FileChange) -> bool {
        self.send(SessionEvent::FileChanged(change))
    }

    pub fn refresh(&self) -> bool {
        self.send(SessionEvent::Refresh)
    }

    /// Attach a surface and request a render; the render waits for its
    /// handshake.
    pub fn attach_surface(&self, surface: Arc<dyn PreviewSurface>) {
        self.shared.attach_surface(surface);
        self.refresh();
    }

    pub fn detach_surface(&self) {
        self.shared.detach_surface();
    }

    pub fn handshake(&self) {
        self.shared.handshake();
    }

    pub fn close(&self) -> bool {
        self.send(SessionEvent::Close)
    }

    pub fn status(&self) -> SessionStatus {
        self.shared.status()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SessionStatus> {
        self.shared.subscribe_status()
    }

    pub fn fetch_service(&self) -> &FetchService {
        &self.fetch
    }

    pub fn shared(&self) -> &Arc<SessionShared> {
        &self.shared
    }

    fn send(&self, event: SessionEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("shared", &self.shared)
            .finish_non_exhaustive()
    }
}

pub struct PreviewSession {
    ctx: PreviewContext,
    document: DocumentRef,
    shared: Arc<SessionShared>,
    events: mpsc::UnboundedReceiver<SessionEvent>,
    settings_rx: Option<watch::Receiver<PreviewSettings>>,
    watcher: DependencyWatcher,
    debounce: Debouncer,
    trust_subscription: Option<Disposable>,
    status: SessionStatus,
    last_trust: Option<TrustState>,
}

impl PreviewSession {
    pub fn open(ctx: PreviewContext, document: DocumentRef) -> (PreviewSession, SessionHandle) {
        let settings = ctx.settings.current();
        let shared = Arc::new(SessionShared::new(document.path().to_path_buf(), settings.clone()));
        let (tx, events) = mpsc::unbounded_channel();

        // Callbacks hold weak senders so dropping every handle ends the loop.
        let watch_tx = tx.downgrade();
        let watcher = DependencyWatcher::new(
            ctx.watch_factory.clone(),
            document.base_dir(),
            Arc::new(move |change| {
                if let Some(tx) = watch_tx.upgrade() {
                    let _ = tx.send(SessionEvent::FileChanged(change));
                }
            }),
        );
        let trust_tx = tx.downgrade();
        let trust_subscription = ctx.trust.subscribe(move |_| {
            if let Some(tx) = trust_tx.upgrade() {
                let _ = tx.send(SessionEvent::TrustChanged);
            }
        });

        let fetch = FetchService::new(
            ctx.fetcher.clone(),
            ctx.trust.clone(),
            document.clone(),
            shared.clone(),
        );
        let handle = SessionHandle {
            tx,
            shared: shared.clone(),
            ctx: ctx.clone(),
            fetch,
        };
        tracing::debug!(document = %document.path().display(), scheme = %document.scheme, "preview session opened");

        let session = PreviewSession {
            settings_rx: Some(ctx.settings.subscribe()),
            debounce: Debouncer::new(Duration::from_millis(settings.debounce_ms)),
            ctx,
            document,
            shared,
            events,
            watcher,
            trust_subscription: Some(trust_subscription),
            status: SessionStatus::default(),
            last_trust: None,
        };
        (session, handle)
    }

    /// Open and spawn on the current tokio runtime.
    pub fn spawn(ctx: PreviewContext, document: DocumentRef) -> (SessionHandle, tokio::task::JoinHandle<()>) {
        let (session, handle) = Self::open(ctx, document);
        (handle, tokio::spawn(session.run()))
    }

    /// Drive the session until closed. The first render comes from the
    /// refresh queued by [`SessionHandle::attach_surface`].
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                event = self.events.recv() => match event {
                    None | Some(SessionEvent::Close) => break,
                    Some(event) => self.handle(event).await,
                },
                () = self.debounce.fired() => self.render(false).await,
                () = self.shared.dependents_changed() => self.sync_watches(),
                changed = settings_changed(&mut self.settings_rx) => match changed {
                    Some(settings) => self.apply_settings(settings).await,
                    None => self.settings_rx = None,
                },
            }
        }
        self.dispose();
    }

    async fn handle(&mut self, event: SessionEvent) {
        tracing::trace!(?event, "session event");
        match event {
            SessionEvent::Edit { path, version } => self.on_edit(&path, version).await,
            SessionEvent::Save { path } => self.on_save(&path).await,
            SessionEvent::FileChanged(FileChange::Modified(path)) => {
                if self.shared.is_dependent(&path) {
                    self.bump_version();
                }
                self.on_save(&path).await;
            }
            SessionEvent::FileChanged(FileChange::Removed(path)) => {
                self.watcher.handle_removed(&path);
                if self.shared.is_dependent(&path) {
                    self.bump_version();
                }
                self.on_save(&path).await;
            }
            SessionEvent::TrustChanged | SessionEvent::Refresh => self.render(true).await,
            SessionEvent::Close => {}
        }
    }

    async fn on_edit(&mut self, path: &Path, version: i64) {
        if !self.shared.is_dependent(path) {
            return;
        }
        self.bump_version();
        tracing::debug!(path = %path.display(), version, revision = self.status.current_version, "edit observed");
        self.mark_stale().await;
        if self.shared.update_mode() == UpdateMode::OnType {
            self.invalidate_dependency(path).await;
            self.debounce.schedule();
        }
    }

    async fn on_save(&mut self, path: &Path) {
        if !self.shared.is_dependent(path) {
            return;
        }
        if self.shared.update_mode() == UpdateMode::Manual {
            self.mark_stale().await;
            return;
        }
        self.invalidate_dependency(path).await;
        self.render(false).await;
    }

    async fn invalidate_dependency(&self, path: &Path) {
        if path == self.shared.entry() {
            return;
        }
        if let Some(surface) = self.shared.surface() {
            surface.invalidate(path).await;
        }
    }

    async fn apply_settings(&mut self, settings: PreviewSettings) {
        let previous = self.shared.settings();
        self.debounce.set_delay(Duration::from_millis(settings.debounce_ms));
        let rerender = previous.plugins != settings.plugins || previous.development != settings.development;
        if previous.update_mode != settings.update_mode {
            tracing::info!(mode = settings.update_mode.as_str(), "update mode changed");
            self.debounce.cancel();
        }
        self.shared.set_settings(settings);
        if rerender {
            self.render(true).await;
        }
    }

    fn bump_version(&mut self) {
        self.status.current_version += 1;
        self.publish();
    }

    /// Mark stale; the surface is told only on the transition.
    pub async fn mark_stale(&mut self) {
        if self.status.stale {
            return;
        }
        self.status.stale = true;
        self.publish();
        if let Some(surface) = self.shared.surface() {
            surface.set_stale(true).await;
        }
    }

    pub async fn clear_stale(&mut self) {
        if !self.status.stale {
            return;
        }
        self.status.stale = false;
        self.publish();
        if let Some(surface) = self.shared.surface() {
            surface.set_stale(false).await;
        }
    }

    /// One render pass. Unforced passes are skipped when nothing changed
    /// since the last successful pass.
    pub async fn render(&mut self, forced: bool) {
        let version = self.status.current_version;
        if !forced && version == self.status.last_rendered_version {
            tracing::trace!(version, "render skipped, already current");
            return;
        }
        let Some(surface) = self.shared.surface() else {
            tracing::debug!("render deferred, no surface attached");
            return;
        };

        match self.render_pass(&surface).await {
            Ok(mode) => {
                self.status.last_rendered_version = version;
                self.status.renders += 1;
                self.publish();
                tracing::debug!(version, mode = ?mode, forced, "render complete");
                self.clear_stale().await;
            }
            Err(err) => {
                if err.is_security_relevant() {
                    tracing::warn!(error = %err, "render refused");
                } else {
                    tracing::error!(error = %err, "render failed");
                }
                surface
                    .show_preview_error(&err.to_payload(self.shared.development()))
                    .await;
            }
        }
    }

    async fn render_pass(&mut self, surface: &Arc<dyn PreviewSurface>) -> Result<SecurityMode> {
        self.wait_for_handshake().await?;

        let state = self.ctx.trust.state_for_document(&self.document);
        if self.last_trust.as_ref() != Some(&state) {
            surface.set_trust_state(&state).await;
            self.last_trust = Some(state.clone());
        }

        let source = self.read_entry().await?;
        let entry = self.shared.entry().to_path_buf();
        let mode = state.mode();
        match mode {
            SecurityMode::Safe => {
                self.watcher.clear();
                self.shared.set_plugins(Vec::new());
                let html = self.ctx.compiler.render_safe(&source, &entry)?;
                surface.update_preview_safe(html).await;
            }
            SecurityMode::Trusted => {
                let settings = self.shared.settings();
                let (plugins, errors) = self.ctx.plugins.load_plugins(&settings.plugins, mode);
                for error in &errors {
                    tracing::warn!(plugin = %error.name, error = %error.message, "plugin not loaded");
                }
                let module = self.ctx.compiler.compile_module(&source, &entry, &plugins)?;
                self.shared.set_plugins(plugins);
                let transformed = script::transform(&module, &entry)?;
                let dependencies: Vec<String> = transformed.imports.into_iter().collect();
                // Transitive paths fetched since the last pass stay watched
                // until the surface has had a chance to fetch them again.
                let direct = self.watcher.resolve_specifiers(&dependencies);
                let mut watch: Vec<PathBuf> = self.shared.dependent_paths();
                watch.extend(direct.iter().cloned());
                watch.retain(|path| *path != entry);
                self.watcher.update_paths(watch);
                self.shared.reset_dependent_paths(direct);
                surface.update_preview(transformed.code, &entry, dependencies).await;
            }
        }
        Ok(mode)
    }

    /// Watch paths the surface fetched since the last pass.
    fn sync_watches(&mut self) {
        let trusted = self
            .last_trust
            .as_ref()
            .is_some_and(|state| state.mode() == SecurityMode::Trusted);
        if !trusted {
            return;
        }
        let entry = self.shared.entry();
        let mut watch = self.watcher.watched();
        watch.extend(
            self.shared
                .dependent_paths()
                .into_iter()
                .filter(|path| path != entry),
        );
        self.watcher.update_paths(watch);
    }

    async fn wait_for_handshake(&self) -> Result<()> {
        let timeout = Duration::from_millis(self.shared.settings().handshake_timeout_ms);
        let mut ready = self.shared.ready();
        match tokio::time::timeout(timeout, ready.wait_for(|ready| *ready)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(_)) | Err(_) => Err(PreviewError::HandshakeTimeout(timeout)),
        }
    }

    async fn read_entry(&self) -> Result<String> {
        let entry = self.shared.entry();
        if self.document.scheme == DocumentScheme::Untitled {
            return Ok(self.ctx.buffers.get(entry).map(|b| b.text).unwrap_or_default());
        }
        self.ctx.fetcher.read_source(entry, self.shared.update_mode()).await
    }

    fn publish(&self) {
        self.shared.publish_status(self.status.clone());
    }

    pub fn shared(&self) -> &Arc<SessionShared> {
        &self.shared
    }

    pub fn watcher(&self) -> &DependencyWatcher {
        &self.watcher
    }

    fn dispose(&mut self) {
        self.debounce.cancel();
        self.watcher.clear();
        if let Some(subscription) = self.trust_subscription.take() {
            subscription.dispose();
        }
        tracing::debug!(document = %self.document.path().display(), "preview session closed");
    }
}

impl Drop for PreviewSession {
    fn drop(&mut self) {
        if let Some(subscription) = self.trust_subscription.take() {
            subscription.dispose();
        }
    }
}

async fn settings_changed(rx: &mut Option<watch::Receiver<PreviewSettings>>) -> Option<PreviewSettings> {
    match rx {
        Some(rx) => match rx.changed().await {
            Ok(()) => Some(rx.borrow_and_update().clone()),
            Err(_) => None,
        },
        None => std::future::pending().await,
    }
}
