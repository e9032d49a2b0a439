//! Preview server: the browser surface over HTTP with SSE push.
//!
//! Routes:
//! - `GET /` shell page carrying the derived content-security-policy
//! - `GET /__glimpse/client.js` surface bootstrap script
//! - `GET /__glimpse/events` SSE stream of surface messages
//! - `POST /__glimpse/handshake` surface is ready
//! - `POST /__glimpse/fetch` module pull (validated and trust-checked)
//! - `GET /__glimpse/asset/{*path}` images minted by the surface
//!
//! POSTs carrying an `Origin` other than the server's own are refused, and
//! CORS only ever answers for that same origin.

#![allow(clippy::disallowed_methods)]

mod surface;

pub use surface::{ASSET_ROUTE, SseSurface};

use axum::{
    Json, Router,
    extract::{Path as UrlPath, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode, header},
    response::{
        IntoResponse, Response, Sse,
        sse::{Event, KeepAlive},
    },
    routing::{get, post},
};
use glimpse_core::{
    ContentKind, ContentSecurityPolicy, DocumentRef, PathBoundary, PreviewContext, PreviewSurface,
    SecurityMode, SessionHandle, TrustGate, new_nonce,
};
use serde_json::Value;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_stream::{Stream, StreamExt, wrappers::ReceiverStream};
use tower_http::cors::CorsLayer;

use crate::error::{CliError, Result};

const CLIENT_SCRIPT: &str = include_str!("../../assets/preview-client.js");

/// Prefix every surface channel route lives under.
pub const CHANNEL_PREFIX: &str = "/__glimpse/";

#[derive(Clone)]
pub struct ServerState {
    handle: SessionHandle,
    surface: Arc<SseSurface>,
    trust: Arc<TrustGate>,
    boundary: Arc<PathBoundary>,
    document: DocumentRef,
    allowed_origins: Arc<[String]>,
}

impl ServerState {
    pub fn new(handle: SessionHandle, surface: Arc<SseSurface>, ctx: &PreviewContext, document: DocumentRef) -> Self {
        Self {
            handle,
            trust: ctx.trust.clone(),
            boundary: ctx.boundary.clone(),
            allowed_origins: allowed_origins(surface.origin()),
            surface,
            document,
        }
    }

    fn origin(&self) -> &str {
        self.surface.origin()
    }

    /// A request without `Origin` is same-origin or non-browser.
    fn is_foreign_origin(&self, headers: &HeaderMap) -> bool {
        headers.get(header::ORIGIN).is_some_and(|origin| {
            !self
                .allowed_origins
                .iter()
                .any(|allowed| origin.as_bytes() == allowed.as_bytes())
        })
    }
}

/// The bound origin, plus its `localhost` spelling when bound to loopback.
fn allowed_origins(origin: &str) -> Arc<[String]> {
    let mut origins = vec![origin.to_string()];
    if let Some(port) = origin.strip_prefix("http://127.0.0.1:") {
        origins.push(format!("http://localhost:{port}"));
    }
    origins.into()
}

pub struct PreviewServer {
    listener: TcpListener,
    surface: Arc<SseSurface>,
}

impl PreviewServer {
    /// Bind `addr`. The surface's origin is taken from the bound address, so
    /// port 0 works.
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| CliError::Server(format!("Failed to bind to {addr}: {e}")))?;
        let local = listener.local_addr()?;
        let surface = Arc::new(SseSurface::new(format!("http://{local}")));
        Ok(Self { listener, surface })
    }

    pub fn origin(&self) -> &str {
        self.surface.origin()
    }

    pub fn surface(&self) -> Arc<SseSurface> {
        self.surface.clone()
    }

    /// Serve until the task is dropped or the listener fails.
    pub async fn run(self, handle: SessionHandle, ctx: &PreviewContext, document: DocumentRef) -> Result<()> {
        let state = ServerState::new(handle, self.surface, ctx, document);
        axum::serve(self.listener, router(state))
            .await
            .map_err(|e| CliError::Server(format!("Server error: {e}")))
    }
}

pub fn router(state: ServerState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);
    let cors = match HeaderValue::from_str(state.origin()) {
        Ok(origin) => cors.allow_origin(origin),
        Err(_) => cors,
    };

    Router::new()
        .route("/", get(handle_shell))
        .route("/__glimpse/client.js", get(handle_client_script))
        .route("/__glimpse/events", get(handle_events))
        .route("/__glimpse/handshake", post(handle_handshake))
        .route("/__glimpse/fetch", post(handle_fetch))
        .route("/__glimpse/asset/{*path}", get(handle_asset))
        .route("/favicon.ico", get(|| async { StatusCode::NO_CONTENT }))
        .layer(cors)
        .with_state(state)
}

/// Shell page. The policy is derived from the trust state at load time; the
/// client reloads the page when execution is granted or revoked.
async fn handle_shell(State(state): State<ServerState>) -> Response {
    let mode = state.trust.state_for_document(&state.document).mode();
    let nonce = new_nonce();
    let channel = format!("{}{}", state.origin(), CHANNEL_PREFIX);
    let csp = match ContentSecurityPolicy::for_mode(mode, state.origin(), &nonce)
        .and_then(|csp| csp.with_channel(&channel))
    {
        Ok(csp) => csp,
        Err(e) => {
            tracing::error!(error = %e, "failed to derive content-security-policy");
            return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
        }
    };
    let Ok(policy) = HeaderValue::from_str(&csp.to_string()) else {
        return (StatusCode::INTERNAL_SERVER_ERROR, "invalid content-security-policy").into_response();
    };

    let title = state
        .document
        .path()
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "preview".to_string());
    let can_execute = mode == SecurityMode::Trusted;

    (
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8")),
            (header::CACHE_CONTROL, HeaderValue::from_static("no-cache")),
            (header::CONTENT_SECURITY_POLICY, policy),
        ],
        shell_html(&title, csp.nonce(), can_execute),
    )
        .into_response()
}

async fn handle_client_script() -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "application/javascript"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        CLIENT_SCRIPT,
    )
}

/// Each connection (re)attaches the surface, which forces a fresh render once
/// the client handshakes.
async fn handle_events(
    State(state): State<ServerState>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let (id, rx) = state.surface.register_client();
    tracing::debug!(client = id, "surface client connected");
    state
        .handle
        .attach_surface(state.surface.clone() as Arc<dyn PreviewSurface>);

    let stream = ReceiverStream::new(rx).map(|data| Ok(Event::default().data(data)));
    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)).text("ping"))
}

async fn handle_handshake(State(state): State<ServerState>, headers: HeaderMap) -> StatusCode {
    if state.is_foreign_origin(&headers) {
        tracing::warn!(origin = ?headers.get(header::ORIGIN), "cross-origin handshake refused");
        return StatusCode::FORBIDDEN;
    }
    state.handle.handshake();
    StatusCode::NO_CONTENT
}

/// `null` when the fetch failed; the error itself went out over SSE.
async fn handle_fetch(State(state): State<ServerState>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if state.is_foreign_origin(&headers) {
        tracing::warn!(origin = ?headers.get(header::ORIGIN), "cross-origin fetch refused");
        return (StatusCode::FORBIDDEN, "Access denied").into_response();
    }
    Json(state.handle.fetch_service().fetch(&body).await).into_response()
}

async fn handle_asset(State(state): State<ServerState>, UrlPath(asset_path): UrlPath<String>) -> Response {
    let path = PathBuf::from(format!("/{}", asset_path.trim_start_matches('/')));
    if ContentKind::from_path(&path) != ContentKind::Image
        || !state
            .boundary
            .is_inside_project(state.document.base_dir(), &path)
    {
        tracing::warn!("asset request outside the project boundary refused");
        return (StatusCode::FORBIDDEN, "Access denied").into_response();
    }

    match tokio::fs::read(&path).await {
        Ok(content) => (
            [
                (header::CONTENT_TYPE, content_type(&asset_path)),
                (header::CACHE_CONTROL, "no-cache"),
            ],
            content,
        )
            .into_response(),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "asset read failed");
            (StatusCode::NOT_FOUND, format!("Asset not found: {asset_path}")).into_response()
        }
    }
}

fn content_type(path: &str) -> &'static str {
    let extension = std::path::Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "ico" => "image/x-icon",
        "bmp" => "image/bmp",
        _ => "application/octet-stream",
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn shell_html(title: &str, nonce: &str, can_execute: bool) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en" data-can-execute="{can_execute}">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>{title}</title>
  <style>
    body {{ font-family: system-ui, sans-serif; max-width: 48rem; margin: 2rem auto; padding: 0 1rem; }}
    #glimpse-status {{ font-size: 0.8rem; color: #888; }}
    #glimpse-status[data-stale="true"]::after {{ content: " (out of date)"; }}
    #glimpse-error {{ display: none; white-space: pre-wrap; color: #b00020; border-left: 3px solid #b00020; padding-left: 1rem; }}
  </style>
</head>
<body>
  <div id="glimpse-status"></div>
  <pre id="glimpse-error"></pre>
  <main id="glimpse-root"></main>
  <script nonce="{nonce}" src="/__glimpse/client.js"></script>
</body>
</html>
"#,
        title = escape_html(title),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use glimpse_core::{HostTrust, PreviewSession};
    use std::fs;
    use tempfile::TempDir;

    fn state(dir: &TempDir, trusted: bool) -> ServerState {
        let root = dir.path().canonicalize().unwrap();
        fs::write(root.join("doc.mdx"), "# Doc\n").unwrap();
        fs::write(root.join("logo.png"), [0x89, b'P', b'N', b'G']).unwrap();
        fs::write(root.join("secret.txt"), "nope").unwrap();

        let ctx = PreviewContext::builder()
            .trust(Arc::new(TrustGate::new(Arc::new(HostTrust::new(trusted, trusted)))))
            .roots(vec![root.clone()])
            .build();
        let document = DocumentRef::file(root.join("doc.mdx"));
        let (handle, _task) = PreviewSession::spawn(ctx.clone(), document.clone());
        let surface = Arc::new(SseSurface::new("http://127.0.0.1:4317"));
        ServerState::new(handle, surface, &ctx, document)
    }

    #[tokio::test]
    async fn test_shell_carries_safe_policy_for_untrusted_project() {
        let dir = TempDir::new().unwrap();
        let response = handle_shell(State(state(&dir, false))).await;
        assert_eq!(response.status(), StatusCode::OK);

        let policy = response.headers()[header::CONTENT_SECURITY_POLICY].to_str().unwrap();
        assert!(policy.contains("connect-src http://127.0.0.1:4317/__glimpse/"));
        assert!(!policy.contains("unsafe-eval"));
    }

    #[tokio::test]
    async fn test_shell_allows_eval_when_trusted() {
        let dir = TempDir::new().unwrap();
        let response = handle_shell(State(state(&dir, true))).await;
        let policy = response.headers()[header::CONTENT_SECURITY_POLICY].to_str().unwrap();
        assert!(policy.contains("'unsafe-eval'"));
    }

    #[tokio::test]
    async fn test_asset_route_is_boundary_checked() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir, true);
        let root = dir.path().canonicalize().unwrap();
        let inside = root.join("logo.png").display().to_string();

        let ok = handle_asset(State(state.clone()), UrlPath(inside.trim_start_matches('/').to_string())).await;
        assert_eq!(ok.status(), StatusCode::OK);
        assert_eq!(ok.headers()[header::CONTENT_TYPE], "image/png");

        let not_image = root.join("secret.txt").display().to_string();
        let denied = handle_asset(State(state.clone()), UrlPath(not_image)).await;
        assert_eq!(denied.status(), StatusCode::FORBIDDEN);

        let outside = handle_asset(State(state), UrlPath("etc/../../outside.png".to_string())).await;
        assert_eq!(outside.status(), StatusCode::FORBIDDEN);
    }

    fn origin_headers(origin: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::ORIGIN, HeaderValue::from_static(origin));
        headers
    }

    #[tokio::test]
    async fn test_handshake_marks_surface_ready() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir, false);
        assert_eq!(
            handle_handshake(State(state.clone()), HeaderMap::new()).await,
            StatusCode::NO_CONTENT
        );
        assert_eq!(
            handle_handshake(State(state.clone()), origin_headers("http://127.0.0.1:4317")).await,
            StatusCode::NO_CONTENT
        );
        assert_eq!(
            handle_handshake(State(state), origin_headers("http://localhost:4317")).await,
            StatusCode::NO_CONTENT
        );
    }

    #[tokio::test]
    async fn test_cross_origin_posts_are_refused() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir, true);
        assert_eq!(
            handle_handshake(State(state.clone()), origin_headers("https://evil.example")).await,
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            handle_handshake(State(state.clone()), origin_headers("null")).await,
            StatusCode::FORBIDDEN
        );

        let body = serde_json::json!({ "path": "./doc.mdx", "parentPath": "/x/doc.mdx" });
        let response = handle_fetch(State(state), origin_headers("http://127.0.0.1:9999"), Json(body)).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_loopback_origin_has_localhost_alias() {
        let origins = allowed_origins("http://127.0.0.1:4317");
        assert_eq!(origins.len(), 2);
        assert_eq!(origins[0], "http://127.0.0.1:4317");
        assert_eq!(origins[1], "http://localhost:4317");
        assert_eq!(allowed_origins("http://[::1]:80").len(), 1);
    }

    #[test]
    fn test_shell_escapes_title_and_carries_nonce() {
        let html = shell_html("<x>.mdx", "abc123", false);
        assert!(html.contains("<title>&lt;x&gt;.mdx</title>"));
        assert!(html.contains(r#"<script nonce="abc123" src="/__glimpse/client.js">"#));
        assert!(html.contains(r#"data-can-execute="false""#));
    }
}
