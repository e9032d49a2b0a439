//! Integration tests for module fetching through the surface entry point.

use glimpse_core::resolver::BUILTIN_STUB;
use glimpse_core::{
    ContentKind, DocumentRef, FetchTarget, HostTrust, ModuleRequest, PreviewContext, PreviewError,
    PreviewSession, PreviewSettings, RecordingSurface, SessionHandle, SettingsStore, SurfaceMessage,
    TrustGate, UpdateMode,
};
use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

struct Project {
    _dir: TempDir,
    root: PathBuf,
    ctx: PreviewContext,
    handle: SessionHandle,
    surface: Arc<RecordingSurface>,
}

impl Project {
    fn doc(&self) -> PathBuf {
        self.root.join("doc.mdx")
    }

    fn request(&self, specifier: &str, is_bare: bool) -> Value {
        json!({
            "specifier": specifier,
            "isBare": is_bare,
            "parentPath": self.doc().display().to_string(),
        })
    }

    fn last_error_code(&self) -> Option<String> {
        match self.surface.last("showPreviewError") {
            Some(SurfaceMessage::ShowPreviewError { code, .. }) => code,
            _ => None,
        }
    }
}

fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn project(trusted: bool, mode: UpdateMode) -> Project {
    let dir = TempDir::new().unwrap();
    let outer = dir.path().canonicalize().unwrap();
    let root = outer.join("site");
    write(&root.join("doc.mdx"), "# Doc\n");
    write(&root.join("src/util.ts"), "import './dep.js';\nexport const answer: number = 42;\n");
    write(&root.join("src/dep.js"), "export {};\n");
    write(&root.join("src/legacy.js"), "const dep = require('./dep.js');\nmodule.exports = dep;\n");
    write(&root.join("src/data.json"), "{\"title\": \"Glimpse\"}\n");
    write(&root.join("src/bad.json"), "{ nope }\n");
    write(&root.join("src/base.css"), "body { margin: 0; }\n");
    write(
        &root.join("src/theme.css"),
        "@import './base.css';\n.hero { background: url(./logo.png); }\n",
    );
    write(&root.join("src/logo.png"), "png");
    write(&root.join("src/broken.ts"), "export const = ;\n");
    write(&root.join("src/note.md"), "# Note\n");
    write(&root.join("node_modules/fs/package.json"), "{\"name\": \"fs\", \"main\": \"index.js\"}");
    write(&root.join("node_modules/fs/index.js"), "throw new Error('decoy');\n");
    write(&outer.join("secret.js"), "export const token = 1;\n");

    let ctx = PreviewContext::builder()
        .trust(Arc::new(TrustGate::new(Arc::new(HostTrust::new(trusted, trusted)))))
        .roots(vec![root.clone()])
        .settings(Arc::new(SettingsStore::new(PreviewSettings {
            update_mode: mode,
            ..Default::default()
        })))
        .build();
    let (_session, handle) = PreviewSession::open(ctx.clone(), DocumentRef::file(root.join("doc.mdx")));
    let surface = Arc::new(RecordingSurface::with_uri_base("https://surface.test"));
    handle.shared().attach_surface(surface.clone());
    Project {
        _dir: dir,
        root,
        ctx,
        handle,
        surface,
    }
}

#[tokio::test]
async fn test_builtin_never_touches_filesystem() {
    let p = project(true, UpdateMode::OnType);
    for specifier in ["fs", "fs/promises", "npm:path"] {
        let unit = p
            .handle
            .fetch_service()
            .fetch(&p.request(specifier, true))
            .await
            .unwrap_or_else(|| panic!("{specifier} resolves"));
        assert_eq!(unit.code, BUILTIN_STUB, "{specifier}");
        assert!(unit.resolved_path.starts_with("builtin:"));
    }
    assert_eq!(p.surface.count("showPreviewError"), 0);
}

#[tokio::test]
async fn test_script_is_transformed_and_scanned() {
    let p = project(true, UpdateMode::OnType);
    let unit = p
        .handle
        .fetch_service()
        .fetch(&p.request("./src/util.ts", false))
        .await
        .unwrap();
    assert_eq!(unit.content_kind, ContentKind::Script);
    assert!(!unit.code.contains(": number"));
    assert!(unit.local_dependencies.contains("./dep.js"));
    assert!(p.handle.shared().is_dependent(&p.root.join("src/util.ts")));
}

#[tokio::test]
async fn test_require_scan_is_the_fallback() {
    let p = project(true, UpdateMode::OnType);
    let unit = p
        .handle
        .fetch_service()
        .fetch(&p.request("./src/legacy.js", false))
        .await
        .unwrap();
    assert_eq!(unit.local_dependencies.iter().collect::<Vec<_>>(), vec!["./dep.js"]);
}

#[tokio::test]
async fn test_buffer_is_read_only_in_on_type_mode() {
    let edited = "export const answer = 7;\n";

    let p = project(true, UpdateMode::OnType);
    p.ctx.buffers.update(&p.root.join("src/util.ts"), edited, 1);
    let unit = p.handle.fetch_service().fetch(&p.request("./src/util.ts", false)).await.unwrap();
    assert!(unit.code.contains('7'));
    assert!(unit.local_dependencies.is_empty());

    let p = project(true, UpdateMode::OnSave);
    p.ctx.buffers.update(&p.root.join("src/util.ts"), edited, 1);
    let unit = p.handle.fetch_service().fetch(&p.request("./src/util.ts", false)).await.unwrap();
    assert!(unit.code.contains("42"));
}

#[tokio::test]
async fn test_data_style_image_and_markup_kinds() {
    let p = project(true, UpdateMode::OnType);
    let service = p.handle.fetch_service();

    let data = service.fetch(&p.request("./src/data.json", false)).await.unwrap();
    assert_eq!(data.content_kind, ContentKind::Data);
    assert!(data.code.starts_with("module.exports = {"));
    assert!(data.code.contains("Glimpse"));

    let style = service.fetch(&p.request("./src/theme.css", false)).await.unwrap();
    let css = style.style_text.unwrap();
    assert!(css.contains("body { margin: 0; }"));
    assert!(!css.contains("@import"));
    assert!(css.contains("url(\"https://surface.test/"));
    assert!(p.handle.shared().is_dependent(&p.root.join("src/base.css")));

    let image = service.fetch(&p.request("./src/logo.png", false)).await.unwrap();
    assert_eq!(image.content_kind, ContentKind::Image);
    assert!(image.code.contains("https://surface.test/"));

    let markup = service.fetch(&p.request("./src/note.md", false)).await.unwrap();
    assert_eq!(markup.content_kind, ContentKind::Markup);
    assert!(markup.code.contains("MDXContent"));
}

#[tokio::test]
async fn test_invalid_json_is_a_transform_failure() {
    let p = project(true, UpdateMode::OnType);
    assert!(p.handle.fetch_service().fetch(&p.request("./src/bad.json", false)).await.is_none());
    assert_eq!(p.last_error_code().as_deref(), Some("transform-failure"));
}

#[tokio::test]
async fn test_transform_failure_still_tracks_dependency() {
    let p = project(true, UpdateMode::OnType);
    assert!(p.handle.fetch_service().fetch(&p.request("./src/broken.ts", false)).await.is_none());
    assert_eq!(p.last_error_code().as_deref(), Some("transform-failure"));
    assert!(p.handle.shared().is_dependent(&p.root.join("src/broken.ts")));
}

#[tokio::test]
async fn test_boundary_violation_is_not_leaky() {
    let p = project(true, UpdateMode::OnType);
    assert!(p.handle.fetch_service().fetch(&p.request("../secret.js", false)).await.is_none());
    match p.surface.last("showPreviewError") {
        Some(SurfaceMessage::ShowPreviewError { message, stack, code }) => {
            assert_eq!(code.as_deref(), Some("path-access-denied"));
            assert!(!message.contains("secret"));
            assert!(stack.is_none());
        }
        other => panic!("expected error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_missing_module_reports_not_found() {
    let p = project(true, UpdateMode::OnType);
    assert!(p.handle.fetch_service().fetch(&p.request("./src/nope.js", false)).await.is_none());
    assert_eq!(p.last_error_code().as_deref(), Some("module-not-found"));
}

#[tokio::test]
async fn test_untrusted_document_cannot_fetch() {
    let p = project(false, UpdateMode::OnType);
    assert!(p.handle.fetch_service().fetch(&p.request("./src/dep.js", false)).await.is_none());
    assert_eq!(p.last_error_code().as_deref(), Some("trust-violation"));
    assert!(!p.handle.shared().is_dependent(&p.root.join("src/dep.js")));
}

#[tokio::test]
async fn test_malformed_requests_are_rejected_before_resolution() {
    let p = project(true, UpdateMode::OnType);
    let doc = p.doc().display().to_string();
    let cases = [
        json!({"specifier": 1, "isBare": false, "parentPath": doc}),
        json!({"specifier": "./src/dep.js", "isBare": "false", "parentPath": doc}),
        json!({"specifier": "./src/dep.js", "isBare": false, "parentPath": null}),
        json!({"specifier": "./src/dep\u{0}.js", "isBare": false, "parentPath": doc}),
        json!({"specifier": format!("./{}", "a".repeat(2100)), "isBare": false, "parentPath": doc}),
        json!({"specifier": "https://cdn.example/x.js", "isBare": false, "parentPath": doc}),
        json!({"specifier": "file:///etc/passwd", "isBare": false, "parentPath": doc}),
        json!({"specifier": "node:fs", "isBare": true, "parentPath": doc}),
    ];
    for case in &cases {
        assert!(p.handle.fetch_service().fetch(case).await.is_none(), "{case}");
    }
    assert_eq!(p.surface.count("showPreviewError"), cases.len());
    assert!(p.surface.messages().iter().all(|m| matches!(
        m,
        SurfaceMessage::ShowPreviewError { code: Some(code), .. } if code == "invalid-request"
    )));
}

#[tokio::test]
async fn test_image_without_surface_is_not_initialized() {
    let p = project(true, UpdateMode::OnType);
    p.handle.shared().detach_surface();
    let request = ModuleRequest::new("./src/logo.png", p.doc(), false);
    let err = p
        .ctx
        .fetcher
        .try_fetch(&request, &**p.handle.shared() as &dyn FetchTarget)
        .await
        .unwrap_err();
    assert!(matches!(err, PreviewError::PreviewNotInitialized));
}

#[tokio::test]
async fn test_forged_parent_in_outer_root_is_denied() {
    let dir = TempDir::new().unwrap();
    let work = dir.path().canonicalize().unwrap();
    let site = work.join("site");
    write(&site.join("doc.mdx"), "# Doc\n");
    write(&work.join("secret.js"), "export const token = \"leaked\";\n");

    let ctx = PreviewContext::builder()
        .trust(Arc::new(TrustGate::new(Arc::new(HostTrust::new(true, true)))))
        .roots(vec![work.clone(), site.clone()])
        .build();
    let (_session, handle) = PreviewSession::open(ctx, DocumentRef::file(site.join("doc.mdx")));
    let surface = Arc::new(RecordingSurface::new());
    handle.shared().attach_surface(surface.clone());

    let forged = json!({
        "specifier": "./secret.js",
        "isBare": false,
        "parentPath": work.join("x.js").display().to_string(),
    });
    assert!(handle.fetch_service().fetch(&forged).await.is_none());
    match surface.last("showPreviewError") {
        Some(SurfaceMessage::ShowPreviewError { code, .. }) => {
            assert_eq!(code.as_deref(), Some("path-access-denied"));
        }
        other => panic!("expected error, got {other:?}"),
    }
    assert!(!handle.shared().is_dependent(&work.join("secret.js")));
}
