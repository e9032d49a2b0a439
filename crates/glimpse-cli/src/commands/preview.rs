//! Preview command implementation.
//!
//! Runs one preview session for the document, serves its surface over HTTP,
//! feeds on-disk changes into the session and reloads settings when the
//! project config changes. Stops on Ctrl+C.

use glimpse_core::{Disposable, FileChange, PreviewSession};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::mpsc;

use crate::cli::PreviewArgs;
use crate::error::Result;
use crate::project::Project;
use crate::server::PreviewServer;
use crate::ui;

#[derive(Debug)]
enum ProjectEvent {
    Document(FileChange),
    Config(PathBuf),
}

pub async fn execute(args: PreviewArgs) -> Result<()> {
    let project = Project::open(&args.file, &args.project)?;
    let document = project.document_ref();
    let ctx = project.context().clone();

    ui::info(&format!("Document: {}", project.document().display()));
    ui::info(&format!("Project root: {}", project.root().display()));
    let trust = ctx.trust.state_for_document(&document);
    match &trust.reason {
        None => ui::info("Scripts enabled: document code will run"),
        Some(reason) => ui::warning(&format!("Safe mode ({reason}): static markup only")),
    }

    let server = PreviewServer::bind(SocketAddr::new(args.host, args.port)).await?;
    let origin = server.origin().to_string();

    let (handle, mut session_task) = PreviewSession::spawn(ctx.clone(), document.clone());

    let (tx, mut events) = mpsc::unbounded_channel();
    let _watches = watch_project(&project, tx)?;

    let server_handle = handle.clone();
    let server_ctx = ctx.clone();
    let mut server_task =
        tokio::spawn(async move { server.run(server_handle, &server_ctx, document).await });

    ui::success(&format!("Preview running at {origin}"));
    ui::info("Press Ctrl+C to stop");

    loop {
        tokio::select! {
            Some(event) = events.recv() => match event {
                ProjectEvent::Document(change) => {
                    tracing::debug!(path = %change.path().display(), "document changed on disk");
                    handle.file_changed(change);
                }
                ProjectEvent::Config(path) => reload(&project, &path),
            },

            _ = signal::ctrl_c() => {
                ui::info("Shutting down preview server...");
                break;
            }

            result = &mut server_task => {
                match result {
                    Ok(Err(e)) => return Err(e),
                    _ => ui::warning("Server task completed unexpectedly"),
                }
                break;
            }

            _ = &mut session_task => {
                ui::warning("Preview session ended unexpectedly");
                break;
            }
        }
    }

    handle.close();
    server_task.abort();
    ui::success("Preview server stopped");
    Ok(())
}

/// Watch the document and every config file. Dropping the returned
/// disposables stops the watches.
fn watch_project(project: &Project, tx: mpsc::UnboundedSender<ProjectEvent>) -> Result<Vec<Disposable>> {
    let factory = project.context().watch_factory.clone();
    let mut watches = Vec::new();

    let doc_tx = tx.clone();
    watches.push(factory.watch(
        project.document(),
        Arc::new(move |change: FileChange| {
            let _ = doc_tx.send(ProjectEvent::Document(change));
        }),
    )?);

    for config in project.config_files() {
        let config_tx = tx.clone();
        watches.push(factory.watch(
            &config,
            Arc::new(move |change: FileChange| {
                let _ = config_tx.send(ProjectEvent::Config(change.path().to_path_buf()));
            }),
        )?);
    }
    Ok(watches)
}

fn reload(project: &Project, path: &Path) {
    match project.reload_settings() {
        Ok(true) => {
            let trust = project.context().trust.state_for_document(&project.document_ref());
            ui::info(&format!("Settings reloaded from {}", path.display()));
            if let Some(reason) = trust.reason {
                ui::info(&format!("Safe mode: {reason}"));
            }
        }
        Ok(false) => tracing::debug!(path = %path.display(), "settings unchanged"),
        Err(e) => ui::warning(&format!("Keeping previous settings, {} is invalid: {e}", path.display())),
    }
}
