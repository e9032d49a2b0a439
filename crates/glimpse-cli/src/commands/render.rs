//! Render command implementation.
//!
//! Runs a single render pass against a recording surface and prints what the
//! surface received: Safe-mode HTML or the compiled module.

use glimpse_core::{PreviewSession, PreviewSurface, RecordingSurface, SurfaceMessage};
use std::sync::Arc;

use crate::cli::RenderArgs;
use crate::error::{CliError, Result};
use crate::project::Project;

pub async fn execute(args: RenderArgs) -> Result<()> {
    let project = Project::open(&args.file, &args.project)?;
    let messages = render_once(&project).await;

    if args.json {
        for message in &messages {
            println!("{}", serde_json::to_string(message)?);
        }
    }

    for message in messages {
        match message {
            SurfaceMessage::ShowPreviewError { message, code, .. } => {
                return Err(CliError::RenderFailed { message, code });
            }
            SurfaceMessage::UpdatePreviewSafe { html } if !args.json => println!("{html}"),
            SurfaceMessage::UpdatePreview { code, .. } if !args.json => println!("{code}"),
            _ => {}
        }
    }
    Ok(())
}

/// Messages the surface received during one forced pass.
pub async fn render_once(project: &Project) -> Vec<SurfaceMessage> {
    let surface = Arc::new(RecordingSurface::new());
    let (mut session, handle) = PreviewSession::open(project.context().clone(), project.document_ref());
    handle.attach_surface(surface.clone() as Arc<dyn PreviewSurface>);
    handle.handshake();
    session.render(true).await;
    drop(session);
    surface.take()
}
