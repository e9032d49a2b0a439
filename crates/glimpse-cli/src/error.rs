//! CLI error type and its conversion to miette diagnostics.

use glimpse_config::ConfigError;
use glimpse_core::PreviewError;
use glimpse_core::watcher::WatchError;
use miette::Report;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Preview error: {0}")]
    Preview(#[from] PreviewError),

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Server error: {0}")]
    Server(String),

    #[error("File watcher error: {0}")]
    Watch(#[from] WatchError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The surface received an error payload instead of a preview.
    #[error("Render failed: {message}")]
    RenderFailed {
        message: String,
        code: Option<String>,
    },
}

pub type Result<T, E = CliError> = std::result::Result<T, E>;

pub fn cli_error_to_miette(err: CliError) -> Report {
    match err {
        CliError::Config(ConfigError::Extract(e)) => miette::miette!(
            "Invalid settings: {}\n\nHint: Check glimpse.toml (or the \"glimpse\" field in package.json), your user config and GLIMPSE_* variables",
            e
        ),
        CliError::Preview(PreviewError::TrustViolation { reason }) => miette::miette!(
            "Scripts are disabled for this document: {}\n\nHint: Pass --trust --scripts, or add the project to trustedFolders in your user config",
            reason
        ),
        CliError::RenderFailed {
            message,
            code: Some(code),
        } => miette::miette!("Render failed [{}]: {}", code, message),
        CliError::FileNotFound(path) => miette::miette!(
            "File not found: {}\n\nHint: Paths are relative to the current directory",
            path.display()
        ),
        other => miette::miette!("{}", other),
    }
}
