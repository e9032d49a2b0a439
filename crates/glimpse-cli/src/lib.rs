//! Glimpse CLI - live, trust-gated preview for MDX documents.
//!
//! The binary wires `glimpse-core` to a browser surface served over HTTP.
//!
//! - [`cli`] - argument definitions
//! - [`commands`] - `preview`, `render` and `check`
//! - [`server`] - axum surface: shell page, SSE event stream, handshake and fetch endpoints
//! - [`project`] - locating the project and building the preview context
//! - [`error`], [`logger`], [`ui`] - the usual CLI plumbing
//!
//! # Example
//!
//! ```rust,no_run
//! use glimpse_cli::{error::Result, logger};
//!
//! fn main() -> Result<()> {
//!     logger::init_logger(false, false, false);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod commands;
pub mod error;
pub mod logger;
pub mod project;
pub mod server;
pub mod ui;

pub use error::{CliError, Result};
