//! Command implementations for the glimpse CLI.
//!
//! - [`preview`] - live preview server
//! - [`render`] - one render pass to stdout
//! - [`check`] - trust and settings diagnostics
//!
//! Each command provides an `execute` function taking its parsed arguments.

pub mod check;
pub mod preview;
pub mod render;

pub use check::execute as check_execute;
pub use preview::execute as preview_execute;
pub use render::execute as render_execute;
