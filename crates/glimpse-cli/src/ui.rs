//! Terminal status lines.
//!
//! Short `✓ ℹ ⚠ ✗` prefixed messages on stderr for the human at the terminal.
//! Logs go through [`crate::logger`]; these are for outcomes the user acts on,
//! such as the preview URL or a trust change.
//!
//! # Features
//!
//! - **Color detection**: `NO_COLOR` disables, `FORCE_COLOR` enables, otherwise colors follow whether stderr is a terminal
//! - **Decided once**: [`init_colors`] fixes the choice early in `main`
//! - **Plain fallback**: uncolored output keeps the same symbols
//!
//! # Example
//!
//! ```no_run
//! use glimpse_cli::ui;
//!
//! ui::init_colors(false);
//!
//! ui::info("Previewing docs/intro.mdx");
//! ui::success("Preview ready at http://127.0.0.1:4317");
//! ui::warning("Scripts are disabled: workspace not trusted");
//! ui::error("Failed to bind to 127.0.0.1:4317");
//! ```

use owo_colors::OwoColorize;
use std::sync::atomic::{AtomicBool, Ordering};

static COLOR: AtomicBool = AtomicBool::new(false);

/// Colors unless `NO_COLOR` is set; `FORCE_COLOR` wins over TTY detection.
pub fn should_use_color() -> bool {
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    if std::env::var_os("FORCE_COLOR").is_some() {
        return true;
    }
    console::user_attended_stderr()
}

/// Decide once, early in `main`, whether status lines are colored.
pub fn init_colors(no_color: bool) {
    COLOR.store(!no_color && should_use_color(), Ordering::Relaxed);
}

fn colored() -> bool {
    COLOR.load(Ordering::Relaxed)
}

pub fn success(message: &str) {
    if colored() {
        eprintln!("{} {}", "✓".green().bold(), message);
    } else {
        eprintln!("✓ {message}");
    }
}

pub fn info(message: &str) {
    if colored() {
        eprintln!("{} {}", "ℹ".blue().bold(), message);
    } else {
        eprintln!("ℹ {message}");
    }
}

pub fn warning(message: &str) {
    if colored() {
        eprintln!("{} {}", "⚠".yellow().bold(), message.yellow());
    } else {
        eprintln!("⚠ {message}");
    }
}

pub fn error(message: &str) {
    if colored() {
        eprintln!("{} {}", "✗".red().bold(), message.red());
    } else {
        eprintln!("✗ {message}");
    }
}
