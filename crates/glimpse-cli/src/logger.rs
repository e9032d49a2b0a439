//! Logging setup for the CLI.
//!
//! Structured logging through `tracing`, written to stderr so that `render`
//! output on stdout stays machine-readable.
//!
//! # Features
//!
//! - **Verbosity control**: `--verbose` turns on debug for the glimpse crates, `--quiet` keeps errors only
//! - **Color support**: ANSI follows [`crate::ui::should_use_color`], `--no-color` turns it off
//! - **Environment filters**: `RUST_LOG` applies when neither flag is given
//! - **Structured fields**: session, trust and resolver events carry paths and modes as fields
//!
//! # Example
//!
//! ```rust,no_run
//! use glimpse_cli::logger::init_logger;
//! use tracing::{debug, info};
//!
//! init_logger(false, false, false);
//!
//! info!("preview server listening");
//! debug!(path = "docs/intro.mdx", "document opened");
//! ```

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const VERBOSE_FILTER: &str = "glimpse_cli=debug,glimpse_core=debug,glimpse_config=debug";
const QUIET_FILTER: &str = "error";
const DEFAULT_FILTER: &str = "glimpse_cli=info,glimpse_core=info,glimpse_config=info";

/// Build the filter for the given flags.
///
/// Precedence:
/// 1. `verbose`: debug for the glimpse crates
/// 2. `quiet`: errors only
/// 3. `RUST_LOG`, when set and valid
/// 4. info for the glimpse crates
pub fn filter_for(verbose: bool, quiet: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new(VERBOSE_FILTER)
    } else if quiet {
        EnvFilter::new(QUIET_FILTER)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    }
}

/// Install the global subscriber. Call once, before anything logs.
///
/// # Examples
///
/// ```rust,no_run
/// use glimpse_cli::logger::init_logger;
///
/// // Default logging (info for glimpse crates)
/// init_logger(false, false, false);
///
/// // Debug logging without colors
/// init_logger(true, false, true);
/// ```
pub fn init_logger(verbose: bool, quiet: bool, no_color: bool) {
    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .with_ansi(!no_color && crate::ui::should_use_color())
        .with_writer(std::io::stderr)
        .compact();

    // A second call (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter_for(verbose, quiet))
        .with(fmt_layer)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_filter_enables_debug() {
        assert!(filter_for(true, false).to_string().contains("glimpse_core=debug"));
    }

    #[test]
    fn test_quiet_filter_is_errors_only() {
        assert_eq!(filter_for(false, true).to_string(), "error");
    }
}
