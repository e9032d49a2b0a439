//! Command-line interface definition.
//!
//! - `glimpse preview <file>` - live preview served over HTTP
//! - `glimpse render <file>` - one render pass, printed to stdout
//! - `glimpse check <file>` - trust and settings diagnostics

use clap::{Args, Parser, Subcommand};
use glimpse_config::{SettingsOverrides, UpdateMode};
use std::net::IpAddr;
use std::path::PathBuf;

/// Glimpse - live preview for MDX documents
#[derive(Parser, Debug)]
#[command(
    name = "glimpse",
    version,
    about = "Live, trust-gated preview for MDX documents",
    long_about = "Glimpse renders Markdown and MDX documents in a browser surface.\n\
                  Untrusted projects get a static Safe-mode rendering; trusted projects with\n\
                  scripts enabled run the document's code and its local imports."
)]
pub struct Cli {
    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve a live preview of a document
    ///
    /// Re-renders as the document and its local imports change on disk.
    /// Changes to glimpse.toml are picked up without a restart.
    Preview(PreviewArgs),

    /// Render a document once and print the result
    ///
    /// Prints static HTML in Safe mode, or the compiled module in Trusted mode.
    Render(RenderArgs),

    /// Show the trust decision and effective settings for a document
    Check(CheckArgs),
}

/// Options shared by every command that opens a document.
#[derive(Args, Debug, Clone, Default)]
pub struct ProjectArgs {
    /// Project root (defaults to the nearest directory with glimpse.toml or package.json)
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Per-user settings file, the only file that may grant trust
    /// (defaults to $XDG_CONFIG_HOME/glimpse/config.toml)
    #[arg(long, value_name = "FILE")]
    pub user_config: Option<PathBuf>,

    /// Treat the project as trusted for this run
    #[arg(long)]
    pub trust: bool,

    /// Enable script execution (only effective in a trusted project)
    #[arg(long)]
    pub scripts: bool,

    /// When to re-render: onType, onSave or manual
    #[arg(long, value_name = "MODE")]
    pub update_mode: Option<UpdateMode>,

    /// Debounce delay for as-you-type renders, in milliseconds
    #[arg(long, value_name = "MS")]
    pub debounce_ms: Option<u64>,

    /// Include stack traces in preview errors
    #[arg(long)]
    pub development: bool,
}

impl ProjectArgs {
    /// Flags that take precedence over files and environment.
    pub fn overrides(&self) -> SettingsOverrides {
        SettingsOverrides {
            update_mode: self.update_mode,
            debounce_ms: self.debounce_ms,
            scripts_enabled: self.scripts.then_some(true),
            development: self.development.then_some(true),
        }
    }
}

#[derive(Args, Debug)]
pub struct PreviewArgs {
    /// Document to preview
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    #[command(flatten)]
    pub project: ProjectArgs,

    /// Port for the preview server
    #[arg(short, long, default_value_t = 4317)]
    pub port: u16,

    /// Address to bind
    #[arg(long, default_value = "127.0.0.1")]
    pub host: IpAddr,
}

#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Document to render
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    #[command(flatten)]
    pub project: ProjectArgs,

    /// Print every surface message as JSON lines instead of the rendered output
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Document to check
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    #[command(flatten)]
    pub project: ProjectArgs,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_preview_flags_parse() {
        let cli = Cli::parse_from([
            "glimpse",
            "preview",
            "doc.mdx",
            "--trust",
            "--scripts",
            "--update-mode",
            "onSave",
            "--port",
            "5000",
        ]);
        let Command::Preview(args) = cli.command else {
            panic!("expected preview");
        };
        assert!(args.project.trust);
        assert_eq!(args.port, 5000);
        let overrides = args.project.overrides();
        assert_eq!(overrides.update_mode, Some(UpdateMode::OnSave));
        assert_eq!(overrides.scripts_enabled, Some(true));
        assert_eq!(overrides.development, None);
    }

    #[test]
    fn test_unknown_update_mode_is_rejected() {
        let result = Cli::try_parse_from(["glimpse", "render", "doc.mdx", "--update-mode", "later"]);
        assert!(result.is_err());
    }
}
