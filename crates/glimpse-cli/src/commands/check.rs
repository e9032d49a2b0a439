//! Check command implementation.
//!
//! Reports the trust decision for a document and the settings in effect.

use glimpse_config::{ConfigDiscovery, PreviewSettings};
use glimpse_core::{SecurityMode, TrustState};
use serde::Serialize;
use std::path::PathBuf;

use crate::cli::CheckArgs;
use crate::error::Result;
use crate::project::Project;
use crate::ui;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckReport {
    pub document: PathBuf,
    pub root: PathBuf,
    pub config_file: Option<PathBuf>,
    pub mode: SecurityMode,
    pub trust: TrustState,
    pub settings: PreviewSettings,
}

impl CheckReport {
    pub fn collect(project: &Project) -> Self {
        let trust = project.context().trust.state_for_document(&project.document_ref());
        Self {
            document: project.document().to_path_buf(),
            root: project.root().to_path_buf(),
            config_file: ConfigDiscovery::new(project.root())
                .find()
                .map(|source| source.path().to_path_buf()),
            mode: trust.mode(),
            trust,
            settings: project.settings(),
        }
    }
}

pub async fn execute(args: CheckArgs) -> Result<()> {
    let project = Project::open(&args.file, &args.project)?;
    let report = CheckReport::collect(&project);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print_report(&report);
    Ok(())
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

fn print_report(report: &CheckReport) {
    println!("document:        {}", report.document.display());
    println!("project root:    {}", report.root.display());
    match &report.config_file {
        Some(path) => println!("config file:     {}", path.display()),
        None => println!("config file:     (none, defaults)"),
    }
    println!("project trusted: {}", yes_no(report.trust.project_trusted));
    println!("scripts enabled: {}", yes_no(report.trust.scripts_enabled));
    println!("can execute:     {}", yes_no(report.trust.can_execute));
    if let Some(reason) = &report.trust.reason {
        println!("reason:          {reason}");
    }

    let settings = &report.settings;
    println!("update mode:     {}", settings.update_mode.as_str());
    println!("debounce:        {}ms", settings.debounce_ms);
    println!("handshake:       {}ms", settings.handshake_timeout_ms);
    let roots: Vec<String> = settings
        .resolved_roots(&report.root)
        .iter()
        .map(|root| root.display().to_string())
        .collect();
    println!("roots:           {}", roots.join(", "));
    if !settings.plugins.is_empty() {
        let plugins: Vec<&str> = settings.plugins.iter().map(|p| p.name()).collect();
        println!("plugins:         {}", plugins.join(", "));
    }

    match report.mode {
        SecurityMode::Trusted => ui::success("Trusted mode: document code will run"),
        SecurityMode::Safe => ui::warning("Safe mode: static markup only"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::ProjectArgs;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_report_reflects_trust_and_config() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("glimpse.toml"), "updateMode = \"onSave\"\n").unwrap();
        fs::write(dir.path().join("doc.mdx"), "# Doc\n").unwrap();
        let project = Project::open(&dir.path().join("doc.mdx"), &ProjectArgs::default()).unwrap();

        let report = CheckReport::collect(&project);
        assert_eq!(report.mode, SecurityMode::Safe);
        assert_eq!(report.trust.reason.as_deref(), Some("workspace not trusted"));
        assert!(report.config_file.unwrap().ends_with("glimpse.toml"));

        let json = serde_json::to_value(CheckReport::collect(&project)).unwrap();
        assert_eq!(json["settings"]["updateMode"], "onSave");
        assert_eq!(json["trust"]["canExecute"], false);
    }
}
