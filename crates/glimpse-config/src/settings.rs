//! Preview settings model.

use path_clean::PathClean;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// When edits to a previewed document (or its dependencies) trigger a render.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UpdateMode {
    /// Re-render (debounced) as the author types, reading unsaved buffers.
    #[default]
    OnType,
    /// Re-render when a file is saved; edits only mark the preview stale.
    OnSave,
    /// Only re-render on an explicit refresh.
    Manual,
}

impl UpdateMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateMode::OnType => "onType",
            UpdateMode::OnSave => "onSave",
            UpdateMode::Manual => "manual",
        }
    }
}

impl std::str::FromStr for UpdateMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "onType" | "on-type" | "on_type" => Ok(UpdateMode::OnType),
            "onSave" | "on-save" | "on_save" => Ok(UpdateMode::OnSave),
            "manual" => Ok(UpdateMode::Manual),
            other => Err(format!(
                "unknown update mode '{other}' (expected onType, onSave or manual)"
            )),
        }
    }
}

/// A markup plugin reference: either a bare name or a `[name, options]` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PluginSpec {
    Name(String),
    WithOptions(String, serde_json::Value),
}

impl PluginSpec {
    pub fn name(&self) -> &str {
        match self {
            PluginSpec::Name(name) | PluginSpec::WithOptions(name, _) => name,
        }
    }

    pub fn options(&self) -> Option<&serde_json::Value> {
        match self {
            PluginSpec::Name(_) => None,
            PluginSpec::WithOptions(_, options) => Some(options),
        }
    }
}

/// Settings consumed by the trust gate and the render scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewSettings {
    #[serde(default, alias = "update_mode")]
    pub update_mode: UpdateMode,

    #[serde(default = "default_debounce_ms", alias = "debounce_ms")]
    pub debounce_ms: u64,

    /// User opt-in for executing document code. Only effective in trusted projects.
    #[serde(default, alias = "scripts_enabled")]
    pub scripts_enabled: bool,

    #[serde(default = "default_handshake_timeout_ms", alias = "handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,

    /// Declared boundary roots. Empty means "the project directory".
    #[serde(default)]
    pub roots: Vec<PathBuf>,

    #[serde(default)]
    pub plugins: Vec<PluginSpec>,

    /// Include stack traces in error payloads shown by the surface.
    #[serde(default)]
    pub development: bool,

    /// Folders the user has vetted as safe to run code from.
    #[serde(default, alias = "trusted_folders")]
    pub trusted_folders: Vec<PathBuf>,
}

impl Default for PreviewSettings {
    fn default() -> Self {
        Self {
            update_mode: UpdateMode::default(),
            debounce_ms: default_debounce_ms(),
            scripts_enabled: false,
            handshake_timeout_ms: default_handshake_timeout_ms(),
            roots: Vec::new(),
            plugins: Vec::new(),
            development: false,
            trusted_folders: Vec::new(),
        }
    }
}

impl PreviewSettings {
    /// Whether `project_root` is listed in `trustedFolders`.
    ///
    /// Relative entries are taken relative to `project_root`.
    pub fn is_folder_trusted(&self, project_root: &Path) -> bool {
        let root = project_root.to_path_buf().clean();
        self.trusted_folders.iter().any(|folder| {
            let folder = if folder.is_absolute() {
                folder.clean()
            } else {
                root.join(folder).clean()
            };
            folder == root
        })
    }

    /// Boundary roots with relative entries anchored at `project_root`.
    pub fn resolved_roots(&self, project_root: &Path) -> Vec<PathBuf> {
        if self.roots.is_empty() {
            return vec![project_root.to_path_buf().clean()];
        }
        self.roots
            .iter()
            .map(|root| {
                if root.is_absolute() {
                    root.clean()
                } else {
                    project_root.join(root).clean()
                }
            })
            .collect()
    }
}

fn default_debounce_ms() -> u64 {
    300
}

fn default_handshake_timeout_ms() -> u64 {
    10_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_mode_parses_loose_spellings() {
        assert_eq!("onSave".parse::<UpdateMode>().unwrap(), UpdateMode::OnSave);
        assert_eq!("on-type".parse::<UpdateMode>().unwrap(), UpdateMode::OnType);
        assert_eq!("manual".parse::<UpdateMode>().unwrap(), UpdateMode::Manual);
        assert!("sometimes".parse::<UpdateMode>().is_err());
    }

    #[test]
    fn plugin_spec_deserializes_both_forms() {
        let specs: Vec<PluginSpec> =
            serde_json::from_str(r#"["heading-ids", ["external-links", {"rel": "noopener"}]]"#)
                .unwrap();
        assert_eq!(specs[0], PluginSpec::Name("heading-ids".into()));
        assert_eq!(specs[1].name(), "external-links");
        assert_eq!(specs[1].options().unwrap()["rel"], "noopener");
    }

    #[test]
    fn trusted_folder_matches_after_cleaning() {
        let settings = PreviewSettings {
            trusted_folders: vec![PathBuf::from("/work/site/./")],
            ..Default::default()
        };
        assert!(settings.is_folder_trusted(Path::new("/work/site")));
        assert!(!settings.is_folder_trusted(Path::new("/work/site2")));
    }

    #[test]
    fn relative_roots_are_anchored() {
        let settings = PreviewSettings {
            roots: vec![PathBuf::from("docs"), PathBuf::from("/shared")],
            ..Default::default()
        };
        assert_eq!(
            settings.resolved_roots(Path::new("/work/site")),
            vec![PathBuf::from("/work/site/docs"), PathBuf::from("/shared")]
        );
        assert_eq!(
            PreviewSettings::default().resolved_roots(Path::new("/work/site")),
            vec![PathBuf::from("/work/site")]
        );
    }
}
