#![allow(clippy::disallowed_methods)]

use crate::discovery::{ConfigDiscovery, ConfigSource};
use crate::error::{ConfigError, Result};
use crate::settings::{PreviewSettings, UpdateMode};
use figment::{
    Figment,
    providers::{Env, Format as _, Serialized, Toml},
};
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::Path;

/// Keys only user-level sources may set. They decide whether a project's own
/// code runs, so the project's config files are not consulted for them.
pub const USER_ONLY_KEYS: [&str; 5] = [
    "trustedFolders",
    "trusted_folders",
    "scriptsEnabled",
    "scripts_enabled",
    "roots",
];

/// Explicit overrides, typically from command-line flags.
///
/// Only fields that are `Some` participate in the merge.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_mode: Option<UpdateMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debounce_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scripts_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub development: Option<bool>,
}

/// Load settings for the project rooted at `root`.
///
/// Priority: overrides > `GLIMPSE_*` environment > user file > project file >
/// defaults. The project layer never contributes [`USER_ONLY_KEYS`]. A
/// missing user file is skipped; see [`crate::user_config_file`] for its
/// default location.
pub fn load_layered(
    root: &Path,
    user_file: Option<&Path>,
    overrides: &SettingsOverrides,
) -> Result<PreviewSettings> {
    let mut figment = Figment::new().merge(Serialized::defaults(PreviewSettings::default()));

    if let Some(project) = project_layer(root)? {
        figment = figment.merge(Serialized::defaults(project));
    }

    if let Some(path) = user_file.filter(|path| path.is_file()) {
        tracing::debug!(path = %path.display(), "loading user settings");
        figment = figment.merge(Toml::file(path));
    }

    figment = figment
        .merge(Env::prefixed("GLIMPSE_"))
        .merge(Serialized::defaults(overrides));

    let settings: PreviewSettings = figment.extract()?;
    crate::validation::validate(&settings)?;
    Ok(settings)
}

/// The discovered project config as a key map, minus [`USER_ONLY_KEYS`].
fn project_layer(root: &Path) -> Result<Option<Map<String, Value>>> {
    let mut layer: Map<String, Value> = match ConfigDiscovery::new(root).find() {
        Some(ConfigSource::Toml(path)) => {
            tracing::debug!(path = %path.display(), "loading settings from toml");
            Figment::from(Toml::file(&path)).extract()?
        }
        Some(ConfigSource::PackageJson(path)) => {
            tracing::debug!(path = %path.display(), "loading settings from package.json");
            let content = std::fs::read_to_string(&path)?;
            let parsed: Value = serde_json::from_str(&content).map_err(|e| ConfigError::InvalidValue {
                field: "package.json".to_string(),
                hint: Some(format!("Invalid JSON: {e}")),
            })?;
            match parsed.get("glimpse") {
                Some(Value::Object(fields)) => fields.clone(),
                _ => {
                    return Err(ConfigError::InvalidValue {
                        field: "package.json".to_string(),
                        hint: Some("the `glimpse` field must be an object".to_string()),
                    });
                }
            }
        }
        None => return Ok(None),
    };

    for key in USER_ONLY_KEYS {
        if layer.remove(key).is_some() {
            tracing::warn!(key, root = %root.display(), "project config cannot set this key; ignored");
        }
    }
    Ok(Some(layer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn overrides_beat_file_values() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("glimpse.toml"),
            "updateMode = \"onSave\"\ndebounceMs = 50\n",
        )
        .unwrap();

        let overrides = SettingsOverrides {
            update_mode: Some(UpdateMode::Manual),
            ..Default::default()
        };
        let settings = load_layered(dir.path(), None, &overrides).unwrap();
        assert_eq!(settings.update_mode, UpdateMode::Manual);
        assert_eq!(settings.debounce_ms, 50);
    }

    #[test]
    fn invalid_file_value_is_reported() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("glimpse.toml"), "debounceMs = \"soon\"\n").unwrap();
        let err = load_layered(dir.path(), None, &SettingsOverrides::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Extract(_)));
    }

    #[test]
    fn project_files_cannot_grant_trust() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("glimpse.toml"),
            "debounceMs = 40\nscriptsEnabled = true\ntrusted_folders = [\".\"]\ntrustedFolders = [\".\"]\nroots = [\"/\"]\n",
        )
        .unwrap();

        let settings = load_layered(dir.path(), None, &SettingsOverrides::default()).unwrap();
        assert_eq!(settings.debounce_ms, 40);
        assert!(!settings.scripts_enabled);
        assert!(settings.trusted_folders.is_empty());
        assert!(settings.roots.is_empty());
        assert!(!settings.is_folder_trusted(dir.path()));
    }

    #[test]
    fn package_json_cannot_grant_trust() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("package.json"),
            r#"{"glimpse": {"scriptsEnabled": true, "trustedFolders": ["."], "roots": ["/"]}}"#,
        )
        .unwrap();

        let settings = load_layered(dir.path(), None, &SettingsOverrides::default()).unwrap();
        assert!(!settings.scripts_enabled);
        assert!(settings.trusted_folders.is_empty());
        assert!(settings.roots.is_empty());
    }

    #[test]
    fn user_file_grants_trust() {
        let project = TempDir::new().unwrap();
        let home = TempDir::new().unwrap();
        std::fs::write(project.path().join("glimpse.toml"), "debounceMs = 40\n").unwrap();
        let user_file = home.path().join("config.toml");
        std::fs::write(
            &user_file,
            format!(
                "scriptsEnabled = true\ntrustedFolders = [{:?}]\nroots = [\"docs\"]\n",
                project.path().display().to_string()
            ),
        )
        .unwrap();

        let settings = load_layered(project.path(), Some(&user_file), &SettingsOverrides::default()).unwrap();
        assert_eq!(settings.debounce_ms, 40);
        assert!(settings.scripts_enabled);
        assert!(settings.is_folder_trusted(project.path()));
        assert_eq!(settings.roots, vec![PathBuf::from("docs")]);
    }

    #[test]
    fn missing_user_file_is_skipped() {
        let dir = TempDir::new().unwrap();
        let absent = dir.path().join("nope/config.toml");
        let settings = load_layered(dir.path(), Some(&absent), &SettingsOverrides::default()).unwrap();
        assert_eq!(settings, PreviewSettings::default());
    }

    #[test]
    fn non_object_package_field_is_rejected() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("package.json"), r#"{"glimpse": "yes"}"#).unwrap();
        let err = load_layered(dir.path(), None, &SettingsOverrides::default()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }
}
