//! File-based config discovery.
//!
//! Handles finding the glimpse configuration for a project directory, and
//! the per-user settings file that sits outside any project.

#![allow(clippy::disallowed_methods)]

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

/// Where the settings for a project came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Toml(PathBuf),
    PackageJson(PathBuf),
}

impl ConfigSource {
    pub fn path(&self) -> &Path {
        match self {
            ConfigSource::Toml(path) | ConfigSource::PackageJson(path) => path,
        }
    }
}

/// File-based configuration discovery
///
/// # Example
///
/// ```no_run
/// use glimpse_config::ConfigDiscovery;
///
/// let discovery = ConfigDiscovery::new(".");
/// if let Some(source) = discovery.find() {
///     println!("settings from {}", source.path().display());
/// }
/// ```
pub struct ConfigDiscovery {
    root: PathBuf,
}

impl ConfigDiscovery {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Find a config source in the root directory
    ///
    /// Searches in this order:
    /// 1. TOML config: glimpse.toml
    /// 2. package.json (non-null `glimpse` field)
    pub fn find(&self) -> Option<ConfigSource> {
        let toml_path = self.root.join("glimpse.toml");
        if toml_path.is_file() {
            return Some(ConfigSource::Toml(toml_path));
        }

        let pkg_path = self.root.join("package.json");
        if pkg_path.is_file() {
            if let Ok(content) = fs::read_to_string(&pkg_path) {
                if let Ok(parsed) = serde_json::from_str::<Value>(&content) {
                    if parsed.get("glimpse").is_some_and(|v| !v.is_null()) {
                        return Some(ConfigSource::PackageJson(pkg_path));
                    }
                }
            }
        }

        None
    }

    /// Paths whose modification should trigger a settings reload.
    pub fn watched_files(&self) -> Vec<PathBuf> {
        vec![self.root.join("glimpse.toml"), self.root.join("package.json")]
    }
}

/// The per-user settings file.
///
/// `$XDG_CONFIG_HOME/glimpse/config.toml` when that variable is set,
/// otherwise `~/.config/glimpse/config.toml`.
pub fn user_config_file() -> Option<PathBuf> {
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME").filter(|dir| !dir.is_empty()) {
        return Some(PathBuf::from(xdg).join("glimpse").join("config.toml"));
    }
    home::home_dir().map(|home| home.join(".config").join("glimpse").join("config.toml"))
}
