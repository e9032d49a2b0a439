//! Configuration for the glimpse live preview.
//!
//! Settings are read from `glimpse.toml` (or the `glimpse` field of a
//! `package.json`), layered under the per-user settings file, `GLIMPSE_*`
//! environment variables and explicit overrides, and published through a
//! [`SettingsStore`] so that consumers observe changes by subscription rather
//! than polling.
//!
//! Trust decisions (`trustedFolders`, `scriptsEnabled`, `roots`) are only
//! taken from user-level sources. A project cannot vouch for itself.

pub mod discovery;
pub mod error;
pub mod loading;
pub mod settings;
pub mod store;
pub mod validation;

pub use discovery::{ConfigDiscovery, ConfigSource, user_config_file};
pub use error::{ConfigError, Result};
pub use loading::{SettingsOverrides, USER_ONLY_KEYS, load_layered};
pub use settings::{PluginSpec, PreviewSettings, UpdateMode};
pub use store::SettingsStore;
pub use validation::{MAX_DEBOUNCE_MS, validate};
