//! Schema-level validation of preview settings (no filesystem checks).

use crate::error::{ConfigError, Result};
use crate::settings::PreviewSettings;

/// Upper bound for `debounceMs`; longer delays make on-type mode feel broken.
pub const MAX_DEBOUNCE_MS: u64 = 60_000;

pub fn validate(settings: &PreviewSettings) -> Result<()> {
    if settings.debounce_ms > MAX_DEBOUNCE_MS {
        return Err(ConfigError::InvalidValue {
            field: "debounceMs".to_string(),
            hint: Some(format!(
                "{} exceeds the maximum of {MAX_DEBOUNCE_MS}",
                settings.debounce_ms
            )),
        });
    }

    if settings.handshake_timeout_ms == 0 {
        return Err(ConfigError::InvalidValue {
            field: "handshakeTimeoutMs".to_string(),
            hint: Some("use a positive timeout so a dead surface fails instead of hanging".into()),
        });
    }

    for plugin in &settings.plugins {
        if plugin.name().trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "plugins".to_string(),
                hint: Some("plugin names cannot be empty".to_string()),
            });
        }
    }

    Ok(())
}
