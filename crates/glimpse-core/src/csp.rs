//! Content-security-policy derivation for surface documents.

use std::fmt;

use crate::error::{PreviewError, Result};
use crate::trust::SecurityMode;

/// Policy attached to one surface document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentSecurityPolicy {
    mode: SecurityMode,
    source: String,
    nonce: String,
    channel: Option<String>,
}

fn check_value(label: &str, value: &str) -> Result<()> {
    if value.is_empty() || value.contains(';') || value.contains(char::is_whitespace) {
        return Err(PreviewError::InvalidRequest(format!(
            "invalid CSP {label}: {value:?}"
        )));
    }
    Ok(())
}

impl ContentSecurityPolicy {
    /// `source` is the surface's own origin expression (for example
    /// `http://127.0.0.1:4000`); `nonce` authorizes the surface bootstrap script.
    pub fn for_mode(mode: SecurityMode, source: &str, nonce: &str) -> Result<Self> {
        check_value("source", source)?;
        check_value("nonce", nonce)?;
        Ok(Self {
            mode,
            source: source.to_string(),
            nonce: nonce.to_string(),
            channel: None,
        })
    }

    /// Allow the host transport's message channel (a single URL prefix).
    ///
    /// Only Safe mode is affected; trusted documents may already reach the
    /// whole surface origin.
    pub fn with_channel(mut self, channel: &str) -> Result<Self> {
        check_value("channel", channel)?;
        self.channel = Some(channel.to_string());
        Ok(self)
    }

    pub fn mode(&self) -> SecurityMode {
        self.mode
    }

    pub fn nonce(&self) -> &str {
        &self.nonce
    }

    pub fn directives(&self) -> Vec<(&'static str, String)> {
        let src = &self.source;
        let nonce = format!("'nonce-{}'", self.nonce);
        let (script_src, connect_src) = match self.mode {
            SecurityMode::Safe => (nonce, self.channel.clone().unwrap_or_else(|| "'none'".to_string())),
            SecurityMode::Trusted => (format!("{nonce} {src} 'unsafe-eval'"), src.clone()),
        };
        vec![
            ("default-src", "'none'".to_string()),
            ("img-src", format!("{src} https: data:")),
            ("style-src", format!("{src} 'unsafe-inline'")),
            ("font-src", format!("{src} https: data:")),
            ("script-src", script_src),
            ("connect-src", connect_src),
        ]
    }
}

impl fmt::Display for ContentSecurityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self
            .directives()
            .into_iter()
            .map(|(name, value)| format!("{name} {value}"))
            .collect();
        f.write_str(&rendered.join("; "))
    }
}

/// Fresh nonce for one surface document.
pub fn new_nonce() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SRC: &str = "http://127.0.0.1:4000";

    #[test]
    fn safe_policy_blocks_remote_scripts_and_connections() {
        let csp = ContentSecurityPolicy::for_mode(SecurityMode::Safe, SRC, "abc").unwrap();
        assert_eq!(
            csp.to_string(),
            "default-src 'none'; img-src http://127.0.0.1:4000 https: data:; \
             style-src http://127.0.0.1:4000 'unsafe-inline'; \
             font-src http://127.0.0.1:4000 https: data:; \
             script-src 'nonce-abc'; connect-src 'none'"
        );
    }

    #[test]
    fn trusted_policy_allows_surface_scripts() {
        let csp = ContentSecurityPolicy::for_mode(SecurityMode::Trusted, SRC, "abc").unwrap();
        let text = csp.to_string();
        assert!(text.contains("script-src 'nonce-abc' http://127.0.0.1:4000 'unsafe-eval'"));
        assert!(text.contains("connect-src http://127.0.0.1:4000"));
    }

    #[test]
    fn injection_in_source_is_rejected() {
        let err = ContentSecurityPolicy::for_mode(SecurityMode::Safe, "x; script-src *", "n");
        assert!(matches!(err, Err(PreviewError::InvalidRequest(_))));
    }

    #[test]
    fn channel_only_opens_safe_connect_src() {
        let channel = "http://127.0.0.1:4000/__glimpse/";
        let safe = ContentSecurityPolicy::for_mode(SecurityMode::Safe, SRC, "abc")
            .unwrap()
            .with_channel(channel)
            .unwrap();
        assert!(safe.to_string().ends_with("connect-src http://127.0.0.1:4000/__glimpse/"));
        let trusted = ContentSecurityPolicy::for_mode(SecurityMode::Trusted, SRC, "abc")
            .unwrap()
            .with_channel(channel)
            .unwrap();
        assert!(trusted.to_string().ends_with("connect-src http://127.0.0.1:4000"));
    }

    #[test]
    fn nonces_are_unique_and_simple() {
        let a = new_nonce();
        assert_eq!(a.len(), 32);
        assert_ne!(a, new_nonce());
    }
}
