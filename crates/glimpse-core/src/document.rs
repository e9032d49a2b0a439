//! Identity of a previewed document.

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Storage scheme of a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DocumentScheme {
    /// A file on local disk.
    File,
    /// An unsaved buffer that has never been written.
    Untitled,
    /// Anything else (virtual filesystems, remote providers, ...).
    Other(String),
}

impl DocumentScheme {
    pub fn parse(scheme: &str) -> Self {
        match scheme {
            "file" => DocumentScheme::File,
            "untitled" => DocumentScheme::Untitled,
            other => DocumentScheme::Other(other.to_string()),
        }
    }

    /// Local files and unsaved local buffers.
    pub fn is_local(&self) -> bool {
        matches!(self, DocumentScheme::File | DocumentScheme::Untitled)
    }
}

impl fmt::Display for DocumentScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentScheme::File => f.write_str("file"),
            DocumentScheme::Untitled => f.write_str("untitled"),
            DocumentScheme::Other(scheme) => f.write_str(scheme),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentRef {
    pub scheme: DocumentScheme,
    pub path: PathBuf,
}

impl DocumentRef {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            scheme: DocumentScheme::File,
            path: path.into(),
        }
    }

    pub fn untitled(name: impl Into<PathBuf>) -> Self {
        Self {
            scheme: DocumentScheme::Untitled,
            path: name.into(),
        }
    }

    /// Parse `scheme:rest` URIs. Strings without a scheme are local file paths.
    pub fn from_uri(uri: &str) -> Self {
        if let Some(path) = uri.strip_prefix("file://") {
            return DocumentRef::file(path);
        }
        match uri.split_once(':') {
            // A single letter before the colon is a drive, not a scheme.
            Some((scheme, rest)) if scheme.len() > 1 && is_scheme(scheme) => Self {
                scheme: DocumentScheme::parse(scheme),
                path: PathBuf::from(rest.trim_start_matches("//")),
            },
            _ => DocumentRef::file(uri),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory imports are resolved against.
    pub fn base_dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new(""))
    }
}

fn is_scheme(candidate: &str) -> bool {
    let mut chars = candidate.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_uris() {
        assert_eq!(
            DocumentRef::from_uri("file:///proj/a.mdx"),
            DocumentRef::file("/proj/a.mdx")
        );
        assert_eq!(
            DocumentRef::from_uri("untitled:Untitled-1").scheme,
            DocumentScheme::Untitled
        );
        assert_eq!(
            DocumentRef::from_uri("vscode-vfs://github/org/repo/a.mdx").scheme,
            DocumentScheme::Other("vscode-vfs".into())
        );
        assert_eq!(DocumentRef::from_uri("/plain/path.mdx").scheme, DocumentScheme::File);
        assert_eq!(DocumentRef::from_uri("C:\\docs\\a.mdx").scheme, DocumentScheme::File);
    }
}
