//! Locating the project for a document and building its preview context.

#![allow(clippy::disallowed_methods)]

use glimpse_config::{
    ConfigDiscovery, PreviewSettings, SettingsOverrides, SettingsStore, load_layered, user_config_file,
};
use glimpse_core::{DocumentRef, HostTrust, PreviewContext, TrustGate};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cli::ProjectArgs;
use crate::error::{CliError, Result};

/// Nearest ancestor of `start` holding `glimpse.toml` or `package.json`.
pub fn find_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join("glimpse.toml").is_file() || dir.join("package.json").is_file())
        .map(Path::to_path_buf)
}

pub struct Project {
    root: PathBuf,
    document: PathBuf,
    user_config: Option<PathBuf>,
    overrides: SettingsOverrides,
    trust_flag: bool,
    host: Arc<HostTrust>,
    ctx: PreviewContext,
}

impl Project {
    pub fn open(file: &Path, args: &ProjectArgs) -> Result<Self> {
        let document = file
            .canonicalize()
            .map_err(|_| CliError::FileNotFound(file.to_path_buf()))?;
        if !document.is_file() {
            return Err(CliError::InvalidArgument(format!(
                "{} is not a file",
                document.display()
            )));
        }
        let doc_dir = document.parent().unwrap_or(Path::new("/")).to_path_buf();
        let root = match &args.root {
            Some(root) => root
                .canonicalize()
                .map_err(|_| CliError::FileNotFound(root.clone()))?,
            None => find_root(&doc_dir).unwrap_or(doc_dir),
        };
        if !document.starts_with(&root) {
            return Err(CliError::InvalidArgument(format!(
                "{} is outside the project root {}",
                document.display(),
                root.display()
            )));
        }

        let overrides = args.overrides();
        let user_config = args.user_config.clone().or_else(user_config_file);
        let settings = load_layered(&root, user_config.as_deref(), &overrides)?;
        let trusted = args.trust || settings.is_folder_trusted(&root);
        let host = Arc::new(HostTrust::new(trusted, settings.scripts_enabled));
        tracing::debug!(
            root = %root.display(),
            trusted,
            scripts = settings.scripts_enabled,
            "project opened"
        );

        let ctx = PreviewContext::builder()
            .trust(Arc::new(TrustGate::new(host.clone())))
            .roots(settings.resolved_roots(&root))
            .settings(Arc::new(SettingsStore::new(settings)))
            .build();

        Ok(Self {
            root,
            document,
            user_config,
            overrides,
            trust_flag: args.trust,
            host,
            ctx,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn document(&self) -> &Path {
        &self.document
    }

    pub fn document_ref(&self) -> DocumentRef {
        DocumentRef::file(&self.document)
    }

    pub fn context(&self) -> &PreviewContext {
        &self.ctx
    }

    pub fn settings(&self) -> PreviewSettings {
        self.ctx.settings.current()
    }

    /// Files whose change means settings must be reloaded.
    pub fn config_files(&self) -> Vec<PathBuf> {
        let mut files = ConfigDiscovery::new(&self.root).watched_files();
        files.extend(self.user_config.clone());
        files
    }

    /// Re-read settings from disk and publish them.
    ///
    /// Roots are re-applied, and listeners are told about trust changes when
    /// project trust or the scripts setting flipped. Returns whether anything
    /// changed.
    pub fn reload_settings(&self) -> Result<bool> {
        let settings = load_layered(&self.root, self.user_config.as_deref(), &self.overrides)?;
        let trusted = self.trust_flag || settings.is_folder_trusted(&self.root);
        let trust_flipped = self.host.set_workspace_trusted(trusted)
            | self.host.set_scripts_enabled(settings.scripts_enabled);

        let roots = settings.resolved_roots(&self.root);
        if roots != self.ctx.boundary.roots() {
            self.ctx.set_roots(roots);
        }
        let changed = self.ctx.settings.replace(settings);
        if trust_flipped {
            self.ctx.trust.trust_changed();
        }
        Ok(changed || trust_flipped)
    }
}

impl std::fmt::Debug for Project {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Project")
            .field("root", &self.root)
            .field("document", &self.document)
            .finish_non_exhaustive()
    }
}
