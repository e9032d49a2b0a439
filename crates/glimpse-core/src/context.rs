//! Process-scoped collaborators shared by every preview session.

use glimpse_config::SettingsStore;
use std::path::PathBuf;
use std::sync::Arc;

use crate::boundary::PathBoundary;
use crate::fetch::ContentFetcher;
use crate::markup::{MarkupCompiler, MdxCompiler, PluginRegistry};
use crate::resolver::ModuleResolver;
use crate::runtime::{DocumentBuffers, NativeRuntime, Runtime};
use crate::trust::TrustGate;
use crate::watcher::{NotifyWatchFactory, WatchFactory};

/// Passed to every session instead of global singletons.
///
/// ```no_run
/// use glimpse_core::{HostTrust, PreviewContext, TrustGate};
/// use std::sync::Arc;
///
/// let trust = Arc::new(TrustGate::new(Arc::new(HostTrust::new(true, true))));
/// let ctx = PreviewContext::builder()
///     .trust(trust)
///     .roots(vec!["/work/site".into()])
///     .build();
/// ```
#[derive(Clone)]
pub struct PreviewContext {
    pub trust: Arc<TrustGate>,
    pub boundary: Arc<PathBoundary>,
    pub resolver: Arc<ModuleResolver>,
    pub fetcher: Arc<ContentFetcher>,
    pub buffers: Arc<DocumentBuffers>,
    pub compiler: Arc<dyn MarkupCompiler>,
    pub plugins: Arc<PluginRegistry>,
    pub watch_factory: Arc<dyn WatchFactory>,
    pub settings: Arc<SettingsStore>,
}

#[bon::bon]
impl PreviewContext {
    #[builder]
    pub fn new(
        trust: Arc<TrustGate>,
        roots: Vec<PathBuf>,
        #[builder(default)] settings: Arc<SettingsStore>,
        runtime: Option<Arc<dyn Runtime>>,
        buffers: Option<Arc<DocumentBuffers>>,
        compiler: Option<Arc<dyn MarkupCompiler>>,
        plugins: Option<Arc<PluginRegistry>>,
        watch_factory: Option<Arc<dyn WatchFactory>>,
    ) -> Self {
        let boundary = Arc::new(PathBoundary::new(roots));
        let resolver = Arc::new(ModuleResolver::new(boundary.clone()));
        let runtime = runtime.unwrap_or_else(|| Arc::new(NativeRuntime));
        let buffers = buffers.unwrap_or_default();
        let compiler = compiler.unwrap_or_else(|| Arc::new(MdxCompiler));
        let fetcher = Arc::new(ContentFetcher::new(
            resolver.clone(),
            runtime,
            buffers.clone(),
            compiler.clone(),
        ));
        Self {
            trust,
            boundary,
            resolver,
            fetcher,
            buffers,
            compiler,
            plugins: plugins.unwrap_or_default(),
            watch_factory: watch_factory.unwrap_or_else(|| Arc::new(NotifyWatchFactory)),
            settings,
        }
    }

    /// Replace the boundary roots; cached lookups are dropped.
    pub fn set_roots(&self, roots: Vec<PathBuf>) {
        self.boundary.set_roots(roots);
        self.resolver.invalidate();
    }
}

impl std::fmt::Debug for PreviewContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreviewContext")
            .field("trust", &self.trust)
            .field("roots", &self.boundary.roots())
            .finish_non_exhaustive()
    }
}
