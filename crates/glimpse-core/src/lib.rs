//! # glimpse-core
//!
//! Trust-gated live preview for MDX documents.
//!
//! A document is evaluated in one of two modes. Safe mode produces static
//! HTML and never runs document code. Trusted mode compiles the document to a
//! module that the rendering surface executes, pulling its imports back
//! through [`FetchService`]. Every module request is resolved by
//! [`ModuleResolver`] and confined to the project by [`PathBoundary`].
//!
//! [`PreviewSession`] owns the render schedule for one document: version
//! tracking, staleness, the update-mode policy, debouncing, and the watch set
//! for local dependencies.

pub mod boundary;
pub mod context;
pub mod csp;
pub mod disposable;
pub mod document;
pub mod error;
pub mod fetch;
pub mod markup;
pub mod resolver;
pub mod runtime;
pub mod session;
pub mod surface;
pub mod trust;
pub mod watcher;

pub use boundary::PathBoundary;
pub use context::PreviewContext;
pub use csp::{ContentSecurityPolicy, new_nonce};
pub use disposable::Disposable;
pub use document::{DocumentRef, DocumentScheme};
pub use error::{ErrorPayload, PreviewError, Result};
pub use fetch::{ContentFetcher, ContentKind, FetchTarget, ResolvedUnit};
pub use markup::{MarkupCompiler, MarkupPlugin, MdxCompiler, PluginRegistry};
pub use resolver::{ModuleRequest, ModuleResolver, ResolvedModule};
pub use runtime::{DocumentBuffers, MemoryRuntime, NativeRuntime, Runtime, RuntimeError};
pub use session::{FetchService, PreviewSession, SessionEvent, SessionHandle, SessionStatus};
pub use surface::{PreviewSurface, RecordingSurface, SurfaceMessage};
pub use trust::{HostTrust, SecurityMode, TrustGate, TrustSource, TrustState};
pub use watcher::{DependencyWatcher, FileChange, NotifyWatchFactory, WatchFactory};

pub use glimpse_config::{PreviewSettings, SettingsStore, UpdateMode};
