//! Filesystem access and the in-memory edit buffers.
//!
//! Content reads go through [`Runtime`] so tests and hosts can substitute
//! their own storage. [`DocumentBuffers`] holds unsaved editor text, keyed by
//! normalized path, and is consulted before disk when the session policy says so.
//!
//! Module resolution and the dependency watcher probe the native filesystem
//! directly; only document and module content flows through here.

#![allow(clippy::disallowed_methods)]

use async_trait::async_trait;
use parking_lot::RwLock;
use path_clean::PathClean;
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};

pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("I/O error on {}: {message}", path.display())]
    Io { path: PathBuf, message: String },
}

impl RuntimeError {
    fn from_io(path: &Path, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            RuntimeError::FileNotFound(path.to_path_buf())
        } else {
            RuntimeError::Io {
                path: path.to_path_buf(),
                message: err.to_string(),
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileMetadata {
    pub size: u64,
    pub is_dir: bool,
    pub is_file: bool,
}

#[async_trait]
pub trait Runtime: Send + Sync + std::fmt::Debug {
    async fn read_file(&self, path: &Path) -> RuntimeResult<Vec<u8>>;

    async fn metadata(&self, path: &Path) -> RuntimeResult<FileMetadata>;

    fn exists(&self, path: &Path) -> bool;

    async fn read_to_string(&self, path: &Path) -> RuntimeResult<String> {
        let bytes = self.read_file(path).await?;
        String::from_utf8(bytes).map_err(|e| RuntimeError::Io {
            path: path.to_path_buf(),
            message: format!("not valid UTF-8: {e}"),
        })
    }
}

/// Runtime backed by the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeRuntime;

#[async_trait]
impl Runtime for NativeRuntime {
    async fn read_file(&self, path: &Path) -> RuntimeResult<Vec<u8>> {
        tokio::fs::read(path)
            .await
            .map_err(|e| RuntimeError::from_io(path, e))
    }

    async fn metadata(&self, path: &Path) -> RuntimeResult<FileMetadata> {
        let meta = tokio::fs::metadata(path)
            .await
            .map_err(|e| RuntimeError::from_io(path, e))?;
        Ok(FileMetadata {
            size: meta.len(),
            is_dir: meta.is_dir(),
            is_file: meta.is_file(),
        })
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

/// In-memory runtime for hosts without a real filesystem, and for tests.
#[derive(Debug, Default)]
pub struct MemoryRuntime {
    files: RwLock<FxHashMap<PathBuf, Vec<u8>>>,
}

impl MemoryRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        self.files
            .write()
            .insert(normalize(path.as_ref()), content.into());
    }

    pub fn remove(&self, path: impl AsRef<Path>) -> bool {
        self.files.write().remove(&normalize(path.as_ref())).is_some()
    }
}

#[async_trait]
impl Runtime for MemoryRuntime {
    async fn read_file(&self, path: &Path) -> RuntimeResult<Vec<u8>> {
        self.files
            .read()
            .get(&normalize(path))
            .cloned()
            .ok_or_else(|| RuntimeError::FileNotFound(path.to_path_buf()))
    }

    async fn metadata(&self, path: &Path) -> RuntimeResult<FileMetadata> {
        let files = self.files.read();
        let key = normalize(path);
        if let Some(content) = files.get(&key) {
            return Ok(FileMetadata {
                size: content.len() as u64,
                is_dir: false,
                is_file: true,
            });
        }
        if files.keys().any(|file| file.starts_with(&key)) {
            return Ok(FileMetadata {
                size: 0,
                is_dir: true,
                is_file: false,
            });
        }
        Err(RuntimeError::FileNotFound(path.to_path_buf()))
    }

    fn exists(&self, path: &Path) -> bool {
        let key = normalize(path);
        self.files.read().keys().any(|file| file.starts_with(&key))
    }
}

/// Snapshot of one open editor buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferSnapshot {
    pub text: String,
    pub version: i64,
}

/// Unsaved editor text, keyed by normalized absolute path.
#[derive(Debug, Default)]
pub struct DocumentBuffers {
    buffers: RwLock<FxHashMap<PathBuf, BufferSnapshot>>,
}

impl DocumentBuffers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open or replace the buffer for `path`. Older versions are ignored.
    pub fn update(&self, path: &Path, text: impl Into<String>, version: i64) -> bool {
        let key = normalize(path);
        let mut buffers = self.buffers.write();
        if let Some(existing) = buffers.get(&key) {
            if existing.version > version {
                return false;
            }
        }
        buffers.insert(
            key,
            BufferSnapshot {
                text: text.into(),
                version,
            },
        );
        true
    }

    pub fn close(&self, path: &Path) -> Option<BufferSnapshot> {
        self.buffers.write().remove(&normalize(path))
    }

    pub fn get(&self, path: &Path) -> Option<BufferSnapshot> {
        self.buffers.read().get(&normalize(path)).cloned()
    }

    pub fn is_open(&self, path: &Path) -> bool {
        self.buffers.read().contains_key(&normalize(path))
    }
}

fn normalize(path: &Path) -> PathBuf {
    path.to_path_buf().clean()
}
