//! Scoped per-document locking.
//!
//! Two [`ScopedLock`] implementations exist:
//!
//! - [`FileLock`]: an in-process reader/writer lock per document followed by
//!   an OS advisory lock on a sidecar `<name>.lock` file. Safe across
//!   processes sharing the data directory.
//! - [`ProcessLock`]: the in-process lock only. Serializes writers inside
//!   one process; **multiple processes writing the same data directory are
//!   not protected** and may lose updates.
//!
//! The sidecar file is locked instead of the document itself because the
//! atomic commit renames a new file over the document, which would leave a
//! lock held on the old inode.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::future::BoxFuture;
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

use crate::error::TrackerError;

/// Lock implementation requested at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockBackend {
    /// Probe OS advisory locking and fall back to [`LockBackend::Process`].
    #[default]
    Auto,
    /// OS advisory file locks (multi-process safe).
    File,
    /// In-process locks only (single process assumed).
    Process,
}

impl FromStr for LockBackend {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "file" | "os" => Ok(Self::File),
            "process" | "mutex" => Ok(Self::Process),
            other => Err(TrackerError::InvalidConfig(format!(
                "unknown TRACKER_LOCK_BACKEND {other:?}"
            ))),
        }
    }
}

/// Requested access level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Concurrent readers allowed.
    Shared,
    /// Single holder, excludes readers and writers.
    Exclusive,
}

#[derive(Debug)]
enum ProcessGuard {
    Shared { _guard: OwnedRwLockReadGuard<()> },
    Exclusive { _guard: OwnedRwLockWriteGuard<()> },
}

/// Held lock on one document. Released on drop.
#[derive(Debug)]
pub struct DocumentGuard {
    _process: ProcessGuard,
    file: Option<File>,
}

impl Drop for DocumentGuard {
    fn drop(&mut self) {
        if let Some(file) = self.file.take()
            && let Err(e) = file.unlock()
        {
            tracing::warn!(error = %e, "failed to release advisory lock");
        }
    }
}

/// Scoped lock acquisition capability used by the document store.
pub trait ScopedLock: Send + Sync + std::fmt::Debug {
    /// Waits until `document` can be held in `mode`.
    fn acquire(
        &self,
        document: &'static str,
        mode: LockMode,
    ) -> BoxFuture<'_, Result<DocumentGuard, TrackerError>>;

    /// Short name for logs.
    fn kind(&self) -> &'static str;
}

/// In-process reader/writer lock per document name.
#[derive(Debug, Default)]
pub struct ProcessLock {
    locks: Mutex<HashMap<&'static str, Arc<RwLock<()>>>>,
}

impl ProcessLock {
    /// Creates an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, document: &'static str) -> Arc<RwLock<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(document).or_default())
    }

    async fn acquire_process(&self, document: &'static str, mode: LockMode) -> ProcessGuard {
        let slot = self.slot(document);
        match mode {
            LockMode::Shared => ProcessGuard::Shared {
                _guard: slot.read_owned().await,
            },
            LockMode::Exclusive => ProcessGuard::Exclusive {
                _guard: slot.write_owned().await,
            },
        }
    }
}

impl ScopedLock for ProcessLock {
    fn acquire(
        &self,
        document: &'static str,
        mode: LockMode,
    ) -> BoxFuture<'_, Result<DocumentGuard, TrackerError>> {
        Box::pin(async move {
            Ok(DocumentGuard {
                _process: self.acquire_process(document, mode).await,
                file: None,
            })
        })
    }

    fn kind(&self) -> &'static str {
        "process"
    }
}

/// In-process lock plus OS advisory lock on `<data_dir>/<name>.lock`.
#[derive(Debug)]
pub struct FileLock {
    process: ProcessLock,
    data_dir: PathBuf,
}

impl FileLock {
    /// Creates a file lock rooted at `data_dir`.
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            process: ProcessLock::new(),
            data_dir: data_dir.into(),
        }
    }

    fn lock_path(&self, document: &str) -> PathBuf {
        self.data_dir.join(format!("{document}.lock"))
    }

    /// Checks whether the filesystem under `data_dir` honours advisory
    /// locks by taking and releasing one on a probe file.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error; `ErrorKind::Unsupported` means the
    /// platform has no advisory locking.
    pub async fn probe(data_dir: &Path) -> Result<(), std::io::Error> {
        let path = data_dir.join(".lock-probe");
        tokio::task::spawn_blocking(move || {
            let file = open_lock_file(&path)?;
            file.lock()?;
            file.unlock()
        })
        .await
        .map_err(std::io::Error::other)?
    }
}

impl ScopedLock for FileLock {
    fn acquire(
        &self,
        document: &'static str,
        mode: LockMode,
    ) -> BoxFuture<'_, Result<DocumentGuard, TrackerError>> {
        Box::pin(async move {
            let process = self.process.acquire_process(document, mode).await;
            let path = self.lock_path(document);
            let file = tokio::task::spawn_blocking(move || {
                let file = open_lock_file(&path)?;
                match mode {
                    LockMode::Shared => file.lock_shared()?,
                    LockMode::Exclusive => file.lock()?,
                }
                Ok::<_, std::io::Error>(file)
            })
            .await?
            .map_err(|e| TrackerError::Lock {
                document: document.to_string(),
                reason: e.to_string(),
            })?;
            Ok(DocumentGuard {
                _process: process,
                file: Some(file),
            })
        })
    }

    fn kind(&self) -> &'static str {
        "file"
    }
}

fn open_lock_file(path: &Path) -> std::io::Result<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
}

/// Builds the lock implementation for `backend`, probing OS support for
/// [`LockBackend::Auto`].
///
/// # Errors
///
/// Returns [`TrackerError::Io`] if the probe fails for a reason other than
/// missing platform support (e.g. the data directory is not writable).
pub async fn select_lock(
    backend: LockBackend,
    data_dir: &Path,
) -> Result<Arc<dyn ScopedLock>, TrackerError> {
    match backend {
        LockBackend::File => Ok(Arc::new(FileLock::new(data_dir))),
        LockBackend::Process => {
            tracing::warn!(
                data_dir = %data_dir.display(),
                "in-process locking selected: only one process may write this data directory"
            );
            Ok(Arc::new(ProcessLock::new()))
        }
        LockBackend::Auto => match FileLock::probe(data_dir).await {
            Ok(()) => Ok(Arc::new(FileLock::new(data_dir))),
            Err(e) if e.kind() == std::io::ErrorKind::Unsupported => {
                tracing::warn!(
                    data_dir = %data_dir.display(),
                    error = %e,
                    "advisory file locks unsupported; falling back to in-process locking \
                     (single writer process assumed)"
                );
                Ok(Arc::new(ProcessLock::new()))
            }
            Err(e) => Err(TrackerError::Io(e)),
        },
    }
}
