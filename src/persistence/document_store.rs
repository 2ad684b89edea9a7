//! File-backed document store with scoped locking and atomic commit.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use super::atomic;
use super::lock::{LockBackend, LockMode, ScopedLock, select_lock};
use super::models::Document;
use crate::error::TrackerError;

/// Temp files younger than this are assumed to belong to a live writer.
const STALE_TEMP_AGE: Duration = Duration::from_secs(600);

/// Durable storage of independent named JSON documents.
///
/// Cheap to clone; clones share the same lock table.
///
/// # Concurrency
///
/// - [`DocumentStore::read`] holds a shared lock while loading.
/// - [`DocumentStore::modify`] holds an exclusive lock across reload,
///   mutation and commit, so two `modify` calls on the same document are
///   serialized and neither can lose the other's update.
/// - Different documents never block each other and are never committed
///   together.
///
/// Cross-process safety depends on the lock backend; see
/// [`super::lock`].
#[derive(Debug, Clone)]
pub struct DocumentStore {
    data_dir: Arc<Path>,
    lock: Arc<dyn ScopedLock>,
}

impl DocumentStore {
    /// Opens (creating if needed) `data_dir` and selects the lock backend.
    ///
    /// Leftover temp files from interrupted commits are removed.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Io`] if the directory cannot be created or
    /// the lock probe fails for a reason other than missing support.
    pub async fn open(
        data_dir: impl Into<PathBuf>,
        backend: LockBackend,
    ) -> Result<Self, TrackerError> {
        let data_dir: PathBuf = data_dir.into();
        tokio::fs::create_dir_all(&data_dir).await?;
        let lock = select_lock(backend, &data_dir).await?;

        match atomic::sweep_temp_files(&data_dir, STALE_TEMP_AGE).await {
            Ok(0) => {}
            Ok(removed) => tracing::info!(removed, "removed interrupted commit files"),
            Err(e) => tracing::warn!(error = %e, "could not sweep temp files"),
        }

        tracing::info!(
            data_dir = %data_dir.display(),
            lock = lock.kind(),
            "document store opened"
        );
        Ok(Self::with_lock(data_dir, lock))
    }

    /// Builds a store over an existing directory with an explicit lock.
    #[must_use]
    pub fn with_lock(data_dir: impl Into<PathBuf>, lock: Arc<dyn ScopedLock>) -> Self {
        let data_dir: PathBuf = data_dir.into();
        Self {
            data_dir: Arc::from(data_dir),
            lock,
        }
    }

    /// Directory holding the documents.
    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Name of the active lock implementation.
    #[must_use]
    pub fn lock_kind(&self) -> &'static str {
        self.lock.kind()
    }

    /// Filesystem path of document `D`.
    #[must_use]
    pub fn path_of<D: Document>(&self) -> PathBuf {
        self.data_dir.join(format!("{}.json", D::NAME))
    }

    /// Loads the current state of document `D`.
    ///
    /// A missing or malformed document reads as `D::default()`.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Lock`] or [`TrackerError::Io`] if the lock
    /// cannot be taken or the file cannot be read.
    pub async fn read<D: Document>(&self) -> Result<D, TrackerError> {
        let _guard = self.lock.acquire(D::NAME, LockMode::Shared).await?;
        atomic::load(&self.path_of::<D>()).await
    }

    /// Applies `f` to the latest on-disk state of `D` and commits the
    /// result atomically, returning whatever `f` returns.
    ///
    /// The document is always reloaded under the exclusive lock, never
    /// taken from a cache. If the commit fails the previous version stays
    /// in place and the error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Lock`], [`TrackerError::Io`] or
    /// [`TrackerError::Serialization`] on lock, read or commit failure.
    pub async fn modify<D, R, F>(&self, f: F) -> Result<R, TrackerError>
    where
        D: Document,
        F: FnOnce(&mut D) -> R,
    {
        let _guard = self.lock.acquire(D::NAME, LockMode::Exclusive).await?;
        let path = self.path_of::<D>();
        let mut doc: D = atomic::load(&path).await?;
        let out = f(&mut doc);
        let bytes = serde_json::to_vec_pretty(&doc)?;
        atomic::write_atomic(&path, &bytes).await?;
        tracing::debug!(document = D::NAME, bytes = bytes.len(), "document committed");
        Ok(out)
    }
}
