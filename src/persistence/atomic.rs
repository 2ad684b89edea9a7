//! Whole-document load and atomic replacement on disk.

use std::path::Path;
use std::time::{Duration, SystemTime};

use serde::de::DeserializeOwned;

use crate::error::TrackerError;

/// Loads and parses a JSON document.
///
/// A missing file yields `D::default()`. A file that cannot be parsed is
/// logged and also yields `D::default()`; the next commit overwrites it.
///
/// # Errors
///
/// Returns [`TrackerError::Io`] if the file exists but cannot be read.
pub async fn load<D: DeserializeOwned + Default>(path: &Path) -> Result<D, TrackerError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(D::default()),
        Err(e) => return Err(TrackerError::Io(e)),
    };
    match serde_json::from_slice(&bytes) {
        Ok(doc) => Ok(doc),
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                len = bytes.len(),
                "malformed document; treating as empty"
            );
            Ok(D::default())
        }
    }
}

/// Replaces `path` with `bytes` so readers see either the old or the new
/// content, never a partial write.
///
/// Writes a temporary sibling, syncs it, renames it over `path`, then
/// syncs the directory on a best-effort basis.
///
/// # Errors
///
/// Returns [`TrackerError::Io`] if the temporary file cannot be written or
/// renamed. The previous document is left untouched in that case.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), TrackerError> {
    let parent = path.parent().ok_or_else(|| {
        TrackerError::Internal(format!("document path {} has no parent", path.display()))
    })?;
    let tmp = parent.join(format!(
        ".{}.tmp.{}",
        path.file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("document"),
        std::process::id()
    ));

    if let Err(e) = write_synced(&tmp, bytes).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e);
    }
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(TrackerError::Io(e));
    }
    if let Ok(dir) = tokio::fs::File::open(parent).await {
        let _ = dir.sync_all().await;
    }
    Ok(())
}

async fn write_synced(path: &Path, bytes: &[u8]) -> Result<(), TrackerError> {
    use tokio::io::AsyncWriteExt as _;

    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.flush().await?;
    file.sync_all().await?;
    Ok(())
}

/// Removes temporary files left behind by commits that were interrupted
/// before their rename. Files modified within `min_age` are kept since
/// another process may still be writing them. Returns how many were
/// removed.
///
/// # Errors
///
/// Returns [`TrackerError::Io`] if `dir` cannot be listed.
pub async fn sweep_temp_files(dir: &Path, min_age: Duration) -> Result<usize, TrackerError> {
    let mut removed = 0;
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !(name.starts_with('.') && name.contains(".json.tmp.")) {
            continue;
        }
        let age = entry
            .metadata()
            .await
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| SystemTime::now().duration_since(modified).ok())
            .unwrap_or(Duration::ZERO);
        if age >= min_age {
            match tokio::fs::remove_file(entry.path()).await {
                Ok(()) => removed += 1,
                Err(e) => tracing::debug!(file = name, error = %e, "could not remove temp file"),
            }
        }
    }
    Ok(removed)
}
