//! Storage abstraction trait
//!
//! All storage backends must implement [`Storage`]. The pipeline only ever
//! needs three operations: fetch one object to a local path, put one local
//! file, and put a whole directory tree under a remote prefix.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Content type for an HLS artifact, by file extension.
pub fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("m3u8") => "application/vnd.apple.mpegurl",
        Some("ts") => "video/mp2t",
        _ => "application/octet-stream",
    }
}

/// Storage abstraction trait
///
/// Keys are bucket-relative paths (`/`-separated, no leading slash). Uploads
/// are overwrite-safe: re-uploading a key replaces the object, which is what
/// makes whole-job retries idempotent given deterministic output names.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Download the object at `key` into the local file at `dest`.
    ///
    /// Parent directories of `dest` must already exist. A missing object is
    /// reported as [`StorageError::NotFound`].
    async fn download_to_path(&self, key: &str, dest: &Path) -> StorageResult<()>;

    /// Upload one local file to `key`.
    async fn upload_file(&self, src: &Path, key: &str, content_type: &str) -> StorageResult<()>;

    /// Upload every file under `local_dir` to `remote_prefix`, preserving
    /// paths relative to `local_dir`.
    ///
    /// The first failing transfer aborts the walk; already-uploaded files are
    /// not rolled back.
    async fn upload_tree(&self, local_dir: &Path, remote_prefix: &str) -> StorageResult<()> {
        let mut pending: Vec<PathBuf> = vec![local_dir.to_path_buf()];

        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                    continue;
                }
                let relative = path.strip_prefix(local_dir).map_err(|_| {
                    StorageError::InvalidKey(format!(
                        "path {} escapes upload root",
                        path.display()
                    ))
                })?;
                let key = format!(
                    "{}/{}",
                    remote_prefix.trim_end_matches('/'),
                    relative.to_string_lossy().replace('\\', "/")
                );
                self.upload_file(&path, &key, content_type_for(&path)).await?;
            }
        }

        Ok(())
    }
}
