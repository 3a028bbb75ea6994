//! Local filesystem storage backend.
//!
//! Stores objects as plain files under a root directory, keyed by their
//! bucket-relative path. Used by tests and single-node deployments where no
//! object store is available.

use crate::traits::{Storage, StorageError, StorageResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

#[derive(Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, key: &str) -> StorageResult<PathBuf> {
        if key.starts_with('/') || key.split('/').any(|seg| seg == "..") {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn download_to_path(&self, key: &str, dest: &Path) -> StorageResult<()> {
        let src = self.resolve(key)?;
        if !src.is_file() {
            return Err(StorageError::NotFound(key.to_string()));
        }
        tokio::fs::copy(&src, dest).await?;
        tracing::debug!(key = %key, dest = %dest.display(), "local download");
        Ok(())
    }

    async fn upload_file(&self, src: &Path, key: &str, _content_type: &str) -> StorageResult<()> {
        let dest = self.resolve(key)?;
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(src, &dest).await?;
        tracing::debug!(key = %key, src = %src.display(), "local upload");
        Ok(())
    }
}
