//! S3 storage backend built on `object_store`.

use crate::traits::{Storage, StorageError, StorageResult};
use async_trait::async_trait;
use bytes::Bytes;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path as ObjectPath;
use object_store::Error as ObjectStoreError;
use object_store::{ObjectStoreExt, PutPayload};
use std::path::Path;

/// S3 (or S3-compatible, e.g. MinIO) storage backend.
#[derive(Clone)]
pub struct S3Storage {
    store: AmazonS3,
    bucket: String,
}

impl S3Storage {
    /// Create a new S3Storage instance.
    ///
    /// Credentials come from the environment (AWS SDK conventions). Pass an
    /// `endpoint_url` for S3-compatible providers; `http://` endpoints are
    /// allowed for local development against MinIO.
    pub fn new(
        bucket: String,
        region: String,
        endpoint_url: Option<String>,
    ) -> StorageResult<Self> {
        let mut builder = AmazonS3Builder::from_env()
            .with_region(region)
            .with_bucket_name(bucket.clone());

        if let Some(ref endpoint) = endpoint_url {
            let allow_http = endpoint.starts_with("http://");
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(allow_http);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        Ok(S3Storage { store, bucket })
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn download_to_path(&self, key: &str, dest: &Path) -> StorageResult<()> {
        let start = std::time::Instant::now();
        let location = ObjectPath::from(key.to_string());

        let result = self.store.get(&location).await.map_err(|e| match e {
            ObjectStoreError::NotFound { .. } => StorageError::NotFound(key.to_string()),
            other => {
                tracing::error!(
                    error = %other,
                    bucket = %self.bucket,
                    key = %key,
                    "S3 download failed"
                );
                StorageError::DownloadFailed(other.to_string())
            }
        })?;

        let bytes = result
            .bytes()
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))?;
        let size = bytes.len() as u64;
        tokio::fs::write(dest, &bytes).await?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 download successful"
        );

        Ok(())
    }

    async fn upload_file(&self, src: &Path, key: &str, _content_type: &str) -> StorageResult<()> {
        let start = std::time::Instant::now();
        let data = tokio::fs::read(src).await?;
        let size = data.len() as u64;
        let location = ObjectPath::from(key.to_string());

        self.store
            .put(&location, PutPayload::from(Bytes::from(data)))
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %key,
                    size_bytes = size,
                    "S3 upload failed"
                );
                StorageError::UploadFailed(e.to_string())
            })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );

        Ok(())
    }
}
