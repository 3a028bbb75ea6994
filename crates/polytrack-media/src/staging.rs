//! Local staging directories for one pipeline invocation.
//!
//! Layout: `<base>/<correlation_uuid>/<job_id>/{download,output}`. The
//! per-job-id level is deliberate: two jobs for the same asset (a full
//! transcode and a concurrent supplementary upload) share the remote prefix
//! but must not share local scratch space.

use std::io;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Factory for per-job staging directories.
#[derive(Clone)]
pub struct StagingArea {
    base: PathBuf,
}

/// Staging directories of one job invocation.
pub struct JobStaging {
    root: PathBuf,
    pub download_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl StagingArea {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Create the download and output directories for one job. Idempotent:
    /// existing directories are reused, never an error.
    pub async fn prepare(&self, correlation: Uuid, job_id: Uuid) -> io::Result<JobStaging> {
        let root = self.base.join(correlation.to_string()).join(job_id.to_string());
        let download_dir = root.join("download");
        let output_dir = root.join("output");
        tokio::fs::create_dir_all(&download_dir).await?;
        tokio::fs::create_dir_all(&output_dir).await?;
        Ok(JobStaging {
            root,
            download_dir,
            output_dir,
        })
    }
}

impl JobStaging {
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Remove the job's staging tree. Safe after a partial failure: absent or
    /// half-written trees are tolerated, and errors are logged rather than
    /// propagated so cleanup can run on every exit path.
    pub async fn cleanup(&self) {
        match tokio::fs::remove_dir_all(&self.root).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(
                    path = %self.root.display(),
                    error = %e,
                    "Failed to remove staging directory"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn prepare_creates_both_directories() {
        let base = TempDir::new().unwrap();
        let area = StagingArea::new(base.path());
        let staging = area.prepare(Uuid::new_v4(), Uuid::new_v4()).await.unwrap();
        assert!(staging.download_dir.is_dir());
        assert!(staging.output_dir.is_dir());
    }

    #[tokio::test]
    async fn prepare_is_idempotent() {
        let base = TempDir::new().unwrap();
        let area = StagingArea::new(base.path());
        let correlation = Uuid::new_v4();
        let job = Uuid::new_v4();
        area.prepare(correlation, job).await.unwrap();
        area.prepare(correlation, job).await.unwrap();
    }

    // Deviation from the system this replaces: staging is namespaced per job
    // invocation, not only per asset, so concurrent jobs for one asset get
    // disjoint local trees.
    #[tokio::test]
    async fn concurrent_jobs_for_one_asset_get_disjoint_dirs() {
        let base = TempDir::new().unwrap();
        let area = StagingArea::new(base.path());
        let correlation = Uuid::new_v4();
        let a = area.prepare(correlation, Uuid::new_v4()).await.unwrap();
        let b = area.prepare(correlation, Uuid::new_v4()).await.unwrap();
        assert_ne!(a.root(), b.root());
        assert!(a.root().starts_with(base.path().join(correlation.to_string())));
        assert!(b.root().starts_with(base.path().join(correlation.to_string())));
    }

    #[tokio::test]
    async fn cleanup_removes_tree_and_tolerates_absence() {
        let base = TempDir::new().unwrap();
        let area = StagingArea::new(base.path());
        let staging = area.prepare(Uuid::new_v4(), Uuid::new_v4()).await.unwrap();
        tokio::fs::write(staging.download_dir.join("in.mp4"), b"data")
            .await
            .unwrap();

        staging.cleanup().await;
        assert!(!staging.root().exists());

        // second cleanup of an already-removed tree must not panic or log an error
        staging.cleanup().await;
    }
}
