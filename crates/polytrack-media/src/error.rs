//! Pipeline error kinds.
//!
//! Every error is terminal for the job that hit it: the pipeline marks the
//! owning record failed and returns the error to the job runner, which owns
//! any retry policy. Expected failures are values, never panics.

use polytrack_core::AppError;
use polytrack_storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Probe failed: {0}")]
    Probe(String),

    #[error("Encode failed for {rendition}: {detail}")]
    Encode { rendition: String, detail: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Staging error: {0}")]
    Staging(#[source] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] AppError),
}

impl PipelineError {
    /// Short kind tag for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Probe(_) => "probe",
            PipelineError::Encode { .. } => "encode",
            PipelineError::Storage(_) => "storage",
            PipelineError::Staging(_) => "staging",
            PipelineError::Database(_) => "database",
        }
    }
}
