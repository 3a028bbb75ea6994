//! Job kinds and the handler seam between runner and pipeline.

use anyhow::Result;
use async_trait::async_trait;
use polytrack_media::TranscodePipeline;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::sync::Arc;
use uuid::Uuid;

/// One unit of background work. The intake layer submits these after
/// persisting the record the job operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    /// Transcode an uploaded video: video rendition plus all embedded audio.
    FullTranscode { video_id: Uuid },
    /// Transcode one user-uploaded audio file into an existing video's
    /// output tree.
    SupplementaryAudio { audio_track_id: Uuid },
}

impl JobKind {
    /// Identifier of the record this job operates on, for logging and for
    /// the caller's at-most-once-per-id dispatch contract.
    pub fn record_id(&self) -> Uuid {
        match self {
            JobKind::FullTranscode { video_id } => *video_id,
            JobKind::SupplementaryAudio { audio_track_id } => *audio_track_id,
        }
    }
}

impl Display for JobKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            JobKind::FullTranscode { video_id } => write!(f, "full_transcode:{}", video_id),
            JobKind::SupplementaryAudio { audio_track_id } => {
                write!(f, "supplementary_audio:{}", audio_track_id)
            }
        }
    }
}

/// Executes one job. Implemented by [`PipelineJobHandler`] in production and
/// by fakes in runner tests.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn run(&self, job: JobKind) -> Result<()>;
}

/// Dispatches jobs to the transcode pipeline entry points.
pub struct PipelineJobHandler {
    pipeline: Arc<TranscodePipeline>,
}

impl PipelineJobHandler {
    pub fn new(pipeline: Arc<TranscodePipeline>) -> Self {
        Self { pipeline }
    }
}

#[async_trait]
impl JobHandler for PipelineJobHandler {
    async fn run(&self, job: JobKind) -> Result<()> {
        match job {
            JobKind::FullTranscode { video_id } => {
                self.pipeline.run_full_transcode(video_id).await?
            }
            JobKind::SupplementaryAudio { audio_track_id } => {
                self.pipeline.run_supplementary_audio(audio_track_id).await?
            }
        }
        Ok(())
    }
}
