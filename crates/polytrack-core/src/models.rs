//! Domain models for videos and their audio tracks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use uuid::Uuid;

/// Lifecycle status of a transcode job's owning record.
///
/// `Completed` and `Failed` are terminal; there is no transition out of either
/// and no cancellation state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "transcode_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum TranscodeStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl TranscodeStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TranscodeStatus::Completed | TranscodeStatus::Failed)
    }
}

impl Display for TranscodeStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            TranscodeStatus::Pending => write!(f, "pending"),
            TranscodeStatus::InProgress => write!(f, "in_progress"),
            TranscodeStatus::Completed => write!(f, "completed"),
            TranscodeStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Progress checkpoints for the full-transcode path. Coarse by design: the
/// pipeline reports stage boundaries, not per-segment progress.
pub mod progress {
    pub const STARTED: i16 = 5;
    pub const DOWNLOADED: i16 = 15;
    pub const PROBED: i16 = 25;
    pub const VIDEO_ENCODED: i16 = 60;
    pub const AUDIO_ENCODED: i16 = 80;
    pub const DONE: i16 = 100;

    /// Checkpoints for the supplementary-audio path.
    pub mod audio {
        pub const STARTED: i16 = 5;
        pub const DOWNLOADED: i16 = 20;
        pub const ENCODED: i16 = 70;
        pub const PLAYLIST_UPDATED: i16 = 90;
        pub const DONE: i16 = 100;
    }
}

/// An uploaded video asset and its transcoding state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Video {
    pub id: Uuid,
    pub title: String,
    /// Object key of the original upload in the source bucket.
    pub source_key: String,
    /// Correlation id namespacing every local and remote path for this asset.
    /// Assigned once at intake, never reassigned.
    pub transcoding_uuid: Uuid,
    /// Remote key of the completed video-only playlist.
    pub transcoded_video: Option<String>,
    /// Remote key of the completed master playlist.
    pub master_playlist: Option<String>,
    pub status: TranscodeStatus,
    /// Percentage in [0, 100], non-decreasing within one job invocation.
    pub progress: i16,
    pub uploaded_at: DateTime<Utc>,
}

impl Video {
    /// Remote prefix shared by all transcoded artifacts of this asset.
    pub fn remote_prefix(&self) -> String {
        format!("transcoded_videos/{}", self.transcoding_uuid)
    }
}

/// One audio rendition of a video, either extracted from the container or
/// uploaded separately by a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct AudioTrack {
    pub id: Uuid,
    pub video_id: Uuid,
    /// Normalized language tag. May be a synthetic `audio<index>` placeholder
    /// when the container carried no language metadata.
    pub language: String,
    /// Object key of the user-uploaded source file; `None` for tracks
    /// extracted from the video container.
    pub source_key: Option<String>,
    pub is_user_uploaded: bool,
    pub is_default: bool,
    /// Remote key of the track's HLS playlist. Set iff status is `Completed`.
    pub transcoded_playlist: Option<String>,
    pub status: TranscodeStatus,
    pub progress: i16,
    pub created_at: DateTime<Utc>,
    /// Orders master-playlist entries; the earliest completed track is the
    /// default rendition.
    pub completed_at: Option<DateTime<Utc>>,
}

impl AudioTrack {
    /// Playlist filename for a given language tag, e.g. `audio_en_playlist.m3u8`.
    pub fn playlist_name(language: &str) -> String {
        format!("audio_{}_playlist.m3u8", language)
    }
}
