//! Persistence seams for the pipeline.
//!
//! The pipeline talks to these traits rather than to `sqlx` directly; the
//! Postgres repositories implement them, and the pipeline tests substitute
//! in-memory fakes.

use async_trait::async_trait;
use polytrack_core::models::{AudioTrack, TranscodeStatus, Video};
use polytrack_core::AppError;
use polytrack_db::{AudioTrackRepository, VideoRepository};
use uuid::Uuid;

/// Video rows as the pipeline sees them.
#[async_trait]
pub trait VideoRecords: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Video, AppError>;
    async fn set_status(
        &self,
        id: Uuid,
        status: TranscodeStatus,
        progress: i16,
    ) -> Result<(), AppError>;
    async fn set_progress(&self, id: Uuid, progress: i16) -> Result<(), AppError>;
    async fn mark_completed(
        &self,
        id: Uuid,
        transcoded_video: &str,
        master_playlist: &str,
    ) -> Result<(), AppError>;
    async fn mark_failed(&self, id: Uuid) -> Result<(), AppError>;
    async fn set_master_playlist(&self, id: Uuid, key: &str) -> Result<(), AppError>;
}

/// Audio track rows as the pipeline sees them.
#[async_trait]
pub trait AudioTrackRecords: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<AudioTrack, AppError>;
    async fn create_completed(
        &self,
        video_id: Uuid,
        language: &str,
        playlist_key: &str,
    ) -> Result<AudioTrack, AppError>;
    async fn set_status(
        &self,
        id: Uuid,
        status: TranscodeStatus,
        progress: i16,
    ) -> Result<(), AppError>;
    async fn set_progress(&self, id: Uuid, progress: i16) -> Result<(), AppError>;
    async fn mark_completed(&self, id: Uuid, playlist_key: &str) -> Result<(), AppError>;
    async fn mark_failed(&self, id: Uuid) -> Result<(), AppError>;
    async fn list_completed(&self, video_id: Uuid) -> Result<Vec<AudioTrack>, AppError>;
}

#[async_trait]
impl VideoRecords for VideoRepository {
    async fn get(&self, id: Uuid) -> Result<Video, AppError> {
        self.get_by_id(id).await
    }

    async fn set_status(
        &self,
        id: Uuid,
        status: TranscodeStatus,
        progress: i16,
    ) -> Result<(), AppError> {
        VideoRepository::set_status(self, id, status, progress).await
    }

    async fn set_progress(&self, id: Uuid, progress: i16) -> Result<(), AppError> {
        VideoRepository::set_progress(self, id, progress).await
    }

    async fn mark_completed(
        &self,
        id: Uuid,
        transcoded_video: &str,
        master_playlist: &str,
    ) -> Result<(), AppError> {
        VideoRepository::mark_completed(self, id, transcoded_video, master_playlist).await
    }

    async fn mark_failed(&self, id: Uuid) -> Result<(), AppError> {
        VideoRepository::mark_failed(self, id).await
    }

    async fn set_master_playlist(&self, id: Uuid, key: &str) -> Result<(), AppError> {
        VideoRepository::set_master_playlist(self, id, key).await
    }
}

#[async_trait]
impl AudioTrackRecords for AudioTrackRepository {
    async fn get(&self, id: Uuid) -> Result<AudioTrack, AppError> {
        self.get_by_id(id).await
    }

    async fn create_completed(
        &self,
        video_id: Uuid,
        language: &str,
        playlist_key: &str,
    ) -> Result<AudioTrack, AppError> {
        AudioTrackRepository::create_completed(self, video_id, language, playlist_key).await
    }

    async fn set_status(
        &self,
        id: Uuid,
        status: TranscodeStatus,
        progress: i16,
    ) -> Result<(), AppError> {
        AudioTrackRepository::set_status(self, id, status, progress).await
    }

    async fn set_progress(&self, id: Uuid, progress: i16) -> Result<(), AppError> {
        AudioTrackRepository::set_progress(self, id, progress).await
    }

    async fn mark_completed(&self, id: Uuid, playlist_key: &str) -> Result<(), AppError> {
        AudioTrackRepository::mark_completed(self, id, playlist_key).await
    }

    async fn mark_failed(&self, id: Uuid) -> Result<(), AppError> {
        AudioTrackRepository::mark_failed(self, id).await
    }

    async fn list_completed(&self, video_id: Uuid) -> Result<Vec<AudioTrack>, AppError> {
        AudioTrackRepository::list_completed(self, video_id).await
    }
}
