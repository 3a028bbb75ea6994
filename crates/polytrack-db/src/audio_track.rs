//! Audio track repository.
//!
//! Completed rows are always written in a single statement carrying the
//! playlist key and `completed_at`, so a track is never observable with a
//! dangling path.

use chrono::Utc;
use polytrack_core::models::{AudioTrack, TranscodeStatus};
use polytrack_core::AppError;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

#[derive(Clone)]
pub struct AudioTrackRepository {
    pool: PgPool,
}

impl AudioTrackRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create an already-completed track for an audio stream extracted from
    /// the container. Called only after that stream's encode succeeded.
    ///
    /// The first completed track of a video becomes the default rendition.
    #[tracing::instrument(skip(self), fields(db.table = "audio_tracks", db.operation = "insert"))]
    pub async fn create_completed(
        &self,
        video_id: Uuid,
        language: &str,
        playlist_key: &str,
    ) -> Result<AudioTrack, AppError> {
        let track: AudioTrack = sqlx::query_as::<Postgres, AudioTrack>(
            r#"
            INSERT INTO audio_tracks (
                id, video_id, language, source_key, is_user_uploaded, is_default,
                transcoded_playlist, status, progress, created_at, completed_at
            )
            VALUES (
                $1, $2, $3, NULL, FALSE,
                NOT EXISTS (
                    SELECT 1 FROM audio_tracks
                    WHERE video_id = $2 AND status = 'completed'
                ),
                $4, 'completed', 100, $5, $5
            )
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(video_id)
        .bind(language)
        .bind(playlist_key)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(track)
    }

    /// Create a pending track for a user-uploaded audio file. The intake
    /// layer calls this before enqueueing the supplementary transcode job.
    #[tracing::instrument(skip(self), fields(db.table = "audio_tracks", db.operation = "insert"))]
    pub async fn create_pending_upload(
        &self,
        video_id: Uuid,
        language: &str,
        source_key: &str,
    ) -> Result<AudioTrack, AppError> {
        let track: AudioTrack = sqlx::query_as::<Postgres, AudioTrack>(
            r#"
            INSERT INTO audio_tracks (
                id, video_id, language, source_key, is_user_uploaded, is_default,
                transcoded_playlist, status, progress, created_at, completed_at
            )
            VALUES ($1, $2, $3, $4, TRUE, FALSE, NULL, 'pending', 0, $5, NULL)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(video_id)
        .bind(language)
        .bind(source_key)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(track)
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<AudioTrack, AppError> {
        let track: Option<AudioTrack> =
            sqlx::query_as::<Postgres, AudioTrack>("SELECT * FROM audio_tracks WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        track.ok_or_else(|| AppError::NotFound(format!("audio track {}", id)))
    }

    #[tracing::instrument(skip(self), fields(db.table = "audio_tracks", db.operation = "update"))]
    pub async fn set_status(
        &self,
        id: Uuid,
        status: TranscodeStatus,
        progress: i16,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE audio_tracks SET status = $2, progress = $3 WHERE id = $1")
            .bind(id)
            .bind(status)
            .bind(progress)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Bump progress without touching status. Never lowers the stored value.
    pub async fn set_progress(&self, id: Uuid, progress: i16) -> Result<(), AppError> {
        sqlx::query("UPDATE audio_tracks SET progress = GREATEST(progress, $2) WHERE id = $1")
            .bind(id)
            .bind(progress)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Transition a user-uploaded track to completed, recording its playlist
    /// key. Becomes the default rendition only if no completed track exists
    /// yet for the video.
    #[tracing::instrument(skip(self), fields(db.table = "audio_tracks", db.operation = "update"))]
    pub async fn mark_completed(&self, id: Uuid, playlist_key: &str) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE audio_tracks
            SET status = 'completed', progress = 100,
                transcoded_playlist = $2, completed_at = $3,
                is_default = NOT EXISTS (
                    SELECT 1 FROM audio_tracks other
                    WHERE other.video_id = audio_tracks.video_id
                      AND other.status = 'completed'
                      AND other.id <> audio_tracks.id
                )
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(playlist_key)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Mark the track failed, freezing its progress.
    pub async fn mark_failed(&self, id: Uuid) -> Result<(), AppError> {
        sqlx::query("UPDATE audio_tracks SET status = 'failed' WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// All completed tracks of a video in completion order. This ordering is
    /// what makes the master playlist's first entry (the default rendition)
    /// stable across rebuilds.
    pub async fn list_completed(&self, video_id: Uuid) -> Result<Vec<AudioTrack>, AppError> {
        let tracks: Vec<AudioTrack> = sqlx::query_as::<Postgres, AudioTrack>(
            r#"
            SELECT * FROM audio_tracks
            WHERE video_id = $1 AND status = 'completed'
            ORDER BY completed_at ASC, created_at ASC
            "#,
        )
        .bind(video_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(tracks)
    }
}
