//! Video repository.

use chrono::Utc;
use polytrack_core::models::{TranscodeStatus, Video};
use polytrack_core::AppError;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

#[derive(Clone)]
pub struct VideoRepository {
    pool: PgPool,
}

impl VideoRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a video record at intake. The transcoding correlation uuid is
    /// assigned here, exactly once, before any remote path is derived from it.
    #[tracing::instrument(skip(self), fields(db.table = "videos", db.operation = "insert"))]
    pub async fn create(&self, title: &str, source_key: &str) -> Result<Video, AppError> {
        let video: Video = sqlx::query_as::<Postgres, Video>(
            r#"
            INSERT INTO videos (id, title, source_key, transcoding_uuid, status, progress, uploaded_at)
            VALUES ($1, $2, $3, $4, 'pending', 0, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(title)
        .bind(source_key)
        .bind(Uuid::new_v4())
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(video)
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Video, AppError> {
        let video: Option<Video> =
            sqlx::query_as::<Postgres, Video>("SELECT * FROM videos WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        video.ok_or_else(|| AppError::NotFound(format!("video {}", id)))
    }

    /// Move the video to a new status/progress pair. Progress values at fixed
    /// checkpoints only; the pipeline never reports per-segment progress.
    #[tracing::instrument(skip(self), fields(db.table = "videos", db.operation = "update"))]
    pub async fn set_status(
        &self,
        id: Uuid,
        status: TranscodeStatus,
        progress: i16,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE videos SET status = $2, progress = $3 WHERE id = $1")
            .bind(id)
            .bind(status)
            .bind(progress)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Bump progress without touching status. Never lowers the stored value.
    pub async fn set_progress(&self, id: Uuid, progress: i16) -> Result<(), AppError> {
        sqlx::query("UPDATE videos SET progress = GREATEST(progress, $2) WHERE id = $1")
            .bind(id)
            .bind(progress)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Record the final playlist keys and mark the video completed.
    #[tracing::instrument(skip(self), fields(db.table = "videos", db.operation = "update"))]
    pub async fn mark_completed(
        &self,
        id: Uuid,
        transcoded_video: &str,
        master_playlist: &str,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE videos
            SET status = 'completed', progress = 100,
                transcoded_video = $2, master_playlist = $3
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(transcoded_video)
        .bind(master_playlist)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Mark the video failed. Progress is left where it was, so the frozen
    /// value shows how far the job got.
    pub async fn mark_failed(&self, id: Uuid) -> Result<(), AppError> {
        sqlx::query("UPDATE videos SET status = 'failed' WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Update only the master playlist key (supplementary-audio path).
    pub async fn set_master_playlist(&self, id: Uuid, key: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE videos SET master_playlist = $2 WHERE id = $1")
            .bind(id)
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
