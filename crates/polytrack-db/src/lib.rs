//! Polytrack DB Library
//!
//! Postgres repositories for videos and audio tracks, plus connection and
//! migration helpers. Repositories return domain models from
//! `polytrack-core`; SQL stays inside this crate.

pub mod audio_track;
pub mod video;

pub use audio_track::AudioTrackRepository;
pub use video::VideoRepository;

use polytrack_core::AppError;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Connect to Postgres and run pending migrations.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool, AppError> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| AppError::Internal(format!("migration failed: {}", e)))?;

    Ok(pool)
}
