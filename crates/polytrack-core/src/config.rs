//! Configuration loaded from the environment.
//!
//! All settings have defaults suitable for local development against MinIO;
//! only `DATABASE_URL` is required.

use std::env;
use std::path::PathBuf;

const DB_MAX_CONNECTIONS: u32 = 20;
const HLS_SEGMENT_DURATION_SECS: u64 = 10;
const JOB_MAX_WORKERS: usize = 4;
const JOB_MAX_RETRIES: u32 = 3;

/// Application configuration for the transcoding service.
#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub db_max_connections: u32,

    // Object storage
    pub s3_bucket: String,
    pub s3_region: String,
    /// Custom endpoint for S3-compatible providers (e.g. MinIO).
    pub s3_endpoint: Option<String>,
    /// Remote prefix under which transcoded output trees are uploaded.
    pub transcoded_prefix: String,

    // Encoder
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    pub hls_segment_duration: u64,

    // Local staging
    pub staging_dir: PathBuf,

    // Job runner
    pub job_max_workers: usize,
    pub job_max_retries: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;

        let staging_dir = env::var("STAGING_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| env::temp_dir().join("polytrack"));

        Ok(Config {
            database_url,
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DB_MAX_CONNECTIONS),
            s3_bucket: env::var("S3_BUCKET").unwrap_or_else(|_| "videos".to_string()),
            s3_region: env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            s3_endpoint: env::var("S3_ENDPOINT").ok(),
            transcoded_prefix: env::var("TRANSCODED_PREFIX")
                .unwrap_or_else(|_| "transcoded_videos".to_string()),
            ffmpeg_path: env::var("FFMPEG_PATH").unwrap_or_else(|_| "ffmpeg".to_string()),
            ffprobe_path: env::var("FFPROBE_PATH").unwrap_or_else(|_| "ffprobe".to_string()),
            hls_segment_duration: env::var("HLS_SEGMENT_DURATION")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(HLS_SEGMENT_DURATION_SECS),
            staging_dir,
            job_max_workers: env::var("JOB_MAX_WORKERS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(JOB_MAX_WORKERS),
            job_max_retries: env::var("JOB_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(JOB_MAX_RETRIES),
        })
    }
}
