//! HLS rendition encoding via ffmpeg.
//!
//! One call per rendition: either the single video-only rendition or one
//! audio rendition per language. Segment and playlist names are deterministic
//! and namespaced by rendition kind and language, so concurrent audio encodes
//! for the same job never collide on disk and re-runs regenerate identical
//! remote paths.

use crate::error::PipelineError;
use async_trait::async_trait;
use polytrack_core::models::AudioTrack;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// Playlist filename of the video-only rendition.
pub const VIDEO_PLAYLIST: &str = "video_playlist.m3u8";

/// Encodes a single HLS rendition into an output directory.
#[async_trait]
pub trait RenditionEncoder: Send + Sync {
    /// Encode the video-only rendition. Returns the playlist filename.
    async fn encode_video(&self, input: &Path, out_dir: &Path) -> Result<String, PipelineError>;

    /// Encode one audio rendition. With `stream_index` set, only that stream
    /// of a multi-stream container is selected; without it the input is
    /// treated as a single-track audio file. Returns the playlist filename.
    async fn encode_audio(
        &self,
        input: &Path,
        stream_index: Option<u32>,
        out_dir: &Path,
        language: &str,
    ) -> Result<String, PipelineError>;
}

/// ffmpeg-backed encoder with fixed 2 Mbps video / 128 kbps AAC audio targets.
pub struct FfmpegSegmentEncoder {
    ffmpeg_path: String,
    segment_duration: u64,
}

impl FfmpegSegmentEncoder {
    pub fn new(ffmpeg_path: String, segment_duration: u64) -> Self {
        Self {
            ffmpeg_path,
            segment_duration,
        }
    }

    async fn run(&self, args: Vec<String>, rendition: &str) -> Result<(), PipelineError> {
        let output = Command::new(&self.ffmpeg_path)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| PipelineError::Encode {
                rendition: rendition.to_string(),
                detail: format!("failed to spawn ffmpeg: {}", e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PipelineError::Encode {
                rendition: rendition.to_string(),
                detail: format!("ffmpeg exited with {}: {}", output.status, stderr.trim()),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl RenditionEncoder for FfmpegSegmentEncoder {
    #[tracing::instrument(skip(self, input, out_dir), fields(process.command = "ffmpeg", rendition = "video"))]
    async fn encode_video(&self, input: &Path, out_dir: &Path) -> Result<String, PipelineError> {
        let args = video_args(input, out_dir, self.segment_duration);
        self.run(args, "video").await?;
        tracing::info!(out_dir = %out_dir.display(), "Video rendition encoded");
        Ok(VIDEO_PLAYLIST.to_string())
    }

    #[tracing::instrument(skip(self, input, out_dir), fields(process.command = "ffmpeg", rendition = "audio", language = %language))]
    async fn encode_audio(
        &self,
        input: &Path,
        stream_index: Option<u32>,
        out_dir: &Path,
        language: &str,
    ) -> Result<String, PipelineError> {
        let args = audio_args(input, stream_index, out_dir, language, self.segment_duration);
        self.run(args, &format!("audio:{}", language)).await?;
        tracing::info!(out_dir = %out_dir.display(), language = %language, "Audio rendition encoded");
        Ok(AudioTrack::playlist_name(language))
    }
}

/// ffmpeg arguments for the video-only rendition: video stream mapped, audio
/// stripped, 2 Mbps ceiling with a matching buffer, VOD-style playlist
/// retaining every segment.
fn video_args(input: &Path, out_dir: &Path, segment_duration: u64) -> Vec<String> {
    vec![
        "-i".to_string(),
        input.to_string_lossy().to_string(),
        "-map".to_string(),
        "0:v".to_string(),
        "-an".to_string(),
        "-c:v".to_string(),
        "libx264".to_string(),
        "-b:v".to_string(),
        "2M".to_string(),
        "-maxrate:v".to_string(),
        "2M".to_string(),
        "-bufsize:v".to_string(),
        "4M".to_string(),
        "-f".to_string(),
        "hls".to_string(),
        "-hls_time".to_string(),
        segment_duration.to_string(),
        "-hls_list_size".to_string(),
        "0".to_string(),
        "-hls_segment_filename".to_string(),
        out_dir.join("vsegment_%d.ts").to_string_lossy().to_string(),
        out_dir.join(VIDEO_PLAYLIST).to_string_lossy().to_string(),
    ]
}

/// ffmpeg arguments for one audio rendition: optional stream selection, video
/// stripped, fixed-bitrate AAC.
fn audio_args(
    input: &Path,
    stream_index: Option<u32>,
    out_dir: &Path,
    language: &str,
    segment_duration: u64,
) -> Vec<String> {
    let mut args = vec![
        "-i".to_string(),
        input.to_string_lossy().to_string(),
    ];
    if let Some(index) = stream_index {
        args.push("-map".to_string());
        args.push(format!("0:{}", index));
    }
    args.extend([
        "-vn".to_string(),
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        "128k".to_string(),
        "-f".to_string(),
        "hls".to_string(),
        "-hls_time".to_string(),
        segment_duration.to_string(),
        "-hls_list_size".to_string(),
        "0".to_string(),
        "-hls_segment_filename".to_string(),
        out_dir
            .join(format!("asegment_{}_%d.ts", language))
            .to_string_lossy()
            .to_string(),
        out_dir
            .join(AudioTrack::playlist_name(language))
            .to_string_lossy()
            .to_string(),
    ]);
    args
}
