//! Audio stream discovery via ffprobe.

use crate::error::PipelineError;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// One audio stream found in a media container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioStreamDescriptor {
    /// Stream index within the container, as ffmpeg's `-map 0:<index>` sees it.
    pub index: u32,
    /// Language tag from container metadata, or the synthetic `audio<index>`
    /// placeholder when the container carries none.
    pub language: String,
}

/// Probes a local media file for its audio streams.
#[async_trait]
pub trait MediaProber: Send + Sync {
    async fn probe(&self, input: &Path) -> Result<Vec<AudioStreamDescriptor>, PipelineError>;
}

/// ffprobe-backed prober.
pub struct FfprobeStreamProbe {
    ffprobe_path: String,
}

impl FfprobeStreamProbe {
    pub fn new(ffprobe_path: String) -> Self {
        Self { ffprobe_path }
    }
}

#[async_trait]
impl MediaProber for FfprobeStreamProbe {
    #[tracing::instrument(skip(self, input), fields(process.command = "ffprobe"))]
    async fn probe(&self, input: &Path) -> Result<Vec<AudioStreamDescriptor>, PipelineError> {
        if !input.is_file() {
            return Err(PipelineError::Probe(format!(
                "input file does not exist: {}",
                input.display()
            )));
        }

        let output = Command::new(&self.ffprobe_path)
            .args([
                "-v",
                "error",
                "-print_format",
                "json",
                "-show_streams",
            ])
            .arg(input)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| PipelineError::Probe(format!("failed to spawn ffprobe: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PipelineError::Probe(format!(
                "ffprobe exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let streams = parse_audio_streams(&output.stdout)?;
        tracing::info!(
            input = %input.display(),
            audio_streams = streams.len(),
            "Probed container"
        );
        Ok(streams)
    }
}

#[derive(Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Deserialize)]
struct ProbeStream {
    index: u32,
    codec_type: Option<String>,
    #[serde(default)]
    tags: ProbeTags,
}

#[derive(Deserialize, Default)]
struct ProbeTags {
    language: Option<String>,
}

/// Parse ffprobe JSON and keep only the audio streams. Shapes we cannot
/// parse are a probe failure, not a panic.
fn parse_audio_streams(json: &[u8]) -> Result<Vec<AudioStreamDescriptor>, PipelineError> {
    let parsed: ProbeOutput = serde_json::from_slice(json)
        .map_err(|e| PipelineError::Probe(format!("unparsable ffprobe output: {}", e)))?;

    Ok(parsed
        .streams
        .into_iter()
        .filter(|s| s.codec_type.as_deref() == Some("audio"))
        .map(|s| AudioStreamDescriptor {
            index: s.index,
            language: s
                .tags
                .language
                .unwrap_or_else(|| format!("audio{}", s.index)),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_to_audio_streams() {
        let json = br#"{
            "streams": [
                {"index": 0, "codec_type": "video"},
                {"index": 1, "codec_type": "audio", "tags": {"language": "en"}},
                {"index": 2, "codec_type": "audio", "tags": {"language": "fr"}}
            ]
        }"#;
        let streams = parse_audio_streams(json).unwrap();
        assert_eq!(
            streams,
            vec![
                AudioStreamDescriptor {
                    index: 1,
                    language: "en".to_string()
                },
                AudioStreamDescriptor {
                    index: 2,
                    language: "fr".to_string()
                },
            ]
        );
    }

    #[test]
    fn untagged_stream_gets_placeholder_language() {
        let json = br#"{
            "streams": [
                {"index": 3, "codec_type": "audio"},
                {"index": 4, "codec_type": "audio", "tags": {}}
            ]
        }"#;
        let streams = parse_audio_streams(json).unwrap();
        assert_eq!(streams[0].language, "audio3");
        assert_eq!(streams[1].language, "audio4");
    }

    #[test]
    fn no_streams_key_yields_empty_list() {
        let streams = parse_audio_streams(b"{}").unwrap();
        assert!(streams.is_empty());
    }

    #[test]
    fn garbage_output_is_probe_error() {
        let err = parse_audio_streams(b"not json at all").unwrap_err();
        assert!(matches!(err, PipelineError::Probe(_)));
    }
}
