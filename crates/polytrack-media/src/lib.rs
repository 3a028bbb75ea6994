//! Polytrack Media Library
//!
//! The transcoding pipeline: ffprobe stream discovery, ffmpeg HLS encoding
//! for the video rendition and one audio rendition per language, master
//! playlist synthesis, local staging, and the orchestration that ties them to
//! the persistence and storage layers.

pub mod encoder;
pub mod error;
pub mod pipeline;
pub mod playlist;
pub mod probe;
pub mod records;
pub mod staging;

pub use encoder::{FfmpegSegmentEncoder, RenditionEncoder, VIDEO_PLAYLIST};
pub use error::PipelineError;
pub use pipeline::TranscodePipeline;
pub use playlist::{build_master_playlist, write_master_playlist, MASTER_PLAYLIST};
pub use probe::{AudioStreamDescriptor, FfprobeStreamProbe, MediaProber};
pub use records::{AudioTrackRecords, VideoRecords};
pub use staging::{JobStaging, StagingArea};
