//! End-to-end pipeline scenarios against in-memory records, a stub prober
//! and encoder, and a local filesystem object store.

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use polytrack_core::models::{AudioTrack, TranscodeStatus, Video};
use polytrack_core::AppError;
use polytrack_media::{
    AudioStreamDescriptor, AudioTrackRecords, MediaProber, PipelineError, RenditionEncoder,
    StagingArea, TranscodePipeline, VideoRecords, VIDEO_PLAYLIST,
};
use polytrack_storage::{LocalStorage, Storage};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use uuid::Uuid;

#[derive(Default)]
struct State {
    videos: HashMap<Uuid, Video>,
    tracks: HashMap<Uuid, AudioTrack>,
    /// Every progress value written for any video, in write order.
    video_progress: Vec<i16>,
    seq: i64,
}

impl State {
    fn next_completed_at(&mut self) -> chrono::DateTime<chrono::Utc> {
        self.seq += 1;
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(self.seq)
    }
}

#[derive(Clone)]
struct MemVideos(Arc<Mutex<State>>);

#[derive(Clone)]
struct MemTracks(Arc<Mutex<State>>);

fn locked(state: &Arc<Mutex<State>>) -> std::sync::MutexGuard<'_, State> {
    state.lock().unwrap()
}

#[async_trait]
impl VideoRecords for MemVideos {
    async fn get(&self, id: Uuid) -> Result<Video, AppError> {
        locked(&self.0)
            .videos
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("video {}", id)))
    }

    async fn set_status(
        &self,
        id: Uuid,
        status: TranscodeStatus,
        progress: i16,
    ) -> Result<(), AppError> {
        let mut state = locked(&self.0);
        let video = state.videos.get_mut(&id).unwrap();
        video.status = status;
        video.progress = progress;
        state.video_progress.push(progress);
        Ok(())
    }

    async fn set_progress(&self, id: Uuid, progress: i16) -> Result<(), AppError> {
        let mut state = locked(&self.0);
        let video = state.videos.get_mut(&id).unwrap();
        video.progress = video.progress.max(progress);
        let stored = video.progress;
        state.video_progress.push(stored);
        Ok(())
    }

    async fn mark_completed(
        &self,
        id: Uuid,
        transcoded_video: &str,
        master_playlist: &str,
    ) -> Result<(), AppError> {
        let mut state = locked(&self.0);
        let video = state.videos.get_mut(&id).unwrap();
        video.status = TranscodeStatus::Completed;
        video.progress = 100;
        video.transcoded_video = Some(transcoded_video.to_string());
        video.master_playlist = Some(master_playlist.to_string());
        state.video_progress.push(100);
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid) -> Result<(), AppError> {
        locked(&self.0).videos.get_mut(&id).unwrap().status = TranscodeStatus::Failed;
        Ok(())
    }

    async fn set_master_playlist(&self, id: Uuid, key: &str) -> Result<(), AppError> {
        locked(&self.0).videos.get_mut(&id).unwrap().master_playlist = Some(key.to_string());
        Ok(())
    }
}

#[async_trait]
impl AudioTrackRecords for MemTracks {
    async fn get(&self, id: Uuid) -> Result<AudioTrack, AppError> {
        locked(&self.0)
            .tracks
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("audio track {}", id)))
    }

    async fn create_completed(
        &self,
        video_id: Uuid,
        language: &str,
        playlist_key: &str,
    ) -> Result<AudioTrack, AppError> {
        let mut state = locked(&self.0);
        let completed_at = state.next_completed_at();
        let is_default = !state
            .tracks
            .values()
            .any(|t| t.video_id == video_id && t.status == TranscodeStatus::Completed);
        let track = AudioTrack {
            id: Uuid::new_v4(),
            video_id,
            language: language.to_string(),
            source_key: None,
            is_user_uploaded: false,
            is_default,
            transcoded_playlist: Some(playlist_key.to_string()),
            status: TranscodeStatus::Completed,
            progress: 100,
            created_at: completed_at,
            completed_at: Some(completed_at),
        };
        state.tracks.insert(track.id, track.clone());
        Ok(track)
    }

    async fn set_status(
        &self,
        id: Uuid,
        status: TranscodeStatus,
        progress: i16,
    ) -> Result<(), AppError> {
        let mut state = locked(&self.0);
        let track = state.tracks.get_mut(&id).unwrap();
        track.status = status;
        track.progress = progress;
        Ok(())
    }

    async fn set_progress(&self, id: Uuid, progress: i16) -> Result<(), AppError> {
        let mut state = locked(&self.0);
        let track = state.tracks.get_mut(&id).unwrap();
        track.progress = track.progress.max(progress);
        Ok(())
    }

    async fn mark_completed(&self, id: Uuid, playlist_key: &str) -> Result<(), AppError> {
        let mut state = locked(&self.0);
        let completed_at = state.next_completed_at();
        let video_id = state.tracks.get(&id).unwrap().video_id;
        let is_default = !state
            .tracks
            .values()
            .any(|t| t.video_id == video_id && t.status == TranscodeStatus::Completed && t.id != id);
        let track = state.tracks.get_mut(&id).unwrap();
        track.status = TranscodeStatus::Completed;
        track.progress = 100;
        track.transcoded_playlist = Some(playlist_key.to_string());
        track.completed_at = Some(completed_at);
        track.is_default = is_default;
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid) -> Result<(), AppError> {
        locked(&self.0).tracks.get_mut(&id).unwrap().status = TranscodeStatus::Failed;
        Ok(())
    }

    async fn list_completed(&self, video_id: Uuid) -> Result<Vec<AudioTrack>, AppError> {
        let state = locked(&self.0);
        let mut tracks: Vec<AudioTrack> = state
            .tracks
            .values()
            .filter(|t| t.video_id == video_id && t.status == TranscodeStatus::Completed)
            .cloned()
            .collect();
        tracks.sort_by_key(|t| t.completed_at);
        Ok(tracks)
    }
}

struct StubProber {
    streams: Vec<AudioStreamDescriptor>,
}

#[async_trait]
impl MediaProber for StubProber {
    async fn probe(&self, _input: &Path) -> Result<Vec<AudioStreamDescriptor>, PipelineError> {
        Ok(self.streams.clone())
    }
}

/// Writes a fake playlist and one fake segment per rendition; fails encodes
/// for the configured language. The failure setting is shared with the test
/// so it can be cleared between attempts.
struct StubEncoder {
    fail_language: Arc<Mutex<Option<String>>>,
}

#[async_trait]
impl RenditionEncoder for StubEncoder {
    async fn encode_video(&self, _input: &Path, out_dir: &Path) -> Result<String, PipelineError> {
        tokio::fs::write(out_dir.join(VIDEO_PLAYLIST), b"#EXTM3U\n")
            .await
            .unwrap();
        tokio::fs::write(out_dir.join("vsegment_0.ts"), b"v0").await.unwrap();
        Ok(VIDEO_PLAYLIST.to_string())
    }

    async fn encode_audio(
        &self,
        _input: &Path,
        _stream_index: Option<u32>,
        out_dir: &Path,
        language: &str,
    ) -> Result<String, PipelineError> {
        if self.fail_language.lock().unwrap().as_deref() == Some(language) {
            return Err(PipelineError::Encode {
                rendition: format!("audio:{}", language),
                detail: "simulated encoder failure".to_string(),
            });
        }
        let playlist = AudioTrack::playlist_name(language);
        tokio::fs::write(out_dir.join(&playlist), b"#EXTM3U\n").await.unwrap();
        tokio::fs::write(out_dir.join(format!("asegment_{}_0.ts", language)), b"a0")
            .await
            .unwrap();
        Ok(playlist)
    }
}

struct Harness {
    pipeline: TranscodePipeline,
    state: Arc<Mutex<State>>,
    store_dir: TempDir,
    staging_dir: TempDir,
    encoder_fail: Arc<Mutex<Option<String>>>,
    video_id: Uuid,
    correlation: Uuid,
}

async fn setup(streams: &[(u32, &str)], fail_language: Option<&str>) -> Harness {
    build(streams, fail_language, false).await
}

async fn build(
    streams: &[(u32, &str)],
    fail_language: Option<&str>,
    unwritable_staging: bool,
) -> Harness {
    let store_dir = TempDir::new().unwrap();
    let staging_dir = TempDir::new().unwrap();

    let video_id = Uuid::new_v4();
    let correlation = Uuid::new_v4();
    let video = Video {
        id: video_id,
        title: "clip".to_string(),
        source_key: "videos/clip.mp4".to_string(),
        transcoding_uuid: correlation,
        transcoded_video: None,
        master_playlist: None,
        status: TranscodeStatus::Pending,
        progress: 0,
        uploaded_at: Utc::now(),
    };

    std::fs::create_dir_all(store_dir.path().join("videos")).unwrap();
    std::fs::write(store_dir.path().join("videos/clip.mp4"), b"container").unwrap();

    let state = Arc::new(Mutex::new(State::default()));
    state.lock().unwrap().videos.insert(video_id, video);

    // a plain file as the staging base makes directory creation fail
    let staging_base = if unwritable_staging {
        let occupied = staging_dir.path().join("occupied");
        std::fs::write(&occupied, b"").unwrap();
        occupied
    } else {
        staging_dir.path().to_path_buf()
    };

    let encoder_fail = Arc::new(Mutex::new(fail_language.map(str::to_string)));
    let storage: Arc<dyn Storage> = Arc::new(LocalStorage::new(store_dir.path()));
    let pipeline = TranscodePipeline::new(
        Arc::new(MemVideos(state.clone())),
        Arc::new(MemTracks(state.clone())),
        storage,
        Arc::new(StubProber {
            streams: streams
                .iter()
                .map(|(index, language)| AudioStreamDescriptor {
                    index: *index,
                    language: language.to_string(),
                })
                .collect(),
        }),
        Arc::new(StubEncoder {
            fail_language: encoder_fail.clone(),
        }),
        StagingArea::new(staging_base),
    );

    Harness {
        pipeline,
        state,
        store_dir,
        staging_dir,
        encoder_fail,
        video_id,
        correlation,
    }
}

fn remote_path(h: &Harness, name: &str) -> std::path::PathBuf {
    h.store_dir
        .path()
        .join("transcoded_videos")
        .join(h.correlation.to_string())
        .join(name)
}

fn staging_is_empty(h: &Harness) -> bool {
    // the per-correlation parent may remain, but no job tree may survive
    let corr_dir = h.staging_dir.path().join(h.correlation.to_string());
    !corr_dir.exists() || std::fs::read_dir(&corr_dir).unwrap().next().is_none()
}

#[tokio::test]
async fn full_transcode_with_two_streams_completes() {
    let h = setup(&[(1, "en"), (2, "fr")], None).await;
    h.pipeline.run_full_transcode(h.video_id).await.unwrap();

    let state = h.state.lock().unwrap();
    let video = &state.videos[&h.video_id];
    assert_eq!(video.status, TranscodeStatus::Completed);
    assert_eq!(video.progress, 100);
    assert_eq!(
        video.transcoded_video.as_deref(),
        Some(format!("{}/video_playlist.m3u8", h.correlation).as_str())
    );
    assert_eq!(
        video.master_playlist.as_deref(),
        Some(format!("{}/master.m3u8", h.correlation).as_str())
    );

    let completed: Vec<_> = state
        .tracks
        .values()
        .filter(|t| t.status == TranscodeStatus::Completed)
        .collect();
    assert_eq!(completed.len(), 2);
    let default_track = completed.iter().find(|t| t.is_default).unwrap();
    assert_eq!(default_track.language, "en");

    assert!(remote_path(&h, "video_playlist.m3u8").is_file());
    assert!(remote_path(&h, "audio_en_playlist.m3u8").is_file());
    assert!(remote_path(&h, "audio_fr_playlist.m3u8").is_file());

    let master = std::fs::read_to_string(remote_path(&h, "master.m3u8")).unwrap();
    let media_lines: Vec<&str> = master
        .lines()
        .filter(|l| l.starts_with("#EXT-X-MEDIA:"))
        .collect();
    assert_eq!(media_lines.len(), 2);
    assert!(media_lines[0].contains("LANGUAGE=\"en\""));
    assert!(media_lines[0].contains("DEFAULT=YES"));
    assert!(media_lines[1].contains("LANGUAGE=\"fr\""));
    assert!(media_lines[1].contains("DEFAULT=NO"));

    assert!(staging_is_empty(&h));
}

#[tokio::test]
async fn progress_is_monotonic_and_ends_at_100() {
    let h = setup(&[(1, "en")], None).await;
    h.pipeline.run_full_transcode(h.video_id).await.unwrap();

    let state = h.state.lock().unwrap();
    let log = &state.video_progress;
    assert!(log.windows(2).all(|w| w[0] <= w[1]), "progress log {:?}", log);
    assert_eq!(*log.last().unwrap(), 100);
}

#[tokio::test]
async fn second_stream_encode_failure_keeps_first_track_and_fails_video() {
    let h = setup(&[(1, "en"), (2, "fr")], Some("fr")).await;
    let err = h.pipeline.run_full_transcode(h.video_id).await.unwrap_err();
    assert!(matches!(err, PipelineError::Encode { .. }));

    let state = h.state.lock().unwrap();
    let video = &state.videos[&h.video_id];
    assert_eq!(video.status, TranscodeStatus::Failed);
    // frozen at the last checkpoint reached before the failing encode
    assert_eq!(video.progress, 60);
    assert!(video.master_playlist.is_none());

    let completed: Vec<_> = state
        .tracks
        .values()
        .filter(|t| t.status == TranscodeStatus::Completed)
        .collect();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].language, "en");
    assert!(!state.tracks.values().any(|t| t.language == "fr"));

    assert!(staging_is_empty(&h));
}

#[tokio::test]
async fn missing_source_object_fails_video() {
    let h = setup(&[(1, "en")], None).await;
    std::fs::remove_file(h.store_dir.path().join("videos/clip.mp4")).unwrap();

    let err = h.pipeline.run_full_transcode(h.video_id).await.unwrap_err();
    assert!(matches!(err, PipelineError::Storage(_)));

    let state = h.state.lock().unwrap();
    assert_eq!(state.videos[&h.video_id].status, TranscodeStatus::Failed);
    assert!(staging_is_empty(&h));
}

#[tokio::test]
async fn staging_failure_marks_video_failed() {
    let h = build(&[(1, "en")], None, true).await;

    let err = h.pipeline.run_full_transcode(h.video_id).await.unwrap_err();
    assert!(matches!(err, PipelineError::Staging(_)));

    let state = h.state.lock().unwrap();
    assert_eq!(state.videos[&h.video_id].status, TranscodeStatus::Failed);
}

#[tokio::test]
async fn staging_failure_marks_supplementary_track_failed() {
    let h = build(&[], None, true).await;
    let track_id = insert_pending_upload(&h, "de", "audio_tracks/de.mp3");

    let err = h
        .pipeline
        .run_supplementary_audio(track_id)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Staging(_)));

    let state = h.state.lock().unwrap();
    assert_eq!(state.tracks[&track_id].status, TranscodeStatus::Failed);
}

#[tokio::test]
async fn retry_after_partial_failure_does_not_duplicate_tracks() {
    let h = setup(&[(1, "en"), (2, "fr")], Some("fr")).await;
    h.pipeline.run_full_transcode(h.video_id).await.unwrap_err();

    // second attempt of the whole job, encoder recovered
    *h.encoder_fail.lock().unwrap() = None;
    h.pipeline.run_full_transcode(h.video_id).await.unwrap();

    let state = h.state.lock().unwrap();
    let completed_for = |lang: &str| {
        state
            .tracks
            .values()
            .filter(|t| t.language == lang && t.status == TranscodeStatus::Completed)
            .count()
    };
    assert_eq!(completed_for("en"), 1);
    assert_eq!(completed_for("fr"), 1);
    assert_eq!(state.videos[&h.video_id].status, TranscodeStatus::Completed);
    drop(state);

    let master = std::fs::read_to_string(remote_path(&h, "master.m3u8")).unwrap();
    let media_lines: Vec<&str> = master
        .lines()
        .filter(|l| l.starts_with("#EXT-X-MEDIA:"))
        .collect();
    assert_eq!(media_lines.len(), 2);
    // the first attempt's track keeps the default slot
    assert!(media_lines[0].contains("LANGUAGE=\"en\""));
    assert!(media_lines[0].contains("DEFAULT=YES"));
    assert!(media_lines[1].contains("LANGUAGE=\"fr\""));

    assert!(remote_path(&h, "audio_en_playlist.m3u8").is_file());
    assert!(remote_path(&h, "audio_fr_playlist.m3u8").is_file());
    assert!(staging_is_empty(&h));
}

fn insert_pending_upload(h: &Harness, language: &str, source_key: &str) -> Uuid {
    let mut state = h.state.lock().unwrap();
    let track = AudioTrack {
        id: Uuid::new_v4(),
        video_id: h.video_id,
        language: language.to_string(),
        source_key: Some(source_key.to_string()),
        is_user_uploaded: true,
        is_default: false,
        transcoded_playlist: None,
        status: TranscodeStatus::Pending,
        progress: 0,
        created_at: Utc::now(),
        completed_at: None,
    };
    let id = track.id;
    state.tracks.insert(id, track);
    id
}

#[tokio::test]
async fn supplementary_track_joins_master_playlist_with_original_default() {
    let h = setup(&[(1, "en"), (2, "fr")], None).await;
    h.pipeline.run_full_transcode(h.video_id).await.unwrap();

    std::fs::create_dir_all(h.store_dir.path().join("audio_tracks")).unwrap();
    std::fs::write(h.store_dir.path().join("audio_tracks/de.mp3"), b"audio").unwrap();
    let track_id = insert_pending_upload(&h, "de", "audio_tracks/de.mp3");

    h.pipeline.run_supplementary_audio(track_id).await.unwrap();

    let state = h.state.lock().unwrap();
    let track = &state.tracks[&track_id];
    assert_eq!(track.status, TranscodeStatus::Completed);
    assert_eq!(track.progress, 100);
    assert_eq!(
        track.transcoded_playlist.as_deref(),
        Some(format!("{}/audio_de_playlist.m3u8", h.correlation).as_str())
    );
    assert!(!track.is_default);
    drop(state);

    let master = std::fs::read_to_string(remote_path(&h, "master.m3u8")).unwrap();
    let media_lines: Vec<&str> = master
        .lines()
        .filter(|l| l.starts_with("#EXT-X-MEDIA:"))
        .collect();
    assert_eq!(media_lines.len(), 3);
    assert!(media_lines[0].contains("LANGUAGE=\"en\""));
    assert!(media_lines[0].contains("DEFAULT=YES"));
    assert!(media_lines[1].contains("LANGUAGE=\"fr\""));
    assert!(media_lines[2].contains("LANGUAGE=\"de\""));
    assert!(media_lines[2].contains("DEFAULT=NO"));

    assert!(remote_path(&h, "audio_de_playlist.m3u8").is_file());
    assert!(staging_is_empty(&h));
}

#[tokio::test]
async fn supplementary_encode_failure_marks_track_failed() {
    let h = setup(&[], Some("de")).await;
    std::fs::create_dir_all(h.store_dir.path().join("audio_tracks")).unwrap();
    std::fs::write(h.store_dir.path().join("audio_tracks/de.mp3"), b"audio").unwrap();
    let track_id = insert_pending_upload(&h, "de", "audio_tracks/de.mp3");

    let err = h
        .pipeline
        .run_supplementary_audio(track_id)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Encode { .. }));

    let state = h.state.lock().unwrap();
    let track = &state.tracks[&track_id];
    assert_eq!(track.status, TranscodeStatus::Failed);
    // frozen at the post-download checkpoint
    assert_eq!(track.progress, 20);
    assert!(track.transcoded_playlist.is_none());
    assert!(staging_is_empty(&h));
}
