//! Transcode orchestration.
//!
//! Two job kinds: a full transcode of an uploaded video (video rendition plus
//! every embedded audio stream) and a supplementary transcode of one
//! user-uploaded audio file attached to an existing video. Each invocation
//! runs to completion or failure synchronously; the job runner decides
//! whether a failed job is retried. Staging directories are removed on every
//! exit path.

use crate::encoder::{RenditionEncoder, VIDEO_PLAYLIST};
use crate::error::PipelineError;
use crate::playlist::{write_master_playlist, MASTER_PLAYLIST};
use crate::probe::MediaProber;
use crate::records::{AudioTrackRecords, VideoRecords};
use crate::staging::{JobStaging, StagingArea};
use polytrack_core::models::{progress, AudioTrack, TranscodeStatus, Video};
use polytrack_storage::Storage;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, Weak};
use uuid::Uuid;

/// Orchestrates both transcode job kinds against the persistence, storage,
/// probe, and encoder collaborators.
pub struct TranscodePipeline {
    videos: Arc<dyn VideoRecords>,
    tracks: Arc<dyn AudioTrackRecords>,
    storage: Arc<dyn Storage>,
    prober: Arc<dyn MediaProber>,
    encoder: Arc<dyn RenditionEncoder>,
    staging: StagingArea,
    /// Serializes master-playlist recompute-and-write per asset, so a full
    /// transcode and a supplementary job finishing together cannot interleave
    /// their read-set/build/write/upload windows. Entries are weak and pruned
    /// once no job holds the lock.
    playlist_locks: Mutex<HashMap<Uuid, Weak<tokio::sync::Mutex<()>>>>,
}

impl TranscodePipeline {
    pub fn new(
        videos: Arc<dyn VideoRecords>,
        tracks: Arc<dyn AudioTrackRecords>,
        storage: Arc<dyn Storage>,
        prober: Arc<dyn MediaProber>,
        encoder: Arc<dyn RenditionEncoder>,
        staging: StagingArea,
    ) -> Self {
        Self {
            videos,
            tracks,
            storage,
            prober,
            encoder,
            staging,
            playlist_locks: Mutex::new(HashMap::new()),
        }
    }

    fn playlist_lock(&self, video_id: Uuid) -> Arc<tokio::sync::Mutex<()>> {
        acquire_keyed_lock(&self.playlist_locks, video_id)
    }

    /// Run the full transcode for a video: download source, probe audio
    /// streams, encode the video rendition and one audio rendition per
    /// stream, write the master playlist, upload the output tree, and record
    /// the final playlist keys.
    #[tracing::instrument(skip(self), fields(job = "full_transcode"))]
    pub async fn run_full_transcode(&self, video_id: Uuid) -> Result<(), PipelineError> {
        let video = self.videos.get(video_id).await?;
        self.videos
            .set_status(video_id, TranscodeStatus::InProgress, progress::STARTED)
            .await?;

        let result = self.full_transcode_job(&video).await;

        if let Err(ref e) = result {
            tracing::error!(
                video_id = %video_id,
                error = %e,
                error_kind = e.kind(),
                "Full transcode failed"
            );
            if let Err(mark_err) = self.videos.mark_failed(video_id).await {
                tracing::error!(video_id = %video_id, error = %mark_err, "Failed to mark video failed");
            }
        }

        result
    }

    /// Everything that can fail after the record entered `in_progress`,
    /// staging preparation included, so any error here drives `mark_failed`.
    async fn full_transcode_job(&self, video: &Video) -> Result<(), PipelineError> {
        let staging = self
            .staging
            .prepare(video.transcoding_uuid, Uuid::new_v4())
            .await
            .map_err(PipelineError::Staging)?;

        let result = self.full_transcode_inner(video, &staging).await;
        staging.cleanup().await;
        result
    }

    async fn full_transcode_inner(
        &self,
        video: &Video,
        staging: &JobStaging,
    ) -> Result<(), PipelineError> {
        let input = staging
            .download_dir
            .join(format!("{}.mp4", video.transcoding_uuid));
        self.storage
            .download_to_path(&video.source_key, &input)
            .await?;
        self.videos
            .set_progress(video.id, progress::DOWNLOADED)
            .await?;

        let streams = self.prober.probe(&input).await?;
        self.videos.set_progress(video.id, progress::PROBED).await?;

        let video_playlist = self
            .encoder
            .encode_video(&input, &staging.output_dir)
            .await?;
        self.videos
            .set_progress(video.id, progress::VIDEO_ENCODED)
            .await?;

        // Languages a previous attempt of this job already recorded. Their
        // renditions are still re-encoded so the uploaded tree is complete,
        // but no second row is inserted.
        let recorded: HashSet<String> = self
            .tracks
            .list_completed(video.id)
            .await?
            .into_iter()
            .filter(|t| !t.is_user_uploaded)
            .map(|t| t.language)
            .collect();

        // One rendition per discovered stream. A track row is created only
        // once its encode succeeded, so a mid-list failure leaves the earlier
        // completed rows in place and aborts the job here.
        for stream in &streams {
            let playlist = self
                .encoder
                .encode_audio(
                    &input,
                    Some(stream.index),
                    &staging.output_dir,
                    &stream.language,
                )
                .await?;
            if recorded.contains(&stream.language) {
                tracing::debug!(
                    video_id = %video.id,
                    language = %stream.language,
                    "Track already recorded by an earlier attempt, skipping insert"
                );
                continue;
            }
            let playlist_key = format!("{}/{}", video.transcoding_uuid, playlist);
            self.tracks
                .create_completed(video.id, &stream.language, &playlist_key)
                .await?;
        }
        self.videos
            .set_progress(video.id, progress::AUDIO_ENCODED)
            .await?;

        let lock = self.playlist_lock(video.id);
        let _guard = lock.lock().await;

        let entries = playlist_entries(&self.tracks.list_completed(video.id).await?);
        write_master_playlist(&staging.output_dir, &video_playlist, &entries)
            .await
            .map_err(PipelineError::Staging)?;

        self.storage
            .upload_tree(&staging.output_dir, &video.remote_prefix())
            .await?;

        self.videos
            .mark_completed(
                video.id,
                &format!("{}/{}", video.transcoding_uuid, VIDEO_PLAYLIST),
                &format!("{}/{}", video.transcoding_uuid, MASTER_PLAYLIST),
            )
            .await?;

        tracing::info!(
            video_id = %video.id,
            audio_tracks = streams.len(),
            "Full transcode completed"
        );
        Ok(())
    }

    /// Transcode one user-uploaded audio file and fold it into the video's
    /// master playlist alongside every previously completed track.
    #[tracing::instrument(skip(self), fields(job = "supplementary_audio"))]
    pub async fn run_supplementary_audio(&self, audio_track_id: Uuid) -> Result<(), PipelineError> {
        let track = self.tracks.get(audio_track_id).await?;
        let video = self.videos.get(track.video_id).await?;
        self.tracks
            .set_status(
                audio_track_id,
                TranscodeStatus::InProgress,
                progress::audio::STARTED,
            )
            .await?;

        let result = self.supplementary_audio_job(&track, &video).await;

        if let Err(ref e) = result {
            tracing::error!(
                audio_track_id = %audio_track_id,
                video_id = %video.id,
                error = %e,
                error_kind = e.kind(),
                "Supplementary audio transcode failed"
            );
            if let Err(mark_err) = self.tracks.mark_failed(audio_track_id).await {
                tracing::error!(
                    audio_track_id = %audio_track_id,
                    error = %mark_err,
                    "Failed to mark audio track failed"
                );
            }
        }

        result
    }

    /// As with the full path: staging preparation sits inside the fallible
    /// section whose result decides whether the track is marked failed.
    async fn supplementary_audio_job(
        &self,
        track: &AudioTrack,
        video: &Video,
    ) -> Result<(), PipelineError> {
        let staging = self
            .staging
            .prepare(video.transcoding_uuid, Uuid::new_v4())
            .await
            .map_err(PipelineError::Staging)?;

        let result = self.supplementary_audio_inner(track, video, &staging).await;
        staging.cleanup().await;
        result
    }

    async fn supplementary_audio_inner(
        &self,
        track: &AudioTrack,
        video: &Video,
        staging: &JobStaging,
    ) -> Result<(), PipelineError> {
        let source_key = track.source_key.as_deref().ok_or_else(|| {
            PipelineError::Database(polytrack_core::AppError::InvalidInput(format!(
                "audio track {} has no source object",
                track.id
            )))
        })?;

        let filename = source_key.rsplit('/').next().unwrap_or(source_key);
        let input = staging.download_dir.join(filename);
        self.storage.download_to_path(source_key, &input).await?;
        self.tracks
            .set_progress(track.id, progress::audio::DOWNLOADED)
            .await?;

        let playlist = self
            .encoder
            .encode_audio(&input, None, &staging.output_dir, &track.language)
            .await?;
        self.tracks
            .set_progress(track.id, progress::audio::ENCODED)
            .await?;

        let playlist_key = format!("{}/{}", video.transcoding_uuid, playlist);

        let lock = self.playlist_lock(video.id);
        let _guard = lock.lock().await;

        // Current full set of completed tracks, with this one appended last:
        // it is completing now, after everything already in the list.
        let mut entries = playlist_entries(
            &self
                .tracks
                .list_completed(video.id)
                .await?
                .into_iter()
                .filter(|t| t.id != track.id)
                .collect::<Vec<_>>(),
        );
        entries.push((track.language.clone(), playlist.clone()));

        write_master_playlist(&staging.output_dir, VIDEO_PLAYLIST, &entries)
            .await
            .map_err(PipelineError::Staging)?;
        self.tracks
            .set_progress(track.id, progress::audio::PLAYLIST_UPDATED)
            .await?;

        self.storage
            .upload_tree(&staging.output_dir, &video.remote_prefix())
            .await?;

        self.videos
            .set_master_playlist(
                video.id,
                &format!("{}/{}", video.transcoding_uuid, MASTER_PLAYLIST),
            )
            .await?;
        self.tracks.mark_completed(track.id, &playlist_key).await?;

        tracing::info!(
            audio_track_id = %track.id,
            video_id = %video.id,
            language = %track.language,
            "Supplementary audio transcode completed"
        );
        Ok(())
    }
}

/// Hand out the per-key lock, creating it on first use. Dead entries (no job
/// currently holds the lock) are pruned on every call, so the map stays
/// bounded by the number of in-flight jobs.
fn acquire_keyed_lock(
    locks: &Mutex<HashMap<Uuid, Weak<tokio::sync::Mutex<()>>>>,
    key: Uuid,
) -> Arc<tokio::sync::Mutex<()>> {
    let mut locks = locks
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    locks.retain(|_, weak| weak.strong_count() > 0);
    if let Some(existing) = locks.get(&key).and_then(Weak::upgrade) {
        return existing;
    }
    let lock = Arc::new(tokio::sync::Mutex::new(()));
    locks.insert(key, Arc::downgrade(&lock));
    lock
}

/// Map completed track rows to (language, playlist filename) pairs for the
/// playlist builder. Keys are stored as `<correlation>/<playlist>`; the
/// manifest references the bare filename since everything shares one prefix.
fn playlist_entries(tracks: &[AudioTrack]) -> Vec<(String, String)> {
    tracks
        .iter()
        .filter_map(|t| {
            t.transcoded_playlist.as_deref().map(|key| {
                let name = key.rsplit('/').next().unwrap_or(key);
                (t.language.clone(), name.to_string())
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn track_with_key(language: &str, key: Option<&str>) -> AudioTrack {
        AudioTrack {
            id: Uuid::new_v4(),
            video_id: Uuid::new_v4(),
            language: language.to_string(),
            source_key: None,
            is_user_uploaded: false,
            is_default: false,
            transcoded_playlist: key.map(str::to_string),
            status: if key.is_some() {
                TranscodeStatus::Completed
            } else {
                TranscodeStatus::Pending
            },
            progress: if key.is_some() { 100 } else { 0 },
            created_at: Utc::now(),
            completed_at: key.map(|_| Utc::now()),
        }
    }

    #[test]
    fn playlist_entries_strip_correlation_prefix() {
        let tracks = vec![
            track_with_key("en", Some("1234/audio_en_playlist.m3u8")),
            track_with_key("fr", Some("1234/audio_fr_playlist.m3u8")),
        ];
        assert_eq!(
            playlist_entries(&tracks),
            vec![
                ("en".to_string(), "audio_en_playlist.m3u8".to_string()),
                ("fr".to_string(), "audio_fr_playlist.m3u8".to_string()),
            ]
        );
    }

    #[test]
    fn playlist_entries_skip_rows_without_playlist() {
        let tracks = vec![
            track_with_key("en", Some("1234/audio_en_playlist.m3u8")),
            track_with_key("de", None),
        ];
        assert_eq!(playlist_entries(&tracks).len(), 1);
    }

    #[test]
    fn keyed_lock_shared_while_held() {
        let locks = Mutex::new(HashMap::new());
        let id = Uuid::new_v4();
        let first = acquire_keyed_lock(&locks, id);
        let second = acquire_keyed_lock(&locks, id);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn keyed_lock_entry_evicted_after_release() {
        let locks = Mutex::new(HashMap::new());
        let id = Uuid::new_v4();
        let lock = acquire_keyed_lock(&locks, id);
        drop(lock);

        let _other = acquire_keyed_lock(&locks, Uuid::new_v4());
        let map = locks.lock().unwrap();
        assert!(!map.contains_key(&id));
        assert_eq!(map.len(), 1);
    }
}
