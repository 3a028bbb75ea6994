//! Master playlist synthesis.
//!
//! Pure text assembly: given the video rendition's playlist name and the
//! completed audio renditions in completion order, render the master
//! manifest. The first entry in the given order is the default track; callers
//! must always pass the full current set of completed tracks, never a delta,
//! so a rebuild after a new track completes includes everything.

use polytrack_core::language_display_name;
use std::path::{Path, PathBuf};

/// Filename of the master manifest within an asset's output tree.
pub const MASTER_PLAYLIST: &str = "master.m3u8";

/// Render the master manifest. Deterministic: identical input yields
/// byte-identical output.
pub fn build_master_playlist(video_playlist: &str, audio_entries: &[(String, String)]) -> String {
    let mut manifest = String::from("#EXTM3U\n#EXT-X-VERSION:7\n");

    for (idx, (language, playlist)) in audio_entries.iter().enumerate() {
        let default = if idx == 0 { "YES" } else { "NO" };
        manifest.push_str(&format!(
            "#EXT-X-MEDIA:TYPE=AUDIO,GROUP-ID=\"audio\",NAME=\"{}\",LANGUAGE=\"{}\",DEFAULT={},AUTOSELECT=YES,URI=\"{}\"\n",
            language_display_name(language),
            language,
            default,
            playlist
        ));
    }

    manifest.push_str("#EXT-X-STREAM-INF:BANDWIDTH=2000000,AUDIO=\"audio\"\n");
    manifest.push_str(video_playlist);
    manifest.push('\n');
    manifest
}

/// Write the master manifest into `out_dir`, overwriting any previous one.
pub async fn write_master_playlist(
    out_dir: &Path,
    video_playlist: &str,
    audio_entries: &[(String, String)],
) -> std::io::Result<PathBuf> {
    let path = out_dir.join(MASTER_PLAYLIST);
    let manifest = build_master_playlist(video_playlist, audio_entries);
    tokio::fs::write(&path, manifest).await?;
    Ok(path)
}
