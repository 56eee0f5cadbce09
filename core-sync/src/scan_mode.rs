//! Per-file scan decision

use bridge_traits::storage::AudioFile;
use core_library::models::Song;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// What the scanner does with one discovered file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScanMode {
    /// No song is stored for this path yet
    Add,
    /// The file changed since the song was stored
    Update,
    /// The stored song is current
    Skip,
}

impl ScanMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanMode::Add => "add",
            ScanMode::Update => "update",
            ScanMode::Skip => "skip",
        }
    }
}

/// Decide how to treat `file` given the song cached for its path.
///
/// Change timestamps are compared with exact millisecond equality. When
/// `lyrics_sidecar_forces_update` is set, an unchanged file still updates if
/// the stored song has no lyrics and a sidecar `.lrc` file was found.
pub fn classify(
    file: &AudioFile,
    cached: Option<&Song>,
    lyrics_sidecar_forces_update: bool,
) -> ScanMode {
    let Some(song) = cached else {
        return ScanMode::Add;
    };

    if file.change_date == song.change_date {
        let missing_lyrics = song.lyrics.as_deref().map_or(true, |l| l.trim().is_empty());
        if lyrics_sidecar_forces_update && missing_lyrics && file.lyrics_sidecar.is_some() {
            return ScanMode::Update;
        }
        return ScanMode::Skip;
    }

    if file.change_date < song.change_date {
        warn!(
            path = %file.path.display(),
            file_change_date = file.change_date,
            stored_change_date = song.change_date,
            "File is older than the stored song"
        );
    }
    ScanMode::Update
}
