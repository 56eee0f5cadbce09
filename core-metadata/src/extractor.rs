//! Audio Tag Extraction
//!
//! A [`MetadataReader`] backed by the `lofty` crate. It supports ID3v2,
//! Vorbis Comments, MP4 atoms, APE tags and RIFF INFO.
//!
//! ## Overview
//!
//! - Maps tag items onto the closed [`TagKey`] vocabulary; items without a
//!   counterpart are dropped
//! - Normalizes text values (whitespace collapsed, control characters removed)
//! - Reports technical properties (duration, bitrate, sample rate, size)
//! - Falls back to a sibling `.lrc` file when the tag carries no lyrics
//! - Picks up folder images (`cover.jpg`, `folder.jpg`, `artist.jpg`, ...)
//! - Never fails the read: corrupt or unsupported files come back with
//!   [`KeyValues::errors`] filled in
//!
//! ## Usage
//!
//! ```ignore
//! use core_metadata::{LoftyMetadataReader, MetadataReader, TagKey};
//!
//! let reader = LoftyMetadataReader::new();
//! let values = reader.read(&audio_file).await;
//! println!("Title: {:?}", values.text(&TagKey::Title));
//! ```

use async_trait::async_trait;
use bridge_traits::storage::AudioFile;
use lofty::config::ParseOptions;
use lofty::file::{AudioFile as _, TaggedFileExt};
use lofty::picture::PictureType;
use lofty::probe::Probe;
use lofty::tag::{Accessor, ItemKey, Tag};
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{MetadataError, Result};
use crate::reader::MetadataReader;
use crate::tags::{ImageRef, KeyValues, TagKey};

/// Folder images treated as album art, in order of preference
const ALBUM_ART_FILES: &[&str] = &[
    "cover.jpg",
    "cover.png",
    "folder.jpg",
    "folder.png",
    "front.jpg",
];

/// Folder images treated as artist pictures
const ARTIST_IMAGE_FILES: &[&str] = &["artist.jpg", "artist.png"];

/// Tag reader built on `lofty`
pub struct LoftyMetadataReader {
    parse_options: ParseOptions,
    /// Names of configured classification types read from free-form tag items
    classification_types: Vec<String>,
}

impl LoftyMetadataReader {
    pub fn new() -> Self {
        Self {
            parse_options: ParseOptions::new(),
            classification_types: Vec::new(),
        }
    }

    /// Create reader with custom parse options
    pub fn with_options(parse_options: ParseOptions) -> Self {
        Self {
            parse_options,
            ..Self::new()
        }
    }

    /// Also read the given classification types.
    ///
    /// A type named `Occasion` is read from the free-form `OCCASION` item and
    /// reported under `TagKey::Classification("Occasion")`.
    pub fn with_classification_types(mut self, types: Vec<String>) -> Self {
        self.classification_types = types;
        self
    }

    async fn extract(&self, file: &AudioFile) -> Result<KeyValues> {
        let data = tokio::fs::read(&file.path).await?;

        let probe = Probe::new(Cursor::new(&data))
            .options(self.parse_options)
            .guess_file_type()?;
        if probe.file_type().is_none() {
            return Err(MetadataError::UnsupportedFormat(file.path.display().to_string()));
        }
        let tagged_file = probe.read()?;

        let mut values = KeyValues::new();

        let properties = tagged_file.properties();
        values.push(TagKey::Seconds, properties.duration().as_secs_f64());
        if let Some(kbps) = properties.audio_bitrate() {
            values.push(TagKey::Bitrate, i64::from(kbps) * 1000);
        }
        if let Some(sample_rate) = properties.sample_rate() {
            values.push(TagKey::Frequency, i64::from(sample_rate));
        }
        values.push(TagKey::FileSize, data.len() as i64);

        match tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) {
            Some(tag) => self.map_tag(tag, &file.path, &mut values),
            None => debug!(path = %file.path.display(), "No tags found"),
        }

        if !values.contains(&TagKey::Lyrics) {
            if let Some(sidecar) = &file.lyrics_sidecar {
                match tokio::fs::read_to_string(sidecar).await {
                    Ok(lyrics) if !lyrics.trim().is_empty() => {
                        values.push(TagKey::Lyrics, lyrics)
                    }
                    Ok(_) => {}
                    Err(e) => warn!(
                        path = %sidecar.display(),
                        error = %e,
                        "Failed to read lyrics sidecar"
                    ),
                }
            }
        }

        if let Some(folder) = file.path.parent() {
            if let Some(cover) = first_existing(folder, ALBUM_ART_FILES).await {
                values.push(TagKey::AlbumArt, ImageRef::image_file(cover));
            }
            if let Some(portrait) = first_existing(folder, ARTIST_IMAGE_FILES).await {
                values.push(TagKey::ArtistImage, ImageRef::image_file(portrait));
            }
        }

        Ok(values)
    }

    fn map_tag(&self, tag: &Tag, path: &Path, values: &mut KeyValues) {
        let text_items = [
            (ItemKey::TrackTitle, TagKey::Title),
            (ItemKey::TrackArtist, TagKey::Artist),
            (ItemKey::AlbumArtist, TagKey::AlbumArtist),
            (ItemKey::AlbumTitle, TagKey::Album),
            (ItemKey::Unknown("FEATURING".to_string()), TagKey::FeaturingArtist),
            (ItemKey::Performer, TagKey::Singer),
            (ItemKey::Composer, TagKey::Composer),
            (ItemKey::Genre, TagKey::Genre),
            (ItemKey::Mood, TagKey::Mood),
            (ItemKey::Language, TagKey::Language),
            (ItemKey::Lyrics, TagKey::Lyrics),
        ];
        for (item, key) in text_items {
            push_texts(tag, &item, key, values);
        }

        for name in &self.classification_types {
            let item = ItemKey::Unknown(name.to_uppercase());
            push_texts(tag, &item, TagKey::Classification(name.clone()), values);
        }

        let year = tag.year().map(i64::from).or_else(|| {
            tag.get_string(&ItemKey::RecordingDate)
                .and_then(|date| date.get(..4))
                .and_then(|head| head.parse().ok())
        });
        if let Some(year) = year {
            values.push(TagKey::Year, year);
        }
        if let Some(track) = tag.track() {
            values.push(TagKey::TrackNumber, i64::from(track));
        }
        if let Some(disk) = tag.disk() {
            values.push(TagKey::MediaNumber, i64::from(disk));
        }
        if let Some(gain) = tag
            .get_string(&ItemKey::ReplayGainTrackGain)
            .and_then(parse_replay_gain)
        {
            values.push(TagKey::ReplayGain, gain);
        }

        for (index, picture) in tag.pictures().iter().enumerate() {
            if picture.data().is_empty() {
                continue;
            }
            let key = picture_key(picture.pic_type());
            values.push(key, ImageRef::embedded(path, index as u32));
        }
    }
}

impl Default for LoftyMetadataReader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetadataReader for LoftyMetadataReader {
    async fn read(&self, file: &AudioFile) -> KeyValues {
        match self.extract(file).await {
            Ok(values) => values,
            Err(e) => {
                warn!(path = %file.path.display(), error = %e, "Metadata extraction failed");
                KeyValues::failed(e.to_string())
            }
        }
    }
}

fn push_texts(tag: &Tag, item: &ItemKey, key: TagKey, values: &mut KeyValues) {
    for text in tag.get_strings(item) {
        // Lyrics keep their line breaks
        let text = match key {
            TagKey::Lyrics => text.trim().to_string(),
            _ => normalize_text(text),
        };
        if !text.is_empty() {
            values.push(key.clone(), text);
        }
    }
}

async fn first_existing(folder: &Path, names: &[&str]) -> Option<std::path::PathBuf> {
    for name in names {
        let candidate = folder.join(name);
        if tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
            return Some(candidate);
        }
    }
    None
}

fn picture_key(picture_type: PictureType) -> TagKey {
    match picture_type {
        PictureType::CoverFront
        | PictureType::CoverBack
        | PictureType::Media
        | PictureType::Leaflet
        | PictureType::Other => TagKey::AlbumArt,
        PictureType::Artist
        | PictureType::LeadArtist
        | PictureType::Band
        | PictureType::Conductor
        | PictureType::Composer
        | PictureType::Lyricist => TagKey::ArtistImage,
        _ => TagKey::SongImage,
    }
}

/// Normalize text metadata
///
/// - Trims leading/trailing whitespace
/// - Normalizes consecutive whitespace to single space
/// - Removes null bytes and control characters
fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .filter(|c| !c.is_control())
        .collect()
}

/// Parse a gain such as `"-6.54 dB"`
fn parse_replay_gain(raw: &str) -> Option<f64> {
    raw.split_whitespace().next()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("  Hello   World  "), "Hello World");
        assert_eq!(normalize_text("Title\nWith\tWhitespace"), "Title With Whitespace");
        assert_eq!(normalize_text("Clean Text"), "Clean Text");
        assert_eq!(normalize_text("Nul\u{0}Byte"), "NulByte");
    }

    #[test]
    fn test_parse_replay_gain() {
        assert_eq!(parse_replay_gain("-6.54 dB"), Some(-6.54));
        assert_eq!(parse_replay_gain("+1.20"), Some(1.2));
        assert_eq!(parse_replay_gain("loud"), None);
        assert_eq!(parse_replay_gain(""), None);
    }

    #[test]
    fn test_picture_key() {
        assert_eq!(picture_key(PictureType::CoverFront), TagKey::AlbumArt);
        assert_eq!(picture_key(PictureType::Other), TagKey::AlbumArt);
        assert_eq!(picture_key(PictureType::LeadArtist), TagKey::ArtistImage);
        assert_eq!(picture_key(PictureType::Illustration), TagKey::SongImage);
    }

    #[test]
    fn test_classification_types_builder() {
        let reader =
            LoftyMetadataReader::new().with_classification_types(vec!["Occasion".to_string()]);
        assert_eq!(reader.classification_types, vec!["Occasion".to_string()]);

        let defaults = LoftyMetadataReader::default();
        assert!(defaults.classification_types.is_empty());
        assert_eq!(
            format!("{:?}", defaults.parse_options),
            format!("{:?}", ParseOptions::new())
        );
    }
}
