//! Tag vocabulary shared by metadata readers and the sync engine.
//!
//! Readers map whatever their source format carries onto [`TagKey`]. Source
//! fields with no counterpart in the vocabulary are dropped by the reader;
//! they never reach the engine.

use core_library::models::{ImageSourceType, ImageType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Known tag fields
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TagKey {
    Title,
    Artist,
    AlbumArtist,
    Album,
    FeaturingArtist,
    Singer,
    Composer,
    Year,
    TrackNumber,
    MediaNumber,
    Genre,
    Mood,
    Language,
    /// Values of a configured classification type, keyed by the type name
    Classification(String),
    Lyrics,
    /// Duration in seconds
    Seconds,
    /// Bits per second
    Bitrate,
    Frequency,
    Vbr,
    ReplayGain,
    FileSize,
    Rating,
    PlayCount,
    PerformerCount,
    Favorite,
    Live,
    Explicit,
    AlbumArt,
    ArtistImage,
    SongImage,
}

impl TagKey {
    /// Image type carried by the image keys
    pub fn image_type(&self) -> Option<ImageType> {
        match self {
            TagKey::AlbumArt => Some(ImageType::AlbumArt),
            TagKey::ArtistImage => Some(ImageType::ArtistImage),
            TagKey::SongImage => Some(ImageType::SongImage),
            _ => None,
        }
    }
}

/// Where an image lives: a picture frame inside an audio file, or a
/// standalone image file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageRef {
    pub source_path: PathBuf,
    /// Position of the picture inside `source_path` (0 for image files)
    pub source_index: u32,
    pub source_type: ImageSourceType,
}

impl ImageRef {
    pub fn embedded(source_path: impl Into<PathBuf>, source_index: u32) -> Self {
        Self {
            source_path: source_path.into(),
            source_index,
            source_type: ImageSourceType::Embedded,
        }
    }

    pub fn image_file(source_path: impl Into<PathBuf>) -> Self {
        Self {
            source_path: source_path.into(),
            source_index: 0,
            source_type: ImageSourceType::ImageFile,
        }
    }
}

/// A single raw tag value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TagValue {
    Text(String),
    Integer(i64),
    Real(f64),
    Flag(bool),
    Image(ImageRef),
}

impl TagValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            TagValue::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    /// Integer view; numeric text such as `"7"` or `"7/12"` is accepted.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            TagValue::Integer(value) => Some(*value),
            TagValue::Real(value) => Some(value.round() as i64),
            TagValue::Text(text) => text
                .split('/')
                .next()
                .and_then(|head| head.trim().parse().ok()),
            TagValue::Flag(_) | TagValue::Image(_) => None,
        }
    }

    pub fn as_real(&self) -> Option<f64> {
        match self {
            TagValue::Real(value) => Some(*value),
            TagValue::Integer(value) => Some(*value as f64),
            TagValue::Text(text) => text.trim().parse().ok(),
            TagValue::Flag(_) | TagValue::Image(_) => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            TagValue::Flag(value) => Some(*value),
            TagValue::Integer(value) => Some(*value != 0),
            TagValue::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => Some(true),
                "0" | "false" | "no" => Some(false),
                _ => None,
            },
            TagValue::Real(_) | TagValue::Image(_) => None,
        }
    }

    pub fn as_image(&self) -> Option<&ImageRef> {
        match self {
            TagValue::Image(image) => Some(image),
            _ => None,
        }
    }
}

impl From<&str> for TagValue {
    fn from(value: &str) -> Self {
        TagValue::Text(value.to_string())
    }
}

impl From<String> for TagValue {
    fn from(value: String) -> Self {
        TagValue::Text(value)
    }
}

impl From<i64> for TagValue {
    fn from(value: i64) -> Self {
        TagValue::Integer(value)
    }
}

impl From<f64> for TagValue {
    fn from(value: f64) -> Self {
        TagValue::Real(value)
    }
}

impl From<bool> for TagValue {
    fn from(value: bool) -> Self {
        TagValue::Flag(value)
    }
}

impl From<ImageRef> for TagValue {
    fn from(value: ImageRef) -> Self {
        TagValue::Image(value)
    }
}

/// Everything a reader extracted from one file.
///
/// Each key maps to its values in tag order, since tags may repeat.
/// Extraction problems are collected in `errors` instead of failing the read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyValues {
    fields: BTreeMap<TagKey, Vec<TagValue>>,
    pub errors: Vec<String>,
    /// Set by readers that decided the file should not be imported
    pub ignored: bool,
}

impl KeyValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// A result carrying only an extraction error
    pub fn failed(error: impl Into<String>) -> Self {
        let mut values = Self::new();
        values.errors.push(error.into());
        values
    }

    /// Append a value to `key`
    pub fn push(&mut self, key: TagKey, value: impl Into<TagValue>) {
        self.fields.entry(key).or_default().push(value.into());
    }

    /// Builder form of [`KeyValues::push`]
    pub fn with(mut self, key: TagKey, value: impl Into<TagValue>) -> Self {
        self.push(key, value);
        self
    }

    /// Replace every value of `key`
    pub fn set(&mut self, key: TagKey, value: impl Into<TagValue>) {
        self.fields.insert(key, vec![value.into()]);
    }

    pub fn get(&self, key: &TagKey) -> &[TagValue] {
        self.fields.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, key: &TagKey) -> bool {
        !self.get(key).is_empty()
    }

    /// First non-blank text value of `key`, trimmed
    pub fn text(&self, key: &TagKey) -> Option<&str> {
        self.texts(key).into_iter().next()
    }

    /// Every non-blank text value of `key`, trimmed, in tag order
    pub fn texts(&self, key: &TagKey) -> Vec<&str> {
        self.get(key)
            .iter()
            .filter_map(TagValue::as_text)
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .collect()
    }

    pub fn integer(&self, key: &TagKey) -> Option<i64> {
        self.get(key).iter().find_map(TagValue::as_integer)
    }

    pub fn real(&self, key: &TagKey) -> Option<f64> {
        self.get(key).iter().find_map(TagValue::as_real)
    }

    pub fn flag(&self, key: &TagKey) -> Option<bool> {
        self.get(key).iter().find_map(TagValue::as_flag)
    }

    pub fn images(&self, key: &TagKey) -> Vec<&ImageRef> {
        self.get(key).iter().filter_map(TagValue::as_image).collect()
    }

    /// Keys of the configured classification types present in this file
    pub fn classification_keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().filter_map(|key| match key {
            TagKey::Classification(name) => Some(name.as_str()),
            _ => None,
        })
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &TagKey> {
        self.fields.keys()
    }
}
