//! Domain models for the audio library
//!
//! This module contains the persisted entities together with their database
//! mapping. Every entity implements [`TableRow`], which describes its table,
//! its columns and how to read a column value off an instance; the store
//! builds its bulk statements from that description.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

/// Name of the artist, album, language and mood entries used when a tag is missing
pub const UNKNOWN_NAME: &str = "Unknown";

/// Compilation artist that is never removed by cleanup
pub const VARIOUS_ARTIST_NAME: &str = "Various";

/// Seeded classification type names
pub const GENRE_TYPE_NAME: &str = "Genre";
pub const MOOD_TYPE_NAME: &str = "Mood";
pub const LANGUAGE_TYPE_NAME: &str = "Language";

// =============================================================================
// ID Types
// =============================================================================

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

entity_id!(
    /// Unique identifier for an artist
    ArtistId
);
entity_id!(
    /// Unique identifier for an album
    AlbumId
);
entity_id!(
    /// Unique identifier for a song
    SongId
);
entity_id!(
    /// Unique identifier for a classification type or entry
    ClassificationId
);
entity_id!(
    /// Unique identifier for a value-list entry
    ValueListId
);
entity_id!(
    /// Unique identifier for a party relation
    RelationId
);
entity_id!(
    /// Unique identifier for a related image
    ImageId
);

// =============================================================================
// Column values
// =============================================================================

/// A single SQLite value read off an entity for a bulk statement.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl From<i64> for ColumnValue {
    fn from(value: i64) -> Self {
        ColumnValue::Integer(value)
    }
}

impl From<i32> for ColumnValue {
    fn from(value: i32) -> Self {
        ColumnValue::Integer(i64::from(value))
    }
}

impl From<bool> for ColumnValue {
    fn from(value: bool) -> Self {
        ColumnValue::Integer(i64::from(value))
    }
}

impl From<f64> for ColumnValue {
    fn from(value: f64) -> Self {
        ColumnValue::Real(value)
    }
}

impl From<&str> for ColumnValue {
    fn from(value: &str) -> Self {
        ColumnValue::Text(value.to_string())
    }
}

impl From<&String> for ColumnValue {
    fn from(value: &String) -> Self {
        ColumnValue::Text(value.clone())
    }
}

impl<T> From<Option<T>> for ColumnValue
where
    T: Into<ColumnValue>,
{
    fn from(value: Option<T>) -> Self {
        value.map_or(ColumnValue::Null, Into::into)
    }
}

/// Table mapping for an entity.
///
/// `COLUMNS` lists every column written on insert, key columns included.
/// `UPDATABLE` is the allow-list bulk updates may touch; anything outside it
/// is never written after the row exists.
pub trait TableRow {
    const TABLE: &'static str;
    const KEY: &'static [&'static str];
    const COLUMNS: &'static [&'static str];
    const UPDATABLE: &'static [&'static str];

    /// Value of `column` for this row, `None` for a column the table lacks
    fn column_value(&self, column: &str) -> Option<ColumnValue>;
}

// =============================================================================
// Enumerations
// =============================================================================

/// Kind of a value-list entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "snake_case")]
pub enum ValueListKind {
    ArtistType,
    Country,
    AlbumType,
}

impl ValueListKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueListKind::ArtistType => "artist_type",
            ValueListKind::Country => "country",
            ValueListKind::AlbumType => "album_type",
        }
    }
}

/// How an artist is related to a song or album
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "snake_case")]
pub enum RelationType {
    /// The song's album artist
    Primary,
    /// Credited artist other than the primary one
    Featuring,
    Singer,
    /// Composer credit
    Contributor,
}

impl RelationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationType::Primary => "primary",
            RelationType::Featuring => "featuring",
            RelationType::Singer => "singer",
            RelationType::Contributor => "contributor",
        }
    }
}

/// Where the bytes of a related image live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "snake_case")]
pub enum ImageSourceType {
    /// Picture frame inside an audio file
    Embedded,
    /// Standalone image next to the audio files
    ImageFile,
}

impl ImageSourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageSourceType::Embedded => "embedded",
            ImageSourceType::ImageFile => "image_file",
        }
    }
}

/// What a related image depicts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "snake_case")]
pub enum ImageType {
    AlbumArt,
    ArtistImage,
    SongImage,
}

impl ImageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageType::AlbumArt => "album_art",
            ImageType::ArtistImage => "artist_image",
            ImageType::SongImage => "song_image",
        }
    }
}

// =============================================================================
// Entities
// =============================================================================

/// Entry of one of the small lookup lists (artist type, country, album type)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ValueListEntry {
    pub id: String,
    pub kind: ValueListKind,
    pub name: String,
}

impl ValueListEntry {
    pub fn new(kind: ValueListKind, name: impl Into<String>) -> Self {
        Self {
            id: ValueListId::new().to_string(),
            kind,
            name: name.into(),
        }
    }
}

impl TableRow for ValueListEntry {
    const TABLE: &'static str = "value_lists";
    const KEY: &'static [&'static str] = &["id"];
    const COLUMNS: &'static [&'static str] = &["id", "kind", "name"];
    const UPDATABLE: &'static [&'static str] = &["name"];

    fn column_value(&self, column: &str) -> Option<ColumnValue> {
        Some(match column {
            "id" => (&self.id).into(),
            "kind" => self.kind.as_str().into(),
            "name" => (&self.name).into(),
            _ => return None,
        })
    }
}

/// Classification type such as Genre, Mood or Language
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ClassificationType {
    pub id: String,
    pub name: String,
    /// Entries of this type become the song's primary genre
    pub is_genre: bool,
}

impl ClassificationType {
    pub fn new(name: impl Into<String>, is_genre: bool) -> Self {
        Self {
            id: ClassificationId::new().to_string(),
            name: name.into(),
            is_genre,
        }
    }
}

impl TableRow for ClassificationType {
    const TABLE: &'static str = "classification_types";
    const KEY: &'static [&'static str] = &["id"];
    const COLUMNS: &'static [&'static str] = &["id", "name", "is_genre"];
    const UPDATABLE: &'static [&'static str] = &["name", "is_genre"];

    fn column_value(&self, column: &str) -> Option<ColumnValue> {
        Some(match column {
            "id" => (&self.id).into(),
            "name" => (&self.name).into(),
            "is_genre" => self.is_genre.into(),
            _ => return None,
        })
    }
}

/// A named value of a classification type ("Rock" of type Genre)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ClassificationEntry {
    pub id: String,
    pub type_id: String,
    pub name: String,
    pub is_classification: bool,
}

impl ClassificationEntry {
    pub fn new(type_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: ClassificationId::new().to_string(),
            type_id: type_id.into(),
            name: name.into(),
            is_classification: true,
        }
    }
}

impl TableRow for ClassificationEntry {
    const TABLE: &'static str = "classification_entries";
    const KEY: &'static [&'static str] = &["id"];
    const COLUMNS: &'static [&'static str] = &["id", "type_id", "name", "is_classification"];
    const UPDATABLE: &'static [&'static str] = &["name", "is_classification"];

    fn column_value(&self, column: &str) -> Option<ColumnValue> {
        Some(match column {
            "id" => (&self.id).into(),
            "type_id" => (&self.type_id).into(),
            "name" => (&self.name).into(),
            "is_classification" => self.is_classification.into(),
            _ => return None,
        })
    }
}

/// Artist with metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Artist {
    pub id: String,
    pub name: String,
    pub stylized_name: String,
    pub sort_name: String,
    pub artist_type_id: String,
    pub country_id: String,
    pub favorite: bool,
    /// Unix milliseconds
    pub created_at: i64,
}

impl Artist {
    /// Create a new artist; stylized and sort names start out as the name
    pub fn new(
        name: impl Into<String>,
        artist_type_id: impl Into<String>,
        country_id: impl Into<String>,
        created_at: i64,
    ) -> Self {
        let name = name.into();
        Self {
            id: ArtistId::new().to_string(),
            stylized_name: name.clone(),
            sort_name: sort_name(&name),
            name,
            artist_type_id: artist_type_id.into(),
            country_id: country_id.into(),
            favorite: false,
            created_at,
        }
    }

    /// The compilation artist is exempt from orphan cleanup
    pub fn is_various(&self) -> bool {
        self.name.eq_ignore_ascii_case(VARIOUS_ARTIST_NAME)
    }
}

impl TableRow for Artist {
    const TABLE: &'static str = "artists";
    const KEY: &'static [&'static str] = &["id"];
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "name",
        "stylized_name",
        "sort_name",
        "artist_type_id",
        "country_id",
        "favorite",
        "created_at",
    ];
    const UPDATABLE: &'static [&'static str] = &["stylized_name", "sort_name", "favorite"];

    fn column_value(&self, column: &str) -> Option<ColumnValue> {
        Some(match column {
            "id" => (&self.id).into(),
            "name" => (&self.name).into(),
            "stylized_name" => (&self.stylized_name).into(),
            "sort_name" => (&self.sort_name).into(),
            "artist_type_id" => (&self.artist_type_id).into(),
            "country_id" => (&self.country_id).into(),
            "favorite" => self.favorite.into(),
            "created_at" => self.created_at.into(),
            _ => return None,
        })
    }
}

/// Album with metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Album {
    pub id: String,
    pub name: String,
    pub stylized_name: String,
    pub sort_name: String,
    /// 0 when no song reported a year
    pub release_year: i32,
    pub release_decade: i32,
    pub album_type_id: String,
    pub primary_artist_id: String,
    /// Unix milliseconds
    pub created_at: i64,
}

impl Album {
    pub fn new(
        name: impl Into<String>,
        release_year: i32,
        album_type_id: impl Into<String>,
        primary_artist_id: impl Into<String>,
        created_at: i64,
    ) -> Self {
        let name = name.into();
        Self {
            id: AlbumId::new().to_string(),
            stylized_name: name.clone(),
            sort_name: sort_name(&name),
            name,
            release_year,
            release_decade: decade_of(release_year),
            album_type_id: album_type_id.into(),
            primary_artist_id: primary_artist_id.into(),
            created_at,
        }
    }

    /// Raise the release year when `year` is later.
    ///
    /// Returns `true` when the album changed. Years never move backwards.
    pub fn promote_year(&mut self, year: i32) -> bool {
        if year > self.release_year {
            self.release_year = year;
            self.release_decade = decade_of(year);
            true
        } else {
            false
        }
    }
}

impl TableRow for Album {
    const TABLE: &'static str = "albums";
    const KEY: &'static [&'static str] = &["id"];
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "name",
        "stylized_name",
        "sort_name",
        "release_year",
        "release_decade",
        "album_type_id",
        "primary_artist_id",
        "created_at",
    ];
    const UPDATABLE: &'static [&'static str] = &["release_year", "release_decade"];

    fn column_value(&self, column: &str) -> Option<ColumnValue> {
        Some(match column {
            "id" => (&self.id).into(),
            "name" => (&self.name).into(),
            "stylized_name" => (&self.stylized_name).into(),
            "sort_name" => (&self.sort_name).into(),
            "release_year" => self.release_year.into(),
            "release_decade" => self.release_decade.into(),
            "album_type_id" => (&self.album_type_id).into(),
            "primary_artist_id" => (&self.primary_artist_id).into(),
            "created_at" => self.created_at.into(),
            _ => return None,
        })
    }
}

/// A song backed by one audio file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Song {
    pub id: String,
    /// Absolute path of the audio file
    pub file_path: String,
    pub title: String,
    /// Title without trailing bracketed groups
    pub clean_title: String,
    pub track_number: i32,
    pub media_number: i32,
    pub release_year: i32,
    pub release_decade: i32,
    /// Duration in seconds
    pub seconds: f64,
    /// Bits per second
    pub bitrate: i64,
    /// Sample rate in Hz
    pub frequency: i64,
    pub vbr: bool,
    pub replay_gain: f64,
    pub file_size: i64,
    pub lyrics: Option<String>,
    /// Unix milliseconds
    pub add_date: i64,
    /// Unix milliseconds; equals the file's change timestamp after a sync
    pub change_date: i64,
    /// Unix milliseconds of the last technical replacement
    pub replace_date: Option<i64>,
    pub rating: i32,
    pub play_count: i64,
    pub favorite: bool,
    pub live: bool,
    pub explicit: bool,
    pub performer_count: i32,
    pub primary_album_id: String,
    pub primary_genre_id: Option<String>,
    pub language_id: String,
    pub mood_id: String,
}

impl Song {
    /// Whether any technical audio field differs from `other`
    pub fn technical_fields_differ(&self, other: &Song) -> bool {
        self.seconds != other.seconds
            || self.bitrate != other.bitrate
            || self.frequency != other.frequency
            || self.vbr != other.vbr
            || self.replay_gain != other.replay_gain
            || self.file_size != other.file_size
    }
}

impl TableRow for Song {
    const TABLE: &'static str = "songs";
    const KEY: &'static [&'static str] = &["id"];
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "file_path",
        "title",
        "clean_title",
        "track_number",
        "media_number",
        "release_year",
        "release_decade",
        "seconds",
        "bitrate",
        "frequency",
        "vbr",
        "replay_gain",
        "file_size",
        "lyrics",
        "add_date",
        "change_date",
        "replace_date",
        "rating",
        "play_count",
        "favorite",
        "live",
        "explicit",
        "performer_count",
        "primary_album_id",
        "primary_genre_id",
        "language_id",
        "mood_id",
    ];
    const UPDATABLE: &'static [&'static str] = &[
        "seconds",
        "bitrate",
        "frequency",
        "vbr",
        "replay_gain",
        "file_size",
        "lyrics",
        "add_date",
        "change_date",
        "replace_date",
    ];

    fn column_value(&self, column: &str) -> Option<ColumnValue> {
        Some(match column {
            "id" => (&self.id).into(),
            "file_path" => (&self.file_path).into(),
            "title" => (&self.title).into(),
            "clean_title" => (&self.clean_title).into(),
            "track_number" => self.track_number.into(),
            "media_number" => self.media_number.into(),
            "release_year" => self.release_year.into(),
            "release_decade" => self.release_decade.into(),
            "seconds" => self.seconds.into(),
            "bitrate" => self.bitrate.into(),
            "frequency" => self.frequency.into(),
            "vbr" => self.vbr.into(),
            "replay_gain" => self.replay_gain.into(),
            "file_size" => self.file_size.into(),
            "lyrics" => self.lyrics.as_ref().into(),
            "add_date" => self.add_date.into(),
            "change_date" => self.change_date.into(),
            "replace_date" => self.replace_date.into(),
            "rating" => self.rating.into(),
            "play_count" => self.play_count.into(),
            "favorite" => self.favorite.into(),
            "live" => self.live.into(),
            "explicit" => self.explicit.into(),
            "performer_count" => self.performer_count.into(),
            "primary_album_id" => (&self.primary_album_id).into(),
            "primary_genre_id" => self.primary_genre_id.as_ref().into(),
            "language_id" => (&self.language_id).into(),
            "mood_id" => (&self.mood_id).into(),
            _ => return None,
        })
    }
}

/// Link between a song and one of its classification entries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct SongClassification {
    pub song_id: String,
    pub classification_id: String,
    pub classification_type_id: String,
    /// First resolved value of its type for this song
    pub is_primary: bool,
}

impl TableRow for SongClassification {
    const TABLE: &'static str = "song_classifications";
    const KEY: &'static [&'static str] = &["song_id", "classification_id"];
    const COLUMNS: &'static [&'static str] = &[
        "song_id",
        "classification_id",
        "classification_type_id",
        "is_primary",
    ];
    const UPDATABLE: &'static [&'static str] = &["is_primary"];

    fn column_value(&self, column: &str) -> Option<ColumnValue> {
        Some(match column {
            "song_id" => (&self.song_id).into(),
            "classification_id" => (&self.classification_id).into(),
            "classification_type_id" => (&self.classification_type_id).into(),
            "is_primary" => self.is_primary.into(),
            _ => return None,
        })
    }
}

/// Credit linking an artist (`party_id`) to a song or album (`subject_id`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct PartyRelation {
    pub id: String,
    pub subject_id: String,
    pub party_id: String,
    pub relation_type: RelationType,
}

impl PartyRelation {
    pub fn new(
        subject_id: impl Into<String>,
        party_id: impl Into<String>,
        relation_type: RelationType,
    ) -> Self {
        Self {
            id: RelationId::new().to_string(),
            subject_id: subject_id.into(),
            party_id: party_id.into(),
            relation_type,
        }
    }
}

impl TableRow for PartyRelation {
    const TABLE: &'static str = "party_relations";
    const KEY: &'static [&'static str] = &["id"];
    const COLUMNS: &'static [&'static str] = &["id", "subject_id", "party_id", "relation_type"];
    const UPDATABLE: &'static [&'static str] = &[];

    fn column_value(&self, column: &str) -> Option<ColumnValue> {
        Some(match column {
            "id" => (&self.id).into(),
            "subject_id" => (&self.subject_id).into(),
            "party_id" => (&self.party_id).into(),
            "relation_type" => self.relation_type.as_str().into(),
            _ => return None,
        })
    }
}

/// Image attached to an artist, album or song
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct RelatedImage {
    pub id: String,
    pub related_id: String,
    pub source_path: String,
    /// Picture index inside the source (always 0 for image files)
    pub source_index: i32,
    pub source_type: ImageSourceType,
    pub image_type: ImageType,
}

impl RelatedImage {
    pub fn new(
        related_id: impl Into<String>,
        source_path: impl Into<String>,
        source_index: i32,
        source_type: ImageSourceType,
        image_type: ImageType,
    ) -> Self {
        Self {
            id: ImageId::new().to_string(),
            related_id: related_id.into(),
            source_path: source_path.into(),
            source_index,
            source_type,
            image_type,
        }
    }
}

impl TableRow for RelatedImage {
    const TABLE: &'static str = "related_images";
    const KEY: &'static [&'static str] = &["id"];
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "related_id",
        "source_path",
        "source_index",
        "source_type",
        "image_type",
    ];
    const UPDATABLE: &'static [&'static str] = &["related_id"];

    fn column_value(&self, column: &str) -> Option<ColumnValue> {
        Some(match column {
            "id" => (&self.id).into(),
            "related_id" => (&self.related_id).into(),
            "source_path" => (&self.source_path).into(),
            "source_index" => self.source_index.into(),
            "source_type" => self.source_type.as_str().into(),
            "image_type" => self.image_type.as_str().into(),
            _ => return None,
        })
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// First year of the decade containing `year`, 0 for unknown years
pub fn decade_of(year: i32) -> i32 {
    if year > 0 {
        year - year % 10
    } else {
        0
    }
}

/// Sort key: leading English articles move to the end ("The Band" -> "Band, The")
pub fn sort_name(name: &str) -> String {
    for article in ["The ", "A ", "An "] {
        if name.len() > article.len()
            && name.is_char_boundary(article.len())
            && name[..article.len()].eq_ignore_ascii_case(article)
        {
            let rest = name[article.len()..].trim_start();
            return format!("{}, {}", rest, name[..article.len()].trim_end());
        }
    }
    name.to_string()
}
