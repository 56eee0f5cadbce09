//! Entity Materialization
//!
//! Turns one file's tag values into mutations of the [`UnitOfWork`].
//!
//! ## Add path
//!
//! 1. Primary artist from the album artist tag, else the artist tag, else "Unknown"
//! 2. Contributing artists from the artist and featuring tags, split by the
//!    configured symbols
//! 3. Primary album scoped to the primary artist; its year only moves forward
//! 4. Genres and the other classification types
//! 5. The song row with its defaults
//! 6. Party relations: Primary, Featuring, Singer and Contributor
//! 7. Song classifications, the first value of each type marked primary
//! 8. Related images, deduplicated by source
//!
//! ## Update path
//!
//! Only song fields and new images change. Relations and classifications
//! are never touched.

use bridge_traits::storage::AudioFile;
use core_library::models::{
    decade_of, Album, Artist, ClassificationEntry, ClassificationType, PartyRelation,
    RelatedImage, RelationType, Song, SongClassification, SongId, ValueListEntry, ValueListKind,
    GENRE_TYPE_NAME, LANGUAGE_TYPE_NAME, MOOD_TYPE_NAME, UNKNOWN_NAME,
};
use core_metadata::{KeyValues, TagKey};
use std::collections::HashSet;
use tracing::{debug, trace};

use crate::identity::{
    album_key, artist_key, classification_key, classification_type_key, image_key, song_key,
    value_list_key,
};
use crate::options::ScanOptions;
use crate::unit_of_work::UnitOfWork;

/// What the update path changed on a song
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub song_id: String,
    /// A technical field differed and `replace_date` was set
    pub replaced: bool,
    pub lyrics_changed: bool,
    /// The file reported an earlier add date, which the song adopted
    pub add_date_adopted: bool,
    /// Stored add date to write back onto the file
    pub write_back_add_date: Option<i64>,
    pub new_images: usize,
}

/// Applies one file's metadata to the unit of work
pub struct Materializer<'a> {
    uow: &'a mut UnitOfWork,
    options: &'a ScanOptions,
    /// Unix milliseconds used for creation and replacement stamps
    now: i64,
}

impl<'a> Materializer<'a> {
    pub fn new(uow: &'a mut UnitOfWork, options: &'a ScanOptions, now: i64) -> Self {
        Self { uow, options, now }
    }

    /// Create the song for a new file together with everything it references.
    ///
    /// Returns the id of the new song.
    pub fn add(&mut self, file: &AudioFile, values: &KeyValues) -> String {
        let primary_name = values
            .text(&TagKey::AlbumArtist)
            .or_else(|| values.text(&TagKey::Artist))
            .unwrap_or(UNKNOWN_NAME)
            .to_string();
        let primary_artist_id = self.resolve_artist(&primary_name);

        let contributor_names = values
            .texts(&TagKey::Artist)
            .into_iter()
            .chain(values.texts(&TagKey::FeaturingArtist))
            .flat_map(|name| split_names(name, &self.options.artist_split_symbols))
            .fold(Vec::new(), dedupe_names);
        let contributor_ids: Vec<String> = contributor_names
            .iter()
            .map(|name| self.resolve_artist(name))
            .collect();

        let album_name = values.text(&TagKey::Album).unwrap_or(UNKNOWN_NAME).to_string();
        let year = values.integer(&TagKey::Year).map(to_i32).unwrap_or(0).max(0);
        let album_id = self.resolve_album(&primary_artist_id, &album_name, year);

        // (type id, entry ids) in resolution order
        let mut classified: Vec<(String, Vec<String>)> = Vec::new();

        let genre_type_id = self.resolve_classification_type(GENRE_TYPE_NAME, true);
        let genres = self.genre_names(values);
        let genre_ids = self.resolve_entries(&genre_type_id, genres);
        classified.push((genre_type_id, genre_ids.clone()));

        let mood_type_id = self.resolve_classification_type(MOOD_TYPE_NAME, false);
        let moods = plain_names(values, &TagKey::Mood);
        let mood_ids = self.resolve_entries(&mood_type_id, moods);
        let mood_id = match mood_ids.first() {
            Some(id) => id.clone(),
            None => self.resolve_classification(&mood_type_id, UNKNOWN_NAME),
        };
        classified.push((mood_type_id, mood_ids));

        let language_type_id = self.resolve_classification_type(LANGUAGE_TYPE_NAME, false);
        let languages = plain_names(values, &TagKey::Language);
        let language_ids = self.resolve_entries(&language_type_id, languages);
        let language_id = match language_ids.first() {
            Some(id) => id.clone(),
            None => self.resolve_classification(&language_type_id, UNKNOWN_NAME),
        };
        classified.push((language_type_id, language_ids));

        let options = self.options;
        for type_name in &options.classification_types {
            let names = plain_names(values, &TagKey::Classification(type_name.clone()));
            if names.is_empty() {
                continue;
            }
            let type_id = self.resolve_classification_type(type_name, false);
            let entry_ids = self.resolve_entries(&type_id, names);
            // A configured name may resolve to a built-in type
            match classified.iter_mut().find(|(id, _)| *id == type_id) {
                Some((_, existing)) => existing.extend(entry_ids),
                None => classified.push((type_id, entry_ids)),
            }
        }

        let song_id = SongId::new().to_string();

        let mut relations = RelationSet::new(&song_id);
        relations.add(&primary_artist_id, RelationType::Primary);
        let mut featuring = 0;
        for artist_id in contributor_ids.iter().filter(|id| **id != primary_artist_id) {
            if relations.add(artist_id, RelationType::Featuring) {
                featuring += 1;
            }
        }
        for (tag, relation_type) in [
            (TagKey::Singer, RelationType::Singer),
            (TagKey::Composer, RelationType::Contributor),
        ] {
            let names: Vec<String> = values
                .texts(&tag)
                .into_iter()
                .flat_map(|name| split_names(name, &self.options.artist_split_symbols))
                .collect();
            for name in names {
                let artist_id = self.resolve_artist(&name);
                relations.add(&artist_id, relation_type);
            }
        }

        let performer_count = match values.integer(&TagKey::PerformerCount) {
            Some(count) => to_i32(count),
            None => 1 + featuring,
        };

        let title = values
            .text(&TagKey::Title)
            .map(str::to_string)
            .unwrap_or_else(|| file.stem());

        let mut song = Song {
            id: song_id.clone(),
            file_path: file.path.to_string_lossy().to_string(),
            clean_title: clean_title(&title),
            title,
            track_number: values.integer(&TagKey::TrackNumber).map(to_i32).unwrap_or(0),
            media_number: values.integer(&TagKey::MediaNumber).map(to_i32).unwrap_or(1),
            release_year: year,
            release_decade: decade_of(year),
            seconds: 0.0,
            bitrate: 0,
            frequency: 0,
            vbr: false,
            replay_gain: 0.0,
            file_size: 0,
            lyrics: values.text(&TagKey::Lyrics).map(str::to_string),
            add_date: file.add_date,
            change_date: file.change_date,
            replace_date: None,
            rating: values.integer(&TagKey::Rating).map(to_i32).unwrap_or(0),
            play_count: values.integer(&TagKey::PlayCount).unwrap_or(0),
            favorite: values.flag(&TagKey::Favorite).unwrap_or(false),
            live: values.flag(&TagKey::Live).unwrap_or(false),
            explicit: values.flag(&TagKey::Explicit).unwrap_or(false),
            performer_count,
            primary_album_id: album_id.clone(),
            primary_genre_id: genre_ids.first().cloned(),
            language_id,
            mood_id,
        };
        apply_technical_fields(&mut song, file, values);
        self.uow.songs.insert_new(song);

        self.uow.party_relations.extend(relations.into_rows());

        for (type_id, entry_ids) in classified {
            let mut seen = HashSet::new();
            let mut is_primary = true;
            for entry_id in entry_ids {
                if !seen.insert(entry_id.clone()) {
                    continue;
                }
                self.uow.song_classifications.push(SongClassification {
                    song_id: song_id.clone(),
                    classification_id: entry_id,
                    classification_type_id: type_id.clone(),
                    is_primary,
                });
                is_primary = false;
            }
        }

        let images = self.resolve_images(values, &song_id, &album_id, &primary_artist_id);

        debug!(
            path = %file.path.display(),
            song_id = %song_id,
            artist = %primary_name,
            album = %album_name,
            images,
            "Materialized new song"
        );
        song_id
    }

    /// Refresh the stored song for a changed file.
    ///
    /// Returns `None` when no song is cached for the path.
    pub fn update(&mut self, file: &AudioFile, values: &KeyValues) -> Option<UpdateOutcome> {
        let key = song_key(&file.path);
        let cached = self.uow.songs.find(&key)?.clone();
        let mut song = cached.clone();

        apply_technical_fields(&mut song, file, values);
        let replaced = song.technical_fields_differ(&cached);
        if replaced {
            song.replace_date = Some(self.now);
        }

        let lyrics_changed = match values.text(&TagKey::Lyrics) {
            Some(lyrics) if cached.lyrics.as_deref() != Some(lyrics) => {
                song.lyrics = Some(lyrics.to_string());
                true
            }
            _ => false,
        };

        let mut add_date_adopted = false;
        let mut write_back_add_date = None;
        if file.add_date < cached.add_date {
            song.add_date = file.add_date;
            add_date_adopted = true;
        } else if file.add_date > cached.add_date && self.options.write_back_add_date {
            write_back_add_date = Some(cached.add_date);
        }

        // The next scan compares against this to classify the file as unchanged
        song.change_date = file.change_date;

        let changed = song != cached;
        self.uow.songs.modify(&key, move |row| {
            *row = song;
            changed
        });

        let artist_id = self
            .uow
            .albums
            .find_by(|album| album.id == cached.primary_album_id)
            .map(|album| album.primary_artist_id.clone());
        let new_images = match artist_id {
            Some(artist_id) => {
                self.resolve_images(values, &cached.id, &cached.primary_album_id, &artist_id)
            }
            None => 0,
        };

        trace!(
            path = %file.path.display(),
            replaced,
            lyrics_changed,
            add_date_adopted,
            new_images,
            "Updated song"
        );

        Some(UpdateOutcome {
            song_id: cached.id,
            replaced,
            lyrics_changed,
            add_date_adopted,
            write_back_add_date,
            new_images,
        })
    }

    fn unknown_value(&mut self, kind: ValueListKind) -> String {
        if let Some(entry) = self.uow.value_lists.find(&value_list_key(kind, UNKNOWN_NAME)) {
            return entry.id.clone();
        }
        self.uow
            .value_lists
            .insert_new(ValueListEntry::new(kind, UNKNOWN_NAME))
            .id
            .clone()
    }

    fn resolve_artist(&mut self, name: &str) -> String {
        if let Some(artist) = self.uow.artists.find(&artist_key(name)) {
            return artist.id.clone();
        }
        let artist_type_id = self.unknown_value(ValueListKind::ArtistType);
        let country_id = self.unknown_value(ValueListKind::Country);
        self.uow
            .artists
            .insert_new(Artist::new(name, artist_type_id, country_id, self.now))
            .id
            .clone()
    }

    fn resolve_album(&mut self, primary_artist_id: &str, name: &str, year: i32) -> String {
        let key = album_key(primary_artist_id, name);
        if let Some(album) = self.uow.albums.find(&key) {
            let id = album.id.clone();
            if self.uow.albums.modify(&key, |album| album.promote_year(year)) {
                debug!(album = %name, year, "Promoted album release year");
            }
            return id;
        }
        let album_type_id = self.unknown_value(ValueListKind::AlbumType);
        self.uow
            .albums
            .insert_new(Album::new(name, year, album_type_id, primary_artist_id, self.now))
            .id
            .clone()
    }

    fn resolve_classification_type(&mut self, name: &str, is_genre: bool) -> String {
        if let Some(kind) = self.uow.classification_types.find(&classification_type_key(name)) {
            return kind.id.clone();
        }
        self.uow
            .classification_types
            .insert_new(ClassificationType::new(name, is_genre))
            .id
            .clone()
    }

    fn resolve_classification(&mut self, type_id: &str, name: &str) -> String {
        if let Some(entry) = self
            .uow
            .classification_entries
            .find(&classification_key(type_id, name))
        {
            return entry.id.clone();
        }
        self.uow
            .classification_entries
            .insert_new(ClassificationEntry::new(type_id, name))
            .id
            .clone()
    }

    fn resolve_entries(&mut self, type_id: &str, names: Vec<String>) -> Vec<String> {
        names
            .iter()
            .map(|name| self.resolve_classification(type_id, name))
            .collect()
    }

    fn genre_names(&self, values: &KeyValues) -> Vec<String> {
        values
            .texts(&TagKey::Genre)
            .into_iter()
            .flat_map(|name| split_names(name, &self.options.genre_split_symbols))
            .filter(|name| !(self.options.ignore_numeric_genres && is_numeric_genre(name)))
            .fold(Vec::new(), dedupe_names)
    }

    fn resolve_images(
        &mut self,
        values: &KeyValues,
        song_id: &str,
        album_id: &str,
        artist_id: &str,
    ) -> usize {
        let mut created = 0;
        for (key, related_id) in [
            (TagKey::AlbumArt, album_id),
            (TagKey::ArtistImage, artist_id),
            (TagKey::SongImage, song_id),
        ] {
            let Some(image_type) = key.image_type() else {
                continue;
            };
            for image in values.images(&key) {
                let source_path = image.source_path.to_string_lossy().to_string();
                let source_index = i32::try_from(image.source_index).unwrap_or(i32::MAX);
                if self.uow.images.find(&image_key(&source_path, source_index)).is_some() {
                    continue;
                }
                self.uow.images.insert_new(RelatedImage::new(
                    related_id,
                    source_path,
                    source_index,
                    image.source_type,
                    image_type,
                ));
                created += 1;
            }
        }
        created
    }
}

/// Party relations of one song, without duplicate (artist, type) pairs
struct RelationSet {
    song_id: String,
    seen: HashSet<(String, RelationType)>,
    rows: Vec<PartyRelation>,
}

impl RelationSet {
    fn new(song_id: &str) -> Self {
        Self {
            song_id: song_id.to_string(),
            seen: HashSet::new(),
            rows: Vec::new(),
        }
    }

    fn add(&mut self, artist_id: &str, relation_type: RelationType) -> bool {
        if !self.seen.insert((artist_id.to_string(), relation_type)) {
            return false;
        }
        self.rows
            .push(PartyRelation::new(&self.song_id, artist_id, relation_type));
        true
    }

    fn into_rows(self) -> Vec<PartyRelation> {
        self.rows
    }
}

/// Overwrite the technical fields the tags report; absent ones keep their value
fn apply_technical_fields(song: &mut Song, file: &AudioFile, values: &KeyValues) {
    if let Some(seconds) = values.real(&TagKey::Seconds) {
        song.seconds = seconds;
    }
    if let Some(bitrate) = values.integer(&TagKey::Bitrate) {
        song.bitrate = bitrate;
    }
    if let Some(frequency) = values.integer(&TagKey::Frequency) {
        song.frequency = frequency;
    }
    if let Some(vbr) = values.flag(&TagKey::Vbr) {
        song.vbr = vbr;
    }
    if let Some(gain) = values.real(&TagKey::ReplayGain) {
        song.replay_gain = gain;
    }
    song.file_size = values
        .integer(&TagKey::FileSize)
        .unwrap_or(file.size as i64);
}

/// Split `name` on every symbol; parts are trimmed and blanks dropped
pub fn split_names(name: &str, symbols: &[String]) -> Vec<String> {
    let mut parts = vec![name.to_string()];
    for symbol in symbols.iter().filter(|s| !s.is_empty()) {
        parts = parts
            .iter()
            .flat_map(|part| part.split(symbol.as_str()))
            .map(str::to_string)
            .collect();
    }
    parts
        .into_iter()
        .map(|part| part.trim().to_string())
        .filter(|part| !part.is_empty())
        .collect()
}

fn dedupe_names(mut names: Vec<String>, name: String) -> Vec<String> {
    if !names.iter().any(|n| n.to_lowercase() == name.to_lowercase()) {
        names.push(name);
    }
    names
}

fn plain_names(values: &KeyValues, key: &TagKey) -> Vec<String> {
    values
        .texts(key)
        .into_iter()
        .map(str::to_string)
        .fold(Vec::new(), dedupe_names)
}

/// `"13"` and `"(13)"` style genres
pub fn is_numeric_genre(name: &str) -> bool {
    let inner = name
        .trim()
        .trim_start_matches('(')
        .trim_end_matches(')')
        .trim();
    !inner.is_empty() && inner.chars().all(|c| c.is_ascii_digit())
}

/// Strip trailing `(...)` and `[...]` groups: "Song (Live) [2011 Remaster]" -> "Song"
pub fn clean_title(title: &str) -> String {
    let mut clean = title.trim_end();
    loop {
        let open = match clean.chars().last() {
            Some(')') => '(',
            Some(']') => '[',
            _ => break,
        };
        match clean.rfind(open) {
            Some(start) if !clean[..start].trim().is_empty() => clean = clean[..start].trim_end(),
            _ => break,
        }
    }
    clean.to_string()
}

fn to_i32(value: i64) -> i32 {
    i32::try_from(value).unwrap_or(0)
}
