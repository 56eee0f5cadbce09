//! Scan configuration
//!
//! Options are an explicit value handed to the orchestrator. They can be
//! loaded from a [`SettingsStore`] under the `scan.*` keys; list options are
//! stored as JSON arrays.

use bridge_traits::storage::SettingsStore;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const KEY_GENRE_SPLIT_SYMBOLS: &str = "scan.genre_split_symbols";
pub const KEY_ARTIST_SPLIT_SYMBOLS: &str = "scan.artist_split_symbols";
pub const KEY_MINIMUM_DURATION_SECS: &str = "scan.minimum_duration_secs";
pub const KEY_IGNORE_NUMERIC_GENRES: &str = "scan.ignore_numeric_genres";
pub const KEY_CLASSIFICATION_TYPES: &str = "scan.classification_types";
pub const KEY_LYRICS_SIDECAR_FORCES_UPDATE: &str = "scan.lyrics_sidecar_forces_update";
pub const KEY_WRITE_BACK_ADD_DATE: &str = "scan.write_back_add_date";
pub const KEY_AUDIO_EXTENSIONS: &str = "scan.audio_extensions";
pub const KEY_PROGRESS_INTERVAL: &str = "scan.progress_interval";

/// Options consulted while scanning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanOptions {
    /// Symbols splitting one genre tag into several genres (e.g. `";"`, `"/"`)
    pub genre_split_symbols: Vec<String>,

    /// Symbols splitting one artist tag into several artists (e.g. `" & "`)
    pub artist_split_symbols: Vec<String>,

    /// Files shorter than this are ignored; 0 disables the filter
    pub minimum_duration_secs: f64,

    /// Drop genres that are plain numbers such as `"13"` or `"(13)"`
    pub ignore_numeric_genres: bool,

    /// Extra classification types read from tags besides Genre, Mood and Language
    pub classification_types: Vec<String>,

    /// Treat an unchanged file as updated when the song lacks lyrics and a
    /// `.lrc` sidecar exists
    pub lyrics_sidecar_forces_update: bool,

    /// Write an earlier stored add date back onto the file
    pub write_back_add_date: bool,

    /// Audio file extensions to include
    pub audio_extensions: Vec<String>,

    /// Emit a progress event every this many files
    pub progress_interval: u64,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            genre_split_symbols: Vec::new(),
            artist_split_symbols: Vec::new(),
            minimum_duration_secs: 0.0,
            ignore_numeric_genres: false,
            classification_types: Vec::new(),
            lyrics_sidecar_forces_update: false,
            write_back_add_date: false,
            audio_extensions: vec![
                "mp3".to_string(),
                "flac".to_string(),
                "ogg".to_string(),
                "oga".to_string(),
                "opus".to_string(),
                "m4a".to_string(),
                "aac".to_string(),
                "wav".to_string(),
                "wma".to_string(),
                "aiff".to_string(),
                "aif".to_string(),
                "ape".to_string(),
                "wv".to_string(),
            ],
            progress_interval: 10,
        }
    }
}

impl ScanOptions {
    /// Load options from `settings`.
    ///
    /// Each key falls back to its default on its own when it is missing or
    /// cannot be read; a broken key never affects the others.
    pub async fn load(settings: &dyn SettingsStore) -> Self {
        let defaults = Self::default();

        let options = Self {
            genre_split_symbols: json_list(settings, KEY_GENRE_SPLIT_SYMBOLS)
                .await
                .unwrap_or(defaults.genre_split_symbols),
            artist_split_symbols: json_list(settings, KEY_ARTIST_SPLIT_SYMBOLS)
                .await
                .unwrap_or(defaults.artist_split_symbols),
            minimum_duration_secs: value(
                settings.get_f64(KEY_MINIMUM_DURATION_SECS).await,
                KEY_MINIMUM_DURATION_SECS,
            )
            .filter(|secs| *secs >= 0.0)
            .unwrap_or(defaults.minimum_duration_secs),
            ignore_numeric_genres: value(
                settings.get_bool(KEY_IGNORE_NUMERIC_GENRES).await,
                KEY_IGNORE_NUMERIC_GENRES,
            )
            .unwrap_or(defaults.ignore_numeric_genres),
            classification_types: json_list(settings, KEY_CLASSIFICATION_TYPES)
                .await
                .unwrap_or(defaults.classification_types),
            lyrics_sidecar_forces_update: value(
                settings.get_bool(KEY_LYRICS_SIDECAR_FORCES_UPDATE).await,
                KEY_LYRICS_SIDECAR_FORCES_UPDATE,
            )
            .unwrap_or(defaults.lyrics_sidecar_forces_update),
            write_back_add_date: value(
                settings.get_bool(KEY_WRITE_BACK_ADD_DATE).await,
                KEY_WRITE_BACK_ADD_DATE,
            )
            .unwrap_or(defaults.write_back_add_date),
            audio_extensions: json_list(settings, KEY_AUDIO_EXTENSIONS)
                .await
                .filter(|extensions: &Vec<String>| !extensions.is_empty())
                .unwrap_or(defaults.audio_extensions),
            progress_interval: value(
                settings.get_i64(KEY_PROGRESS_INTERVAL).await,
                KEY_PROGRESS_INTERVAL,
            )
            .filter(|interval| *interval > 0)
            .map(|interval| interval as u64)
            .unwrap_or(defaults.progress_interval),
        };

        debug!(?options, "Loaded scan options");
        options
    }
}

fn value<T>(result: bridge_traits::error::Result<Option<T>>, key: &str) -> Option<T> {
    match result {
        Ok(value) => value,
        Err(e) => {
            warn!(key, error = %e, "Invalid scan option, using default");
            None
        }
    }
}

async fn json_list<T: DeserializeOwned>(settings: &dyn SettingsStore, key: &str) -> Option<Vec<T>> {
    let raw = value(settings.get_string(key).await, key)?;
    match serde_json::from_str(&raw) {
        Ok(list) => Some(list),
        Err(e) => {
            warn!(key, error = %e, "Scan option is not a JSON array, using default");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_desktop::SqliteSettingsStore;

    #[tokio::test]
    async fn test_empty_store_gives_defaults() {
        let settings = SqliteSettingsStore::in_memory().await.unwrap();
        assert_eq!(ScanOptions::load(&settings).await, ScanOptions::default());
    }

    #[test]
    fn test_documented_defaults() {
        let options = ScanOptions::default();
        assert!(options.genre_split_symbols.is_empty());
        assert!(options.artist_split_symbols.is_empty());
        assert_eq!(options.minimum_duration_secs, 0.0);
        assert!(!options.ignore_numeric_genres);
        assert!(!options.lyrics_sidecar_forces_update);
        assert!(options.audio_extensions.contains(&"flac".to_string()));
    }

    #[tokio::test]
    async fn test_load_all_keys() {
        let settings = SqliteSettingsStore::in_memory().await.unwrap();
        settings.set_string(KEY_GENRE_SPLIT_SYMBOLS, r#"[";", "/"]"#).await.unwrap();
        settings.set_string(KEY_ARTIST_SPLIT_SYMBOLS, r#"[" & "]"#).await.unwrap();
        settings.set_f64(KEY_MINIMUM_DURATION_SECS, 30.0).await.unwrap();
        settings.set_bool(KEY_IGNORE_NUMERIC_GENRES, true).await.unwrap();
        settings.set_string(KEY_CLASSIFICATION_TYPES, r#"["Occasion"]"#).await.unwrap();
        settings.set_bool(KEY_LYRICS_SIDECAR_FORCES_UPDATE, true).await.unwrap();
        settings.set_bool(KEY_WRITE_BACK_ADD_DATE, true).await.unwrap();
        settings.set_string(KEY_AUDIO_EXTENSIONS, r#"["mp3"]"#).await.unwrap();
        settings.set_i64(KEY_PROGRESS_INTERVAL, 50).await.unwrap();

        let options = ScanOptions::load(&settings).await;

        assert_eq!(options.genre_split_symbols, vec![";", "/"]);
        assert_eq!(options.artist_split_symbols, vec![" & "]);
        assert_eq!(options.minimum_duration_secs, 30.0);
        assert!(options.ignore_numeric_genres);
        assert_eq!(options.classification_types, vec!["Occasion"]);
        assert!(options.lyrics_sidecar_forces_update);
        assert!(options.write_back_add_date);
        assert_eq!(options.audio_extensions, vec!["mp3"]);
        assert_eq!(options.progress_interval, 50);
    }

    #[tokio::test]
    async fn test_invalid_key_falls_back_alone() {
        let settings = SqliteSettingsStore::in_memory().await.unwrap();
        settings.set_string(KEY_GENRE_SPLIT_SYMBOLS, "not json").await.unwrap();
        // Wrong type: stored as a string, read as a float
        settings.set_string(KEY_MINIMUM_DURATION_SECS, "thirty").await.unwrap();
        settings.set_bool(KEY_IGNORE_NUMERIC_GENRES, true).await.unwrap();
        settings.set_i64(KEY_PROGRESS_INTERVAL, 0).await.unwrap();

        let options = ScanOptions::load(&settings).await;

        assert!(options.genre_split_symbols.is_empty());
        assert_eq!(options.minimum_duration_secs, 0.0);
        assert!(options.ignore_numeric_genres);
        assert_eq!(options.progress_interval, 10);
    }
}
