//! Storage and File System Abstractions
//!
//! Provides platform-agnostic traits for file probing, audio file discovery
//! and key-value settings storage.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::error::{BridgeError, Result};

/// A discovered audio file, as produced by an [`AudioFileEnumerator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFile {
    /// Absolute path to the file
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// When the file was added to the file system (Unix milliseconds)
    pub add_date: i64,
    /// When the file content last changed (Unix milliseconds)
    pub change_date: i64,
    /// Directories are reported by some enumerators and skipped by the engine
    pub is_directory: bool,
    /// Sibling `.lrc` file, when one exists
    pub lyrics_sidecar: Option<PathBuf>,
}

impl AudioFile {
    /// File name without extension, used as a fallback title
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("Unknown")
            .to_string()
    }
}

/// File system access trait
///
/// Abstracts the small set of file operations the sync engine performs
/// outside of metadata extraction.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::FileSystemAccess;
///
/// async fn still_there(fs: &dyn FileSystemAccess, path: &Path) -> Result<bool> {
///     fs.exists(path).await
/// }
/// ```
#[async_trait]
pub trait FileSystemAccess: Send + Sync {
    /// Check if a file or directory exists
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Persist an earlier "added" timestamp back onto the file.
    ///
    /// Most platforms cannot rewrite a file's birth time, so the default
    /// implementation reports the capability as unavailable.
    async fn write_added_date(&self, path: &Path, added_at: i64) -> Result<()> {
        let _ = added_at;
        Err(BridgeError::NotAvailable(format!(
            "write_added_date for {}",
            path.display()
        )))
    }
}

/// Audio file discovery trait
///
/// Produces every audio file below `roots` whose extension (case-insensitive)
/// is in `extensions`. The sequence is finite and one-shot; enumerators are
/// not required to be restartable.
#[async_trait]
pub trait AudioFileEnumerator: Send + Sync {
    async fn enumerate(&self, roots: &[PathBuf], extensions: &[String]) -> Result<Vec<AudioFile>>;
}

/// Key-value settings storage trait
///
/// Used as the configuration provider for scan options. Values are typed;
/// reading a key with the wrong type is an error that callers are expected
/// to treat as "invalid, fall back to default".
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::SettingsStore;
///
/// async fn save_preference(store: &dyn SettingsStore) -> Result<()> {
///     store.set_bool("scan.ignore_numeric_genres", true).await
/// }
/// ```
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Store a string value
    async fn set_string(&self, key: &str, value: &str) -> Result<()>;

    /// Retrieve a string value
    async fn get_string(&self, key: &str) -> Result<Option<String>>;

    /// Store a boolean value
    async fn set_bool(&self, key: &str, value: bool) -> Result<()>;

    /// Retrieve a boolean value
    async fn get_bool(&self, key: &str) -> Result<Option<bool>>;

    /// Store an integer value
    async fn set_i64(&self, key: &str, value: i64) -> Result<()>;

    /// Retrieve an integer value
    async fn get_i64(&self, key: &str) -> Result<Option<i64>>;

    /// Store a float value
    async fn set_f64(&self, key: &str, value: f64) -> Result<()>;

    /// Retrieve a float value
    async fn get_f64(&self, key: &str) -> Result<Option<f64>>;

    /// Delete a value
    async fn delete(&self, key: &str) -> Result<()>;

    /// Check if a key exists
    async fn has_key(&self, key: &str) -> Result<bool>;

    /// List all keys
    async fn list_keys(&self) -> Result<Vec<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ReadOnlyFs;

    #[async_trait]
    impl FileSystemAccess for ReadOnlyFs {
        async fn exists(&self, _path: &Path) -> Result<bool> {
            Ok(true)
        }
    }

    #[test]
    fn test_audio_file_stem() {
        let file = AudioFile {
            path: PathBuf::from("/music/unknown/track.mp3"),
            size: 10,
            add_date: 0,
            change_date: 0,
            is_directory: false,
            lyrics_sidecar: None,
        };
        assert_eq!(file.stem(), "track");
    }

    #[tokio::test]
    async fn test_write_added_date_defaults_to_unavailable() {
        let fs = ReadOnlyFs;
        let result = fs.write_added_date(Path::new("/music/a.mp3"), 0).await;
        assert!(matches!(result, Err(BridgeError::NotAvailable(_))));
    }
}
