//! Integration tests for metadata extraction
//!
//! Audio fixtures are generated on the fly: a minimal PCM WAV file is enough
//! to exercise property extraction, lyrics sidecars and folder images.

use bridge_traits::storage::AudioFile;
use core_library::models::ImageSourceType;
use core_metadata::{LoftyMetadataReader, MetadataReader, TagKey};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Mono 16-bit PCM WAV at 8 kHz lasting `seconds`
fn wav_bytes(seconds: u32) -> Vec<u8> {
    let sample_rate: u32 = 8_000;
    let byte_rate = sample_rate * 2;
    let data_len = byte_rate * seconds;

    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
    bytes.extend_from_slice(b"WAVE");
    bytes.extend_from_slice(b"fmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes()); // PCM
    bytes.extend_from_slice(&1u16.to_le_bytes()); // mono
    bytes.extend_from_slice(&sample_rate.to_le_bytes());
    bytes.extend_from_slice(&byte_rate.to_le_bytes());
    bytes.extend_from_slice(&2u16.to_le_bytes()); // block align
    bytes.extend_from_slice(&16u16.to_le_bytes()); // bits per sample
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_len.to_le_bytes());
    bytes.resize(bytes.len() + data_len as usize, 0);
    bytes
}

fn audio_file(path: &Path, lyrics_sidecar: Option<PathBuf>) -> AudioFile {
    let size = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    AudioFile {
        path: path.to_path_buf(),
        size,
        add_date: 1_700_000_000_000,
        change_date: 1_700_000_000_000,
        is_directory: false,
        lyrics_sidecar,
    }
}

#[tokio::test]
async fn test_read_missing_file_reports_error() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nonexistent.mp3");

    let values = LoftyMetadataReader::new().read(&audio_file(&missing, None)).await;

    assert!(values.has_errors(), "missing file should be reported");
    assert!(values.is_empty());
}

#[tokio::test]
async fn test_read_corrupted_file_reports_error() {
    let dir = TempDir::new().unwrap();
    let corrupt = dir.path().join("corrupt.mp3");
    fs::write(&corrupt, b"This is not a valid audio file").unwrap();

    let values = LoftyMetadataReader::new().read(&audio_file(&corrupt, None)).await;

    assert!(values.has_errors(), "corrupt file should be reported");
    assert!(!values.contains(&TagKey::Title));
}

#[tokio::test]
async fn test_read_wav_properties() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tone.wav");
    fs::write(&path, wav_bytes(2)).unwrap();

    let values = LoftyMetadataReader::new().read(&audio_file(&path, None)).await;

    assert!(!values.has_errors(), "unexpected errors: {:?}", values.errors);
    let seconds = values.real(&TagKey::Seconds).unwrap();
    assert!((seconds - 2.0).abs() < 0.1, "duration was {}", seconds);
    assert_eq!(values.integer(&TagKey::Frequency), Some(8_000));
    assert_eq!(values.integer(&TagKey::FileSize), Some(wav_bytes(2).len() as i64));
    assert!(!values.contains(&TagKey::Title));
}

#[tokio::test]
async fn test_lyrics_sidecar_used_when_tag_has_none() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tone.wav");
    let sidecar = dir.path().join("tone.lrc");
    fs::write(&path, wav_bytes(1)).unwrap();
    fs::write(&sidecar, "[00:01.00]la la la\n").unwrap();

    let values = LoftyMetadataReader::new()
        .read(&audio_file(&path, Some(sidecar)))
        .await;

    assert_eq!(values.text(&TagKey::Lyrics), Some("[00:01.00]la la la"));
}

#[tokio::test]
async fn test_folder_images_are_picked_up() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tone.wav");
    fs::write(&path, wav_bytes(1)).unwrap();
    fs::write(dir.path().join("folder.jpg"), b"jpeg").unwrap();
    fs::write(dir.path().join("artist.png"), b"png").unwrap();

    let values = LoftyMetadataReader::new().read(&audio_file(&path, None)).await;

    let covers = values.images(&TagKey::AlbumArt);
    assert_eq!(covers.len(), 1);
    assert_eq!(covers[0].source_path, dir.path().join("folder.jpg"));
    assert_eq!(covers[0].source_type, ImageSourceType::ImageFile);
    assert_eq!(covers[0].source_index, 0);

    let portraits = values.images(&TagKey::ArtistImage);
    assert_eq!(portraits.len(), 1);
    assert_eq!(portraits[0].source_path, dir.path().join("artist.png"));
}

#[tokio::test]
async fn test_cover_preferred_over_folder_image() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tone.wav");
    fs::write(&path, wav_bytes(1)).unwrap();
    fs::write(dir.path().join("folder.jpg"), b"jpeg").unwrap();
    fs::write(dir.path().join("cover.jpg"), b"jpeg").unwrap();

    let values = LoftyMetadataReader::new().read(&audio_file(&path, None)).await;

    let covers = values.images(&TagKey::AlbumArt);
    assert_eq!(covers.len(), 1);
    assert_eq!(covers[0].source_path, dir.path().join("cover.jpg"));
}
