//! End-to-end scan tests
//!
//! These tests drive `SyncOrchestrator::run` against an in-memory SQLite
//! library and cover:
//! - First scan of untagged files
//! - Idempotent rescans
//! - Update runs that never add relations or classifications
//! - Cascading cleanup of removed files
//! - Album year promotion across runs
//! - Minimum duration and extraction error reporting
//! - Scan events and cancellation

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::storage::{AudioFile, AudioFileEnumerator, FileSystemAccess};
use bridge_traits::time::FixedClock;
use core_library::db::create_test_pool;
use core_library::models::{RelationType, UNKNOWN_NAME};
use core_library::{LibraryStore, SqliteLibraryStore};
use core_metadata::{ImageRef, KeyValues, MetadataReader, TagKey};
use core_runtime::events::{CoreEvent, EventBus, LibraryEvent, ScanEvent};
use core_sync::{ScanOptions, SyncError, SyncOrchestrator};
use sqlx::SqlitePool;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

// ============================================================================
// Test Doubles
// ============================================================================

/// Files currently "on disk", shared by the enumerator and file system
#[derive(Default)]
struct Disk {
    files: Mutex<Vec<AudioFile>>,
    images: Mutex<HashSet<PathBuf>>,
    written_add_dates: Mutex<Vec<(PathBuf, i64)>>,
}

impl Disk {
    fn put(&self, file: AudioFile) {
        let mut files = self.files.lock().unwrap();
        files.retain(|f| f.path != file.path);
        files.push(file);
    }

    fn remove(&self, path: &str) {
        self.files.lock().unwrap().retain(|f| f.path != Path::new(path));
    }

    fn put_image(&self, path: &str) {
        self.images.lock().unwrap().insert(PathBuf::from(path));
    }

    fn remove_image(&self, path: &str) {
        self.images.lock().unwrap().remove(Path::new(path));
    }
}

struct DiskEnumerator(Arc<Disk>);

#[async_trait]
impl AudioFileEnumerator for DiskEnumerator {
    async fn enumerate(
        &self,
        _roots: &[PathBuf],
        _extensions: &[String],
    ) -> BridgeResult<Vec<AudioFile>> {
        Ok(self.0.files.lock().unwrap().clone())
    }
}

struct DiskFileSystem(Arc<Disk>);

#[async_trait]
impl FileSystemAccess for DiskFileSystem {
    async fn exists(&self, path: &Path) -> BridgeResult<bool> {
        let is_audio = self.0.files.lock().unwrap().iter().any(|f| f.path == path);
        Ok(is_audio || self.0.images.lock().unwrap().contains(path))
    }

    async fn write_added_date(&self, path: &Path, added_at: i64) -> BridgeResult<()> {
        self.0
            .written_add_dates
            .lock()
            .unwrap()
            .push((path.to_path_buf(), added_at));
        Ok(())
    }
}

/// Returns preset tags per path
#[derive(Default)]
struct ScriptedReader {
    tags: Mutex<HashMap<PathBuf, KeyValues>>,
}

impl ScriptedReader {
    fn set(&self, path: &str, values: KeyValues) {
        self.tags.lock().unwrap().insert(PathBuf::from(path), values);
    }
}

#[async_trait]
impl MetadataReader for ScriptedReader {
    async fn read(&self, file: &AudioFile) -> KeyValues {
        self.tags
            .lock()
            .unwrap()
            .get(&file.path)
            .cloned()
            .unwrap_or_else(|| KeyValues::failed(format!("unreadable: {}", file.path.display())))
    }
}

// ============================================================================
// Harness
// ============================================================================

struct Library {
    pool: SqlitePool,
    store: Arc<SqliteLibraryStore>,
    disk: Arc<Disk>,
    reader: Arc<ScriptedReader>,
    clock: Arc<FixedClock>,
    options: ScanOptions,
}

impl Library {
    async fn new() -> Self {
        Self::with_options(ScanOptions::default()).await
    }

    async fn with_options(options: ScanOptions) -> Self {
        let pool = create_test_pool().await.unwrap();
        Self {
            store: Arc::new(SqliteLibraryStore::new(pool.clone())),
            pool,
            disk: Arc::new(Disk::default()),
            reader: Arc::new(ScriptedReader::default()),
            clock: Arc::new(FixedClock::new(1_700_000_000_000)),
            options,
        }
    }

    /// Put an audio file on disk with the given tags
    fn add_file(&self, path: &str, change_date: i64, values: KeyValues) {
        self.disk.put(AudioFile {
            path: PathBuf::from(path),
            size: 5_000_000,
            add_date: 1_000,
            change_date,
            is_directory: false,
            lyrics_sidecar: None,
        });
        self.reader.set(path, values);
    }

    fn orchestrator(&self) -> SyncOrchestrator {
        SyncOrchestrator::new(
            self.store.clone(),
            self.reader.clone(),
            Arc::new(DiskFileSystem(self.disk.clone())),
            self.clock.clone(),
            self.options.clone(),
        )
    }

    async fn scan(&self) -> core_sync::SyncResult {
        self.orchestrator()
            .run(&DiskEnumerator(self.disk.clone()), &[PathBuf::from("/music")])
            .await
            .unwrap()
    }

    async fn count(&self, sql: &str) -> i64 {
        sqlx::query_scalar::<_, i64>(sql).fetch_one(&self.pool).await.unwrap()
    }
}

fn song_tags(title: &str, artist: &str, album: &str) -> KeyValues {
    KeyValues::new()
        .with(TagKey::Title, title)
        .with(TagKey::Artist, artist)
        .with(TagKey::Album, album)
        .with(TagKey::Genre, "Jazz")
        .with(TagKey::Seconds, 240.0)
        .with(TagKey::Bitrate, 320_000_i64)
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_untagged_file_creates_unknown_artist_and_album() {
    let library = Library::new().await;
    library.add_file(
        "/music/unknown/track.mp3",
        10,
        KeyValues::new()
            .with(TagKey::Title, "Track")
            .with(TagKey::Seconds, 200.0),
    );

    let result = library.scan().await;

    assert_eq!(result.initial_song_count, 0);
    assert_eq!(result.final_song_count, 1);
    assert_eq!(result.added, vec!["/music/unknown/track.mp3"]);

    let artists = library.store.load_artists().await.unwrap();
    assert_eq!(artists.len(), 1);
    assert_eq!(artists[0].name, UNKNOWN_NAME);

    let albums = library.store.load_albums().await.unwrap();
    assert_eq!(albums.len(), 1);
    assert_eq!(albums[0].name, UNKNOWN_NAME);
    assert_eq!(albums[0].primary_artist_id, artists[0].id);

    let songs = library.store.load_songs().await.unwrap();
    assert_eq!(songs.len(), 1);
    assert_eq!(songs[0].title, "Track");
    assert_eq!(songs[0].performer_count, 1);
    assert_eq!(songs[0].change_date, 10);

    assert_eq!(library.count("SELECT COUNT(*) FROM party_relations").await, 1);
    let relation: String = sqlx::query_scalar("SELECT relation_type FROM party_relations")
        .fetch_one(&library.pool)
        .await
        .unwrap();
    assert_eq!(relation, RelationType::Primary.as_str());
}

#[tokio::test]
async fn test_rescan_without_changes_is_idempotent() {
    let library = Library::new().await;
    library.add_file("/music/a.flac", 10, song_tags("A", "Nina Simone", "Pastel Blues"));
    library.add_file("/music/b.flac", 20, song_tags("B", "Nina Simone", "Pastel Blues"));

    let first = library.scan().await;
    assert_eq!(first.added.len(), 2);

    let relations = library.count("SELECT COUNT(*) FROM party_relations").await;
    let second = library.scan().await;

    assert!(second.added.is_empty());
    assert!(second.updated.is_empty());
    assert!(second.deleted.is_empty());
    assert_eq!(second.skipped.len(), 2);
    assert_eq!(second.initial_song_count, 2);
    assert_eq!(second.final_song_count, 2);
    assert_eq!(library.count("SELECT COUNT(*) FROM party_relations").await, relations);
}

#[tokio::test]
async fn test_artist_case_variants_share_one_row() {
    let library = Library::new().await;
    library.add_file("/music/a.mp3", 10, song_tags("A", "Nina Simone", "Pastel Blues"));
    library.add_file("/music/b.mp3", 10, song_tags("B", "NINA SIMONE", "pastel blues"));

    library.scan().await;

    assert_eq!(library.count("SELECT COUNT(*) FROM artists").await, 1);
    assert_eq!(library.count("SELECT COUNT(*) FROM albums").await, 1);
    assert_eq!(library.count("SELECT COUNT(*) FROM songs").await, 2);
}

#[tokio::test]
async fn test_changed_file_updates_without_new_relations() {
    let library = Library::new().await;
    library.add_file("/music/a.mp3", 10, song_tags("A", "Nina Simone", "Pastel Blues"));
    library.scan().await;

    let relations = library.count("SELECT COUNT(*) FROM party_relations").await;
    let classifications = library.count("SELECT COUNT(*) FROM song_classifications").await;

    // Re-encoded at a lower bitrate, and the tags now name someone else
    library.add_file(
        "/music/a.mp3",
        11,
        KeyValues::new()
            .with(TagKey::Title, "A")
            .with(TagKey::Artist, "Someone Else")
            .with(TagKey::Album, "Other Album")
            .with(TagKey::Genre, "Pop")
            .with(TagKey::Seconds, 240.0)
            .with(TagKey::Bitrate, 128_000_i64),
    );
    library.clock.advance(60_000);
    let result = library.scan().await;

    assert_eq!(result.updated, vec!["/music/a.mp3"]);
    assert!(result.added.is_empty());
    assert_eq!(library.count("SELECT COUNT(*) FROM party_relations").await, relations);
    assert_eq!(library.count("SELECT COUNT(*) FROM song_classifications").await, classifications);
    assert_eq!(library.count("SELECT COUNT(*) FROM artists").await, 1);

    let song = library.store.load_songs().await.unwrap().remove(0);
    assert_eq!(song.bitrate, 128_000);
    assert_eq!(song.change_date, 11);
    assert_eq!(song.replace_date, Some(1_700_000_060_000));

    // The refreshed change date makes the next run skip the file
    let third = library.scan().await;
    assert_eq!(third.skipped.len(), 1);
    assert!(third.updated.is_empty());
}

#[tokio::test]
async fn test_removed_file_cascades_to_album_and_artist() {
    let library = Library::new().await;
    library.add_file(
        "/music/gone.mp3",
        10,
        song_tags("Gone", "Nina Simone", "Pastel Blues")
            .with(TagKey::FeaturingArtist, "Miles Davis")
            .with(TagKey::SongImage, ImageRef::embedded("/music/gone.mp3", 0)),
    );
    library.add_file("/music/stay.mp3", 10, song_tags("Stay", "Miles Davis", "Kind of Blue"));
    library.scan().await;

    let song_id: String =
        sqlx::query_scalar("SELECT id FROM songs WHERE file_path = '/music/gone.mp3'")
            .fetch_one(&library.pool)
            .await
            .unwrap();
    sqlx::query("INSERT INTO play_history (id, song_id, played_at) VALUES ('play-1', ?, 5)")
        .bind(&song_id)
        .execute(&library.pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO playlists (id, name, created_at) VALUES ('list-1', 'Favorites', 5)")
        .execute(&library.pool)
        .await
        .unwrap();
    sqlx::query(
        "INSERT INTO playlist_songs (playlist_id, song_id, position) VALUES ('list-1', ?, 0)",
    )
        .bind(&song_id)
        .execute(&library.pool)
        .await
        .unwrap();

    library.disk.remove("/music/gone.mp3");
    let result = library.scan().await;

    assert_eq!(result.deleted, vec!["/music/gone.mp3"]);
    assert_eq!(result.deleted_albums.len(), 1);
    assert_eq!(result.deleted_artists.len(), 1);
    assert_eq!(result.final_song_count, 1);

    let for_song = |table: &str, column: &str| {
        format!("SELECT COUNT(*) FROM {table} WHERE {column} = '{song_id}'")
    };
    assert_eq!(library.count(&for_song("songs", "id")).await, 0);
    assert_eq!(library.count(&for_song("song_classifications", "song_id")).await, 0);
    assert_eq!(library.count(&for_song("party_relations", "subject_id")).await, 0);
    assert_eq!(library.count(&for_song("related_images", "related_id")).await, 0);
    assert_eq!(library.count(&for_song("play_history", "song_id")).await, 0);
    assert_eq!(library.count(&for_song("playlist_songs", "song_id")).await, 0);

    // Miles Davis still has an album of his own
    let artists = library.store.load_artists().await.unwrap();
    assert_eq!(artists.len(), 1);
    assert_eq!(artists[0].name, "Miles Davis");
    let albums = library.store.load_albums().await.unwrap();
    assert_eq!(albums.len(), 1);
    assert_eq!(albums[0].name, "Kind of Blue");
}

#[tokio::test]
async fn test_various_artist_survives_cleanup() {
    let library = Library::new().await;
    library.add_file(
        "/music/compilation/01.mp3",
        10,
        song_tags("One", "Nina Simone", "Jazz Classics").with(TagKey::AlbumArtist, "Various"),
    );
    library.scan().await;

    library.disk.remove("/music/compilation/01.mp3");
    let result = library.scan().await;

    assert_eq!(result.deleted.len(), 1);
    assert_eq!(result.deleted_albums.len(), 1);
    assert!(result.deleted_artists.is_empty());
    let names: Vec<String> = library
        .store
        .load_artists()
        .await
        .unwrap()
        .into_iter()
        .map(|a| a.name)
        .collect();
    assert!(names.contains(&"Various".to_string()));
}

#[tokio::test]
async fn test_album_with_remaining_songs_is_kept() {
    let library = Library::new().await;
    library.add_file("/music/1.mp3", 10, song_tags("One", "Nina Simone", "Pastel Blues"));
    library.add_file("/music/2.mp3", 10, song_tags("Two", "Nina Simone", "Pastel Blues"));
    library.scan().await;

    library.disk.remove("/music/1.mp3");
    let result = library.scan().await;

    assert_eq!(result.deleted, vec!["/music/1.mp3"]);
    assert!(result.deleted_albums.is_empty());
    assert!(result.deleted_artists.is_empty());
    assert_eq!(library.count("SELECT COUNT(*) FROM albums").await, 1);
}

#[tokio::test]
async fn test_missing_cover_image_is_removed() {
    let library = Library::new().await;
    library.disk.put_image("/music/album/cover.jpg");
    library.add_file(
        "/music/album/1.mp3",
        10,
        song_tags("One", "Nina Simone", "Pastel Blues")
            .with(TagKey::AlbumArt, ImageRef::image_file("/music/album/cover.jpg")),
    );
    library.scan().await;
    assert_eq!(library.count("SELECT COUNT(*) FROM related_images").await, 1);

    library.disk.remove_image("/music/album/cover.jpg");
    let result = library.scan().await;

    assert_eq!(result.deleted_images.len(), 1);
    assert_eq!(library.count("SELECT COUNT(*) FROM related_images").await, 0);
    assert_eq!(library.count("SELECT COUNT(*) FROM songs").await, 1);
}

#[tokio::test]
async fn test_album_year_only_moves_forward() {
    let library = Library::new().await;
    let tags = |title: &str, year: i64| {
        song_tags(title, "Nina Simone", "Pastel Blues").with(TagKey::Year, year)
    };

    library.add_file("/music/1.mp3", 10, tags("One", 1990));
    library.scan().await;

    library.add_file("/music/2.mp3", 10, tags("Two", 1995));
    library.scan().await;
    let album = library.store.load_albums().await.unwrap().remove(0);
    assert_eq!(album.release_year, 1995);
    assert_eq!(album.release_decade, 1990);

    library.add_file("/music/3.mp3", 10, tags("Three", 1980));
    library.scan().await;
    let albums = library.store.load_albums().await.unwrap();
    assert_eq!(albums.len(), 1);
    assert_eq!(albums[0].release_year, 1995);
}

#[tokio::test]
async fn test_first_genre_is_the_only_primary() {
    let library = Library::new().await;
    library.add_file(
        "/music/a.mp3",
        10,
        KeyValues::new()
            .with(TagKey::Title, "A")
            .with(TagKey::Genre, "Pop")
            .with(TagKey::Genre, "Rock"),
    );
    library.scan().await;

    let primaries: Vec<String> = sqlx::query_scalar(
        "SELECT e.name FROM song_classifications sc \
         JOIN classification_entries e ON e.id = sc.classification_id \
         JOIN classification_types t ON t.id = sc.classification_type_id \
         WHERE t.name = 'Genre' AND sc.is_primary = 1",
    )
    .fetch_all(&library.pool)
    .await
    .unwrap();
    assert_eq!(primaries, vec!["Pop"]);
    assert_eq!(
        library
            .count("SELECT COUNT(*) FROM song_classifications WHERE is_primary = 0")
            .await,
        1
    );
}

#[tokio::test]
async fn test_short_files_are_ignored() {
    let library = Library::with_options(ScanOptions {
        minimum_duration_secs: 30.0,
        ..Default::default()
    })
    .await;
    library.add_file(
        "/music/jingle.mp3",
        10,
        KeyValues::new().with(TagKey::Title, "Jingle").with(TagKey::Seconds, 5.0),
    );
    library.add_file("/music/song.mp3", 10, song_tags("Song", "Nina Simone", "Pastel Blues"));

    let result = library.scan().await;

    assert_eq!(result.ignored_paths, vec!["/music/jingle.mp3"]);
    assert_eq!(result.added, vec!["/music/song.mp3"]);
    assert_eq!(library.count("SELECT COUNT(*) FROM songs").await, 1);
}

#[tokio::test]
async fn test_unreadable_file_is_reported_and_scan_continues() {
    let library = Library::new().await;
    library.add_file("/music/good.mp3", 10, song_tags("Good", "Nina Simone", "Pastel Blues"));
    library.add_file("/music/bad.mp3", 10, KeyValues::failed("invalid frame header"));

    let result = library.scan().await;

    assert_eq!(result.added, vec!["/music/good.mp3"]);
    assert_eq!(result.files_with_errors.len(), 1);
    assert_eq!(result.files_with_errors[0].path, "/music/bad.mp3");
    assert_eq!(result.files_with_errors[0].errors, vec!["invalid frame header"]);
}

#[tokio::test]
async fn test_earlier_stored_add_date_is_written_back() {
    let library = Library::with_options(ScanOptions {
        write_back_add_date: true,
        ..Default::default()
    })
    .await;
    library.add_file("/music/a.mp3", 10, song_tags("A", "Nina Simone", "Pastel Blues"));
    library.scan().await;

    // The file was copied back in: later add date, new change date
    library.disk.put(AudioFile {
        path: PathBuf::from("/music/a.mp3"),
        size: 5_000_000,
        add_date: 9_000,
        change_date: 12,
        is_directory: false,
        lyrics_sidecar: None,
    });
    library.scan().await;

    let written = library.disk.written_add_dates.lock().unwrap().clone();
    assert_eq!(written, vec![(PathBuf::from("/music/a.mp3"), 1_000)]);
    assert_eq!(library.store.load_songs().await.unwrap()[0].add_date, 1_000);
}

#[tokio::test]
async fn test_scan_events() {
    let library = Library::with_options(ScanOptions {
        progress_interval: 1,
        ..Default::default()
    })
    .await;
    library.add_file("/music/a.mp3", 10, song_tags("A", "Nina Simone", "Pastel Blues"));
    library.add_file("/music/b.mp3", 10, song_tags("B", "Nina Simone", "Pastel Blues"));

    let bus = EventBus::new(32);
    let mut events = bus.subscribe();
    library
        .orchestrator()
        .with_event_bus(bus.clone())
        .run(&DiskEnumerator(library.disk.clone()), &[PathBuf::from("/music")])
        .await
        .unwrap();

    let mut received = Vec::new();
    while let Ok(event) = events.try_recv() {
        received.push(event);
    }

    assert!(matches!(received.first(), Some(CoreEvent::Scan(ScanEvent::Started { .. }))));
    let progress: Vec<_> = received
        .iter()
        .filter_map(|e| match e {
            CoreEvent::Scan(ScanEvent::Progress { percent, .. }) => Some(*percent),
            _ => None,
        })
        .collect();
    assert_eq!(progress, vec![50, 100]);
    assert!(matches!(
        received.last(),
        Some(CoreEvent::Scan(ScanEvent::Completed { added: 2, .. }))
    ));
    assert!(!received
        .iter()
        .any(|e| matches!(e, CoreEvent::Library(LibraryEvent::OrphansRemoved { .. }))));
}

#[tokio::test]
async fn test_cancelled_scan_persists_nothing() {
    let library = Library::new().await;
    library.add_file("/music/a.mp3", 10, song_tags("A", "Nina Simone", "Pastel Blues"));

    let token = CancellationToken::new();
    token.cancel();
    let bus = EventBus::new(8);
    let mut events = bus.subscribe();

    let err = library
        .orchestrator()
        .with_event_bus(bus.clone())
        .with_cancellation(token)
        .run(&DiskEnumerator(library.disk.clone()), &[PathBuf::from("/music")])
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::Cancelled));
    assert_eq!(library.count("SELECT COUNT(*) FROM songs").await, 0);
    assert_eq!(library.count("SELECT COUNT(*) FROM artists").await, 0);

    let mut cancelled = false;
    while let Ok(event) = events.try_recv() {
        cancelled |= matches!(
            event,
            CoreEvent::Scan(ScanEvent::Cancelled {
                files_processed: 0,
                ..
            })
        );
    }
    assert!(cancelled);
}
