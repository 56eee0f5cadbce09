//! # Sync Orchestrator
//!
//! Drives one library scan from cache load to orphan cleanup.
//!
//! ## Workflow
//!
//! 1. `before_process`: load every cached table into a fresh [`UnitOfWork`]
//! 2. `process_audio_file` for each discovered file, strictly in order:
//!    classify, read metadata, materialize
//! 3. `sync_changes_to_database`: one bulk insert per entity kind in foreign
//!    key order, then one column-restricted bulk update per kind
//! 4. `clean_up_database`: cascade-delete rows orphaned by missing files
//! 5. `clean_up_memory`: drop the unit of work
//!
//! [`SyncOrchestrator::run`] chains the phases over an
//! [`AudioFileEnumerator`] and reports progress on an [`EventBus`].
//!
//! ## Concurrency
//!
//! Files are processed one at a time so that later files see the artists and
//! albums earlier files created. Every phase takes `&mut self`. Two
//! orchestrators must not scan the same store at once; callers serialize
//! scans.
//!
//! ## Cancellation
//!
//! The cancellation token is checked between files. Cancelling discards the
//! unit of work and returns [`SyncError::Cancelled`]. Once the flush has
//! begun the token is ignored.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_sync::{ScanOptions, SyncOrchestrator};
//!
//! # async fn example(store, reader, fs, clock, enumerator) -> core_sync::Result<()> {
//! let mut orchestrator = SyncOrchestrator::new(store, reader, fs, clock, ScanOptions::default());
//! let result = orchestrator.run(&enumerator, &["/music".into()]).await?;
//! println!("{} added, {} deleted", result.added.len(), result.deleted.len());
//! # Ok(())
//! # }
//! ```

use bridge_traits::storage::{AudioFile, AudioFileEnumerator, FileSystemAccess};
use bridge_traits::time::Clock;
use core_library::models::{Album, Song};
use core_library::{LibraryStore, TableRows};
use core_metadata::{KeyValues, MetadataReader, TagKey};
use core_runtime::events::{CoreEvent, EventBus, LibraryEvent, ScanEvent};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::cleanup::CleanupResolver;
use crate::identity::song_key;
use crate::materializer::Materializer;
use crate::options::ScanOptions;
use crate::result::{FileStatus, ProcessedFile, SyncResult};
use crate::scan_mode::{classify, ScanMode};
use crate::unit_of_work::{EntitySet, UnitOfWork};
use crate::{Result, SyncError};

/// Columns the update path may change
const SONG_UPDATE_COLUMNS: &[&str] = &[
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

const ALBUM_UPDATE_COLUMNS: &[&str] = &["release_year", "release_decade"];

/// Runs library scans against one store
pub struct SyncOrchestrator {
    store: Arc<dyn LibraryStore>,
    reader: Arc<dyn MetadataReader>,
    fs: Arc<dyn FileSystemAccess>,
    clock: Arc<dyn Clock>,
    options: ScanOptions,
    event_bus: Option<EventBus>,
    cancellation: CancellationToken,
    /// Present between `before_process` and `clean_up_memory`
    uow: Option<UnitOfWork>,
}

impl SyncOrchestrator {
    pub fn new(
        store: Arc<dyn LibraryStore>,
        reader: Arc<dyn MetadataReader>,
        fs: Arc<dyn FileSystemAccess>,
        clock: Arc<dyn Clock>,
        options: ScanOptions,
    ) -> Self {
        Self {
            store,
            reader,
            fs,
            clock,
            options,
            event_bus: None,
            cancellation: CancellationToken::new(),
            uow: None,
        }
    }

    /// Publish scan events on `event_bus`
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// Token that cancels the running scan
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// The current unit of work, if caches are loaded
    pub fn unit_of_work(&self) -> Option<&UnitOfWork> {
        self.uow.as_ref()
    }

    /// Load every cached table and start a new result.
    #[instrument(skip(self))]
    pub async fn before_process(&mut self) -> Result<SyncResult> {
        let uow = UnitOfWork {
            value_lists: EntitySet::load(self.store.load_value_lists().await?),
            classification_types: EntitySet::load(
                self.store.load_classification_types().await?,
            ),
            classification_entries: EntitySet::load(
                self.store.load_classification_entries().await?,
            ),
            artists: EntitySet::load(self.store.load_artists().await?),
            albums: EntitySet::load(self.store.load_albums().await?),
            songs: EntitySet::load(self.store.load_songs().await?),
            images: EntitySet::load(self.store.load_images().await?),
            ..Default::default()
        };
        let initial_song_count = self.store.count_songs().await?;

        info!(
            songs = uow.songs.len(),
            artists = uow.artists.len(),
            albums = uow.albums.len(),
            images = uow.images.len(),
            "Loaded library caches"
        );
        self.uow = Some(uow);
        Ok(SyncResult::new(initial_song_count))
    }

    /// Classify, read and materialize one file.
    ///
    /// Extraction failures are reported on the returned file, never as `Err`.
    #[instrument(skip(self, file), fields(path = %file.path.display()))]
    pub async fn process_audio_file(&mut self, file: &AudioFile) -> Result<ProcessedFile> {
        let cached_mode = {
            let uow = self.loaded()?;
            classify(
                file,
                uow.songs.find(&song_key(&file.path)),
                self.options.lyrics_sidecar_forces_update,
            )
        };
        debug!(mode = cached_mode.as_str(), "Classified file");

        if cached_mode == ScanMode::Skip {
            return Ok(processed(file, cached_mode, FileStatus::Skipped, KeyValues::new()));
        }

        let values = self.reader.read(file).await;

        if values.has_errors() {
            warn!(errors = ?values.errors, "Metadata extraction failed");
            return Ok(processed(file, cached_mode, FileStatus::Failed, values));
        }
        if values.ignored || self.below_minimum_duration(&values) {
            debug!("Ignoring file");
            return Ok(processed(file, cached_mode, FileStatus::Ignored, values));
        }

        let now = self.clock.unix_timestamp_millis();
        let uow = self
            .uow
            .as_mut()
            .ok_or_else(|| SyncError::InvalidState("caches are not loaded".to_string()))?;
        let mut materializer = Materializer::new(uow, &self.options, now);

        let status = match cached_mode {
            ScanMode::Add => {
                materializer.add(file, &values);
                FileStatus::Added
            }
            ScanMode::Update => {
                let outcome = materializer.update(file, &values).ok_or_else(|| {
                    SyncError::InvalidState(format!(
                        "no cached song for {}",
                        file.path.display()
                    ))
                })?;
                if let Some(added_at) = outcome.write_back_add_date {
                    self.write_back_add_date(file, added_at).await;
                }
                FileStatus::Updated
            }
            ScanMode::Skip => FileStatus::Skipped,
        };

        Ok(processed(file, cached_mode, status, values))
    }

    /// Flush the unit of work.
    ///
    /// Inserts go in foreign key order; updates only touch the columns the
    /// scan may change.
    #[instrument(skip(self, result))]
    pub async fn sync_changes_to_database(&mut self, result: &mut SyncResult) -> Result<()> {
        let store = Arc::clone(&self.store);
        let uow = self.loaded()?;

        let inserts = [
            TableRows::inserts(uow.value_lists.new_rows()),
            TableRows::inserts(uow.classification_types.new_rows()),
            TableRows::inserts(uow.artists.new_rows()),
            TableRows::inserts(uow.classification_entries.new_rows()),
            TableRows::inserts(uow.albums.new_rows()),
            TableRows::inserts(uow.songs.new_rows()),
            TableRows::inserts(uow.song_classifications.iter()),
            TableRows::inserts(uow.party_relations.iter()),
            TableRows::inserts(uow.images.new_rows()),
        ];
        let mut inserted = 0;
        for rows in inserts {
            inserted += insert(store.as_ref(), rows).await?;
        }

        let mut updated = 0;
        updated += update(
            store.as_ref(),
            TableRows::updates::<Album, _>(uow.albums.dirty_rows(), ALBUM_UPDATE_COLUMNS)?,
        )
        .await?;
        updated += update(
            store.as_ref(),
            TableRows::updates::<Song, _>(uow.songs.dirty_rows(), SONG_UPDATE_COLUMNS)?,
        )
        .await?;

        result.added = uow.songs.new_rows().map(|s| s.file_path.clone()).collect();
        result.updated = uow.songs.dirty_rows().map(|s| s.file_path.clone()).collect();

        info!(
            inserted,
            updated,
            songs_added = result.added.len(),
            songs_updated = result.updated.len(),
            "Persisted scan changes"
        );
        Ok(())
    }

    /// Remove rows whose files are gone and record the final song count.
    #[instrument(skip(self, result))]
    pub async fn clean_up_database(&mut self, result: &mut SyncResult) -> Result<()> {
        let uow = self.loaded()?;
        let report = CleanupResolver::new(self.store.as_ref(), self.fs.as_ref())
            .run(uow)
            .await?;

        let deleted_songs: HashSet<&str> = report.songs.iter().map(String::as_str).collect();
        result.deleted = uow
            .songs
            .iter()
            .filter(|song| deleted_songs.contains(song.id.as_str()))
            .map(|song| song.file_path.clone())
            .collect();
        result.deleted_albums = report.albums.clone();
        result.deleted_artists = report.artists.clone();
        result.deleted_images = report.images.clone();
        result.final_song_count = self.store.count_songs().await?;

        if !report.is_empty() {
            self.emit(CoreEvent::Library(LibraryEvent::OrphansRemoved {
                songs: report.songs.len() as u64,
                albums: report.albums.len() as u64,
                artists: report.artists.len() as u64,
                images: report.images.len() as u64,
            }));
        }
        Ok(())
    }

    /// Drop the caches of the finished run
    pub fn clean_up_memory(&mut self) {
        if let Some(uow) = self.uow.take() {
            debug!(pending = uow.pending_changes(), "Released library caches");
        }
    }

    /// Scan `roots` end to end.
    ///
    /// Emits `Started`, periodic `Progress`, and one of `Completed`,
    /// `Failed` or `Cancelled`.
    #[instrument(skip(self, enumerator))]
    pub async fn run(
        &mut self,
        enumerator: &dyn AudioFileEnumerator,
        roots: &[PathBuf],
    ) -> Result<SyncResult> {
        let scan_id = Uuid::new_v4().to_string();
        let started_at = self.clock.unix_timestamp_millis();
        info!(scan_id = %scan_id, roots = roots.len(), "Starting library scan");

        self.emit(CoreEvent::Scan(ScanEvent::Started {
            scan_id: scan_id.clone(),
            roots: roots.iter().map(|r| r.display().to_string()).collect(),
        }));

        let mut files_processed = 0;
        let outcome = self
            .run_phases(&scan_id, enumerator, roots, &mut files_processed)
            .await;
        self.clean_up_memory();

        match outcome {
            Ok(result) => {
                let duration_ms = (self.clock.unix_timestamp_millis() - started_at).max(0) as u64;
                info!(
                    scan_id = %scan_id,
                    added = result.added.len(),
                    updated = result.updated.len(),
                    skipped = result.skipped.len(),
                    deleted = result.deleted.len(),
                    ignored = result.ignored_paths.len(),
                    errors = result.files_with_errors.len(),
                    duration_ms,
                    "Library scan completed"
                );
                self.emit(CoreEvent::Scan(ScanEvent::Completed {
                    scan_id,
                    added: result.added.len() as u64,
                    updated: result.updated.len() as u64,
                    skipped: result.skipped.len() as u64,
                    deleted: result.deleted.len() as u64,
                    ignored: result.ignored_paths.len() as u64,
                    errors: result.files_with_errors.len() as u64,
                    duration_ms,
                }));
                Ok(result)
            }
            Err(SyncError::Cancelled) => {
                info!(scan_id = %scan_id, files_processed, "Library scan cancelled");
                self.emit(CoreEvent::Scan(ScanEvent::Cancelled {
                    scan_id,
                    files_processed,
                }));
                Err(SyncError::Cancelled)
            }
            Err(e) => {
                error!(scan_id = %scan_id, error = %e, "Library scan failed");
                self.emit(CoreEvent::Scan(ScanEvent::Failed {
                    scan_id,
                    message: e.to_string(),
                    files_processed,
                }));
                Err(e)
            }
        }
    }

    async fn run_phases(
        &mut self,
        scan_id: &str,
        enumerator: &dyn AudioFileEnumerator,
        roots: &[PathBuf],
        files_processed: &mut u64,
    ) -> Result<SyncResult> {
        let mut result = self.before_process().await?;

        let files = enumerator
            .enumerate(roots, &self.options.audio_extensions)
            .await?;
        let total_files = files.len() as u64;
        info!(total_files, "Enumerated audio files");

        for file in files.iter().filter(|f| !f.is_directory) {
            if self.cancellation.is_cancelled() {
                return Err(SyncError::Cancelled);
            }

            let processed = self.process_audio_file(file).await?;
            result.record(&processed);
            *files_processed += 1;

            if *files_processed % self.options.progress_interval.max(1) == 0 {
                self.emit(CoreEvent::Scan(ScanEvent::Progress {
                    scan_id: scan_id.to_string(),
                    files_processed: *files_processed,
                    total_files,
                    percent: percent(*files_processed, total_files),
                }));
            }
        }

        if self.cancellation.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        self.sync_changes_to_database(&mut result).await?;
        self.clean_up_database(&mut result).await?;
        Ok(result)
    }

    fn loaded(&self) -> Result<&UnitOfWork> {
        self.uow
            .as_ref()
            .ok_or_else(|| SyncError::InvalidState("caches are not loaded".to_string()))
    }

    fn below_minimum_duration(&self, values: &KeyValues) -> bool {
        let minimum = self.options.minimum_duration_secs;
        minimum > 0.0 && values.real(&TagKey::Seconds).unwrap_or(0.0) < minimum
    }

    async fn write_back_add_date(&self, file: &AudioFile, added_at: i64) {
        match self.fs.write_added_date(&file.path, added_at).await {
            Ok(()) => debug!(added_at, "Wrote stored add date back to file"),
            Err(e) => warn!(
                path = %file.path.display(),
                added_at,
                error = %e,
                "Could not write add date back to file"
            ),
        }
    }

    fn emit(&self, event: CoreEvent) {
        if let Some(bus) = &self.event_bus {
            // No subscribers is fine
            bus.emit(event).ok();
        }
    }
}

fn processed(
    file: &AudioFile,
    mode: ScanMode,
    status: FileStatus,
    values: KeyValues,
) -> ProcessedFile {
    ProcessedFile {
        path: file.path.clone(),
        mode,
        status,
        values,
    }
}

fn percent(done: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    (done.saturating_mul(100) / total).min(100) as u8
}

async fn insert(store: &dyn LibraryStore, rows: TableRows) -> Result<u64> {
    if rows.is_empty() {
        return Ok(0);
    }
    let table = rows.table;
    let written = store.bulk_insert(rows).await?;
    debug!(table, written, "Bulk inserted rows");
    Ok(written)
}

async fn update(store: &dyn LibraryStore, rows: TableRows) -> Result<u64> {
    if rows.is_empty() {
        return Ok(0);
    }
    let table = rows.table;
    let written = store.bulk_update(rows).await?;
    debug!(table, written, "Bulk updated rows");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use bridge_traits::time::FixedClock;
    use core_library::db::create_test_pool;
    use core_library::SqliteLibraryStore;
    use mockall::mock;

    mock! {
        Reader {}

        #[async_trait]
        impl MetadataReader for Reader {
            async fn read(&self, file: &AudioFile) -> KeyValues;
        }
    }

    mock! {
        Fs {}

        #[async_trait]
        impl FileSystemAccess for Fs {
            async fn exists(&self, path: &std::path::Path) -> BridgeResult<bool>;
            async fn write_added_date(
                &self,
                path: &std::path::Path,
                added_at: i64,
            ) -> BridgeResult<()>;
        }
    }

    fn file(path: &str, change_date: i64) -> AudioFile {
        AudioFile {
            path: PathBuf::from(path),
            size: 1_000,
            add_date: 1_000,
            change_date,
            is_directory: false,
            lyrics_sidecar: None,
        }
    }

    async fn orchestrator(
        reader: MockReader,
        fs: MockFs,
        options: ScanOptions,
    ) -> SyncOrchestrator {
        let pool = create_test_pool().await.unwrap();
        SyncOrchestrator::new(
            Arc::new(SqliteLibraryStore::new(pool)),
            Arc::new(reader),
            Arc::new(fs),
            Arc::new(FixedClock::new(50_000)),
            options,
        )
    }

    fn tagged() -> KeyValues {
        KeyValues::new()
            .with(TagKey::Title, "Track")
            .with(TagKey::Seconds, 200.0)
    }

    #[tokio::test]
    async fn test_process_requires_loaded_caches() {
        let mut orchestrator =
            orchestrator(MockReader::new(), MockFs::new(), ScanOptions::default()).await;
        let err = orchestrator.process_audio_file(&file("/music/a.mp3", 1)).await.unwrap_err();
        assert!(matches!(err, SyncError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_new_file_is_added() {
        let mut reader = MockReader::new();
        reader.expect_read().times(1).returning(|_| tagged());
        let mut orchestrator = orchestrator(reader, MockFs::new(), ScanOptions::default()).await;

        let result = orchestrator.before_process().await.unwrap();
        assert_eq!(result.initial_song_count, 0);

        let processed = orchestrator.process_audio_file(&file("/music/a.mp3", 1)).await.unwrap();
        assert_eq!(processed.mode, ScanMode::Add);
        assert_eq!(processed.status, FileStatus::Added);
        assert_eq!(orchestrator.unit_of_work().map(|u| u.songs.len()), Some(1));
    }

    #[tokio::test]
    async fn test_extraction_errors_are_reported_not_raised() {
        let mut reader = MockReader::new();
        reader.expect_read().returning(|_| KeyValues::failed("corrupt frame"));
        let mut orchestrator = orchestrator(reader, MockFs::new(), ScanOptions::default()).await;
        orchestrator.before_process().await.unwrap();

        let processed = orchestrator.process_audio_file(&file("/music/a.mp3", 1)).await.unwrap();
        assert_eq!(processed.status, FileStatus::Failed);
        assert_eq!(processed.errors(), ["corrupt frame"]);
        assert_eq!(orchestrator.unit_of_work().map(|u| u.songs.len()), Some(0));
    }

    #[tokio::test]
    async fn test_short_file_is_ignored() {
        let mut reader = MockReader::new();
        reader
            .expect_read()
            .returning(|_| KeyValues::new().with(TagKey::Seconds, 12.0));
        let options = ScanOptions {
            minimum_duration_secs: 30.0,
            ..Default::default()
        };
        let mut orchestrator = orchestrator(reader, MockFs::new(), options).await;
        orchestrator.before_process().await.unwrap();

        let processed = orchestrator
            .process_audio_file(&file("/music/jingle.mp3", 1))
            .await
            .unwrap();
        assert_eq!(processed.status, FileStatus::Ignored);
        assert_eq!(orchestrator.unit_of_work().map(|u| u.pending_changes()), Some(0));
    }

    #[tokio::test]
    async fn test_add_date_write_back_failure_is_not_fatal() {
        let mut reader = MockReader::new();
        reader.expect_read().returning(|_| tagged());
        let mut fs = MockFs::new();
        fs.expect_exists().returning(|_| Ok(true));
        fs.expect_write_added_date()
            .withf(|_, added_at| *added_at == 1_000)
            .times(1)
            .returning(|_, _| Err(BridgeError::NotAvailable("read-only".to_string())));
        let options = ScanOptions {
            write_back_add_date: true,
            ..Default::default()
        };
        let mut orchestrator = orchestrator(reader, fs, options).await;

        let mut result = orchestrator.before_process().await.unwrap();
        orchestrator.process_audio_file(&file("/music/a.mp3", 1)).await.unwrap();
        orchestrator.sync_changes_to_database(&mut result).await.unwrap();
        orchestrator.clean_up_memory();

        orchestrator.before_process().await.unwrap();
        let later = AudioFile {
            add_date: 9_000,
            ..file("/music/a.mp3", 2)
        };
        let processed = orchestrator.process_audio_file(&later).await.unwrap();
        assert_eq!(processed.status, FileStatus::Updated);
    }

    #[tokio::test]
    async fn test_clean_up_memory_drops_caches() {
        let mut orchestrator =
            orchestrator(MockReader::new(), MockFs::new(), ScanOptions::default()).await;
        orchestrator.before_process().await.unwrap();
        assert!(orchestrator.unit_of_work().is_some());
        orchestrator.clean_up_memory();
        assert!(orchestrator.unit_of_work().is_none());
    }

    #[test]
    fn test_percent() {
        assert_eq!(percent(0, 0), 100);
        assert_eq!(percent(5, 10), 50);
        assert_eq!(percent(10, 10), 100);
    }
}
