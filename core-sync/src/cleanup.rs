//! Orphan Cleanup
//!
//! Runs after the unit of work has been flushed. Each level re-derives
//! emptiness from storage once the level below is gone:
//!
//! 1. Stored image-file images whose source file disappeared
//! 2. Stored songs not touched this run whose file disappeared, with their
//!    classifications, relations, images, play history and playlist entries
//! 3. Albums of deleted songs left without songs
//! 4. Primary artists of deleted albums left without credits, except "Various"
//!
//! A failed step aborts the remaining ones.

use bridge_traits::storage::FileSystemAccess;
use core_library::error::LibraryError;
use core_library::models::ImageSourceType;
use core_library::LibraryStore;
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::error::{Result, SyncError};
use crate::unit_of_work::UnitOfWork;

/// Cleanup stage a deletion belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CleanupStep {
    OrphanedImages,
    OrphanedSongs,
    OrphanedAlbums,
    OrphanedArtists,
}

impl fmt::Display for CleanupStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CleanupStep::OrphanedImages => "orphaned images",
            CleanupStep::OrphanedSongs => "orphaned songs",
            CleanupStep::OrphanedAlbums => "orphaned albums",
            CleanupStep::OrphanedArtists => "orphaned artists",
        })
    }
}

/// Ids removed by one cleanup pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub images: Vec<String>,
    pub songs: Vec<String>,
    pub albums: Vec<String>,
    pub artists: Vec<String>,
}

impl CleanupReport {
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
            && self.songs.is_empty()
            && self.albums.is_empty()
            && self.artists.is_empty()
    }
}

/// Tables cleared before a song row, child rows first. Credits pointing at
/// an artist (`party_id`) belong to the artist cascade.
const SONG_CASCADE: &[(&str, &str)] = &[
    ("song_classifications", "song_id"),
    ("party_relations", "subject_id"),
    ("related_images", "related_id"),
    ("play_history", "song_id"),
    ("playlist_songs", "song_id"),
    ("songs", "id"),
];

const ALBUM_CASCADE: &[(&str, &str)] = &[
    ("party_relations", "subject_id"),
    ("related_images", "related_id"),
    ("albums", "id"),
];

const ARTIST_CASCADE: &[(&str, &str)] = &[
    ("party_relations", "party_id"),
    ("related_images", "related_id"),
    ("artists", "id"),
];

/// Finds and deletes rows orphaned by missing files
pub struct CleanupResolver<'a> {
    store: &'a dyn LibraryStore,
    fs: &'a dyn FileSystemAccess,
}

impl<'a> CleanupResolver<'a> {
    pub fn new(store: &'a dyn LibraryStore, fs: &'a dyn FileSystemAccess) -> Self {
        Self { store, fs }
    }

    /// Run every step in order against the flushed `uow`
    pub async fn run(&self, uow: &UnitOfWork) -> Result<CleanupReport> {
        let mut report = CleanupReport {
            images: self.remove_orphaned_images(uow).await?,
            songs: self.remove_orphaned_songs(uow).await?,
            ..Default::default()
        };

        if report.songs.is_empty() {
            debug!("No songs removed, skipping album and artist cleanup");
            return Ok(report);
        }

        let deleted_songs: HashSet<&str> = report.songs.iter().map(String::as_str).collect();
        let album_candidates: BTreeSet<String> = uow
            .songs
            .iter()
            .filter(|song| deleted_songs.contains(song.id.as_str()))
            .map(|song| song.primary_album_id.clone())
            .collect();
        report.albums = self
            .remove_orphaned_albums(album_candidates.into_iter().collect())
            .await?;

        let deleted_albums: HashSet<&str> = report.albums.iter().map(String::as_str).collect();
        let various: HashSet<&str> = uow
            .artists
            .iter()
            .filter(|artist| artist.is_various())
            .map(|artist| artist.id.as_str())
            .collect();
        let artist_candidates: BTreeSet<String> = uow
            .albums
            .iter()
            .filter(|album| deleted_albums.contains(album.id.as_str()))
            .filter(|album| !various.contains(album.primary_artist_id.as_str()))
            .map(|album| album.primary_artist_id.clone())
            .collect();
        report.artists = self
            .remove_orphaned_artists(artist_candidates.into_iter().collect())
            .await?;

        info!(
            images = report.images.len(),
            songs = report.songs.len(),
            albums = report.albums.len(),
            artists = report.artists.len(),
            "Removed orphaned rows"
        );
        Ok(report)
    }

    async fn remove_orphaned_images(&self, uow: &UnitOfWork) -> Result<Vec<String>> {
        let mut orphaned = Vec::new();
        for image in uow
            .images
            .clean_rows()
            .filter(|image| image.source_type == ImageSourceType::ImageFile)
        {
            if !self.exists(&image.source_path).await {
                orphaned.push(image.id.clone());
            }
        }

        if !orphaned.is_empty() {
            self.delete(CleanupStep::OrphanedImages, "related_images", "id", &orphaned)
                .await?;
        }
        debug!(count = orphaned.len(), "Orphaned images removed");
        Ok(orphaned)
    }

    async fn remove_orphaned_songs(&self, uow: &UnitOfWork) -> Result<Vec<String>> {
        let mut orphaned = Vec::new();
        for song in uow.songs.clean_rows() {
            if !self.exists(&song.file_path).await {
                debug!(path = %song.file_path, "Song file is gone");
                orphaned.push(song.id.clone());
            }
        }

        if !orphaned.is_empty() {
            self.cascade(CleanupStep::OrphanedSongs, SONG_CASCADE, &orphaned)
                .await?;
        }
        Ok(orphaned)
    }

    async fn remove_orphaned_albums(&self, candidates: Vec<String>) -> Result<Vec<String>> {
        let orphaned = self
            .store
            .albums_without_songs(&candidates)
            .await
            .map_err(|source| abort(CleanupStep::OrphanedAlbums, source))?;

        if !orphaned.is_empty() {
            self.cascade(CleanupStep::OrphanedAlbums, ALBUM_CASCADE, &orphaned)
                .await?;
        }
        debug!(candidates = candidates.len(), removed = orphaned.len(), "Album cleanup done");
        Ok(orphaned)
    }

    async fn remove_orphaned_artists(&self, candidates: Vec<String>) -> Result<Vec<String>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        let orphaned = self
            .store
            .artists_without_songs(&candidates)
            .await
            .map_err(|source| abort(CleanupStep::OrphanedArtists, source))?;

        if !orphaned.is_empty() {
            self.cascade(CleanupStep::OrphanedArtists, ARTIST_CASCADE, &orphaned)
                .await?;
        }
        debug!(candidates = candidates.len(), removed = orphaned.len(), "Artist cleanup done");
        Ok(orphaned)
    }

    async fn cascade(
        &self,
        step: CleanupStep,
        tables: &[(&str, &str)],
        ids: &[String],
    ) -> Result<()> {
        for (table, column) in tables {
            self.delete(step, table, column, ids).await?;
        }
        Ok(())
    }

    async fn delete(
        &self,
        step: CleanupStep,
        table: &str,
        column: &str,
        ids: &[String],
    ) -> Result<u64> {
        let deleted = self
            .store
            .delete_where(table, column, ids)
            .await
            .map_err(|source| abort(step, source))?;
        debug!(%step, table, column, deleted, "Deleted rows");
        Ok(deleted)
    }

    /// An unreadable path counts as present; nothing is deleted on doubt
    async fn exists(&self, path: &str) -> bool {
        match self.fs.exists(Path::new(path)).await {
            Ok(exists) => exists,
            Err(e) => {
                warn!(path, error = %e, "Could not check file, keeping it");
                true
            }
        }
    }
}

fn abort(step: CleanupStep, source: LibraryError) -> SyncError {
    SyncError::CleanupAborted { step, source }
}
