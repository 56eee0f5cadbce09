//! Scan report types

use core_metadata::KeyValues;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::scan_mode::ScanMode;

/// How one file ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileStatus {
    Added,
    Updated,
    Skipped,
    /// Shorter than the minimum duration, or flagged by the reader
    Ignored,
    /// Metadata could not be extracted
    Failed,
}

/// One file's metadata annotated with its scan mode, for reporting
#[derive(Debug, Clone)]
pub struct ProcessedFile {
    pub path: PathBuf,
    pub mode: ScanMode,
    pub status: FileStatus,
    /// Empty for skipped files
    pub values: KeyValues,
}

impl ProcessedFile {
    pub fn errors(&self) -> &[String] {
        &self.values.errors
    }
}

/// Outcome of one scan run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    pub initial_song_count: i64,
    pub final_song_count: i64,
    /// File paths of inserted songs
    pub added: Vec<String>,
    /// File paths of updated songs
    pub updated: Vec<String>,
    pub skipped: Vec<String>,
    /// File paths of songs removed by cleanup
    pub deleted: Vec<String>,
    pub ignored_paths: Vec<String>,
    pub files_with_errors: Vec<FileErrors>,
    pub deleted_albums: Vec<String>,
    pub deleted_artists: Vec<String>,
    pub deleted_images: Vec<String>,
}

/// Extraction errors reported for one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileErrors {
    pub path: String,
    pub errors: Vec<String>,
}

impl SyncResult {
    pub fn new(initial_song_count: i64) -> Self {
        Self {
            initial_song_count,
            ..Default::default()
        }
    }

    /// Track the per-file outcomes known before persistence.
    ///
    /// Added and updated paths are filled by the flush from the rows it wrote.
    pub fn record(&mut self, file: &ProcessedFile) {
        let path = file.path.to_string_lossy().to_string();
        match file.status {
            FileStatus::Skipped => self.skipped.push(path),
            FileStatus::Ignored => self.ignored_paths.push(path),
            FileStatus::Failed => self.files_with_errors.push(FileErrors {
                path,
                errors: file.errors().to_vec(),
            }),
            FileStatus::Added | FileStatus::Updated => {}
        }
    }

    /// Number of files the run looked at
    pub fn files_seen(&self) -> usize {
        self.added.len()
            + self.updated.len()
            + self.skipped.len()
            + self.ignored_paths.len()
            + self.files_with_errors.len()
    }

    pub fn has_changes(&self) -> bool {
        !self.added.is_empty() || !self.updated.is_empty() || !self.deleted.is_empty()
    }
}
