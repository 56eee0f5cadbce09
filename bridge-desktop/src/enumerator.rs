//! Audio file discovery using `walkdir`

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::{AudioFile, AudioFileEnumerator},
};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Unix milliseconds for a `SystemTime`, `None` before the epoch
fn system_time_millis(time: SystemTime) -> Option<i64> {
    time.duration_since(UNIX_EPOCH)
        .ok()
        .map(|d| d.as_millis() as i64)
}

/// Recursive directory walker producing [`AudioFile`] descriptors.
///
/// The traversal runs on a blocking thread. Unreadable entries are logged and
/// skipped; a missing root is skipped with a warning rather than failing the
/// whole enumeration.
#[derive(Debug, Clone, Default)]
pub struct WalkdirEnumerator {
    follow_links: bool,
}

impl WalkdirEnumerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Follow symbolic links while walking
    pub fn follow_links(mut self, follow: bool) -> Self {
        self.follow_links = follow;
        self
    }

    fn walk(roots: &[PathBuf], extensions: &[String], follow_links: bool) -> Vec<AudioFile> {
        let mut files = Vec::new();

        for root in roots {
            if !root.exists() {
                warn!(root = ?root, "Library root does not exist, skipping");
                continue;
            }

            for entry in WalkDir::new(root).follow_links(follow_links) {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        warn!(error = %e, "Skipping unreadable directory entry");
                        continue;
                    }
                };

                if !entry.file_type().is_file() || !has_extension(entry.path(), extensions) {
                    continue;
                }

                let metadata = match entry.metadata() {
                    Ok(metadata) => metadata,
                    Err(e) => {
                        warn!(path = ?entry.path(), error = %e, "Failed to stat audio file");
                        continue;
                    }
                };

                let change_date = metadata
                    .modified()
                    .ok()
                    .and_then(system_time_millis)
                    .unwrap_or(0);
                let add_date = metadata
                    .created()
                    .ok()
                    .and_then(system_time_millis)
                    .unwrap_or(change_date);

                files.push(AudioFile {
                    path: entry.path().to_path_buf(),
                    size: metadata.len(),
                    add_date,
                    change_date,
                    is_directory: false,
                    lyrics_sidecar: lyrics_sidecar(entry.path()),
                });
            }
        }

        // Deterministic processing order
        files.sort_by(|a, b| a.path.cmp(&b.path));
        files
    }
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

fn lyrics_sidecar(path: &Path) -> Option<PathBuf> {
    let candidate = path.with_extension("lrc");
    candidate.is_file().then_some(candidate)
}

#[async_trait]
impl AudioFileEnumerator for WalkdirEnumerator {
    async fn enumerate(&self, roots: &[PathBuf], extensions: &[String]) -> Result<Vec<AudioFile>> {
        let roots = roots.to_vec();
        let extensions = extensions.to_vec();
        let follow_links = self.follow_links;

        let files =
            tokio::task::spawn_blocking(move || Self::walk(&roots, &extensions, follow_links))
                .await
                .map_err(|e| {
                    BridgeError::OperationFailed(format!("Enumeration task failed: {}", e))
                })?;

        debug!(count = files.len(), "Enumerated audio files");
        Ok(files)
    }
}
