//! File existence probing with `tokio::fs`

use async_trait::async_trait;
use bridge_traits::{error::Result, storage::FileSystemAccess};
use std::path::Path;
use tokio::fs;
use tracing::trace;

/// Answers the cleanup pass's "is this file still there" question.
///
/// Add-date write back is left at the trait default: desktop file systems
/// do not let a process rewrite a file's birth time.
#[derive(Debug, Clone, Default)]
pub struct TokioFileSystem;

impl TokioFileSystem {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FileSystemAccess for TokioFileSystem {
    async fn exists(&self, path: &Path) -> Result<bool> {
        let found = fs::try_exists(path).await?;
        trace!(path = ?path, found, "Probed file");
        Ok(found)
    }
}
