use async_trait::async_trait;
use bridge_traits::storage::AudioFile;

use crate::tags::KeyValues;

/// Reads the tags of one audio file.
///
/// Implementations never fail the read: problems are reported through
/// [`KeyValues::errors`] so the scanner can record the file and move on.
#[async_trait]
pub trait MetadataReader: Send + Sync {
    async fn read(&self, file: &AudioFile) -> KeyValues;
}
