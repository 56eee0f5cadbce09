use thiserror::Error;

/// Why a file's tags could not be read.
///
/// The reader turns these into [`KeyValues::errors`](crate::KeyValues)
/// entries instead of returning them.
#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("Could not read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not a recognized audio format: {0}")]
    UnsupportedFormat(String),

    #[error("Corrupt or unreadable tags: {0}")]
    Tags(#[from] lofty::error::LoftyError),
}

pub type Result<T> = std::result::Result<T, MetadataError>;
