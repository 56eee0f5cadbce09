use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("A library scan is already running")]
    ScanInProgress,

    #[error("Configuration error: {0}")]
    Config(#[from] core_runtime::Error),

    #[error("Sync error: {0}")]
    Sync(#[from] core_sync::SyncError),

    #[error("Library error: {0}")]
    Library(#[from] core_library::LibraryError),
}

pub type Result<T> = std::result::Result<T, CoreError>;
