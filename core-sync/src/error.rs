use bridge_traits::error::BridgeError;
use core_library::LibraryError;
use thiserror::Error;

use crate::cleanup::CleanupStep;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Library error: {0}")]
    Library(#[from] LibraryError),

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Cleanup aborted while removing {step}: {source}")]
    CleanupAborted {
        step: CleanupStep,
        #[source]
        source: LibraryError,
    },

    #[error("Scan cancelled")]
    Cancelled,

    #[error("Invalid scan state: {0}")]
    InvalidState(String),
}

pub type Result<T> = std::result::Result<T, SyncError>;
