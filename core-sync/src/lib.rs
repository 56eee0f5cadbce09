//! # Library Scan Module
//!
//! Reconciles the audio files on disk with the library database.
//!
//! ## Overview
//!
//! A scan loads every cached table into memory, walks the discovered files
//! one at a time, and only then writes: one bulk insert and one bulk update
//! per entity kind, followed by a cascading delete of rows whose files are
//! gone.
//!
//! ## Components
//!
//! - **Scan Mode** (`scan_mode`): Add, Update or Skip per file, by exact
//!   change timestamp
//! - **Identity** (`identity`): content hashes of natural keys
//! - **Unit of Work** (`unit_of_work`): per-run rows tagged Clean, New or Dirty
//! - **Materializer** (`materializer`): turns tag values into artists, albums,
//!   songs, relations, classifications and images
//! - **Cleanup** (`cleanup`): orphan removal in dependency order
//! - **Sync Orchestrator** (`coordinator`): drives the phases and reports
//!   progress

pub mod cleanup;
pub mod coordinator;
pub mod error;
pub mod identity;
pub mod materializer;
pub mod options;
pub mod result;
pub mod scan_mode;
pub mod unit_of_work;

pub use cleanup::{CleanupReport, CleanupResolver, CleanupStep};
pub use coordinator::SyncOrchestrator;
pub use error::{Result, SyncError};
pub use identity::{identity_hash, Identity, IdentityHash};
pub use materializer::{Materializer, UpdateOutcome};
pub use options::ScanOptions;
pub use result::{FileErrors, FileStatus, ProcessedFile, SyncResult};
pub use scan_mode::{classify, ScanMode};
pub use unit_of_work::{EntitySet, RowState, UnitOfWork};
