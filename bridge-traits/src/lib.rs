//! # Host Bridge Traits
//!
//! Platform abstraction traits that the library sync engine consumes but that
//! must be implemented by the host.
//!
//! ## Overview
//!
//! This crate defines the contract between the sync core and the platform.
//! Each trait represents one capability the engine needs at its boundary:
//!
//! - [`FileSystemAccess`](storage::FileSystemAccess) - Existence checks for
//!   cleanup and add-date write back
//! - [`AudioFileEnumerator`](storage::AudioFileEnumerator) - One-shot discovery
//!   of audio files below a set of root directories
//! - [`SettingsStore`](storage::SettingsStore) - Typed key-value configuration
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type.
//! Implementations should convert platform-specific errors to `BridgeError`
//! and include the offending path or key in the message.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so a single instance can be shared
//! between the orchestrator and host code behind an `Arc`.

pub mod error;
pub mod storage;
pub mod time;

pub use error::BridgeError;

pub use storage::{AudioFile, AudioFileEnumerator, FileSystemAccess, SettingsStore};
pub use time::{Clock, FixedClock, LogLevel, SystemClock};
