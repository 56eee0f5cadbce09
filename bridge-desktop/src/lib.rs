//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! This crate provides production-ready implementations of the bridge traits
//! the library sync engine consumes:
//! - `FileSystemAccess` existence checks using `tokio::fs`
//! - `AudioFileEnumerator` using `walkdir` on a blocking thread
//! - `SettingsStore` using a SQLite-backed key-value table
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{TokioFileSystem, WalkdirEnumerator};
//! use bridge_traits::AudioFileEnumerator;
//!
//! #[tokio::main]
//! async fn main() {
//!     let enumerator = WalkdirEnumerator::new();
//!     let files = enumerator
//!         .enumerate(&["/music".into()], &["mp3".to_string()])
//!         .await
//!         .unwrap();
//!     println!("{} audio files", files.len());
//! }
//! ```

mod enumerator;
mod filesystem;
mod settings;

pub use enumerator::WalkdirEnumerator;
pub use filesystem::TokioFileSystem;
pub use settings::SqliteSettingsStore;
