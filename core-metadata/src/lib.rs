//! # Metadata Module
//!
//! Turns a discovered audio file into a closed, strongly typed set of tag
//! values for the sync engine.
//!
//! ## Overview
//!
//! - [`tags`]: the fixed tag vocabulary (`TagKey`, `TagValue`, `KeyValues`)
//! - [`reader`]: the `MetadataReader` trait consumed by the scanner
//! - [`extractor`]: a `lofty` backed reader for ID3, Vorbis, MP4 and FLAC files

pub mod error;
pub mod extractor;
pub mod reader;
pub mod tags;

pub use error::{MetadataError, Result};
pub use extractor::LoftyMetadataReader;
pub use reader::MetadataReader;
pub use tags::{ImageRef, KeyValues, TagKey, TagValue};
