//! # Library Management Module
//!
//! Owns the canonical audio library database and the storage interface the
//! sync engine talks to.
//!
//! ## Overview
//!
//! This module manages:
//! - SQLite schema and migrations, with sentinel rows seeded on creation
//! - Domain models for artists, albums, songs, classifications, party
//!   relations and related images
//! - The [`LibraryStore`](store::LibraryStore) trait: full-table loads, bulk
//!   inserts, column-restricted bulk updates and keyed deletes
//! - [`SqliteLibraryStore`](store::SqliteLibraryStore), the `sqlx` implementation

pub mod db;
pub mod error;
pub mod models;
pub mod store;

pub use error::{LibraryError, Result};
pub use store::{LibraryStore, SqliteLibraryStore, TableRows};
