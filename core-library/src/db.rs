//! # Library Database
//!
//! Opens the SQLite file that backs [`SqliteLibraryStore`](crate::SqliteLibraryStore)
//! and brings its schema up to date.
//!
//! A scan reads every table once and then writes in large batches, so the
//! pool is small and tuned for bulk statements: WAL journaling lets a host
//! keep reading while the batch commits, and the busy timeout covers the
//! window where a reader holds the lock.
//!
//! ```rust,ignore
//! use core_library::db::{create_pool, DatabaseConfig};
//!
//! let pool = create_pool(DatabaseConfig::new("/home/me/.local/share/library.db")).await?;
//! let store = SqliteLibraryStore::new(pool);
//! ```

use crate::{LibraryError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Where the library lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    File(PathBuf),
    /// Private to the pool; gone when the last connection closes
    Memory,
}

/// Connection settings for the library database
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub location: DatabaseLocation,
    pub max_connections: u32,
    /// How long to wait for a free pooled connection
    pub acquire_timeout: Duration,
    /// How long a statement waits on a locked database before failing
    pub busy_timeout: Duration,
    pub statement_cache_capacity: usize,
}

impl DatabaseConfig {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            location: DatabaseLocation::File(path.as_ref().to_path_buf()),
            max_connections: 4,
            acquire_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(10),
            statement_cache_capacity: 128,
        }
    }

    /// A throwaway database for tests.
    ///
    /// Every in-memory connection is its own database, so the pool is
    /// pinned to a single connection.
    pub fn in_memory() -> Self {
        Self {
            location: DatabaseLocation::Memory,
            max_connections: 1,
            ..Self::new("")
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max.max(1);
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    fn connect_options(&self) -> SqliteConnectOptions {
        let options = match &self.location {
            DatabaseLocation::File(path) => SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal),
            DatabaseLocation::Memory => SqliteConnectOptions::new()
                .in_memory(true)
                .journal_mode(SqliteJournalMode::Memory),
        };

        options
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(self.busy_timeout)
            .statement_cache_capacity(self.statement_cache_capacity)
            // Bulk inserts touch many pages at once
            .pragma("cache_size", "-32000")
            .pragma("temp_store", "MEMORY")
    }
}

/// Open the library, apply pending migrations and check the seed rows.
pub async fn create_pool(config: DatabaseConfig) -> Result<Pool<Sqlite>> {
    info!(
        location = ?config.location,
        max_connections = config.max_connections,
        "Opening library database"
    );

    if let DatabaseLocation::File(path) = &config.location {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| LibraryError::InvalidInput {
                field: "database_path".to_string(),
                message: format!("cannot create {}: {e}", parent.display()),
            })?;
        }
    }

    let pool = SqlitePoolOptions::new()
        .min_connections(1)
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect_with(config.connect_options())
        .await
        .map_err(|e| {
            warn!(error = %e, "Could not open library database");
            LibraryError::Database(e)
        })?;

    run_migrations(&pool).await?;
    verify_seed_rows(&pool).await?;

    Ok(pool)
}

/// In-memory library with the schema applied
pub async fn create_test_pool() -> Result<Pool<Sqlite>> {
    create_pool(DatabaseConfig::in_memory()).await
}

/// Apply the embedded migrations under `migrations/`
pub async fn run_migrations(pool: &Pool<Sqlite>) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| {
            warn!(error = %e, "Migration failed");
            LibraryError::Migration(e.to_string())
        })?;

    debug!("Library schema is current");
    Ok(())
}

/// The Unknown value-list rows and the built-in classification types are
/// referenced by every new artist, album and song.
async fn verify_seed_rows(pool: &Pool<Sqlite>) -> Result<()> {
    let (unknowns,): (i64,) =
        sqlx::query_as("SELECT COUNT(DISTINCT kind) FROM value_lists WHERE name = 'Unknown'")
            .fetch_one(pool)
            .await?;
    let (types,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM classification_types WHERE name IN ('Genre', 'Mood', 'Language')",
    )
    .fetch_one(pool)
    .await?;

    if unknowns < 3 || types < 3 {
        warn!(unknowns, types, "Library seed rows are missing");
        return Err(LibraryError::MissingSeed(format!(
            "expected 3 Unknown value-list rows and 3 built-in classification types, \
             found {unknowns} and {types}"
        )));
    }
    Ok(())
}
