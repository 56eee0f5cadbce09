//! # Core Configuration Module
//!
//! Provides configuration management for the library sync engine.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance that holds the storage location, the library roots to scan and the
//! host bridges the engine talks to. It enforces fail-fast validation so a
//! misconfigured host learns about it before the first scan.
//!
//! ## Required Dependencies
//!
//! - `SettingsStore` - Source of the `scan.*` options
//! - `FileSystemAccess` - Existence checks during cleanup
//! - `AudioFileEnumerator` - Discovery of audio files below the roots
//!
//! When the `desktop-shims` feature is enabled, `SqliteSettingsStore`,
//! `TokioFileSystem` and `WalkdirEnumerator` are injected automatically if
//! not provided.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//!
//! let config = CoreConfig::builder()
//!     .database_path("/path/to/library.db")
//!     .library_root("/home/me/Music")
//!     .build()
//!     .expect("Failed to build config");
//! ```

use crate::error::{Error, Result};
use bridge_traits::{AudioFileEnumerator, FileSystemAccess, SettingsStore};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Core configuration for the library sync engine.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Path to the SQLite library database
    pub database_path: PathBuf,

    /// Directories scanned for audio files
    pub library_roots: Vec<PathBuf>,

    /// Scan option storage
    pub settings_store: Arc<dyn SettingsStore>,

    /// File probing used by cleanup and lyrics sidecars
    pub file_system: Arc<dyn FileSystemAccess>,

    /// Audio file discovery
    pub enumerator: Arc<dyn AudioFileEnumerator>,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("database_path", &self.database_path)
            .field("library_roots", &self.library_roots)
            .field("settings_store", &"SettingsStore { ... }")
            .field("file_system", &"FileSystemAccess { ... }")
            .field("enumerator", &"AudioFileEnumerator { ... }")
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration.
    ///
    /// Checks that at least one library root is configured and that no root
    /// is listed twice.
    pub fn validate(&self) -> Result<()> {
        if self.library_roots.is_empty() {
            return Err(Error::Config(
                "At least one library root is required. Use .library_root() to add one."
                    .to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for root in &self.library_roots {
            if !seen.insert(root) {
                return Err(Error::Config(format!(
                    "Library root {} is listed more than once",
                    root.display()
                )));
            }
        }

        if self.database_path.as_os_str().is_empty() {
            return Err(Error::Config("Database path cannot be empty".to_string()));
        }

        Ok(())
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn capability_missing(capability: &str, purpose: &str) -> Error {
    Error::CapabilityMissing {
        capability: capability.to_string(),
        message: format!(
            "{} implementation is required for {}. \
             Desktop: enable the 'desktop-shims' feature to use the default implementation.",
            capability, purpose
        ),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_file_system() -> Result<Arc<dyn FileSystemAccess>> {
    Ok(Arc::new(bridge_desktop::TokioFileSystem::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_file_system() -> Result<Arc<dyn FileSystemAccess>> {
    Err(capability_missing("FileSystemAccess", "file probing"))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_enumerator() -> Result<Arc<dyn AudioFileEnumerator>> {
    Ok(Arc::new(bridge_desktop::WalkdirEnumerator::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_enumerator() -> Result<Arc<dyn AudioFileEnumerator>> {
    Err(capability_missing("AudioFileEnumerator", "audio file discovery"))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_settings_store(database_path: &Path) -> Result<Arc<dyn SettingsStore>> {
    use bridge_desktop::SqliteSettingsStore;
    use std::thread;
    use tokio::runtime::{Handle, Runtime};

    let candidate = database_path
        .parent()
        .map(|parent| parent.join("settings.db"))
        .unwrap_or_else(|| PathBuf::from("settings.db"));

    let init_store = |path: PathBuf| -> Result<_> {
        let runtime = Runtime::new().map_err(|e| {
            Error::Internal(format!(
                "Failed to create Tokio runtime for default settings store: {}",
                e
            ))
        })?;

        runtime
            .block_on(SqliteSettingsStore::new(path))
            .map_err(|e| {
                Error::Internal(format!("Failed to initialize default SettingsStore: {}", e))
            })
    };

    // block_on panics inside a running runtime, so build the store on a fresh thread
    let store = match Handle::try_current() {
        Ok(_) => {
            let path = candidate.clone();
            thread::spawn(move || init_store(path))
                .join()
                .map_err(|_| {
                    Error::Internal(
                        "Worker thread panicked while creating default SettingsStore".to_string(),
                    )
                })??
        }
        Err(_) => init_store(candidate)?,
    };

    let store: Arc<dyn SettingsStore> = Arc::new(store);
    Ok(store)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_settings_store(_database_path: &Path) -> Result<Arc<dyn SettingsStore>> {
    Err(capability_missing("SettingsStore", "scan options"))
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    database_path: Option<PathBuf>,
    library_roots: Vec<PathBuf>,
    settings_store: Option<Arc<dyn SettingsStore>>,
    file_system: Option<Arc<dyn FileSystemAccess>>,
    enumerator: Option<Arc<dyn AudioFileEnumerator>>,
}

impl CoreConfigBuilder {
    /// Sets the path to the SQLite library database (required).
    pub fn database_path(mut self, path: impl AsRef<Path>) -> Self {
        self.database_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Adds a directory to scan. At least one is required.
    pub fn library_root(mut self, path: impl AsRef<Path>) -> Self {
        self.library_roots.push(path.as_ref().to_path_buf());
        self
    }

    /// Replaces the list of directories to scan.
    pub fn library_roots<I, P>(mut self, roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        self.library_roots = roots
            .into_iter()
            .map(|p| p.as_ref().to_path_buf())
            .collect();
        self
    }

    pub fn settings_store(mut self, store: Arc<dyn SettingsStore>) -> Self {
        self.settings_store = Some(store);
        self
    }

    pub fn file_system(mut self, fs: Arc<dyn FileSystemAccess>) -> Self {
        self.file_system = Some(fs);
        self
    }

    pub fn enumerator(mut self, enumerator: Arc<dyn AudioFileEnumerator>) -> Self {
        self.enumerator = Some(enumerator);
        self
    }

    /// Builds the configuration, injecting desktop defaults for missing
    /// bridges when available.
    ///
    /// # Errors
    ///
    /// - `Error::Config` when the database path or library roots are missing
    ///   or invalid
    /// - `Error::CapabilityMissing` when a bridge is missing and no default
    ///   implementation is compiled in
    pub fn build(self) -> Result<CoreConfig> {
        let database_path = self.database_path.ok_or_else(|| {
            Error::Config("Database path is required. Use .database_path() to set it.".to_string())
        })?;

        let settings_store = match self.settings_store {
            Some(store) => store,
            None => provide_default_settings_store(&database_path)?,
        };

        let file_system = match self.file_system {
            Some(fs) => fs,
            None => provide_default_file_system()?,
        };

        let enumerator = match self.enumerator {
            Some(enumerator) => enumerator,
            None => provide_default_enumerator()?,
        };

        let config = CoreConfig {
            database_path,
            library_roots: self.library_roots,
            settings_store,
            file_system,
            enumerator,
        };

        config.validate()?;
        debug!(
            database = ?config.database_path,
            roots = config.library_roots.len(),
            "Built core configuration"
        );

        Ok(config)
    }
}
