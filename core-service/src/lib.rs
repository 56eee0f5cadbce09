//! Core service façade and bootstrap helpers.
//!
//! This crate wires a [`CoreConfig`] into a ready-to-scan library: it opens
//! the database (running migrations), loads the `scan.*` options from the
//! configured settings store and builds the tag reader. Desktop apps
//! typically enable the `desktop-shims` feature (which depends on
//! `bridge-desktop`) so that missing bridges get default implementations.
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use core_service::CoreService;
//!
//! let config = CoreConfig::builder()
//!     .database_path("/home/me/.local/share/library.db")
//!     .library_root("/home/me/Music")
//!     .build()?;
//! let core = CoreService::bootstrap(config).await?;
//! let result = core.scan(Default::default()).await?;
//! ```

pub mod error;

pub use error::{CoreError, Result};

use std::sync::Arc;

use bridge_traits::time::{Clock, SystemClock};
use core_library::db::{create_pool, DatabaseConfig};
use core_library::{LibraryStore, SqliteLibraryStore};
use core_metadata::LoftyMetadataReader;
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventBus};
use core_sync::{ScanOptions, SyncOrchestrator, SyncResult};
use tokio::sync::{broadcast, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

const EVENT_BUS_CAPACITY: usize = 256;

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct CoreService {
    config: Arc<CoreConfig>,
    store: Arc<dyn LibraryStore>,
    reader: Arc<LoftyMetadataReader>,
    clock: Arc<dyn Clock>,
    options: Arc<ScanOptions>,
    event_bus: EventBus,
    /// Held for the duration of a scan; scans never overlap
    scan_lock: Arc<Mutex<()>>,
}

impl CoreService {
    /// Open the library database and load scan options.
    #[instrument(skip(config), fields(database = %config.database_path.display()))]
    pub async fn bootstrap(config: CoreConfig) -> Result<Self> {
        let pool = create_pool(DatabaseConfig::new(&config.database_path)).await?;
        let options = ScanOptions::load(config.settings_store.as_ref()).await;
        let reader = LoftyMetadataReader::new()
            .with_classification_types(options.classification_types.clone());

        info!(roots = config.library_roots.len(), "Core service ready");
        Ok(Self {
            config: Arc::new(config),
            store: Arc::new(SqliteLibraryStore::new(pool)),
            reader: Arc::new(reader),
            clock: Arc::new(SystemClock),
            options: Arc::new(options),
            event_bus: EventBus::new(EVENT_BUS_CAPACITY),
            scan_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Replace the wall clock used for add and replace stamps
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Scan every configured library root.
    ///
    /// Fails with [`CoreError::ScanInProgress`] while another scan runs.
    pub async fn scan(&self, cancel: CancellationToken) -> Result<SyncResult> {
        let _guard = self
            .scan_lock
            .try_lock()
            .map_err(|_| CoreError::ScanInProgress)?;

        let mut orchestrator = SyncOrchestrator::new(
            Arc::clone(&self.store),
            self.reader.clone(),
            Arc::clone(&self.config.file_system),
            Arc::clone(&self.clock),
            self.options.as_ref().clone(),
        )
        .with_event_bus(self.event_bus.clone())
        .with_cancellation(cancel);

        let result = orchestrator
            .run(self.config.enumerator.as_ref(), &self.config.library_roots)
            .await?;
        Ok(result)
    }

    /// Receive scan and library events
    pub fn subscribe_events(&self) -> broadcast::Receiver<CoreEvent> {
        self.event_bus.subscribe()
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// The library store scans write to
    pub fn store(&self) -> Arc<dyn LibraryStore> {
        Arc::clone(&self.store)
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }
}
