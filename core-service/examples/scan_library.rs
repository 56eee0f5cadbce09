//! Scan a music folder into a library database and print what changed.
//!
//! Run with:
//! ```bash
//! # Pretty output, library.db in the working directory
//! cargo run -p core-service --example scan_library -- ~/Music
//!
//! # JSON logs with a custom database and filter
//! cargo run -p core-service --example scan_library -- \
//!     ~/Music /tmp/library.db json "core_sync=trace"
//! ```

use std::env;
use std::error::Error;

use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventSeverity, EventStream};
use core_runtime::logging::{init_logging, LogFormat, LogOutput, LoggingConfig};
use core_service::CoreService;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = env::args().collect();
    let Some(root) = args.get(1) else {
        eprintln!("usage: scan_library <music-dir> [database] [pretty|json|compact] [filter]");
        return Ok(());
    };
    let database = args.get(2).map(String::as_str).unwrap_or("library.db");
    let config = CoreConfig::builder()
        .database_path(database)
        .library_root(root)
        .build()?;

    // Settings store first, command line on top; logs go to stderr
    let mut logging = LoggingConfig::from_settings(config.settings_store.as_ref())
        .await
        .with_output(LogOutput::Stderr);
    if let Some(format) = args.get(3).and_then(|name| LogFormat::parse(name)) {
        logging = logging.with_format(format);
    }
    if let Some(filter) = args.get(4) {
        logging = logging.with_filter(filter.clone());
    }
    init_logging(logging)?;

    let core = CoreService::bootstrap(config).await?;

    // Started and Progress are debug-level; the log already shows them
    let mut events = EventStream::new(core.subscribe_events())
        .filter(|event| event.severity() >= EventSeverity::Info);
    let printer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            info!(event = ?event, "{}", event.description());
            if matches!(&event, CoreEvent::Scan(scan) if scan.is_terminal()) {
                break;
            }
        }
    });

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling scan");
            ctrl_c.cancel();
        }
    });

    let result = core.scan(cancel).await?;
    let _ = printer.await;

    println!(
        "songs: {} -> {} | added {} | updated {} | skipped {} | deleted {} | ignored {} | errors {}",
        result.initial_song_count,
        result.final_song_count,
        result.added.len(),
        result.updated.len(),
        result.skipped.len(),
        result.deleted.len(),
        result.ignored_paths.len(),
        result.files_with_errors.len(),
    );
    for failed in &result.files_with_errors {
        println!("  {}: {}", failed.path, failed.errors.join("; "));
    }
    Ok(())
}
