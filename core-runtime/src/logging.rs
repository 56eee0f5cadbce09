//! # Logging
//!
//! Installs the global `tracing` subscriber used by every crate in the
//! workspace. The scan engine logs phase boundaries at `info`, per-file
//! decisions at `debug` and anomalies it recovers from at `warn`; the
//! default filter shows workspace crates at the configured level and keeps
//! the database driver at `warn`.
//!
//! Hosts either build a [`LoggingConfig`] in code or read the `log.*` keys
//! from their settings store:
//!
//! ```ignore
//! use core_runtime::logging::{init_logging, LoggingConfig};
//!
//! let config = LoggingConfig::from_settings(settings.as_ref()).await;
//! init_logging(config)?;
//! tracing::info!("Library scanner started");
//! ```

use crate::error::{Error, Result};

use bridge_traits::storage::SettingsStore;
use bridge_traits::time::LogLevel;
use std::io;
use tracing_subscriber::{
    filter::EnvFilter,
    fmt::{format::FmtSpan, writer::BoxMakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// `trace`, `debug`, `info`, `warn` or `error`
pub const KEY_LOG_LEVEL: &str = "log.level";
/// `pretty`, `json` or `compact`
pub const KEY_LOG_FORMAT: &str = "log.format";
/// Full `EnvFilter` directive string; overrides the level
pub const KEY_LOG_FILTER: &str = "log.filter";

/// Crates whose events pass the default filter at the configured level
const WORKSPACE_TARGETS: &[&str] = &[
    "library_sync_workspace",
    "core_runtime",
    "core_sync",
    "core_library",
    "core_metadata",
    "core_service",
    "bridge_desktop",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, colored
    Pretty,
    /// One JSON object per event
    Json,
    Compact,
}

impl LogFormat {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "pretty" => Some(Self::Pretty),
            "json" => Some(Self::Json),
            "compact" => Some(Self::Compact),
            _ => None,
        }
    }
}

impl Default for LogFormat {
    fn default() -> Self {
        #[cfg(debug_assertions)]
        return Self::Pretty;

        #[cfg(not(debug_assertions))]
        return Self::Json;
    }
}

/// Stream log lines are written to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogOutput {
    #[default]
    Stdout,
    /// Leaves stdout to the host, e.g. a CLI printing scan results
    Stderr,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Level for workspace crates when no custom filter is set
    pub level: LogLevel,
    /// Custom filter string (e.g., "core_sync=trace,sqlx=info")
    pub filter: Option<String>,
    /// Emit span open/close events, e.g. around each scan phase
    pub enable_spans: bool,
    pub display_target: bool,
    pub display_thread_info: bool,
    pub output: LogOutput,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: LogLevel::Info,
            filter: None,
            enable_spans: false,
            display_target: true,
            display_thread_info: false,
            output: LogOutput::Stdout,
        }
    }
}

impl LoggingConfig {
    /// Read `log.level`, `log.format` and `log.filter`.
    ///
    /// Missing or unreadable keys keep their defaults. Nothing is logged
    /// here since no subscriber is installed yet.
    pub async fn from_settings(settings: &dyn SettingsStore) -> Self {
        let mut config = Self::default();

        if let Ok(Some(level)) = settings.get_string(KEY_LOG_LEVEL).await {
            if let Some(level) = parse_level(&level) {
                config.level = level;
            }
        }
        if let Ok(Some(format)) = settings.get_string(KEY_LOG_FORMAT).await {
            if let Some(format) = LogFormat::parse(&format) {
                config.format = format;
            }
        }
        if let Ok(Some(filter)) = settings.get_string(KEY_LOG_FILTER).await {
            if !filter.trim().is_empty() {
                config.filter = Some(filter);
            }
        }

        config
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_spans(mut self, enable: bool) -> Self {
        self.enable_spans = enable;
        self
    }

    pub fn with_target(mut self, display: bool) -> Self {
        self.display_target = display;
        self
    }

    pub fn with_thread_info(mut self, display: bool) -> Self {
        self.display_thread_info = display;
        self
    }

    pub fn with_output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    /// Filter directives this config installs when `RUST_LOG` is unset
    pub fn directives(&self) -> String {
        if let Some(filter) = &self.filter {
            return filter.clone();
        }

        let level = self.level.as_str();
        let mut directives: Vec<String> = WORKSPACE_TARGETS
            .iter()
            .map(|target| format!("{target}={level}"))
            .collect();
        directives.push("sqlx=warn".to_string());
        directives.join(",")
    }
}

fn parse_level(name: &str) -> Option<LogLevel> {
    match name.trim().to_ascii_lowercase().as_str() {
        "trace" => Some(LogLevel::Trace),
        "debug" => Some(LogLevel::Debug),
        "info" => Some(LogLevel::Info),
        "warn" | "warning" => Some(LogLevel::Warn),
        "error" => Some(LogLevel::Error),
        _ => None,
    }
}

/// Install the global subscriber.
///
/// An explicit filter on the config wins over `RUST_LOG`, which wins over
/// the level-derived default.
///
/// # Errors
///
/// Fails if the filter does not parse or a global subscriber is already
/// installed.
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = build_filter(&config, env.as_deref())?;

    let writer = match config.output {
        LogOutput::Stdout => BoxMakeWriter::new(io::stdout),
        LogOutput::Stderr => BoxMakeWriter::new(io::stderr),
    };
    let span_events = if config.enable_spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };
    let layer = tracing_subscriber::fmt::layer()
        .with_target(config.display_target)
        .with_thread_ids(config.display_thread_info)
        .with_thread_names(config.display_thread_info)
        .with_writer(writer);
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match config.format {
        LogFormat::Pretty => registry
            .with(layer.pretty().with_span_events(span_events))
            .try_init(),
        LogFormat::Compact => registry
            .with(layer.compact().with_span_events(span_events))
            .try_init(),
        LogFormat::Json => registry
            .with(
                layer
                    .json()
                    .flatten_event(true)
                    .with_current_span(config.enable_spans)
                    .with_span_list(config.enable_spans),
            )
            .try_init(),
    };

    installed.map_err(|e| Error::Config(format!("Failed to initialize logging: {e}")))
}

fn build_filter(config: &LoggingConfig, env: Option<&str>) -> Result<EnvFilter> {
    let directives = match (&config.filter, env) {
        (None, Some(env)) if !env.trim().is_empty() => env.to_string(),
        _ => config.directives(),
    };

    EnvFilter::try_new(&directives)
        .map_err(|e| Error::Config(format!("Invalid log filter {directives:?}: {e}")))
}
