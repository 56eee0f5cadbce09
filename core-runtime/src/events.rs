//! # Event Bus System
//!
//! Provides an event-driven surface for library scans using `tokio::sync::broadcast`.
//! The scan orchestrator publishes typed events; hosts subscribe to render
//! progress or refresh views once orphans have been removed.
//!
//! ## Overview
//!
//! The event bus system consists of:
//! - **Event Types**: `CoreEvent` wrapping scan lifecycle and library change events
//! - **EventBus**: Central broadcast channel for publishing events
//! - **EventStream**: Wrapper for consuming events with filtering
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, ScanEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut stream = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Scan(ScanEvent::Started {
//!         scan_id: "scan-1".to_string(),
//!         roots: vec!["/music".to_string()],
//!     }))
//!     .ok();
//!
//! let event = stream.recv().await.unwrap();
//! assert!(matches!(event, CoreEvent::Scan(ScanEvent::Started { .. })));
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: Subscriber was too slow and missed `n` events.
//!   This is non-fatal; the subscriber can continue receiving new events.
//! - **`RecvError::Closed`**: All senders have been dropped. This indicates shutdown.
//!
//! Publishing with no subscribers returns an error which publishers ignore.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// Subscribers that can't keep up will receive `RecvError::Lagged`.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum published and received through the event bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Scan lifecycle events
    Scan(ScanEvent),
    /// Library content changes
    Library(LibraryEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Scan(e) => e.description(),
            CoreEvent::Library(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Scan(ScanEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Scan(ScanEvent::Cancelled { .. }) => EventSeverity::Warning,
            CoreEvent::Scan(ScanEvent::Completed { .. }) => EventSeverity::Info,
            CoreEvent::Library(LibraryEvent::OrphansRemoved { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Scan Events
// ============================================================================

/// Events emitted while a library scan runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum ScanEvent {
    /// Caches are loaded and file enumeration is about to start.
    Started {
        /// Identifier of this scan run.
        scan_id: String,
        /// Library roots being scanned.
        roots: Vec<String>,
    },
    /// Incremental progress through the discovered files.
    Progress {
        scan_id: String,
        /// Files classified so far.
        files_processed: u64,
        /// Files discovered by the enumerator.
        total_files: u64,
        /// Progress percentage (0-100).
        percent: u8,
    },
    /// Scan persisted its changes and finished cleanup.
    Completed {
        scan_id: String,
        added: u64,
        updated: u64,
        skipped: u64,
        deleted: u64,
        ignored: u64,
        errors: u64,
        /// Wall time of the run in milliseconds.
        duration_ms: u64,
    },
    /// Scan stopped on a fatal storage error.
    Failed {
        scan_id: String,
        /// Human-readable error message.
        message: String,
        /// Files classified before the failure.
        files_processed: u64,
    },
    /// Scan was cancelled before anything was persisted.
    Cancelled {
        scan_id: String,
        files_processed: u64,
    },
}

impl ScanEvent {
    pub fn scan_id(&self) -> &str {
        match self {
            ScanEvent::Started { scan_id, .. }
            | ScanEvent::Progress { scan_id, .. }
            | ScanEvent::Completed { scan_id, .. }
            | ScanEvent::Failed { scan_id, .. }
            | ScanEvent::Cancelled { scan_id, .. } => scan_id,
        }
    }

    /// No further events follow for this scan id
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ScanEvent::Completed { .. } | ScanEvent::Failed { .. } | ScanEvent::Cancelled { .. }
        )
    }

    fn description(&self) -> &str {
        match self {
            ScanEvent::Started { .. } => "Library scan started",
            ScanEvent::Progress { .. } => "Library scan in progress",
            ScanEvent::Completed { .. } => "Library scan completed",
            ScanEvent::Failed { .. } => "Library scan failed",
            ScanEvent::Cancelled { .. } => "Library scan cancelled",
        }
    }
}

// ============================================================================
// Library Events
// ============================================================================

/// Events related to library content changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum LibraryEvent {
    /// Records whose backing files disappeared were deleted.
    OrphansRemoved {
        songs: u64,
        albums: u64,
        artists: u64,
        images: u64,
    },
}

impl LibraryEvent {
    fn description(&self) -> &str {
        match self {
            LibraryEvent::OrphansRemoved { .. } => "Orphaned library records removed",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Uses `tokio::sync::broadcast` internally, which provides:
/// - Multiple producers (clone the `EventBus`)
/// - Multiple consumers (each `subscribe()` creates a new receiver)
/// - Lagging detection (slow subscribers get `RecvError::Lagged`)
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error if there are no active subscribers.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber to receive events.
    ///
    /// Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with optional filtering.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let event_bus = EventBus::new(100);
/// let scan_only = EventStream::new(event_bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Scan(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without blocking.
    ///
    /// Returns `None` if no events are currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completed() -> CoreEvent {
        CoreEvent::Scan(ScanEvent::Completed {
            scan_id: "scan-1".to_string(),
            added: 10,
            updated: 2,
            skipped: 88,
            deleted: 1,
            ignored: 3,
            errors: 0,
            duration_ms: 1500,
        })
    }

    #[tokio::test]
    async fn test_event_bus_subscription() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);
        let _sub1 = bus.subscribe();
        let _sub2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::default();
        assert!(bus.emit(completed()).is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();

        let event = CoreEvent::Scan(ScanEvent::Started {
            scan_id: "scan-1".to_string(),
            roots: vec!["/music".to_string()],
        });

        assert_eq!(bus.emit(event.clone()).unwrap(), 2);
        assert_eq!(sub1.recv().await.unwrap(), event);
        assert_eq!(sub2.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_event_stream_with_filter() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe())
            .filter(|event| matches!(event, CoreEvent::Library(_)));

        bus.emit(completed()).ok();
        let removed = CoreEvent::Library(LibraryEvent::OrphansRemoved {
            songs: 1,
            albums: 1,
            artists: 0,
            images: 2,
        });
        bus.emit(removed.clone()).ok();

        assert_eq!(stream.recv().await.unwrap(), removed);
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();

        for i in 0..5 {
            bus.emit(CoreEvent::Scan(ScanEvent::Progress {
                scan_id: "scan-1".to_string(),
                files_processed: i,
                total_files: 5,
                percent: (i * 20) as u8,
            }))
            .ok();
        }

        assert!(matches!(sub.recv().await, Err(RecvError::Lagged(_))));
    }

    #[test]
    fn test_event_severity_and_description() {
        let failed = CoreEvent::Scan(ScanEvent::Failed {
            scan_id: "scan-1".to_string(),
            message: "database is locked".to_string(),
            files_processed: 12,
        });
        assert_eq!(failed.severity(), EventSeverity::Error);
        assert_eq!(completed().severity(), EventSeverity::Info);
        assert_eq!(completed().description(), "Library scan completed");
    }

    #[test]
    fn test_terminal_scan_events() {
        let started = ScanEvent::Started {
            scan_id: "scan-7".to_string(),
            roots: vec![],
        };
        let cancelled = ScanEvent::Cancelled {
            scan_id: "scan-7".to_string(),
            files_processed: 3,
        };

        assert!(!started.is_terminal());
        assert!(cancelled.is_terminal());
        assert_eq!(cancelled.scan_id(), "scan-7");
    }

    #[test]
    fn test_event_serialization() {
        let event = completed();
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"Scan\""));

        let deserialized: CoreEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, event);
    }

    #[tokio::test]
    async fn test_try_recv() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe());
        assert!(stream.try_recv().is_none());

        bus.emit(completed()).ok();
        assert_eq!(stream.try_recv().unwrap().unwrap(), completed());
    }
}
