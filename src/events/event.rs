//! # Runtime events emitted by the supervisor, registry, and session actors.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Session lifecycle**: stream start, draining, worker exit, removal
//! - **Data path**: dropped chunks (backpressure, closed input)
//! - **Runtime**: shutdown progress, subscriber faults
//!
//! The [`Event`] struct carries metadata such as timestamps, the client id,
//! reasons, exit codes, and drain timeouts.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically. Use `seq` to restore the exact order when events are
//! delivered out of order. Events about a session additionally carry the
//! session `epoch`, so a late event for a replaced worker can always be told
//! apart from events about its successor.
//!
//! ## Example
//! ```rust
//! use streamvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::ChunkDropped)
//!     .with_client("u1")
//!     .with_reason("backpressure")
//!     .with_bytes(4096);
//!
//! assert_eq!(ev.kind, EventKind::ChunkDropped);
//! assert_eq!(ev.client.as_deref(), Some("u1"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets: `client` (subscriber name), `reason` (panic info).
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `client` (subscriber name), `reason` (`"full"` / `"closed"`).
    SubscriberOverflow,

    // === Shutdown events ===
    /// Shutdown requested (OS signal observed or `shutdown_all` called).
    ShutdownRequested,

    /// All sessions stopped within the configured shutdown grace.
    AllStoppedWithin,

    /// Shutdown grace exceeded; some sessions did not stop in time.
    GraceExceeded,

    // === Session lifecycle events ===
    /// A worker was spawned and the session is active.
    ///
    /// Sets: `client`, `epoch`.
    StreamStarted,

    /// A start request failed; no session was created.
    ///
    /// Sets: `client`, `reason`.
    StreamStartFailed,

    /// An existing session is being torn down to make room for a new worker
    /// for the same client.
    ///
    /// Sets: `client`, `epoch` (the epoch being replaced).
    SessionReplaced,

    /// A session entered the draining state (worker input closed, exit not
    /// yet observed).
    ///
    /// Sets: `client`, `epoch`.
    SessionDraining,

    /// The drain grace elapsed before the worker exited; the termination
    /// signal was sent. Not fatal — always followed by `WorkerExited`.
    ///
    /// Sets: `client`, `epoch`, `timeout_ms`.
    DrainTimeout,

    /// The worker process exited. Emitted exactly once per worker,
    /// solicited or not.
    ///
    /// Sets: `client`, `epoch`, `exit_code` and/or `signal`,
    /// `reason` (`"drained"` or `"unsolicited"`).
    WorkerExited,

    /// The session was removed from the registry.
    ///
    /// Sets: `client`, `epoch`.
    SessionRemoved,

    // === Data path events ===
    /// A chunk could not be forwarded and was dropped. The session survives.
    ///
    /// Sets: `client`, `reason` (`"backpressure"`, `"write_timeout"`,
    /// `"not_writable"`), `bytes` (dropped chunk size).
    ChunkDropped,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Client id the event is about (subscriber name for subscriber faults).
    pub client: Option<Arc<str>>,
    /// Session epoch: increments every time a worker is (re)started for a
    /// client, disambiguating replaced workers.
    pub epoch: Option<u64>,
    /// Human-readable reason (errors, drop causes, panic info).
    pub reason: Option<Arc<str>>,
    /// Worker exit code, when it exited normally.
    pub exit_code: Option<i32>,
    /// Signal that terminated the worker, when killed (unix).
    pub signal: Option<i32>,
    /// Drain timeout in milliseconds (compact).
    pub timeout_ms: Option<u32>,
    /// Payload size in bytes, for data-path events.
    pub bytes: Option<u64>,
}

impl Event {
    /// Creates a new event of the given kind with the current timestamp and
    /// next global sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            client: None,
            epoch: None,
            reason: None,
            exit_code: None,
            signal: None,
            timeout_ms: None,
            bytes: None,
        }
    }

    /// Attaches a client id.
    #[inline]
    pub fn with_client(mut self, client: impl Into<Arc<str>>) -> Self {
        self.client = Some(client.into());
        self
    }

    /// Attaches a session epoch.
    #[inline]
    pub fn with_epoch(mut self, epoch: u64) -> Self {
        self.epoch = Some(epoch);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a worker exit code.
    #[inline]
    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = Some(code);
        self
    }

    /// Attaches the terminating signal number.
    #[inline]
    pub fn with_signal(mut self, signal: i32) -> Self {
        self.signal = Some(signal);
        self
    }

    /// Attaches a timeout duration (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.timeout_ms = Some(ms);
        self
    }

    /// Attaches a payload size.
    #[inline]
    pub fn with_bytes(mut self, n: u64) -> Self {
        self.bytes = Some(n);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_client(subscriber)
            .with_reason(reason)
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_client(subscriber)
            .with_reason(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seq_is_monotonic() {
        let a = Event::new(EventKind::StreamStarted);
        let b = Event::new(EventKind::StreamStarted);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn builder_sets_fields() {
        let ev = Event::new(EventKind::WorkerExited)
            .with_client("u1")
            .with_epoch(3)
            .with_exit_code(0)
            .with_reason("drained");
        assert_eq!(ev.client.as_deref(), Some("u1"));
        assert_eq!(ev.epoch, Some(3));
        assert_eq!(ev.exit_code, Some(0));
        assert_eq!(ev.reason.as_deref(), Some("drained"));
    }
}
