//! Error types used by the relay runtime.
//!
//! Two enums cover the crate's failure surface:
//!
//! - [`RelayError`] — failures of individual supervisor operations
//!   (starting a stream, forwarding a chunk, stopping a session).
//! - [`RuntimeError`] — failures of the runtime itself, currently only a
//!   shutdown that overran its grace period.
//!
//! Both provide `as_label` / `as_message` helpers for logs and metrics.
//!
//! Propagation policy: errors that prevent session creation are returned to
//! the caller; steady-state forwarding errors are returned too, but callers
//! are expected to log and drop rather than tear the session down. Nothing
//! in this crate escalates to a process abort.

use std::time::Duration;

use thiserror::Error;

/// Errors produced by supervisor operations.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RelayError {
    /// Start requested with an empty destination credential; no session was created.
    #[error("destination credential is empty")]
    MissingCredential,

    /// Start requested after process-wide shutdown began; no session was created.
    #[error("runtime is shutting down")]
    ShuttingDown,

    /// The worker process could not be started; no session was created.
    #[error("failed to spawn worker: {source}")]
    Spawn {
        /// Underlying OS error from process creation.
        #[source]
        source: std::io::Error,
    },

    /// The operation referenced a client with no live session.
    #[error("no active session for client {client}")]
    SessionNotFound {
        /// Client identifier the caller supplied.
        client: String,
    },

    /// The session exists but its worker input is no longer accepting writes
    /// (input already closed or the process is gone). The chunk was dropped.
    #[error("worker input for client {client} is not writable")]
    NotWritable {
        /// Client identifier the caller supplied.
        client: String,
    },

    /// The worker is not consuming fast enough: the session's chunk queue is
    /// full or a write exceeded the configured bound. The chunk was dropped;
    /// the session stays up.
    #[error("backpressure for client {client}: chunk dropped")]
    Backpressure {
        /// Client identifier the caller supplied.
        client: String,
    },
}

impl RelayError {
    /// Returns a short stable label (snake_case) for logs/metrics.
    ///
    /// # Example
    /// ```
    /// use streamvisor::RelayError;
    ///
    /// assert_eq!(RelayError::MissingCredential.as_label(), "missing_credential");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RelayError::MissingCredential => "missing_credential",
            RelayError::ShuttingDown => "shutting_down",
            RelayError::Spawn { .. } => "spawn_failure",
            RelayError::SessionNotFound { .. } => "session_not_found",
            RelayError::NotWritable { .. } => "not_writable",
            RelayError::Backpressure { .. } => "backpressure",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RelayError::MissingCredential => "destination credential is empty".to_string(),
            RelayError::ShuttingDown => "runtime is shutting down".to_string(),
            RelayError::Spawn { source } => format!("spawn failed: {source}"),
            RelayError::SessionNotFound { client } => format!("no session for {client}"),
            RelayError::NotWritable { client } => format!("input not writable for {client}"),
            RelayError::Backpressure { client } => format!("backpressure for {client}"),
        }
    }

    /// True when the failed operation may simply be retried with a fresh
    /// `start_stream` (the session, if any, is already gone).
    pub fn is_session_gone(&self) -> bool {
        matches!(
            self,
            RelayError::SessionNotFound { .. } | RelayError::NotWritable { .. }
        )
    }
}

/// Errors produced by the relay runtime itself.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Shutdown grace period was exceeded; some sessions were still draining
    /// and had their workers force-terminated.
    #[error("shutdown grace {grace:?} exceeded; stuck: {stuck:?}")]
    GraceExceeded {
        /// The configured shutdown grace duration.
        grace: Duration,
        /// Client ids whose sessions did not stop in time.
        stuck: Vec<String>,
    },

    /// OS signal handlers could not be registered; no shutdown was initiated.
    #[error("failed to register signal handlers: {source}")]
    SignalHandler {
        /// Underlying OS error from signal registration.
        #[source]
        source: std::io::Error,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
            RuntimeError::SignalHandler { .. } => "signal_handler_failure",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RuntimeError::GraceExceeded { grace, stuck } => {
                format!("grace exceeded after {grace:?}; stuck sessions={stuck:?}")
            }
            RuntimeError::SignalHandler { source } => {
                format!("signal registration failed: {source}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_stable() {
        assert_eq!(
            RelayError::Spawn {
                source: std::io::Error::other("boom")
            }
            .as_label(),
            "spawn_failure"
        );
        assert_eq!(
            RelayError::SessionNotFound {
                client: "u1".into()
            }
            .as_label(),
            "session_not_found"
        );
        assert_eq!(
            RuntimeError::GraceExceeded {
                grace: Duration::from_millis(500),
                stuck: vec![]
            }
            .as_label(),
            "runtime_grace_exceeded"
        );
        assert_eq!(RelayError::ShuttingDown.as_label(), "shutting_down");
        assert_eq!(
            RuntimeError::SignalHandler {
                source: std::io::Error::other("boom")
            }
            .as_label(),
            "signal_handler_failure"
        );
    }

    #[test]
    fn session_gone_classification() {
        assert!(RelayError::SessionNotFound {
            client: "u1".into()
        }
        .is_session_gone());
        assert!(!RelayError::Backpressure {
            client: "u1".into()
        }
        .is_session_gone());
    }
}
