//! # Session: the record binding one client to at most one live worker.
//!
//! A [`Session`] is shared between the supervisor (which creates it), the
//! session actor (which drives its state), and diagnostic readers (which
//! snapshot it). It carries no worker resources itself — the
//! [`PipeHandle`](crate::worker::PipeHandle) is owned exclusively by the
//! actor — only identity, state, and timestamps.
//!
//! ## Invariant
//! At most one `Session` per client id exists in the registry at any
//! instant. The `epoch` increases with every worker (re)started by the
//! supervisor, so events about a replaced worker can never be attributed to
//! its successor.

mod state;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use tokio::sync::RwLock;
use tracing::debug;

pub use state::SessionState;

/// Shared per-session record: identity, state machine, diagnostics.
pub struct Session {
    client: Arc<str>,
    epoch: u64,
    /// Masked destination, safe for logs (the raw credential never lands here).
    destination: String,
    state: RwLock<SessionState>,
    created_at: SystemTime,
    last_write_at: RwLock<SystemTime>,
    bytes_relayed: AtomicU64,
}

impl Session {
    /// Creates a new session in `Starting` state.
    pub(crate) fn new(client: Arc<str>, epoch: u64, destination_masked: String) -> Arc<Self> {
        let now = SystemTime::now();
        Arc::new(Self {
            client,
            epoch,
            destination: destination_masked,
            state: RwLock::new(SessionState::Starting),
            created_at: now,
            last_write_at: RwLock::new(now),
            bytes_relayed: AtomicU64::new(0),
        })
    }

    /// Client id this session belongs to.
    pub fn client(&self) -> &str {
        &self.client
    }

    /// Monotonic per-supervisor worker generation number.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> SessionState {
        *self.state.read().await
    }

    /// Advances the state machine. Illegal transitions (e.g. anything out
    /// of `Terminated`) are ignored, keeping `Terminated` absorbing even if
    /// a drain and an unsolicited exit race.
    pub(crate) async fn set_state(&self, to: SessionState) {
        let mut state = self.state.write().await;
        if state.can_transition(to) {
            *state = to;
        } else if *state != to {
            debug!(
                client = &*self.client,
                from = state.as_label(),
                to = to.as_label(),
                "ignoring illegal state transition"
            );
        }
    }

    /// Records a successful chunk write for diagnostics.
    pub(crate) async fn record_write(&self, bytes: usize) {
        self.bytes_relayed.fetch_add(bytes as u64, Ordering::Relaxed);
        *self.last_write_at.write().await = SystemTime::now();
    }

    /// Point-in-time snapshot for operators.
    pub async fn snapshot(&self) -> SessionInfo {
        SessionInfo {
            client: self.client.to_string(),
            epoch: self.epoch,
            state: *self.state.read().await,
            destination: self.destination.clone(),
            created_at: self.created_at,
            last_write_at: *self.last_write_at.read().await,
            bytes_relayed: self.bytes_relayed.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of one session, for diagnostics and operator
/// extensions (e.g. stalled-session detection via `last_write_at`).
#[derive(Clone, Debug)]
pub struct SessionInfo {
    /// Client id.
    pub client: String,
    /// Worker generation number.
    pub epoch: u64,
    /// Lifecycle state at snapshot time.
    pub state: SessionState,
    /// Masked destination address.
    pub destination: String,
    /// When the session was created.
    pub created_at: SystemTime,
    /// When a chunk last reached the worker's input.
    pub last_write_at: SystemTime,
    /// Total bytes successfully handed to the worker.
    pub bytes_relayed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn starts_in_starting_state() {
        let s = Session::new("u1".into(), 1, "rtmp://x/abc***".into());
        assert_eq!(s.state().await, SessionState::Starting);
    }

    #[tokio::test]
    async fn terminated_stays_terminated() {
        let s = Session::new("u1".into(), 1, "rtmp://x/abc***".into());
        s.set_state(SessionState::Active).await;
        s.set_state(SessionState::Terminated).await;
        s.set_state(SessionState::Active).await;
        assert_eq!(s.state().await, SessionState::Terminated);
    }

    #[tokio::test]
    async fn snapshot_reflects_writes() {
        let s = Session::new("u1".into(), 2, "rtmp://x/abc***".into());
        s.record_write(1024).await;
        s.record_write(512).await;
        let info = s.snapshot().await;
        assert_eq!(info.bytes_relayed, 1536);
        assert_eq!(info.epoch, 2);
        assert_eq!(info.client, "u1");
    }
}
