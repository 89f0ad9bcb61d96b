//! # Session registry: the single source of truth for active workers.
//!
//! Concurrency-safe mapping from client id to the live session's handle
//! (actor mailbox, actor join handle). Every mutation is
//! atomic with respect to concurrent lookups from the chunk-forwarding
//! path; unrelated clients are never serialized against each other beyond
//! the brief map access.
//!
//! ## Cleanup
//! Solicited stops (end-stream, replacement, shutdown) take the handle out
//! of the map up front, so the registry listener only has to deal with
//! **unsolicited** worker exits:
//!
//! ```text
//! Bus ──► SessionRegistry listener
//!           └─► WorkerExited{reason: "unsolicited", client, epoch}
//!                  └─► discard(client, epoch) → join actor → SessionRemoved
//! ```
//!
//! ## Rules
//! - The registry owns the session handles (mailbox sender, actor join).
//! - `discard` removes an entry only when the epoch matches, so a late exit
//!   event for a replaced worker can never evict its successor.
//! - All operations are idempotent; discarding an absent entry is a no-op.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::actor::{REASON_UNSOLICITED, SessionCommand};
use crate::events::{Bus, Event, EventKind};
use crate::session::{Session, SessionInfo};

/// Handle to a running session actor.
///
/// Targeted stops go through the mailbox (`Drain`); the actor's runtime
/// child token is owned by the actor task itself.
pub(crate) struct SessionHandle {
    /// Shared session record (state machine, timestamps).
    pub(crate) session: Arc<Session>,
    /// Ordered command mailbox consumed by the actor.
    pub(crate) tx: mpsc::Sender<SessionCommand>,
    /// Join handle for the actor's execution.
    pub(crate) join: JoinHandle<()>,
}

impl SessionHandle {
    fn client(&self) -> &str {
        self.session.client()
    }
}

/// Concurrency-safe registry of active sessions.
pub(crate) struct SessionRegistry {
    sessions: RwLock<HashMap<String, SessionHandle>>,
    bus: Bus,
    runtime_token: CancellationToken,
}

impl SessionRegistry {
    /// Creates a new registry.
    pub(crate) fn new(bus: Bus, runtime_token: CancellationToken) -> Arc<Self> {
        Arc::new(Self {
            sessions: RwLock::new(HashMap::new()),
            bus,
            runtime_token,
        })
    }

    /// Spawns the cleanup listener for unsolicited worker exits.
    ///
    /// Call once during supervisor construction.
    pub(crate) fn spawn_listener(self: Arc<Self>) {
        let mut rx = self.bus.subscribe();
        let rt = self.runtime_token.clone();
        let me = self;

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = rt.cancelled() => break,
                    msg = rx.recv() => match msg {
                        Ok(ev) => me.handle_event(&ev).await,
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            tracing::warn!(skipped = n, "registry listener lagged");
                            continue;
                        }
                    }
                }
            }
        });
    }

    async fn handle_event(&self, ev: &Event) {
        if ev.kind == EventKind::WorkerExited && ev.reason.as_deref() == Some(REASON_UNSOLICITED) {
            if let (Some(client), Some(epoch)) = (ev.client.as_deref(), ev.epoch) {
                self.discard(client, epoch).await;
            }
        }
    }

    /// Inserts a handle; returns the displaced handle if the slot was
    /// occupied (cannot happen under the supervisor's per-client lock).
    pub(crate) async fn insert(&self, handle: SessionHandle) -> Option<SessionHandle> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(handle.client().to_string(), handle)
    }

    /// Atomically removes and returns the handle for `client`.
    pub(crate) async fn take(&self, client: &str) -> Option<SessionHandle> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(client)
    }

    /// Mailbox sender and session record for `client`, if live.
    pub(crate) async fn route(&self, client: &str) -> Option<(mpsc::Sender<SessionCommand>, Arc<Session>)> {
        let sessions = self.sessions.read().await;
        sessions
            .get(client)
            .map(|h| (h.tx.clone(), Arc::clone(&h.session)))
    }

    /// Removes every handle at once (process-wide shutdown).
    pub(crate) async fn drain_handles(&self) -> Vec<SessionHandle> {
        let mut sessions = self.sessions.write().await;
        sessions.drain().map(|(_, h)| h).collect()
    }

    /// Sorted list of active client ids.
    pub(crate) async fn list(&self) -> Vec<String> {
        let sessions = self.sessions.read().await;
        let mut names: Vec<String> = sessions.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Number of active sessions.
    pub(crate) async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Point-in-time snapshots of every active session.
    pub(crate) async fn snapshot(&self) -> Vec<SessionInfo> {
        let records: Vec<Arc<Session>> = {
            let sessions = self.sessions.read().await;
            sessions.values().map(|h| Arc::clone(&h.session)).collect()
        };
        let mut infos = Vec::with_capacity(records.len());
        for s in records {
            infos.push(s.snapshot().await);
        }
        infos
    }

    /// Snapshot for one client, if a session is live.
    pub(crate) async fn snapshot_one(&self, client: &str) -> Option<SessionInfo> {
        let session = {
            let sessions = self.sessions.read().await;
            sessions.get(client).map(|h| Arc::clone(&h.session))
        };
        match session {
            Some(s) => Some(s.snapshot().await),
            None => None,
        }
    }

    /// Removes the entry for `client` if its epoch matches, joins the
    /// finished actor, and reports the removal.
    async fn discard(&self, client: &str, epoch: u64) {
        let handle = {
            let mut sessions = self.sessions.write().await;
            match sessions.get(client) {
                Some(h) if h.session.epoch() == epoch => sessions.remove(client),
                _ => None,
            }
        };

        if let Some(handle) = handle {
            // actor already finished (it published the exit); reap its task
            if handle.join.await.is_err() {
                tracing::warn!(client, epoch, "session actor panicked");
            }
            self.bus.publish(
                Event::new(EventKind::SessionRemoved)
                    .with_client(client.to_string())
                    .with_epoch(epoch),
            );
        }
    }
}
