//! # Supervisor: orchestrates session lifecycle, chunk routing, and shutdown.
//!
//! The [`Supervisor`] is the transport-agnostic surface the event channel
//! and control collaborators call into. It owns the event bus, the
//! [`SessionRegistry`], the worker [`InvocationFactory`], and the global
//! runtime configuration.
//!
//! ## High-level architecture
//! ```text
//! transport events                 control surface            OS signal
//!  start/chunk/end                  DELETE /sessions/{id}         │
//!        │                                  │                     ▼
//!        ▼                                  ▼             run_until_shutdown()
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │ Supervisor                                                          │
//! │  - per-client admission locks (serialize start/end per client)      │
//! │  - SessionRegistry (client → handle)                                │
//! │  - InvocationFactory (worker argv)                                  │
//! │  - Bus + SubscriberSet (observability fan-out)                      │
//! └──────┬──────────────────────────────┬───────────────────────────────┘
//!        ▼                              ▼
//!   SessionActor("u1")            SessionActor("u2")     ... (parallel)
//!        │ owns PipeHandle              │ owns PipeHandle
//!        ▼                              ▼
//!    worker process                 worker process
//! ```
//!
//! ## Ordering guarantees
//! For one client id, control operations (`start_stream`, `end_stream`)
//! are serialized by a per-client async lock, and chunks flow through the
//! session actor's FIFO mailbox; transport-order is therefore apply-order.
//! Operations for different client ids proceed fully in parallel.
//!
//! ## Replacement protocol
//! `start_stream` for a client that already has a live session first drives
//! the old session to `Terminated` — drain, bounded grace, forced kill —
//! and **joins the old actor** (which always observes the worker's exit)
//! before spawning the new worker. Two workers can never push to the same
//! destination concurrently.
//!
//! ## Shutdown path
//! ```text
//! run_until_shutdown()
//!    └─► wait_for_shutdown_signal()
//!          └─► publish(ShutdownRequested)
//!          └─► shutdown_all():
//!                 runtime_token.cancel()  → every actor drains in parallel
//!                 join all actors within shutdown_grace:
//!                    ├─ Ok      → publish AllStoppedWithin
//!                    └─ Timeout → publish GraceExceeded, Err with stuck ids
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex as StdMutex;

use tokio::sync::{Mutex, broadcast, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::core::actor::{SessionActor, SessionCommand};
use crate::core::config::Config;
use crate::core::registry::{SessionHandle, SessionRegistry};
use crate::core::shutdown;
use crate::error::{RelayError, RuntimeError};
use crate::events::{Bus, Event, EventKind};
use crate::session::{Session, SessionInfo, SessionState};
use crate::subscribers::SubscriberSet;
use crate::worker::{InvocationFactory, PipeHandle, StreamKey};

use super::builder::SupervisorBuilder;

/// Coordinates session actors, worker processes, and graceful shutdown.
pub struct Supervisor {
    cfg: Config,
    bus: Bus,
    subs: Arc<SubscriberSet>,
    registry: Arc<SessionRegistry>,
    factory: Arc<dyn InvocationFactory>,
    runtime_token: CancellationToken,
    /// Worker generation counter; every spawned worker gets a fresh epoch.
    epoch: AtomicU64,
    /// Per-client admission locks serializing start/end for one client.
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Supervisor {
    /// Starts building a supervisor with the given configuration.
    pub fn builder(cfg: Config) -> SupervisorBuilder {
        SupervisorBuilder::new(cfg)
    }

    pub(crate) fn new_internal(
        cfg: Config,
        bus: Bus,
        subs: Arc<SubscriberSet>,
        registry: Arc<SessionRegistry>,
        factory: Arc<dyn InvocationFactory>,
        runtime_token: CancellationToken,
    ) -> Self {
        Self {
            cfg,
            bus,
            subs,
            registry,
            factory,
            runtime_token,
            epoch: AtomicU64::new(1),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Starts (or replaces) the stream for `client_id`, pushing to the
    /// destination identified by `key`.
    ///
    /// Applies the replacement protocol: an existing live session for the
    /// same client is fully terminated — its worker's exit observed —
    /// before the new worker is spawned.
    ///
    /// # Errors
    /// [`RelayError::MissingCredential`] when `key` is empty,
    /// [`RelayError::Spawn`] when the worker could not be started, and
    /// [`RelayError::ShuttingDown`] once process-wide shutdown has begun;
    /// in all cases no session is created (an existing session may already
    /// have been removed by the replacement protocol).
    pub async fn start_stream(&self, client_id: &str, key: &StreamKey) -> Result<(), RelayError> {
        let lock = self.admission_lock(client_id).await;
        let _guard = lock.lock().await;

        let result = self.start_stream_locked(client_id, key).await;
        if let Err(e) = &result {
            self.bus.publish(
                Event::new(EventKind::StreamStartFailed)
                    .with_client(client_id.to_string())
                    .with_reason(e.as_label()),
            );
        }

        drop(_guard);
        drop(lock);
        self.prune_admission_lock(client_id).await;
        result
    }

    async fn start_stream_locked(&self, client_id: &str, key: &StreamKey) -> Result<(), RelayError> {
        // once shutdown begins, new workers would be cancelled on arrival and
        // their terminal events ignored; reject instead of spawning
        if self.runtime_token.is_cancelled() {
            return Err(RelayError::ShuttingDown);
        }
        // reject before touching any existing session
        if key.is_empty() {
            return Err(RelayError::MissingCredential);
        }
        let invocation = self.factory.build(client_id, key)?;

        if let Some(handle) = self.registry.take(client_id).await {
            self.bus.publish(
                Event::new(EventKind::SessionReplaced)
                    .with_client(client_id.to_string())
                    .with_epoch(handle.session.epoch()),
            );
            Self::stop_handle(handle, &self.bus).await;
        }

        let epoch = self.epoch.fetch_add(1, Ordering::Relaxed);
        let client: Arc<str> = Arc::from(client_id);
        let pipe = PipeHandle::spawn(&invocation, Arc::clone(&client))?;

        let session = Session::new(Arc::clone(&client), epoch, key.masked());
        session.set_state(SessionState::Active).await;

        let (tx, rx) = mpsc::channel(self.cfg.chunk_queue_clamped());
        let actor = SessionActor::new(
            Arc::clone(&client),
            epoch,
            pipe,
            rx,
            self.bus.clone(),
            Arc::clone(&session),
            self.cfg.grace,
            self.cfg.write_timeout,
        );
        let join = tokio::spawn(actor.run(self.runtime_token.child_token()));

        let displaced = self
            .registry
            .insert(SessionHandle { session, tx, join })
            .await;
        debug_assert!(displaced.is_none(), "admission lock prevents displacement");

        self.bus.publish(
            Event::new(EventKind::StreamStarted)
                .with_client(client)
                .with_epoch(epoch),
        );
        Ok(())
    }

    /// Forwards one chunk of stream data to `client_id`'s worker.
    ///
    /// Fire-and-forget semantics at the call site: on any failure the chunk
    /// is dropped, the condition is published for logging, and the session
    /// (if any) is left untouched. Callers should log the error and keep
    /// the connection open.
    pub async fn forward_chunk(&self, client_id: &str, bytes: Vec<u8>) -> Result<(), RelayError> {
        let len = bytes.len() as u64;

        let Some((tx, session)) = self.registry.route(client_id).await else {
            self.publish_drop(client_id, "session_not_found", len);
            return Err(RelayError::SessionNotFound {
                client: client_id.to_string(),
            });
        };

        if !session.state().await.is_writable() {
            self.publish_drop(client_id, "not_writable", len);
            return Err(RelayError::NotWritable {
                client: client_id.to_string(),
            });
        }

        match tx.try_send(SessionCommand::Chunk(bytes)) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.publish_drop(client_id, "backpressure", len);
                Err(RelayError::Backpressure {
                    client: client_id.to_string(),
                })
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.publish_drop(client_id, "not_writable", len);
                Err(RelayError::NotWritable {
                    client: client_id.to_string(),
                })
            }
        }
    }

    /// Gracefully stops the stream for `client_id` and removes its session.
    ///
    /// Used for the transport's end-stream and connection-closed events and
    /// for the out-of-band control surface (`DELETE /sessions/{id}`).
    ///
    /// # Errors
    /// [`RelayError::SessionNotFound`] when no live session exists; no
    /// state is mutated in that case.
    pub async fn end_stream(&self, client_id: &str) -> Result<(), RelayError> {
        let lock = self.admission_lock(client_id).await;
        let guard = lock.lock().await;

        let Some(handle) = self.registry.take(client_id).await else {
            drop(guard);
            drop(lock);
            self.prune_admission_lock(client_id).await;
            return Err(RelayError::SessionNotFound {
                client: client_id.to_string(),
            });
        };

        Self::stop_handle(handle, &self.bus).await;

        drop(guard);
        drop(lock);
        self.prune_admission_lock(client_id).await;
        Ok(())
    }

    /// Drains every session concurrently and waits up to
    /// [`Config::shutdown_grace`] for all workers to stop.
    ///
    /// Cancels the runtime token first, so all actors begin draining in
    /// parallel; total time is of the order of one drain grace, not
    /// sessions × grace. The supervisor accepts no new sessions afterwards.
    ///
    /// # Errors
    /// [`RuntimeError::GraceExceeded`] listing the client ids still
    /// stopping when the grace ran out (their workers have `kill_on_drop`
    /// as last-resort reclamation).
    pub async fn shutdown_all(&self) -> Result<(), RuntimeError> {
        let handles = self.registry.drain_handles().await;
        self.runtime_token.cancel();

        let pending: Arc<StdMutex<HashSet<String>>> = Arc::new(StdMutex::new(
            handles.iter().map(|h| h.session.client().to_string()).collect(),
        ));

        let mut set = JoinSet::new();
        for handle in handles {
            let bus = self.bus.clone();
            let pending = Arc::clone(&pending);
            let client = handle.session.client().to_string();
            set.spawn(async move {
                Self::stop_handle(handle, &bus).await;
                if let Ok(mut p) = pending.lock() {
                    p.remove(&client);
                }
            });
        }

        let all_done = async { while set.join_next().await.is_some() {} };
        match tokio::time::timeout(self.cfg.shutdown_grace, all_done).await {
            Ok(()) => {
                self.bus.publish(Event::new(EventKind::AllStoppedWithin));
                Ok(())
            }
            Err(_elapsed) => {
                self.bus.publish(Event::new(EventKind::GraceExceeded));
                let stuck = pending
                    .lock()
                    .map(|p| {
                        let mut v: Vec<String> = p.iter().cloned().collect();
                        v.sort_unstable();
                        v
                    })
                    .unwrap_or_default();
                Err(RuntimeError::GraceExceeded {
                    grace: self.cfg.shutdown_grace,
                    stuck,
                })
            }
        }
    }

    /// Blocks until a termination signal arrives, then drains everything.
    ///
    /// Returns after all sessions have been asked to stop, so the embedding
    /// server can close its listening transport afterwards.
    ///
    /// # Errors
    /// [`RuntimeError::SignalHandler`] when the OS signal listeners could
    /// not be registered; no session is touched in that case.
    pub async fn run_until_shutdown(&self) -> Result<(), RuntimeError> {
        shutdown::wait_for_shutdown_signal()
            .await
            .map_err(|source| RuntimeError::SignalHandler { source })?;
        self.bus.publish(Event::new(EventKind::ShutdownRequested));
        self.shutdown_all().await
    }

    /// Sorted list of client ids with a live session.
    pub async fn active_clients(&self) -> Vec<String> {
        self.registry.list().await
    }

    /// Number of live sessions.
    pub async fn session_count(&self) -> usize {
        self.registry.len().await
    }

    /// Point-in-time snapshots of every live session.
    pub async fn sessions(&self) -> Vec<SessionInfo> {
        self.registry.snapshot().await
    }

    /// Snapshot of one session, if live.
    pub async fn session(&self, client_id: &str) -> Option<SessionInfo> {
        self.registry.snapshot_one(client_id).await
    }

    /// Subscribes to the runtime event stream (diagnostics, tests).
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Number of attached subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subs.len()
    }

    /// Asks one session to stop and waits for its actor to finish.
    ///
    /// The actor escalates on its own (drain grace, then kill) and always
    /// observes the worker's exit, so the join is bounded. Publishes the
    /// removal once the actor is gone.
    async fn stop_handle(handle: SessionHandle, bus: &Bus) {
        let client = handle.session.client().to_string();
        let epoch = handle.session.epoch();

        // if the actor already finished (unsolicited exit), this just fails
        // and the join below returns immediately
        let _ = handle.tx.send(SessionCommand::Drain).await;

        if handle.join.await.is_err() {
            tracing::warn!(client, epoch, "session actor panicked");
        }
        bus.publish(
            Event::new(EventKind::SessionRemoved)
                .with_client(client)
                .with_epoch(epoch),
        );
    }

    /// Lock serializing control operations for one client id.
    async fn admission_lock(&self, client_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        Arc::clone(locks.entry(client_id.to_string()).or_default())
    }

    /// Drops the admission lock entry once nobody holds it.
    async fn prune_admission_lock(&self, client_id: &str) {
        let mut locks = self.locks.lock().await;
        if let Some(l) = locks.get(client_id) {
            // 1 = only the map's reference; no holder and no waiter left
            if Arc::strong_count(l) == 1 {
                locks.remove(client_id);
            }
        }
    }

    fn publish_drop(&self, client_id: &str, reason: &'static str, bytes: u64) {
        self.bus.publish(
            Event::new(EventKind::ChunkDropped)
                .with_client(client_id.to_string())
                .with_reason(reason)
                .with_bytes(bytes),
        );
    }
}
