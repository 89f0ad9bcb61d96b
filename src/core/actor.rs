//! # SessionActor: single-session worker supervision.
//!
//! One actor task per session owns that session's [`PipeHandle`] and
//! consumes an ordered command queue. This is the per-session serialization
//! point: chunk writes and lifecycle transitions for one client can never
//! interleave out of order, while different clients' actors run fully in
//! parallel.
//!
//! ## Event flow
//! ```text
//! loop {
//!   select! {
//!     worker exited      ─► Terminated, publish WorkerExited("unsolicited"), exit
//!     runtime cancelled  ─► drain()
//!     cmd = queue.recv() ─► Chunk(bytes)  ─► bounded write (drop-and-report on failure)
//!                           Drain / closed ─► drain()
//!   }
//! }
//!
//! drain():
//!   Draining, publish SessionDraining
//!   close worker input (EOF)
//!   wait exit ── or grace elapses ─► publish DrainTimeout, terminate, wait exit
//!   Terminated, publish WorkerExited("drained")
//! ```
//!
//! ## Rules
//! - The actor publishes **exactly one** `WorkerExited` per worker.
//! - A failed write never tears the session down; the chunk is dropped and
//!   a `ChunkDropped` event is published.
//! - The actor always awaits the worker's exit status before finishing, so
//!   process resources are reclaimed on every path.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::events::{Bus, Event, EventKind};
use crate::session::{Session, SessionState};
use crate::worker::{PipeHandle, WorkerExit, WriteError};

/// Exit reason attached to `WorkerExited` when the actor requested the stop.
pub(crate) const REASON_DRAINED: &str = "drained";
/// Exit reason attached to `WorkerExited` when the worker ended on its own.
pub(crate) const REASON_UNSOLICITED: &str = "unsolicited";

/// Commands consumed by a session actor, in FIFO order.
pub(crate) enum SessionCommand {
    /// Forward one chunk to the worker's input.
    Chunk(Vec<u8>),
    /// Graceful stop: close input, bounded wait, then force.
    Drain,
}

/// What the select loop decided to do next.
enum Step {
    Exited(WorkerExit),
    Drain,
    Chunk(Vec<u8>),
}

/// Supervises one worker process for one session.
pub(crate) struct SessionActor {
    client: Arc<str>,
    epoch: u64,
    pipe: PipeHandle,
    rx: mpsc::Receiver<SessionCommand>,
    bus: Bus,
    session: Arc<Session>,
    grace: Duration,
    write_timeout: Duration,
}

impl SessionActor {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        client: Arc<str>,
        epoch: u64,
        pipe: PipeHandle,
        rx: mpsc::Receiver<SessionCommand>,
        bus: Bus,
        session: Arc<Session>,
        grace: Duration,
        write_timeout: Duration,
    ) -> Self {
        Self {
            client,
            epoch,
            pipe,
            rx,
            bus,
            session,
            grace,
            write_timeout,
        }
    }

    /// Runs the actor until the worker exits (solicited or not).
    ///
    /// `cancel` is the runtime-wide stop propagated at shutdown; it maps to
    /// the same graceful drain as an explicit `Drain` command.
    pub(crate) async fn run(mut self, cancel: CancellationToken) {
        loop {
            let step = {
                let Self { pipe, rx, .. } = &mut self;
                tokio::select! {
                    exit = pipe.wait() => Step::Exited(exit),
                    _ = cancel.cancelled() => Step::Drain,
                    cmd = rx.recv() => match cmd {
                        Some(SessionCommand::Chunk(bytes)) => Step::Chunk(bytes),
                        Some(SessionCommand::Drain) | None => Step::Drain,
                    },
                }
            };

            match step {
                Step::Exited(exit) => {
                    self.session.set_state(SessionState::Terminated).await;
                    self.publish_exit(exit, REASON_UNSOLICITED);
                    return;
                }
                Step::Drain => {
                    self.drain().await;
                    return;
                }
                Step::Chunk(bytes) => self.write_chunk(&bytes).await,
            }
        }
    }

    /// Writes one chunk, bounded; failures drop the chunk, not the session.
    async fn write_chunk(&mut self, bytes: &[u8]) {
        match self.pipe.write(bytes, self.write_timeout).await {
            Ok(()) => self.session.record_write(bytes.len()).await,
            Err(e) => {
                let reason = match e {
                    WriteError::Closed => "not_writable",
                    WriteError::TimedOut(_) => "write_timeout",
                    WriteError::Io(_) => "io_error",
                };
                self.bus.publish(
                    Event::new(EventKind::ChunkDropped)
                        .with_client(Arc::clone(&self.client))
                        .with_epoch(self.epoch)
                        .with_reason(reason)
                        .with_bytes(bytes.len() as u64),
                );
            }
        }
    }

    /// Graceful stop: EOF, bounded wait, escalate, always observe the exit.
    async fn drain(mut self) {
        self.session.set_state(SessionState::Draining).await;
        self.bus.publish(
            Event::new(EventKind::SessionDraining)
                .with_client(Arc::clone(&self.client))
                .with_epoch(self.epoch),
        );

        self.pipe.close_input();

        let exit = tokio::select! {
            exit = self.pipe.wait() => exit,
            _ = time::sleep(self.grace) => {
                self.bus.publish(
                    Event::new(EventKind::DrainTimeout)
                        .with_client(Arc::clone(&self.client))
                        .with_epoch(self.epoch)
                        .with_timeout(self.grace),
                );
                self.pipe.terminate();
                self.pipe.wait().await
            }
        };

        self.session.set_state(SessionState::Terminated).await;
        self.publish_exit(exit, REASON_DRAINED);
    }

    fn publish_exit(&self, exit: WorkerExit, reason: &'static str) {
        let mut ev = Event::new(EventKind::WorkerExited)
            .with_client(Arc::clone(&self.client))
            .with_epoch(self.epoch)
            .with_reason(reason);
        if let Some(code) = exit.code {
            ev = ev.with_exit_code(code);
        }
        if let Some(signal) = exit.signal {
            ev = ev.with_signal(signal);
        }
        self.bus.publish(ev);
    }
}
