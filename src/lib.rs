//! # streamvisor
//!
//! **Streamvisor** is a per-client media relay supervisor for Rust.
//!
//! It supervises one encoder worker process per connected client: chunks of
//! browser-captured media arrive over some transport (WebSocket, HTTP,
//! anything that yields bytes), are piped into the worker's stdin, and the
//! worker pushes the re-encoded stream to an RTMP ingest endpoint. The crate
//! is transport-agnostic by design and intended as the process-supervision
//! core of a larger streaming server.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   client "u1"           client "u2"           client "u3"
//!   key / chunks / end    key / chunks / end    key / chunks / end
//!        ▼                     ▼                     ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Supervisor (runtime orchestrator)                                │
//! │  - Bus (broadcast events)                                         │
//! │  - per-client admission locks (serialize start/end per client)    │
//! │  - SessionRegistry (manages active sessions by client id)         │
//! │  - SubscriberSet (fans out to user subscribers)                   │
//! │  - InvocationFactory (worker argv; ffmpeg by default)             │
//! └──────┬──────────────────┬──────────────────┬───────────────┬──────┘
//!        ▼                  ▼                  ▼               │
//!   ┌──────────────┐   ┌──────────────┐   ┌──────────────┐     │
//!   │ SessionActor │   │ SessionActor │   │ SessionActor │     │
//!   │ (owns pipe)  │   │ (owns pipe)  │   │ (owns pipe)  │     │
//!   └┬─────────────┘   └┬─────────────┘   └┬─────────────┘     │
//!    │ stdin            │ stdin            │ stdin             │
//!    ▼                  ▼                  ▼                   │
//!   worker (ffmpeg)    worker            worker                │
//!    │                  │                  │                   │
//!    │ Publishes        │ Publishes        │ Publishes         │
//!    │ Events:          │ Events:          │ Events:           │
//!    │ - SessionDraining│ - ChunkDropped   │ - DrainTimeout    │
//!    │ - WorkerExited   │ - WorkerExited   │ - WorkerExited    │
//!    ▼                  ▼                  ▼                   ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                        Bus (broadcast channel)                    │
//! │                   (capacity: Config::bus_capacity)                │
//! └────────────────┬─────────────────────────────────┬────────────────┘
//!                  ▼                                 ▼
//!         registry listener                subscriber fan-out
//!       (unsolicited exits →              (per-sub bounded queues)
//!        epoch-checked removal)          ┌─────────┼─────────┐
//!                                        ▼         ▼         ▼
//!                                    LogWriter  metrics   custom...
//! ```
//!
//! ### Session lifecycle
//! ```text
//! start_stream(client, key)
//!   ├─► empty key ─► Err(MissingCredential), nothing touched
//!   ├─► existing session? ─► drain it, join its actor   (replacement)
//!   ├─► spawn worker (stdin piped, stdout/stderr drained)
//!   └─► Session{epoch} + SessionActor + registry insert ─► StreamStarted
//!
//! forward_chunk(client, bytes)
//!   ├─► no session        ─► Err(SessionNotFound), chunk dropped
//!   ├─► not writable      ─► Err(NotWritable),     chunk dropped
//!   ├─► mailbox full      ─► Err(Backpressure),    chunk dropped
//!   └─► actor: bounded write to worker stdin (FIFO per client)
//!
//! end_stream(client) / shutdown
//!   ├─► close worker stdin (EOF lets the encoder flush)
//!   ├─► wait up to `grace` ─► else DrainTimeout + force terminate
//!   └─► exit observed ─► Terminated ─► WorkerExited ─► SessionRemoved
//!
//! worker dies on its own
//!   └─► actor sees exit ─► WorkerExited("unsolicited")
//!         └─► registry listener removes the entry (epoch must match)
//! ```
//!
//! ## Features
//! | Area              | Description                                                         | Key types / traits                         |
//! |-------------------|---------------------------------------------------------------------|--------------------------------------------|
//! | **Supervision**   | One worker process per client, replace/drain/kill lifecycle.        | [`Supervisor`], [`SupervisorBuilder`]      |
//! | **Workers**       | Declarative worker launch, substitutable for tests.                 | [`Invocation`], [`InvocationFactory`]      |
//! | **Sessions**      | Per-client state machine and diagnostics snapshots.                 | [`SessionState`], [`SessionInfo`]          |
//! | **Subscriber API**| Hook into lifecycle events (logging, metrics, custom subscribers).  | [`Subscribe`], [`SubscriberSet`]           |
//! | **Errors**        | Typed errors for operations and the runtime.                        | [`RelayError`], [`RuntimeError`]           |
//! | **Configuration** | Centralized runtime settings with clamped accessors.                | [`Config`]                                 |
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use streamvisor::{Config, LogWriter, StreamKey, Supervisor};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let sup = Supervisor::builder(Config::default())
//!         .with_subscribers(vec![Arc::new(LogWriter::default())])
//!         .build();
//!
//!     // transport delivered a stream key for client "u1"
//!     sup.start_stream("u1", &StreamKey::new("abcd-1234")).await?;
//!
//!     // transport delivered a media chunk
//!     sup.forward_chunk("u1", vec![0x1a, 0x45, 0xdf, 0xa3]).await?;
//!
//!     // client is done
//!     sup.end_stream("u1").await?;
//!
//!     // or: block until SIGINT/SIGTERM and drain everything
//!     sup.run_until_shutdown().await?;
//!     Ok(())
//! }
//! ```
mod core;
mod error;
mod events;
mod session;
mod subscribers;
mod worker;

// ---- Public re-exports ----

pub use core::{Config, Supervisor, SupervisorBuilder};
pub use error::{RelayError, RuntimeError};
pub use events::{Bus, Event, EventKind};
pub use session::{SessionInfo, SessionState};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
pub use worker::{
    DEFAULT_FFMPEG_BIN, DEFAULT_RTMP_BASE, EncoderFactory, Invocation, InvocationFactory,
    PipeHandle, StreamKey, WorkerExit, WriteError,
};
