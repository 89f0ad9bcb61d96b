//! # Global runtime configuration.
//!
//! Provides [`Config`], centralized settings for the relay runtime.
//!
//! ## Field semantics
//! - `grace`: bounded wait after closing a worker's input before the
//!   termination signal is sent (per-session drain).
//! - `shutdown_grace`: bounded wait for **all** sessions during
//!   process-wide shutdown; sessions drain in parallel, so this is of the
//!   order of one `grace`, not sessions × `grace`.
//! - `write_timeout`: upper bound on how long one stdin write may block
//!   before it is treated as a write failure (backpressure).
//! - `chunk_queue`: per-session mailbox capacity (min 1; clamped). Overflow
//!   drops the chunk and reports backpressure.
//! - `bus_capacity`: event bus ring buffer size (min 1; clamped by `Bus`).
//! - `ffmpeg_bin` / `rtmp_base`: parameters of the default
//!   [`EncoderFactory`](crate::worker::EncoderFactory); ignored when a
//!   custom factory is injected.

use std::time::Duration;

use crate::worker::{DEFAULT_FFMPEG_BIN, DEFAULT_RTMP_BASE};

/// Global configuration for the relay runtime.
///
/// All fields are public for flexibility; prefer the clamped accessors to
/// avoid sprinkling sentinel checks across the codebase.
#[derive(Clone, Debug)]
pub struct Config {
    /// Drain grace: wait after closing worker input before force-terminating.
    pub grace: Duration,

    /// Maximum total wait for graceful process-wide shutdown.
    pub shutdown_grace: Duration,

    /// Upper bound for a single write to a worker's input.
    pub write_timeout: Duration,

    /// Per-session chunk mailbox capacity.
    pub chunk_queue: usize,

    /// Capacity of the event bus broadcast ring buffer.
    pub bus_capacity: usize,

    /// Encoder binary used by the default worker factory.
    pub ffmpeg_bin: String,

    /// Ingest prefix the destination credential is appended to.
    pub rtmp_base: String,
}

impl Config {
    /// Chunk mailbox capacity clamped to a minimum of 1.
    #[inline]
    pub fn chunk_queue_clamped(&self) -> usize {
        self.chunk_queue.max(1)
    }

    /// Bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// Defaults match the reference relay deployment: 500 ms drain grace,
    /// 5 s shutdown grace, 1 s write bound, 64-chunk mailbox.
    fn default() -> Self {
        Self {
            grace: Duration::from_millis(500),
            shutdown_grace: Duration::from_secs(5),
            write_timeout: Duration::from_secs(1),
            chunk_queue: 64,
            bus_capacity: 1024,
            ffmpeg_bin: DEFAULT_FFMPEG_BIN.to_string(),
            rtmp_base: DEFAULT_RTMP_BASE.to_string(),
        }
    }
}
