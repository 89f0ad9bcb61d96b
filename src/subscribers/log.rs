//! # Logging subscriber backed by `tracing`.
//!
//! [`LogWriter`] emits one structured `tracing` record per event. Attach it
//! when building the supervisor to get a readable session lifecycle log:
//!
//! ```text
//! INFO stream started client=u1 epoch=1
//! WARN chunk dropped client=u1 reason=backpressure bytes=65536
//! INFO worker exited client=u1 epoch=1 code=0 reason=drained
//! ```
//!
//! Chunk-level success is intentionally not logged here (too chatty for a
//! relay); the data path logs at `debug` inside the pipe itself.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::events::{Event, EventKind};

use super::Subscribe;

/// Subscriber that forwards runtime events to `tracing`.
#[derive(Default)]
pub struct LogWriter;

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let client = e.client.as_deref().unwrap_or("-");
        match e.kind {
            EventKind::StreamStarted => {
                info!(client, epoch = e.epoch, "stream started");
            }
            EventKind::StreamStartFailed => {
                warn!(client, reason = e.reason.as_deref(), "stream start failed");
            }
            EventKind::SessionReplaced => {
                info!(client, epoch = e.epoch, "replacing live session");
            }
            EventKind::SessionDraining => {
                info!(client, epoch = e.epoch, "session draining");
            }
            EventKind::DrainTimeout => {
                warn!(
                    client,
                    epoch = e.epoch,
                    timeout_ms = e.timeout_ms,
                    "drain grace elapsed; forcing termination"
                );
            }
            EventKind::WorkerExited => {
                info!(
                    client,
                    epoch = e.epoch,
                    code = e.exit_code,
                    signal = e.signal,
                    reason = e.reason.as_deref(),
                    "worker exited"
                );
            }
            EventKind::SessionRemoved => {
                info!(client, epoch = e.epoch, "session removed");
            }
            EventKind::ChunkDropped => {
                warn!(
                    client,
                    reason = e.reason.as_deref(),
                    bytes = e.bytes,
                    "chunk dropped"
                );
            }
            EventKind::ShutdownRequested => {
                info!("shutdown requested");
            }
            EventKind::AllStoppedWithin => {
                info!("all sessions stopped within grace");
            }
            EventKind::GraceExceeded => {
                warn!("shutdown grace exceeded");
            }
            EventKind::SubscriberPanicked | EventKind::SubscriberOverflow => {
                warn!(
                    subscriber = client,
                    reason = e.reason.as_deref(),
                    "subscriber fault"
                );
            }
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}
