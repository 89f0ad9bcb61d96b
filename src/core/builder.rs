//! # SupervisorBuilder: assembly of the relay runtime.
//!
//! Wires together the event bus, the subscriber fan-out, the session
//! registry (and its cleanup listener), and the worker invocation factory,
//! then hands back an `Arc<Supervisor>` ready to accept streams.
//!
//! ```text
//! SupervisorBuilder::new(cfg)
//!     .with_subscribers(vec![Arc::new(LogWriter)])
//!     .build()
//!        │
//!        ├─ Bus (broadcast ring, capacity from cfg)
//!        ├─ SubscriberSet (one bounded queue + worker per subscriber)
//!        ├─ bus → subscriber fan-out task
//!        ├─ SessionRegistry + unsolicited-exit listener
//!        └─ InvocationFactory (default: EncoderFactory from cfg)
//! ```

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::core::config::Config;
use crate::core::registry::SessionRegistry;
use crate::core::supervisor::Supervisor;
use crate::events::Bus;
use crate::subscribers::{Subscribe, SubscriberSet};
use crate::worker::{EncoderFactory, InvocationFactory};

/// Builder for [`Supervisor`].
pub struct SupervisorBuilder {
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
    factory: Option<Arc<dyn InvocationFactory>>,
}

impl SupervisorBuilder {
    /// Starts a builder with the given configuration.
    #[must_use]
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            factory: None,
        }
    }

    /// Attaches event subscribers (replaces any previously attached set).
    #[must_use]
    pub fn with_subscribers(mut self, subs: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subs;
        self
    }

    /// Overrides the worker invocation factory.
    ///
    /// The default builds an ffmpeg pipeline from the configuration's
    /// `ffmpeg_bin` and `rtmp_base`; tests inject factories that spawn
    /// plain shell workers instead.
    #[must_use]
    pub fn with_factory(mut self, factory: Arc<dyn InvocationFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Assembles the runtime and spawns its background listeners.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn build(self) -> Arc<Supervisor> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let runtime_token = CancellationToken::new();

        let subs = Arc::new(SubscriberSet::new(self.subscribers, bus.clone()));
        spawn_fanout(&bus, Arc::clone(&subs));

        let registry = SessionRegistry::new(bus.clone(), runtime_token.clone());
        Arc::clone(&registry).spawn_listener();

        let factory = self
            .factory
            .unwrap_or_else(|| Arc::new(EncoderFactory::new(&self.cfg.ffmpeg_bin, &self.cfg.rtmp_base)));

        Arc::new(Supervisor::new_internal(
            self.cfg,
            bus,
            subs,
            registry,
            factory,
            runtime_token,
        ))
    }
}

/// Forwards every bus event into the subscriber fan-out.
///
/// Runs until the bus closes (all publishers dropped), so shutdown events
/// still reach subscribers after the runtime token is cancelled.
fn spawn_fanout(bus: &Bus, subs: Arc<SubscriberSet>) {
    if subs.is_empty() {
        return;
    }
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(ev) => subs.emit_arc(Arc::new(ev)),
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "subscriber fan-out lagged");
                    continue;
                }
            }
        }
    });
}
