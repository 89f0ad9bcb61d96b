//! Shared helpers for integration tests.
//!
//! Tests never spawn a real encoder: injected factories run small shell
//! workers (`cat`, `sleep`) so behavior is deterministic and fast.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time;

use streamvisor::{Event, EventKind, Invocation, InvocationFactory, RelayError, StreamKey};

/// Factory that launches a fixed shell command for every session.
pub struct ShellFactory {
    program: String,
    args: Vec<String>,
}

impl ShellFactory {
    pub fn new(program: &str, args: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        })
    }

    /// A worker running `sh -c <script>`.
    pub fn script(script: &str) -> Arc<Self> {
        Self::new("sh", &["-c", script])
    }

    /// A worker that consumes stdin and exits on EOF.
    pub fn cat() -> Arc<Self> {
        Self::script("cat > /dev/null")
    }

    /// A worker that ignores stdin and never exits on its own.
    pub fn stubborn() -> Arc<Self> {
        Self::new("sleep", &["30"])
    }
}

impl InvocationFactory for ShellFactory {
    fn build(&self, _client_id: &str, key: &StreamKey) -> Result<Invocation, RelayError> {
        if key.is_empty() {
            return Err(RelayError::MissingCredential);
        }
        Ok(Invocation::new(&self.program).args(self.args.iter().cloned()))
    }
}

/// Factory that pipes each worker's stdin into a fresh numbered file, so
/// tests can assert exactly which bytes reached which worker generation.
pub struct SinkFactory {
    dir: PathBuf,
    counter: AtomicU64,
}

impl SinkFactory {
    pub fn new(dir: &Path) -> Arc<Self> {
        Arc::new(Self {
            dir: dir.to_path_buf(),
            counter: AtomicU64::new(0),
        })
    }

    /// Path of the n-th spawned worker's sink (1-based).
    pub fn sink_path(&self, n: u64) -> PathBuf {
        self.dir.join(format!("sink-{n}"))
    }
}

impl InvocationFactory for SinkFactory {
    fn build(&self, _client_id: &str, key: &StreamKey) -> Result<Invocation, RelayError> {
        if key.is_empty() {
            return Err(RelayError::MissingCredential);
        }
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        let path = self.sink_path(n);
        Ok(Invocation::new("sh")
            .arg("-c")
            .arg(format!("cat > '{}'", path.display())))
    }
}

/// Waits until an event matching `pred` arrives, or panics after `timeout`.
pub async fn wait_for(
    rx: &mut broadcast::Receiver<Event>,
    timeout: Duration,
    pred: impl Fn(&Event) -> bool,
) -> Event {
    time::timeout(timeout, async {
        loop {
            match rx.recv().await {
                Ok(ev) if pred(&ev) => return ev,
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("event bus closed"),
            }
        }
    })
    .await
    .expect("event not observed in time")
}

/// Waits for the next event of `kind`.
pub async fn wait_for_kind(
    rx: &mut broadcast::Receiver<Event>,
    kind: EventKind,
    timeout: Duration,
) -> Event {
    wait_for(rx, timeout, |ev| ev.kind == kind).await
}
