//! # Demo: graceful_shutdown
//!
//! Runs a few long-lived sessions and blocks until Ctrl-C / SIGTERM, then
//! drains every worker in parallel within the shutdown grace.
//!
//! Shows how to:
//! - Tune drain and shutdown grace in [`Config`].
//! - Use [`Supervisor::run_until_shutdown`] as the embedding server's
//!   terminal await point.
//! - Observe the drain through the event stream.
//!
//! ## Run
//! ```bash
//! cargo run --example graceful_shutdown
//! # then press Ctrl-C
//! ```

use std::sync::Arc;
use std::time::Duration;

use streamvisor::{
    Config, Invocation, InvocationFactory, LogWriter, RelayError, StreamKey, Supervisor,
};

/// Worker that keeps consuming stdin until EOF, then lingers briefly, as a
/// flushing encoder would.
struct SlowFlushFactory;

impl InvocationFactory for SlowFlushFactory {
    fn build(&self, _client_id: &str, key: &StreamKey) -> Result<Invocation, RelayError> {
        if key.is_empty() {
            return Err(RelayError::MissingCredential);
        }
        Ok(Invocation::new("sh").args(["-c", "cat > /dev/null; sleep 0.3"]))
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cfg = Config {
        grace: Duration::from_secs(1),
        shutdown_grace: Duration::from_secs(5),
        ..Config::default()
    };
    let sup = Supervisor::builder(cfg)
        .with_subscribers(vec![Arc::new(LogWriter)])
        .with_factory(Arc::new(SlowFlushFactory))
        .build();

    let key = StreamKey::new("demo-stream-key");
    for client in ["alice", "bob", "carol"] {
        sup.start_stream(client, &key).await?;
    }

    // keep the streams fed until a signal arrives
    let feeder = {
        let sup = Arc::clone(&sup);
        tokio::spawn(async move {
            loop {
                for client in ["alice", "bob", "carol"] {
                    // errors just mean the session is already draining
                    let _ = sup.forward_chunk(client, vec![0u8; 4096]).await;
                }
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        })
    };

    println!("streaming; press Ctrl-C to drain and exit");
    match sup.run_until_shutdown().await {
        Ok(()) => println!("all sessions stopped within grace"),
        Err(e) => println!("shutdown finished with error: {e}"),
    }
    feeder.abort();

    Ok(())
}
