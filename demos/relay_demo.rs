//! # Demo: relay_demo
//!
//! End-to-end tour of the supervisor API with a stand-in worker, so the
//! demo runs on any machine without ffmpeg or an RTMP endpoint.
//!
//! Shows how to:
//! - Build a [`Supervisor`] with a custom [`InvocationFactory`].
//! - Start sessions, forward chunks, inspect snapshots, stop sessions.
//! - Attach the built-in [`LogWriter`] subscriber.
//!
//! ## Flow
//! ```text
//! start_stream("alice", key) ──► spawn worker, Session{epoch=1}
//! forward_chunk(...)         ──► actor ──► worker stdin
//! start_stream("alice", key) ──► drain old worker, Session{epoch=2}
//! end_stream(...)            ──► EOF ──► exit observed ──► removed
//! ```
//!
//! For a real deployment, drop `.with_factory(...)`: the default
//! [`EncoderFactory`] launches ffmpeg and pushes to
//! `rtmp://a.rtmp.youtube.com/live2/<key>`.
//!
//! ## Run
//! ```bash
//! cargo run --example relay_demo
//! ```

use std::sync::Arc;
use std::time::Duration;

use streamvisor::{
    Config, Invocation, InvocationFactory, LogWriter, RelayError, StreamKey, Supervisor,
};

/// Stand-in for the encoder: consumes stdin and exits on EOF.
struct DrainFactory;

impl InvocationFactory for DrainFactory {
    fn build(&self, _client_id: &str, key: &StreamKey) -> Result<Invocation, RelayError> {
        if key.is_empty() {
            return Err(RelayError::MissingCredential);
        }
        Ok(Invocation::new("sh").args(["-c", "cat > /dev/null"]))
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

    let sup = Supervisor::builder(Config::default())
        .with_subscribers(vec![Arc::new(LogWriter)])
        .with_factory(Arc::new(DrainFactory))
        .build();

    let key = StreamKey::new("demo-stream-key");

    // two independent clients stream in parallel
    sup.start_stream("alice", &key).await?;
    sup.start_stream("bob", &key).await?;

    for i in 0..5u8 {
        sup.forward_chunk("alice", vec![i; 1024]).await?;
        sup.forward_chunk("bob", vec![i; 512]).await?;
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    for info in sup.sessions().await {
        println!(
            "session client={} epoch={} state={:?} bytes={} dest={}",
            info.client, info.epoch, info.state, info.bytes_relayed, info.destination
        );
    }

    // a second start for the same client replaces the worker
    sup.start_stream("alice", &key).await?;
    let alice = sup.session("alice").await.expect("alice is live");
    println!("alice restarted with epoch={}", alice.epoch);

    sup.end_stream("alice").await?;
    sup.end_stream("bob").await?;
    println!("remaining sessions: {}", sup.session_count().await);

    Ok(())
}
