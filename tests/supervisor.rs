//! Session lifecycle: start, chunk forwarding, replacement, and stop.

mod common;

use std::time::Duration;

use common::{ShellFactory, SinkFactory, wait_for, wait_for_kind};
use streamvisor::{Config, EventKind, RelayError, StreamKey, Supervisor};

const EVT: Duration = Duration::from_secs(5);

fn key() -> StreamKey {
    StreamKey::new("abcd-1234-efgh")
}

#[tokio::test]
async fn relays_chunks_to_worker_stdin_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let factory = SinkFactory::new(dir.path());
    let sup = Supervisor::builder(Config::default())
        .with_factory(factory.clone())
        .build();

    sup.start_stream("u1", &key()).await.unwrap();
    for part in ["one ", "two ", "three"] {
        sup.forward_chunk("u1", part.as_bytes().to_vec()).await.unwrap();
    }
    sup.end_stream("u1").await.unwrap();

    // end_stream joins the actor, which observed the worker's exit, so the
    // sink is fully flushed by now
    let written = std::fs::read_to_string(factory.sink_path(1)).unwrap();
    assert_eq!(written, "one two three");
    assert_eq!(sup.session_count().await, 0);
}

#[tokio::test]
async fn empty_key_is_rejected_without_creating_a_session() {
    let sup = Supervisor::builder(Config::default())
        .with_factory(ShellFactory::cat())
        .build();
    let mut rx = sup.subscribe();

    let err = sup.start_stream("u1", &StreamKey::new("")).await.unwrap_err();
    assert!(matches!(err, RelayError::MissingCredential));
    assert_eq!(sup.session_count().await, 0);

    let ev = wait_for_kind(&mut rx, EventKind::StreamStartFailed, EVT).await;
    assert_eq!(ev.reason.as_deref(), Some("missing_credential"));
}

#[tokio::test]
async fn empty_key_does_not_disturb_an_existing_session() {
    let dir = tempfile::tempdir().unwrap();
    let factory = SinkFactory::new(dir.path());
    let sup = Supervisor::builder(Config::default())
        .with_factory(factory.clone())
        .build();

    sup.start_stream("u1", &key()).await.unwrap();
    let before = sup.session("u1").await.unwrap();

    let err = sup.start_stream("u1", &StreamKey::new("")).await.unwrap_err();
    assert!(matches!(err, RelayError::MissingCredential));

    let after = sup.session("u1").await.unwrap();
    assert_eq!(after.epoch, before.epoch);

    sup.forward_chunk("u1", b"still alive".to_vec()).await.unwrap();
    sup.end_stream("u1").await.unwrap();
    assert_eq!(
        std::fs::read_to_string(factory.sink_path(1)).unwrap(),
        "still alive"
    );
}

#[tokio::test]
async fn spawn_failure_surfaces_and_creates_nothing() {
    let sup = Supervisor::builder(Config::default())
        .with_factory(ShellFactory::new("/nonexistent/encoder-binary", &[]))
        .build();
    let mut rx = sup.subscribe();

    let err = sup.start_stream("u1", &key()).await.unwrap_err();
    assert!(matches!(err, RelayError::Spawn { .. }));
    assert_eq!(sup.session_count().await, 0);

    let ev = wait_for_kind(&mut rx, EventKind::StreamStartFailed, EVT).await;
    assert_eq!(ev.reason.as_deref(), Some("spawn_failure"));
}

#[tokio::test]
async fn replacement_finishes_old_worker_before_starting_new() {
    let dir = tempfile::tempdir().unwrap();
    let factory = SinkFactory::new(dir.path());
    let sup = Supervisor::builder(Config::default())
        .with_factory(factory.clone())
        .build();
    let mut rx = sup.subscribe();

    sup.start_stream("u1", &key()).await.unwrap();
    let first = sup.session("u1").await.unwrap();
    sup.forward_chunk("u1", b"first".to_vec()).await.unwrap();

    // second start for the same client: the old session must be fully
    // drained (its bytes flushed, its worker gone) before the new spawn
    sup.start_stream("u1", &key()).await.unwrap();
    let second = sup.session("u1").await.unwrap();
    assert!(second.epoch > first.epoch);
    assert_eq!(sup.session_count().await, 1);

    let replaced = wait_for_kind(&mut rx, EventKind::SessionReplaced, EVT).await;
    assert_eq!(replaced.epoch, Some(first.epoch));

    sup.forward_chunk("u1", b"second".to_vec()).await.unwrap();
    sup.end_stream("u1").await.unwrap();

    assert_eq!(std::fs::read_to_string(factory.sink_path(1)).unwrap(), "first");
    assert_eq!(std::fs::read_to_string(factory.sink_path(2)).unwrap(), "second");
}

#[tokio::test]
async fn chunk_for_unknown_client_is_dropped_and_reported() {
    let sup = Supervisor::builder(Config::default())
        .with_factory(ShellFactory::cat())
        .build();
    let mut rx = sup.subscribe();

    let err = sup.forward_chunk("ghost", vec![0u8; 16]).await.unwrap_err();
    assert!(matches!(err, RelayError::SessionNotFound { .. }));
    assert!(err.is_session_gone());

    let ev = wait_for_kind(&mut rx, EventKind::ChunkDropped, EVT).await;
    assert_eq!(ev.reason.as_deref(), Some("session_not_found"));
    assert_eq!(ev.bytes, Some(16));
}

#[tokio::test]
async fn end_stream_for_unknown_client_errors() {
    let sup = Supervisor::builder(Config::default())
        .with_factory(ShellFactory::cat())
        .build();
    let err = sup.end_stream("ghost").await.unwrap_err();
    assert!(matches!(err, RelayError::SessionNotFound { .. }));
}

#[tokio::test]
async fn end_stream_is_not_idempotent_by_contract() {
    let sup = Supervisor::builder(Config::default())
        .with_factory(ShellFactory::cat())
        .build();

    sup.start_stream("u1", &key()).await.unwrap();
    sup.end_stream("u1").await.unwrap();
    assert!(matches!(
        sup.end_stream("u1").await,
        Err(RelayError::SessionNotFound { .. })
    ));
}

#[tokio::test]
async fn mailbox_overflow_reports_backpressure() {
    let cfg = Config {
        chunk_queue: 1,
        write_timeout: Duration::from_millis(500),
        ..Config::default()
    };
    // worker never reads stdin, so a large chunk parks the actor in its
    // bounded write while the mailbox fills behind it
    let sup = Supervisor::builder(cfg)
        .with_factory(ShellFactory::stubborn())
        .build();

    sup.start_stream("u1", &key()).await.unwrap();
    sup.forward_chunk("u1", vec![0u8; 4 * 1024 * 1024]).await.unwrap();

    let mut saw_backpressure = false;
    for _ in 0..100 {
        match sup.forward_chunk("u1", vec![1u8; 8]).await {
            Err(RelayError::Backpressure { .. }) => {
                saw_backpressure = true;
                break;
            }
            _ => continue,
        }
    }
    assert!(saw_backpressure, "mailbox never overflowed");

    sup.end_stream("u1").await.unwrap();
}

#[tokio::test]
async fn failed_write_drops_chunk_but_keeps_session() {
    let cfg = Config {
        write_timeout: Duration::from_millis(100),
        ..Config::default()
    };
    let sup = Supervisor::builder(cfg)
        .with_factory(ShellFactory::stubborn())
        .build();
    let mut rx = sup.subscribe();

    sup.start_stream("u1", &key()).await.unwrap();
    // larger than any pipe buffer; the bounded write must give up
    sup.forward_chunk("u1", vec![0u8; 4 * 1024 * 1024]).await.unwrap();

    let ev = wait_for(&mut rx, EVT, |ev| {
        ev.kind == EventKind::ChunkDropped && ev.reason.as_deref() == Some("write_timeout")
    })
    .await;
    assert_eq!(ev.client.as_deref(), Some("u1"));

    // the session survives the dropped chunk
    assert_eq!(sup.session_count().await, 1);
    sup.end_stream("u1").await.unwrap();
}

#[tokio::test]
async fn snapshots_mask_the_credential() {
    let sup = Supervisor::builder(Config::default())
        .with_factory(ShellFactory::cat())
        .build();

    sup.start_stream("u1", &StreamKey::new("super-secret-key")).await.unwrap();
    let info = sup.session("u1").await.unwrap();
    assert!(!info.destination.contains("secret"));
    assert!(info.destination.contains("sup***"));

    sup.end_stream("u1").await.unwrap();
}

#[tokio::test]
async fn snapshots_track_relayed_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let factory = SinkFactory::new(dir.path());
    let sup = Supervisor::builder(Config::default())
        .with_factory(factory)
        .build();

    sup.start_stream("u1", &key()).await.unwrap();
    sup.forward_chunk("u1", vec![0u8; 1024]).await.unwrap();
    sup.forward_chunk("u1", vec![0u8; 512]).await.unwrap();

    // writes happen on the actor, so wait until both are accounted for
    let deadline = tokio::time::Instant::now() + EVT;
    loop {
        let info = sup.session("u1").await.unwrap();
        if info.bytes_relayed == 1536 {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "bytes never accounted");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    sup.end_stream("u1").await.unwrap();
}

#[tokio::test]
async fn independent_clients_run_in_parallel() {
    let dir = tempfile::tempdir().unwrap();
    let factory = SinkFactory::new(dir.path());
    let sup = Supervisor::builder(Config::default())
        .with_factory(factory.clone())
        .build();

    sup.start_stream("u1", &key()).await.unwrap();
    sup.start_stream("u2", &key()).await.unwrap();
    assert_eq!(sup.active_clients().await, vec!["u1".to_string(), "u2".to_string()]);

    sup.forward_chunk("u1", b"alpha".to_vec()).await.unwrap();
    sup.forward_chunk("u2", b"beta".to_vec()).await.unwrap();

    // stopping one client leaves the other flowing
    sup.end_stream("u1").await.unwrap();
    sup.forward_chunk("u2", b"-more".to_vec()).await.unwrap();
    sup.end_stream("u2").await.unwrap();

    assert_eq!(std::fs::read_to_string(factory.sink_path(1)).unwrap(), "alpha");
    assert_eq!(std::fs::read_to_string(factory.sink_path(2)).unwrap(), "beta-more");
}

#[tokio::test]
async fn stream_started_event_carries_epoch() {
    let sup = Supervisor::builder(Config::default())
        .with_factory(ShellFactory::cat())
        .build();
    let mut rx = sup.subscribe();

    sup.start_stream("u1", &key()).await.unwrap();
    let ev = wait_for_kind(&mut rx, EventKind::StreamStarted, EVT).await;
    assert_eq!(ev.client.as_deref(), Some("u1"));
    assert!(ev.epoch.is_some());

    sup.end_stream("u1").await.unwrap();
}
