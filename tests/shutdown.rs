//! Drain, forced termination, unsolicited exits, and process-wide shutdown.

mod common;

use std::time::{Duration, Instant};

use common::{ShellFactory, wait_for, wait_for_kind};
use streamvisor::{Config, EventKind, RelayError, RuntimeError, StreamKey, Supervisor};

const EVT: Duration = Duration::from_secs(5);

fn key() -> StreamKey {
    StreamKey::new("abcd-1234-efgh")
}

#[tokio::test]
async fn graceful_drain_lets_worker_exit_on_eof() {
    let sup = Supervisor::builder(Config::default())
        .with_factory(ShellFactory::cat())
        .build();
    let mut rx = sup.subscribe();

    sup.start_stream("u1", &key()).await.unwrap();
    sup.end_stream("u1").await.unwrap();

    let ev = wait_for(&mut rx, EVT, |ev| {
        ev.kind == EventKind::WorkerExited && ev.reason.as_deref() == Some("drained")
    })
    .await;
    // cat exits 0 on EOF, so no forced kill
    assert_eq!(ev.exit_code, Some(0));
    assert_eq!(ev.signal, None);

    wait_for_kind(&mut rx, EventKind::SessionRemoved, EVT).await;
    assert_eq!(sup.session_count().await, 0);
}

#[tokio::test]
async fn stubborn_worker_is_killed_after_drain_grace() {
    let cfg = Config {
        grace: Duration::from_millis(150),
        ..Config::default()
    };
    let sup = Supervisor::builder(cfg)
        .with_factory(ShellFactory::stubborn())
        .build();
    let mut rx = sup.subscribe();

    sup.start_stream("u1", &key()).await.unwrap();

    let started = Instant::now();
    sup.end_stream("u1").await.unwrap();
    // bounded: one grace plus the kill, nowhere near the worker's 30s sleep
    assert!(started.elapsed() < Duration::from_secs(5));

    let timeout_ev = wait_for_kind(&mut rx, EventKind::DrainTimeout, EVT).await;
    assert_eq!(timeout_ev.timeout_ms, Some(150));

    let exit = wait_for_kind(&mut rx, EventKind::WorkerExited, EVT).await;
    assert_eq!(exit.reason.as_deref(), Some("drained"));
    #[cfg(unix)]
    assert!(exit.signal.is_some(), "kill should show as a signal exit");
}

#[tokio::test]
async fn unsolicited_exit_removes_the_session() {
    // worker exits immediately without reading stdin
    let sup = Supervisor::builder(Config::default())
        .with_factory(ShellFactory::new("true", &[]))
        .build();
    let mut rx = sup.subscribe();

    sup.start_stream("u1", &key()).await.unwrap();

    let exit = wait_for(&mut rx, EVT, |ev| {
        ev.kind == EventKind::WorkerExited && ev.reason.as_deref() == Some("unsolicited")
    })
    .await;
    assert_eq!(exit.client.as_deref(), Some("u1"));

    wait_for_kind(&mut rx, EventKind::SessionRemoved, EVT).await;
    assert_eq!(sup.session_count().await, 0);
}

#[tokio::test]
async fn shutdown_drains_all_sessions_in_parallel() {
    // each worker takes ~200ms after EOF; ten sequential drains would
    // need ~2s
    let sup = Supervisor::builder(Config::default())
        .with_factory(ShellFactory::script("cat > /dev/null; sleep 0.2"))
        .build();
    let mut rx = sup.subscribe();

    for i in 0..10 {
        sup.start_stream(&format!("u{i}"), &key()).await.unwrap();
    }
    assert_eq!(sup.session_count().await, 10);

    let started = Instant::now();
    sup.shutdown_all().await.unwrap();
    assert!(
        started.elapsed() < Duration::from_millis(1000),
        "sessions drained sequentially: {:?}",
        started.elapsed()
    );
    assert_eq!(sup.session_count().await, 0);

    wait_for_kind(&mut rx, EventKind::AllStoppedWithin, EVT).await;
}

#[tokio::test]
async fn shutdown_reports_sessions_that_overran_the_grace() {
    let cfg = Config {
        // drain grace longer than the shutdown budget, so the stubborn
        // worker cannot be reclaimed in time
        grace: Duration::from_secs(30),
        shutdown_grace: Duration::from_millis(200),
        ..Config::default()
    };
    let sup = Supervisor::builder(cfg)
        .with_factory(ShellFactory::stubborn())
        .build();
    let mut rx = sup.subscribe();

    sup.start_stream("u1", &key()).await.unwrap();

    let err = sup.shutdown_all().await.unwrap_err();
    let RuntimeError::GraceExceeded { grace, stuck } = err else {
        panic!("expected GraceExceeded");
    };
    assert_eq!(grace, Duration::from_millis(200));
    assert_eq!(stuck, vec!["u1".to_string()]);

    wait_for_kind(&mut rx, EventKind::GraceExceeded, EVT).await;
}

#[tokio::test]
async fn start_after_shutdown_is_rejected_and_leaves_no_entry() {
    let sup = Supervisor::builder(Config::default())
        .with_factory(ShellFactory::cat())
        .build();
    let mut rx = sup.subscribe();

    sup.start_stream("u1", &key()).await.unwrap();
    sup.shutdown_all().await.unwrap();

    // no worker is spawned once the runtime is stopping; a spawned worker
    // would be cancelled on arrival and its dead session would linger in
    // the registry
    let err = sup.start_stream("u1", &key()).await.unwrap_err();
    assert!(matches!(err, RelayError::ShuttingDown));
    assert_eq!(sup.session_count().await, 0);
    assert!(sup.session("u1").await.is_none());

    let ev = wait_for_kind(&mut rx, EventKind::StreamStartFailed, EVT).await;
    assert_eq!(ev.reason.as_deref(), Some("shutting_down"));
}

#[tokio::test]
async fn shutdown_with_no_sessions_is_immediate() {
    let sup = Supervisor::builder(Config::default())
        .with_factory(ShellFactory::cat())
        .build();
    let mut rx = sup.subscribe();

    sup.shutdown_all().await.unwrap();
    wait_for_kind(&mut rx, EventKind::AllStoppedWithin, EVT).await;
}
