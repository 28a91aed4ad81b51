//! Runtime lifecycle tests: startup, outages and graceful shutdown.

use std::sync::Arc;
use std::time::{Duration, Instant};

use eolica_runtime::domain::{LifecycleState, StreamHealth, TickOutcome};
use eolica_runtime::error::{ConfigError, ConnectionError, Error};
use eolica_runtime::infrastructure::lifecycle::{start_with, RuntimeHandle};
use eolica_runtime::testkit::config;
use eolica_runtime::testkit::engine::StubEngine;
use eolica_runtime::testkit::stream::{memory_stream, MemoryBackend};
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(8);

async fn start(engine: StubEngine) -> (RuntimeHandle, MemoryBackend) {
    let (stream, backend) = memory_stream();
    let handle = start_with(config::runtime(1), Box::new(stream), Arc::new(engine))
        .await
        .unwrap_or_else(|err| panic!("runtime failed to start: {err}"));
    (handle, backend)
}

async fn wait_for_calls(engine: &StubEngine, calls: u32) {
    timeout(WAIT, async {
        while engine.calls() < calls {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("engine called in time");
}

#[tokio::test]
async fn runtime_runs_then_stops_cleanly() {
    let (mut handle, backend) = start(StubEngine::new()).await;
    assert_eq!(handle.state(), LifecycleState::Running);
    assert_eq!(handle.health(), StreamHealth::Healthy);
    assert!(handle.health_report().is_healthy());
    assert!(backend.is_connected());

    let mut reports = handle.take_tick_reports().expect("reports available once");
    assert!(handle.take_tick_reports().is_none());
    let first = timeout(WAIT, reports.recv()).await.unwrap().unwrap();
    assert_eq!(first.outcome, TickOutcome::NoInput);

    let state = handle.subscribe_state();
    handle.stop().await;

    assert_eq!(*state.borrow(), LifecycleState::Stopped);
    assert_eq!(backend.close_count(), 1);
    assert!(!backend.is_connected());
}

#[tokio::test]
async fn startup_fails_when_backend_stays_unreachable() {
    let (stream, backend) = memory_stream();
    backend.set_unreachable(true);

    let result = start_with(
        config::runtime(1),
        Box::new(stream),
        Arc::new(StubEngine::new()),
    )
    .await;

    let Err(err) = result else {
        panic!("startup should fail");
    };
    assert!(
        matches!(err, Error::Connection(ConnectionError::StartupTimeout { .. })),
        "unexpected error: {err}"
    );
    assert!(backend.connect_count() > 1, "startup should retry");
}

#[tokio::test]
async fn invalid_config_is_rejected_before_connecting() {
    let (stream, backend) = memory_stream();

    let result = start_with(
        config::runtime(0),
        Box::new(stream),
        Arc::new(StubEngine::new()),
    )
    .await;

    let Err(err) = result else {
        panic!("startup should fail");
    };
    assert!(
        matches!(
            err,
            Error::Config(ConfigError::InvalidValue {
                field: "cadence_seconds",
                ..
            })
        ),
        "unexpected error: {err}"
    );
    assert_eq!(backend.connect_count(), 0);
}

#[tokio::test]
async fn startup_fails_fast_on_rejected_credentials() {
    let (stream, backend) = memory_stream();
    backend.reject_auth(true);

    let started = Instant::now();
    let result = start_with(
        config::runtime(1),
        Box::new(stream),
        Arc::new(StubEngine::new()),
    )
    .await;

    let Err(err) = result else {
        panic!("startup should fail");
    };
    assert!(matches!(
        err,
        Error::Connection(ConnectionError::AuthenticationFailed { .. })
    ));
    assert_eq!(backend.connect_count(), 1);
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn outage_degrades_health_and_recovers_without_restart() {
    let engine = StubEngine::new();
    let (mut handle, backend) = start(engine.clone()).await;
    let mut health = handle.subscribe_health();
    let mut reports = handle.take_tick_reports().unwrap();

    backend.set_unreachable(true);
    timeout(WAIT, health.wait_for(StreamHealth::is_degraded))
        .await
        .expect("degraded in time")
        .expect("health channel open");
    assert_eq!(handle.state(), LifecycleState::Running);
    let report = handle.health_report();
    assert!(report.is_healthy(), "degraded stream is not critical");
    assert!(!report.check("stream_session").unwrap().is_healthy());

    let record = backend.push_forecast(4);
    backend.set_unreachable(false);
    timeout(WAIT, health.wait_for(|h| *h == StreamHealth::Healthy))
        .await
        .expect("recovered in time")
        .expect("health channel open");

    let published = timeout(WAIT, async {
        loop {
            let report = reports.recv().await.expect("report channel open");
            if report.outcome.is_published() {
                return report;
            }
        }
    })
    .await
    .expect("published after recovery");
    assert!(matches!(
        published.outcome,
        TickOutcome::Published { record: ref r, .. } if *r == record
    ));

    handle.stop().await;
    assert_eq!(engine.calls(), 1);
}

#[tokio::test]
async fn stop_cancels_an_interruptible_run() {
    let engine = StubEngine::new().with_delay(Duration::from_secs(30));
    let (stream, backend) = memory_stream();
    backend.push_forecast(3);
    let handle = start_with(
        config::runtime(1),
        Box::new(stream),
        Arc::new(engine.clone()),
    )
    .await
    .unwrap_or_else(|err| panic!("runtime failed to start: {err}"));
    wait_for_calls(&engine, 1).await;

    let started = Instant::now();
    handle.stop().await;

    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(backend.published().is_empty());
    assert_eq!(backend.pending().len(), 1);
    assert_eq!(backend.close_count(), 1);
}

#[tokio::test]
async fn stop_abandons_run_after_grace_period() {
    let engine = StubEngine::new()
        .with_delay(Duration::from_secs(3))
        .ignoring_cancellation();
    let (stream, backend) = memory_stream();
    let record = backend.push_forecast(3);
    let handle = start_with(
        config::runtime(1),
        Box::new(stream),
        Arc::new(engine.clone()),
    )
    .await
    .unwrap_or_else(|err| panic!("runtime failed to start: {err}"));
    wait_for_calls(&engine, 1).await;

    let started = Instant::now();
    handle.stop().await;
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_millis(900), "grace not honoured: {elapsed:?}");
    assert!(elapsed < Duration::from_millis(2500), "run not abandoned: {elapsed:?}");
    assert!(backend.published().is_empty());
    assert_eq!(backend.pending(), vec![record]);
    assert_eq!(backend.close_count(), 1);
}
