//! One tick: consume → simulate → publish → acknowledge.
//!
//! The tick is written as explicit transitions between [`Step`]s. Each step
//! maps onto a [`RunState`], which keeps the behaviour enumerable and makes
//! every exit path produce a [`TickOutcome`].

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::slot::TickState;
use crate::domain::{ForecastBatch, RunId, RunState, SimulationResult, TickOutcome};
use crate::error::SimulationError;
use crate::port::{ForecastStream, SimulationEngine};

enum Step {
    Consume,
    Simulate(ForecastBatch),
    Publish(SimulationResult),
    Acknowledge(SimulationResult),
    Done(TickOutcome),
}

impl Step {
    const fn state(&self) -> RunState {
        match self {
            Self::Consume => RunState::Consuming,
            Self::Simulate(_) => RunState::Simulating,
            Self::Publish(_) | Self::Acknowledge(_) => RunState::Publishing,
            Self::Done(outcome) => outcome.final_state(),
        }
    }
}

/// Inputs of a tick that are not part of the slot state.
pub struct TickInputs<'a> {
    pub engine: &'a Arc<dyn SimulationEngine>,
    pub cancel: &'a CancellationToken,
    pub simulation_timeout: Option<Duration>,
}

/// Run a single tick against the slot state.
///
/// Never returns an error: failures end the tick as
/// [`TickOutcome::Failed`] and leave unacknowledged input in place. A batch
/// without samples is acknowledged as settled and reported as no input.
pub async fn execute_tick<S: ForecastStream>(
    state: &mut TickState<S>,
    inputs: TickInputs<'_>,
) -> TickOutcome {
    // A result that could not be published last time goes out first, so a
    // single tick never holds more than one result.
    let mut step = match state.pending_publication.take() {
        Some(result) => {
            info!(run_id = %result.run_id, "Retrying publication of previous result");
            Step::Publish(result)
        }
        None => Step::Consume,
    };
    let mut current = RunState::Idle;

    loop {
        let next_state = step.state();
        if next_state != current {
            debug!(from = %current, to = %next_state, "Run state transition");
            current = next_state;
        }

        step = match step {
            Step::Done(outcome) => return outcome,
            Step::Consume => consume(&mut state.stream).await,
            Step::Simulate(batch) => simulate(batch, &inputs).await,
            Step::Publish(result) => match state.stream.publish(&result).await {
                Ok(()) => {
                    info!(
                        run_id = %result.run_id,
                        record = %result.provenance.record,
                        steps = result.len(),
                        "Result published"
                    );
                    Step::Acknowledge(result)
                }
                Err(err) => {
                    warn!(
                        run_id = %result.run_id,
                        record = %result.provenance.record,
                        error = %err,
                        "Publication failed, result kept for retry"
                    );
                    state.pending_publication = Some(result);
                    Step::Done(TickOutcome::Failed {
                        stage: RunState::Publishing,
                        reason: err.to_string(),
                    })
                }
            },
            Step::Acknowledge(result) => {
                let acknowledged = match state.stream.acknowledge(&result.provenance).await {
                    Ok(()) => true,
                    Err(err) => {
                        warn!(
                            run_id = %result.run_id,
                            record = %result.provenance.record,
                            error = %err,
                            "Acknowledgement failed; input may be reprocessed after restart"
                        );
                        false
                    }
                };
                Step::Done(TickOutcome::Published {
                    run_id: result.run_id,
                    record: result.provenance.record,
                    acknowledged,
                })
            }
        };
    }
}

async fn consume<S: ForecastStream>(stream: &mut S) -> Step {
    match stream.fetch_latest().await {
        Ok(Some(batch)) if batch.is_empty() => {
            let provenance = batch.provenance();
            info!(record = %provenance.record, "no new input (empty forecast batch)");
            if let Err(err) = stream.acknowledge(provenance).await {
                warn!(
                    record = %provenance.record,
                    error = %err,
                    "Acknowledging empty batch failed; it will be redelivered"
                );
            }
            Step::Done(TickOutcome::NoInput)
        }
        Ok(Some(batch)) => {
            debug!(
                record = %batch.provenance().record,
                superseded = batch.provenance().superseded.len(),
                samples = batch.len(),
                "Forecast batch consumed"
            );
            Step::Simulate(batch)
        }
        Ok(None) => {
            info!("no new input");
            Step::Done(TickOutcome::NoInput)
        }
        Err(err) => {
            warn!(error = %err, attempted_at = %Utc::now(), "Fetching forecast failed");
            Step::Done(TickOutcome::Failed {
                stage: RunState::Consuming,
                reason: err.to_string(),
            })
        }
    }
}

async fn simulate(batch: ForecastBatch, inputs: &TickInputs<'_>) -> Step {
    let run_id = RunId::generate();
    let run_at = Utc::now();
    let record = batch.provenance().record.clone();
    let batch = Arc::new(batch);

    let outcome = run_engine(Arc::clone(&batch), inputs)
        .await
        .and_then(|output| SimulationResult::assemble(&batch, output, run_id.clone(), run_at));

    match outcome {
        Ok(result) => {
            debug!(run_id = %run_id, record = %record, "Simulation finished");
            Step::Publish(result)
        }
        Err(SimulationError::Cancelled) => {
            info!(run_id = %run_id, record = %record, "Simulation cancelled by shutdown");
            Step::Done(TickOutcome::Cancelled)
        }
        Err(err) => {
            warn!(
                run_id = %run_id,
                record = %record,
                attempted_at = %run_at,
                error = %err,
                "Simulation failed; input left unacknowledged"
            );
            Step::Done(TickOutcome::Failed {
                stage: RunState::Simulating,
                reason: err.to_string(),
            })
        }
    }
}

/// Run the engine on the blocking pool so the cadence timer keeps firing.
///
/// A blocking task cannot be aborted. After a timeout the run is cancelled
/// and still awaited, so the slot stays held until the engine returns.
async fn run_engine(
    batch: Arc<ForecastBatch>,
    inputs: &TickInputs<'_>,
) -> Result<crate::domain::SimulationOutput, SimulationError> {
    let cancel = inputs.cancel.child_token();
    let engine = Arc::clone(inputs.engine);
    let worker_cancel = cancel.clone();
    let mut handle =
        tokio::task::spawn_blocking(move || engine.simulate(&batch, &worker_cancel));

    let joined = match inputs.simulation_timeout {
        Some(limit) => match tokio::time::timeout(limit, &mut handle).await {
            Ok(joined) => joined,
            Err(_) => {
                let timeout_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX);
                cancel.cancel();
                warn!(timeout_ms, "Simulation timed out, waiting for the engine to stop");
                let _ = handle.await;
                return Err(SimulationError::TimedOut { timeout_ms });
            }
        },
        None => handle.await,
    };

    joined.map_err(|err| SimulationError::Panicked(err.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::engine::StubEngine;
    use crate::testkit::stream::memory_stream;

    fn inputs<'a>(
        engine: &'a Arc<dyn SimulationEngine>,
        cancel: &'a CancellationToken,
    ) -> TickInputs<'a> {
        TickInputs {
            engine,
            cancel,
            simulation_timeout: None,
        }
    }

    #[tokio::test]
    async fn idle_stream_yields_no_input() {
        let (mut stream, _backend) = memory_stream();
        stream.connect().await.unwrap();
        let mut state = TickState::new(stream);
        let engine: Arc<dyn SimulationEngine> = Arc::new(StubEngine::new());
        let cancel = CancellationToken::new();

        let outcome = execute_tick(&mut state, inputs(&engine, &cancel)).await;
        assert_eq!(outcome, TickOutcome::NoInput);
    }

    #[tokio::test]
    async fn full_cycle_publishes_then_acknowledges() {
        let (mut stream, backend) = memory_stream();
        stream.connect().await.unwrap();
        let record = backend.push_forecast(10);
        let mut state = TickState::new(stream);
        let engine: Arc<dyn SimulationEngine> = Arc::new(StubEngine::new());
        let cancel = CancellationToken::new();

        let outcome = execute_tick(&mut state, inputs(&engine, &cancel)).await;

        assert!(matches!(
            outcome,
            TickOutcome::Published { record: ref r, acknowledged: true, .. } if *r == record
        ));
        let published = backend.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].forecast_time.len(), 10);
        assert_eq!(backend.acknowledged(), vec![record]);
    }

    #[tokio::test]
    async fn engine_failure_leaves_record_pending() {
        let (mut stream, backend) = memory_stream();
        stream.connect().await.unwrap();
        let record = backend.push_forecast(4);
        let mut state = TickState::new(stream);
        let engine: Arc<dyn SimulationEngine> = Arc::new(StubEngine::new().failing_first(1));
        let cancel = CancellationToken::new();

        let outcome = execute_tick(&mut state, inputs(&engine, &cancel)).await;

        assert!(matches!(
            outcome,
            TickOutcome::Failed {
                stage: RunState::Simulating,
                ..
            }
        ));
        assert!(backend.published().is_empty());
        assert_eq!(backend.pending(), vec![record]);
    }

    #[tokio::test]
    async fn publish_failure_parks_result_for_next_tick() {
        let (mut stream, backend) = memory_stream();
        stream.connect().await.unwrap();
        backend.push_forecast(3);
        backend.fail_publishes(1);
        let mut state = TickState::new(stream);
        let stub = StubEngine::new();
        let engine: Arc<dyn SimulationEngine> = Arc::new(stub.clone());
        let cancel = CancellationToken::new();

        let first = execute_tick(&mut state, inputs(&engine, &cancel)).await;
        assert!(matches!(
            first,
            TickOutcome::Failed {
                stage: RunState::Publishing,
                ..
            }
        ));
        let parked = state.pending_publication.clone().expect("result parked");

        let second = execute_tick(&mut state, inputs(&engine, &cancel)).await;
        match second {
            TickOutcome::Published { run_id, .. } => assert_eq!(run_id, parked.run_id),
            other => panic!("expected publication retry, got {other:?}"),
        }
        assert!(state.pending_publication.is_none());
        assert_eq!(backend.published()[0], parked);
        assert_eq!(stub.calls(), 1);
    }

    #[tokio::test]
    async fn acknowledgement_failure_does_not_revert_publication() {
        let (mut stream, backend) = memory_stream();
        stream.connect().await.unwrap();
        let record = backend.push_forecast(2);
        backend.fail_acks(1);
        let mut state = TickState::new(stream);
        let engine: Arc<dyn SimulationEngine> = Arc::new(StubEngine::new());
        let cancel = CancellationToken::new();

        let outcome = execute_tick(&mut state, inputs(&engine, &cancel)).await;

        assert!(matches!(
            outcome,
            TickOutcome::Published {
                acknowledged: false,
                ..
            }
        ));
        assert_eq!(backend.published().len(), 1);
        assert_eq!(backend.pending(), vec![record]);
    }

    #[tokio::test]
    async fn simulation_timeout_fails_the_tick() {
        let (mut stream, backend) = memory_stream();
        stream.connect().await.unwrap();
        backend.push_forecast(2);
        let mut state = TickState::new(stream);
        let engine: Arc<dyn SimulationEngine> =
            Arc::new(StubEngine::new().with_delay(Duration::from_secs(5)));
        let cancel = CancellationToken::new();

        let outcome = execute_tick(
            &mut state,
            TickInputs {
                engine: &engine,
                cancel: &cancel,
                simulation_timeout: Some(Duration::from_millis(50)),
            },
        )
        .await;

        assert!(matches!(
            outcome,
            TickOutcome::Failed {
                stage: RunState::Simulating,
                ref reason,
            } if reason.contains("exceeded")
        ));
    }

    #[tokio::test]
    async fn simulation_timeout_holds_the_tick_until_the_engine_returns() {
        let (mut stream, backend) = memory_stream();
        stream.connect().await.unwrap();
        let record = backend.push_forecast(2);
        let mut state = TickState::new(stream);
        let stub = StubEngine::new()
            .with_delay(Duration::from_millis(300))
            .ignoring_cancellation();
        let engine: Arc<dyn SimulationEngine> = Arc::new(stub.clone());
        let cancel = CancellationToken::new();

        let started = std::time::Instant::now();
        let outcome = execute_tick(
            &mut state,
            TickInputs {
                engine: &engine,
                cancel: &cancel,
                simulation_timeout: Some(Duration::from_millis(50)),
            },
        )
        .await;

        assert!(matches!(
            outcome,
            TickOutcome::Failed {
                stage: RunState::Simulating,
                ..
            }
        ));
        assert!(started.elapsed() >= Duration::from_millis(300));
        assert_eq!(stub.calls(), 1);
        assert_eq!(backend.pending(), vec![record]);
    }

    #[tokio::test]
    async fn empty_newest_batch_settles_the_read_as_no_input() {
        let (mut stream, backend) = memory_stream();
        stream.connect().await.unwrap();
        let forecast = backend.push_forecast(4);
        let empty = backend.push_samples(vec![]);
        let mut state = TickState::new(stream);
        let stub = StubEngine::new();
        let engine: Arc<dyn SimulationEngine> = Arc::new(stub.clone());
        let cancel = CancellationToken::new();

        for _ in 0..3 {
            let outcome = execute_tick(&mut state, inputs(&engine, &cancel)).await;
            assert_eq!(outcome, TickOutcome::NoInput);
        }

        assert!(backend.pending().is_empty());
        assert_eq!(backend.acknowledged(), vec![forecast, empty]);
        assert!(backend.published().is_empty());
        assert_eq!(stub.calls(), 0);
    }

    #[tokio::test]
    async fn malformed_newest_record_falls_back_to_previous_forecast() {
        let (mut stream, backend) = memory_stream();
        stream.connect().await.unwrap();
        let forecast = backend.push_forecast(3);
        let malformed = backend.push_malformed("missing field 'wind_speed'");
        let mut state = TickState::new(stream);
        let engine: Arc<dyn SimulationEngine> = Arc::new(StubEngine::new());
        let cancel = CancellationToken::new();

        let outcome = execute_tick(&mut state, inputs(&engine, &cancel)).await;

        assert!(matches!(
            outcome,
            TickOutcome::Published { record: ref r, acknowledged: true, .. } if *r == forecast
        ));
        assert_eq!(backend.published().len(), 1);
        assert_eq!(backend.acknowledged(), vec![malformed, forecast]);
    }
}
