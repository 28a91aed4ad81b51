//! Run scheduler.
//!
//! Fires a tick every `cadence`, measured start-to-start. A tick that finds
//! the previous run still holding the [`ExecutionSlot`] is skipped rather
//! than queued, so at most one run is ever in flight.
//!
//! # Example
//!
//! ```ignore
//! use eolica_runtime::application::scheduler::{RunContext, RunScheduler};
//!
//! let scheduler = RunScheduler::new(ctx, cadence, grace)?;
//! let mut reports = scheduler.subscribe();
//! tokio::spawn(scheduler.run());
//! ```

mod context;
mod slot;
mod tick;

pub use context::RunContext;
pub use slot::{ExecutionSlot, SlotGuard, TickState};
pub use tick::{execute_tick, TickInputs};

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::domain::TickOutcome;
use crate::error::{ConfigError, Result};
use crate::port::ForecastStream;

/// Capacity of the tick report channel; slow subscribers lag, never block.
const REPORT_CAPACITY: usize = 64;

/// What happened on one scheduler tick.
#[derive(Debug, Clone)]
pub struct TickReport {
    /// 1-based tick counter.
    pub tick: u64,
    /// When the tick fired.
    pub started_at: Instant,
    pub outcome: TickOutcome,
}

/// Periodic trigger for simulation runs.
pub struct RunScheduler<S> {
    ctx: RunContext<S>,
    cadence: Duration,
    grace: Duration,
    reports: broadcast::Sender<TickReport>,
}

impl<S: ForecastStream + 'static> RunScheduler<S> {
    /// Create a scheduler.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for a zero cadence.
    #[allow(clippy::result_large_err)]
    pub fn new(ctx: RunContext<S>, cadence: Duration, grace: Duration) -> Result<Self> {
        if cadence.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "cadence_seconds",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        let (reports, _) = broadcast::channel(REPORT_CAPACITY);
        Ok(Self {
            ctx,
            cadence,
            grace,
            reports,
        })
    }

    /// Receive a [`TickReport`] for every tick fired after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<TickReport> {
        self.reports.subscribe()
    }

    #[must_use]
    pub const fn cadence(&self) -> Duration {
        self.cadence
    }

    /// Run until the context's shutdown token is cancelled.
    ///
    /// The first tick fires immediately. On shutdown the in-flight run gets
    /// `grace` to finish before it is abandoned, then the stream session is
    /// closed.
    pub async fn run(self) {
        info!(
            cadence_secs = self.cadence.as_secs_f64(),
            grace_secs = self.grace.as_secs(),
            "Run scheduler starting"
        );

        let shutdown = self.ctx.shutdown.clone();
        let mut worker: Option<JoinHandle<()>> = None;
        let mut tick: u64 = 0;
        let mut next = Instant::now();

        loop {
            tokio::select! {
                biased;

                () = shutdown.cancelled() => {
                    info!("Run scheduler shutting down");
                    break;
                }

                () = sleep_until(next) => {}
            }

            tick += 1;
            let started_at = Instant::now();
            // A late wakeup fires right away; the next deadline is always a
            // full cadence after the actual start.
            next = started_at + self.cadence;

            match self.ctx.slot.try_acquire() {
                Some(guard) => {
                    worker = Some(self.spawn_tick(guard, tick, started_at));
                }
                None => {
                    warn!(tick, "tick skipped — overlap avoided");
                    let _ = self.reports.send(TickReport {
                        tick,
                        started_at,
                        outcome: TickOutcome::OverlapSkipped,
                    });
                }
            }
        }

        if let Some(handle) = worker.take() {
            self.drain(handle).await;
        }

        let mut state = self.ctx.slot.acquire().await;
        if let Some(result) = state.pending_publication.take() {
            warn!(
                run_id = %result.run_id,
                record = %result.provenance.record,
                "Unpublished result dropped at shutdown; its input stays unacknowledged"
            );
        }
        state.stream.close().await;
        info!(ticks = tick, "Run scheduler stopped");
    }

    fn spawn_tick(
        &self,
        mut guard: SlotGuard<S>,
        tick: u64,
        started_at: Instant,
    ) -> JoinHandle<()> {
        let engine = Arc::clone(&self.ctx.engine);
        let cancel = self.ctx.shutdown.clone();
        let simulation_timeout = self.ctx.simulation_timeout;
        let reports = self.reports.clone();

        tokio::spawn(async move {
            debug!(tick, "Tick started");
            let outcome = execute_tick(
                &mut *guard,
                TickInputs {
                    engine: &engine,
                    cancel: &cancel,
                    simulation_timeout,
                },
            )
            .await;
            drop(guard);

            debug!(
                tick,
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                final_state = %outcome.final_state(),
                "Tick finished"
            );
            let _ = reports.send(TickReport {
                tick,
                started_at,
                outcome,
            });
        })
    }

    async fn drain(&self, mut handle: JoinHandle<()>) {
        if handle.is_finished() {
            let _ = handle.await;
            return;
        }

        info!(
            grace_secs = self.grace.as_secs(),
            "Waiting for in-flight run to finish"
        );
        if tokio::time::timeout(self.grace, &mut handle).await.is_err() {
            warn!(
                grace_secs = self.grace.as_secs(),
                "In-flight run abandoned after grace period; its input stays unacknowledged"
            );
            handle.abort();
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::engine::StubEngine;
    use crate::testkit::stream::memory_stream;
    use tokio_util::sync::CancellationToken;

    fn context(
        stream: crate::testkit::stream::MemoryStream,
        engine: StubEngine,
    ) -> RunContext<crate::testkit::stream::MemoryStream> {
        RunContext::new(
            ExecutionSlot::new(TickState::new(stream)),
            Arc::new(engine),
            CancellationToken::new(),
        )
    }

    #[test]
    fn zero_cadence_is_rejected() {
        let (stream, _backend) = memory_stream();
        let result = RunScheduler::new(
            context(stream, StubEngine::new()),
            Duration::ZERO,
            Duration::from_secs(1),
        );
        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn first_tick_fires_immediately_and_close_runs_on_shutdown() {
        let (mut stream, backend) = memory_stream();
        stream.connect().await.unwrap();
        let ctx = context(stream, StubEngine::new());
        let shutdown = ctx.shutdown.clone();
        let scheduler =
            RunScheduler::new(ctx, Duration::from_secs(60), Duration::from_secs(1)).unwrap();
        let mut reports = scheduler.subscribe();

        let task = tokio::spawn(scheduler.run());
        let first = reports.recv().await.unwrap();
        assert_eq!(first.tick, 1);
        assert_eq!(first.outcome, TickOutcome::NoInput);

        shutdown.cancel();
        task.await.unwrap();
        assert_eq!(backend.close_count(), 1);
    }
}
