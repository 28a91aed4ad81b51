//! Scriptable [`SimulationEngine`] for testing.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::domain::{ForecastBatch, SimulationOutput};
use crate::error::SimulationError;
use crate::port::SimulationEngine;

/// Rated output used by the stub power curve, in kW per m/s.
const KW_PER_MS: f64 = 100.0;

#[derive(Default)]
struct Counters {
    calls: AtomicU32,
    active: AtomicU32,
    max_active: AtomicU32,
    failures_left: AtomicU32,
}

/// Decrements the active counter when a run ends, however it ends.
struct ActiveRun<'a>(&'a Counters);

impl Drop for ActiveRun<'_> {
    fn drop(&mut self) {
        self.0.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Produces a linear power curve for two turbines, `T01` and `T02`.
///
/// Clones share their counters, so a test can keep one clone for
/// assertions while the runtime owns another.
#[derive(Clone, Default)]
pub struct StubEngine {
    delay: Duration,
    ignore_cancel: bool,
    counters: Arc<Counters>,
}

impl StubEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block each run for `delay` (wall-clock time).
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fail the first `count` runs with an engine error.
    #[must_use]
    pub fn failing_first(self, count: u32) -> Self {
        self.counters.failures_left.store(count, Ordering::SeqCst);
        self
    }

    /// Keep running through cancellation, like an engine that cannot be
    /// interrupted.
    #[must_use]
    pub fn ignoring_cancellation(mut self) -> Self {
        self.ignore_cancel = true;
        self
    }

    /// Runs started so far.
    pub fn calls(&self) -> u32 {
        self.counters.calls.load(Ordering::SeqCst)
    }

    /// Highest number of runs observed in flight at the same time.
    pub fn max_concurrency(&self) -> u32 {
        self.counters.max_active.load(Ordering::SeqCst)
    }
}

impl SimulationEngine for StubEngine {
    fn simulate(
        &self,
        batch: &ForecastBatch,
        cancel: &CancellationToken,
    ) -> Result<SimulationOutput, SimulationError> {
        let counters = &self.counters;
        counters.calls.fetch_add(1, Ordering::SeqCst);
        let now_active = counters.active.fetch_add(1, Ordering::SeqCst) + 1;
        counters.max_active.fetch_max(now_active, Ordering::SeqCst);
        let _active = ActiveRun(counters);

        let deadline = Instant::now() + self.delay;
        while Instant::now() < deadline {
            if !self.ignore_cancel && cancel.is_cancelled() {
                return Err(SimulationError::Cancelled);
            }
            std::thread::sleep(Duration::from_millis(5));
        }

        let failing = counters
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(SimulationError::Engine(anyhow::anyhow!(
                "stub engine: scripted failure"
            )));
        }

        let park: Vec<f64> = batch
            .samples()
            .iter()
            .map(|s| s.wind_speed * KW_PER_MS)
            .collect();
        let half: Vec<f64> = park.iter().map(|p| p / 2.0).collect();
        Ok(SimulationOutput {
            park_production: park,
            turbine_production: BTreeMap::from([
                ("T01".to_string(), half.clone()),
                ("T02".to_string(), half),
            ]),
        })
    }

    fn name(&self) -> &str {
        "stub"
    }
}
