//! Runtime context handed to the scheduler.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::slot::ExecutionSlot;
use crate::port::SimulationEngine;

/// Everything a tick needs, owned explicitly instead of living in globals.
pub struct RunContext<S> {
    /// Single-slot guard around the stream session and pending result.
    pub slot: ExecutionSlot<S>,
    /// Configured simulation engine.
    pub engine: Arc<dyn SimulationEngine>,
    /// Cancelled when the runtime shuts down.
    pub shutdown: CancellationToken,
    /// Hard cap on one simulation run, if any.
    pub simulation_timeout: Option<Duration>,
}

impl<S> RunContext<S> {
    pub fn new(
        slot: ExecutionSlot<S>,
        engine: Arc<dyn SimulationEngine>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            slot,
            engine,
            shutdown,
            simulation_timeout: None,
        }
    }

    #[must_use]
    pub fn with_simulation_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.simulation_timeout = timeout;
        self
    }
}
