//! Simulation engine port.
//!
//! The physics lives outside this crate. The runtime only needs the
//! capability "given a batch, produce production series or fail".

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::domain::{ForecastBatch, SimulationOutput};
use crate::error::SimulationError;

/// A configured simulation engine.
///
/// Calls are synchronous and may be slow; the scheduler runs them on a
/// blocking worker. Engines that can stop early should poll `cancel` and
/// return [`SimulationError::Cancelled`].
pub trait SimulationEngine: Send + Sync {
    /// Simulate park production for every sample in `batch`.
    fn simulate(
        &self,
        batch: &ForecastBatch,
        cancel: &CancellationToken,
    ) -> Result<SimulationOutput, SimulationError>;

    /// Engine name for logging.
    fn name(&self) -> &str;
}

impl<E: SimulationEngine + ?Sized> SimulationEngine for Arc<E> {
    fn simulate(
        &self,
        batch: &ForecastBatch,
        cancel: &CancellationToken,
    ) -> Result<SimulationOutput, SimulationError> {
        (**self).simulate(batch, cancel)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
