//! Stream port for consuming forecasts and publishing results.
//!
//! The backend is an append-only ordered log with a durable consumer cursor.
//! Implementations map their native failures onto
//! [`ConnectionError`](crate::error::ConnectionError) and
//! [`TransientIoError`](crate::error::TransientIoError).

use async_trait::async_trait;

use crate::domain::{ForecastBatch, Provenance, SimulationResult};
use crate::error::Result;

/// Client side of the forecast/result stream pair.
///
/// A single instance owns its connection exclusively; it is never shared
/// between concurrent callers.
#[async_trait]
pub trait ForecastStream: Send {
    /// Establish (or re-establish) the backend session.
    ///
    /// Fails with a `ConnectionError` when the backend is unreachable,
    /// rejects the credentials, or the configured streams are unusable.
    async fn connect(&mut self) -> Result<()>;

    /// Fetch the latest unconsumed forecast batch, if any.
    async fn fetch_latest(&mut self) -> Result<Option<ForecastBatch>>;

    /// Append a result to the output stream.
    ///
    /// Safe to retry after an ambiguous failure: consumers key on the run id.
    async fn publish(&mut self, result: &SimulationResult) -> Result<()>;

    /// Mark the records behind `provenance` as consumed.
    ///
    /// Best effort. A failure never reverts a completed publication.
    async fn acknowledge(&mut self, provenance: &Provenance) -> Result<()>;

    /// Drop the backend session.
    async fn close(&mut self);

    /// Backend name for logging.
    fn backend_name(&self) -> &'static str;
}

#[async_trait]
impl<S: ForecastStream + ?Sized> ForecastStream for Box<S> {
    async fn connect(&mut self) -> Result<()> {
        (**self).connect().await
    }

    async fn fetch_latest(&mut self) -> Result<Option<ForecastBatch>> {
        (**self).fetch_latest().await
    }

    async fn publish(&mut self, result: &SimulationResult) -> Result<()> {
        (**self).publish(result).await
    }

    async fn acknowledge(&mut self, provenance: &Provenance) -> Result<()> {
        (**self).acknowledge(provenance).await
    }

    async fn close(&mut self) {
        (**self).close().await;
    }

    fn backend_name(&self) -> &'static str {
        (**self).backend_name()
    }
}
