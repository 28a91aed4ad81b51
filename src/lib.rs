//! eolica-runtime - periodic wind-park simulation driven by Redis streams.
//!
//! Every `cadence_seconds` the runtime takes the newest wind forecast from an
//! input stream, runs the wind-park simulation engine on it and appends the
//! production series to an output stream. Input is acknowledged only after
//! its result has been published.
//!
//! # Architecture
//!
//! - [`domain`] - Forecast batches, simulation results, run and health states
//! - [`port`] - `ForecastStream`, `SimulationEngine`, `ParkConfigResolver`
//! - [`application`] - The run scheduler and its tick state machine
//! - [`adapter`] - Redis streams, the engine process, park resolvers, CLI
//! - [`infrastructure`] - Config, reconnection, health and lifecycle
//! - [`error`] - Error taxonomy for the crate
//!
//! # Example
//!
//! ```no_run
//! use eolica_runtime::infrastructure::lifecycle::{self, ConfigSource};
//!
//! # async fn run() -> eolica_runtime::error::Result<()> {
//! let handle = lifecycle::start(ConfigSource::File("config.toml".into())).await?;
//! handle.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod port;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
