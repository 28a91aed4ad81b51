//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! # Modules
//!
//! - [`stream`] - In-memory [`ForecastStream`](crate::port::ForecastStream)
//!   with an external control handle: `MemoryStream` + `MemoryBackend`.
//! - [`engine`] - `StubEngine`, a scriptable
//!   [`SimulationEngine`](crate::port::SimulationEngine).
//! - [`domain`] - Builders for forecast samples and batches.
//! - [`config`] - Canonical test configurations (reconnection, full config).

pub mod config;
pub mod domain;
pub mod engine;
pub mod stream;
