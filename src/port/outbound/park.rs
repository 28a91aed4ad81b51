//! Park configuration port.
//!
//! Resolves the files the simulation engine is built from, either straight
//! from the runtime configuration or from an external generator.

use std::path::PathBuf;

use crate::error::ConfigError;

/// Files describing the park, its turbine types and the simulation setup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationFiles {
    pub park: PathBuf,
    pub turbine_types: Option<PathBuf>,
    pub simulation: Option<PathBuf>,
}

/// Source of [`SimulationFiles`], consulted once at startup.
pub trait ParkConfigResolver: Send + Sync {
    /// Resolve the configuration files.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the files cannot be produced or located.
    fn resolve(&self) -> Result<SimulationFiles, ConfigError>;

    /// Short label for logging (e.g. "static", "generator").
    fn source(&self) -> &'static str;
}
