//! Infrastructure bootstrap helpers for runtime wiring.

use std::sync::Arc;

use tracing::{info, warn};

use crate::adapter::outbound::engine::ProcessEngine;
use crate::adapter::outbound::park::{GeneratedFiles, StaticFiles};
use crate::adapter::outbound::redis::RedisForecastStream;
use crate::error::{ConfigError, Result};
use crate::infrastructure::config::settings::Config;
use crate::infrastructure::config::simulation::SimulationConfig;
use crate::port::{ForecastStream, ParkConfigResolver, SimulationEngine, SimulationFiles};

fn static_files(simulation: &SimulationConfig) -> StaticFiles {
    StaticFiles::new(
        simulation.park_config.clone(),
        simulation.turbine_types_config.clone(),
        simulation.simulation_config.clone(),
    )
}

/// Resolve the files the engine is built from.
///
/// With the generator enabled its output wins; if it fails, a configured
/// static `park_config` is used instead, otherwise the failure is fatal.
pub(crate) fn resolve_simulation_files(
    simulation: &SimulationConfig,
) -> std::result::Result<SimulationFiles, ConfigError> {
    if !simulation.generator.enabled {
        return resolve_with(&static_files(simulation));
    }

    let generated =
        GeneratedFiles::new(&simulation.generator, simulation.simulation_config.clone())
            .and_then(|generator| resolve_with(&generator));
    match generated {
        Ok(files) => Ok(files),
        Err(err) if simulation.park_config.is_some() => {
            warn!(
                error = %err,
                "Park configuration generator failed, falling back to static park_config"
            );
            resolve_with(&static_files(simulation))
        }
        Err(err) => Err(err),
    }
}

fn resolve_with(
    resolver: &dyn ParkConfigResolver,
) -> std::result::Result<SimulationFiles, ConfigError> {
    let files = resolver.resolve()?;
    info!(
        source = resolver.source(),
        park = %files.park.display(),
        "Park configuration resolved"
    );
    Ok(files)
}

/// Build the process-backed engine; it validates its files on construction.
pub(crate) fn build_engine(
    config: &Config,
    files: &SimulationFiles,
) -> Result<Arc<dyn SimulationEngine>> {
    let engine = ProcessEngine::new(&config.simulation.engine_command, files)?;
    info!(engine = engine.name(), "Simulation engine ready");
    Ok(Arc::new(engine))
}

/// Build the Redis stream adapter, not yet connected.
pub(crate) fn build_stream(config: &Config) -> Result<Box<dyn ForecastStream>> {
    let stream = RedisForecastStream::new(&config.redis, config.stream.clone())?;
    Ok(Box::new(stream))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn simulation_with(park: Option<PathBuf>, generator_command: Vec<String>) -> SimulationConfig {
        let mut simulation = SimulationConfig {
            park_config: park,
            engine_command: vec!["engine".into()],
            ..SimulationConfig::default()
        };
        simulation.generator.enabled = !generator_command.is_empty();
        simulation.generator.command = generator_command;
        simulation.generator.park_name = Some("Test Park".into());
        simulation
    }

    #[test]
    fn static_files_are_used_when_generator_is_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let park = dir.path().join("park.yaml");
        std::fs::write(&park, "").unwrap();

        let simulation = simulation_with(Some(park.clone()), vec![]);
        let files = resolve_simulation_files(&simulation).unwrap();
        assert_eq!(files.park, park);
    }

    #[cfg(unix)]
    #[test]
    fn failed_generator_falls_back_to_static_park() {
        let dir = tempfile::tempdir().unwrap();
        let park = dir.path().join("park.yaml");
        std::fs::write(&park, "").unwrap();
        let mut simulation = simulation_with(Some(park.clone()), vec!["false".into()]);
        simulation.generator.output_dir = dir.path().join("generated");

        let files = resolve_simulation_files(&simulation).unwrap();
        assert_eq!(files.park, park);
    }

    #[cfg(unix)]
    #[test]
    fn failed_generator_without_static_park_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut simulation = simulation_with(None, vec!["false".into()]);
        simulation.generator.output_dir = dir.path().to_path_buf();

        assert!(matches!(
            resolve_simulation_files(&simulation),
            Err(ConfigError::Generator(_))
        ));
    }
}
