//! Handler for the `check` command.

use std::path::Path;

use crate::error::{ConfigError, Result};
use crate::infrastructure::config::settings::Config;
use crate::infrastructure::health::{health_check, HealthReport, HealthStatus};

/// Validate the configuration file without starting the service.
///
/// Does not contact Redis or run the engine. Fails when any critical
/// health check fails.
pub fn execute<P: AsRef<Path>>(config_path: P) -> Result<()> {
    let path = config_path.as_ref();
    let config = Config::load(path)?;
    let report = health_check(&config);

    println!("Configuration: {}", path.display());
    for check in report.checks() {
        match check.status() {
            HealthStatus::Healthy => println!("  ok    {}", check.name()),
            HealthStatus::Unhealthy(reason) => println!("  FAIL  {}: {reason}", check.name()),
        }
    }
    verdict(&report)?;

    println!(
        "Cadence {}s, {} -> {} via {}",
        config.service.cadence().as_secs(),
        config.stream.input_stream,
        config.stream.output_stream,
        config.redis.endpoint()
    );
    println!("Configuration is valid");

    Ok(())
}

/// The first failing critical check, as a configuration error.
fn verdict(report: &HealthReport) -> Result<()> {
    let failed = report
        .checks()
        .iter()
        .find(|check| check.critical() && !check.is_healthy());
    match failed.map(|check| (check.name(), check.status())) {
        Some((field, HealthStatus::Unhealthy(reason))) => Err(ConfigError::InvalidValue {
            field,
            reason: reason.clone(),
        }
        .into()),
        _ => Ok(()),
    }
}
