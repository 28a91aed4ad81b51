//! Runtime configuration loading and validation.
//!
//! Provides the main [`Config`] struct that aggregates all runtime settings.
//! Configuration is loaded once from a TOML file; `REDIS_PASSWORD` in the
//! environment overrides the file's password. Changing configuration
//! requires a restart.
//!
//! # Example
//!
//! ```no_run
//! use eolica_runtime::infrastructure::config::settings::Config;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("config.toml")?;
//!     config.init_logging();
//!     Ok(())
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::logging::LoggingConfig;
use super::service::{ReconnectionConfig, ServiceConfig};
use super::simulation::SimulationConfig;
use super::stream::{RedisConfig, StreamConfig};
use crate::error::{ConfigError, Result};

/// Environment variable overriding `[redis].password`.
pub const REDIS_PASSWORD_ENV: &str = "REDIS_PASSWORD";

/// Main runtime configuration.
///
/// Immutable after loading. Load from a TOML file using [`Config::load`] or
/// parse directly with [`Config::parse_toml`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Tick cadence and shutdown settings.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Input/output stream names and consumer group.
    #[serde(default)]
    pub stream: StreamConfig,

    /// Redis connection parameters.
    #[serde(default)]
    pub redis: RedisConfig,

    /// Backoff and health settings for the stream session.
    #[serde(default)]
    pub reconnection: ReconnectionConfig,

    /// Simulation engine and park configuration.
    #[serde(default)]
    pub simulation: SimulationConfig,

    /// Logging and tracing configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Directory of the loaded file; relative paths were resolved against it.
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

impl Config {
    /// Parse configuration from TOML content.
    ///
    /// Relative paths stay relative to the working directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML content is malformed or validation fails.
    #[allow(clippy::result_large_err)]
    pub fn parse_toml(content: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;

        if let Ok(password) = std::env::var(REDIS_PASSWORD_ENV) {
            if !password.is_empty() {
                config.redis.password = Some(password);
            }
        }

        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// Relative simulation paths are resolved against the file's directory.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read
    /// - The TOML content is malformed
    /// - Validation fails
    #[allow(clippy::result_large_err)]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        let mut config = Self::parse_toml(&content)?;

        let base = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        config.simulation.resolve_paths(&base);
        config.base_dir = Some(base);

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// Checks that all required fields are present and values are within
    /// acceptable ranges.
    #[allow(clippy::result_large_err)]
    pub(crate) fn validate(&self) -> Result<()> {
        match self.service.cadence_seconds {
            None => {
                return Err(ConfigError::MissingField {
                    field: "cadence_seconds",
                }
                .into());
            }
            Some(secs) if secs <= 0 => {
                return Err(ConfigError::InvalidValue {
                    field: "cadence_seconds",
                    reason: format!("must be greater than 0, got {secs}"),
                }
                .into());
            }
            Some(_) => {}
        }

        let stream = &self.stream;
        if stream.input_stream.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "input_stream",
            }
            .into());
        }
        if stream.output_stream.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "output_stream",
            }
            .into());
        }
        if stream.input_stream == stream.output_stream {
            return Err(ConfigError::InvalidValue {
                field: "output_stream",
                reason: "must differ from input_stream".to_string(),
            }
            .into());
        }
        if stream.group.trim().is_empty() {
            return Err(ConfigError::MissingField { field: "group" }.into());
        }
        if stream.consumer.trim().is_empty() {
            return Err(ConfigError::MissingField { field: "consumer" }.into());
        }
        if stream.read_count == 0 {
            return Err(ConfigError::InvalidValue {
                field: "read_count",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if stream.io_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "io_timeout_ms",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if stream.max_output_len == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "max_output_len",
                reason: "must be greater than 0 when set".to_string(),
            }
            .into());
        }

        if self.redis.host.trim().is_empty() {
            return Err(ConfigError::MissingField { field: "host" }.into());
        }
        if self.redis.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "port",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if self.redis.db < 0 {
            return Err(ConfigError::InvalidValue {
                field: "db",
                reason: "must be 0 or greater".to_string(),
            }
            .into());
        }
        if self.redis.connection_url().is_none() {
            return Err(ConfigError::InvalidValue {
                field: "host",
                reason: format!("'{}' does not form a valid endpoint", self.redis.host),
            }
            .into());
        }

        let reconnection = &self.reconnection;
        if reconnection.initial_delay_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "initial_delay_ms",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if reconnection.max_delay_ms < reconnection.initial_delay_ms {
            return Err(ConfigError::InvalidValue {
                field: "max_delay_ms",
                reason: "must be >= initial_delay_ms".to_string(),
            }
            .into());
        }
        if reconnection.backoff_multiplier < 1.0 {
            return Err(ConfigError::InvalidValue {
                field: "backoff_multiplier",
                reason: "must be >= 1.0".to_string(),
            }
            .into());
        }
        if reconnection.degraded_after == 0 {
            return Err(ConfigError::InvalidValue {
                field: "degraded_after",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if reconnection.startup_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "startup_timeout_secs",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }

        if self.service.simulation_timeout_secs == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "simulation_timeout_secs",
                reason: "must be greater than 0 when set".to_string(),
            }
            .into());
        }

        let simulation = &self.simulation;
        if simulation.engine_command.is_empty() {
            return Err(ConfigError::MissingField {
                field: "engine_command",
            }
            .into());
        }
        let generator = &simulation.generator;
        if generator.enabled {
            if generator.command.is_empty() {
                return Err(ConfigError::MissingField {
                    field: "generator.command",
                }
                .into());
            }
            if generator
                .park_name
                .as_deref()
                .map_or(true, |name| name.trim().is_empty())
            {
                return Err(ConfigError::MissingField {
                    field: "generator.park_name",
                }
                .into());
            }
        } else if simulation.park_config.is_none() {
            return Err(ConfigError::MissingField {
                field: "park_config",
            }
            .into());
        }

        Ok(())
    }

    /// Initialize logging with the configured settings.
    pub fn init_logging(&self) {
        self.logging.init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    const MINIMAL: &str = r#"
[service]
cadence_seconds = 20

[stream]
input_stream = "forecast"
output_stream = "eolica"

[simulation]
park_config = "park.yaml"
engine_command = ["eolica-engine"]
"#;

    #[test]
    fn minimal_config_applies_defaults() {
        let config = Config::parse_toml(MINIMAL).unwrap();

        assert_eq!(config.service.cadence().as_secs(), 20);
        assert_eq!(config.stream.group, "eolica-runtime");
        assert_eq!(config.stream.read_count, 16);
        assert_eq!(config.redis.port, 6379);
        assert_eq!(config.reconnection.degraded_after, 3);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.simulation.generator.scenario, "BaselineAlkmaar");
    }

    #[test]
    fn zero_cadence_is_rejected() {
        let toml = MINIMAL.replace("cadence_seconds = 20", "cadence_seconds = 0");
        let err = Config::parse_toml(&toml).unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::InvalidValue {
                field: "cadence_seconds",
                ..
            })
        ));
    }

    #[test]
    fn negative_cadence_is_rejected() {
        let toml = MINIMAL.replace("cadence_seconds = 20", "cadence_seconds = -5");
        assert!(matches!(
            Config::parse_toml(&toml),
            Err(Error::Config(ConfigError::InvalidValue {
                field: "cadence_seconds",
                ..
            }))
        ));
    }

    #[test]
    fn missing_cadence_is_reported() {
        let toml = MINIMAL.replace("cadence_seconds = 20", "");
        assert!(matches!(
            Config::parse_toml(&toml),
            Err(Error::Config(ConfigError::MissingField {
                field: "cadence_seconds"
            }))
        ));
    }

    #[test]
    fn identical_streams_are_rejected() {
        let toml = MINIMAL.replace("output_stream = \"eolica\"", "output_stream = \"forecast\"");
        assert!(matches!(
            Config::parse_toml(&toml),
            Err(Error::Config(ConfigError::InvalidValue {
                field: "output_stream",
                ..
            }))
        ));
    }

    #[test]
    fn generator_requires_park_name() {
        let toml = format!(
            "{MINIMAL}\n[simulation.generator]\nenabled = true\ncommand = [\"gen\"]\n"
        );
        assert!(matches!(
            Config::parse_toml(&toml),
            Err(Error::Config(ConfigError::MissingField {
                field: "generator.park_name"
            }))
        ));
    }

    #[test]
    fn generator_removes_need_for_static_park() {
        let toml = r#"
[service]
cadence_seconds = 60

[stream]
input_stream = "forecast"
output_stream = "eolica"

[simulation]
engine_command = ["eolica-engine"]

[simulation.generator]
enabled = true
command = ["eolica-configgen"]
park_name = "Windpark Alkmaar"
"#;
        let config = Config::parse_toml(toml).unwrap();
        assert!(config.simulation.park_config.is_none());
        assert!(config.simulation.generator.enabled);
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        assert!(matches!(
            Config::parse_toml("[service\ncadence_seconds = 1"),
            Err(Error::Config(ConfigError::Parse(_)))
        ));
    }
}
