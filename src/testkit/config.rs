//! Canonical test configurations.
//!
//! Single source of truth for config structs used across tests.
//! Avoids each test module defining its own slightly-different defaults.

use std::path::PathBuf;

use crate::infrastructure::config::service::{ReconnectionConfig, ServiceConfig};
use crate::infrastructure::config::settings::Config;
use crate::infrastructure::config::simulation::SimulationConfig;
use crate::infrastructure::config::stream::StreamConfig;

/// Input stream name used by test configs and the in-memory stream.
pub const INPUT_STREAM: &str = "forecast";

/// Output stream name used by test configs.
pub const OUTPUT_STREAM: &str = "eolica";

/// Fast reconnection config: millisecond delays, degraded after 2 failures.
pub fn reconnection() -> ReconnectionConfig {
    ReconnectionConfig {
        initial_delay_ms: 10,
        max_delay_ms: 40,
        backoff_multiplier: 2.0,
        degraded_after: 2,
        startup_timeout_secs: 1,
    }
}

/// A complete, valid configuration with the given cadence.
///
/// Points at a static park file that does not need to exist; tests that
/// build the runtime from this config inject the engine directly.
pub fn runtime(cadence_seconds: i64) -> Config {
    Config {
        service: ServiceConfig {
            cadence_seconds: Some(cadence_seconds),
            shutdown_grace_secs: 1,
            simulation_timeout_secs: None,
        },
        stream: StreamConfig {
            input_stream: INPUT_STREAM.to_string(),
            output_stream: OUTPUT_STREAM.to_string(),
            io_timeout_ms: 200,
            ..StreamConfig::default()
        },
        reconnection: reconnection(),
        simulation: SimulationConfig {
            park_config: Some(PathBuf::from("park.yaml")),
            engine_command: vec!["eolica-engine".to_string()],
            ..SimulationConfig::default()
        },
        ..Config::default()
    }
}

/// Minimal TOML accepted by [`Config::parse_toml`].
pub const MINIMAL_TOML: &str = r#"
[service]
cadence_seconds = 20

[stream]
input_stream = "forecast"
output_stream = "eolica"

[simulation]
park_config = "park.yaml"
engine_command = ["eolica-engine"]
"#;
