//! Service cadence and shutdown configuration.

use std::time::Duration;

use serde::Deserialize;

/// Scheduling configuration for the run loop.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceConfig {
    /// Interval between tick starts, in seconds. Required, must be > 0.
    ///
    /// Signed so that a negative value surfaces as a validation error rather
    /// than a parse error.
    #[serde(default)]
    pub cadence_seconds: Option<i64>,
    /// How long `stop()` waits for an in-flight run before abandoning it.
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
    /// Optional hard cap on a single simulation run.
    #[serde(default)]
    pub simulation_timeout_secs: Option<u64>,
}

const fn default_shutdown_grace_secs() -> u64 {
    10
}

impl ServiceConfig {
    /// Tick cadence. Only meaningful after validation.
    #[must_use]
    pub fn cadence(&self) -> Duration {
        let secs = self.cadence_seconds.unwrap_or(0).max(0);
        Duration::from_secs(secs.unsigned_abs())
    }

    #[must_use]
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    #[must_use]
    pub fn simulation_timeout(&self) -> Option<Duration> {
        self.simulation_timeout_secs.map(Duration::from_secs)
    }
}

/// Stream reconnection and health configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconnectionConfig {
    /// Initial delay before the first retry (milliseconds).
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Maximum delay between retries (milliseconds).
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Multiplier applied to the delay after each failed attempt.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    /// Consecutive failures before the stream is reported degraded.
    #[serde(default = "default_degraded_after")]
    pub degraded_after: u32,
    /// Time budget for the initial connection.
    #[serde(default = "default_startup_timeout_secs")]
    pub startup_timeout_secs: u64,
}

fn default_initial_delay_ms() -> u64 {
    1000 // 1 second
}

fn default_max_delay_ms() -> u64 {
    30000 // 30 seconds
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_degraded_after() -> u32 {
    3
}

fn default_startup_timeout_secs() -> u64 {
    30
}

impl ReconnectionConfig {
    #[must_use]
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }
}

impl Default for ReconnectionConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            degraded_after: default_degraded_after(),
            startup_timeout_secs: default_startup_timeout_secs(),
        }
    }
}
