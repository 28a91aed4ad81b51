//! Runtime health reporting.
//!
//! Static checks cover the loaded configuration; the live `stream_session`
//! check reflects the reconnecting stream's current [`StreamHealth`]. A
//! degraded stream is reported but is not critical: the runtime keeps
//! ticking and retries on its own.

use crate::domain::StreamHealth;
use crate::infrastructure::config::settings::Config;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Unhealthy(String),
}

#[derive(Debug, Clone)]
pub struct HealthCheck {
    name: &'static str,
    critical: bool,
    status: HealthStatus,
}

impl HealthCheck {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn critical(&self) -> bool {
        self.critical
    }

    pub fn status(&self) -> &HealthStatus {
        &self.status
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self.status, HealthStatus::Healthy)
    }
}

#[derive(Debug, Clone)]
pub struct HealthReport {
    checks: Vec<HealthCheck>,
}

impl HealthReport {
    pub fn checks(&self) -> &[HealthCheck] {
        &self.checks
    }

    pub fn check(&self, name: &str) -> Option<&HealthCheck> {
        self.checks.iter().find(|check| check.name == name)
    }

    pub fn is_healthy(&self) -> bool {
        self.checks
            .iter()
            .filter(|check| check.critical())
            .all(HealthCheck::is_healthy)
    }
}

fn require(name: &'static str, ok: bool, reason: impl FnOnce() -> String) -> HealthCheck {
    HealthCheck {
        name,
        critical: true,
        status: if ok {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy(reason())
        },
    }
}

/// Configuration-only checks, usable before the runtime starts.
pub fn health_check(config: &Config) -> HealthReport {
    let stream = &config.stream;
    let simulation = &config.simulation;

    let checks = vec![
        require("redis_endpoint", config.redis.connection_url().is_some(), || {
            format!("'{}' is not a valid endpoint", config.redis.endpoint())
        }),
        require("input_stream", !stream.input_stream.trim().is_empty(), || {
            "input_stream is empty".to_string()
        }),
        require(
            "output_stream",
            !stream.output_stream.trim().is_empty()
                && stream.output_stream != stream.input_stream,
            || "output_stream is empty or equals input_stream".to_string(),
        ),
        require(
            "simulation_engine",
            !simulation.engine_command.is_empty()
                && (simulation.park_config.is_some() || simulation.generator.enabled),
            || "engine_command or park configuration missing".to_string(),
        ),
    ];

    HealthReport { checks }
}

/// Static checks plus the live stream session state.
pub fn runtime_health(config: &Config, stream: StreamHealth) -> HealthReport {
    let mut report = health_check(config);
    report.checks.push(HealthCheck {
        name: "stream_session",
        critical: false,
        status: match stream {
            StreamHealth::Healthy => HealthStatus::Healthy,
            degraded @ StreamHealth::Degraded { .. } => {
                HealthStatus::Unhealthy(degraded.to_string())
            }
        },
    });
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit;

    #[test]
    fn health_report_is_healthy_when_all_critical_pass() {
        let report = HealthReport {
            checks: vec![
                HealthCheck {
                    name: "critical_pass",
                    critical: true,
                    status: HealthStatus::Healthy,
                },
                HealthCheck {
                    name: "non_critical_fail",
                    critical: false,
                    status: HealthStatus::Unhealthy("warning".to_string()),
                },
            ],
        };

        assert!(report.is_healthy());
    }

    #[test]
    fn valid_config_passes_every_static_check() {
        let report = health_check(&testkit::config::runtime(20));

        assert!(report.is_healthy());
        let names: Vec<_> = report.checks().iter().map(HealthCheck::name).collect();
        assert_eq!(
            names,
            vec![
                "redis_endpoint",
                "input_stream",
                "output_stream",
                "simulation_engine"
            ]
        );
    }

    #[test]
    fn default_config_fails_stream_checks() {
        let report = health_check(&Config::default());

        assert!(!report.is_healthy());
        assert!(!report.check("input_stream").unwrap().is_healthy());
    }

    #[test]
    fn degraded_stream_is_reported_but_not_critical() {
        let report = runtime_health(
            &testkit::config::runtime(20),
            StreamHealth::Degraded {
                consecutive_failures: 4,
            },
        );

        let session = report.check("stream_session").unwrap();
        assert!(!session.is_healthy());
        assert!(!session.critical());
        assert!(report.is_healthy());
    }
}
