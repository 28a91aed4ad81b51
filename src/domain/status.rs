//! Service-level status signals: stream health and lifecycle state.

use std::fmt;

/// Health of the stream backend session as seen by the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamHealth {
    #[default]
    Healthy,
    /// Repeated transient failures; the service keeps running and retrying.
    Degraded { consecutive_failures: u32 },
}

impl StreamHealth {
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }
}

impl fmt::Display for StreamHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => f.write_str("healthy"),
            Self::Degraded {
                consecutive_failures,
            } => write!(f, "degraded ({consecutive_failures} consecutive failures)"),
        }
    }
}

/// Outer lifecycle of the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    #[default]
    Initializing,
    Running,
    ShuttingDown,
    Stopped,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Initializing => "initializing",
            Self::Running => "running",
            Self::ShuttingDown => "shutting_down",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degraded_display_includes_failure_count() {
        let health = StreamHealth::Degraded {
            consecutive_failures: 4,
        };
        assert!(health.is_degraded());
        assert_eq!(health.to_string(), "degraded (4 consecutive failures)");
        assert!(!StreamHealth::Healthy.is_degraded());
    }
}
