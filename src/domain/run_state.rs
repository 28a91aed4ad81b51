//! Per-tick run states and outcomes.

use std::fmt;

use super::id::{RecordId, RunId};

/// Where a single tick currently is.
///
/// Scoped to one tick: ticks are serialized, so a value is never shared
/// between two concurrent runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    #[default]
    Idle,
    Consuming,
    Simulating,
    Publishing,
    FailedTransient,
}

impl RunState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Consuming => "consuming",
            Self::Simulating => "simulating",
            Self::Publishing => "publishing",
            Self::FailedTransient => "failed_transient",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a tick ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// A result was published. `acknowledged` is false when the best-effort
    /// acknowledgement failed afterwards.
    Published {
        run_id: RunId,
        record: RecordId,
        acknowledged: bool,
    },
    /// The stream had nothing new (or only an empty batch).
    NoInput,
    /// The previous run was still in flight; nothing was started.
    OverlapSkipped,
    /// The tick failed in `stage`; the loop carries on.
    Failed { stage: RunState, reason: String },
    /// Shutdown interrupted the tick.
    Cancelled,
}

impl TickOutcome {
    /// State the tick settles in once it is over.
    #[must_use]
    pub const fn final_state(&self) -> RunState {
        match self {
            Self::Failed { .. } => RunState::FailedTransient,
            _ => RunState::Idle,
        }
    }

    #[must_use]
    pub const fn is_published(&self) -> bool {
        matches!(self, Self::Published { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failures_settle_in_failed_transient() {
        let outcome = TickOutcome::Failed {
            stage: RunState::Simulating,
            reason: "engine crashed".into(),
        };
        assert_eq!(outcome.final_state(), RunState::FailedTransient);
        assert_eq!(TickOutcome::NoInput.final_state(), RunState::Idle);
        assert_eq!(TickOutcome::OverlapSkipped.final_state(), RunState::Idle);
    }

    #[test]
    fn run_state_renders_snake_case() {
        assert_eq!(RunState::FailedTransient.to_string(), "failed_transient");
        assert_eq!(RunState::default(), RunState::Idle);
    }
}
