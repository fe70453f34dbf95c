//! Step status enum.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The execution status of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Step exited zero.
    Passed,
    /// Step exited non-zero.
    Failed,
    /// Step could not be launched.
    Errored,
    /// Step was killed by a signal or the run was cancelled before it.
    Aborted,
    /// Step was never reached.
    #[default]
    Skipped,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passed => write!(f, "passed"),
            Self::Failed => write!(f, "failed"),
            Self::Errored => write!(f, "errored"),
            Self::Aborted => write!(f, "aborted"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

impl StepStatus {
    /// Returns true if the step ran and did not pass.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed | Self::Errored | Self::Aborted)
    }

    /// Returns true if the step was actually attempted.
    #[must_use]
    pub fn was_attempted(&self) -> bool {
        !matches!(self, Self::Skipped)
    }
}
