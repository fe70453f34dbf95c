//! Stage-level error containment.

use crate::core::BuildResult;
use crate::errors::StepError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a stage reacts when one of its steps fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Containment {
    /// Propagate the failure: the stage fails and the pipeline stops.
    #[default]
    None,
    /// Catch the failure: the stage becomes unstable and the pipeline continues.
    DowngradeToUnstable,
}

impl Containment {
    /// Maps a step failure to the stage result under this policy.
    ///
    /// Aborts pass through untouched regardless of policy.
    #[must_use]
    pub fn stage_result(self, error: &StepError) -> BuildResult {
        if !error.is_containable() {
            return BuildResult::Aborted;
        }
        match self {
            Self::None => BuildResult::Failure,
            Self::DowngradeToUnstable => BuildResult::Unstable,
        }
    }

    /// Returns true if failures are caught.
    #[must_use]
    pub fn is_contained(self) -> bool {
        matches!(self, Self::DowngradeToUnstable)
    }
}

impl fmt::Display for Containment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::DowngradeToUnstable => write!(f, "downgrade-to-unstable"),
        }
    }
}

impl FromStr for Containment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "none" => Ok(Self::None),
            "downgrade-to-unstable" => Ok(Self::DowngradeToUnstable),
            other => Err(format!(
                "unknown containment '{other}' (expected 'none' or 'downgrade-to-unstable')"
            )),
        }
    }
}
