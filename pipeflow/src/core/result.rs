//! Build result and its severity ordering.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The outcome of a stage or a whole pipeline run.
///
/// Variants are declared in ascending severity, so the derived `Ord`
/// is the severity order `ABORTED > FAILURE > UNSTABLE > SUCCESS`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildResult {
    /// Every step exited zero.
    #[default]
    Success,
    /// A failure was contained by the stage.
    Unstable,
    /// An uncontained failure.
    Failure,
    /// The run was interrupted.
    Aborted,
}

impl BuildResult {
    /// All results in ascending severity.
    pub const ALL: [Self; 4] = [Self::Success, Self::Unstable, Self::Failure, Self::Aborted];

    /// Returns the worse of the two results.
    ///
    /// Combining is monotonic: a result can never be upgraded by
    /// combining it with a less severe one.
    #[must_use]
    pub fn combine(self, other: Self) -> Self {
        self.max(other)
    }

    /// Reduces a sequence of results to the worst one.
    ///
    /// An empty sequence yields `Success`.
    #[must_use]
    pub fn worst_of(results: impl IntoIterator<Item = Self>) -> Self {
        results.into_iter().fold(Self::Success, Self::combine)
    }

    /// Returns true if this result ends the pipeline early.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failure | Self::Aborted)
    }

    /// Returns true for `Success`.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Returns the canonical upper-case name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Unstable => "UNSTABLE",
            Self::Failure => "FAILURE",
            Self::Aborted => "ABORTED",
        }
    }
}

impl fmt::Display for BuildResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuildResult {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SUCCESS" => Ok(Self::Success),
            "UNSTABLE" => Ok(Self::Unstable),
            "FAILURE" => Ok(Self::Failure),
            "ABORTED" => Ok(Self::Aborted),
            other => Err(format!("unknown build result '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_order() {
        assert!(BuildResult::Aborted > BuildResult::Failure);
        assert!(BuildResult::Failure > BuildResult::Unstable);
        assert!(BuildResult::Unstable > BuildResult::Success);
    }

    #[test]
    fn test_combine_is_monotonic() {
        let mut result = BuildResult::Success;
        result = result.combine(BuildResult::Failure);
        result = result.combine(BuildResult::Unstable);
        result = result.combine(BuildResult::Success);
        assert_eq!(result, BuildResult::Failure);
    }

    #[test]
    fn test_worst_of_every_pair() {
        for a in BuildResult::ALL {
            for b in BuildResult::ALL {
                let worst = BuildResult::worst_of([a, b]);
                assert_eq!(worst, a.max(b));
                assert!(worst >= a && worst >= b);
            }
        }
    }

    #[test]
    fn test_worst_of_empty_is_success() {
        assert_eq!(BuildResult::worst_of([]), BuildResult::Success);
    }

    #[test]
    fn test_terminal_results() {
        assert!(BuildResult::Failure.is_terminal());
        assert!(BuildResult::Aborted.is_terminal());
        assert!(!BuildResult::Unstable.is_terminal());
        assert!(!BuildResult::Success.is_terminal());
    }

    #[test]
    fn test_display_and_parse() {
        for result in BuildResult::ALL {
            assert_eq!(result.to_string().parse::<BuildResult>().unwrap(), result);
        }
        assert_eq!("unstable".parse::<BuildResult>().unwrap(), BuildResult::Unstable);
        assert!("broken".parse::<BuildResult>().is_err());
    }

    #[test]
    fn test_serialize() {
        let json = serde_json::to_string(&BuildResult::Unstable).unwrap();
        assert_eq!(json, r#""UNSTABLE""#);

        let parsed: BuildResult = serde_json::from_str(r#""ABORTED""#).unwrap();
        assert_eq!(parsed, BuildResult::Aborted);
    }
}
