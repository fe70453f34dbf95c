//! Run reports.
//!
//! A [`PipelineReport`] is the complete record of one run: per-stage and
//! per-step outcomes plus the aggregated [`BuildResult`]. Reports serialize
//! to JSON so a run can be archived next to the scan outputs.

use super::{Containment, StepSpec};
use crate::core::{BuildResult, StepOutput, StepStatus};
use crate::errors::{PipeflowError, StepError};
use crate::utils::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use uuid::Uuid;

/// Outcome of one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepReport {
    /// Label or command line.
    pub name: String,
    /// Program that was (or would have been) run.
    pub command: String,
    /// Arguments.
    #[serde(default)]
    pub args: Vec<String>,
    /// Status.
    pub status: StepStatus,
    /// Exit code, when the child exited normally.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// Captured stdout.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub stdout: String,
    /// Captured stderr.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub stderr: String,
    /// Duration in milliseconds.
    #[serde(default)]
    pub duration_ms: f64,
    /// Error message, for steps that did not pass.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepReport {
    fn base(step: &StepSpec, status: StepStatus) -> Self {
        Self {
            name: step.display_name(),
            command: step.command.clone(),
            args: step.args.clone(),
            status,
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            duration_ms: 0.0,
            error: None,
        }
    }

    /// A step that was never reached.
    #[must_use]
    pub fn skipped(step: &StepSpec) -> Self {
        Self::base(step, StepStatus::Skipped)
    }

    /// A step whose child process exited.
    #[must_use]
    pub fn from_output(step: &StepSpec, output: &StepOutput, error: Option<&StepError>) -> Self {
        let status = match (output.exit_code, error) {
            (Some(0), None) => StepStatus::Passed,
            (Some(_), _) => StepStatus::Failed,
            (None, _) => StepStatus::Aborted,
        };
        Self {
            exit_code: output.exit_code,
            stdout: output.stdout_lossy(),
            stderr: output.stderr_lossy(),
            duration_ms: output.duration_ms,
            error: error.map(ToString::to_string),
            ..Self::base(step, status)
        }
    }

    /// A step that failed before or without producing output.
    #[must_use]
    pub fn from_error(step: &StepSpec, error: &StepError) -> Self {
        let status = match error {
            StepError::Execution(_) => StepStatus::Errored,
            StepError::NonZeroExit { .. } => StepStatus::Failed,
            StepError::Terminated { .. } | StepError::Cancelled { .. } => StepStatus::Aborted,
        };
        Self {
            error: Some(error.to_string()),
            ..Self::base(step, status)
        }
    }
}

/// Outcome of one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageReport {
    /// Stage name.
    pub name: String,
    /// Containment policy the stage ran under.
    pub containment: Containment,
    /// Stage result.
    pub result: BuildResult,
    /// Step outcomes in declared order, including skipped steps.
    pub steps: Vec<StepReport>,
    /// The failure that ended the stage, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Duration in milliseconds.
    #[serde(default)]
    pub duration_ms: f64,
}

impl StageReport {
    /// Returns the steps that were actually attempted.
    pub fn executed_steps(&self) -> impl Iterator<Item = &StepReport> {
        self.steps.iter().filter(|s| s.status.was_attempted())
    }

    /// Returns the first step that did not pass.
    #[must_use]
    pub fn failed_step(&self) -> Option<&StepReport> {
        self.steps.iter().find(|s| s.status.is_failure())
    }
}

/// Record of a full pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    /// Unique id of this run.
    pub run_id: Uuid,
    /// Pipeline name.
    pub pipeline: String,
    /// Aggregated result: the worst stage result.
    pub result: BuildResult,
    /// Reports of the stages that ran, in order.
    pub stages: Vec<StageReport>,
    /// Stages skipped after an early termination.
    #[serde(default)]
    pub not_run: Vec<String>,
    /// When the run started.
    pub started_at: Timestamp,
    /// When the run finished.
    pub finished_at: Timestamp,
    /// Duration in milliseconds.
    pub duration_ms: f64,
}

impl PipelineReport {
    /// Looks up a stage report by name.
    #[must_use]
    pub fn stage(&self, name: &str) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// Returns true if the named stage ran.
    #[must_use]
    pub fn ran(&self, name: &str) -> bool {
        self.stage(name).is_some()
    }

    /// Summarises the run.
    #[must_use]
    pub fn summary(&self) -> ReportSummary {
        let names_with = |result: BuildResult| -> Vec<String> {
            self.stages
                .iter()
                .filter(|s| s.result == result)
                .map(|s| s.name.clone())
                .collect()
        };
        let executed: Vec<&StepReport> =
            self.stages.iter().flat_map(StageReport::executed_steps).collect();

        ReportSummary {
            pipeline: self.pipeline.clone(),
            result: self.result,
            stages_run: self.stages.len(),
            stages_not_run: self.not_run.len(),
            unstable_stages: names_with(BuildResult::Unstable),
            failed_stages: names_with(BuildResult::Failure),
            aborted_stages: names_with(BuildResult::Aborted),
            steps_run: executed.len(),
            steps_failed: executed.iter().filter(|s| s.status.is_failure()).count(),
            duration_ms: self.duration_ms,
        }
    }

    /// Serializes the report as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_string(&self) -> Result<String, PipeflowError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Writes the report as JSON, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), PipeflowError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json_string()?)?;
        tracing::info!(path = %path.display(), "Run report saved");
        Ok(())
    }

    /// Reads a report previously written with [`Self::write_json`].
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn read_json(path: impl AsRef<Path>) -> Result<Self, PipeflowError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// Condensed view of a [`PipelineReport`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    /// Pipeline name.
    pub pipeline: String,
    /// Aggregated result.
    pub result: BuildResult,
    /// Number of stages that ran.
    pub stages_run: usize,
    /// Number of stages that never ran.
    pub stages_not_run: usize,
    /// Stages that ended unstable.
    pub unstable_stages: Vec<String>,
    /// Stages that failed.
    pub failed_stages: Vec<String>,
    /// Stages that were aborted.
    pub aborted_stages: Vec<String>,
    /// Steps attempted.
    pub steps_run: usize,
    /// Steps that did not pass.
    pub steps_failed: usize,
    /// Duration in milliseconds.
    pub duration_ms: f64,
}

impl fmt::Display for ReportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Pipeline '{}' finished: {}", self.pipeline, self.result)?;
        writeln!(
            f,
            "  stages: {} run, {} not run",
            self.stages_run, self.stages_not_run
        )?;
        writeln!(f, "  steps:  {} run, {} failed", self.steps_run, self.steps_failed)?;
        for (label, names) in [
            ("unstable", &self.unstable_stages),
            ("failed", &self.failed_stages),
            ("aborted", &self.aborted_stages),
        ] {
            if !names.is_empty() {
                writeln!(f, "  {label}: {}", names.join(", "))?;
            }
        }
        write!(f, "  duration: {:.0} ms", self.duration_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ExecutionError;
    use crate::utils::now_utc;
    use pretty_assertions::assert_eq;

    fn step() -> StepSpec {
        StepSpec::new("python3").with_args(["snyk.py", "--scan-for-push"])
    }

    fn stage(name: &str, result: BuildResult, steps: Vec<StepReport>) -> StageReport {
        StageReport {
            name: name.to_string(),
            containment: Containment::None,
            result,
            steps,
            error: None,
            duration_ms: 1.0,
        }
    }

    fn report() -> PipelineReport {
        let passed = StepReport::from_output(&step(), &StepOutput::exited(0), None);
        let error = StepError::NonZeroExit {
            command: "python3".to_string(),
            exit_code: 1,
        };
        let failed = StepReport::from_output(&step(), &StepOutput::exited(1), Some(&error));

        PipelineReport {
            run_id: Uuid::new_v4(),
            pipeline: "security-scan".to_string(),
            result: BuildResult::Unstable,
            stages: vec![
                stage("checkout", BuildResult::Success, vec![passed]),
                stage("sast", BuildResult::Unstable, vec![failed, StepReport::skipped(&step())]),
            ],
            not_run: vec![],
            started_at: now_utc(),
            finished_at: now_utc(),
            duration_ms: 12.0,
        }
    }

    #[test]
    fn test_step_report_statuses() {
        let passed = StepReport::from_output(&step(), &StepOutput::exited(0), None);
        assert_eq!(passed.status, StepStatus::Passed);
        assert_eq!(passed.name, "python3 snyk.py --scan-for-push");

        let killed = StepReport::from_output(&step(), &StepOutput::terminated(), None);
        assert_eq!(killed.status, StepStatus::Aborted);

        let launch = StepError::from(ExecutionError::NotFound {
            command: "python3".to_string(),
        });
        let errored = StepReport::from_error(&step(), &launch);
        assert_eq!(errored.status, StepStatus::Errored);
        assert_eq!(errored.error.as_deref(), Some("command not found: python3"));
    }

    #[test]
    fn test_stage_report_helpers() {
        let report = report();
        let sast = report.stage("sast").unwrap();

        assert_eq!(sast.executed_steps().count(), 1);
        assert_eq!(sast.failed_step().unwrap().exit_code, Some(1));
        assert!(report.ran("checkout"));
        assert!(!report.ran("sca"));
    }

    #[test]
    fn test_summary() {
        let summary = report().summary();

        assert_eq!(summary.result, BuildResult::Unstable);
        assert_eq!(summary.stages_run, 2);
        assert_eq!(summary.steps_run, 2);
        assert_eq!(summary.steps_failed, 1);
        assert_eq!(summary.unstable_stages, vec!["sast".to_string()]);
        assert!(summary.failed_stages.is_empty());

        let text = summary.to_string();
        assert!(text.contains("finished: UNSTABLE"));
        assert!(text.contains("unstable: sast"));
    }

    #[test]
    fn test_write_and_read_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("outputs").join("run.json");

        let report = report();
        report.write_json(&path).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["result"], "UNSTABLE");
        assert_eq!(raw["stages"][1]["containment"], "none");
        assert_eq!(raw["stages"][1]["steps"][1]["status"], "skipped");

        let loaded = PipelineReport::read_json(&path).unwrap();
        assert_eq!(loaded.run_id, report.run_id);
        assert_eq!(loaded.stages.len(), 2);
    }
}
