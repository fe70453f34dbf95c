//! Pipeline, stage and step specifications.

use super::Containment;
use crate::errors::{ErrorInfo, PipelineValidationError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// A single external command within a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepSpec {
    /// Optional human-readable label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Program to run.
    pub command: String,
    /// Arguments, passed through unchanged.
    #[serde(default)]
    pub args: Vec<String>,
    /// Step-specific environment, overlaid on the pipeline environment.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    /// Working directory, relative to the stage's.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
}

impl StepSpec {
    /// Creates a step running `command` with no arguments.
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            label: None,
            command: command.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            working_dir: None,
        }
    }

    /// Sets the arguments.
    #[must_use]
    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Appends one argument.
    #[must_use]
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Sets the label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Adds an environment variable.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Sets the working directory.
    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Returns the label, or the command line when unlabelled.
    #[must_use]
    pub fn display_name(&self) -> String {
        match &self.label {
            Some(label) => label.clone(),
            None if self.args.is_empty() => self.command.clone(),
            None => format!("{} {}", self.command, self.args.join(" ")),
        }
    }

    /// Validates the step.
    ///
    /// # Errors
    ///
    /// Returns an error if the command is empty.
    pub fn validate(&self, stage: &str, index: usize) -> Result<(), PipelineValidationError> {
        if self.command.trim().is_empty() {
            return Err(PipelineValidationError::new(format!(
                "Step {} of stage '{}' has an empty command",
                index + 1,
                stage
            ))
            .with_stages(vec![stage.to_string()])
            .with_error_info(
                ErrorInfo::new("STEP-EMPTY-COMMAND", "A step must name a command to run")
                    .with_context_entry("step", (index + 1).to_string()),
            ));
        }
        Ok(())
    }
}

/// A named phase of the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSpec {
    /// Stage name, unique within the pipeline.
    pub name: String,
    /// Steps, executed in order.
    pub steps: Vec<StepSpec>,
    /// Failure containment policy.
    #[serde(default)]
    pub containment: Containment,
    /// Working directory, relative to the pipeline's.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
}

impl StageSpec {
    /// Creates an empty stage.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
            containment: Containment::None,
            working_dir: None,
        }
    }

    /// Appends a step.
    #[must_use]
    pub fn with_step(mut self, step: StepSpec) -> Self {
        self.steps.push(step);
        self
    }

    /// Sets the containment policy.
    #[must_use]
    pub fn with_containment(mut self, containment: Containment) -> Self {
        self.containment = containment;
        self
    }

    /// Shorthand for `downgrade-to-unstable` containment.
    #[must_use]
    pub fn contained(self) -> Self {
        self.with_containment(Containment::DowngradeToUnstable)
    }

    /// Sets the working directory.
    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Validates the stage and its steps.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is blank, there are no steps, or a step
    /// is invalid.
    pub fn validate(&self) -> Result<(), PipelineValidationError> {
        if self.name.trim().is_empty() {
            return Err(PipelineValidationError::new("Stage name cannot be empty")
                .with_error_info(
                    ErrorInfo::new("STAGE-EMPTY-NAME", "Every stage needs a name")
                        .with_fix_hint("Give the stage a short, unique name."),
                ));
        }

        if self.steps.is_empty() {
            return Err(PipelineValidationError::new(format!(
                "Stage '{}' has no steps",
                self.name
            ))
            .with_stages(vec![self.name.clone()])
            .with_error_info(
                ErrorInfo::new("STAGE-NO-STEPS", "A stage must contain at least one step")
                    .with_fix_hint("Add a step or remove the stage."),
            ));
        }

        for (index, step) in self.steps.iter().enumerate() {
            step.validate(&self.name, index)?;
        }

        Ok(())
    }
}

/// A validated pipeline, built once and interpreted by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pipeline {
    pub(crate) name: String,
    pub(crate) stages: Vec<StageSpec>,
    pub(crate) working_dir: Option<PathBuf>,
    pub(crate) env: BTreeMap<String, String>,
}

impl Pipeline {
    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the stages in declared order.
    #[must_use]
    pub fn stages(&self) -> &[StageSpec] {
        &self.stages
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Returns the total number of steps.
    #[must_use]
    pub fn step_count(&self) -> usize {
        self.stages.iter().map(|s| s.steps.len()).sum()
    }

    /// Returns the base working directory, if set.
    #[must_use]
    pub fn working_dir(&self) -> Option<&PathBuf> {
        self.working_dir.as_ref()
    }

    /// Returns the pipeline-wide environment.
    #[must_use]
    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// Replaces the base working directory.
    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_spec_creation() {
        let step = StepSpec::new("python3")
            .with_args(["snyk.py", "--scan-for-push"])
            .with_arg("--repo-path=./")
            .with_env("SNYK_ORG", "acme");

        assert_eq!(step.args.len(), 3);
        assert_eq!(step.display_name(), "python3 snyk.py --scan-for-push --repo-path=./");
        assert_eq!(step.with_label("SAST").display_name(), "SAST");
    }

    #[test]
    fn test_step_empty_command() {
        let err = StepSpec::new("  ").validate("scan", 0).unwrap_err();
        assert_eq!(err.code(), Some("STEP-EMPTY-COMMAND"));
    }

    #[test]
    fn test_stage_spec_creation() {
        let stage = StageSpec::new("SCA")
            .with_step(StepSpec::new("python3").with_arg("snyk_test.py"))
            .contained();

        assert_eq!(stage.steps.len(), 1);
        assert_eq!(stage.containment, Containment::DowngradeToUnstable);
        assert!(stage.validate().is_ok());
    }

    #[test]
    fn test_stage_without_steps() {
        let err = StageSpec::new("empty").validate().unwrap_err();
        assert_eq!(err.code(), Some("STAGE-NO-STEPS"));
        assert_eq!(err.stages, vec!["empty".to_string()]);
    }

    #[test]
    fn test_stage_blank_name() {
        let err = StageSpec::new(" ")
            .with_step(StepSpec::new("true"))
            .validate()
            .unwrap_err();
        assert_eq!(err.code(), Some("STAGE-EMPTY-NAME"));
    }

    #[test]
    fn test_stage_deserialize_defaults() {
        let stage: StageSpec = serde_json::from_str(
            r#"{"name": "Monitor", "steps": [{"command": "python3", "args": ["monitor.py"]}]}"#,
        )
        .unwrap();

        assert_eq!(stage.containment, Containment::None);
        assert!(stage.working_dir.is_none());
        assert_eq!(stage.steps[0].args, vec!["monitor.py".to_string()]);
    }
}
