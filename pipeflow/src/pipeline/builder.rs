//! Pipeline builder with validation.

use super::{Pipeline, StageSpec};
use crate::errors::{ErrorInfo, PipelineValidationError};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Builder for creating validated pipelines.
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    name: String,
    stages: Vec<StageSpec>,
    working_dir: Option<PathBuf>,
    env: BTreeMap<String, String>,
}

impl PipelineBuilder {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
            working_dir: None,
            env: BTreeMap::new(),
        }
    }

    /// Appends a stage to the pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if the stage is invalid or its name is taken.
    pub fn stage(mut self, spec: StageSpec) -> Result<Self, PipelineValidationError> {
        self.add_stage(spec)?;
        Ok(self)
    }

    /// Appends a stage in place.
    ///
    /// # Errors
    ///
    /// Returns an error if the stage is invalid or its name is taken.
    pub fn add_stage(&mut self, spec: StageSpec) -> Result<(), PipelineValidationError> {
        spec.validate()?;

        if self.stages.iter().any(|s| s.name == spec.name) {
            return Err(duplicate_stage(&spec.name));
        }

        self.stages.push(spec);
        Ok(())
    }

    /// Sets the base working directory.
    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Adds a pipeline-wide environment variable.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Appends every stage of `other` after this builder's stages.
    ///
    /// `other`'s environment is merged in; on key clashes this builder wins.
    ///
    /// # Errors
    ///
    /// Returns an error if both builders define a stage with the same name.
    pub fn compose(mut self, other: Self) -> Result<Self, PipelineValidationError> {
        self.name = format!("{}+{}", self.name, other.name);

        for stage in other.stages {
            if self.stages.iter().any(|s| s.name == stage.name) {
                return Err(duplicate_stage(&stage.name));
            }
            self.stages.push(stage);
        }

        for (key, value) in other.env {
            self.env.entry(key).or_insert(value);
        }
        if self.working_dir.is_none() {
            self.working_dir = other.working_dir;
        }

        Ok(self)
    }

    /// Builds the pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is blank or there are no stages.
    pub fn build(self) -> Result<Pipeline, PipelineValidationError> {
        if self.name.trim().is_empty() {
            return Err(
                PipelineValidationError::new("Pipeline name cannot be empty or whitespace-only")
                    .with_error_info(ErrorInfo::new(
                        "PIPELINE-EMPTY-NAME",
                        "A pipeline needs a name",
                    )),
            );
        }

        if self.stages.is_empty() {
            return Err(PipelineValidationError::new("Pipeline has no stages")
                .with_error_info(
                    ErrorInfo::new("PIPELINE-EMPTY", "Cannot build an empty pipeline")
                        .with_fix_hint("Add at least one stage to the pipeline before building."),
                ));
        }

        Ok(Pipeline {
            name: self.name,
            stages: self.stages,
            working_dir: self.working_dir,
            env: self.env,
        })
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }
}

fn duplicate_stage(name: &str) -> PipelineValidationError {
    PipelineValidationError::new(format!("Duplicate stage name '{name}'"))
        .with_stages(vec![name.to_string()])
        .with_error_info(
            ErrorInfo::new(
                "PIPELINE-DUPLICATE-STAGE",
                format!("Stage '{name}' is defined more than once"),
            )
            .with_fix_hint("Stage names must be unique within a pipeline."),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::StepSpec;

    fn stage(name: &str) -> StageSpec {
        StageSpec::new(name).with_step(StepSpec::new("true"))
    }

    #[test]
    fn test_builder_creation() {
        let builder = PipelineBuilder::new("scan");
        assert_eq!(builder.name(), "scan");
        assert_eq!(builder.stage_count(), 0);
    }

    #[test]
    fn test_builder_preserves_order() {
        let pipeline = PipelineBuilder::new("scan")
            .stage(stage("checkout"))
            .unwrap()
            .stage(stage("sast"))
            .unwrap()
            .stage(stage("sca"))
            .unwrap()
            .build()
            .unwrap();

        let names: Vec<&str> = pipeline.stages().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["checkout", "sast", "sca"]);
        assert_eq!(pipeline.step_count(), 3);
    }

    #[test]
    fn test_builder_duplicate_stage() {
        let err = PipelineBuilder::new("scan")
            .stage(stage("sast"))
            .unwrap()
            .stage(stage("sast"))
            .unwrap_err();

        assert_eq!(err.code(), Some("PIPELINE-DUPLICATE-STAGE"));
    }

    #[test]
    fn test_builder_rejects_invalid_stage() {
        let err = PipelineBuilder::new("scan")
            .stage(StageSpec::new("empty"))
            .unwrap_err();
        assert_eq!(err.code(), Some("STAGE-NO-STEPS"));
    }

    #[test]
    fn test_builder_empty_build() {
        let err = PipelineBuilder::new("scan").build().unwrap_err();
        assert_eq!(err.code(), Some("PIPELINE-EMPTY"));
    }

    #[test]
    fn test_builder_blank_name() {
        let err = PipelineBuilder::new("   ")
            .stage(stage("sast"))
            .unwrap()
            .build()
            .unwrap_err();
        assert_eq!(err.code(), Some("PIPELINE-EMPTY-NAME"));
    }

    #[test]
    fn test_builder_compose() {
        let checkout = PipelineBuilder::new("checkout")
            .with_env("BRANCH", "main")
            .stage(stage("checkout"))
            .unwrap();
        let scan = PipelineBuilder::new("scan")
            .with_env("BRANCH", "feature")
            .with_env("MODE", "push")
            .stage(stage("sast"))
            .unwrap();

        let pipeline = checkout.compose(scan).unwrap().build().unwrap();
        assert_eq!(pipeline.name(), "checkout+scan");
        assert_eq!(pipeline.stage_count(), 2);
        assert_eq!(pipeline.env().get("BRANCH"), Some(&"main".to_string()));
        assert_eq!(pipeline.env().get("MODE"), Some(&"push".to_string()));
    }

    #[test]
    fn test_builder_compose_conflict() {
        let a = PipelineBuilder::new("a").stage(stage("shared")).unwrap();
        let b = PipelineBuilder::new("b").stage(stage("shared")).unwrap();

        assert!(a.compose(b).is_err());
    }
}
