//! Engine configuration and pipeline definition files.

use crate::errors::{ConfigError, PipelineValidationError};
use crate::pipeline::{Pipeline, PipelineBuilder, StageSpec};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

/// Environment variable overriding [`EngineConfig::default_working_dir`].
pub const ENV_WORKING_DIR: &str = "PIPEFLOW_WORKING_DIR";
/// Environment variable that, when truthy, stops steps inheriting the environment.
pub const ENV_CLEAR_ENV: &str = "PIPEFLOW_CLEAR_ENV";
/// Environment variable that, when truthy, logs captured step output.
pub const ENV_LOG_STEP_OUTPUT: &str = "PIPEFLOW_LOG_STEP_OUTPUT";

/// Engine-wide settings that are not part of a pipeline definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Base directory for pipelines that do not set one.
    #[serde(default)]
    pub default_working_dir: Option<PathBuf>,
    /// Whether steps inherit the engine's environment.
    #[serde(default = "default_inherit_env")]
    pub inherit_env: bool,
    /// Whether captured stdout/stderr is written to the log.
    #[serde(default)]
    pub log_step_output: bool,
}

fn default_inherit_env() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_working_dir: None,
            inherit_env: default_inherit_env(),
            log_step_output: false,
        }
    }
}

impl EngineConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a configuration from `PIPEFLOW_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary variable lookup.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(dir) = lookup(ENV_WORKING_DIR).filter(|d| !d.trim().is_empty()) {
            config.default_working_dir = Some(PathBuf::from(dir));
        }
        if lookup(ENV_CLEAR_ENV).is_some_and(|v| is_truthy(&v)) {
            config.inherit_env = false;
        }
        if lookup(ENV_LOG_STEP_OUTPUT).is_some_and(|v| is_truthy(&v)) {
            config.log_step_output = true;
        }
        config
    }

    /// Sets the default working directory.
    #[must_use]
    pub fn with_default_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.default_working_dir = Some(dir.into());
        self
    }

    /// Sets whether steps inherit the environment.
    #[must_use]
    pub fn with_inherit_env(mut self, inherit: bool) -> Self {
        self.inherit_env = inherit;
        self
    }

    /// Sets whether captured output is logged.
    #[must_use]
    pub fn with_log_step_output(mut self, enabled: bool) -> Self {
        self.log_step_output = enabled;
        self
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// The on-disk shape of a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineDefinition {
    /// Pipeline name.
    pub name: String,
    /// Base working directory; relative paths resolve against the file's directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
    /// Pipeline-wide environment.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    /// Stages in execution order.
    #[serde(default)]
    pub stages: Vec<StageSpec>,
}

impl PipelineDefinition {
    /// Validates the definition and builds the pipeline tree.
    ///
    /// # Errors
    ///
    /// Returns an error if the definition is structurally invalid.
    pub fn into_pipeline(self) -> Result<Pipeline, PipelineValidationError> {
        let mut builder = PipelineBuilder::new(self.name);
        if let Some(dir) = self.working_dir {
            builder = builder.with_working_dir(dir);
        }
        for (key, value) in self.env {
            builder = builder.with_env(key, value);
        }
        for stage in self.stages {
            builder.add_stage(stage)?;
        }
        builder.build()
    }
}

impl From<&Pipeline> for PipelineDefinition {
    fn from(pipeline: &Pipeline) -> Self {
        Self {
            name: pipeline.name().to_string(),
            working_dir: pipeline.working_dir().cloned(),
            env: pipeline.env().clone(),
            stages: pipeline.stages().to_vec(),
        }
    }
}

/// Absolute directory containing the definition file at `path`.
fn definition_dir(path: &Path) -> std::io::Result<PathBuf> {
    let parent = path.parent().unwrap_or_else(|| Path::new(""));
    if parent.is_absolute() {
        Ok(parent.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(parent))
    }
}

/// Parses a pipeline definition from JSON text.
///
/// # Errors
///
/// Returns an error if the text is not valid JSON or the pipeline is invalid.
pub fn parse_pipeline(raw: &str) -> Result<Pipeline, ConfigError> {
    let definition: PipelineDefinition =
        serde_json::from_str(raw).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source,
        })?;
    Ok(definition.into_pipeline()?)
}

/// Loads and validates a pipeline definition file.
///
/// A relative `working_dir` in the file is resolved to an absolute path
/// against the directory containing the file. A definition without one
/// leaves it unset, so the engine's default working directory applies.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or the pipeline
/// is invalid.
pub fn load_pipeline(path: impl AsRef<Path>) -> Result<Pipeline, ConfigError> {
    let path = path.as_ref();
    let read_error = |source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    };
    let raw = std::fs::read_to_string(path).map_err(read_error)?;

    let mut definition: PipelineDefinition =
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    if let Some(dir) = definition.working_dir.take() {
        definition.working_dir = Some(if dir.is_absolute() {
            dir
        } else {
            definition_dir(path).map_err(read_error)?.join(dir)
        });
    }

    let pipeline = definition.into_pipeline()?;
    info!(
        path = %path.display(),
        pipeline = %pipeline.name(),
        stages = pipeline.stage_count(),
        "Pipeline definition loaded"
    );
    Ok(pipeline)
}
