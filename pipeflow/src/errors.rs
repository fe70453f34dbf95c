//! Error types for the pipeflow engine.
//!
//! Step failures come in two flavours that the stage runner treats
//! differently: an [`ExecutionError`] means the command never started,
//! a non-zero exit means it ran and reported failure. Both surface as a
//! [`StepError`] and are subject to the stage's containment policy.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for pipeflow operations.
#[derive(Debug, Error)]
pub enum PipeflowError {
    /// A pipeline validation error occurred.
    #[error("{0}")]
    Validation(#[from] PipelineValidationError),

    /// A pipeline definition could not be loaded.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// A command could not be launched.
    #[error("{0}")]
    Execution(#[from] ExecutionError),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Raised by a step executor when the command cannot be launched.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// The program was not found on `PATH` or at the given path.
    #[error("command not found: {command}")]
    NotFound {
        /// The program name.
        command: String,
    },

    /// The working directory does not exist or is not a directory.
    #[error("working directory '{}' does not exist", path.display())]
    WorkingDirectory {
        /// The missing directory.
        path: PathBuf,
    },

    /// Spawning failed for another reason (permissions, resource limits).
    #[error("failed to launch '{command}': {source}")]
    Launch {
        /// The program name.
        command: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl ExecutionError {
    /// Classifies a spawn error for `command`.
    #[must_use]
    pub fn from_spawn(command: impl Into<String>, source: std::io::Error) -> Self {
        let command = command.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound { command }
        } else {
            Self::Launch { command, source }
        }
    }

    /// Returns the offending command, if the error concerns one.
    #[must_use]
    pub fn command(&self) -> Option<&str> {
        match self {
            Self::NotFound { command } | Self::Launch { command, .. } => Some(command),
            Self::WorkingDirectory { .. } => None,
        }
    }
}

/// Why a single step did not pass.
#[derive(Debug, Error)]
pub enum StepError {
    /// The command could not be launched.
    #[error(transparent)]
    Execution(#[from] ExecutionError),

    /// The command ran and exited non-zero.
    #[error("'{command}' exited with code {exit_code}")]
    NonZeroExit {
        /// The program name.
        command: String,
        /// The exit code.
        exit_code: i32,
    },

    /// The command was killed by a signal.
    #[error("'{command}' was terminated by a signal")]
    Terminated {
        /// The program name.
        command: String,
    },

    /// The run was cancelled before the step started.
    #[error("cancelled: {reason}")]
    Cancelled {
        /// The cancellation reason.
        reason: String,
    },
}

impl StepError {
    /// Returns true if the stage's containment policy may absorb this error.
    ///
    /// Aborts (signals, cancellation) are never contained.
    #[must_use]
    pub fn is_containable(&self) -> bool {
        matches!(self, Self::Execution(_) | Self::NonZeroExit { .. })
    }

    /// Returns the error kind name used in reports and events.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Execution(_) => "ExecutionError",
            Self::NonZeroExit { .. } => "NonZeroExit",
            Self::Terminated { .. } => "Terminated",
            Self::Cancelled { .. } => "Cancelled",
        }
    }
}

/// Metadata about a validation error for better diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ErrorInfo {
    /// Error code (e.g., "PIPELINE-DUPLICATE-STAGE").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ErrorInfo {
    /// Creates a new error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: HashMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Error raised when a pipeline definition is structurally invalid.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct PipelineValidationError {
    /// The error message.
    pub message: String,
    /// The stages involved in the error.
    pub stages: Vec<String>,
    /// Optional error info.
    pub error_info: Option<ErrorInfo>,
}

impl PipelineValidationError {
    /// Creates a new pipeline validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stages: Vec::new(),
            error_info: None,
        }
    }

    /// Sets the stages involved.
    #[must_use]
    pub fn with_stages(mut self, stages: Vec<String>) -> Self {
        self.stages = stages;
        self
    }

    /// Sets the error info.
    #[must_use]
    pub fn with_error_info(mut self, info: ErrorInfo) -> Self {
        self.error_info = Some(info);
        self
    }

    /// Returns the error code, if one was attached.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.error_info.as_ref().map(|info| info.code.as_str())
    }

    /// Converts to a JSON object.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "message": self.message,
            "stages": self.stages,
            "error_info": self.error_info,
        })
    }
}

/// Errors raised while loading a pipeline definition file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read pipeline definition '{}': {source}", path.display())]
    Read {
        /// The definition path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not a valid definition document.
    #[error("failed to parse pipeline definition '{}': {source}", path.display())]
    Parse {
        /// The definition path.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// The definition parsed but describes an invalid pipeline.
    #[error("invalid pipeline definition: {0}")]
    Invalid(#[from] PipelineValidationError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_info_creation() {
        let info = ErrorInfo::new("STAGE-NO-STEPS", "Stage 'sast' has no steps")
            .with_fix_hint("Add at least one step to the stage.")
            .with_context_entry("stage", "sast");

        assert_eq!(info.code, "STAGE-NO-STEPS");
        assert_eq!(info.summary, "Stage 'sast' has no steps");
        assert_eq!(info.fix_hint.as_deref(), Some("Add at least one step to the stage."));
        assert_eq!(info.context.get("stage"), Some(&"sast".to_string()));
    }

    #[test]
    fn test_pipeline_validation_error_to_json() {
        let err = PipelineValidationError::new("Duplicate stage")
            .with_stages(vec!["scan".to_string()])
            .with_error_info(ErrorInfo::new("PIPELINE-DUPLICATE-STAGE", "dup"));

        let json = err.to_json();
        assert_eq!(json["message"], "Duplicate stage");
        assert_eq!(json["stages"][0], "scan");
        assert_eq!(err.code(), Some("PIPELINE-DUPLICATE-STAGE"));
    }

    #[test]
    fn test_execution_error_from_spawn() {
        let not_found = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = ExecutionError::from_spawn("snyk", not_found);
        assert!(matches!(err, ExecutionError::NotFound { .. }));
        assert_eq!(err.command(), Some("snyk"));

        let denied = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        let err = ExecutionError::from_spawn("./monitor.py", denied);
        assert!(matches!(err, ExecutionError::Launch { .. }));
        assert!(err.to_string().contains("./monitor.py"));
    }

    #[test]
    fn test_step_error_containable() {
        let exit = StepError::NonZeroExit {
            command: "python3".to_string(),
            exit_code: 1,
        };
        assert!(exit.is_containable());
        assert_eq!(exit.kind(), "NonZeroExit");
        assert_eq!(exit.to_string(), "'python3' exited with code 1");

        let launch = StepError::from(ExecutionError::NotFound {
            command: "snyk".to_string(),
        });
        assert!(launch.is_containable());

        let killed = StepError::Terminated {
            command: "python3".to_string(),
        };
        assert!(!killed.is_containable());

        let cancelled = StepError::Cancelled {
            reason: "interrupted".to_string(),
        };
        assert!(!cancelled.is_containable());
    }
}
