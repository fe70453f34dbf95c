//! Child-process step executor.

use super::{StepExecutor, StepInvocation};
use crate::core::StepOutput;
use crate::errors::ExecutionError;
use crate::observability::SpanTimer;
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Variables kept when the parent environment is not inherited.
const PRESERVED_ENV: [&str; 3] = ["PATH", "HOME", "USER"];

/// Runs steps as child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessExecutor;

impl ProcessExecutor {
    /// Creates a new process executor.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StepExecutor for ProcessExecutor {
    async fn execute(&self, invocation: &StepInvocation) -> Result<StepOutput, ExecutionError> {
        if !invocation.working_dir.is_dir() {
            return Err(ExecutionError::WorkingDirectory {
                path: invocation.working_dir.clone(),
            });
        }

        let mut command = Command::new(&invocation.command);
        command
            .args(&invocation.args)
            .current_dir(&invocation.working_dir)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        if !invocation.inherit_env {
            command.env_clear();
            for key in PRESERVED_ENV {
                if let Ok(value) = std::env::var(key) {
                    command.env(key, value);
                }
            }
        }
        command.envs(&invocation.env);

        debug!(
            command = %invocation.display_command(),
            working_dir = %invocation.working_dir.display(),
            "Spawning step"
        );

        let timer = SpanTimer::start(&invocation.command);
        let output = command
            .output()
            .await
            .map_err(|e| ExecutionError::from_spawn(&invocation.command, e))?;

        Ok(StepOutput {
            exit_code: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
            duration_ms: timer.finish(),
        })
    }
}
