//! Step execution.
//!
//! A [`StepExecutor`] runs one external command to completion and hands back
//! its exit status and captured output. The engine only talks to this trait,
//! so tests swap in a scripted executor while production uses
//! [`ProcessExecutor`].

mod process;

pub use process::ProcessExecutor;

use crate::core::StepOutput;
use crate::errors::ExecutionError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// A fully resolved command ready to be launched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepInvocation {
    /// Program to run.
    pub command: String,
    /// Arguments, passed through unchanged.
    pub args: Vec<String>,
    /// Directory the child starts in.
    pub working_dir: PathBuf,
    /// Extra environment variables.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Whether the child inherits the parent's environment.
    #[serde(default = "default_inherit_env")]
    pub inherit_env: bool,
}

fn default_inherit_env() -> bool {
    true
}

impl StepInvocation {
    /// Creates an invocation that inherits the parent environment.
    #[must_use]
    pub fn new(
        command: impl Into<String>,
        args: impl IntoIterator<Item = impl Into<String>>,
        working_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            command: command.into(),
            args: args.into_iter().map(Into::into).collect(),
            working_dir: working_dir.into(),
            env: BTreeMap::new(),
            inherit_env: true,
        }
    }

    /// Adds environment variables.
    #[must_use]
    pub fn with_env(mut self, env: impl IntoIterator<Item = (String, String)>) -> Self {
        self.env.extend(env);
        self
    }

    /// Sets whether the parent environment is inherited.
    #[must_use]
    pub fn with_inherit_env(mut self, inherit: bool) -> Self {
        self.inherit_env = inherit;
        self
    }

    /// Renders the command line for logs.
    #[must_use]
    pub fn display_command(&self) -> String {
        if self.args.is_empty() {
            self.command.clone()
        } else {
            format!("{} {}", self.command, self.args.join(" "))
        }
    }
}

/// Runs a single external command.
///
/// Implementations block (asynchronously) until the child exits and never
/// retry. A child that ran and exited non-zero is a successful `execute`
/// call; only a failure to launch is an error.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StepExecutor: Send + Sync {
    /// Executes the invocation and captures its output.
    async fn execute(&self, invocation: &StepInvocation) -> Result<StepOutput, ExecutionError>;
}
