//! Scripted executor for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

use crate::core::StepOutput;
use crate::errors::ExecutionError;
use crate::executor::{StepExecutor, StepInvocation};

#[derive(Debug, Clone)]
enum Script {
    Output(StepOutput),
    Missing,
}

/// An executor that never spawns anything.
///
/// Every command exits zero unless scripted otherwise, and each invocation
/// is appended to a sequence log that tests can inspect.
#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    scripts: HashMap<String, Script>,
    invocations: Mutex<Vec<StepInvocation>>,
}

impl ScriptedExecutor {
    /// Creates an executor where every command succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `command` exit with `code`.
    #[must_use]
    pub fn exit_code(self, command: impl Into<String>, code: i32) -> Self {
        self.output(command, StepOutput::exited(code))
    }

    /// Makes `command` return the given output.
    #[must_use]
    pub fn output(mut self, command: impl Into<String>, output: StepOutput) -> Self {
        self.scripts.insert(command.into(), Script::Output(output));
        self
    }

    /// Makes `command` fail to launch as if it were not installed.
    #[must_use]
    pub fn missing(mut self, command: impl Into<String>) -> Self {
        self.scripts.insert(command.into(), Script::Missing);
        self
    }

    /// Makes `command` look as if it was killed by a signal.
    #[must_use]
    pub fn terminated(self, command: impl Into<String>) -> Self {
        self.output(command, StepOutput::terminated())
    }

    /// Returns every invocation in the order it was received.
    #[must_use]
    pub fn invocations(&self) -> Vec<StepInvocation> {
        self.invocations.lock().clone()
    }

    /// Returns the invoked command names in order.
    #[must_use]
    pub fn commands(&self) -> Vec<String> {
        self.invocations
            .lock()
            .iter()
            .map(|i| i.command.clone())
            .collect()
    }

    /// Returns the invoked command lines (command plus arguments) in order.
    #[must_use]
    pub fn command_lines(&self) -> Vec<String> {
        self.invocations
            .lock()
            .iter()
            .map(StepInvocation::display_command)
            .collect()
    }

    /// Returns the number of invocations.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.invocations.lock().len()
    }
}

#[async_trait]
impl StepExecutor for ScriptedExecutor {
    async fn execute(&self, invocation: &StepInvocation) -> Result<StepOutput, ExecutionError> {
        self.invocations.lock().push(invocation.clone());

        match self.scripts.get(&invocation.command) {
            Some(Script::Output(output)) => Ok(output.clone()),
            Some(Script::Missing) => Err(ExecutionError::NotFound {
                command: invocation.command.clone(),
            }),
            None => Ok(StepOutput::exited(0)),
        }
    }
}
