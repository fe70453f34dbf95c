//! Captured output of a finished child process.

use serde::{Deserialize, Serialize};

/// What a step executor returns once the child process has exited.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepOutput {
    /// Exit code, or `None` when the child was terminated by a signal.
    pub exit_code: Option<i32>,
    /// Captured standard output.
    #[serde(default)]
    pub stdout: Vec<u8>,
    /// Captured standard error.
    #[serde(default)]
    pub stderr: Vec<u8>,
    /// Wall-clock duration in milliseconds.
    #[serde(default)]
    pub duration_ms: f64,
}

impl StepOutput {
    /// Creates an output with the given exit code and no captured bytes.
    #[must_use]
    pub fn exited(code: i32) -> Self {
        Self {
            exit_code: Some(code),
            ..Self::default()
        }
    }

    /// Creates an output for a child killed by a signal.
    #[must_use]
    pub fn terminated() -> Self {
        Self::default()
    }

    /// Sets the captured stdout.
    #[must_use]
    pub fn with_stdout(mut self, stdout: impl Into<Vec<u8>>) -> Self {
        self.stdout = stdout.into();
        self
    }

    /// Sets the captured stderr.
    #[must_use]
    pub fn with_stderr(mut self, stderr: impl Into<Vec<u8>>) -> Self {
        self.stderr = stderr.into();
        self
    }

    /// Sets the duration.
    #[must_use]
    pub fn with_duration_ms(mut self, duration_ms: f64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    /// Returns true if the child exited with code zero.
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Returns stdout decoded lossily as UTF-8.
    #[must_use]
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// Returns stderr decoded lossily as UTF-8.
    #[must_use]
    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}
