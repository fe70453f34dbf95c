//! Stage runner: sequences the steps of one stage.

use super::{StageReport, StageSpec, StepReport, StepSpec};
use crate::cancellation::CancellationToken;
use crate::config::EngineConfig;
use crate::core::BuildResult;
use crate::errors::StepError;
use crate::events::{names, EventSink, NoOpEventSink};
use crate::executor::{StepExecutor, StepInvocation};
use crate::observability::SpanTimer;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Run-wide values a stage needs from the engine.
#[derive(Debug, Clone, Copy)]
pub struct RunScope<'a> {
    /// Id of the current run.
    pub run_id: Uuid,
    /// Pipeline name.
    pub pipeline: &'a str,
    /// Resolved pipeline working directory.
    pub working_dir: &'a Path,
    /// Pipeline-wide environment.
    pub env: &'a BTreeMap<String, String>,
    /// Token checked before every step.
    pub cancel: &'a CancellationToken,
}

/// Resolves `dir` against `base`; absolute paths win, `None` keeps `base`.
pub(crate) fn resolve_dir(base: &Path, dir: Option<&Path>) -> PathBuf {
    match dir {
        Some(dir) if dir.is_absolute() => dir.to_path_buf(),
        Some(dir) => base.join(dir),
        None => base.to_path_buf(),
    }
}

/// Executes the steps of a stage in order and applies its containment policy.
///
/// The first step that does not pass ends the stage; later steps are
/// reported as skipped. Whether that failure stops the pipeline is decided
/// by the returned [`StageReport::result`].
pub struct StageRunner {
    executor: Arc<dyn StepExecutor>,
    sink: Arc<dyn EventSink>,
    config: EngineConfig,
}

impl StageRunner {
    /// Creates a runner over the given executor.
    #[must_use]
    pub fn new(executor: Arc<dyn StepExecutor>) -> Self {
        Self {
            executor,
            sink: Arc::new(NoOpEventSink),
            config: EngineConfig::default(),
        }
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Sets the engine configuration.
    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Runs every step of `stage` and returns its report.
    pub async fn run(&self, stage: &StageSpec, scope: &RunScope<'_>) -> StageReport {
        let timer = SpanTimer::start(format!("stage:{}", stage.name));
        let stage_dir = resolve_dir(scope.working_dir, stage.working_dir.as_deref());

        info!(
            pipeline = %scope.pipeline,
            run_id = %scope.run_id,
            stage = %stage.name,
            containment = %stage.containment,
            "Stage started"
        );
        self.sink
            .emit(
                names::STAGE_STARTED,
                Some(serde_json::json!({
                    "run_id": scope.run_id,
                    "stage": &stage.name,
                    "containment": stage.containment,
                })),
            )
            .await;

        let mut steps = Vec::with_capacity(stage.steps.len());
        let mut failure: Option<StepError> = None;

        for (index, step) in stage.steps.iter().enumerate() {
            if failure.is_some() {
                steps.push(StepReport::skipped(step));
                continue;
            }

            if scope.cancel.is_cancelled() {
                let err = StepError::Cancelled {
                    reason: scope
                        .cancel
                        .reason()
                        .unwrap_or_else(|| "cancellation requested".to_string()),
                };
                steps.push(StepReport::from_error(step, &err));
                failure = Some(err);
                continue;
            }

            let (report, outcome) = self.run_step(stage, index, step, &stage_dir, scope).await;
            steps.push(report);
            if let Err(err) = outcome {
                failure = Some(err);
            }
        }

        let (result, error) = match &failure {
            None => (BuildResult::Success, None),
            Some(err) => (stage.containment.stage_result(err), Some(err.to_string())),
        };
        let duration_ms = timer.finish();

        self.finish_stage(stage, result, error.as_deref(), duration_ms, scope)
            .await;

        StageReport {
            name: stage.name.clone(),
            containment: stage.containment,
            result,
            steps,
            error,
            duration_ms,
        }
    }

    async fn run_step(
        &self,
        stage: &StageSpec,
        index: usize,
        step: &StepSpec,
        stage_dir: &Path,
        scope: &RunScope<'_>,
    ) -> (StepReport, Result<(), StepError>) {
        let mut env = scope.env.clone();
        env.extend(step.env.iter().map(|(k, v)| (k.clone(), v.clone())));

        let invocation = StepInvocation {
            command: step.command.clone(),
            args: step.args.clone(),
            working_dir: resolve_dir(stage_dir, step.working_dir.as_deref()),
            env,
            inherit_env: self.config.inherit_env,
        };

        info!(
            stage = %stage.name,
            step = index + 1,
            command = %invocation.display_command(),
            "Running step"
        );
        self.sink
            .emit(
                names::STEP_STARTED,
                Some(serde_json::json!({
                    "stage": &stage.name,
                    "step": index,
                    "command": &invocation.command,
                    "args": &invocation.args,
                })),
            )
            .await;

        let (report, outcome) = match self.executor.execute(&invocation).await {
            Ok(output) => {
                if self.config.log_step_output {
                    log_captured(&stage.name, &output.stdout_lossy(), &output.stderr_lossy());
                }
                let error = match output.exit_code {
                    Some(0) => None,
                    Some(exit_code) => Some(StepError::NonZeroExit {
                        command: step.command.clone(),
                        exit_code,
                    }),
                    None => Some(StepError::Terminated {
                        command: step.command.clone(),
                    }),
                };
                let report = StepReport::from_output(step, &output, error.as_ref());
                (report, error.map_or(Ok(()), Err))
            }
            Err(launch) => {
                let err = StepError::from(launch);
                (StepReport::from_error(step, &err), Err(err))
            }
        };

        match &outcome {
            Ok(()) => {
                info!(
                    stage = %stage.name,
                    step = index + 1,
                    duration_ms = report.duration_ms,
                    "Step passed"
                );
                self.sink
                    .emit(
                        names::STEP_COMPLETED,
                        Some(serde_json::json!({
                            "stage": &stage.name,
                            "step": index,
                            "exit_code": report.exit_code,
                            "duration_ms": report.duration_ms,
                        })),
                    )
                    .await;
            }
            Err(err) => {
                if matches!(err, StepError::Execution(_)) {
                    error!(stage = %stage.name, step = index + 1, error = %err, "Step could not be launched");
                } else {
                    warn!(
                        stage = %stage.name,
                        step = index + 1,
                        exit_code = ?report.exit_code,
                        error = %err,
                        "Step failed"
                    );
                }
                self.sink
                    .emit(
                        names::STEP_FAILED,
                        Some(serde_json::json!({
                            "stage": &stage.name,
                            "step": index,
                            "error_type": err.kind(),
                            "error": err.to_string(),
                            "exit_code": report.exit_code,
                        })),
                    )
                    .await;
            }
        }

        (report, outcome)
    }

    async fn finish_stage(
        &self,
        stage: &StageSpec,
        result: BuildResult,
        error: Option<&str>,
        duration_ms: f64,
        scope: &RunScope<'_>,
    ) {
        let event = match result {
            BuildResult::Success => {
                info!(stage = %stage.name, duration_ms, "Stage completed");
                names::STAGE_COMPLETED
            }
            BuildResult::Unstable => {
                warn!(
                    stage = %stage.name,
                    error = error.unwrap_or_default(),
                    "Stage failure contained, marking stage UNSTABLE"
                );
                names::STAGE_CONTAINED
            }
            BuildResult::Failure => {
                error!(stage = %stage.name, error = error.unwrap_or_default(), "Stage failed");
                names::STAGE_FAILED
            }
            BuildResult::Aborted => {
                warn!(stage = %stage.name, error = error.unwrap_or_default(), "Stage aborted");
                names::STAGE_ABORTED
            }
        };

        self.sink
            .emit(
                event,
                Some(serde_json::json!({
                    "run_id": scope.run_id,
                    "stage": &stage.name,
                    "result": result,
                    "error": error,
                    "duration_ms": duration_ms,
                })),
            )
            .await;
    }
}

impl std::fmt::Debug for StageRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageRunner")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn log_captured(stage: &str, stdout: &str, stderr: &str) {
    for line in stdout.lines() {
        info!(stage = %stage, stream = "stdout", "{line}");
    }
    for line in stderr.lines() {
        info!(stage = %stage, stream = "stderr", "{line}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{StepOutput, StepStatus};
    use crate::events::CollectingEventSink;
    use crate::executor::MockStepExecutor;
    use crate::pipeline::Containment;
    use crate::testing::ScriptedExecutor;
    use pretty_assertions::assert_eq;

    struct Fixture {
        env: BTreeMap<String, String>,
        cancel: CancellationToken,
        dir: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                env: BTreeMap::new(),
                cancel: CancellationToken::new(),
                dir: PathBuf::from("/work"),
            }
        }

        fn scope(&self) -> RunScope<'_> {
            RunScope {
                run_id: Uuid::nil(),
                pipeline: "test",
                working_dir: &self.dir,
                env: &self.env,
                cancel: &self.cancel,
            }
        }
    }

    fn three_step_stage() -> StageSpec {
        StageSpec::new("scan")
            .with_step(StepSpec::new("first"))
            .with_step(StepSpec::new("second"))
            .with_step(StepSpec::new("third"))
    }

    #[test]
    fn test_resolve_dir() {
        let base = Path::new("/repo");
        assert_eq!(resolve_dir(base, None), PathBuf::from("/repo"));
        assert_eq!(resolve_dir(base, Some(Path::new("sub"))), PathBuf::from("/repo/sub"));
        assert_eq!(resolve_dir(base, Some(Path::new("/abs"))), PathBuf::from("/abs"));
    }

    #[tokio::test]
    async fn test_steps_run_in_declared_order() {
        let executor = Arc::new(ScriptedExecutor::new());
        let runner = StageRunner::new(executor.clone());
        let fixture = Fixture::new();

        let report = runner.run(&three_step_stage(), &fixture.scope()).await;

        assert_eq!(report.result, BuildResult::Success);
        assert_eq!(executor.commands(), vec!["first", "second", "third"]);
        assert!(report.steps.iter().all(|s| s.status == StepStatus::Passed));
    }

    #[tokio::test]
    async fn test_uncontained_failure_skips_remaining_steps() {
        let executor = Arc::new(ScriptedExecutor::new().exit_code("second", 1));
        let runner = StageRunner::new(executor.clone());
        let fixture = Fixture::new();

        let report = runner.run(&three_step_stage(), &fixture.scope()).await;

        assert_eq!(report.result, BuildResult::Failure);
        assert_eq!(executor.commands(), vec!["first", "second"]);
        let statuses: Vec<StepStatus> = report.steps.iter().map(|s| s.status).collect();
        assert_eq!(
            statuses,
            vec![StepStatus::Passed, StepStatus::Failed, StepStatus::Skipped]
        );
        assert_eq!(report.error.as_deref(), Some("'second' exited with code 1"));
    }

    #[tokio::test]
    async fn test_contained_failure_downgrades_to_unstable() {
        let executor = Arc::new(ScriptedExecutor::new().exit_code("first", 2));
        let runner = StageRunner::new(executor.clone());
        let fixture = Fixture::new();

        let stage = three_step_stage().with_containment(Containment::DowngradeToUnstable);
        let report = runner.run(&stage, &fixture.scope()).await;

        assert_eq!(report.result, BuildResult::Unstable);
        assert_eq!(executor.commands(), vec!["first"]);
        assert_eq!(report.failed_step().unwrap().exit_code, Some(2));
    }

    #[tokio::test]
    async fn test_launch_error_respects_containment() {
        let executor = Arc::new(ScriptedExecutor::new().missing("second"));
        let runner = StageRunner::new(executor);
        let fixture = Fixture::new();

        let uncontained = runner.run(&three_step_stage(), &fixture.scope()).await;
        assert_eq!(uncontained.result, BuildResult::Failure);
        assert_eq!(uncontained.steps[1].status, StepStatus::Errored);

        let contained = runner
            .run(&three_step_stage().contained(), &fixture.scope())
            .await;
        assert_eq!(contained.result, BuildResult::Unstable);
    }

    #[tokio::test]
    async fn test_signal_aborts_even_when_contained() {
        let executor = Arc::new(ScriptedExecutor::new().terminated("first"));
        let runner = StageRunner::new(executor);
        let fixture = Fixture::new();

        let report = runner
            .run(&three_step_stage().contained(), &fixture.scope())
            .await;
        assert_eq!(report.result, BuildResult::Aborted);
        assert_eq!(report.steps[0].status, StepStatus::Aborted);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_step() {
        let executor = Arc::new(ScriptedExecutor::new());
        let runner = StageRunner::new(executor.clone());
        let fixture = Fixture::new();
        fixture.cancel.cancel("interrupted");

        let report = runner.run(&three_step_stage(), &fixture.scope()).await;

        assert_eq!(report.result, BuildResult::Aborted);
        assert!(executor.commands().is_empty());
        assert_eq!(report.error.as_deref(), Some("cancelled: interrupted"));
    }

    #[tokio::test]
    async fn test_invocation_resolution() {
        let executor = Arc::new(ScriptedExecutor::new());
        let runner = StageRunner::new(executor.clone())
            .with_config(EngineConfig::new().with_inherit_env(false));
        let mut fixture = Fixture::new();
        fixture.env.insert("MODE".to_string(), "push".to_string());
        fixture.env.insert("ORG".to_string(), "acme".to_string());

        let stage = StageSpec::new("scan").with_working_dir("repo").with_step(
            StepSpec::new("python3")
                .with_args(["snyk.py", "--scan-for-pr", "--base-branch", "main"])
                .with_env("MODE", "pr")
                .with_working_dir("tools"),
        );
        runner.run(&stage, &fixture.scope()).await;

        let invocations = executor.invocations();
        let invocation = &invocations[0];
        assert_eq!(invocation.working_dir, PathBuf::from("/work/repo/tools"));
        assert_eq!(invocation.env.get("MODE"), Some(&"pr".to_string()));
        assert_eq!(invocation.env.get("ORG"), Some(&"acme".to_string()));
        assert_eq!(
            invocation.args,
            vec!["snyk.py", "--scan-for-pr", "--base-branch", "main"]
        );
        assert!(!invocation.inherit_env);
    }

    #[tokio::test]
    async fn test_events_for_contained_stage() {
        let executor = Arc::new(ScriptedExecutor::new().exit_code("second", 1));
        let sink = Arc::new(CollectingEventSink::new());
        let runner = StageRunner::new(executor).with_event_sink(sink.clone());
        let fixture = Fixture::new();

        runner
            .run(&three_step_stage().contained(), &fixture.scope())
            .await;

        assert_eq!(
            sink.event_types(),
            vec![
                "stage.started",
                "step.started",
                "step.completed",
                "step.started",
                "step.failed",
                "stage.contained",
            ]
        );
        let (_, data) = &sink.events_of_type("step.failed")[0];
        assert_eq!(data.as_ref().unwrap()["error_type"], "NonZeroExit");
    }

    #[tokio::test]
    async fn test_with_mock_executor() {
        let mut executor = MockStepExecutor::new();
        executor
            .expect_execute()
            .withf(|invocation| invocation.command == "snyk" && invocation.args == ["test"])
            .times(1)
            .returning(|_| Ok(StepOutput::exited(0).with_stdout(b"ok".to_vec())));

        let runner = StageRunner::new(Arc::new(executor));
        let fixture = Fixture::new();
        let stage = StageSpec::new("sca").with_step(StepSpec::new("snyk").with_arg("test"));

        let report = runner.run(&stage, &fixture.scope()).await;
        assert_eq!(report.result, BuildResult::Success);
        assert_eq!(report.steps[0].stdout, "ok");
    }
}
