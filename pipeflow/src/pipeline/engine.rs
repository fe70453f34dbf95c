//! Pipeline engine: sequences stages and aggregates the build result.

use super::stage_runner::{resolve_dir, RunScope};
use super::{Pipeline, PipelineReport, StageRunner};
use crate::cancellation::CancellationToken;
use crate::config::EngineConfig;
use crate::core::BuildResult;
use crate::events::{names, EventSink, NoOpEventSink};
use crate::executor::StepExecutor;
use crate::observability::SpanTimer;
use crate::utils::{generate_run_id, now_utc};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Runs pipelines stage by stage, strictly in declared order.
///
/// The running result starts at `SUCCESS` and is combined with each stage
/// result as it arrives. A stage that ends `FAILURE` or `ABORTED` stops the
/// run; every remaining stage is listed in [`PipelineReport::not_run`].
pub struct PipelineEngine {
    executor: Arc<dyn StepExecutor>,
    sink: Arc<dyn EventSink>,
    config: EngineConfig,
    cancel: Arc<CancellationToken>,
}

impl PipelineEngine {
    /// Creates an engine over the given executor.
    #[must_use]
    pub fn new(executor: Arc<dyn StepExecutor>) -> Self {
        Self {
            executor,
            sink: Arc::new(NoOpEventSink),
            config: EngineConfig::default(),
            cancel: Arc::new(CancellationToken::new()),
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

    /// Shares an externally owned cancellation token.
    #[must_use]
    pub fn with_cancellation_token(mut self, token: Arc<CancellationToken>) -> Self {
        self.cancel = token;
        self
    }

    /// Returns the token that aborts this engine's runs.
    #[must_use]
    pub fn cancellation_token(&self) -> Arc<CancellationToken> {
        Arc::clone(&self.cancel)
    }

    /// Runs the pipeline and returns only its aggregated result.
    pub async fn run(&self, pipeline: &Pipeline) -> BuildResult {
        self.run_pipeline(pipeline).await.result
    }

    /// Runs the pipeline and returns the full report.
    pub async fn run_pipeline(&self, pipeline: &Pipeline) -> PipelineReport {
        let run_id = generate_run_id();
        let started_at = now_utc();
        let timer = SpanTimer::start(format!("pipeline:{}", pipeline.name()));

        let base = self
            .config
            .default_working_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));
        let working_dir = resolve_dir(&base, pipeline.working_dir().map(PathBuf::as_path));

        let runner = StageRunner::new(Arc::clone(&self.executor))
            .with_event_sink(Arc::clone(&self.sink))
            .with_config(self.config.clone());
        let scope = RunScope {
            run_id,
            pipeline: pipeline.name(),
            working_dir: &working_dir,
            env: pipeline.env(),
            cancel: &self.cancel,
        };

        info!(
            pipeline = %pipeline.name(),
            run_id = %run_id,
            stages = pipeline.stage_count(),
            working_dir = %working_dir.display(),
            "Pipeline started"
        );
        self.sink
            .emit(
                names::PIPELINE_STARTED,
                Some(serde_json::json!({
                    "run_id": run_id,
                    "pipeline": pipeline.name(),
                    "stages": pipeline.stages().iter().map(|s| &s.name).collect::<Vec<_>>(),
                })),
            )
            .await;

        let mut result = BuildResult::Success;
        let mut stages = Vec::with_capacity(pipeline.stage_count());
        let mut not_run = Vec::new();

        for stage in pipeline.stages() {
            if result.is_terminal() {
                not_run.push(stage.name.clone());
                continue;
            }

            let report = runner.run(stage, &scope).await;
            result = result.combine(report.result);
            stages.push(report);
        }

        debug_assert_eq!(
            result,
            BuildResult::worst_of(stages.iter().map(|s| s.result))
        );

        let duration_ms = timer.finish();
        match result {
            BuildResult::Success => {
                info!(pipeline = %pipeline.name(), run_id = %run_id, duration_ms, "Pipeline succeeded");
            }
            BuildResult::Unstable => {
                warn!(pipeline = %pipeline.name(), run_id = %run_id, duration_ms, "Pipeline finished UNSTABLE");
            }
            BuildResult::Failure | BuildResult::Aborted => {
                error!(
                    pipeline = %pipeline.name(),
                    run_id = %run_id,
                    result = %result,
                    not_run = ?not_run,
                    duration_ms,
                    "Pipeline stopped early"
                );
            }
        }
        self.sink
            .emit(
                names::PIPELINE_COMPLETED,
                Some(serde_json::json!({
                    "run_id": run_id,
                    "pipeline": pipeline.name(),
                    "result": result,
                    "not_run": &not_run,
                    "duration_ms": duration_ms,
                })),
            )
            .await;

        PipelineReport {
            run_id,
            pipeline: pipeline.name().to_string(),
            result,
            stages,
            not_run,
            started_at,
            finished_at: now_utc(),
            duration_ms,
        }
    }
}

impl std::fmt::Debug for PipelineEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineEngine")
            .field("config", &self.config)
            .field("cancel", &self.cancel)
            .finish_non_exhaustive()
    }
}
