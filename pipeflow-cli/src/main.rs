use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pipeflow::cancellation::CancellationToken;
use pipeflow::config::{load_pipeline, EngineConfig};
use pipeflow::core::BuildResult;
use pipeflow::events::LoggingEventSink;
use pipeflow::executor::ProcessExecutor;
use pipeflow::observability::{init_logging, LogFormat};
use pipeflow::pipeline::{Pipeline, PipelineEngine};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(
    name = "pipeflow",
    version,
    about = "Sequential pipeline runner with stage-level failure containment"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a pipeline definition
    Run {
        /// Path to the pipeline definition (JSON)
        path: PathBuf,

        /// Write the run report to this file
        #[arg(long)]
        report: Option<PathBuf>,

        /// Base working directory, overriding the definition's
        #[arg(long)]
        working_dir: Option<PathBuf>,

        /// Log format (pretty, json)
        #[arg(long, default_value = "pretty")]
        log_format: LogFormat,

        /// Do not pass the caller's environment to steps
        #[arg(long)]
        clear_env: bool,

        /// Log captured step stdout/stderr
        #[arg(long)]
        log_step_output: bool,
    },

    /// Check a pipeline definition without running it
    Validate {
        /// Path to the pipeline definition (JSON)
        path: PathBuf,
    },

    /// List the stages and steps of a pipeline definition
    List {
        /// Path to the pipeline definition (JSON)
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            path,
            report,
            working_dir,
            log_format,
            clear_env,
            log_step_output,
        } => {
            init_logging(log_format);

            let mut config = EngineConfig::from_env();
            if clear_env {
                config.inherit_env = false;
            }
            if log_step_output {
                config.log_step_output = true;
            }

            let mut pipeline = load(&path)?;
            if let Some(dir) = working_dir {
                pipeline = pipeline.with_working_dir(dir);
            }

            let result = cmd_run(&pipeline, config, report.as_deref()).await?;
            Ok(ExitCode::from(exit_code(result)))
        }
        Commands::Validate { path } => {
            cmd_validate(&path)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::List { path } => {
            cmd_list(&path)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn exit_code(result: BuildResult) -> u8 {
    match result {
        BuildResult::Success => 0,
        BuildResult::Failure => 1,
        BuildResult::Aborted => 2,
        BuildResult::Unstable => 3,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InterruptAction {
    /// Stop before the next step and report the run as aborted.
    Cancel,
    /// Leave immediately without waiting for the running step.
    Exit,
}

fn interrupt_action(received: u32) -> InterruptAction {
    if received <= 1 {
        InterruptAction::Cancel
    } else {
        InterruptAction::Exit
    }
}

/// Cancels the run on the first Ctrl-C and exits the process on the second.
fn watch_interrupts(token: Arc<CancellationToken>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut received = 0;
        while tokio::signal::ctrl_c().await.is_ok() {
            received += 1;
            match interrupt_action(received) {
                InterruptAction::Cancel => {
                    token.cancel("interrupted");
                }
                InterruptAction::Exit => {
                    warn!("Second interrupt received, exiting without waiting for the running step");
                    std::process::exit(i32::from(exit_code(BuildResult::Aborted)));
                }
            }
        }
    })
}

fn load(path: &Path) -> Result<Pipeline> {
    load_pipeline(path)
        .with_context(|| format!("Failed to load pipeline definition '{}'", path.display()))
}

async fn cmd_run(
    pipeline: &Pipeline,
    config: EngineConfig,
    report_path: Option<&Path>,
) -> Result<BuildResult> {
    let engine = PipelineEngine::new(Arc::new(ProcessExecutor::new()))
        .with_event_sink(Arc::new(LoggingEventSink::debug()))
        .with_config(config);

    let token = engine.cancellation_token();
    token.on_cancel(|reason| {
        warn!(reason = %reason, "Cancellation requested, waiting for the running step to finish");
    });
    let interrupt = watch_interrupts(Arc::clone(&token));
    let report = engine.run_pipeline(pipeline).await;
    interrupt.abort();
    info!(run_id = %report.run_id, result = %report.result, "Run finished");
    print!("{}", report.summary());

    if let Some(path) = report_path {
        report
            .write_json(path)
            .with_context(|| format!("Failed to write run report '{}'", path.display()))?;
    }

    Ok(report.result)
}

fn cmd_validate(path: &Path) -> Result<()> {
    let pipeline = load(path)?;
    println!(
        "Pipeline '{}' is valid: {} stages, {} steps",
        pipeline.name(),
        pipeline.stage_count(),
        pipeline.step_count()
    );
    Ok(())
}

fn cmd_list(path: &Path) -> Result<()> {
    let pipeline = load(path)?;
    println!("{}", pipeline.name());
    for (index, stage) in pipeline.stages().iter().enumerate() {
        println!("{}. {} [{}]", index + 1, stage.name, stage.containment);
        for step in &stage.steps {
            println!("     - {}", step.display_name());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code(BuildResult::Success), 0);
        assert_eq!(exit_code(BuildResult::Failure), 1);
        assert_eq!(exit_code(BuildResult::Aborted), 2);
        assert_eq!(exit_code(BuildResult::Unstable), 3);
    }

    #[test]
    fn test_second_interrupt_exits() {
        assert_eq!(interrupt_action(1), InterruptAction::Cancel);
        assert_eq!(interrupt_action(2), InterruptAction::Exit);
        assert_eq!(interrupt_action(5), InterruptAction::Exit);
    }

    #[test]
    fn test_parse_run_flags() {
        let cli = Cli::parse_from([
            "pipeflow",
            "run",
            "pipeline.json",
            "--report",
            "out/report.json",
            "--log-format",
            "json",
            "--clear-env",
        ]);
        match cli.command {
            Commands::Run {
                path,
                report,
                log_format,
                clear_env,
                log_step_output,
                ..
            } => {
                assert_eq!(path, PathBuf::from("pipeline.json"));
                assert_eq!(report, Some(PathBuf::from("out/report.json")));
                assert_eq!(log_format, LogFormat::Json);
                assert!(clear_env);
                assert!(!log_step_output);
            }
            _ => panic!("expected run command"),
        }
    }
}
