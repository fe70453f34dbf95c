//! # Pipeflow
//!
//! A minimal sequential pipeline orchestrator.
//!
//! Pipeflow runs named stages strictly in order. Each stage runs one or more
//! external commands, and the pipeline reports a single build result:
//!
//! - **Worst-of aggregation**: `SUCCESS < UNSTABLE < FAILURE < ABORTED`
//! - **Per-stage containment**: a contained failure downgrades the stage to
//!   `UNSTABLE` and the run continues
//! - **Early stop**: an uncontained failure ends the run as `FAILURE`
//! - **Event-driven observability**: lifecycle events and structured logs
//! - **Cancellation**: a shared token aborts the run before the next step
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pipeflow::prelude::*;
//! use std::sync::Arc;
//!
//! let pipeline = PipelineBuilder::new("security-scan")
//!     .stage(StageSpec::new("Checkout").with_step(StepSpec::new("git").with_arg("status")))?
//!     .stage(
//!         StageSpec::new("SAST")
//!             .with_step(StepSpec::new("python3").with_args(["snyk.py", "--scan-for-push"]))
//!             .contained(),
//!     )?
//!     .build()?;
//!
//! let engine = PipelineEngine::new(Arc::new(ProcessExecutor::new()));
//! let result = engine.run(&pipeline).await;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod config;
pub mod core;
pub mod errors;
pub mod events;
pub mod executor;
pub mod observability;
pub mod pipeline;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::{load_pipeline, parse_pipeline, EngineConfig, PipelineDefinition};
    pub use crate::core::{BuildResult, StepOutput, StepStatus};
    pub use crate::errors::{
        ConfigError, ExecutionError, PipeflowError, PipelineValidationError, StepError,
    };
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::executor::{ProcessExecutor, StepExecutor, StepInvocation};
    pub use crate::pipeline::{
        Containment, Pipeline, PipelineBuilder, PipelineEngine, PipelineReport, StageReport,
        StageRunner, StageSpec, StepReport, StepSpec,
    };
    pub use crate::utils::{generate_run_id, Timestamp};
}
