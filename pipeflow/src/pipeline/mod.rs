//! Pipeline definition and execution.
//!
//! This module provides:
//! - Step, stage and pipeline specifications
//! - Pipeline builder with validation
//! - Per-stage failure containment
//! - The stage runner and pipeline engine
//! - Run reports

mod builder;
mod containment;
mod engine;
mod report;
mod spec;
mod stage_runner;

pub use builder::PipelineBuilder;
pub use containment::Containment;
pub use engine::PipelineEngine;
pub use report::{PipelineReport, ReportSummary, StageReport, StepReport};
pub use spec::{Pipeline, StageSpec, StepSpec};
pub use stage_runner::{RunScope, StageRunner};
