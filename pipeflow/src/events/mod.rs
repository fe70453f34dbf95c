//! Event sink system for observability.
//!
//! The engine reports every lifecycle transition to an [`EventSink`].
//! Event names are collected in [`names`].

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

/// Lifecycle event names emitted by the engine.
pub mod names {
    /// A pipeline run began.
    pub const PIPELINE_STARTED: &str = "pipeline.started";
    /// A pipeline run finished (any result).
    pub const PIPELINE_COMPLETED: &str = "pipeline.completed";
    /// A stage began.
    pub const STAGE_STARTED: &str = "stage.started";
    /// A stage finished with every step passing.
    pub const STAGE_COMPLETED: &str = "stage.completed";
    /// A stage failure was downgraded to unstable.
    pub const STAGE_CONTAINED: &str = "stage.contained";
    /// A stage failed without containment.
    pub const STAGE_FAILED: &str = "stage.failed";
    /// A stage was aborted.
    pub const STAGE_ABORTED: &str = "stage.aborted";
    /// A step was launched.
    pub const STEP_STARTED: &str = "step.started";
    /// A step exited zero.
    pub const STEP_COMPLETED: &str = "step.completed";
    /// A step did not pass.
    pub const STEP_FAILED: &str = "step.failed";
}
