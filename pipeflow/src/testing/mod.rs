//! Testing utilities for pipeflow pipelines.
//!
//! This module provides:
//! - A scripted executor that records every invocation
//! - Pipeline fixtures

mod fixtures;
mod mocks;

pub use fixtures::{command_stage, pipeline_of, security_scan_pipeline};
pub use mocks::ScriptedExecutor;
