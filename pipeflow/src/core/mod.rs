//! Core domain model types for pipeflow.
//!
//! This module contains the fundamental types used throughout the engine:
//! - The build result and its severity order
//! - Step status
//! - Captured step output

mod output;
mod result;
mod status;

pub use output::StepOutput;
pub use result::BuildResult;
pub use status::StepStatus;
