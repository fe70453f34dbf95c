//! Cooperative cancellation.
//!
//! There is no mid-step cancellation: a running child process is always
//! awaited. Cancellation is observed before each step and ends the run as
//! `ABORTED`.

mod token;

pub use token::{CancelCallback, CancellationToken};
