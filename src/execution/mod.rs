//! Execution Module
//!
//! The runtime half of the engine.
//!
//! # Structure
//!
//! - [`conditions`]: Runtime predicate evaluation over run variables
//! - [`step`]: Single-step state machine with retries and timeout
//! - [`manager`]: Run lifecycle, control flags and projections

pub mod conditions;
pub mod manager;
pub mod step;

pub use conditions::{evaluate_all, evaluate_condition, resolve_field};
pub use manager::{ExecutionManager, ExecutionStarted, ExecutionStatusView};
pub use step::{StepExecutor, StepOutcome, StepRunOptions};
