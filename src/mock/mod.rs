//! Mock Engine Module
//!
//! A self-contained stand-in for the real engine, used when no backing
//! store is available.
//!
//! # Structure
//!
//! - [`factory`]: Canned templates for demos and tests
//! - [`simulator`]: Randomized step outcomes, concurrency gate, stats
//! - [`engine`]: The [`MockWorkflowEngine`] service implementation

pub mod engine;
pub mod factory;
pub mod simulator;

pub use engine::MockWorkflowEngine;
pub use simulator::{MockExecutionSimulator, SimulatorStats};
