//! FlowRunner - Workflow Execution Engine
//!
//! A workflow execution engine for AI-agent project automation: validated
//! templates, dependency-aware step execution with retries and timeouts,
//! execution monitoring, and a mock engine for store-less development.
//!
//! # Architecture
//!
//! The library is organized into seven modules:
//!
//! - [`workflow`]: Template data model, parsing and validation
//! - [`execution`]: Step executor and run lifecycle management
//! - [`registry`]: Named handler dispatch with aliases and middleware
//! - [`monitoring`]: Event log, per-run metrics and subscriptions
//! - [`store`]: Persistence contracts and the in-memory implementation
//! - [`service`]: The uniform public contract and the real engine
//! - [`mock`]: A contract-compatible engine backed by a simulator
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use flowrunner::config::EngineConfig;
//! use flowrunner::registry::default_registry;
//! use flowrunner::monitoring::ExecutionMonitor;
//! use flowrunner::service::{WorkflowEngine, WorkflowService};
//! use flowrunner::store::MemoryStore;
//! use flowrunner::workflow::load_template;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let template = load_template("kickoff.yaml")?;
//!
//!     let store = Arc::new(MemoryStore::new());
//!     let engine = WorkflowEngine::new(
//!         store.clone(),
//!         store,
//!         Arc::new(default_registry()),
//!         Arc::new(ExecutionMonitor::new()),
//!         EngineConfig::default(),
//!     );
//!
//!     let template = engine.create_template(template).await?;
//!     let started = engine
//!         .start_execution(&template.id, serde_json::json!({}))
//!         .await?;
//!     println!("Started {} ({} steps)", started.execution_id, started.total_steps);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod execution;
pub mod mock;
pub mod monitoring;
pub mod registry;
pub mod service;
pub mod store;
pub mod workflow;

// Re-export commonly used types
pub use config::EngineConfig;
pub use error::WorkflowError;
pub use mock::MockWorkflowEngine;
pub use service::{ServiceError, WorkflowEngine, WorkflowService};
pub use workflow::model::{WorkflowExecution, WorkflowStep, WorkflowTemplate};
pub use workflow::parser::load_template;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "FlowRunner";
