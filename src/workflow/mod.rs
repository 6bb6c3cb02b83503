//! Workflow Definition Module
//!
//! Provides data structures and utilities for defining, parsing, and
//! validating workflow templates.
//!
//! # Structure
//!
//! - [`model`]: Core data structures (WorkflowTemplate, WorkflowStep, runs)
//! - [`parser`]: YAML/JSON loading and export/import
//! - [`validator`]: Validation rules and dependency checking

pub mod model;
pub mod parser;
pub mod validator;

pub use model::{
    Condition, ConditionOperator, ExecutionStatus, LogicalOperator, OnErrorPolicy, RetryPolicy,
    StepExecution, StepStatus, StepType, WorkflowExecution, WorkflowStep, WorkflowTemplate,
};
pub use parser::{export_json, import_json, load_template, save_template};
pub use validator::{validate_input, validate_template, ValidationIssue, ValidationReport};
