//! Handler Contract
//!
//! The trait every step handler implements, plus the per-dispatch context
//! and result types the registry hands back to the step executor.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::WorkflowError;

/// Static information a handler publishes about itself.
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerMetadata {
    /// Registry key the handler is registered under.
    pub name: String,
    pub description: String,
    pub version: String,
    /// Structural schema the handler's input must satisfy, if any.
    pub input_schema: Option<Value>,
}

impl HandlerMetadata {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            version: "1.0".to_string(),
            input_schema: None,
        }
    }
}

/// Per-dispatch context: which run and step is calling, which attempt this
/// is, and a snapshot of the run's variable bindings.
#[derive(Debug, Clone)]
pub struct HandlerContext {
    pub execution_id: String,
    pub step_id: String,
    /// 1-based attempt counter.
    pub attempt: u32,
    pub max_attempts: u32,
    pub variables: Map<String, Value>,
}

impl HandlerContext {
    pub fn new(execution_id: impl Into<String>, step_id: impl Into<String>) -> Self {
        Self {
            execution_id: execution_id.into(),
            step_id: step_id.into(),
            attempt: 1,
            max_attempts: 1,
            variables: Map::new(),
        }
    }

    pub fn with_attempt(mut self, attempt: u32, max_attempts: u32) -> Self {
        self.attempt = attempt;
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_variables(mut self, variables: Map<String, Value>) -> Self {
        self.variables = variables;
        self
    }
}

/// A named unit of work steps dispatch to.
///
/// Handlers must be stateless across dispatches or synchronize internally;
/// the registry shares one instance across concurrent runs.
#[async_trait]
pub trait Handler: Send + Sync {
    fn metadata(&self) -> HandlerMetadata;

    /// Pre-dispatch input check. The default accepts everything.
    fn validate_input(&self, _input: &Value) -> Result<(), String> {
        Ok(())
    }

    /// Performs the work. The returned value becomes the step's output.
    async fn execute(&self, input: Value, ctx: &HandlerContext) -> Result<Value, WorkflowError>;
}

/// The outcome of one handler dispatch, success or failure.
///
/// Retry accounting lives in the step executor; at this layer
/// `retry_count` is always 0.
#[derive(Debug, Clone)]
pub struct StepExecutionResult {
    pub success: bool,
    pub output: Option<Value>,
    pub error: Option<String>,
    pub error_code: Option<String>,
    pub duration_ms: u64,
    pub retry_count: u32,
}

impl StepExecutionResult {
    pub fn succeeded(output: Value, duration_ms: u64) -> Self {
        Self {
            success: true,
            output: Some(output),
            error: None,
            error_code: None,
            duration_ms,
            retry_count: 0,
        }
    }

    pub fn failed(error: &WorkflowError, duration_ms: u64) -> Self {
        Self {
            success: false,
            output: None,
            error: Some(error.to_string()),
            error_code: Some(error.code().to_string()),
            duration_ms,
            retry_count: 0,
        }
    }
}
