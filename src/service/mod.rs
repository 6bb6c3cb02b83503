//! Service Surface
//!
//! The uniform public contract of the engine. Both the real engine and
//! the mock engine implement [`WorkflowService`]; callers pick one by
//! configuration and never branch on which they got.

pub mod engine;

pub use engine::WorkflowEngine;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::WorkflowError;
use crate::execution::manager::{ExecutionStarted, ExecutionStatusView};
use crate::monitoring::monitor::{ExecutionEvent, ExecutionMetrics};
use crate::workflow::model::{WorkflowExecution, WorkflowTemplate};

/// Uniform error envelope every service operation fails with.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceError {
    /// Stable machine-readable code, e.g. `TEMPLATE_NOT_FOUND`.
    pub code: String,
    pub message: String,
    pub details: Option<Value>,
}

impl ServiceError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ServiceError {}

impl From<WorkflowError> for ServiceError {
    fn from(err: WorkflowError) -> Self {
        let details = match &err {
            WorkflowError::Validation { details, .. }
            | WorkflowError::InvalidInput { details, .. }
            | WorkflowError::StepExecution { details, .. } => details.clone(),
            _ => None,
        };
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
            details,
        }
    }
}

/// Result of validating raw template JSON.
#[derive(Debug, Clone, Default)]
pub struct ValidationOutcome {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub suggestions: Vec<String>,
}

/// The engine's public operations.
///
/// Template updates replace the step list wholesale; deletion is refused
/// while any run of the template is non-terminal.
#[async_trait]
pub trait WorkflowService: Send + Sync {
    // Template management
    async fn create_template(
        &self,
        template: WorkflowTemplate,
    ) -> Result<WorkflowTemplate, ServiceError>;

    async fn update_template(
        &self,
        template: WorkflowTemplate,
    ) -> Result<WorkflowTemplate, ServiceError>;

    async fn delete_template(&self, template_id: &str) -> Result<(), ServiceError>;

    async fn get_template(&self, template_id: &str) -> Result<WorkflowTemplate, ServiceError>;

    async fn list_templates(&self) -> Result<Vec<WorkflowTemplate>, ServiceError>;

    /// Copies a template under a new id, name suffixed " (Copy)".
    async fn clone_template(&self, template_id: &str) -> Result<WorkflowTemplate, ServiceError>;

    /// Case-insensitive substring search over name, description and type.
    async fn search_templates(&self, query: &str) -> Result<Vec<WorkflowTemplate>, ServiceError>;

    /// Serializes a template to portable JSON.
    async fn export_template(&self, template_id: &str) -> Result<String, ServiceError>;

    /// Imports exported JSON as a new template (fresh id, marked name).
    async fn import_template(&self, data: &str) -> Result<WorkflowTemplate, ServiceError>;

    /// Validates raw template JSON without persisting anything.
    async fn validate_template(&self, raw: Value) -> Result<ValidationOutcome, ServiceError>;

    // Execution
    async fn start_execution(
        &self,
        template_id: &str,
        input: Value,
    ) -> Result<ExecutionStarted, ServiceError>;

    async fn get_execution_status(
        &self,
        execution_id: &str,
    ) -> Result<ExecutionStatusView, ServiceError>;

    async fn pause_execution(&self, execution_id: &str) -> Result<(), ServiceError>;

    async fn resume_execution(&self, execution_id: &str) -> Result<(), ServiceError>;

    async fn cancel_execution(
        &self,
        execution_id: &str,
        reason: Option<String>,
    ) -> Result<(), ServiceError>;

    async fn get_execution_history(
        &self,
        template_id: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<WorkflowExecution>, ServiceError>;

    // Observability
    async fn get_execution_logs(
        &self,
        execution_id: &str,
    ) -> Result<Vec<ExecutionEvent>, ServiceError>;

    async fn get_workflow_metrics(
        &self,
        template_id: Option<&str>,
    ) -> Result<Vec<ExecutionMetrics>, ServiceError>;
}
