//! Persistence Contracts
//!
//! Async trait contracts for template and execution persistence, plus the
//! in-memory implementation. The persisted snapshot is the source of
//! truth for run state; anything held in memory by the manager is a cache.

pub mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;

use crate::error::WorkflowError;
use crate::workflow::model::{StepExecution, WorkflowExecution, WorkflowTemplate};

/// Storage for workflow templates.
#[async_trait]
pub trait TemplateStore: Send + Sync {
    /// Persists a new template. Duplicate ids are a state conflict.
    async fn create_template(&self, template: WorkflowTemplate) -> Result<(), WorkflowError>;

    /// Replaces an existing template wholesale.
    async fn update_template(&self, template: WorkflowTemplate) -> Result<(), WorkflowError>;

    async fn delete_template(&self, template_id: &str) -> Result<(), WorkflowError>;

    async fn get_template(
        &self,
        template_id: &str,
    ) -> Result<Option<WorkflowTemplate>, WorkflowError>;

    /// All templates, newest first.
    async fn list_templates(&self) -> Result<Vec<WorkflowTemplate>, WorkflowError>;
}

/// Storage for runs and their per-step records.
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    /// Persists a new run together with its pre-created step records.
    async fn create_execution(
        &self,
        execution: WorkflowExecution,
        steps: Vec<StepExecution>,
    ) -> Result<(), WorkflowError>;

    /// Replaces the persisted run snapshot.
    async fn save_execution(&self, execution: WorkflowExecution) -> Result<(), WorkflowError>;

    async fn get_execution(
        &self,
        execution_id: &str,
    ) -> Result<Option<WorkflowExecution>, WorkflowError>;

    /// Runs newest first, optionally filtered by template id, paged.
    async fn list_executions(
        &self,
        workflow_id: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<WorkflowExecution>, WorkflowError>;

    /// Upserts one step record.
    async fn save_step(&self, step: StepExecution) -> Result<(), WorkflowError>;

    /// Step records for a run, in template order.
    async fn get_steps(&self, execution_id: &str) -> Result<Vec<StepExecution>, WorkflowError>;

    async fn get_step(
        &self,
        execution_id: &str,
        step_id: &str,
    ) -> Result<Option<StepExecution>, WorkflowError>;
}
