//! In-Memory Store
//!
//! `RwLock`'d map implementation of both store contracts. Used by the CLI,
//! the mock engine and tests; a real deployment would put a database
//! behind the same traits.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{ExecutionStore, TemplateStore};
use crate::error::WorkflowError;
use crate::workflow::model::{StepExecution, WorkflowExecution, WorkflowTemplate};

#[derive(Default)]
pub struct MemoryStore {
    templates: RwLock<HashMap<String, WorkflowTemplate>>,
    executions: RwLock<HashMap<String, WorkflowExecution>>,
    /// execution_id -> step records in template order
    steps: RwLock<HashMap<String, Vec<StepExecution>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TemplateStore for MemoryStore {
    async fn create_template(&self, template: WorkflowTemplate) -> Result<(), WorkflowError> {
        let mut templates = self.templates.write().await;
        if templates.contains_key(&template.id) {
            return Err(WorkflowError::StateConflict {
                message: format!("Template '{}' already exists", template.id),
            });
        }
        templates.insert(template.id.clone(), template);
        Ok(())
    }

    async fn update_template(&self, template: WorkflowTemplate) -> Result<(), WorkflowError> {
        let mut templates = self.templates.write().await;
        if !templates.contains_key(&template.id) {
            return Err(WorkflowError::TemplateNotFound {
                template_id: template.id,
            });
        }
        templates.insert(template.id.clone(), template);
        Ok(())
    }

    async fn delete_template(&self, template_id: &str) -> Result<(), WorkflowError> {
        let removed = self.templates.write().await.remove(template_id);
        if removed.is_none() {
            return Err(WorkflowError::TemplateNotFound {
                template_id: template_id.to_string(),
            });
        }
        Ok(())
    }

    async fn get_template(
        &self,
        template_id: &str,
    ) -> Result<Option<WorkflowTemplate>, WorkflowError> {
        Ok(self.templates.read().await.get(template_id).cloned())
    }

    async fn list_templates(&self) -> Result<Vec<WorkflowTemplate>, WorkflowError> {
        let mut all: Vec<WorkflowTemplate> =
            self.templates.read().await.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }
}

#[async_trait]
impl ExecutionStore for MemoryStore {
    async fn create_execution(
        &self,
        execution: WorkflowExecution,
        steps: Vec<StepExecution>,
    ) -> Result<(), WorkflowError> {
        let mut executions = self.executions.write().await;
        if executions.contains_key(&execution.id) {
            return Err(WorkflowError::StateConflict {
                message: format!("Execution '{}' already exists", execution.id),
            });
        }
        self.steps
            .write()
            .await
            .insert(execution.id.clone(), steps);
        executions.insert(execution.id.clone(), execution);
        Ok(())
    }

    async fn save_execution(&self, execution: WorkflowExecution) -> Result<(), WorkflowError> {
        let mut executions = self.executions.write().await;
        if !executions.contains_key(&execution.id) {
            return Err(WorkflowError::ExecutionNotFound {
                execution_id: execution.id,
            });
        }
        executions.insert(execution.id.clone(), execution);
        Ok(())
    }

    async fn get_execution(
        &self,
        execution_id: &str,
    ) -> Result<Option<WorkflowExecution>, WorkflowError> {
        Ok(self.executions.read().await.get(execution_id).cloned())
    }

    async fn list_executions(
        &self,
        workflow_id: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<WorkflowExecution>, WorkflowError> {
        let mut runs: Vec<WorkflowExecution> = self
            .executions
            .read()
            .await
            .values()
            .filter(|e| workflow_id.map_or(true, |id| e.workflow_id == id))
            .cloned()
            .collect();
        runs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(runs.into_iter().skip(offset).take(limit).collect())
    }

    async fn save_step(&self, step: StepExecution) -> Result<(), WorkflowError> {
        let mut all = self.steps.write().await;
        let records = all.entry(step.execution_id.clone()).or_default();
        match records.iter_mut().find(|s| s.step_id == step.step_id) {
            Some(existing) => *existing = step,
            None => records.push(step),
        }
        Ok(())
    }

    async fn get_steps(&self, execution_id: &str) -> Result<Vec<StepExecution>, WorkflowError> {
        Ok(self
            .steps
            .read()
            .await
            .get(execution_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_step(
        &self,
        execution_id: &str,
        step_id: &str,
    ) -> Result<Option<StepExecution>, WorkflowError> {
        Ok(self
            .steps
            .read()
            .await
            .get(execution_id)
            .and_then(|records| records.iter().find(|s| s.step_id == step_id).cloned()))
    }
}
