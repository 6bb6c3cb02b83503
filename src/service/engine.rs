//! Real Engine
//!
//! [`WorkflowService`] implementation that persists templates through the
//! injected stores and executes runs through the real step executor.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use log::info;
use serde_json::Value;
use uuid::Uuid;

use super::{ServiceError, ValidationOutcome, WorkflowService};
use crate::config::EngineConfig;
use crate::error::WorkflowError;
use crate::execution::manager::{ExecutionManager, ExecutionStarted, ExecutionStatusView};
use crate::monitoring::monitor::{EventFilter, ExecutionEvent, ExecutionMetrics, ExecutionMonitor};
use crate::registry::registry::HandlerRegistry;
use crate::store::{ExecutionStore, TemplateStore};
use crate::workflow::model::{WorkflowExecution, WorkflowTemplate};
use crate::workflow::parser;
use crate::workflow::validator::{self, validate_template};

/// The production engine: validated template CRUD plus real execution.
pub struct WorkflowEngine {
    templates: Arc<dyn TemplateStore>,
    executions: Arc<dyn ExecutionStore>,
    monitor: Arc<ExecutionMonitor>,
    manager: Arc<ExecutionManager>,
}

impl WorkflowEngine {
    pub fn new(
        templates: Arc<dyn TemplateStore>,
        executions: Arc<dyn ExecutionStore>,
        registry: Arc<HandlerRegistry>,
        monitor: Arc<ExecutionMonitor>,
        config: EngineConfig,
    ) -> Self {
        let manager = Arc::new(ExecutionManager::new(
            templates.clone(),
            executions.clone(),
            registry,
            monitor.clone(),
            config,
        ));
        Self {
            templates,
            executions,
            monitor,
            manager,
        }
    }

    fn ensure_valid(template: &WorkflowTemplate) -> Result<(), ServiceError> {
        let report = validate_template(template);
        if !report.success() {
            return Err(ServiceError::new(
                "VALIDATION_ERROR",
                format!("Template '{}' is invalid", template.name),
            )
            .with_details(Value::Array(
                report
                    .error_messages()
                    .into_iter()
                    .map(Value::String)
                    .collect(),
            )));
        }
        Ok(())
    }

    async fn require_template(
        &self,
        template_id: &str,
    ) -> Result<WorkflowTemplate, ServiceError> {
        self.templates
            .get_template(template_id)
            .await?
            .ok_or_else(|| {
                ServiceError::from(WorkflowError::TemplateNotFound {
                    template_id: template_id.to_string(),
                })
            })
    }
}

#[async_trait]
impl WorkflowService for WorkflowEngine {
    async fn create_template(
        &self,
        template: WorkflowTemplate,
    ) -> Result<WorkflowTemplate, ServiceError> {
        Self::ensure_valid(&template)?;
        self.templates.create_template(template.clone()).await?;
        info!("Created template '{}' ({})", template.name, template.id);
        Ok(template)
    }

    async fn update_template(
        &self,
        mut template: WorkflowTemplate,
    ) -> Result<WorkflowTemplate, ServiceError> {
        Self::ensure_valid(&template)?;
        template.updated_at = Utc::now();
        self.templates.update_template(template.clone()).await?;
        info!("Updated template '{}' ({})", template.name, template.id);
        Ok(template)
    }

    async fn delete_template(&self, template_id: &str) -> Result<(), ServiceError> {
        self.require_template(template_id).await?;

        // Refuse while any run of this template is still live
        let runs = self
            .executions
            .list_executions(Some(template_id), usize::MAX, 0)
            .await?;
        if let Some(live) = runs.iter().find(|r| !r.status.is_terminal()) {
            return Err(ServiceError::from(WorkflowError::StateConflict {
                message: format!(
                    "Cannot delete template '{}': execution {} is still {:?}",
                    template_id, live.id, live.status
                ),
            }));
        }

        self.templates.delete_template(template_id).await?;
        info!("Deleted template {}", template_id);
        Ok(())
    }

    async fn get_template(&self, template_id: &str) -> Result<WorkflowTemplate, ServiceError> {
        self.require_template(template_id).await
    }

    async fn list_templates(&self) -> Result<Vec<WorkflowTemplate>, ServiceError> {
        Ok(self.templates.list_templates().await?)
    }

    async fn clone_template(&self, template_id: &str) -> Result<WorkflowTemplate, ServiceError> {
        let mut copy = self.require_template(template_id).await?;
        copy.id = Uuid::new_v4().to_string();
        copy.name = format!("{} (Copy)", copy.name);
        let now = Utc::now();
        copy.created_at = now;
        copy.updated_at = now;

        self.templates.create_template(copy.clone()).await?;
        Ok(copy)
    }

    async fn search_templates(&self, query: &str) -> Result<Vec<WorkflowTemplate>, ServiceError> {
        let needle = query.to_lowercase();
        let all = self.templates.list_templates().await?;
        Ok(all
            .into_iter()
            .filter(|t| {
                t.name.to_lowercase().contains(&needle)
                    || t.template_type.to_lowercase().contains(&needle)
                    || t.description
                        .as_ref()
                        .map_or(false, |d| d.to_lowercase().contains(&needle))
            })
            .collect())
    }

    async fn export_template(&self, template_id: &str) -> Result<String, ServiceError> {
        let template = self.require_template(template_id).await?;
        parser::export_json(&template)
            .map_err(|e| ServiceError::new("UNKNOWN_ERROR", e.to_string()))
    }

    async fn import_template(&self, data: &str) -> Result<WorkflowTemplate, ServiceError> {
        let template = parser::import_json(data).map_err(|e| {
            ServiceError::new("VALIDATION_ERROR", format!("Invalid template JSON: {}", e))
        })?;
        Self::ensure_valid(&template)?;
        self.templates.create_template(template.clone()).await?;
        info!("Imported template '{}' ({})", template.name, template.id);
        Ok(template)
    }

    async fn validate_template(&self, raw: Value) -> Result<ValidationOutcome, ServiceError> {
        let template: WorkflowTemplate = match serde_json::from_value(raw) {
            Ok(t) => t,
            Err(e) => {
                return Ok(ValidationOutcome {
                    is_valid: false,
                    errors: vec![format!("Template JSON does not parse: {}", e)],
                    warnings: Vec::new(),
                    suggestions: Vec::new(),
                })
            }
        };

        let report = validate_template(&template);
        Ok(ValidationOutcome {
            is_valid: report.success(),
            errors: report.error_messages(),
            warnings: report.warning_messages(),
            suggestions: validator::suggestions(&template),
        })
    }

    async fn start_execution(
        &self,
        template_id: &str,
        input: Value,
    ) -> Result<ExecutionStarted, ServiceError> {
        Ok(self.manager.start_execution(template_id, input).await?)
    }

    async fn get_execution_status(
        &self,
        execution_id: &str,
    ) -> Result<ExecutionStatusView, ServiceError> {
        Ok(self.manager.get_execution_status(execution_id).await?)
    }

    async fn pause_execution(&self, execution_id: &str) -> Result<(), ServiceError> {
        Ok(self.manager.pause_execution(execution_id).await?)
    }

    async fn resume_execution(&self, execution_id: &str) -> Result<(), ServiceError> {
        Ok(self.manager.resume_execution(execution_id).await?)
    }

    async fn cancel_execution(
        &self,
        execution_id: &str,
        reason: Option<String>,
    ) -> Result<(), ServiceError> {
        Ok(self.manager.cancel_execution(execution_id, reason).await?)
    }

    async fn get_execution_history(
        &self,
        template_id: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<WorkflowExecution>, ServiceError> {
        Ok(self
            .manager
            .get_execution_history(template_id, limit, offset)
            .await?)
    }

    async fn get_execution_logs(
        &self,
        execution_id: &str,
    ) -> Result<Vec<ExecutionEvent>, ServiceError> {
        // Existence check keeps unknown-run errors uniform
        self.manager.get_execution_status(execution_id).await?;
        Ok(self.monitor.get_events(&EventFilter {
            execution_id: Some(execution_id.to_string()),
            ..Default::default()
        }))
    }

    async fn get_workflow_metrics(
        &self,
        template_id: Option<&str>,
    ) -> Result<Vec<ExecutionMetrics>, ServiceError> {
        match template_id {
            None => Ok(self.monitor.all_metrics()),
            Some(id) => {
                let runs = self
                    .executions
                    .list_executions(Some(id), usize::MAX, 0)
                    .await?;
                Ok(runs
                    .iter()
                    .filter_map(|r| self.monitor.get_metrics(&r.id))
                    .collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::default_registry;
    use crate::store::memory::MemoryStore;
    use crate::workflow::model::{ExecutionStatus, WorkflowStep};
    use serde_json::json;
    use tokio::time::{sleep, Duration};

    fn engine() -> (WorkflowEngine, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let engine = WorkflowEngine::new(
            store.clone() as Arc<dyn TemplateStore>,
            store.clone() as Arc<dyn ExecutionStore>,
            Arc::new(default_registry()),
            Arc::new(ExecutionMonitor::new()),
            EngineConfig::default(),
        );
        (engine, store)
    }

    fn sample_template() -> WorkflowTemplate {
        let mut template = WorkflowTemplate::new("Kickoff", "1.0", "project");
        template.description = Some("Project kickoff flow".to_string());
        template
            .add_step(WorkflowStep::new("a", "A", "echo"))
            .unwrap();
        template
            .add_step(WorkflowStep::new("b", "B", "echo").depends_on("a"))
            .unwrap();
        template
    }

    async fn wait_terminal(engine: &WorkflowEngine, execution_id: &str) -> WorkflowExecution {
        for _ in 0..500 {
            let view = engine.get_execution_status(execution_id).await.unwrap();
            if view.execution.status.is_terminal() {
                return view.execution;
            }
            sleep(Duration::from_millis(10)).await;
        }
        panic!("execution {} never reached a terminal state", execution_id);
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_template() {
        let (engine, _) = engine();
        let mut template = sample_template();
        template.steps[1].dependencies = vec!["ghost".to_string()];

        let err = engine.create_template(template).await.unwrap_err();
        assert_eq!(err.code, "VALIDATION_ERROR");
        assert!(err.details.is_some());

        assert!(engine.list_templates().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_template_crud_and_search() {
        let (engine, _) = engine();
        let created = engine.create_template(sample_template()).await.unwrap();

        let mut renamed = created.clone();
        renamed.name = "Offboarding".to_string();
        renamed.description = Some("Offboarding flow".to_string());
        engine.update_template(renamed).await.unwrap();

        let found = engine.search_templates("offboard").await.unwrap();
        assert_eq!(found.len(), 1);
        assert!(engine.search_templates("kickoff").await.unwrap().is_empty());

        engine.delete_template(&created.id).await.unwrap();
        let err = engine.get_template(&created.id).await.unwrap_err();
        assert_eq!(err.code, "TEMPLATE_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_clone_template() {
        let (engine, _) = engine();
        let original = engine.create_template(sample_template()).await.unwrap();

        let copy = engine.clone_template(&original.id).await.unwrap();
        assert_ne!(copy.id, original.id);
        assert_eq!(copy.name, "Kickoff (Copy)");
        assert_eq!(copy.steps, original.steps);
        assert_eq!(engine.list_templates().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_export_import_roundtrip() {
        let (engine, _) = engine();
        let original = engine.create_template(sample_template()).await.unwrap();

        let exported = engine.export_template(&original.id).await.unwrap();
        let imported = engine.import_template(&exported).await.unwrap();

        assert_ne!(imported.id, original.id);
        assert_eq!(imported.name, "Kickoff (Imported)");
        assert_eq!(imported.steps, original.steps);
    }

    #[tokio::test]
    async fn test_import_rejects_garbage() {
        let (engine, _) = engine();
        let err = engine.import_template("{ not json").await.unwrap_err();
        assert_eq!(err.code, "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_validate_template_outcome() {
        let (engine, _) = engine();

        let valid = serde_json::to_value(sample_template()).unwrap();
        let outcome = engine.validate_template(valid).await.unwrap();
        assert!(outcome.is_valid);
        assert!(outcome.errors.is_empty());

        let mut broken = sample_template();
        broken.steps[0].step_id = broken.steps[1].step_id.clone();
        let outcome = engine
            .validate_template(serde_json::to_value(broken).unwrap())
            .await
            .unwrap();
        assert!(!outcome.is_valid);
        assert!(outcome.errors.iter().any(|e| e.contains("Duplicate")));

        let outcome = engine.validate_template(json!("not a template")).await.unwrap();
        assert!(!outcome.is_valid);
    }

    #[tokio::test]
    async fn test_run_through_service_and_logs() {
        let (engine, _) = engine();
        let template = engine.create_template(sample_template()).await.unwrap();

        let started = engine
            .start_execution(&template.id, json!({}))
            .await
            .unwrap();
        let run = wait_terminal(&engine, &started.execution_id).await;
        assert_eq!(run.status, ExecutionStatus::Completed);

        let logs = engine
            .get_execution_logs(&started.execution_id)
            .await
            .unwrap();
        assert!(!logs.is_empty());
        assert!(logs.iter().all(|e| e.execution_id == started.execution_id));

        let metrics = engine
            .get_workflow_metrics(Some(&template.id))
            .await
            .unwrap();
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].steps_completed, 2);
    }

    #[tokio::test]
    async fn test_delete_refused_while_run_is_live() {
        let (engine, _) = engine();
        let mut template = sample_template();
        template.steps = vec![WorkflowStep::new("slow", "Slow", "delay")
            .with_config(json!({ "delay_ms": 150 }))];
        let template = engine.create_template(template).await.unwrap();

        let started = engine
            .start_execution(&template.id, json!({}))
            .await
            .unwrap();

        let err = engine.delete_template(&template.id).await.unwrap_err();
        assert_eq!(err.code, "STATE_CONFLICT");

        wait_terminal(&engine, &started.execution_id).await;
        engine.delete_template(&template.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_execution_logs_error() {
        let (engine, _) = engine();
        let err = engine.get_execution_logs("nope").await.unwrap_err();
        assert_eq!(err.code, "EXECUTION_NOT_FOUND");
    }
}
