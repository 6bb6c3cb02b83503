//! Mock Engine
//!
//! [`WorkflowService`] implementation backed by plain in-memory maps and
//! the randomized simulator. Routes and UIs develop against this when no
//! real store is available; what must match the real engine is the
//! contract, not the simulation fidelity.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use log::{info, warn};
use serde_json::Value;
use tokio::sync::RwLock;
use tokio::time::{sleep, Duration};
use uuid::Uuid;

use super::simulator::{MockExecutionSimulator, SimulationSlot, SimulatorStats};
use crate::config::MockConfig;
use crate::error::WorkflowError;
use crate::execution::conditions::evaluate_all;
use crate::execution::manager::{ExecutionStarted, ExecutionStatusView};
use crate::monitoring::monitor::{
    EventFilter, EventType, ExecutionEvent, ExecutionMetrics, ExecutionMonitor,
};
use crate::service::{ServiceError, ValidationOutcome, WorkflowService};
use crate::workflow::model::{
    ExecutionStatus, StepExecution, StepStatus, WorkflowExecution, WorkflowStep, WorkflowTemplate,
};
use crate::workflow::parser;
use crate::workflow::validator::{self, validate_input, validate_template};

/// Cooperative control flags for one simulated run.
struct MockRunControl {
    paused: AtomicBool,
    cancelled: AtomicBool,
    cancel_reason: Mutex<Option<String>>,
}

impl MockRunControl {
    fn new() -> Self {
        Self {
            paused: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
            cancel_reason: Mutex::new(None),
        }
    }

    fn reason(&self) -> String {
        self.cancel_reason
            .lock()
            .ok()
            .and_then(|guard| guard.clone())
            .unwrap_or_else(|| "Cancelled".to_string())
    }
}

struct MockState {
    templates: RwLock<HashMap<String, WorkflowTemplate>>,
    executions: RwLock<HashMap<String, WorkflowExecution>>,
    steps: RwLock<HashMap<String, Vec<StepExecution>>>,
    controls: Mutex<HashMap<String, Arc<MockRunControl>>>,
}

/// In-memory stand-in for the real engine.
pub struct MockWorkflowEngine {
    state: Arc<MockState>,
    simulator: Arc<MockExecutionSimulator>,
    monitor: Arc<ExecutionMonitor>,
}

impl MockWorkflowEngine {
    pub fn new(config: MockConfig) -> Self {
        Self {
            state: Arc::new(MockState {
                templates: RwLock::new(HashMap::new()),
                executions: RwLock::new(HashMap::new()),
                steps: RwLock::new(HashMap::new()),
                controls: Mutex::new(HashMap::new()),
            }),
            simulator: Arc::new(MockExecutionSimulator::new(config)),
            monitor: Arc::new(ExecutionMonitor::new()),
        }
    }

    /// A mock engine preloaded with the factory templates.
    pub async fn preloaded(config: MockConfig) -> Self {
        let engine = Self::new(config);
        for template in [
            super::factory::project_kickoff(),
            super::factory::conditional_approval(),
            super::factory::linear_chain(5),
        ] {
            let mut templates = engine.state.templates.write().await;
            templates.insert(template.id.clone(), template);
        }
        engine
    }

    /// Counters from the simulator: started/completed/failed runs,
    /// steps executed, retries.
    pub fn stats(&self) -> SimulatorStats {
        self.simulator.stats()
    }

    /// Simulations currently in flight.
    pub fn in_flight(&self) -> usize {
        self.simulator.in_flight()
    }

    async fn require_template(
        &self,
        template_id: &str,
    ) -> Result<WorkflowTemplate, ServiceError> {
        self.state
            .templates
            .read()
            .await
            .get(template_id)
            .cloned()
            .ok_or_else(|| {
                ServiceError::from(WorkflowError::TemplateNotFound {
                    template_id: template_id.to_string(),
                })
            })
    }

    fn control_for(&self, execution_id: &str) -> Option<Arc<MockRunControl>> {
        self.state
            .controls
            .lock()
            .ok()
            .and_then(|controls| controls.get(execution_id).cloned())
    }

    async fn save_execution(&self, execution: &WorkflowExecution) {
        self.state
            .executions
            .write()
            .await
            .insert(execution.id.clone(), execution.clone());
    }

    async fn save_step(&self, record: StepExecution) {
        let mut steps = self.state.steps.write().await;
        let records = steps.entry(record.execution_id.clone()).or_default();
        if let Some(existing) = records.iter_mut().find(|r| r.step_id == record.step_id) {
            *existing = record;
        } else {
            records.push(record);
        }
    }

    async fn step_status(&self, execution_id: &str, step_id: &str) -> Option<StepStatus> {
        self.state
            .steps
            .read()
            .await
            .get(execution_id)
            .and_then(|records| records.iter().find(|r| r.step_id == step_id))
            .map(|r| r.status)
    }

    /// Drives one run to a terminal state with randomized step outcomes.
    async fn simulate(
        state: Arc<MockState>,
        simulator: Arc<MockExecutionSimulator>,
        monitor: Arc<ExecutionMonitor>,
        template: WorkflowTemplate,
        mut execution: WorkflowExecution,
        control: Arc<MockRunControl>,
        _slot: SimulationSlot,
    ) {
        let engine = MockWorkflowEngine {
            state,
            simulator,
            monitor,
        };

        execution.status = ExecutionStatus::Running;
        execution.started_at = Some(Utc::now());
        engine.save_execution(&execution).await;

        let mut run_error: Option<String> = None;
        let mut cancelled = false;

        for step in &template.steps {
            if control.cancelled.load(Ordering::SeqCst) {
                cancelled = true;
                break;
            }

            while control.paused.load(Ordering::SeqCst)
                && !control.cancelled.load(Ordering::SeqCst)
            {
                if execution.status != ExecutionStatus::Paused {
                    execution.status = ExecutionStatus::Paused;
                    engine.save_execution(&execution).await;
                    engine.monitor.execution_transition(
                        &execution.id,
                        ExecutionStatus::Paused,
                        "Simulation paused",
                    );
                }
                sleep(Duration::from_millis(10)).await;
            }
            if control.cancelled.load(Ordering::SeqCst) {
                cancelled = true;
                break;
            }
            if execution.status == ExecutionStatus::Paused {
                execution.status = ExecutionStatus::Running;
                engine.save_execution(&execution).await;
                engine.monitor.execution_transition(
                    &execution.id,
                    ExecutionStatus::Running,
                    "Simulation resumed",
                );
            }

            execution.current_step_id = Some(step.step_id.clone());

            match engine.simulate_step(&execution, step).await {
                StepStatus::Completed => execution.completed_steps += 1,
                StepStatus::Skipped => execution.skipped_steps += 1,
                _ => {
                    execution.failed_steps += 1;
                    run_error = Some(format!("Step '{}' failed in simulation", step.step_id));
                }
            }
            engine.save_execution(&execution).await;

            if run_error.is_some() {
                break;
            }
        }

        execution.ended_at = Some(Utc::now());
        if cancelled {
            let reason = control.reason();
            warn!("Simulation {} cancelled: {}", execution.id, reason);
            execution.status = ExecutionStatus::Cancelled;
            execution.error = Some(reason.clone());
            engine.cancel_pending_steps(&execution.id).await;
            engine.simulator.record_outcome(false);
            engine.monitor.execution_transition(
                &execution.id,
                ExecutionStatus::Cancelled,
                &reason,
            );
        } else if let Some(message) = run_error {
            execution.status = ExecutionStatus::Failed;
            execution.error = Some(message.clone());
            engine.simulator.record_outcome(false);
            engine
                .monitor
                .execution_transition(&execution.id, ExecutionStatus::Failed, &message);
        } else {
            execution.status = ExecutionStatus::Completed;
            execution.output = Some(Value::Object(execution.variables.clone()));
            engine.simulator.record_outcome(true);
            engine.monitor.execution_transition(
                &execution.id,
                ExecutionStatus::Completed,
                "Simulation completed",
            );
        }
        engine.save_execution(&execution).await;

        engine
            .state
            .controls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&execution.id);
    }

    /// One step: dependency gate, condition check, then randomized
    /// attempts bounded by the step's retry budget.
    async fn simulate_step(&self, execution: &WorkflowExecution, step: &WorkflowStep) -> StepStatus {
        let mut record = match self
            .state
            .steps
            .read()
            .await
            .get(&execution.id)
            .and_then(|records| records.iter().find(|r| r.step_id == step.step_id))
            .cloned()
        {
            Some(record) => record,
            None => StepExecution::new(&execution.id, step),
        };

        // Skipped dependencies block downstream steps just like the real engine
        for dependency in &step.dependencies {
            let status = self.step_status(&execution.id, dependency).await;
            if status != Some(StepStatus::Completed) {
                record.status = StepStatus::Failed;
                record.error = Some(format!(
                    "DEPENDENCY_NOT_MET: step '{}' requires '{}' to be completed",
                    step.step_id, dependency
                ));
                record.ended_at = Some(Utc::now());
                self.save_step(record).await;
                self.monitor.step_event(
                    &execution.id,
                    &step.step_id,
                    EventType::StepFailed,
                    format!("Dependency '{}' not met", dependency),
                );
                return StepStatus::Failed;
            }
        }

        if !evaluate_all(&execution.variables, &step.conditions) {
            record.status = StepStatus::Skipped;
            record.ended_at = Some(Utc::now());
            self.save_step(record).await;
            self.monitor.step_event(
                &execution.id,
                &step.step_id,
                EventType::StepSkipped,
                "Conditions not met",
            );
            return StepStatus::Skipped;
        }

        let max_attempts = step.retries + 1;
        for attempt in 1..=max_attempts {
            record.status = StepStatus::Running;
            record.attempt = attempt;
            record.retry_count = attempt - 1;
            if record.started_at.is_none() {
                record.started_at = Some(Utc::now());
            }
            self.save_step(record.clone()).await;
            self.monitor.step_event(
                &execution.id,
                &step.step_id,
                EventType::StepStarted,
                format!("Attempt {}/{}", attempt, max_attempts),
            );

            self.simulator.record_step();
            sleep(Duration::from_millis(self.simulator.step_delay_ms())).await;

            if !self.simulator.attempt_fails() {
                record.status = StepStatus::Completed;
                record.ended_at = Some(Utc::now());
                record.duration_ms = duration_between(record.started_at, record.ended_at);
                self.save_step(record).await;
                self.monitor.step_event(
                    &execution.id,
                    &step.step_id,
                    EventType::StepCompleted,
                    "Simulated step completed",
                );
                return StepStatus::Completed;
            }

            if attempt < max_attempts {
                self.simulator.record_retry();
                self.monitor.step_event(
                    &execution.id,
                    &step.step_id,
                    EventType::StepRetried,
                    format!("Simulated failure, retrying ({}/{})", attempt, max_attempts),
                );
            }
        }

        record.status = StepStatus::Failed;
        record.error = Some("Simulated failure".to_string());
        record.ended_at = Some(Utc::now());
        record.duration_ms = duration_between(record.started_at, record.ended_at);
        self.save_step(record).await;
        self.monitor.step_event(
            &execution.id,
            &step.step_id,
            EventType::StepFailed,
            format!("Simulated failure after {} attempts", max_attempts),
        );
        StepStatus::Failed
    }

    async fn cancel_pending_steps(&self, execution_id: &str) {
        let mut steps = self.state.steps.write().await;
        if let Some(records) = steps.get_mut(execution_id) {
            for record in records.iter_mut() {
                if record.status == StepStatus::Pending {
                    record.status = StepStatus::Cancelled;
                    record.ended_at = Some(Utc::now());
                }
            }
        }
    }
}

fn duration_between(
    start: Option<chrono::DateTime<Utc>>,
    end: Option<chrono::DateTime<Utc>>,
) -> Option<u64> {
    match (start, end) {
        (Some(s), Some(e)) => u64::try_from((e - s).num_milliseconds()).ok(),
        _ => None,
    }
}

#[async_trait]
impl WorkflowService for MockWorkflowEngine {
    async fn create_template(
        &self,
        template: WorkflowTemplate,
    ) -> Result<WorkflowTemplate, ServiceError> {
        let report = validate_template(&template);
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

        let mut templates = self.state.templates.write().await;
        if templates.contains_key(&template.id) {
            return Err(ServiceError::from(WorkflowError::StateConflict {
                message: format!("Template '{}' already exists", template.id),
            }));
        }
        templates.insert(template.id.clone(), template.clone());
        Ok(template)
    }

    async fn update_template(
        &self,
        mut template: WorkflowTemplate,
    ) -> Result<WorkflowTemplate, ServiceError> {
        let report = validate_template(&template);
        if !report.success() {
            return Err(ServiceError::new(
                "VALIDATION_ERROR",
                format!("Template '{}' is invalid", template.name),
            ));
        }

        let mut templates = self.state.templates.write().await;
        if !templates.contains_key(&template.id) {
            return Err(ServiceError::from(WorkflowError::TemplateNotFound {
                template_id: template.id.clone(),
            }));
        }
        template.updated_at = Utc::now();
        templates.insert(template.id.clone(), template.clone());
        Ok(template)
    }

    async fn delete_template(&self, template_id: &str) -> Result<(), ServiceError> {
        self.require_template(template_id).await?;

        let executions = self.state.executions.read().await;
        if let Some(live) = executions
            .values()
            .find(|e| e.workflow_id == template_id && !e.status.is_terminal())
        {
            return Err(ServiceError::from(WorkflowError::StateConflict {
                message: format!(
                    "Cannot delete template '{}': execution {} is still {:?}",
                    template_id, live.id, live.status
                ),
            }));
        }
        drop(executions);

        self.state.templates.write().await.remove(template_id);
        Ok(())
    }

    async fn get_template(&self, template_id: &str) -> Result<WorkflowTemplate, ServiceError> {
        self.require_template(template_id).await
    }

    async fn list_templates(&self) -> Result<Vec<WorkflowTemplate>, ServiceError> {
        let templates = self.state.templates.read().await;
        let mut all: Vec<WorkflowTemplate> = templates.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }

    async fn clone_template(&self, template_id: &str) -> Result<WorkflowTemplate, ServiceError> {
        let mut copy = self.require_template(template_id).await?;
        copy.id = Uuid::new_v4().to_string();
        copy.name = format!("{} (Copy)", copy.name);
        let now = Utc::now();
        copy.created_at = now;
        copy.updated_at = now;

        self.state
            .templates
            .write()
            .await
            .insert(copy.id.clone(), copy.clone());
        Ok(copy)
    }

    async fn search_templates(&self, query: &str) -> Result<Vec<WorkflowTemplate>, ServiceError> {
        let needle = query.to_lowercase();
        let all = self.list_templates().await?;
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
        self.create_template(template).await
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
        let template = self.require_template(template_id).await?;
        if !template.active {
            return Err(ServiceError::from(WorkflowError::TemplateNotFound {
                template_id: template_id.to_string(),
            }));
        }

        if let Some(schema) = &template.input_schema {
            let errors = validate_input(&input, schema);
            if !errors.is_empty() {
                return Err(ServiceError::from(WorkflowError::InvalidInput {
                    message: format!(
                        "Input does not match template schema: {}",
                        errors.join("; ")
                    ),
                    details: Some(Value::Array(
                        errors.into_iter().map(Value::String).collect(),
                    )),
                }));
            }
        }

        let slot = self.simulator.acquire().map_err(ServiceError::from)?;

        let execution = WorkflowExecution::new(&template, input);
        let records: Vec<StepExecution> = template
            .steps
            .iter()
            .map(|s| StepExecution::new(&execution.id, s))
            .collect();

        self.state
            .executions
            .write()
            .await
            .insert(execution.id.clone(), execution.clone());
        self.state
            .steps
            .write()
            .await
            .insert(execution.id.clone(), records);

        let control = Arc::new(MockRunControl::new());
        if let Ok(mut controls) = self.state.controls.lock() {
            controls.insert(execution.id.clone(), control.clone());
        }

        self.monitor.execution_started(&execution.id);
        info!(
            "Started simulation {} of template '{}' ({} steps)",
            execution.id,
            template.name,
            template.steps.len()
        );

        let started = ExecutionStarted {
            execution_id: execution.id.clone(),
            total_steps: execution.total_steps,
        };

        let state = Arc::clone(&self.state);
        let simulator = Arc::clone(&self.simulator);
        let monitor = Arc::clone(&self.monitor);
        tokio::spawn(async move {
            Self::simulate(state, simulator, monitor, template, execution, control, slot).await;
        });

        Ok(started)
    }

    async fn get_execution_status(
        &self,
        execution_id: &str,
    ) -> Result<ExecutionStatusView, ServiceError> {
        let execution = self
            .state
            .executions
            .read()
            .await
            .get(execution_id)
            .cloned()
            .ok_or_else(|| {
                ServiceError::from(WorkflowError::ExecutionNotFound {
                    execution_id: execution_id.to_string(),
                })
            })?;
        let steps = self
            .state
            .steps
            .read()
            .await
            .get(execution_id)
            .cloned()
            .unwrap_or_default();
        Ok(ExecutionStatusView { execution, steps })
    }

    async fn pause_execution(&self, execution_id: &str) -> Result<(), ServiceError> {
        let view = self.get_execution_status(execution_id).await?;
        if view.execution.status.is_terminal() {
            return Err(ServiceError::from(WorkflowError::StateConflict {
                message: format!(
                    "Cannot pause execution {} in terminal state {:?}",
                    execution_id, view.execution.status
                ),
            }));
        }

        let control = self.control_for(execution_id).ok_or_else(|| {
            ServiceError::from(WorkflowError::ExecutionNotFound {
                execution_id: execution_id.to_string(),
            })
        })?;
        control.paused.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn resume_execution(&self, execution_id: &str) -> Result<(), ServiceError> {
        let control = self.control_for(execution_id).ok_or_else(|| {
            ServiceError::from(WorkflowError::ExecutionNotFound {
                execution_id: execution_id.to_string(),
            })
        })?;

        if !control.paused.load(Ordering::SeqCst) {
            return Err(ServiceError::from(WorkflowError::StateConflict {
                message: format!("Execution {} is not paused", execution_id),
            }));
        }
        control.paused.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn cancel_execution(
        &self,
        execution_id: &str,
        reason: Option<String>,
    ) -> Result<(), ServiceError> {
        let reason = reason.unwrap_or_else(|| "Cancelled by caller".to_string());

        if let Some(control) = self.control_for(execution_id) {
            if let Ok(mut guard) = control.cancel_reason.lock() {
                *guard = Some(reason);
            }
            control.cancelled.store(true, Ordering::SeqCst);
            return Ok(());
        }

        let mut view = self.get_execution_status(execution_id).await?;
        if view.execution.status.is_terminal() {
            return Err(ServiceError::from(WorkflowError::StateConflict {
                message: format!(
                    "Cannot cancel execution {} in terminal state {:?}",
                    execution_id, view.execution.status
                ),
            }));
        }

        // No simulation loop is live; stamp the run directly.
        view.execution.status = ExecutionStatus::Cancelled;
        view.execution.error = Some(reason.clone());
        view.execution.ended_at = Some(Utc::now());
        self.save_execution(&view.execution).await;
        self.cancel_pending_steps(execution_id).await;
        self.monitor
            .execution_transition(execution_id, ExecutionStatus::Cancelled, &reason);
        Ok(())
    }

    async fn get_execution_history(
        &self,
        template_id: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<WorkflowExecution>, ServiceError> {
        let executions = self.state.executions.read().await;
        let mut runs: Vec<WorkflowExecution> = executions
            .values()
            .filter(|e| template_id.map_or(true, |id| e.workflow_id == id))
            .cloned()
            .collect();
        runs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(runs.into_iter().skip(offset).take(limit).collect())
    }

    async fn get_execution_logs(
        &self,
        execution_id: &str,
    ) -> Result<Vec<ExecutionEvent>, ServiceError> {
        self.get_execution_status(execution_id).await?;
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
                let executions = self.state.executions.read().await;
                Ok(executions
                    .values()
                    .filter(|e| e.workflow_id == id)
                    .filter_map(|e| self.monitor.get_metrics(&e.id))
                    .collect())
            }
        }
    }
}
