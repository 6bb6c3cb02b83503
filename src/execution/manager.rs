//! Execution Manager
//!
//! Owns the run lifecycle: validated start, a fire-and-forget run loop per
//! execution, cooperative pause/resume/cancel, and store-backed status
//! projections. Everything the manager needs is injected; there is no
//! global state.
//!
//! Cancellation and pause are cooperative: flags are checked between
//! steps only, so an in-flight handler call is never interrupted.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use log::{error, info, warn};
use serde_json::Value;
use tokio::sync::Notify;

use super::step::{StepExecutor, StepOutcome, StepRunOptions};
use crate::config::EngineConfig;
use crate::error::WorkflowError;
use crate::monitoring::monitor::ExecutionMonitor;
use crate::registry::registry::HandlerRegistry;
use crate::store::{ExecutionStore, TemplateStore};
use crate::workflow::model::{
    ExecutionStatus, StepExecution, StepStatus, StepType, WorkflowExecution, WorkflowTemplate,
};
use crate::workflow::validator::validate_input;

/// Returned by a successful start: the run is persisted and scheduled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionStarted {
    pub execution_id: String,
    pub total_steps: u32,
}

/// A run snapshot together with its step records.
#[derive(Debug, Clone)]
pub struct ExecutionStatusView {
    pub execution: WorkflowExecution,
    pub steps: Vec<StepExecution>,
}

/// Cooperative control flags for one live run.
struct RunControl {
    paused: AtomicBool,
    cancelled: AtomicBool,
    cancel_reason: Mutex<Option<String>>,
    wake: Notify,
}

impl RunControl {
    fn new() -> Self {
        Self {
            paused: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
            cancel_reason: Mutex::new(None),
            wake: Notify::new(),
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

/// Drives workflow runs end to end.
pub struct ExecutionManager {
    templates: Arc<dyn TemplateStore>,
    executions: Arc<dyn ExecutionStore>,
    monitor: Arc<ExecutionMonitor>,
    executor: Arc<StepExecutor>,
    config: EngineConfig,
    /// Live-run cache; the store remains the source of truth.
    active: Mutex<HashMap<String, Arc<RunControl>>>,
}

impl ExecutionManager {
    pub fn new(
        templates: Arc<dyn TemplateStore>,
        executions: Arc<dyn ExecutionStore>,
        registry: Arc<HandlerRegistry>,
        monitor: Arc<ExecutionMonitor>,
        config: EngineConfig,
    ) -> Self {
        let executor = Arc::new(StepExecutor::new(
            registry,
            executions.clone(),
            monitor.clone(),
        ));
        Self {
            templates,
            executions,
            monitor,
            executor,
            config,
            active: Mutex::new(HashMap::new()),
        }
    }

    /// Starts a run of the given template.
    ///
    /// Validates the template reference and the caller's input before any
    /// run row is created, then persists the run with one pending step
    /// record per template step and schedules the run loop. Returns as
    /// soon as the run is persisted; progress is observed through
    /// [`get_execution_status`].
    ///
    /// [`get_execution_status`]: ExecutionManager::get_execution_status
    pub async fn start_execution(
        self: &Arc<Self>,
        template_id: &str,
        input: Value,
    ) -> Result<ExecutionStarted, WorkflowError> {
        let template = self
            .templates
            .get_template(template_id)
            .await?
            .filter(|t| t.active)
            .ok_or_else(|| WorkflowError::TemplateNotFound {
                template_id: template_id.to_string(),
            })?;

        if let Some(schema) = &template.input_schema {
            let errors = validate_input(&input, schema);
            if !errors.is_empty() {
                return Err(WorkflowError::InvalidInput {
                    message: format!("Input does not match template schema: {}", errors.join("; ")),
                    details: Some(Value::Array(
                        errors.into_iter().map(Value::String).collect(),
                    )),
                });
            }
        }

        let execution = WorkflowExecution::new(&template, input);
        let records: Vec<StepExecution> = template
            .steps
            .iter()
            .map(|s| StepExecution::new(&execution.id, s))
            .collect();

        self.executions
            .create_execution(execution.clone(), records)
            .await?;

        let control = Arc::new(RunControl::new());
        if let Ok(mut active) = self.active.lock() {
            active.insert(execution.id.clone(), control.clone());
        }

        self.monitor.execution_started(&execution.id);
        info!(
            "Started execution {} of template '{}' ({} steps)",
            execution.id,
            template.name,
            template.steps.len()
        );

        let started = ExecutionStarted {
            execution_id: execution.id.clone(),
            total_steps: execution.total_steps,
        };

        let manager = Arc::clone(self);
        tokio::spawn(async move {
            manager.run_loop(template, execution, control).await;
        });

        Ok(started)
    }

    /// Requests a pause. Takes effect before the next step starts.
    pub async fn pause_execution(&self, execution_id: &str) -> Result<(), WorkflowError> {
        let control = self.control_for(execution_id)?;
        let current = self.require_execution(execution_id).await?;

        if current.status.is_terminal() {
            return Err(WorkflowError::StateConflict {
                message: format!(
                    "Cannot pause execution {} in terminal state {:?}",
                    execution_id, current.status
                ),
            });
        }

        control.paused.store(true, Ordering::SeqCst);
        info!("Pause requested for execution {}", execution_id);
        Ok(())
    }

    /// Resumes a paused run.
    pub async fn resume_execution(&self, execution_id: &str) -> Result<(), WorkflowError> {
        let control = self.control_for(execution_id)?;

        if !control.paused.load(Ordering::SeqCst) {
            return Err(WorkflowError::StateConflict {
                message: format!("Execution {} is not paused", execution_id),
            });
        }

        control.paused.store(false, Ordering::SeqCst);
        control.wake.notify_one();
        info!("Resume requested for execution {}", execution_id);
        Ok(())
    }

    /// Requests cancellation. Terminal and irreversible once observed;
    /// the step in flight is allowed to finish first.
    pub async fn cancel_execution(
        &self,
        execution_id: &str,
        reason: Option<String>,
    ) -> Result<(), WorkflowError> {
        let reason = reason.unwrap_or_else(|| "Cancelled by caller".to_string());

        if let Ok(control) = self.control_for(execution_id) {
            if let Ok(mut guard) = control.cancel_reason.lock() {
                *guard = Some(reason);
            }
            control.cancelled.store(true, Ordering::SeqCst);
            control.wake.notify_one();
            info!("Cancellation requested for execution {}", execution_id);
            return Ok(());
        }

        // No live loop: a run whose process died can still be cancelled
        // directly in the store.
        let mut execution = self.require_execution(execution_id).await?;
        if execution.status.is_terminal() {
            return Err(WorkflowError::StateConflict {
                message: format!(
                    "Cannot cancel execution {} in terminal state {:?}",
                    execution_id, execution.status
                ),
            });
        }

        execution.status = ExecutionStatus::Cancelled;
        execution.error = Some(reason.clone());
        execution.ended_at = Some(Utc::now());
        self.executions.save_execution(execution).await?;
        self.monitor
            .execution_transition(execution_id, ExecutionStatus::Cancelled, &reason);
        Ok(())
    }

    /// The persisted run snapshot plus its step records.
    pub async fn get_execution_status(
        &self,
        execution_id: &str,
    ) -> Result<ExecutionStatusView, WorkflowError> {
        let execution = self.require_execution(execution_id).await?;
        let steps = self.executions.get_steps(execution_id).await?;
        Ok(ExecutionStatusView { execution, steps })
    }

    /// Past and present runs, newest first, optionally per template.
    pub async fn get_execution_history(
        &self,
        template_id: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<WorkflowExecution>, WorkflowError> {
        self.executions
            .list_executions(template_id, limit, offset)
            .await
    }

    /// Runs that have not reached a terminal state.
    ///
    /// Reads from the store and reconciles the live-run cache on the way:
    /// cache entries whose persisted run is terminal are dropped.
    pub async fn get_active_executions(&self) -> Result<Vec<WorkflowExecution>, WorkflowError> {
        let runs = self.executions.list_executions(None, usize::MAX, 0).await?;
        let active_runs: Vec<WorkflowExecution> = runs
            .into_iter()
            .filter(|e| !e.status.is_terminal())
            .collect();

        if let Ok(mut cache) = self.active.lock() {
            let live: std::collections::HashSet<&str> =
                active_runs.iter().map(|e| e.id.as_str()).collect();
            cache.retain(|id, _| live.contains(id.as_str()));
        }

        Ok(active_runs)
    }

    /// Per-run metrics from the monitor.
    pub fn get_metrics(&self, execution_id: &str) -> Option<crate::monitoring::ExecutionMetrics> {
        self.monitor.get_metrics(execution_id)
    }

    async fn run_loop(
        self: Arc<Self>,
        template: WorkflowTemplate,
        mut execution: WorkflowExecution,
        control: Arc<RunControl>,
    ) {
        execution.status = ExecutionStatus::Running;
        execution.started_at = Some(Utc::now());
        self.persist_run(&execution).await;

        let options = StepRunOptions {
            default_timeout_ms: self.config.default_step_timeout_ms,
            policy_max_attempts: template
                .retry_policy
                .as_ref()
                .map(|p| p.max_attempts.max(self.config.default_max_retries + 1)),
            continue_on_error: false,
        };

        let mut run_error: Option<String> = None;
        let mut cancelled = false;
        let steps = template.steps.clone();
        let mut index = 0;

        while index < steps.len() {
            if control.cancelled.load(Ordering::SeqCst) {
                cancelled = true;
                break;
            }

            if control.paused.load(Ordering::SeqCst) {
                self.enter_pause(&mut execution, &control).await;
                continue; // re-check cancel before running the next step
            }

            // Contiguous parallel-typed steps run as one settled batch
            let batch_end = if steps[index].step_type == StepType::Parallel {
                let mut end = index + 1;
                while end < steps.len() && steps[end].step_type == StepType::Parallel {
                    end += 1;
                }
                end
            } else {
                index + 1
            };

            let outcomes: Vec<StepOutcome> = if batch_end - index > 1 {
                self.executor
                    .execute_steps_in_parallel(
                        &execution,
                        steps[index..batch_end].to_vec(),
                        &options,
                    )
                    .await
            } else {
                vec![
                    self.executor
                        .execute_step(&execution, &steps[index], &options)
                        .await,
                ]
            };

            for outcome in &outcomes {
                Self::apply_outcome(&mut execution, outcome);
                if !outcome.should_continue && run_error.is_none() {
                    run_error = Some(
                        outcome
                            .error
                            .clone()
                            .unwrap_or_else(|| format!("Step '{}' failed", outcome.step_id)),
                    );
                }
            }
            self.persist_run(&execution).await;

            if run_error.is_some() {
                break;
            }
            index = batch_end;
        }

        if cancelled {
            let reason = control.reason();
            warn!("Execution {} cancelled: {}", execution.id, reason);
            execution.status = ExecutionStatus::Cancelled;
            execution.error = Some(reason.clone());
            self.cancel_pending_steps(&execution).await;
            execution.ended_at = Some(Utc::now());
            self.persist_run(&execution).await;
            self.monitor
                .execution_transition(&execution.id, ExecutionStatus::Cancelled, &reason);
        } else if let Some(message) = run_error {
            error!("Execution {} failed: {}", execution.id, message);
            execution.status = ExecutionStatus::Failed;
            execution.error = Some(message.clone());
            execution.ended_at = Some(Utc::now());
            self.persist_run(&execution).await;
            self.monitor
                .execution_transition(&execution.id, ExecutionStatus::Failed, &message);
        } else {
            info!(
                "Execution {} completed: {}/{} steps",
                execution.id, execution.completed_steps, execution.total_steps
            );
            execution.status = ExecutionStatus::Completed;
            execution.output = Some(Value::Object(execution.variables.clone()));
            execution.ended_at = Some(Utc::now());
            self.persist_run(&execution).await;
            self.monitor.execution_transition(
                &execution.id,
                ExecutionStatus::Completed,
                "Execution completed",
            );
        }

        if let Ok(mut active) = self.active.lock() {
            active.remove(&execution.id);
        }
    }

    /// Parks the loop while the pause flag is set.
    async fn enter_pause(&self, execution: &mut WorkflowExecution, control: &RunControl) {
        execution.status = ExecutionStatus::Paused;
        self.persist_run(execution).await;
        self.monitor
            .execution_transition(&execution.id, ExecutionStatus::Paused, "Execution paused");

        while control.paused.load(Ordering::SeqCst) && !control.cancelled.load(Ordering::SeqCst) {
            control.wake.notified().await;
        }

        if !control.cancelled.load(Ordering::SeqCst) {
            execution.status = ExecutionStatus::Running;
            self.persist_run(execution).await;
            self.monitor.execution_transition(
                &execution.id,
                ExecutionStatus::Running,
                "Execution resumed",
            );
        }
    }

    fn apply_outcome(execution: &mut WorkflowExecution, outcome: &StepOutcome) {
        execution.current_step_id = Some(outcome.step_id.clone());
        match outcome.status {
            StepStatus::Completed => {
                execution.completed_steps += 1;
                if let Some(output) = &outcome.output {
                    // Step outputs become bindings for downstream conditions
                    execution
                        .variables
                        .insert(outcome.step_id.clone(), output.clone());
                }
            }
            StepStatus::Skipped => execution.skipped_steps += 1,
            StepStatus::Failed | StepStatus::TimedOut | StepStatus::Cancelled => {
                execution.failed_steps += 1
            }
            StepStatus::Pending | StepStatus::Running => {}
        }
    }

    /// Marks step records that never ran as cancelled.
    async fn cancel_pending_steps(&self, execution: &WorkflowExecution) {
        let records = match self.executions.get_steps(&execution.id).await {
            Ok(records) => records,
            Err(e) => {
                error!(
                    "Failed to load step records for cancelled execution {}: {}",
                    execution.id, e
                );
                return;
            }
        };

        for mut record in records {
            if record.status == StepStatus::Pending {
                record.status = StepStatus::Cancelled;
                record.ended_at = Some(Utc::now());
                if let Err(e) = self.executions.save_step(record).await {
                    error!(
                        "Failed to cancel step record for execution {}: {}",
                        execution.id, e
                    );
                }
            }
        }
    }

    async fn persist_run(&self, execution: &WorkflowExecution) {
        if let Err(e) = self.executions.save_execution(execution.clone()).await {
            error!("Failed to persist execution {}: {}", execution.id, e);
        }
    }

    fn control_for(&self, execution_id: &str) -> Result<Arc<RunControl>, WorkflowError> {
        self.active
            .lock()
            .ok()
            .and_then(|active| active.get(execution_id).cloned())
            .ok_or_else(|| WorkflowError::ExecutionNotFound {
                execution_id: execution_id.to_string(),
            })
    }

    async fn require_execution(
        &self,
        execution_id: &str,
    ) -> Result<WorkflowExecution, WorkflowError> {
        self.executions
            .get_execution(execution_id)
            .await?
            .ok_or_else(|| WorkflowError::ExecutionNotFound {
                execution_id: execution_id.to_string(),
            })
    }
}
