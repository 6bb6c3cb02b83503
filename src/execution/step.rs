//! Step Execution
//!
//! Drives a single step through its state machine: dependency gate,
//! condition check, then a bounded attempt loop racing the handler against
//! its timeout. Every state transition is persisted before the next one
//! begins; bookkeeping write failures are logged and swallowed so a store
//! hiccup cannot fail an otherwise healthy step.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use log::{error, info, warn};
use serde_json::Value;
use tokio::task::JoinSet;
use tokio::time::{sleep, timeout, Duration};

use super::conditions::evaluate_all;
use crate::error::WorkflowError;
use crate::monitoring::monitor::{EventType, ExecutionMonitor};
use crate::registry::handler::HandlerContext;
use crate::registry::registry::HandlerRegistry;
use crate::store::ExecutionStore;
use crate::workflow::model::{
    OnErrorPolicy, StepExecution, StepStatus, WorkflowExecution, WorkflowStep,
};

/// Per-run options the manager derives from config and template policy.
#[derive(Debug, Clone)]
pub struct StepRunOptions {
    /// Timeout applied when the step sets none of its own.
    pub default_timeout_ms: u64,
    /// Template-level attempt floor, if a retry policy is set.
    pub policy_max_attempts: Option<u32>,
    /// Caller override: treat every step failure as non-fatal.
    pub continue_on_error: bool,
}

impl Default for StepRunOptions {
    fn default() -> Self {
        Self {
            default_timeout_ms: 30_000,
            policy_max_attempts: None,
            continue_on_error: false,
        }
    }
}

/// What one step ended as, and whether the run may proceed.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub step_id: String,
    pub status: StepStatus,
    pub output: Option<Value>,
    pub error: Option<String>,
    /// How many attempts actually ran.
    pub attempts: u32,
    pub should_continue: bool,
}

/// Executes individual steps against the registry, persisting transitions.
pub struct StepExecutor {
    registry: Arc<HandlerRegistry>,
    store: Arc<dyn ExecutionStore>,
    monitor: Arc<ExecutionMonitor>,
}

impl StepExecutor {
    pub fn new(
        registry: Arc<HandlerRegistry>,
        store: Arc<dyn ExecutionStore>,
        monitor: Arc<ExecutionMonitor>,
    ) -> Self {
        Self {
            registry,
            store,
            monitor,
        }
    }

    /// Runs one step to a terminal status.
    ///
    /// The run snapshot is read-only here; the manager merges the outcome
    /// back into the run and persists it.
    pub async fn execute_step(
        &self,
        execution: &WorkflowExecution,
        step: &WorkflowStep,
        options: &StepRunOptions,
    ) -> StepOutcome {
        // 1. Dependency gate: every dependency must have completed.
        // Skipped does not satisfy a dependency.
        for dep in &step.dependencies {
            let satisfied = match self.store.get_step(&execution.id, dep).await {
                Ok(Some(record)) => record.status == StepStatus::Completed,
                Ok(None) => false,
                Err(e) => {
                    error!(
                        "Failed to read dependency '{}' for step '{}': {}",
                        dep, step.step_id, e
                    );
                    false
                }
            };

            if !satisfied {
                let message = format!(
                    "DEPENDENCY_NOT_MET: step '{}' requires '{}' to complete first",
                    step.step_id, dep
                );
                warn!("[{}] {}", execution.id, message);
                return self
                    .finish_failed(execution, step, StepStatus::Failed, message, 0, options)
                    .await;
            }
        }

        // 2. Conditions: a failing condition skips the step, not the run.
        if !evaluate_all(&execution.variables, &step.conditions) {
            info!(
                "[{}] Step '{}' skipped: conditions not met",
                execution.id, step.step_id
            );
            let mut record = self.load_record(execution, step).await;
            record.status = StepStatus::Skipped;
            record.ended_at = Some(Utc::now());
            self.persist(&record).await;
            self.monitor.step_event(
                &execution.id,
                &step.step_id,
                EventType::StepSkipped,
                "Conditions not met",
            );
            return StepOutcome {
                step_id: step.step_id.clone(),
                status: StepStatus::Skipped,
                output: None,
                error: None,
                attempts: 0,
                should_continue: true,
            };
        }

        // 3. Attempt loop.
        let max_attempts = options
            .policy_max_attempts
            .unwrap_or(0)
            .max(step.retries + 1)
            .max(1);
        let timeout_ms = step.timeout_ms.unwrap_or(options.default_timeout_ms);

        let mut record = self.load_record(execution, step).await;
        record.max_attempts = max_attempts;

        let mut last_error = String::new();
        let mut timed_out = false;

        for attempt in 1..=max_attempts {
            record.attempt = attempt;
            record.retry_count = attempt - 1;
            record.status = StepStatus::Running;
            if record.started_at.is_none() {
                record.started_at = Some(Utc::now());
            }
            record.input = Some(step.handler_config.clone());
            self.persist(&record).await;
            self.monitor.step_event(
                &execution.id,
                &step.step_id,
                EventType::StepStarted,
                format!("Attempt {}/{}", attempt, max_attempts),
            );

            let ctx = HandlerContext::new(&execution.id, &step.step_id)
                .with_attempt(attempt, max_attempts)
                .with_variables(execution.variables.clone());

            let started = Instant::now();
            let dispatch = self.registry.execute_handler(
                &step.handler,
                step.handler_config.clone(),
                &ctx,
            );

            // Timeout wins ties; a late handler completion is discarded.
            match timeout(Duration::from_millis(timeout_ms), dispatch).await {
                Err(_) => {
                    timed_out = true;
                    let err = WorkflowError::StepTimeout {
                        step_id: step.step_id.clone(),
                        timeout_ms,
                    };
                    last_error = err.to_string();
                }
                Ok(Err(err)) => {
                    // Registry-level failure (unknown handler): retrying
                    // cannot help, fail the step now.
                    last_error = err.to_string();
                    error!("[{}] {}", execution.id, last_error);
                    return self
                        .finish_failed(
                            execution,
                            step,
                            StepStatus::Failed,
                            last_error,
                            attempt,
                            options,
                        )
                        .await;
                }
                Ok(Ok(result)) if result.success => {
                    let output = result.output.unwrap_or(Value::Null);
                    record.status = StepStatus::Completed;
                    record.output = Some(output.clone());
                    record.error = None;
                    record.ended_at = Some(Utc::now());
                    record.duration_ms = Some(started.elapsed().as_millis() as u64);
                    self.persist(&record).await;
                    self.monitor.step_event(
                        &execution.id,
                        &step.step_id,
                        EventType::StepCompleted,
                        format!("Completed on attempt {}", attempt),
                    );
                    return StepOutcome {
                        step_id: step.step_id.clone(),
                        status: StepStatus::Completed,
                        output: Some(output),
                        error: None,
                        attempts: attempt,
                        should_continue: true,
                    };
                }
                Ok(Ok(result)) => {
                    timed_out = false;
                    last_error = result
                        .error
                        .unwrap_or_else(|| "handler reported failure".to_string());
                }
            }

            if attempt < max_attempts {
                warn!(
                    "[{}] Step '{}' attempt {}/{} failed: {}. Retrying in {} ms",
                    execution.id, step.step_id, attempt, max_attempts, last_error, step.retry_delay_ms
                );
                self.monitor.step_event(
                    &execution.id,
                    &step.step_id,
                    EventType::StepRetried,
                    format!("Attempt {} failed: {}", attempt, last_error),
                );
                // Fixed delay between attempts, no automatic backoff
                sleep(Duration::from_millis(step.retry_delay_ms)).await;
            }
        }

        let final_status = if timed_out {
            StepStatus::TimedOut
        } else {
            StepStatus::Failed
        };
        self.finish_failed(execution, step, final_status, last_error, max_attempts, options)
            .await
    }

    /// Runs several steps concurrently, settling all of them.
    ///
    /// A failing branch never cancels its siblings; the caller decides
    /// what the aggregate means. Outcomes come back in input order.
    pub async fn execute_steps_in_parallel(
        self: &Arc<Self>,
        execution: &WorkflowExecution,
        steps: Vec<WorkflowStep>,
        options: &StepRunOptions,
    ) -> Vec<StepOutcome> {
        let mut set = JoinSet::new();

        for step in steps.iter().cloned() {
            let executor = Arc::clone(self);
            let snapshot = execution.clone();
            let opts = options.clone();
            set.spawn(async move { executor.execute_step(&snapshot, &step, &opts).await });
        }

        let mut outcomes = Vec::with_capacity(steps.len());
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => error!("[{}] Parallel step task failed to join: {}", execution.id, e),
            }
        }

        // Settle-all returns in completion order; restore input order
        outcomes.sort_by_key(|o| {
            steps
                .iter()
                .position(|s| s.step_id == o.step_id)
                .unwrap_or(usize::MAX)
        });
        outcomes
    }

    async fn finish_failed(
        &self,
        execution: &WorkflowExecution,
        step: &WorkflowStep,
        status: StepStatus,
        error_message: String,
        attempts: u32,
        options: &StepRunOptions,
    ) -> StepOutcome {
        // Skip policy records the exhausted step as skipped, not failed
        let status = if step.on_error == OnErrorPolicy::Skip {
            StepStatus::Skipped
        } else {
            status
        };

        let mut record = self.load_record(execution, step).await;
        record.status = status;
        record.error = Some(error_message.clone());
        record.ended_at = Some(Utc::now());
        if attempts > 0 {
            record.attempt = attempts;
            record.retry_count = attempts.saturating_sub(1);
        }
        self.persist(&record).await;

        let event_type = match status {
            StepStatus::TimedOut => EventType::StepTimedOut,
            StepStatus::Skipped => EventType::StepSkipped,
            _ => EventType::StepFailed,
        };
        self.monitor
            .step_event(&execution.id, &step.step_id, event_type, &error_message);

        let should_continue = options.continue_on_error
            || matches!(step.on_error, OnErrorPolicy::Continue | OnErrorPolicy::Skip);

        StepOutcome {
            step_id: step.step_id.clone(),
            status,
            output: None,
            error: Some(error_message),
            attempts,
            should_continue,
        }
    }

    /// Fetches the pre-created step record, or builds one when the store
    /// has no row (defensively tolerated rather than required).
    async fn load_record(
        &self,
        execution: &WorkflowExecution,
        step: &WorkflowStep,
    ) -> StepExecution {
        match self.store.get_step(&execution.id, &step.step_id).await {
            Ok(Some(record)) => record,
            Ok(None) => StepExecution::new(&execution.id, step),
            Err(e) => {
                error!(
                    "Failed to load step record '{}' for execution {}: {}",
                    step.step_id, execution.id, e
                );
                StepExecution::new(&execution.id, step)
            }
        }
    }

    async fn persist(&self, record: &StepExecution) {
        if let Err(e) = self.store.save_step(record.clone()).await {
            error!(
                "Failed to persist step '{}' for execution {}: {}",
                record.step_id, record.execution_id, e
            );
        }
    }
}
