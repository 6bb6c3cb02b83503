//! Workflow Data Model
//!
//! Core data structures representing workflow templates, steps, runs and
//! per-step execution records.
//!
//! # Example Template (YAML)
//!
//! ```yaml
//! name: Project Kickoff
//! version: "1.0"
//! template_type: project
//! steps:
//!   - step_id: collect_brief
//!     name: Collect project brief
//!     handler: echo
//!
//!   - step_id: notify_team
//!     name: Notify the team
//!     handler: echo
//!     dependencies:
//!       - collect_brief
//!     retries: 2
//!     timeout_ms: 30000
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// What kind of work a step represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    Action,
    Condition,
    Loop,
    Parallel,
    Delay,
    Approval,
}

impl Default for StepType {
    fn default() -> Self {
        Self::Action
    }
}

/// Comparison operator used by step conditions.
///
/// `Other` captures operator names this engine does not know about;
/// the validator rejects them, and the runtime evaluator treats them
/// as vacuously true for templates that bypassed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    Contains,
    GreaterThan,
    LessThan,
    GreaterOrEqual,
    LessOrEqual,
    Exists,
    NotExists,
    #[serde(untagged)]
    Other(String),
}

impl ConditionOperator {
    /// True for operators that test presence rather than compare values.
    pub fn is_existence(&self) -> bool {
        matches!(self, Self::Exists | Self::NotExists)
    }
}

/// How multiple conditions on one step combine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalOperator {
    And,
    Or,
    #[serde(untagged)]
    Other(String),
}

/// A single predicate gating step execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Dotted path into the run's variable bindings, e.g. `input.flag`.
    pub field: String,

    pub operator: ConditionOperator,

    /// Comparison value; optional for existence operators.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,

    /// How this condition combines with the next one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logical_operator: Option<LogicalOperator>,
}

impl Condition {
    pub fn new(field: impl Into<String>, operator: ConditionOperator, value: Value) -> Self {
        Self {
            field: field.into(),
            operator,
            value: Some(value),
            logical_operator: None,
        }
    }

    /// Builds an existence check (no comparison value).
    pub fn exists(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            operator: ConditionOperator::Exists,
            value: None,
            logical_operator: None,
        }
    }
}

/// What the run should do when a step exhausts its attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnErrorPolicy {
    /// Record the failure and move on to the next step.
    Continue,
    /// Fail the whole run.
    Halt,
    /// Equivalent to Halt once retries are exhausted.
    Retry,
    /// Record the step as skipped and move on.
    Skip,
}

impl Default for OnErrorPolicy {
    fn default() -> Self {
        Self::Halt
    }
}

/// Template-level retry policy applied when a step has no per-step override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first execution. Must be >= 1.
    pub max_attempts: u32,

    /// Delay between attempts in milliseconds.
    pub delay_ms: u64,

    /// Multiplier applied to the delay after each attempt, if set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backoff_multiplier: Option<f64>,

    /// Upper bound for the delay when backoff is applied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_delay_ms: Option<u64>,
}

/// A single step within a workflow template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStep {
    /// Unique identifier within the template.
    pub step_id: String,

    /// Human-readable step name.
    pub name: String,

    #[serde(default)]
    pub step_type: StepType,

    /// Registry key of the handler this step dispatches to.
    pub handler: String,

    /// Handler-specific configuration, passed through untouched.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub handler_config: Value,

    /// Display/ordering hint. Explicit duplicates are tolerated with a
    /// warning; steps without one carry no hint at all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,

    /// Step ids that must complete before this step runs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,

    /// Predicates that must all hold for the step to run.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    /// Per-step timeout in milliseconds. Engine default applies when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    /// Additional attempts after the first failure.
    #[serde(default)]
    pub retries: u32,

    /// Fixed delay between attempts in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    #[serde(default)]
    pub on_error: OnErrorPolicy,
}

fn default_retry_delay_ms() -> u64 {
    1000
}

impl WorkflowStep {
    /// Creates a new step with the given id, name and handler.
    ///
    /// # Example
    ///
    /// ```
    /// use flowrunner::workflow::WorkflowStep;
    ///
    /// let step = WorkflowStep::new("notify", "Notify team", "email")
    ///     .depends_on("collect")
    ///     .with_retries(2)
    ///     .with_timeout(30_000);
    /// ```
    pub fn new(
        step_id: impl Into<String>,
        name: impl Into<String>,
        handler: impl Into<String>,
    ) -> Self {
        Self {
            step_id: step_id.into().trim().to_string(),
            name: name.into().trim().to_string(),
            step_type: StepType::Action,
            handler: handler.into().trim().to_string(),
            handler_config: Value::Null,
            order: None,
            dependencies: Vec::new(),
            conditions: Vec::new(),
            timeout_ms: None,
            retries: 0,
            retry_delay_ms: default_retry_delay_ms(),
            on_error: OnErrorPolicy::Halt,
        }
    }

    pub fn with_type(mut self, step_type: StepType) -> Self {
        self.step_type = step_type;
        self
    }

    pub fn with_config(mut self, config: Value) -> Self {
        self.handler_config = config;
        self
    }

    pub fn with_order(mut self, order: i64) -> Self {
        self.order = Some(order);
        self
    }

    /// Adds a dependency on another step.
    pub fn depends_on(mut self, step_id: impl Into<String>) -> Self {
        self.dependencies.push(step_id.into());
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_retry_delay(mut self, delay_ms: u64) -> Self {
        self.retry_delay_ms = delay_ms;
        self
    }

    pub fn with_on_error(mut self, policy: OnErrorPolicy) -> Self {
        self.on_error = policy;
        self
    }
}

/// A reusable workflow blueprint: ordered steps plus metadata.
///
/// Templates are immutable once created; updates replace the step list
/// wholesale rather than patching individual steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowTemplate {
    #[serde(default = "new_id")]
    pub id: String,

    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub version: String,

    /// Free-form category, e.g. "project", "onboarding".
    pub template_type: String,

    pub steps: Vec<WorkflowStep>,

    /// Default variable bindings seeded into every run.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub variables: Map<String, Value>,

    /// Structural schema the caller's input must satisfy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_policy: Option<RetryPolicy>,

    #[serde(default = "default_active")]
    pub active: bool,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn default_active() -> bool {
    true
}

impl WorkflowTemplate {
    /// Creates a new empty template.
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        template_type: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            name: name.into(),
            description: None,
            version: version.into(),
            template_type: template_type.into(),
            steps: Vec::new(),
            variables: Map::new(),
            input_schema: None,
            output_schema: None,
            retry_policy: None,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Adds a step, rejecting duplicate step ids.
    pub fn add_step(&mut self, step: WorkflowStep) -> Result<(), String> {
        if self.steps.iter().any(|s| s.step_id == step.step_id) {
            return Err(format!("Step '{}' already exists", step.step_id));
        }
        self.steps.push(step);
        Ok(())
    }

    /// Gets a step by id.
    pub fn get_step(&self, step_id: &str) -> Option<&WorkflowStep> {
        self.steps.iter().find(|s| s.step_id == step_id)
    }

    /// Returns steps with no dependencies (entry points).
    pub fn root_steps(&self) -> Vec<&WorkflowStep> {
        self.steps
            .iter()
            .filter(|s| s.dependencies.is_empty())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Status of a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Paused,
    Completed,
    Failed,
    Cancelled,
    TimedOut,
}

impl ExecutionStatus {
    /// A terminal run can never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Cancelled | Self::TimedOut
        )
    }
}

/// Status of one step within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
    TimedOut,
    Cancelled,
}

impl StepStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Skipped | Self::TimedOut | Self::Cancelled
        )
    }
}

/// One instantiation of a template with concrete input.
///
/// The persisted snapshot is the source of truth; any in-memory copy is
/// a cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowExecution {
    pub id: String,
    pub workflow_id: String,
    pub status: ExecutionStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_step_id: Option<String>,

    pub input: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,

    /// Mutable runtime bindings, seeded from template defaults + caller input.
    #[serde(default)]
    pub variables: Map<String, Value>,

    pub total_steps: u32,
    pub completed_steps: u32,
    pub failed_steps: u32,
    pub skipped_steps: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
}

impl WorkflowExecution {
    /// Creates a pending run for a template, seeding variables from the
    /// template defaults overlaid with the caller's input object fields.
    /// The whole input is also bound under `input`, so conditions may
    /// address a field as either `flag` or `input.flag`.
    pub fn new(template: &WorkflowTemplate, input: Value) -> Self {
        let mut variables = template.variables.clone();
        if let Value::Object(fields) = &input {
            for (k, v) in fields {
                variables.insert(k.clone(), v.clone());
            }
        }
        variables.insert("input".to_string(), input.clone());

        Self {
            id: new_id(),
            workflow_id: template.id.clone(),
            status: ExecutionStatus::Pending,
            current_step_id: None,
            input,
            output: None,
            variables,
            total_steps: template.steps.len() as u32,
            completed_steps: 0,
            failed_steps: 0,
            skipped_steps: 0,
            error: None,
            started_at: None,
            ended_at: None,
            created_at: Utc::now(),
        }
    }
}

/// The record of one step's attempts within one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepExecution {
    pub id: String,
    pub execution_id: String,
    pub step_id: String,
    pub status: StepStatus,

    /// 1-based attempt counter; 0 until the step first runs.
    pub attempt: u32,
    pub max_attempts: u32,
    pub retry_count: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,

    pub created_at: DateTime<Utc>,
}

impl StepExecution {
    /// Creates the pending record for one template step in one run.
    pub fn new(execution_id: &str, step: &WorkflowStep) -> Self {
        Self {
            id: new_id(),
            execution_id: execution_id.to_string(),
            step_id: step.step_id.clone(),
            status: StepStatus::Pending,
            attempt: 0,
            max_attempts: step.retries + 1,
            retry_count: 0,
            input: None,
            output: None,
            error: None,
            started_at: None,
            ended_at: None,
            duration_ms: None,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_step_creation() {
        let step = WorkflowStep::new("notify", "Notify team", "email")
            .depends_on("collect")
            .with_retries(2)
            .with_timeout(30_000);

        assert_eq!(step.step_id, "notify");
        assert_eq!(step.handler, "email");
        assert_eq!(step.retries, 2);
        assert_eq!(step.timeout_ms, Some(30_000));
        assert_eq!(step.dependencies, vec!["collect"]);
        assert_eq!(step.on_error, OnErrorPolicy::Halt);
    }

    #[test]
    fn test_step_ids_trimmed() {
        let step = WorkflowStep::new("  spaced  ", "Name", "handler");
        assert_eq!(step.step_id, "spaced");
    }

    #[test]
    fn test_template_add_step_rejects_duplicates() {
        let mut template = WorkflowTemplate::new("Test", "1.0", "project");
        let step = WorkflowStep::new("s1", "Step 1", "echo");

        assert!(template.add_step(step.clone()).is_ok());
        assert!(template.add_step(step).is_err());
        assert_eq!(template.len(), 1);
    }

    #[test]
    fn test_template_root_steps() {
        let mut template = WorkflowTemplate::new("Test", "1.0", "project");
        template
            .add_step(WorkflowStep::new("a", "A", "echo"))
            .unwrap();
        template
            .add_step(WorkflowStep::new("b", "B", "echo").depends_on("a"))
            .unwrap();

        let roots = template.root_steps();
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].step_id, "a");
    }

    #[test]
    fn test_execution_seeds_variables() {
        let mut template = WorkflowTemplate::new("Test", "1.0", "project");
        template
            .variables
            .insert("env".to_string(), json!("staging"));
        template.variables.insert("flag".to_string(), json!(false));
        template
            .add_step(WorkflowStep::new("a", "A", "echo"))
            .unwrap();

        // Caller input overrides template defaults
        let run = WorkflowExecution::new(&template, json!({ "flag": true }));
        assert_eq!(run.variables.get("env"), Some(&json!("staging")));
        assert_eq!(run.variables.get("flag"), Some(&json!(true)));
        // Input fields are also addressable through the `input` binding
        assert_eq!(run.variables.get("input"), Some(&json!({ "flag": true })));
        assert_eq!(run.total_steps, 1);
        assert_eq!(run.status, ExecutionStatus::Pending);
    }

    #[test]
    fn test_step_execution_max_attempts() {
        let step = WorkflowStep::new("s1", "S1", "echo").with_retries(2);
        let record = StepExecution::new("run-1", &step);

        // retries count additional attempts: 2 retries = 3 attempts total
        assert_eq!(record.max_attempts, 3);
        assert_eq!(record.attempt, 0);
        assert_eq!(record.status, StepStatus::Pending);
    }

    #[test]
    fn test_status_terminality() {
        assert!(ExecutionStatus::Completed.is_terminal());
        assert!(ExecutionStatus::Cancelled.is_terminal());
        assert!(!ExecutionStatus::Paused.is_terminal());
        assert!(!ExecutionStatus::Running.is_terminal());

        assert!(StepStatus::Skipped.is_terminal());
        assert!(!StepStatus::Pending.is_terminal());
        assert!(!StepStatus::Running.is_terminal());
    }

    #[test]
    fn test_condition_operator_parsing() {
        let op: ConditionOperator = serde_json::from_str("\"equals\"").unwrap();
        assert_eq!(op, ConditionOperator::Equals);

        let op: ConditionOperator = serde_json::from_str("\"not_exists\"").unwrap();
        assert_eq!(op, ConditionOperator::NotExists);

        // Unknown names are preserved rather than rejected at parse time
        let op: ConditionOperator = serde_json::from_str("\"fuzzy_match\"").unwrap();
        assert_eq!(op, ConditionOperator::Other("fuzzy_match".to_string()));
    }

    #[test]
    fn test_template_json_roundtrip() {
        let mut template = WorkflowTemplate::new("Roundtrip", "2.1", "ops");
        template
            .add_step(
                WorkflowStep::new("a", "A", "echo")
                    .with_condition(Condition::new(
                        "input.flag",
                        ConditionOperator::Equals,
                        json!(true),
                    ))
                    .with_retries(1),
            )
            .unwrap();

        let json = serde_json::to_string(&template).unwrap();
        let parsed: WorkflowTemplate = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.name, "Roundtrip");
        assert_eq!(parsed.steps, template.steps);
    }

    #[test]
    fn test_step_defaults_from_minimal_yaml() {
        let yaml = r#"
step_id: fetch
name: Fetch data
handler: http
"#;
        let step: WorkflowStep = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(step.step_type, StepType::Action);
        assert_eq!(step.retries, 0);
        assert_eq!(step.retry_delay_ms, 1000);
        assert_eq!(step.on_error, OnErrorPolicy::Halt);
        assert!(step.dependencies.is_empty());
    }
}
