//! Template Validation
//!
//! Provides comprehensive static validation for workflow templates including:
//! - Required field and per-step checks
//! - Dependency reference integrity
//! - Cycle detection over the dependency graph (DFS, reports the cycle path)
//! - Condition and retry-policy checks
//! - Recursive structural input validation against a template's input schema
//!
//! All functions here are pure: no I/O, no store access.

use std::collections::{HashMap, HashSet};

use log::debug;
use serde_json::Value;

use super::model::{
    Condition, ConditionOperator, LogicalOperator, RetryPolicy, WorkflowStep, WorkflowTemplate,
};

/// Retry counts above this are allowed but flagged as a performance risk.
const MAX_ATTEMPTS_WARN_THRESHOLD: u32 = 10;

/// A single validation finding, classified as error or warning by the
/// list it appears in.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationIssue {
    MissingName,
    MissingVersion,
    MissingTemplateType,
    NoSteps,
    EmptyStepId,
    DuplicateStepId(String),
    MissingStepName(String),
    MissingHandler(String),
    NegativeOrder { step: String, order: i64 },
    DuplicateOrder { order: i64, steps: Vec<String> },
    InvalidTimeout { step: String },
    InvalidRetryDelay { step: String },
    UnknownDependency { step: String, dependency: String },
    SelfDependency(String),
    CircularDependency { path: String },
    MissingConditionField(String),
    UnknownConditionOperator { step: String, operator: String },
    MissingConditionValue { step: String, field: String },
    UnknownLogicalOperator { step: String, operator: String },
    InvalidRetryPolicyAttempts { max_attempts: u32 },
    InvalidBackoffMultiplier { multiplier: f64 },
    InvalidMaxDelay { max_delay_ms: u64, delay_ms: u64 },
    HighMaxAttempts { max_attempts: u32 },
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingName => write!(f, "Template has no name"),
            Self::MissingVersion => write!(f, "Template has no version"),
            Self::MissingTemplateType => write!(f, "Template has no type"),
            Self::NoSteps => write!(f, "Template has no steps"),
            Self::EmptyStepId => write!(f, "A step has an empty or whitespace-only id"),
            Self::DuplicateStepId(id) => write!(f, "Duplicate step id: '{}'", id),
            Self::MissingStepName(id) => write!(f, "Step '{}' has no name", id),
            Self::MissingHandler(id) => write!(f, "Step '{}' has no handler", id),
            Self::NegativeOrder { step, order } => {
                write!(f, "Step '{}' has negative order {}", step, order)
            }
            Self::DuplicateOrder { order, steps } => {
                write!(f, "Order {} is shared by steps {:?}", order, steps)
            }
            Self::InvalidTimeout { step } => {
                write!(f, "Step '{}' has a timeout of 0 ms", step)
            }
            Self::InvalidRetryDelay { step } => {
                write!(f, "Step '{}' has a retry delay of 0 ms", step)
            }
            Self::UnknownDependency { step, dependency } => {
                write!(f, "Step '{}' depends on unknown step '{}'", step, dependency)
            }
            Self::SelfDependency(id) => write!(f, "Step '{}' depends on itself", id),
            Self::CircularDependency { path } => {
                write!(f, "Circular dependency: {}", path)
            }
            Self::MissingConditionField(step) => {
                write!(f, "Step '{}' has a condition with an empty field", step)
            }
            Self::UnknownConditionOperator { step, operator } => {
                write!(f, "Step '{}' uses unknown condition operator '{}'", step, operator)
            }
            Self::MissingConditionValue { step, field } => {
                write!(
                    f,
                    "Step '{}' condition on '{}' has no comparison value",
                    step, field
                )
            }
            Self::UnknownLogicalOperator { step, operator } => {
                write!(f, "Step '{}' uses unknown logical operator '{}'", step, operator)
            }
            Self::InvalidRetryPolicyAttempts { max_attempts } => {
                write!(f, "Retry policy max_attempts must be >= 1 (got {})", max_attempts)
            }
            Self::InvalidBackoffMultiplier { multiplier } => {
                write!(f, "Retry policy backoff_multiplier must be > 0 (got {})", multiplier)
            }
            Self::InvalidMaxDelay {
                max_delay_ms,
                delay_ms,
            } => {
                write!(
                    f,
                    "Retry policy max_delay_ms ({}) is below delay_ms ({})",
                    max_delay_ms, delay_ms
                )
            }
            Self::HighMaxAttempts { max_attempts } => {
                write!(
                    f,
                    "Retry policy max_attempts {} exceeds {} - this may stall executions",
                    max_attempts, MAX_ATTEMPTS_WARN_THRESHOLD
                )
            }
        }
    }
}

/// Outcome of validating a template: hard errors and advisory warnings.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// True when no hard errors were found. Warnings do not fail validation.
    pub fn success(&self) -> bool {
        self.errors.is_empty()
    }

    /// Error messages, one per finding.
    pub fn error_messages(&self) -> Vec<String> {
        self.errors.iter().map(|e| e.to_string()).collect()
    }

    /// Warning messages, one per finding.
    pub fn warning_messages(&self) -> Vec<String> {
        self.warnings.iter().map(|w| w.to_string()).collect()
    }
}

/// Validates the entire template structure.
///
/// Performs the following checks:
/// 1. Required template fields (name, version, type, >= 1 step)
/// 2. Per-step field rules and unique step ids
/// 3. Dependency reference integrity (no unknown or self dependencies)
/// 4. Cycle detection over the dependency graph
/// 5. Condition and retry-policy rules
pub fn validate_template(template: &WorkflowTemplate) -> ValidationReport {
    let mut report = ValidationReport::default();

    if template.name.trim().is_empty() {
        report.errors.push(ValidationIssue::MissingName);
    }
    if template.version.trim().is_empty() {
        report.errors.push(ValidationIssue::MissingVersion);
    }
    if template.template_type.trim().is_empty() {
        report.errors.push(ValidationIssue::MissingTemplateType);
    }
    if template.steps.is_empty() {
        report.errors.push(ValidationIssue::NoSteps);
        return report;
    }

    // Unique step ids
    let mut seen_ids: HashSet<&str> = HashSet::new();
    for step in &template.steps {
        if step.step_id.trim().is_empty() {
            report.errors.push(ValidationIssue::EmptyStepId);
        } else if !seen_ids.insert(step.step_id.as_str()) {
            report
                .errors
                .push(ValidationIssue::DuplicateStepId(step.step_id.clone()));
        }
    }

    // Per-step rules
    for step in &template.steps {
        validate_step(step, &seen_ids, &mut report);
    }

    // Explicit duplicate order values are tolerated but should not collide
    // silently; steps without an order hint are not compared at all
    let mut by_order: HashMap<i64, Vec<String>> = HashMap::new();
    for step in &template.steps {
        if let Some(order) = step.order {
            by_order.entry(order).or_default().push(step.step_id.clone());
        }
    }
    for (order, steps) in by_order {
        if steps.len() > 1 {
            report
                .warnings
                .push(ValidationIssue::DuplicateOrder { order, steps });
        }
    }

    // Cycle detection only makes sense once references resolve
    if report.errors.is_empty() {
        if let Some(path) = find_cycle(&template.steps) {
            report
                .errors
                .push(ValidationIssue::CircularDependency { path });
        }
    }

    if let Some(policy) = &template.retry_policy {
        validate_retry_policy(policy, &mut report);
    }

    debug!(
        "Validated template '{}': {} errors, {} warnings",
        template.name,
        report.errors.len(),
        report.warnings.len()
    );

    report
}

/// Validates a single step's fields, references and conditions.
fn validate_step(step: &WorkflowStep, known_ids: &HashSet<&str>, report: &mut ValidationReport) {
    let id = &step.step_id;
    if id.trim().is_empty() {
        // Already reported; nothing else is attributable without an id
        return;
    }

    if step.name.trim().is_empty() {
        report
            .errors
            .push(ValidationIssue::MissingStepName(id.clone()));
    }
    if step.handler.trim().is_empty() {
        report
            .errors
            .push(ValidationIssue::MissingHandler(id.clone()));
    }
    if let Some(order) = step.order {
        if order < 0 {
            report.errors.push(ValidationIssue::NegativeOrder {
                step: id.clone(),
                order,
            });
        }
    }
    if step.timeout_ms == Some(0) {
        report
            .errors
            .push(ValidationIssue::InvalidTimeout { step: id.clone() });
    }
    if step.retry_delay_ms == 0 {
        report
            .errors
            .push(ValidationIssue::InvalidRetryDelay { step: id.clone() });
    }

    for dep in &step.dependencies {
        if dep == id {
            report
                .errors
                .push(ValidationIssue::SelfDependency(id.clone()));
        } else if !known_ids.contains(dep.as_str()) {
            report.errors.push(ValidationIssue::UnknownDependency {
                step: id.clone(),
                dependency: dep.clone(),
            });
        }
    }

    for condition in &step.conditions {
        validate_condition(id, condition, report);
    }
}

/// Validates one condition's field, operator and value presence.
fn validate_condition(step_id: &str, condition: &Condition, report: &mut ValidationReport) {
    if condition.field.trim().is_empty() {
        report
            .errors
            .push(ValidationIssue::MissingConditionField(step_id.to_string()));
    }

    if let ConditionOperator::Other(name) = &condition.operator {
        report.errors.push(ValidationIssue::UnknownConditionOperator {
            step: step_id.to_string(),
            operator: name.clone(),
        });
    }

    // Non-existence operators compare against a value; flag its absence
    if condition.value.is_none() && !condition.operator.is_existence() {
        report.warnings.push(ValidationIssue::MissingConditionValue {
            step: step_id.to_string(),
            field: condition.field.clone(),
        });
    }

    if let Some(LogicalOperator::Other(name)) = &condition.logical_operator {
        report.errors.push(ValidationIssue::UnknownLogicalOperator {
            step: step_id.to_string(),
            operator: name.clone(),
        });
    }
}

/// Validates the template-level retry policy bounds.
fn validate_retry_policy(policy: &RetryPolicy, report: &mut ValidationReport) {
    if policy.max_attempts < 1 {
        report.errors.push(ValidationIssue::InvalidRetryPolicyAttempts {
            max_attempts: policy.max_attempts,
        });
    } else if policy.max_attempts > MAX_ATTEMPTS_WARN_THRESHOLD {
        report.warnings.push(ValidationIssue::HighMaxAttempts {
            max_attempts: policy.max_attempts,
        });
    }

    if let Some(multiplier) = policy.backoff_multiplier {
        if multiplier <= 0.0 {
            report
                .errors
                .push(ValidationIssue::InvalidBackoffMultiplier { multiplier });
        }
    }

    if let Some(max_delay_ms) = policy.max_delay_ms {
        if max_delay_ms < policy.delay_ms {
            report.errors.push(ValidationIssue::InvalidMaxDelay {
                max_delay_ms,
                delay_ms: policy.delay_ms,
            });
        }
    }
}

/// Searches the dependency graph for a cycle using depth-first traversal.
///
/// Returns the path that closes the first cycle found, rendered as
/// `"a -> b -> a"`, or None when the graph is acyclic. Edges point from a
/// step to each of its dependencies.
fn find_cycle(steps: &[WorkflowStep]) -> Option<String> {
    let graph: HashMap<&str, &Vec<String>> = steps
        .iter()
        .map(|s| (s.step_id.as_str(), &s.dependencies))
        .collect();

    let mut visited: HashSet<&str> = HashSet::new();
    let mut stack: Vec<&str> = Vec::new();
    let mut on_stack: HashSet<&str> = HashSet::new();

    for step in steps {
        if !visited.contains(step.step_id.as_str()) {
            if let Some(path) = dfs(
                step.step_id.as_str(),
                &graph,
                &mut visited,
                &mut stack,
                &mut on_stack,
            ) {
                return Some(path);
            }
        }
    }

    None
}

fn dfs<'a>(
    node: &'a str,
    graph: &HashMap<&'a str, &'a Vec<String>>,
    visited: &mut HashSet<&'a str>,
    stack: &mut Vec<&'a str>,
    on_stack: &mut HashSet<&'a str>,
) -> Option<String> {
    visited.insert(node);
    stack.push(node);
    on_stack.insert(node);

    if let Some(deps) = graph.get(node) {
        for dep in deps.iter() {
            let dep = dep.as_str();
            if on_stack.contains(dep) {
                // Back-edge: render the portion of the stack that closes the cycle
                let start = stack.iter().position(|&n| n == dep).unwrap_or(0);
                let mut path: Vec<&str> = stack[start..].to_vec();
                path.push(dep);
                return Some(path.join(" -> "));
            }
            if !visited.contains(dep) && graph.contains_key(dep) {
                if let Some(path) = dfs(dep, graph, visited, stack, on_stack) {
                    return Some(path);
                }
            }
        }
    }

    stack.pop();
    on_stack.remove(node);
    None
}

/// Validates caller input against a template's structural input schema.
///
/// Supports `type` matching (arrays counted distinctly from objects),
/// `required` field presence, and recursion into `properties`. Full schema
/// semantics (`oneOf`, `$ref`, formats) are intentionally not implemented.
///
/// Returns one message per violation; an empty vector means the input is
/// acceptable.
pub fn validate_input(input: &Value, schema: &Value) -> Vec<String> {
    let mut errors = Vec::new();
    check_value("input", input, schema, &mut errors);
    errors
}

fn check_value(path: &str, value: &Value, schema: &Value, errors: &mut Vec<String>) {
    let Some(schema_obj) = schema.as_object() else {
        return;
    };

    if let Some(expected) = schema_obj.get("type").and_then(Value::as_str) {
        let actual = json_type_name(value);
        let matches = match expected {
            "integer" => value.as_i64().is_some() || value.as_u64().is_some(),
            other => other == actual,
        };
        if !matches {
            errors.push(format!(
                "{}: expected type '{}', got '{}'",
                path, expected, actual
            ));
            return;
        }
    }

    if let Some(required) = schema_obj.get("required").and_then(Value::as_array) {
        let fields = value.as_object();
        for name in required.iter().filter_map(Value::as_str) {
            let present = fields.map(|f| f.contains_key(name)).unwrap_or(false);
            if !present {
                errors.push(format!("{}: missing required field '{}'", path, name));
            }
        }
    }

    if let Some(properties) = schema_obj.get("properties").and_then(Value::as_object) {
        if let Some(fields) = value.as_object() {
            for (name, sub_schema) in properties {
                if let Some(sub_value) = fields.get(name) {
                    check_value(&format!("{}.{}", path, name), sub_value, sub_schema, errors);
                }
            }
        }
    }
}

/// The JSON type name of a value, counting arrays distinctly from objects.
fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Advisory suggestions derived from a template's shape.
///
/// These never affect validity; they feed the service-level validation
/// response alongside errors and warnings.
pub fn suggestions(template: &WorkflowTemplate) -> Vec<String> {
    let mut out = Vec::new();

    if template.description.is_none() {
        out.push("Add a description so operators can tell templates apart".to_string());
    }
    if template.steps.iter().all(|s| s.retries == 0) && template.retry_policy.is_none() {
        out.push("No step has retries configured - consider retries for fragile handlers".to_string());
    }
    if template.steps.iter().any(|s| s.timeout_ms.is_none()) {
        out.push("Some steps rely on the engine default timeout - set explicit timeouts for long-running handlers".to_string());
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::model::{Condition, ConditionOperator, WorkflowStep, WorkflowTemplate};
    use serde_json::json;

    fn template_with(steps: Vec<WorkflowStep>) -> WorkflowTemplate {
        let mut template = WorkflowTemplate::new("Test", "1.0", "project");
        template.steps = steps;
        template
    }

    #[test]
    fn test_valid_template() {
        let template = template_with(vec![
            WorkflowStep::new("a", "A", "echo"),
            WorkflowStep::new("b", "B", "echo").depends_on("a"),
        ]);

        let report = validate_template(&template);
        assert!(report.success(), "unexpected errors: {:?}", report.errors);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_missing_required_fields() {
        let mut template = template_with(vec![WorkflowStep::new("a", "A", "echo")]);
        template.name = "".to_string();
        template.version = "  ".to_string();
        template.template_type = "".to_string();

        let report = validate_template(&template);
        assert!(!report.success());
        assert!(report.errors.contains(&ValidationIssue::MissingName));
        assert!(report.errors.contains(&ValidationIssue::MissingVersion));
        assert!(report.errors.contains(&ValidationIssue::MissingTemplateType));
    }

    #[test]
    fn test_empty_template_fails() {
        let template = template_with(vec![]);
        let report = validate_template(&template);
        assert!(!report.success());
        assert!(report.errors.contains(&ValidationIssue::NoSteps));
    }

    #[test]
    fn test_duplicate_step_ids_always_error() {
        // Both steps are otherwise fully valid
        let template = template_with(vec![
            WorkflowStep::new("same", "First", "echo"),
            WorkflowStep::new("same", "Second", "echo"),
        ]);

        let report = validate_template(&template);
        assert!(!report.success());
        assert!(report
            .errors
            .contains(&ValidationIssue::DuplicateStepId("same".to_string())));
    }

    #[test]
    fn test_unknown_dependency() {
        let template =
            template_with(vec![WorkflowStep::new("a", "A", "echo").depends_on("ghost")]);

        let report = validate_template(&template);
        assert!(!report.success());
        assert!(report.errors.iter().any(|e| matches!(
            e,
            ValidationIssue::UnknownDependency { dependency, .. } if dependency == "ghost"
        )));
    }

    #[test]
    fn test_self_dependency() {
        let template = template_with(vec![WorkflowStep::new("a", "A", "echo").depends_on("a")]);

        let report = validate_template(&template);
        assert!(!report.success());
        assert!(report
            .errors
            .contains(&ValidationIssue::SelfDependency("a".to_string())));
    }

    #[test]
    fn test_cycle_detection_reports_path() {
        let template = template_with(vec![
            WorkflowStep::new("a", "A", "echo").depends_on("c"),
            WorkflowStep::new("b", "B", "echo").depends_on("a"),
            WorkflowStep::new("c", "C", "echo").depends_on("b"),
        ]);

        let report = validate_template(&template);
        assert!(!report.success());

        let cycle = report
            .errors
            .iter()
            .find_map(|e| match e {
                ValidationIssue::CircularDependency { path } => Some(path.clone()),
                _ => None,
            })
            .expect("expected a circular dependency error");

        // The path names every step in the cycle and closes on itself
        assert!(cycle.contains("a") && cycle.contains("b") && cycle.contains("c"));
        let first = cycle.split(" -> ").next().unwrap();
        let last = cycle.split(" -> ").last().unwrap();
        assert_eq!(first, last);
    }

    #[test]
    fn test_acyclic_diamond_passes() {
        let template = template_with(vec![
            WorkflowStep::new("root", "Root", "echo"),
            WorkflowStep::new("left", "Left", "echo").depends_on("root"),
            WorkflowStep::new("right", "Right", "echo").depends_on("root"),
            WorkflowStep::new("join", "Join", "echo")
                .depends_on("left")
                .depends_on("right"),
        ]);

        let report = validate_template(&template);
        assert!(report.success(), "unexpected errors: {:?}", report.errors);
    }

    #[test]
    fn test_duplicate_order_is_warning_only() {
        let template = template_with(vec![
            WorkflowStep::new("a", "A", "echo").with_order(1),
            WorkflowStep::new("b", "B", "echo").with_order(1),
        ]);

        let report = validate_template(&template);
        assert!(report.success());
        assert!(report
            .warnings
            .iter()
            .any(|w| matches!(w, ValidationIssue::DuplicateOrder { order: 1, .. })));
    }

    #[test]
    fn test_steps_without_order_hint_never_collide() {
        // Builders leave the hint unset; that must not read as N copies
        // of the same order value
        let template = template_with(vec![
            WorkflowStep::new("a", "A", "echo"),
            WorkflowStep::new("b", "B", "echo"),
            WorkflowStep::new("c", "C", "echo").with_order(5),
        ]);

        let report = validate_template(&template);
        assert!(report.success());
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_zero_timeout_and_retry_delay() {
        let template = template_with(vec![WorkflowStep::new("a", "A", "echo")
            .with_timeout(0)
            .with_retry_delay(0)]);

        let report = validate_template(&template);
        assert!(!report.success());
        assert!(report
            .errors
            .contains(&ValidationIssue::InvalidTimeout { step: "a".into() }));
        assert!(report
            .errors
            .contains(&ValidationIssue::InvalidRetryDelay { step: "a".into() }));
    }

    #[test]
    fn test_unknown_condition_operator_is_error() {
        let step = WorkflowStep::new("a", "A", "echo").with_condition(Condition {
            field: "input.flag".to_string(),
            operator: ConditionOperator::Other("fuzzy".to_string()),
            value: Some(json!(true)),
            logical_operator: None,
        });

        let report = validate_template(&template_with(vec![step]));
        assert!(!report.success());
        assert!(report.errors.iter().any(|e| matches!(
            e,
            ValidationIssue::UnknownConditionOperator { operator, .. } if operator == "fuzzy"
        )));
    }

    #[test]
    fn test_missing_condition_value_is_warning() {
        let step = WorkflowStep::new("a", "A", "echo").with_condition(Condition {
            field: "input.flag".to_string(),
            operator: ConditionOperator::Equals,
            value: None,
            logical_operator: None,
        });

        let report = validate_template(&template_with(vec![step]));
        assert!(report.success());
        assert!(report.warnings.iter().any(|w| matches!(
            w,
            ValidationIssue::MissingConditionValue { field, .. } if field == "input.flag"
        )));
    }

    #[test]
    fn test_existence_operator_needs_no_value() {
        let step = WorkflowStep::new("a", "A", "echo").with_condition(Condition::exists("input.x"));

        let report = validate_template(&template_with(vec![step]));
        assert!(report.success());
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_retry_policy_bounds() {
        let mut template = template_with(vec![WorkflowStep::new("a", "A", "echo")]);
        template.retry_policy = Some(RetryPolicy {
            max_attempts: 0,
            delay_ms: 500,
            backoff_multiplier: Some(0.0),
            max_delay_ms: Some(100),
        });

        let report = validate_template(&template);
        assert!(!report.success());
        assert!(report
            .errors
            .contains(&ValidationIssue::InvalidRetryPolicyAttempts { max_attempts: 0 }));
        assert!(report
            .errors
            .iter()
            .any(|e| matches!(e, ValidationIssue::InvalidBackoffMultiplier { .. })));
        assert!(report.errors.iter().any(|e| matches!(
            e,
            ValidationIssue::InvalidMaxDelay {
                max_delay_ms: 100,
                delay_ms: 500
            }
        )));
    }

    #[test]
    fn test_high_max_attempts_is_warning() {
        let mut template = template_with(vec![WorkflowStep::new("a", "A", "echo")]);
        template.retry_policy = Some(RetryPolicy {
            max_attempts: 25,
            delay_ms: 100,
            backoff_multiplier: None,
            max_delay_ms: None,
        });

        let report = validate_template(&template);
        assert!(report.success());
        assert!(report
            .warnings
            .contains(&ValidationIssue::HighMaxAttempts { max_attempts: 25 }));
    }

    #[test]
    fn test_validate_input_type_mismatch() {
        let schema = json!({ "type": "object" });
        let errors = validate_input(&json!([1, 2]), &schema);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("expected type 'object'"));
        assert!(errors[0].contains("'array'"));
    }

    #[test]
    fn test_validate_input_required_fields() {
        let schema = json!({
            "type": "object",
            "required": ["name", "owner"],
        });
        let errors = validate_input(&json!({ "name": "proj" }), &schema);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("owner"));
    }

    #[test]
    fn test_validate_input_recurses_into_properties() {
        let schema = json!({
            "type": "object",
            "required": ["settings"],
            "properties": {
                "settings": {
                    "type": "object",
                    "required": ["region"],
                    "properties": {
                        "region": { "type": "string" }
                    }
                }
            }
        });

        let ok = validate_input(
            &json!({ "settings": { "region": "eu-west-1" } }),
            &schema,
        );
        assert!(ok.is_empty());

        let missing = validate_input(&json!({ "settings": {} }), &schema);
        assert_eq!(missing.len(), 1);
        assert!(missing[0].contains("input.settings"));

        let wrong_type = validate_input(
            &json!({ "settings": { "region": 7 } }),
            &schema,
        );
        assert_eq!(wrong_type.len(), 1);
        assert!(wrong_type[0].contains("input.settings.region"));
    }

    #[test]
    fn test_validate_input_integer_accepts_whole_numbers() {
        let schema = json!({ "type": "integer" });
        assert!(validate_input(&json!(7), &schema).is_empty());
        assert!(!validate_input(&json!("7"), &schema).is_empty());
    }

    #[test]
    fn test_suggestions_for_bare_template() {
        let template = template_with(vec![WorkflowStep::new("a", "A", "echo")]);
        let hints = suggestions(&template);
        assert!(!hints.is_empty());
        assert!(hints.iter().any(|h| h.contains("description")));
    }
}
