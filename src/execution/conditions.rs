//! Runtime Condition Evaluation
//!
//! Evaluates step conditions against a run's variable bindings. Fields are
//! dotted paths into the bindings (`input.flag`, `review.score`); missing
//! segments resolve to nothing, which only the existence operators treat
//! as meaningful.

use log::warn;
use serde_json::{Map, Value};

use crate::workflow::model::{Condition, ConditionOperator, LogicalOperator};

/// Resolves a dotted path against the variable bindings.
///
/// Returns `None` when any segment is missing or a non-object is
/// traversed into.
pub fn resolve_field<'a>(variables: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = variables.get(first)?;

    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }

    Some(current)
}

/// Evaluates a single condition against the bindings.
pub fn evaluate_condition(variables: &Map<String, Value>, condition: &Condition) -> bool {
    let actual = resolve_field(variables, &condition.field);

    match &condition.operator {
        ConditionOperator::Exists => actual.is_some(),
        ConditionOperator::NotExists => actual.is_none(),
        ConditionOperator::Equals => compare_eq(actual, condition.value.as_ref()),
        ConditionOperator::NotEquals => !compare_eq(actual, condition.value.as_ref()),
        ConditionOperator::Contains => contains(actual, condition.value.as_ref()),
        ConditionOperator::GreaterThan => compare_num(actual, condition.value.as_ref(), |a, b| a > b),
        ConditionOperator::LessThan => compare_num(actual, condition.value.as_ref(), |a, b| a < b),
        ConditionOperator::GreaterOrEqual => {
            compare_num(actual, condition.value.as_ref(), |a, b| a >= b)
        }
        ConditionOperator::LessOrEqual => {
            compare_num(actual, condition.value.as_ref(), |a, b| a <= b)
        }
        ConditionOperator::Other(name) => {
            // Validation rejects unknown operators; a template that bypassed
            // validation gets the permissive reading rather than a dead run.
            warn!(
                "Unknown condition operator '{}' on field '{}', treating as satisfied",
                name, condition.field
            );
            true
        }
    }
}

/// Evaluates a step's condition list left to right.
///
/// Each condition's `logical_operator` says how it combines with the next
/// one; the default is AND. An empty list is vacuously true.
pub fn evaluate_all(variables: &Map<String, Value>, conditions: &[Condition]) -> bool {
    let mut iter = conditions.iter();
    let Some(first) = iter.next() else {
        return true;
    };

    let mut result = evaluate_condition(variables, first);
    let mut combine = first.logical_operator.clone();

    for condition in iter {
        let next = evaluate_condition(variables, condition);
        result = match combine {
            Some(LogicalOperator::Or) => result || next,
            Some(LogicalOperator::Other(ref name)) => {
                warn!("Unknown logical operator '{}', combining with AND", name);
                result && next
            }
            _ => result && next,
        };
        combine = condition.logical_operator.clone();
    }

    result
}

fn compare_eq(actual: Option<&Value>, expected: Option<&Value>) -> bool {
    match (actual, expected) {
        (Some(a), Some(b)) => a == b,
        (None, Some(Value::Null)) | (None, None) => true,
        _ => false,
    }
}

/// Substring check with string coercion: non-string scalars on either
/// side are rendered as their JSON text first. Arrays test membership.
fn contains(actual: Option<&Value>, expected: Option<&Value>) -> bool {
    let (Some(actual), Some(expected)) = (actual, expected) else {
        return false;
    };

    match actual {
        Value::Array(items) => items.contains(expected),
        _ => {
            let haystack = coerce_string(actual);
            let needle = coerce_string(expected);
            haystack.contains(&needle)
        }
    }
}

fn coerce_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn compare_num(
    actual: Option<&Value>,
    expected: Option<&Value>,
    cmp: impl Fn(f64, f64) -> bool,
) -> bool {
    match (
        actual.and_then(Value::as_f64),
        expected.and_then(Value::as_f64),
    ) {
        (Some(a), Some(b)) => cmp(a, b),
        _ => false,
    }
}
