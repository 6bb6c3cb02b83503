//! Error Taxonomy
//!
//! Typed errors for every failure class the engine can surface, plus
//! retryability and severity classification used by the step executor
//! and the logging layer.

use serde_json::Value;
use thiserror::Error;

/// How serious an error is from an operator's point of view.
///
/// Severity only drives logging verbosity. It never changes control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// All error kinds the workflow engine can produce.
///
/// Every variant carries a human-readable message; most also carry the
/// step or workflow they relate to so callers can correlate failures
/// with persisted records.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Template or request failed structural validation.
    #[error("validation failed: {message}")]
    Validation {
        message: String,
        details: Option<Value>,
    },

    /// The step dependency graph contains a cycle.
    #[error("circular dependency: {path}")]
    CircularDependency {
        /// The chain of step ids that closes the cycle, e.g. "a -> b -> a".
        path: String,
    },

    /// Caller input did not match the template's input schema.
    #[error("invalid input: {message}")]
    InvalidInput {
        message: String,
        details: Option<Value>,
    },

    /// A handler ran and reported failure.
    #[error("step '{step_id}' failed: {message}")]
    StepExecution {
        step_id: String,
        message: String,
        details: Option<Value>,
    },

    /// No handler is registered under the requested name or alias.
    #[error("handler '{name}' not found")]
    HandlerNotFound { name: String },

    /// A handler rejected its configuration or input.
    #[error("handler '{name}' configuration error: {message}")]
    HandlerConfiguration { name: String, message: String },

    /// A single step exceeded its timeout budget.
    #[error("step '{step_id}' timed out after {timeout_ms} ms")]
    StepTimeout { step_id: String, timeout_ms: u64 },

    /// An entire run exceeded its timeout budget.
    #[error("workflow '{workflow_id}' timed out after {timeout_ms} ms")]
    WorkflowTimeout { workflow_id: String, timeout_ms: u64 },

    /// No template exists with the given id.
    #[error("template '{template_id}' not found")]
    TemplateNotFound { template_id: String },

    /// No execution exists with the given id.
    #[error("execution '{execution_id}' not found")]
    ExecutionNotFound { execution_id: String },

    /// The backing store failed.
    #[error("database error: {message}")]
    Database { message: String },

    /// The requested transition conflicts with the current state
    /// (e.g. pausing a completed run, registering a duplicate handler).
    #[error("state conflict: {message}")]
    StateConflict { message: String },

    /// The caller is not allowed to perform the operation.
    #[error("permission denied: {message}")]
    Permission { message: String },

    /// A capacity limit was hit (e.g. max concurrent simulations).
    #[error("resource limit exceeded: {message}")]
    ResourceLimit { message: String },

    /// An unclassified fault, wrapped before crossing the public boundary.
    #[error("unexpected error: {message}")]
    Unknown { message: String },
}

impl WorkflowError {
    /// Stable machine-readable code for this error kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::CircularDependency { .. } => "CIRCULAR_DEPENDENCY",
            Self::InvalidInput { .. } => "INVALID_INPUT",
            Self::StepExecution { .. } => "STEP_EXECUTION_ERROR",
            Self::HandlerNotFound { .. } => "HANDLER_NOT_FOUND",
            Self::HandlerConfiguration { .. } => "HANDLER_CONFIGURATION_ERROR",
            Self::StepTimeout { .. } => "STEP_TIMEOUT",
            Self::WorkflowTimeout { .. } => "WORKFLOW_TIMEOUT",
            Self::TemplateNotFound { .. } => "TEMPLATE_NOT_FOUND",
            Self::ExecutionNotFound { .. } => "EXECUTION_NOT_FOUND",
            Self::Database { .. } => "DATABASE_ERROR",
            Self::StateConflict { .. } => "STATE_CONFLICT",
            Self::Permission { .. } => "PERMISSION_DENIED",
            Self::ResourceLimit { .. } => "RESOURCE_LIMIT_EXCEEDED",
            Self::Unknown { .. } => "UNKNOWN_ERROR",
        }
    }

    /// Whether re-attempting the failed operation without intervention
    /// could plausibly succeed.
    ///
    /// Structural errors (validation, missing handlers/templates/runs,
    /// permissions) never heal by retrying. Everything else, including
    /// unclassified errors, defaults to retryable.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::Validation { .. }
                | Self::CircularDependency { .. }
                | Self::InvalidInput { .. }
                | Self::HandlerNotFound { .. }
                | Self::TemplateNotFound { .. }
                | Self::ExecutionNotFound { .. }
                | Self::Permission { .. }
        )
    }

    /// Severity classification for logging.
    pub fn severity(&self) -> Severity {
        match self {
            Self::Database { .. } | Self::ResourceLimit { .. } => Severity::Critical,
            Self::StepTimeout { .. }
            | Self::WorkflowTimeout { .. }
            | Self::Permission { .. } => Severity::High,
            Self::StepExecution { .. } | Self::HandlerConfiguration { .. } => Severity::Medium,
            _ => Severity::Low,
        }
    }

    /// The step id this error relates to, if any.
    pub fn step_id(&self) -> Option<&str> {
        match self {
            Self::StepExecution { step_id, .. } | Self::StepTimeout { step_id, .. } => {
                Some(step_id)
            }
            _ => None,
        }
    }

    /// Wraps an arbitrary error into the generic unknown kind.
    pub fn unknown(err: impl std::fmt::Display) -> Self {
        Self::Unknown {
            message: err.to_string(),
        }
    }

    /// Shorthand for a validation error without structured details.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            details: None,
        }
    }

    /// Shorthand for a step execution error without structured details.
    pub fn step_execution(step_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StepExecution {
            step_id: step_id.into(),
            message: message.into(),
            details: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(WorkflowError::validation("x").code(), "VALIDATION_ERROR");
        assert_eq!(
            WorkflowError::TemplateNotFound {
                template_id: "t1".into()
            }
            .code(),
            "TEMPLATE_NOT_FOUND"
        );
        assert_eq!(
            WorkflowError::HandlerNotFound { name: "h".into() }.code(),
            "HANDLER_NOT_FOUND"
        );
        assert_eq!(WorkflowError::unknown("boom").code(), "UNKNOWN_ERROR");
    }

    #[test]
    fn test_non_retryable_kinds() {
        assert!(!WorkflowError::validation("x").is_retryable());
        assert!(!WorkflowError::CircularDependency { path: "a -> a".into() }.is_retryable());
        assert!(!WorkflowError::InvalidInput {
            message: "x".into(),
            details: None
        }
        .is_retryable());
        assert!(!WorkflowError::HandlerNotFound { name: "h".into() }.is_retryable());
        assert!(!WorkflowError::TemplateNotFound {
            template_id: "t".into()
        }
        .is_retryable());
        assert!(!WorkflowError::ExecutionNotFound {
            execution_id: "e".into()
        }
        .is_retryable());
        assert!(!WorkflowError::Permission { message: "no".into() }.is_retryable());
    }

    #[test]
    fn test_retryable_kinds_default() {
        assert!(WorkflowError::step_execution("s1", "boom").is_retryable());
        assert!(WorkflowError::StepTimeout {
            step_id: "s1".into(),
            timeout_ms: 100
        }
        .is_retryable());
        assert!(WorkflowError::Database { message: "down".into() }.is_retryable());
        // Unknown/foreign errors default to retryable
        assert!(WorkflowError::unknown("???").is_retryable());
    }

    #[test]
    fn test_severity_classification() {
        assert_eq!(
            WorkflowError::Database { message: "x".into() }.severity(),
            Severity::Critical
        );
        assert_eq!(
            WorkflowError::ResourceLimit { message: "x".into() }.severity(),
            Severity::Critical
        );
        assert_eq!(
            WorkflowError::StepTimeout {
                step_id: "s".into(),
                timeout_ms: 1
            }
            .severity(),
            Severity::High
        );
        assert_eq!(
            WorkflowError::Permission { message: "x".into() }.severity(),
            Severity::High
        );
        assert_eq!(
            WorkflowError::step_execution("s", "x").severity(),
            Severity::Medium
        );
        assert_eq!(WorkflowError::validation("x").severity(), Severity::Low);
        assert_eq!(WorkflowError::unknown("x").severity(), Severity::Low);
    }

    #[test]
    fn test_display_includes_context() {
        let err = WorkflowError::StepTimeout {
            step_id: "fetch".into(),
            timeout_ms: 30000,
        };
        let msg = err.to_string();
        assert!(msg.contains("fetch"));
        assert!(msg.contains("30000"));
    }

    #[test]
    fn test_step_id_accessor() {
        assert_eq!(
            WorkflowError::step_execution("s9", "x").step_id(),
            Some("s9")
        );
        assert_eq!(WorkflowError::validation("x").step_id(), None);
    }
}
