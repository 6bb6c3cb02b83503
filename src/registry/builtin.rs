//! Built-in Handlers
//!
//! Small fixture handlers used by the CLI and tests. These exercise the
//! execution contract; they are not integrations.

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::time::{sleep, Duration};

use super::handler::{Handler, HandlerContext, HandlerMetadata};
use crate::error::WorkflowError;

/// Succeeds immediately with a null output.
pub struct NoopHandler;

#[async_trait]
impl Handler for NoopHandler {
    fn metadata(&self) -> HandlerMetadata {
        HandlerMetadata::new("noop", "Does nothing and succeeds")
    }

    async fn execute(&self, _input: Value, _ctx: &HandlerContext) -> Result<Value, WorkflowError> {
        Ok(Value::Null)
    }
}

/// Returns its input unchanged.
pub struct EchoHandler;

#[async_trait]
impl Handler for EchoHandler {
    fn metadata(&self) -> HandlerMetadata {
        HandlerMetadata::new("echo", "Returns its input unchanged")
    }

    async fn execute(&self, input: Value, _ctx: &HandlerContext) -> Result<Value, WorkflowError> {
        Ok(input)
    }
}

/// Sleeps for `delay_ms` from its input (default 100), then succeeds.
pub struct DelayHandler;

#[async_trait]
impl Handler for DelayHandler {
    fn metadata(&self) -> HandlerMetadata {
        HandlerMetadata::new("delay", "Sleeps for input.delay_ms milliseconds")
    }

    fn validate_input(&self, input: &Value) -> Result<(), String> {
        match input.get("delay_ms") {
            None => Ok(()),
            Some(v) if v.as_u64().is_some() => Ok(()),
            Some(v) => Err(format!("delay_ms must be a non-negative integer, got {}", v)),
        }
    }

    async fn execute(&self, input: Value, _ctx: &HandlerContext) -> Result<Value, WorkflowError> {
        let delay_ms = input.get("delay_ms").and_then(Value::as_u64).unwrap_or(100);
        sleep(Duration::from_millis(delay_ms)).await;
        Ok(json!({ "slept_ms": delay_ms }))
    }
}

/// Fails deliberately.
///
/// With `fail_until_attempt: N` in its input it fails while the attempt
/// counter is below N and succeeds from attempt N on; without it, it
/// always fails. Used to exercise retry behavior.
pub struct FailHandler;

#[async_trait]
impl Handler for FailHandler {
    fn metadata(&self) -> HandlerMetadata {
        HandlerMetadata::new("fail", "Fails deliberately, optionally until a given attempt")
    }

    async fn execute(&self, input: Value, ctx: &HandlerContext) -> Result<Value, WorkflowError> {
        let threshold = input.get("fail_until_attempt").and_then(Value::as_u64);

        match threshold {
            Some(n) if u64::from(ctx.attempt) >= n => {
                Ok(json!({ "succeeded_on_attempt": ctx.attempt }))
            }
            _ => {
                let message = input
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("deliberate failure")
                    .to_string();
                Err(WorkflowError::step_execution(&ctx.step_id, message))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_echo_returns_input() {
        let ctx = HandlerContext::new("run-1", "s1");
        let out = EchoHandler
            .execute(json!({ "k": 1 }), &ctx)
            .await
            .unwrap();
        assert_eq!(out, json!({ "k": 1 }));
    }

    #[tokio::test]
    async fn test_fail_always_without_threshold() {
        let ctx = HandlerContext::new("run-1", "s1").with_attempt(5, 5);
        let err = FailHandler.execute(json!({}), &ctx).await.unwrap_err();
        assert_eq!(err.code(), "STEP_EXECUTION_ERROR");
        assert_eq!(err.step_id(), Some("s1"));
    }

    #[tokio::test]
    async fn test_fail_until_attempt() {
        let input = json!({ "fail_until_attempt": 3 });

        let ctx = HandlerContext::new("run-1", "s1").with_attempt(2, 3);
        assert!(FailHandler.execute(input.clone(), &ctx).await.is_err());

        let ctx = HandlerContext::new("run-1", "s1").with_attempt(3, 3);
        let out = FailHandler.execute(input, &ctx).await.unwrap();
        assert_eq!(out, json!({ "succeeded_on_attempt": 3 }));
    }

    #[test]
    fn test_delay_rejects_bad_input() {
        assert!(DelayHandler.validate_input(&json!({ "delay_ms": -5 })).is_err());
        assert!(DelayHandler.validate_input(&json!({ "delay_ms": "soon" })).is_err());
        assert!(DelayHandler.validate_input(&json!({ "delay_ms": 10 })).is_ok());
        assert!(DelayHandler.validate_input(&json!({})).is_ok());
    }
}
