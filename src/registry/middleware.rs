//! Dispatch Middleware
//!
//! Cross-cutting hooks around handler dispatch. Middleware is registered
//! on the registry; `before` hooks run in registration order and `after`
//! hooks in reverse, so the first registered middleware is outermost.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error, info};
use serde_json::Value;

use super::handler::HandlerContext;
use crate::error::WorkflowError;

/// Hooks invoked around every handler dispatch.
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn before(&self, handler: &str, input: &Value, ctx: &HandlerContext);

    async fn after(
        &self,
        handler: &str,
        result: &Result<Value, WorkflowError>,
        duration: Duration,
        ctx: &HandlerContext,
    );
}

/// Logs a line at dispatch start and one at completion.
pub struct LoggingMiddleware;

#[async_trait]
impl Middleware for LoggingMiddleware {
    async fn before(&self, handler: &str, _input: &Value, ctx: &HandlerContext) {
        debug!(
            "Dispatching handler '{}' for step '{}' (attempt {}/{})",
            handler, ctx.step_id, ctx.attempt, ctx.max_attempts
        );
    }

    async fn after(
        &self,
        handler: &str,
        result: &Result<Value, WorkflowError>,
        duration: Duration,
        ctx: &HandlerContext,
    ) {
        match result {
            Ok(_) => info!(
                "Handler '{}' completed for step '{}' in {} ms",
                handler,
                ctx.step_id,
                duration.as_millis()
            ),
            Err(e) => error!(
                "Handler '{}' failed for step '{}' after {} ms: {}",
                handler,
                ctx.step_id,
                duration.as_millis(),
                e
            ),
        }
    }
}

/// Rolling per-handler statistics.
#[derive(Debug, Clone, Default)]
pub struct HandlerStats {
    pub invocations: u64,
    pub successes: u64,
    pub failures: u64,
    pub min_duration_ms: u64,
    pub max_duration_ms: u64,
    total_duration_ms: u64,
}

impl HandlerStats {
    pub fn avg_duration_ms(&self) -> u64 {
        if self.invocations == 0 {
            0
        } else {
            self.total_duration_ms / self.invocations
        }
    }

    fn record(&mut self, success: bool, duration_ms: u64) {
        if self.invocations == 0 {
            self.min_duration_ms = duration_ms;
            self.max_duration_ms = duration_ms;
        } else {
            self.min_duration_ms = self.min_duration_ms.min(duration_ms);
            self.max_duration_ms = self.max_duration_ms.max(duration_ms);
        }
        self.invocations += 1;
        self.total_duration_ms += duration_ms;
        if success {
            self.successes += 1;
        } else {
            self.failures += 1;
        }
    }
}

/// Collects per-handler invocation counts and duration bounds.
#[derive(Default)]
pub struct MetricsMiddleware {
    stats: Mutex<HashMap<String, HandlerStats>>,
}

impl MetricsMiddleware {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all per-handler statistics.
    pub fn snapshot(&self) -> HashMap<String, HandlerStats> {
        match self.stats.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Statistics for one handler, if it has been dispatched.
    pub fn stats_for(&self, handler: &str) -> Option<HandlerStats> {
        match self.stats.lock() {
            Ok(guard) => guard.get(handler).cloned(),
            Err(poisoned) => poisoned.into_inner().get(handler).cloned(),
        }
    }
}

#[async_trait]
impl Middleware for MetricsMiddleware {
    async fn before(&self, _handler: &str, _input: &Value, _ctx: &HandlerContext) {}

    async fn after(
        &self,
        handler: &str,
        result: &Result<Value, WorkflowError>,
        duration: Duration,
        _ctx: &HandlerContext,
    ) {
        let duration_ms = duration.as_millis() as u64;
        if let Ok(mut guard) = self.stats.lock() {
            guard
                .entry(handler.to_string())
                .or_default()
                .record(result.is_ok(), duration_ms);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_metrics_middleware_accumulates() {
        let metrics = MetricsMiddleware::new();
        let ctx = HandlerContext::new("run-1", "s1");

        metrics
            .after("echo", &Ok(json!({})), Duration::from_millis(10), &ctx)
            .await;
        metrics
            .after("echo", &Ok(json!({})), Duration::from_millis(30), &ctx)
            .await;
        metrics
            .after(
                "echo",
                &Err(WorkflowError::step_execution("s1", "boom")),
                Duration::from_millis(20),
                &ctx,
            )
            .await;

        let stats = metrics.stats_for("echo").unwrap();
        assert_eq!(stats.invocations, 3);
        assert_eq!(stats.successes, 2);
        assert_eq!(stats.failures, 1);
        assert_eq!(stats.min_duration_ms, 10);
        assert_eq!(stats.max_duration_ms, 30);
        assert_eq!(stats.avg_duration_ms(), 20);
    }

    #[tokio::test]
    async fn test_metrics_snapshot_is_per_handler() {
        let metrics = MetricsMiddleware::new();
        let ctx = HandlerContext::new("run-1", "s1");

        metrics
            .after("echo", &Ok(json!({})), Duration::from_millis(5), &ctx)
            .await;
        metrics
            .after("delay", &Ok(json!({})), Duration::from_millis(50), &ctx)
            .await;

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot["echo"].invocations, 1);
        assert_eq!(snapshot["delay"].invocations, 1);
    }

    #[test]
    fn test_empty_stats_avg_is_zero() {
        assert_eq!(HandlerStats::default().avg_duration_ms(), 0);
    }
}
