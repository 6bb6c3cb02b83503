//! Handler Registry
//!
//! Named handler lookup with alias support and a middleware chain around
//! dispatch. Registration is expected at startup; lookups clone the
//! handler `Arc` under the lock so no lock is held across an await.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;

use log::{debug, info, warn};
use serde_json::Value;

use super::handler::{Handler, HandlerContext, HandlerMetadata, StepExecutionResult};
use super::middleware::Middleware;
use crate::error::WorkflowError;

/// Registry of step handlers, keyed by name with optional aliases.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<String, Arc<dyn Handler>>>,
    /// alias -> canonical handler name
    aliases: RwLock<HashMap<String, String>>,
    middleware: RwLock<Vec<Arc<dyn Middleware>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler under its metadata name.
    ///
    /// A duplicate name is rejected with a state conflict and leaves the
    /// registry unchanged.
    pub fn register(&self, handler: Arc<dyn Handler>) -> Result<(), WorkflowError> {
        let name = handler.metadata().name;
        let mut handlers = self.write_handlers();

        if handlers.contains_key(&name) {
            return Err(WorkflowError::StateConflict {
                message: format!("Handler '{}' is already registered", name),
            });
        }

        info!("Registered handler '{}'", name);
        handlers.insert(name, handler);
        Ok(())
    }

    /// Resolves a name to a handler: aliases first, then direct names.
    pub fn get(&self, name: &str) -> Result<Arc<dyn Handler>, WorkflowError> {
        let canonical = self
            .read_aliases()
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string());

        self.read_handlers()
            .get(&canonical)
            .cloned()
            .ok_or_else(|| WorkflowError::HandlerNotFound {
                name: name.to_string(),
            })
    }

    /// Maps an alias onto an existing handler name.
    ///
    /// Re-adding the same alias for the same target is a no-op; pointing
    /// an existing alias somewhere else is a state conflict.
    pub fn add_alias(
        &self,
        alias: impl Into<String>,
        target: impl Into<String>,
    ) -> Result<(), WorkflowError> {
        let alias = alias.into();
        let target = target.into();

        if !self.read_handlers().contains_key(&target) {
            return Err(WorkflowError::HandlerNotFound { name: target });
        }

        let mut aliases = self.write_aliases();
        match aliases.get(&alias) {
            Some(existing) if *existing == target => Ok(()),
            Some(existing) => Err(WorkflowError::StateConflict {
                message: format!(
                    "Alias '{}' already points to '{}', not '{}'",
                    alias, existing, target
                ),
            }),
            None => {
                debug!("Alias '{}' -> '{}'", alias, target);
                aliases.insert(alias, target);
                Ok(())
            }
        }
    }

    /// Removes a handler and every alias pointing at it.
    pub fn unregister(&self, name: &str) -> Result<(), WorkflowError> {
        let removed = self.write_handlers().remove(name);
        if removed.is_none() {
            return Err(WorkflowError::HandlerNotFound {
                name: name.to_string(),
            });
        }

        self.write_aliases().retain(|_, target| target != name);
        info!("Unregistered handler '{}'", name);
        Ok(())
    }

    /// Metadata for every registered handler, sorted by name.
    pub fn list(&self) -> Vec<HandlerMetadata> {
        let mut all: Vec<HandlerMetadata> = self
            .read_handlers()
            .values()
            .map(|h| h.metadata())
            .collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// Adds a middleware to the dispatch chain. The first added runs
    /// outermost: its `before` first, its `after` last.
    pub fn add_middleware(&self, middleware: Arc<dyn Middleware>) {
        if let Ok(mut chain) = self.middleware.write() {
            chain.push(middleware);
        }
    }

    /// Dispatches one handler invocation through the middleware chain.
    ///
    /// Input validation failure and handler errors produce a failed
    /// result rather than an `Err`; only an unresolvable name is an
    /// `Err`. Retry accounting belongs to the caller, so `retry_count`
    /// is always 0 here.
    pub async fn execute_handler(
        &self,
        name: &str,
        input: Value,
        ctx: &HandlerContext,
    ) -> Result<StepExecutionResult, WorkflowError> {
        let handler = self.get(name)?;
        let chain: Vec<Arc<dyn Middleware>> = match self.middleware.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };

        if let Err(message) = handler.validate_input(&input) {
            warn!("Handler '{}' rejected input for step '{}': {}", name, ctx.step_id, message);
            let err = WorkflowError::HandlerConfiguration {
                name: name.to_string(),
                message,
            };
            return Ok(StepExecutionResult::failed(&err, 0));
        }

        for mw in &chain {
            mw.before(name, &input, ctx).await;
        }

        let started = Instant::now();
        let result = handler.execute(input, ctx).await;
        let duration = started.elapsed();

        for mw in chain.iter().rev() {
            mw.after(name, &result, duration, ctx).await;
        }

        let duration_ms = duration.as_millis() as u64;
        Ok(match result {
            Ok(output) => StepExecutionResult::succeeded(output, duration_ms),
            Err(err) => StepExecutionResult::failed(&err, duration_ms),
        })
    }

    fn read_handlers(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<dyn Handler>>> {
        self.handlers.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write_handlers(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Arc<dyn Handler>>> {
        self.handlers.write().unwrap_or_else(|p| p.into_inner())
    }

    fn read_aliases(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, String>> {
        self.aliases.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write_aliases(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, String>> {
        self.aliases.write().unwrap_or_else(|p| p.into_inner())
    }
}
