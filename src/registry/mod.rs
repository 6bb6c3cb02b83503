//! Handler Registry Module
//!
//! Named handler dispatch for workflow steps.
//!
//! # Structure
//!
//! - [`handler`]: Handler trait, dispatch context and result types
//! - [`registry`]: The registry itself (names, aliases, middleware chain)
//! - [`middleware`]: Logging and metrics middleware
//! - [`builtin`]: Fixture handlers for the CLI and tests

pub mod builtin;
pub mod handler;
pub mod middleware;
pub mod registry;

pub use builtin::{DelayHandler, EchoHandler, FailHandler, NoopHandler};
pub use handler::{Handler, HandlerContext, HandlerMetadata, StepExecutionResult};
pub use middleware::{HandlerStats, LoggingMiddleware, MetricsMiddleware, Middleware};
pub use registry::HandlerRegistry;

use std::sync::Arc;

/// Builds a registry with the built-in handlers and standard middleware.
pub fn default_registry() -> HandlerRegistry {
    let registry = HandlerRegistry::new();
    registry.add_middleware(Arc::new(LoggingMiddleware));
    registry.add_middleware(Arc::new(MetricsMiddleware::new()));

    // Built-ins registered at construction cannot collide
    let _ = registry.register(Arc::new(NoopHandler));
    let _ = registry.register(Arc::new(EchoHandler));
    let _ = registry.register(Arc::new(DelayHandler));
    let _ = registry.register(Arc::new(FailHandler));

    registry
}
