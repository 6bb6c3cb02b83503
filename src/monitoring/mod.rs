//! Monitoring Module
//!
//! Observational tooling around executions.
//!
//! # Structure
//!
//! - [`monitor`]: Bounded event log and per-run metrics
//! - [`notifier`]: Subscription-based event fan-out

pub mod monitor;
pub mod notifier;

pub use monitor::{
    EventFilter, EventLevel, EventType, ExecutionEvent, ExecutionMetrics, ExecutionMonitor,
    DEFAULT_EVENT_CAPACITY,
};
pub use notifier::EventNotifier;
