//! Execution Monitoring
//!
//! Observational event log and per-run metrics. Everything here is
//! append-only bookkeeping; nothing in this module drives control flow.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use log::debug;
use sysinfo::{get_current_pid, ProcessRefreshKind, System};
use uuid::Uuid;

use super::notifier::EventNotifier;
use crate::workflow::model::ExecutionStatus;

/// Default bound on the in-memory event log.
pub const DEFAULT_EVENT_CAPACITY: usize = 10_000;

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    ExecutionStarted,
    ExecutionCompleted,
    ExecutionFailed,
    ExecutionPaused,
    ExecutionResumed,
    ExecutionCancelled,
    StepStarted,
    StepCompleted,
    StepFailed,
    StepSkipped,
    StepRetried,
    StepTimedOut,
}

/// Log level an event is reported at, derived from its type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EventLevel {
    Info,
    Warn,
    Error,
}

impl EventType {
    pub fn level(&self) -> EventLevel {
        match self {
            Self::ExecutionFailed | Self::StepFailed => EventLevel::Error,
            Self::StepRetried | Self::StepTimedOut | Self::ExecutionCancelled => EventLevel::Warn,
            _ => EventLevel::Info,
        }
    }
}

/// A single observed event in some run's lifetime.
#[derive(Debug, Clone)]
pub struct ExecutionEvent {
    pub id: String,
    pub execution_id: String,
    pub event_type: EventType,
    pub level: EventLevel,
    pub step_id: Option<String>,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Filter for querying the event log. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub execution_id: Option<String>,
    pub event_type: Option<EventType>,
    pub min_level: Option<EventLevel>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

/// Aggregated per-run counters.
#[derive(Debug, Clone)]
pub struct ExecutionMetrics {
    pub execution_id: String,
    pub status: ExecutionStatus,
    pub steps_started: u32,
    pub steps_completed: u32,
    pub steps_failed: u32,
    pub steps_skipped: u32,
    pub retries: u32,
    /// Process memory at the time the run started, in megabytes.
    pub memory_at_start_mb: u64,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl ExecutionMetrics {
    /// Wall-clock duration; still ticking for live runs.
    pub fn duration_ms(&self) -> i64 {
        let end = self.ended_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_milliseconds()
    }
}

struct MonitorState {
    events: VecDeque<ExecutionEvent>,
    metrics: HashMap<String, ExecutionMetrics>,
    system: System,
}

/// Bounded event log plus per-run metrics.
///
/// The log keeps the most recent `capacity` events; the oldest are
/// evicted first. Eviction never touches metrics.
pub struct ExecutionMonitor {
    state: Mutex<MonitorState>,
    capacity: usize,
    notifier: Option<Arc<EventNotifier>>,
}

impl ExecutionMonitor {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: Mutex::new(MonitorState {
                events: VecDeque::new(),
                metrics: HashMap::new(),
                system: System::new(),
            }),
            capacity: capacity.max(1),
            notifier: None,
        }
    }

    /// Fans every recorded event out to the given notifier's subscribers.
    pub fn with_notifier(mut self, notifier: Arc<EventNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Records the start of a run, snapshotting process memory.
    pub fn execution_started(&self, execution_id: &str) {
        let mut state = self.lock();

        let memory_mb = current_memory_mb(&mut state.system);
        state.metrics.insert(
            execution_id.to_string(),
            ExecutionMetrics {
                execution_id: execution_id.to_string(),
                status: ExecutionStatus::Running,
                steps_started: 0,
                steps_completed: 0,
                steps_failed: 0,
                steps_skipped: 0,
                retries: 0,
                memory_at_start_mb: memory_mb,
                started_at: Utc::now(),
                ended_at: None,
            },
        );

        let event = Self::push_event(
            &mut state,
            self.capacity,
            execution_id,
            EventType::ExecutionStarted,
            None,
            "Execution started".to_string(),
        );
        drop(state);
        self.dispatch(event);
    }

    /// Records a run reaching a terminal or paused state.
    pub fn execution_transition(&self, execution_id: &str, status: ExecutionStatus, message: &str) {
        let mut state = self.lock();

        if let Some(metrics) = state.metrics.get_mut(execution_id) {
            metrics.status = status;
            if status.is_terminal() {
                metrics.ended_at = Some(Utc::now());
            }
        }

        let event_type = match status {
            ExecutionStatus::Completed => EventType::ExecutionCompleted,
            ExecutionStatus::Failed | ExecutionStatus::TimedOut => EventType::ExecutionFailed,
            ExecutionStatus::Paused => EventType::ExecutionPaused,
            ExecutionStatus::Running => EventType::ExecutionResumed,
            ExecutionStatus::Cancelled => EventType::ExecutionCancelled,
            ExecutionStatus::Pending => return,
        };

        let event = Self::push_event(
            &mut state,
            self.capacity,
            execution_id,
            event_type,
            None,
            message.to_string(),
        );
        drop(state);
        self.dispatch(event);
    }

    /// Records a step-level event and bumps the matching counter.
    pub fn step_event(
        &self,
        execution_id: &str,
        step_id: &str,
        event_type: EventType,
        message: impl Into<String>,
    ) {
        let mut state = self.lock();

        if let Some(metrics) = state.metrics.get_mut(execution_id) {
            match event_type {
                EventType::StepStarted => metrics.steps_started += 1,
                EventType::StepCompleted => metrics.steps_completed += 1,
                EventType::StepFailed | EventType::StepTimedOut => metrics.steps_failed += 1,
                EventType::StepSkipped => metrics.steps_skipped += 1,
                EventType::StepRetried => metrics.retries += 1,
                _ => {}
            }
        }

        let event = Self::push_event(
            &mut state,
            self.capacity,
            execution_id,
            event_type,
            Some(step_id.to_string()),
            message.into(),
        );
        drop(state);
        self.dispatch(event);
    }

    /// Queries the event log, newest last.
    pub fn get_events(&self, filter: &EventFilter) -> Vec<ExecutionEvent> {
        let state = self.lock();

        let matched = state.events.iter().filter(|e| {
            filter
                .execution_id
                .as_ref()
                .map_or(true, |id| e.execution_id == *id)
                && filter.event_type.map_or(true, |t| e.event_type == t)
                && filter.min_level.map_or(true, |l| e.level >= l)
                && filter.since.map_or(true, |s| e.timestamp >= s)
                && filter.until.map_or(true, |u| e.timestamp <= u)
        });

        match filter.limit {
            // Limit keeps the most recent matches
            Some(limit) => {
                let all: Vec<ExecutionEvent> = matched.cloned().collect();
                let skip = all.len().saturating_sub(limit);
                all.into_iter().skip(skip).collect()
            }
            None => matched.cloned().collect(),
        }
    }

    /// Metrics for one run, if it has been observed.
    pub fn get_metrics(&self, execution_id: &str) -> Option<ExecutionMetrics> {
        self.lock().metrics.get(execution_id).cloned()
    }

    /// Metrics for every observed run.
    pub fn all_metrics(&self) -> Vec<ExecutionMetrics> {
        self.lock().metrics.values().cloned().collect()
    }

    pub fn event_count(&self) -> usize {
        self.lock().events.len()
    }

    fn push_event(
        state: &mut MonitorState,
        capacity: usize,
        execution_id: &str,
        event_type: EventType,
        step_id: Option<String>,
        message: String,
    ) -> ExecutionEvent {
        while state.events.len() >= capacity {
            state.events.pop_front();
        }

        debug!("[{}] {:?}: {}", execution_id, event_type, message);

        let event = ExecutionEvent {
            id: Uuid::new_v4().to_string(),
            execution_id: execution_id.to_string(),
            event_type,
            level: event_type.level(),
            step_id,
            message,
            timestamp: Utc::now(),
        };
        state.events.push_back(event.clone());
        event
    }

    /// Notifies subscribers outside the state lock so a subscriber may
    /// query the monitor without deadlocking.
    fn dispatch(&self, event: ExecutionEvent) {
        if let Some(notifier) = &self.notifier {
            notifier.notify(&event);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MonitorState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl Default for ExecutionMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// Current process memory in megabytes, 0 when the process cannot be
/// inspected.
fn current_memory_mb(system: &mut System) -> u64 {
    let Ok(pid) = get_current_pid() else {
        return 0;
    };
    system.refresh_processes_specifics(ProcessRefreshKind::new().with_memory());
    system
        .process(pid)
        .map(|p| p.memory() / 1024 / 1024)
        .unwrap_or(0)
}
