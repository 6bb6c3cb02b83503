//! Event Notification
//!
//! Per-run and global subscriptions over monitor events. Dispatch is
//! synchronous and best-effort: a panicking subscriber is caught and
//! logged, and never disturbs the run that produced the event.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Mutex;

use log::error;
use uuid::Uuid;

use super::monitor::{EventLevel, EventType, ExecutionEvent};

type Callback = Box<dyn Fn(&ExecutionEvent) + Send + Sync>;

struct Subscription {
    /// None subscribes to every run.
    execution_id: Option<String>,
    event_type: Option<EventType>,
    min_level: Option<EventLevel>,
    callback: Callback,
}

impl Subscription {
    fn matches(&self, event: &ExecutionEvent) -> bool {
        self.execution_id
            .as_ref()
            .map_or(true, |id| event.execution_id == *id)
            && self.event_type.map_or(true, |t| event.event_type == t)
            && self.min_level.map_or(true, |l| event.level >= l)
    }
}

/// Fan-out of execution events to registered subscribers.
#[derive(Default)]
pub struct EventNotifier {
    subscriptions: Mutex<HashMap<String, Subscription>>,
}

impl EventNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to events, optionally scoped to one run and filtered by
    /// type and minimum level. Returns a token for [`unsubscribe`].
    ///
    /// [`unsubscribe`]: EventNotifier::unsubscribe
    pub fn subscribe(
        &self,
        execution_id: Option<String>,
        event_type: Option<EventType>,
        min_level: Option<EventLevel>,
        callback: impl Fn(&ExecutionEvent) + Send + Sync + 'static,
    ) -> String {
        let token = Uuid::new_v4().to_string();
        self.lock().insert(
            token.clone(),
            Subscription {
                execution_id,
                event_type,
                min_level,
                callback: Box::new(callback),
            },
        );
        token
    }

    /// Removes a subscription. Unknown tokens are ignored.
    pub fn unsubscribe(&self, token: &str) {
        self.lock().remove(token);
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    /// Delivers an event to every matching subscriber.
    pub fn notify(&self, event: &ExecutionEvent) {
        let guard = self.lock();
        for (token, subscription) in guard.iter() {
            if !subscription.matches(event) {
                continue;
            }
            let outcome = catch_unwind(AssertUnwindSafe(|| (subscription.callback)(event)));
            if outcome.is_err() {
                error!(
                    "Subscriber {} panicked handling event {:?} for execution {}",
                    token, event.event_type, event.execution_id
                );
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Subscription>> {
        self.subscriptions.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn event(execution_id: &str, event_type: EventType) -> ExecutionEvent {
        ExecutionEvent {
            id: Uuid::new_v4().to_string(),
            execution_id: execution_id.to_string(),
            event_type,
            level: event_type.level(),
            step_id: None,
            message: "test".to_string(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_global_subscription_sees_all_runs() {
        let notifier = EventNotifier::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();

        notifier.subscribe(None, None, None, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        notifier.notify(&event("run-1", EventType::StepCompleted));
        notifier.notify(&event("run-2", EventType::StepFailed));

        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_scoped_subscription_filters() {
        let notifier = EventNotifier::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();

        notifier.subscribe(
            Some("run-1".to_string()),
            None,
            Some(EventLevel::Error),
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        );

        notifier.notify(&event("run-1", EventType::StepCompleted)); // wrong level
        notifier.notify(&event("run-2", EventType::StepFailed)); // wrong run
        notifier.notify(&event("run-1", EventType::StepFailed)); // matches

        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsubscribe() {
        let notifier = EventNotifier::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();

        let token = notifier.subscribe(None, None, None, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(notifier.subscriber_count(), 1);

        notifier.unsubscribe(&token);
        notifier.notify(&event("run-1", EventType::StepCompleted));

        assert_eq!(seen.load(Ordering::SeqCst), 0);
        assert_eq!(notifier.subscriber_count(), 0);
    }

    #[test]
    fn test_panicking_subscriber_does_not_propagate() {
        let notifier = EventNotifier::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();

        notifier.subscribe(None, None, None, |_| panic!("subscriber bug"));
        notifier.subscribe(None, None, None, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        // Must not panic, and the healthy subscriber still fires
        notifier.notify(&event("run-1", EventType::StepCompleted));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
