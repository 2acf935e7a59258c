//! Typed event bus for monitor lifecycle events
//!
//! Handlers subscribe per [`EventKind`] and fire in registration order.
//! A panicking handler is caught and logged; it never takes the monitor
//! loop down with it.

use shared::{EventKind, MonitorEvent};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, RwLock};
use tracing::{error, trace};

type Handler = Arc<dyn Fn(&MonitorEvent) + Send + Sync>;

/// Registry of lifecycle observers
#[derive(Default)]
pub struct EventBus {
    handlers: RwLock<HashMap<EventKind, Vec<Handler>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a handler to one event kind. Multiple handlers per kind
    /// are allowed and all are invoked, in registration order.
    pub fn register<F>(&self, kind: EventKind, handler: F)
    where
        F: Fn(&MonitorEvent) + Send + Sync + 'static,
    {
        let mut handlers = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        handlers.entry(kind).or_default().push(Arc::new(handler));
    }

    /// Broadcast an event to every handler registered for its kind
    pub fn emit(&self, event: &MonitorEvent) {
        let subscribed: Vec<Handler> = {
            let handlers = self.handlers.read().unwrap_or_else(|e| e.into_inner());
            handlers.get(&event.kind()).cloned().unwrap_or_default()
        };

        trace!(
            event = %event.kind(),
            app = event.app_name(),
            observers = subscribed.len(),
            "emitting lifecycle event"
        );

        for handler in subscribed {
            if catch_unwind(AssertUnwindSafe(|| handler(event))).is_err() {
                error!(
                    event = %event.kind(),
                    app = event.app_name(),
                    "observer panicked while handling event; continuing"
                );
            }
        }
    }

    /// Number of handlers registered for `kind`
    pub fn observer_count(&self, kind: EventKind) -> usize {
        let handlers = self.handlers.read().unwrap_or_else(|e| e.into_inner());
        handlers.get(&kind).map(|v| v.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::FailureReason;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn restarting(name: &str, attempt: u32) -> MonitorEvent {
        MonitorEvent::AppRestarting {
            name: name.to_string(),
            reason: FailureReason::Timeout,
            attempt,
        }
    }

    #[test]
    fn all_handlers_for_a_kind_fire() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let hits = Arc::clone(&hits);
            bus.register(EventKind::AppRestarting, move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            });
        }

        bus.emit(&restarting("alpha", 1));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert_eq!(bus.observer_count(EventKind::AppRestarting), 3);
    }

    #[test]
    fn handlers_fire_in_registration_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..4 {
            let order = Arc::clone(&order);
            bus.register(EventKind::AppFailed, move |_| {
                order.lock().unwrap().push(i);
            });
        }

        bus.emit(&MonitorEvent::AppFailed {
            name: "alpha".to_string(),
            reason: FailureReason::ProcessNotFound,
            restart_count: 3,
        });
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn panicking_handler_does_not_stop_later_handlers() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));

        bus.register(EventKind::AppRestarting, |_| {
            panic!("observer bug");
        });
        let hits_clone = Arc::clone(&hits);
        bus.register(EventKind::AppRestarting, move |_| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit(&restarting("alpha", 1));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn handlers_only_see_their_own_kind() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let hits_clone = Arc::clone(&hits);
        bus.register(EventKind::HighCpu, move |_| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit(&restarting("alpha", 1));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }
}
