//! Host event objects
//!
//! An `Event` is created by whoever dispatches it (the host document, a
//! `trigger` command, a mutation watcher) and shared by `Arc` with every
//! listener it reaches. Its identity (`EventId`) is what the recursion guard
//! keys on, so re-dispatching the same object is detectable without touching
//! the object itself.
//!
//! Events are `Send + Sync`: a `Value::Event` can sit in the return value of
//! an `ExecutionSignal`, which travels inside `anyhow::Error`.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use super::values::Value;
use crate::host::{EventTarget, NodeId};

static NEXT_EVENT_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one event object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId(pub u64);

#[derive(Debug)]
pub struct Event {
    id: EventId,
    event_type: String,
    detail: Value,
    bubbles: bool,
    target: Mutex<Option<EventTarget>>,
    current_target: Mutex<Option<EventTarget>>,
    default_prevented: AtomicBool,
    propagation_stopped: AtomicBool,
}

impl Event {
    /// Create a bubbling event with no detail
    pub fn new(event_type: impl Into<String>) -> Self {
        Self::with_detail(event_type, Value::Undefined)
    }

    /// Create a bubbling event carrying a detail payload
    pub fn with_detail(event_type: impl Into<String>, detail: Value) -> Self {
        Self {
            id: EventId(NEXT_EVENT_ID.fetch_add(1, Ordering::Relaxed)),
            event_type: event_type.into(),
            detail,
            bubbles: true,
            target: Mutex::new(None),
            current_target: Mutex::new(None),
            default_prevented: AtomicBool::new(false),
            propagation_stopped: AtomicBool::new(false),
        }
    }

    /// Mark the event as non-bubbling
    pub fn non_bubbling(mut self) -> Self {
        self.bubbles = false;
        self
    }

    pub fn id(&self) -> EventId {
        self.id
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn detail(&self) -> &Value {
        &self.detail
    }

    pub fn bubbles(&self) -> bool {
        self.bubbles
    }

    pub fn target(&self) -> Option<EventTarget> {
        self.target.lock().map(|t| *t).unwrap_or(None)
    }

    /// The target node, if the event was dispatched on an element
    pub fn target_node(&self) -> Option<NodeId> {
        match self.target() {
            Some(EventTarget::Node(id)) => Some(id),
            _ => None,
        }
    }

    pub fn set_target(&self, target: EventTarget) {
        if let Ok(mut slot) = self.target.lock() {
            *slot = Some(target);
        }
    }

    pub fn current_target(&self) -> Option<EventTarget> {
        self.current_target.lock().map(|t| *t).unwrap_or(None)
    }

    pub fn set_current_target(&self, target: Option<EventTarget>) {
        if let Ok(mut slot) = self.current_target.lock() {
            *slot = target;
        }
    }

    pub fn prevent_default(&self) {
        self.default_prevented.store(true, Ordering::Relaxed);
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented.load(Ordering::Relaxed)
    }

    pub fn stop_propagation(&self) {
        self.propagation_stopped.store(true, Ordering::Relaxed);
    }

    pub fn propagation_stopped(&self) -> bool {
        self.propagation_stopped.load(Ordering::Relaxed)
    }

    /// Reset per-dispatch state so the same object can be dispatched again
    pub fn reset_propagation(&self) {
        self.propagation_stopped.store(false, Ordering::Relaxed);
    }

    /// Read a named property the way handler parameters see it
    ///
    /// Detail object keys take precedence over the event's own fields.
    pub fn property(&self, name: &str) -> Value {
        if let Some(value) = self.detail.get(name) {
            return value.clone();
        }
        match name {
            "type" => Value::String(self.event_type.clone()),
            "detail" => self.detail.clone(),
            "target" => self
                .target_node()
                .map(Value::Element)
                .unwrap_or(Value::Null),
            "defaultPrevented" => Value::Bool(self.default_prevented()),
            _ => Value::Undefined,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_each_event_gets_distinct_identity() {
        let a = Event::new("click");
        let b = Event::new("click");
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_event_values_travel_inside_signals() {
        use crate::types::signal::{self, ExecutionSignal};

        let event = Arc::new(Event::new("submit"));
        let err = signal::into_error(ExecutionSignal::Return {
            return_value: Some(Value::Event(Arc::clone(&event))),
        });
        let back = signal::from_error(err).unwrap();
        assert_eq!(back.return_value(), Some(&Value::Event(event)));
    }

    #[test]
    fn test_property_prefers_detail_keys() {
        let event = Event::with_detail(
            "custom",
            Value::object([("type", Value::from("shadowed")), ("x", Value::from(3i64))]),
        );
        assert_eq!(event.property("type"), Value::from("shadowed"));
        assert_eq!(event.property("x"), Value::Number(3.0));
        assert_eq!(event.property("missing"), Value::Undefined);
    }
}
