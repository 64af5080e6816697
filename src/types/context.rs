//! Execution context
//!
//! The environment threaded through every evaluation: the `me`/`you`/`it`/
//! `result` registers, per-activation locals, runtime-wide globals and
//! free-form metadata.
//!
//! `locals` is owned by one activation. Entering an event handler or
//! installing a behavior produces a new context with its own locals map, so
//! two activations running at the same time never see each other's writes.
//! `globals` is a shared handle: every context created by one engine points
//! at the same map.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use super::event::Event;
use super::values::Value;
use crate::host::NodeId;

/// Runtime-wide variable map shared by all contexts of one engine
pub type Globals = Rc<RefCell<HashMap<String, Value>>>;

#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// The element the current code belongs to
    pub me: Value,
    /// The element matched by the last `for`/`tell`-style construct
    pub you: Value,
    /// The implicit result of the previous command
    pub it: Value,
    /// Alias of `it`, kept in sync by the dispatcher
    pub result: Value,
    pub locals: HashMap<String, Value>,
    pub globals: Globals,
    /// The event that started this activation, if any
    pub event: Option<Arc<Event>>,
    pub meta: HashMap<String, Value>,
}

impl ExecutionContext {
    /// Create a top-level context
    pub fn new(me: Value, globals: Globals) -> Self {
        Self {
            me,
            you: Value::Undefined,
            it: Value::Undefined,
            result: Value::Undefined,
            locals: HashMap::new(),
            globals,
            event: None,
            meta: HashMap::new(),
        }
    }

    /// Create a top-level context owned by an element
    pub fn for_element(element: NodeId, globals: Globals) -> Self {
        Self::new(Value::Element(element), globals)
    }

    /// Copy this context for a new activation
    ///
    /// The registers and metadata are copied, the locals map is copied into a
    /// fresh map, and the globals handle is shared.
    pub fn branch(&self) -> Self {
        Self {
            me: self.me.clone(),
            you: self.you.clone(),
            it: Value::Undefined,
            result: Value::Undefined,
            locals: self.locals.clone(),
            globals: Rc::clone(&self.globals),
            event: self.event.clone(),
            meta: self.meta.clone(),
        }
    }

    /// The element `me` refers to, if it is one
    pub fn me_element(&self) -> Option<NodeId> {
        self.me.as_element()
    }

    /// Set `it` and `result` together
    pub fn set_it(&mut self, value: Value) {
        self.it = value.clone();
        self.result = value;
    }

    pub fn set_local(&mut self, name: impl Into<String>, value: Value) {
        self.locals.insert(name.into(), value);
    }

    pub fn set_global(&self, name: impl Into<String>, value: Value) {
        self.globals.borrow_mut().insert(name.into(), value);
    }

    pub fn global(&self, name: &str) -> Option<Value> {
        self.globals.borrow().get(name).cloned()
    }

    /// Look a variable up: locals first, then globals
    pub fn lookup(&self, name: &str) -> Option<Value> {
        self.locals
            .get(name)
            .cloned()
            .or_else(|| self.global(name))
    }
}
