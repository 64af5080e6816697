//! Command hooks
//!
//! Named hook sets run around every command execution, in registration
//! order:
//!
//! 1. `intercept_command`: any set returning `true` skips the command
//!    entirely (no side effects, no `after_execute`)
//! 2. `before_execute`
//! 3. the command
//! 4. `after_execute` on success, or `on_error` on failure
//!
//! Control-flow signals are not failures: a command that raises one gets
//! neither `after_execute` nor `on_error`.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::Arc;

use crate::errors::RuntimeError;
use crate::host::NodeId;
use crate::types::{AstNode, CommandNode, Event, ExecutionContext, Value};

/// Per-invocation view handed to hooks
pub struct HookContext<'a> {
    pub command_name: &'a str,
    /// The element `me` refers to
    pub element: Option<NodeId>,
    pub args: &'a [AstNode],
    pub modifiers: &'a BTreeMap<String, AstNode>,
    pub event: Option<Arc<Event>>,
    pub execution_context: &'a ExecutionContext,
}

impl<'a> HookContext<'a> {
    pub fn new(command: &'a CommandNode, ctx: &'a ExecutionContext) -> Self {
        Self {
            command_name: &command.name,
            element: ctx.me_element(),
            args: &command.args,
            modifiers: &command.modifiers,
            event: ctx.event.clone(),
            execution_context: ctx,
        }
    }
}

/// One hook set; every method is optional
pub trait CommandHooks {
    fn before_execute(&self, _ctx: &HookContext<'_>) {}

    fn after_execute(&self, _ctx: &HookContext<'_>, _result: &Value) {}

    /// Observe a failure, optionally replacing the error that propagates
    fn on_error(&self, _ctx: &HookContext<'_>, _error: &RuntimeError) -> Option<RuntimeError> {
        None
    }

    /// Return `true` to skip the command
    fn intercept_command(&self, _name: &str, _ctx: &HookContext<'_>) -> bool {
        false
    }
}

#[derive(Default)]
pub struct HookRegistry {
    sets: RefCell<Vec<(String, Rc<dyn CommandHooks>)>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a named set; re-registering a name replaces it in place
    pub fn register(&self, name: impl Into<String>, hooks: Rc<dyn CommandHooks>) {
        let name = name.into();
        let mut sets = self.sets.borrow_mut();
        match sets.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = hooks,
            None => sets.push((name, hooks)),
        }
    }

    pub fn unregister(&self, name: &str) -> bool {
        let mut sets = self.sets.borrow_mut();
        let before = sets.len();
        sets.retain(|(n, _)| n != name);
        sets.len() != before
    }

    pub fn names(&self) -> Vec<String> {
        self.sets.borrow().iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.borrow().is_empty()
    }

    // Snapshot so a hook may (un)register sets while running
    fn snapshot(&self) -> Vec<Rc<dyn CommandHooks>> {
        self.sets.borrow().iter().map(|(_, h)| Rc::clone(h)).collect()
    }

    pub fn should_intercept(&self, ctx: &HookContext<'_>) -> bool {
        self.snapshot()
            .iter()
            .any(|h| h.intercept_command(ctx.command_name, ctx))
    }

    pub fn run_before(&self, ctx: &HookContext<'_>) {
        for hooks in self.snapshot() {
            hooks.before_execute(ctx);
        }
    }

    pub fn run_after(&self, ctx: &HookContext<'_>, result: &Value) {
        for hooks in self.snapshot() {
            hooks.after_execute(ctx, result);
        }
    }

    /// Pass the error through every `on_error`; each may replace it
    pub fn run_error(&self, ctx: &HookContext<'_>, error: RuntimeError) -> RuntimeError {
        self.snapshot().iter().fold(error, |current, hooks| {
            hooks.on_error(ctx, &current).unwrap_or(current)
        })
    }
}
