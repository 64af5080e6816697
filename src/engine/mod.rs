//! Execution engine
//!
//! The engine walks AST nodes against a host document. It owns the command
//! registry, hook sets, cleanup registry, behavior table and the shared
//! globals map; every [`ExecutionContext`] it hands out points at those
//! globals.
//!
//! # Architecture
//!
//! ```text
//! Engine (Rc handle, cheap to clone)
//! ├── dispatch     node type -> program/block/sequence/command/expression
//! ├── events       target resolution, listeners, watchers, rate limiting
//! ├── behaviors    definition table, install with timeout guards
//! ├── evaluator    expression evaluation (pluggable)
//! └── check        static diagnostics over a program
//! ```
//!
//! The engine is single-threaded. Anything that defers work (debounce
//! timers, mutation delivery, automatic cleanup) spawns onto the current
//! `tokio::task::LocalSet`.

mod behaviors;
mod check;
mod dispatch;
mod evaluator;
mod events;

#[cfg(test)]
mod tests;

pub use check::{check_program, Diagnostic, Severity};
pub use evaluator::{BasicEvaluator, ExpressionEvaluator};
pub use events::{EventSource, Subscription};

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use crate::cleanup::{CleanupRegistry, CleanupStats};
use crate::config::RuntimeConfig;
use crate::errors::ConfigError;
use crate::hooks::HookRegistry;
use crate::host::{EventTarget, Host, NodeId};
use crate::registry::{Command, CommandInput, CommandMetadata, CommandRegistry, ValidationResult};
use crate::types::{AstNode, BehaviorNode, Event, ExecutionContext, Globals, Value};

use events::RecursionGuard;

/// Handle to one runtime instance
#[derive(Clone)]
pub struct Engine {
    inner: Rc<EngineInner>,
}

/// Non-owning handle, held by listeners so the document does not keep the
/// engine alive
#[derive(Clone)]
pub struct WeakEngine {
    inner: Weak<EngineInner>,
}

impl WeakEngine {
    pub fn upgrade(&self) -> Option<Engine> {
        self.inner.upgrade().map(|inner| Engine { inner })
    }
}

struct EngineInner {
    config: RuntimeConfig,
    host: Rc<dyn Host>,
    globals: Globals,
    behaviors: RefCell<HashMap<String, Rc<BehaviorNode>>>,
    registry: RefCell<CommandRegistry>,
    hooks: HookRegistry,
    cleanup: Rc<CleanupRegistry>,
    evaluator: Rc<dyn ExpressionEvaluator>,
    event_sources: RefCell<HashMap<String, Rc<dyn EventSource>>>,
    recursion: RecursionGuard,
}

/* ===================== Builder ===================== */

pub struct EngineBuilder {
    host: Rc<dyn Host>,
    config: RuntimeConfig,
    evaluator: Option<Rc<dyn ExpressionEvaluator>>,
    globals: Option<Globals>,
    builtins: bool,
}

impl EngineBuilder {
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn evaluator(mut self, evaluator: Rc<dyn ExpressionEvaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    /// Share an existing globals map instead of starting with an empty one
    pub fn globals(mut self, globals: Globals) -> Self {
        self.globals = Some(globals);
        self
    }

    /// Start with an empty command registry
    pub fn without_builtins(mut self) -> Self {
        self.builtins = false;
        self
    }

    pub fn build(self) -> Result<Engine, ConfigError> {
        self.config.validate()?;

        let mut registry = CommandRegistry::new();
        if self.builtins {
            crate::commands::register_builtins(&mut registry)?;
        }

        let cleanup = CleanupRegistry::new();
        if self.config.auto_cleanup {
            cleanup.enable_auto_cleanup(&self.host);
        }

        Ok(Engine {
            inner: Rc::new(EngineInner {
                config: self.config,
                host: self.host,
                globals: self
                    .globals
                    .unwrap_or_else(|| Rc::new(RefCell::new(HashMap::new()))),
                behaviors: RefCell::new(HashMap::new()),
                registry: RefCell::new(registry),
                hooks: HookRegistry::new(),
                cleanup,
                evaluator: self
                    .evaluator
                    .unwrap_or_else(|| Rc::new(BasicEvaluator::new())),
                event_sources: RefCell::new(HashMap::new()),
                recursion: RecursionGuard::default(),
            }),
        })
    }
}

/* ===================== Engine ===================== */

impl Engine {
    pub fn builder(host: Rc<dyn Host>) -> EngineBuilder {
        EngineBuilder {
            host,
            config: RuntimeConfig::default(),
            evaluator: None,
            globals: None,
            builtins: true,
        }
    }

    /// Engine with default configuration and the builtin commands
    pub fn new(host: Rc<dyn Host>) -> Result<Self, ConfigError> {
        Self::builder(host).build()
    }

    pub fn downgrade(&self) -> WeakEngine {
        WeakEngine {
            inner: Rc::downgrade(&self.inner),
        }
    }

    pub fn host(&self) -> &Rc<dyn Host> {
        &self.inner.host
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    pub fn globals(&self) -> &Globals {
        &self.inner.globals
    }

    /// Fresh top-level context sharing this engine's globals
    pub fn context(&self, me: Option<NodeId>) -> ExecutionContext {
        let me = me.map(Value::Element).unwrap_or_default();
        ExecutionContext::new(me, Rc::clone(&self.inner.globals))
    }

    /* ---------- Commands ---------- */

    pub fn register_command<C: Command + 'static>(&self, command: C) -> Result<(), ConfigError> {
        self.inner.registry.borrow_mut().register(command)
    }

    pub fn register_lazy_command<F>(&self, name: &str, factory: F) -> Result<(), ConfigError>
    where
        F: Fn() -> Rc<dyn Command> + 'static,
    {
        self.inner.registry.borrow_mut().register_lazy(name, factory)
    }

    pub fn has_command(&self, name: &str) -> bool {
        self.inner.registry.borrow().has(name)
    }

    pub fn command_names(&self) -> Vec<String> {
        self.inner.registry.borrow().names()
    }

    pub fn describe_command(&self, name: &str) -> Option<CommandMetadata> {
        self.inner.registry.borrow().describe(name)
    }

    pub fn validate_command(&self, name: &str, input: &CommandInput) -> ValidationResult {
        self.inner.registry.borrow().validate_command(name, input)
    }

    pub fn hooks(&self) -> &HookRegistry {
        &self.inner.hooks
    }

    /* ---------- Events ---------- */

    pub fn register_event_source(&self, name: impl Into<String>, source: Rc<dyn EventSource>) {
        self.inner
            .event_sources
            .borrow_mut()
            .insert(name.into(), source);
    }

    /// Dispatch a new event on `target` and wait for every listener
    pub async fn trigger(&self, target: EventTarget, event_type: &str, detail: Value) -> Arc<Event> {
        let event = Arc::new(Event::with_detail(event_type, detail));
        self.inner
            .host
            .dispatch_event(target, Arc::clone(&event))
            .await;
        event
    }

    /* ---------- Behaviors ---------- */

    pub fn has_behavior(&self, name: &str) -> bool {
        self.inner.behaviors.borrow().contains_key(name)
    }

    pub fn behavior_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.behaviors.borrow().keys().cloned().collect();
        names.sort();
        names
    }

    /* ---------- Cleanup ---------- */

    pub fn cleanup_registry(&self) -> &Rc<CleanupRegistry> {
        &self.inner.cleanup
    }

    /// Dispose listeners and observers owned by `element`
    pub fn cleanup(&self, element: NodeId) -> usize {
        self.inner.cleanup.cleanup_element(element)
    }

    /// Dispose everything owned by `element` and the elements below it
    pub fn uninstall(&self, element: NodeId) -> usize {
        self.inner
            .cleanup
            .cleanup_subtree(self.inner.host.as_ref(), element)
    }

    pub fn cleanup_all(&self) -> usize {
        self.inner.cleanup.cleanup_all()
    }

    pub fn cleanup_stats(&self) -> CleanupStats {
        self.inner.cleanup.stats()
    }

    /* ---------- Static checks ---------- */

    pub fn check(&self, program: &AstNode) -> Vec<Diagnostic> {
        let registry = self.inner.registry.borrow();
        let sources: Vec<String> = self.inner.event_sources.borrow().keys().cloned().collect();
        check_program(program, &registry, &sources)
    }
}
