//! Event binding
//!
//! An event handler node moves through `unbound -> target-resolved ->
//! bound`, and later `cleaned-up` when its owner is disposed. Binding never
//! blocks on the handler body: it registers listeners (or observers, or a
//! custom source subscription) and returns.
//!
//! Each firing of a bound handler runs through, in order:
//!
//! 1. the recursion guard, keyed by the event object
//! 2. the delegation selector, if any
//! 3. `prevent` / `stop`
//! 4. debounce or throttle
//! 5. a fresh activation with its own locals

use async_trait::async_trait;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, debug_span, error, warn, Instrument};
use uuid::Uuid;

use super::{Engine, WeakEngine};
use crate::errors::RuntimeError;
use crate::host::{
    EventTarget, Host, Listener, ListenerId, ListenerOptions, MutationCallback, MutationRecord,
    NodeId, ObserverOptions,
};
use crate::types::{
    AstNode, Event, EventHandlerNode, EventId, ExecutionContext, LocalBoxFuture, RateLimit, Value,
    WatchSpec,
};

/* ===================== Recursion Guard ===================== */

/// Side table of nesting depth per event object
///
/// Entries are removed when the outermost activation for an event returns,
/// so the table only ever holds events that are being handled.
#[derive(Default)]
pub(super) struct RecursionGuard {
    depths: Rc<RefCell<HashMap<EventId, usize>>>,
}

impl RecursionGuard {
    /// Enter one level for `id`, or `None` if `max` levels are already active
    pub(super) fn enter(&self, id: EventId, max: usize) -> Option<DepthToken> {
        let mut depths = self.depths.borrow_mut();
        let depth = depths.entry(id).or_insert(0);
        if *depth >= max {
            return None;
        }
        *depth += 1;
        Some(DepthToken {
            depths: Rc::clone(&self.depths),
            id,
        })
    }

    #[cfg(test)]
    pub(super) fn depth(&self, id: EventId) -> usize {
        self.depths.borrow().get(&id).copied().unwrap_or(0)
    }
}

pub(super) struct DepthToken {
    depths: Rc<RefCell<HashMap<EventId, usize>>>,
    id: EventId,
}

impl Drop for DepthToken {
    fn drop(&mut self) {
        let mut depths = self.depths.borrow_mut();
        if let Some(depth) = depths.get_mut(&self.id) {
            *depth -= 1;
            if *depth == 0 {
                depths.remove(&self.id);
            }
        }
    }
}

/* ===================== Custom Event Sources ===================== */

/// Handle returned by an [`EventSource`]; dropping it does not unsubscribe
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn new(unsubscribe: impl FnOnce() + 'static) -> Self {
        Self {
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }

    pub fn noop() -> Self {
        Self { unsubscribe: None }
    }

    pub fn unsubscribe(mut self) {
        if let Some(f) = self.unsubscribe.take() {
            f();
        }
    }
}

/// Named producer of events that are not host document events
///
/// Handlers select a source by name (`on tick from clock`). A source that is
/// not registered, or whose `subscribe` fails, leaves the handler unbound and
/// logs a warning.
#[async_trait(?Send)]
pub trait EventSource {
    async fn subscribe(
        &self,
        event: &str,
        element: Option<NodeId>,
        listener: Listener,
    ) -> anyhow::Result<Subscription>;
}

/* ===================== Bindings ===================== */

enum RateState {
    Immediate,
    Debounce {
        delay: Duration,
        pending: RefCell<Option<CancellationToken>>,
    },
    Throttle {
        window: Duration,
        last: Cell<Option<Instant>>,
    },
}

impl RateState {
    fn new(limit: Option<RateLimit>) -> Self {
        match limit {
            None => RateState::Immediate,
            Some(RateLimit::Debounce(ms)) => RateState::Debounce {
                delay: Duration::from_millis(ms),
                pending: RefCell::new(None),
            },
            Some(RateLimit::Throttle(ms)) => RateState::Throttle {
                window: Duration::from_millis(ms),
                last: Cell::new(None),
            },
        }
    }
}

/// One bound handler; shared by every listener registered for it
struct Binding {
    engine: WeakEngine,
    handler: EventHandlerNode,
    body: AstNode,
    /// Context captured at bind time; every activation branches from it
    base: ExecutionContext,
    rate: RateState,
}

impl Binding {
    fn new(engine: &Engine, handler: &EventHandlerNode, ctx: &ExecutionContext) -> Rc<Self> {
        Rc::new(Self {
            engine: engine.downgrade(),
            handler: handler.clone(),
            body: AstNode::sequence(handler.commands.clone()),
            base: ctx.branch(),
            rate: RateState::new(handler.modifiers.rate_limit()),
        })
    }

    fn listener(self: &Rc<Self>) -> Listener {
        let binding = Rc::clone(self);
        Rc::new(move |event: Arc<Event>| -> LocalBoxFuture<'static, ()> {
            Box::pin(Rc::clone(&binding).fire(event))
        })
    }

    /// Listener for a `once` handler: the host drops it after the first
    /// call, so its cleanup entry is dropped too
    fn once_listener(
        self: &Rc<Self>,
        owner: Option<NodeId>,
        slot: Rc<Cell<Option<ListenerId>>>,
    ) -> Listener {
        let binding = Rc::clone(self);
        Rc::new(move |event: Arc<Event>| -> LocalBoxFuture<'static, ()> {
            if let (Some(id), Some(engine)) = (slot.take(), binding.engine.upgrade()) {
                engine.inner.cleanup.forget_listener(owner, id);
            }
            Box::pin(Rc::clone(&binding).fire(event))
        })
    }

    /// Cancel a trailing-edge activation that has not run yet
    fn cancel_pending(&self) {
        if let RateState::Debounce { pending, .. } = &self.rate {
            if let Some(token) = pending.borrow_mut().take() {
                debug!(event = %self.handler.event, "Cancelled pending debounce");
                token.cancel();
            }
        }
    }

    /// Extra disposer for the cleanup entries of this binding
    fn on_dispose(self: &Rc<Self>) -> impl FnOnce() + 'static {
        let binding: Weak<Self> = Rc::downgrade(self);
        move || {
            if let Some(binding) = binding.upgrade() {
                binding.cancel_pending();
            }
        }
    }

    async fn fire(self: Rc<Self>, event: Arc<Event>) {
        let Some(engine) = self.engine.upgrade() else {
            return;
        };

        let max = engine.config().max_event_recursion_depth;
        let Some(_depth) = engine.inner.recursion.enter(event.id(), max) else {
            warn!(
                event = %event.event_type(),
                max,
                "Event recursion limit reached, dropping invocation"
            );
            return;
        };

        if !self.delegation_matches(engine.host().as_ref(), &event) {
            return;
        }
        if self.handler.modifiers.prevent {
            event.prevent_default();
        }
        if self.handler.modifiers.stop {
            event.stop_propagation();
        }

        match &self.rate {
            RateState::Immediate => self.activate(&engine, event, Vec::new()).await,
            RateState::Debounce { delay, pending } => {
                let token = CancellationToken::new();
                if let Some(previous) = pending.borrow_mut().replace(token.clone()) {
                    previous.cancel();
                }
                let delay = *delay;
                let binding = Rc::clone(&self);
                tokio::task::spawn_local(async move {
                    tokio::select! {
                        _ = token.cancelled() => {}
                        _ = tokio::time::sleep(delay) => {
                            if let Some(engine) = binding.engine.upgrade() {
                                binding.activate(&engine, event, Vec::new()).await;
                            }
                        }
                    }
                });
            }
            RateState::Throttle { window, last } => {
                let now = Instant::now();
                if let Some(previous) = last.get() {
                    if now.duration_since(previous) < *window {
                        debug!(event = %event.event_type(), "Throttled");
                        return;
                    }
                }
                last.set(Some(now));
                self.activate(&engine, event, Vec::new()).await;
            }
        }
    }

    /// Does the event target, or one of its ancestors, match the delegation
    /// selector? An unparseable selector never matches.
    fn delegation_matches(&self, host: &dyn Host, event: &Event) -> bool {
        let Some(selector) = &self.handler.selector else {
            return true;
        };
        let mut current = event.target_node();
        while let Some(node) = current {
            match host.matches(node, selector) {
                Ok(true) => return true,
                Ok(false) => current = host.parent(node),
                Err(err) => {
                    warn!(error = %err, "Invalid delegation selector, skipping handler");
                    return false;
                }
            }
        }
        false
    }

    async fn activate(&self, engine: &Engine, event: Arc<Event>, locals: Vec<(String, Value)>) {
        let mut ctx = self.base.branch();
        for name in &self.handler.params {
            ctx.set_local(name.clone(), event.property(name));
        }
        for (name, value) in locals {
            ctx.set_local(name, value);
        }
        ctx.event = Some(Arc::clone(&event));

        let activation = Uuid::new_v4().to_string();
        ctx.meta
            .insert("activation".into(), Value::String(activation.clone()));

        let span = debug_span!("activation", event = %event.event_type(), id = %activation);
        match engine
            .execute_signal(&self.body, &mut ctx)
            .instrument(span)
            .await
        {
            Ok(Ok(_)) => {}
            Ok(Err(signal)) => debug!(signal = %signal, "Handler stopped"),
            Err(err) => error!(
                event = %event.event_type(),
                error = %err,
                "Event handler failed"
            ),
        }
    }
}

/* ===================== Engine Surface ===================== */

impl Engine {
    /// All elements matching `selector`; an invalid selector yields none
    pub fn query(&self, selector: &str) -> Vec<NodeId> {
        match self.inner.host.query_selector_all(selector) {
            Ok(nodes) => nodes,
            Err(err) => {
                warn!(error = %err, "Selector query failed");
                Vec::new()
            }
        }
    }

    /// Bind a handler; returns how many listeners or observers were attached
    pub(crate) async fn bind_handler(
        &self,
        handler: &EventHandlerNode,
        ctx: &ExecutionContext,
    ) -> Result<usize, RuntimeError> {
        if let Some(selector) = &handler.selector {
            if let Err(err) = self.inner.host.query_selector_all(selector) {
                warn!(error = %err, "Delegation selector is invalid, handler will never run");
            }
        }

        let binding = Binding::new(self, handler, ctx);
        let bound = match (&handler.source, &handler.watch) {
            (Some(source), _) => self.bind_source(&binding, source, ctx).await,
            (None, Some(WatchSpec::Attribute { name })) => {
                self.bind_attribute_watch(&binding, name, ctx)
            }
            (None, Some(WatchSpec::Content { target })) => {
                self.bind_content_watch(&binding, target, ctx)
            }
            (None, None) => self.bind_listeners(&binding, ctx),
        };

        debug!(event = %handler.event, bound, "Handler bound");
        Ok(bound)
    }

    /// Resolve a handler's target in order: `window`/`document`, `me`, a
    /// local variable, a selector query
    fn resolve_targets(&self, target: Option<&str>, ctx: &ExecutionContext) -> Vec<EventTarget> {
        match target {
            Some("window") => vec![EventTarget::Window],
            Some("document") => vec![EventTarget::Document],
            None | Some("me") | Some("myself") => {
                ctx.me_element().map(EventTarget::Node).into_iter().collect()
            }
            Some(name) => {
                let nodes = match ctx.locals.get(name) {
                    Some(Value::String(selector)) => self.query(selector),
                    Some(value) => value.elements(),
                    None => self.query(name),
                };
                nodes.into_iter().map(EventTarget::Node).collect()
            }
        }
    }

    fn bind_listeners(&self, binding: &Rc<Binding>, ctx: &ExecutionContext) -> usize {
        let handler = &binding.handler;
        let targets = self.resolve_targets(handler.target.as_deref(), ctx);
        if targets.is_empty() {
            warn!(
                event = %handler.event,
                target = handler.target.as_deref().unwrap_or("me"),
                "No targets resolved, handler not bound"
            );
            return 0;
        }

        let host = &self.inner.host;
        let options = ListenerOptions {
            once: handler.modifiers.once,
        };
        let mut count = 0;
        for target in targets {
            let owner = ctx.me_element().or(target.node());
            for event in handler.event_names() {
                let id = if options.once {
                    let slot = Rc::new(Cell::new(None));
                    let listener = binding.once_listener(owner, Rc::clone(&slot));
                    let id = host.add_event_listener(target, event, listener, options);
                    slot.set(Some(id));
                    id
                } else {
                    host.add_event_listener(target, event, binding.listener(), options)
                };
                self.inner.cleanup.register_listener_with(
                    owner,
                    host,
                    id,
                    format!("{} listener on {:?}", event, target),
                    binding.on_dispose(),
                );
                count += 1;
            }
        }
        count
    }

    async fn bind_source(
        &self,
        binding: &Rc<Binding>,
        name: &str,
        ctx: &ExecutionContext,
    ) -> usize {
        let source = self.inner.event_sources.borrow().get(name).cloned();
        let Some(source) = source else {
            warn!(source = %name, "Unknown event source, handler not bound");
            return 0;
        };

        let owner = ctx.me_element();
        let mut count = 0;
        for event in binding.handler.event_names() {
            match source.subscribe(event, owner, binding.listener()).await {
                Ok(subscription) => {
                    let cancel = binding.on_dispose();
                    self.inner.cleanup.register_custom(
                        owner,
                        format!("{} from {}", event, name),
                        move || {
                            subscription.unsubscribe();
                            cancel();
                        },
                    );
                    count += 1;
                }
                Err(err) => warn!(
                    source = %name,
                    event = %event,
                    error = %err,
                    "Event source subscription failed"
                ),
            }
        }
        count
    }

    fn bind_attribute_watch(
        &self,
        binding: &Rc<Binding>,
        attribute: &str,
        ctx: &ExecutionContext,
    ) -> usize {
        let Some(owner) = ctx.me_element() else {
            warn!(attribute = %attribute, "Attribute watch needs an owning element");
            return 0;
        };

        let watched = attribute.to_string();
        let binding = Rc::clone(binding);
        let callback: MutationCallback = Rc::new(move |records: Vec<MutationRecord>| {
            let Some(engine) = binding.engine.upgrade() else {
                return;
            };
            for record in records {
                let new_value = engine.host().get_attribute(record.target, &watched);
                let old_value = record.old_value.clone();
                let as_value = |v: Option<String>| v.map(Value::String).unwrap_or(Value::Null);

                let event = Event::with_detail(
                    binding.handler.event.clone(),
                    Value::object([
                        ("attributeName", Value::from(watched.as_str())),
                        ("oldValue", as_value(old_value.clone())),
                        ("newValue", as_value(new_value.clone())),
                    ]),
                )
                .non_bubbling();
                event.set_target(EventTarget::Node(record.target));

                let locals = vec![
                    ("oldValue".to_string(), as_value(old_value)),
                    ("newValue".to_string(), as_value(new_value)),
                ];
                let binding = Rc::clone(&binding);
                let engine = engine.clone();
                tokio::task::spawn_local(async move {
                    binding.activate(&engine, Arc::new(event), locals).await;
                });
            }
        });

        let host = &self.inner.host;
        let id = host.observe(owner, ObserverOptions::attribute(attribute), callback);
        self.inner.cleanup.register_observer(
            Some(owner),
            host,
            id,
            format!("watch @{}", attribute),
        );
        1
    }

    fn bind_content_watch(
        &self,
        binding: &Rc<Binding>,
        target: &str,
        ctx: &ExecutionContext,
    ) -> usize {
        let watched: Vec<NodeId> = self
            .resolve_targets(Some(target), ctx)
            .into_iter()
            .filter_map(|t| t.node())
            .collect();
        if watched.is_empty() {
            warn!(target = %target, "No elements to watch, handler not bound");
            return 0;
        }

        let host = &self.inner.host;
        for node in &watched {
            let node = *node;
            let binding = Rc::clone(binding);
            let callback: MutationCallback = Rc::new(move |_records: Vec<MutationRecord>| {
                let Some(engine) = binding.engine.upgrade() else {
                    return;
                };
                let event = Event::new(binding.handler.event.clone()).non_bubbling();
                event.set_target(EventTarget::Node(node));
                let locals = vec![("target".to_string(), Value::Element(node))];
                let binding = Rc::clone(&binding);
                tokio::task::spawn_local(async move {
                    binding.activate(&engine, Arc::new(event), locals).await;
                });
            });

            let id = host.observe(node, ObserverOptions::content(), callback);
            self.inner.cleanup.register_observer(
                ctx.me_element().or(Some(node)),
                host,
                id,
                format!("watch content of {:?}", node),
            );
        }
        watched.len()
    }
}
