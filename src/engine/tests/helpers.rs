//! Test helpers for engine tests
//!
//! Common utilities for building an engine over an in-memory document and
//! observing what handlers did

use crate::config::RuntimeConfig;
use crate::dom::Document;
use crate::engine::Engine;
use crate::host::{EventTarget, Host, NodeId};
use crate::registry::{Command, CommandInput};
use crate::types::{AstNode, Event, ExecutionContext, Value};
use async_trait::async_trait;
use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;
use std::sync::Arc;
use tokio::task::LocalSet;

/// Engine over a fresh document with `<button id="btn">` in the body
///
/// Must be built inside a `LocalSet`: document mutations are delivered to
/// observers from local tasks. A `record` command is registered; every
/// invocation appends its evaluated arguments to `log`.
pub struct Fixture {
    pub doc: Rc<Document>,
    pub engine: Engine,
    pub button: NodeId,
    pub log: Rc<RefCell<Vec<Value>>>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        let doc = Document::new();
        let button = doc.create_element("button");
        doc.set_attribute(button, "id", "btn");
        doc.append_child(doc.body(), button);

        let host: Rc<dyn Host> = doc.clone();
        let engine = Engine::builder(host)
            .config(config)
            .build()
            .expect("engine should build");

        let log = Rc::new(RefCell::new(Vec::new()));
        engine
            .register_command(Recorder {
                log: Rc::clone(&log),
            })
            .expect("record command registers");

        Self {
            doc,
            engine,
            button,
            log,
        }
    }

    /// Context whose `me` is the button
    pub fn ctx(&self) -> ExecutionContext {
        self.engine.context(Some(self.button))
    }

    pub async fn run(&self, json: serde_json::Value) -> Result<Value, crate::errors::RuntimeError> {
        let node = parse(json);
        let mut ctx = self.ctx();
        self.engine.execute(&node, &mut ctx).await
    }

    pub async fn fire(&self, event_type: &str, detail: Value) -> Arc<Event> {
        self.engine
            .trigger(EventTarget::Node(self.button), event_type, detail)
            .await
    }

    pub fn logged(&self) -> Vec<Value> {
        self.log.borrow().clone()
    }
}

/// Deserialize an AST node from its JSON form
pub fn parse(json: serde_json::Value) -> AstNode {
    serde_json::from_value(json).expect("valid AST")
}

/// `{"type": "command", ...}` with positional arguments only
pub fn command(name: &str, args: Vec<serde_json::Value>) -> serde_json::Value {
    serde_json::json!({ "type": "command", "name": name, "args": args })
}

pub fn lit(value: impl Into<serde_json::Value>) -> serde_json::Value {
    serde_json::json!({ "type": "literal", "value": value.into() })
}

pub fn ident(name: &str) -> serde_json::Value {
    serde_json::json!({ "type": "identifier", "name": name })
}

pub async fn run_local<F: Future>(future: F) -> F::Output {
    LocalSet::new().run_until(future).await
}

/// Let spawned local tasks (mutation delivery, watchers) run
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

pub struct Recorder {
    log: Rc<RefCell<Vec<Value>>>,
}

#[async_trait(?Send)]
impl Command for Recorder {
    fn name(&self) -> Option<&str> {
        Some("record")
    }

    async fn execute(
        &self,
        input: CommandInput,
        _ctx: &mut ExecutionContext,
        _engine: &Engine,
    ) -> anyhow::Result<Value> {
        let first = input.args.first().cloned().unwrap_or_default();
        self.log.borrow_mut().extend(input.args);
        Ok(first)
    }
}
