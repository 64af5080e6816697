//! Behavior lifecycle
//!
//! A behavior node only registers a definition. Installing it on an element
//! builds an isolated context (`me` is the element, locals start empty and
//! hold the parameters), runs the init block, then attaches each declared
//! handler. The init block and every attachment race the configured
//! behavior timeout; a timed-out init attaches nothing.

use std::collections::BTreeMap;
use std::future::Future;
use std::rc::Rc;
use tracing::{debug, error, info};

use super::Engine;
use crate::errors::{ConfigError, RuntimeError};
use crate::host::NodeId;
use crate::types::{BehaviorNode, ExecutionSignal, Value};

impl Engine {
    /// Add a definition to the behavior table, replacing any previous one
    pub fn define_behavior(&self, behavior: &BehaviorNode) {
        debug!(behavior = %behavior.name, "Behavior defined");
        self.inner
            .behaviors
            .borrow_mut()
            .insert(behavior.name.clone(), Rc::new(behavior.clone()));
    }

    pub async fn install_behavior(
        &self,
        name: &str,
        target: NodeId,
        params: BTreeMap<String, Value>,
    ) -> Result<(), RuntimeError> {
        let behavior = self.inner.behaviors.borrow().get(name).cloned();
        let Some(behavior) = behavior else {
            error!(behavior = %name, "Behavior not found");
            return Err(ConfigError::BehaviorNotFound(name.to_string()).into());
        };

        let mut ctx = self.context(Some(target));
        for declared in &behavior.parameters {
            let value = params.get(declared).cloned().unwrap_or_default();
            ctx.set_local(declared.clone(), value);
        }
        for (key, value) in &params {
            if !behavior.parameters.contains(key) {
                ctx.set_local(key.clone(), value.clone());
            }
        }

        if let Some(init) = &behavior.init_block {
            let outcome = self
                .with_behavior_timeout(name, "init", self.execute_signal(init, &mut ctx))
                .await??;
            match outcome {
                Ok(_) => {}
                Err(ExecutionSignal::Halt) => {
                    debug!(behavior = %name, "Init block halted, handlers not attached");
                    return Err(RuntimeError::Signal(ExecutionSignal::Halt));
                }
                Err(signal) => debug!(behavior = %name, signal = %signal, "Init block stopped"),
            }
        }

        let mut bound = 0;
        for handler in &behavior.event_handlers {
            bound += self
                .with_behavior_timeout(name, &handler.event, self.bind_handler(handler, &ctx))
                .await??;
        }

        info!(
            behavior = %name,
            element = target.0,
            handlers = behavior.event_handlers.len(),
            bound,
            "Behavior installed"
        );
        Ok(())
    }

    async fn with_behavior_timeout<F: Future>(
        &self,
        behavior: &str,
        step: &str,
        future: F,
    ) -> Result<F::Output, RuntimeError> {
        let limit = self.config().behavior_timeout();
        tokio::time::timeout(limit, future).await.map_err(|_| {
            error!(behavior = %behavior, step = %step, "Behavior step timed out");
            RuntimeError::Timeout {
                operation: format!("behavior '{}' {}", behavior, step),
                timeout_ms: self.config().behavior_timeout_ms,
            }
        })
    }
}
