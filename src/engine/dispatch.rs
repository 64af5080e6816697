//! AST dispatch
//!
//! Every internal evaluation returns `Result<SignalResult, RuntimeError>`:
//! genuine failures propagate with `?`, control flow travels in the inner
//! `Err` arm. How each scope treats a signal coming out of a child:
//!
//! | scope      | halt      | exit          | return            | break/continue |
//! |------------|-----------|---------------|-------------------|----------------|
//! | program    | propagate | propagate     | propagate         | propagate      |
//! | block      | propagate | propagate     | propagate         | propagate      |
//! | sequence   | propagate | stop, absorb  | set `it`, absorb  | propagate      |
//!
//! [`Engine::execute`] is the boundary to callers: `halt` comes out as
//! `RuntimeError::Signal`, `exit`/`return` yield their value, and a stray
//! `break`/`continue` is dropped.

use std::collections::BTreeMap;
use tracing::{debug, debug_span, error, Instrument};

use super::Engine;
use crate::errors::RuntimeError;
use crate::hooks::HookContext;
use crate::registry::{unwrap_result, Unwrapped};
use crate::types::{
    signal, AstNode, CommandNode, ExecutionContext, ExecutionSignal, LocalBoxFuture,
    SignalResult, Value,
};

type Outcome = Result<SignalResult, RuntimeError>;

impl Engine {
    /// Execute a node for a caller outside the engine
    pub async fn execute(
        &self,
        node: &AstNode,
        ctx: &mut ExecutionContext,
    ) -> Result<Value, RuntimeError> {
        match self.execute_signal(node, ctx).await? {
            Ok(value) => Ok(value),
            Err(ExecutionSignal::Halt) => Err(RuntimeError::Signal(ExecutionSignal::Halt)),
            Err(ExecutionSignal::Exit { return_value })
            | Err(ExecutionSignal::Return { return_value }) => Ok(return_value.unwrap_or_default()),
            Err(stray) => {
                debug!(signal = %stray, "Loop signal outside of a loop");
                Ok(Value::Undefined)
            }
        }
    }

    /// Execute a node in Result mode
    pub fn execute_signal<'a>(
        &'a self,
        node: &'a AstNode,
        ctx: &'a mut ExecutionContext,
    ) -> LocalBoxFuture<'a, Outcome> {
        Box::pin(async move {
            match node {
                AstNode::Command(cmd) => self.run_command(cmd, ctx).await,
                AstNode::EventHandler(handler) => {
                    self.bind_handler(handler, ctx).await?;
                    Ok(Ok(Value::Undefined))
                }
                AstNode::Behavior(behavior) => {
                    self.define_behavior(behavior);
                    Ok(Ok(Value::Undefined))
                }
                AstNode::Program { statements } => self.run_program(statements, ctx).await,
                AstNode::Block { commands } | AstNode::InitBlock { commands } => {
                    self.run_block(commands, ctx).await
                }
                AstNode::Sequence { commands } => self.run_sequence(commands, ctx).await,
                expression => self.evaluate(expression, ctx).await,
            }
        })
    }

    /// Execute a node in exception mode, for command implementations
    ///
    /// Signals come back as tagged errors; returning them unchanged from
    /// `Command::execute` propagates them.
    pub async fn execute_raising(
        &self,
        node: &AstNode,
        ctx: &mut ExecutionContext,
    ) -> anyhow::Result<Value> {
        let outcome = self.execute_signal(node, ctx).await?;
        signal::into_exception(outcome)
    }

    /// Evaluate an expression in Result mode
    ///
    /// A `{command, selector}` result is the implicit command pattern and is
    /// dispatched as that command.
    pub fn evaluate<'a>(
        &'a self,
        node: &'a AstNode,
        ctx: &'a mut ExecutionContext,
    ) -> LocalBoxFuture<'a, Outcome> {
        Box::pin(async move {
            match node {
                // Written out by the author, never an implicit command
                AstNode::ObjectLiteral { .. } => {
                    Ok(Ok(self.inner.evaluator.evaluate(node, ctx, self).await?))
                }
                AstNode::Literal { .. }
                | AstNode::Identifier { .. }
                | AstNode::Selector { .. }
                | AstNode::Attribute { .. }
                | AstNode::Member { .. }
                | AstNode::Binary { .. }
                | AstNode::Unary { .. }
                | AstNode::Array { .. } => {
                    let value = self.inner.evaluator.evaluate(node, ctx, self).await?;
                    match implicit_command(&value) {
                        Some(cmd) => {
                            debug!(command = %cmd.name, "Dispatching implicit command");
                            self.run_command(&cmd, ctx).await
                        }
                        None => Ok(Ok(value)),
                    }
                }
                statement => self.execute_signal(statement, ctx).await,
            }
        })
    }

    /// Evaluate an expression in exception mode
    pub async fn evaluate_value(
        &self,
        node: &AstNode,
        ctx: &mut ExecutionContext,
    ) -> anyhow::Result<Value> {
        let outcome = self.evaluate(node, ctx).await?;
        signal::into_exception(outcome)
    }

    /* ===================== Commands ===================== */

    async fn run_command(&self, cmd: &CommandNode, ctx: &mut ExecutionContext) -> Outcome {
        let adapter = self.inner.registry.borrow().get_adapter(&cmd.name);
        let Some(adapter) = adapter else {
            error!(command = %cmd.name, "Unknown command");
            return Err(RuntimeError::UnknownCommand(cmd.name.clone()));
        };

        let hooks = &self.inner.hooks;
        let span = debug_span!("command", name = %adapter.name());

        async move {
            if !hooks.is_empty() {
                let hook_ctx = HookContext::new(cmd, ctx);
                if hooks.should_intercept(&hook_ctx) {
                    debug!("Command intercepted by hook");
                    return Ok(Ok(Value::Undefined));
                }
                hooks.run_before(&hook_ctx);
            }

            match adapter.execute(cmd, ctx, self).await {
                Ok(Ok(value)) => {
                    if !hooks.is_empty() {
                        hooks.run_after(&HookContext::new(cmd, ctx), &value);
                    }
                    Ok(Ok(value))
                }
                Ok(Err(signal)) => Ok(Err(signal)),
                Err(err) if hooks.is_empty() => Err(err),
                Err(err) => Err(hooks.run_error(&HookContext::new(cmd, ctx), err)),
            }
        }
        .instrument(span)
        .await
    }

    /* ===================== Scopes ===================== */

    async fn run_program(&self, statements: &[AstNode], ctx: &mut ExecutionContext) -> Outcome {
        let is_binding = |n: &&AstNode| {
            matches!(n, AstNode::EventHandler(_) | AstNode::Behavior(_))
        };
        let is_init = |n: &&AstNode| matches!(n, AstNode::InitBlock { .. });

        // Listeners must exist before any init block can fire events at them
        let bindings = statements.iter().filter(is_binding);
        let inits = statements.iter().filter(is_init);
        let rest = statements
            .iter()
            .filter(|n| !is_binding(n) && !is_init(n));

        for node in bindings {
            if let Err(signal) = self.execute_signal(node, ctx).await? {
                return Ok(Err(signal));
            }
        }

        let mut last = Value::Undefined;
        for node in inits.chain(rest) {
            match self.execute_signal(node, ctx).await? {
                Ok(value) => absorb(value, ctx, &mut last),
                Err(signal) => return Ok(Err(signal)),
            }
        }
        Ok(Ok(last))
    }

    async fn run_block(&self, commands: &[AstNode], ctx: &mut ExecutionContext) -> Outcome {
        let mut last = Value::Undefined;
        for node in commands {
            match self.execute_signal(node, ctx).await? {
                Ok(value) => absorb(value, ctx, &mut last),
                Err(signal) => {
                    debug!(signal = %signal, "Block stopped");
                    return Ok(Err(signal));
                }
            }
        }
        Ok(Ok(last))
    }

    async fn run_sequence(&self, commands: &[AstNode], ctx: &mut ExecutionContext) -> Outcome {
        let mut last = Value::Undefined;
        for node in commands {
            match self.execute_signal(node, ctx).await? {
                Ok(value) => absorb(value, ctx, &mut last),
                Err(ExecutionSignal::Exit { return_value }) => {
                    debug!("Sequence exited");
                    if let Some(value) = return_value {
                        ctx.set_it(value.clone());
                        last = value;
                    }
                    return Ok(Ok(last));
                }
                Err(ExecutionSignal::Return { return_value }) => {
                    let value = return_value.unwrap_or_default();
                    ctx.set_it(value.clone());
                    return Ok(Ok(value));
                }
                Err(signal) => return Ok(Err(signal)),
            }
        }
        Ok(Ok(last))
    }
}

/// Assign a child's unwrapped result to `it`/`result`
fn absorb(value: Value, ctx: &mut ExecutionContext, last: &mut Value) {
    if let Unwrapped::Value(value) = unwrap_result(value) {
        ctx.set_it(value.clone());
        *last = value;
    }
}

/// Recognize `{command, selector}` produced by the expression grammar
fn implicit_command(value: &Value) -> Option<CommandNode> {
    let map = value.as_object()?;
    if map.len() != 2 {
        return None;
    }
    let name = map.get("command")?.as_str()?;
    let selector = map.get("selector")?.as_str()?;
    Some(CommandNode {
        name: name.to_string(),
        args: vec![AstNode::selector(selector)],
        modifiers: BTreeMap::new(),
    })
}
