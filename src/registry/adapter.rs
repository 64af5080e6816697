//! Command adapter
//!
//! Bridges generic dispatch and one command implementation. The adapter is
//! the only place where exception mode (commands raising tagged errors) is
//! converted into Result mode: a signal raised anywhere in parsing or
//! execution comes out as `Ok(Err(signal))`, a genuine failure as
//! `Err(RuntimeError)` carrying the command name and usage suggestions.

use std::rc::Rc;
use tracing::debug;

use super::command::{evaluate_input, Command, CommandMetadata, InputContract, RawInput};
use crate::engine::Engine;
use crate::errors::RuntimeError;
use crate::types::{signal, CommandNode, ExecutionContext, SignalResult};

pub struct CommandAdapter {
    name: String,
    command: Rc<dyn Command>,
}

impl CommandAdapter {
    pub fn new(name: impl Into<String>, command: Rc<dyn Command>) -> Self {
        Self {
            name: name.into(),
            command,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metadata(&self) -> Option<CommandMetadata> {
        self.command.metadata()
    }

    pub fn command(&self) -> &Rc<dyn Command> {
        &self.command
    }

    /// Parse, validate and execute one invocation
    ///
    /// The context is passed through by reference, so every mutation the
    /// command makes is already visible to the caller when this returns.
    pub async fn execute(
        &self,
        node: &CommandNode,
        ctx: &mut ExecutionContext,
        engine: &Engine,
    ) -> Result<SignalResult, RuntimeError> {
        let raw = RawInput {
            args: &node.args,
            modifiers: &node.modifiers,
        };

        let parsed = match self.command.input_contract() {
            InputContract::Raw => self.command.parse_input(raw, engine, ctx).await,
            InputContract::Evaluated => evaluate_input(raw, engine, ctx).await,
        };
        let input = match parsed {
            Ok(input) => input,
            Err(err) => return self.fail(err),
        };

        let validation = self.command.validate(&input);
        if !validation.valid {
            let mut suggestions = validation.suggestions();
            suggestions.extend(self.suggestions());
            return Err(RuntimeError::CommandFailed {
                command: self.name.clone(),
                message: validation.message(),
                suggestions,
            });
        }

        match self.command.execute(input, ctx, engine).await {
            Ok(value) => Ok(Ok(value)),
            Err(err) => self.fail(err),
        }
    }

    /// Classify an error raised by the command
    fn fail(&self, err: anyhow::Error) -> Result<SignalResult, RuntimeError> {
        let err = match signal::from_error(err) {
            Ok(sig) => {
                debug!(command = %self.name, signal = %sig, "Command raised signal");
                return Ok(Err(sig));
            }
            Err(err) => err,
        };

        // Already classified further down (nested command, timeout, config)
        match err.downcast::<RuntimeError>() {
            Ok(runtime) => Err(runtime),
            Err(err) => Err(RuntimeError::CommandFailed {
                command: self.name.clone(),
                message: format!("{:#}", err),
                suggestions: self.suggestions(),
            }),
        }
    }

    fn suggestions(&self) -> Vec<String> {
        self.command
            .metadata()
            .map(|m| m.suggestions())
            .unwrap_or_default()
    }
}
