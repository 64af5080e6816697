//! halt, exit, return, break, continue
//!
//! These only raise signals; where execution resumes is decided by the
//! enclosing sequence, block or loop.

use async_trait::async_trait;

use crate::engine::Engine;
use crate::registry::{Command, CommandInput, CommandMetadata};
use crate::types::{ExecutionContext, ExecutionSignal, Value};

pub struct Halt;

#[async_trait(?Send)]
impl Command for Halt {
    fn metadata(&self) -> Option<CommandMetadata> {
        Some(
            CommandMetadata::new("halt", "Stop the current handler and everything calling it")
                .syntax("halt")
                .example("halt"),
        )
    }

    async fn execute(
        &self,
        _input: CommandInput,
        _ctx: &mut ExecutionContext,
        _engine: &Engine,
    ) -> anyhow::Result<Value> {
        Err(ExecutionSignal::Halt.into())
    }
}

pub struct Exit;

#[async_trait(?Send)]
impl Command for Exit {
    fn metadata(&self) -> Option<CommandMetadata> {
        Some(
            CommandMetadata::new("exit", "Leave the current command sequence")
                .syntax("exit [<value>]")
                .example("exit"),
        )
    }

    async fn execute(
        &self,
        input: CommandInput,
        _ctx: &mut ExecutionContext,
        _engine: &Engine,
    ) -> anyhow::Result<Value> {
        Err(ExecutionSignal::exit(input.args.into_iter().next()).into())
    }
}

pub struct Return;

#[async_trait(?Send)]
impl Command for Return {
    fn metadata(&self) -> Option<CommandMetadata> {
        Some(
            CommandMetadata::new("return", "Leave the current sequence with a value")
                .syntax("return [<value>]")
                .example("return 42"),
        )
    }

    async fn execute(
        &self,
        input: CommandInput,
        _ctx: &mut ExecutionContext,
        _engine: &Engine,
    ) -> anyhow::Result<Value> {
        Err(ExecutionSignal::returning(input.args.into_iter().next()).into())
    }
}

pub struct Break;

#[async_trait(?Send)]
impl Command for Break {
    fn name(&self) -> Option<&str> {
        Some("break")
    }

    async fn execute(
        &self,
        _input: CommandInput,
        _ctx: &mut ExecutionContext,
        _engine: &Engine,
    ) -> anyhow::Result<Value> {
        Err(ExecutionSignal::Break.into())
    }
}

pub struct Continue;

#[async_trait(?Send)]
impl Command for Continue {
    fn name(&self) -> Option<&str> {
        Some("continue")
    }

    async fn execute(
        &self,
        _input: CommandInput,
        _ctx: &mut ExecutionContext,
        _engine: &Engine,
    ) -> anyhow::Result<Value> {
        Err(ExecutionSignal::Continue.into())
    }
}
