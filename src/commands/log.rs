//! log: write values to the tracing output

use async_trait::async_trait;
use tracing::info;

use crate::engine::Engine;
use crate::registry::{Command, CommandInput, CommandMetadata};
use crate::types::{ExecutionContext, Value};

pub struct Log;

#[async_trait(?Send)]
impl Command for Log {
    fn metadata(&self) -> Option<CommandMetadata> {
        Some(
            CommandMetadata::new("log", "Log values; yields the first one")
                .syntax("log <value> [<value> ...]")
                .example("log 'clicked' me"),
        )
    }

    async fn execute(
        &self,
        input: CommandInput,
        _ctx: &mut ExecutionContext,
        _engine: &Engine,
    ) -> anyhow::Result<Value> {
        let line = input
            .args
            .iter()
            .map(Value::to_string)
            .collect::<Vec<_>>()
            .join(" ");
        info!(target: "lokascript::log", "{}", line);
        Ok(input.args.into_iter().next().unwrap_or_default())
    }
}
