//! repeat: counted and conditional loops
//!
//! The loop body runs in Result mode so `break` and `continue` can be
//! consumed here; every other signal is re-raised.

use async_trait::async_trait;

use crate::engine::Engine;
use crate::registry::{
    Command, CommandInput, CommandMetadata, InputContract, RawInput, ValidationErrorKind,
    ValidationResult,
};
use crate::types::{signal, ExecutionContext, ExecutionSignal, Value};

pub struct Repeat;

#[async_trait(?Send)]
impl Command for Repeat {
    fn metadata(&self) -> Option<CommandMetadata> {
        Some(
            CommandMetadata::new("repeat", "Run a block several times or while a condition holds")
                .syntax("repeat (<n> times | while <condition>) <commands> end")
                .example("repeat 3 times increment $n end"),
        )
    }

    fn input_contract(&self) -> InputContract {
        InputContract::Raw
    }

    async fn parse_input(
        &self,
        raw: RawInput<'_>,
        engine: &Engine,
        ctx: &mut ExecutionContext,
    ) -> anyhow::Result<CommandInput> {
        let mut input = CommandInput::default();
        if let Some(body) = raw.arg(0) {
            input.deferred.insert("body".into(), body.clone());
        }
        if let Some(times) = raw.modifier("times") {
            let count = engine.evaluate_value(times, ctx).await?;
            input.modifiers.insert("times".into(), count);
        }
        // Re-evaluated before every iteration
        if let Some(condition) = raw.modifier("while") {
            input.deferred.insert("while".into(), condition.clone());
        }
        Ok(input)
    }

    fn validate(&self, input: &CommandInput) -> ValidationResult {
        if input.deferred("body").is_none() {
            return ValidationResult::error(ValidationErrorKind::MissingArgument, "missing loop body");
        }
        match (input.modifier("times"), input.deferred("while")) {
            (None, None) => ValidationResult::error(
                ValidationErrorKind::MissingArgument,
                "expected 'times' or 'while'",
            )
            .with_suggestion("repeat 3 times ... end"),
            (Some(count), _) if count.as_f64().is_none() => ValidationResult::error(
                ValidationErrorKind::TypeMismatch,
                format!("repeat count must be a number, got {}", count.type_name()),
            ),
            _ => ValidationResult::ok(),
        }
    }

    /// `{lastResult, type}`
    async fn execute(
        &self,
        input: CommandInput,
        ctx: &mut ExecutionContext,
        engine: &Engine,
    ) -> anyhow::Result<Value> {
        let body = input
            .deferred("body")
            .ok_or_else(|| anyhow::anyhow!("missing loop body"))?;
        let limit = input
            .modifier("times")
            .and_then(Value::as_f64)
            .map(|n| n.max(0.0) as u64);
        let condition = input.deferred("while");

        let mut last = Value::Undefined;
        let mut index = 0u64;
        loop {
            if limit.is_some_and(|limit| index >= limit) {
                break;
            }
            if let Some(condition) = condition {
                if !engine.evaluate_value(condition, ctx).await?.is_truthy() {
                    break;
                }
            }
            ctx.set_local("index", Value::Number(index as f64));
            index += 1;

            match engine.execute_signal(body, ctx).await? {
                Ok(value) => last = value,
                Err(ExecutionSignal::Break) => break,
                Err(ExecutionSignal::Continue) => continue,
                Err(other) => return Err(signal::into_error(other)),
            }
        }

        let kind = if limit.is_some() { "times" } else { "while" };
        Ok(Value::object([
            ("lastResult", last),
            ("type", Value::from(kind)),
        ]))
    }
}
