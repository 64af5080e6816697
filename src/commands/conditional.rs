//! if / else
//!
//! Branch bodies run through the engine in exception mode, so a signal
//! raised inside a branch leaves this command unchanged and reaches the
//! enclosing sequence.

use async_trait::async_trait;

use crate::engine::Engine;
use crate::registry::{
    Command, CommandInput, CommandMetadata, InputContract, RawInput, ValidationErrorKind,
    ValidationResult,
};
use crate::types::{ExecutionContext, Value};

pub struct If;

#[async_trait(?Send)]
impl Command for If {
    fn metadata(&self) -> Option<CommandMetadata> {
        Some(
            CommandMetadata::new("if", "Run a block when a condition holds")
                .syntax("if <condition> then <commands> [else <commands>] end")
                .example("if $count > 3 then add .full end"),
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
        if let Some(condition) = raw.arg(0) {
            input.args.push(engine.evaluate_value(condition, ctx).await?);
        }
        let then = raw.modifier("then").or_else(|| raw.arg(1));
        if let Some(body) = then {
            input.deferred.insert("then".into(), body.clone());
        }
        if let Some(body) = raw.modifier("else") {
            input.deferred.insert("else".into(), body.clone());
        }
        Ok(input)
    }

    fn validate(&self, input: &CommandInput) -> ValidationResult {
        if input.args.is_empty() {
            return ValidationResult::error(ValidationErrorKind::MissingArgument, "missing condition");
        }
        if input.deferred("then").is_none() {
            return ValidationResult::error(ValidationErrorKind::MissingArgument, "missing then branch");
        }
        ValidationResult::ok()
    }

    /// `{conditionResult, executedBranch, result?}`; without a `result` the
    /// surrounding `it` is left alone
    async fn execute(
        &self,
        input: CommandInput,
        ctx: &mut ExecutionContext,
        engine: &Engine,
    ) -> anyhow::Result<Value> {
        let condition = input.arg(0).is_some_and(Value::is_truthy);
        let branch = if condition { "then" } else { "else" };

        let mut report = vec![("conditionResult", Value::Bool(condition))];
        match input.deferred(branch) {
            Some(body) => {
                let result = engine.execute_raising(body, ctx).await?;
                report.push(("executedBranch", Value::from(branch)));
                report.push(("result", result));
            }
            None => report.push(("executedBranch", Value::from("none"))),
        }
        Ok(Value::object(report))
    }
}
