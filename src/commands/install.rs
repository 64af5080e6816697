//! install: attach a defined behavior to elements

use async_trait::async_trait;
use std::collections::BTreeMap;

use super::{target_elements, word};
use crate::engine::Engine;
use crate::registry::{
    Command, CommandInput, CommandMetadata, InputContract, RawInput, ValidationErrorKind,
    ValidationResult,
};
use crate::types::{ExecutionContext, Value};

pub struct Install;

#[async_trait(?Send)]
impl Command for Install {
    fn metadata(&self) -> Option<CommandMetadata> {
        Some(
            CommandMetadata::new("install", "Install a behavior on elements")
                .syntax("install <Behavior>[(<param>: <value>, ...)] [on <target>]")
                .example("install Draggable(handle: '.bar')"),
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
        if let Some(name) = raw.arg(0).and_then(word) {
            input.args.push(Value::String(name));
        }
        for keyword in ["with", "on"] {
            if let Some(node) = raw.modifier(keyword) {
                let value = engine.evaluate_value(node, ctx).await?;
                input.modifiers.insert(keyword.to_string(), value);
            }
        }
        Ok(input)
    }

    fn validate(&self, input: &CommandInput) -> ValidationResult {
        if input.arg(0).is_none() {
            return ValidationResult::error(ValidationErrorKind::MissingArgument, "missing behavior name");
        }
        match input.modifier("with") {
            Some(params) if params.as_object().is_none() => ValidationResult::error(
                ValidationErrorKind::TypeMismatch,
                format!("parameters must be an object, got {}", params.type_name()),
            ),
            _ => ValidationResult::ok(),
        }
    }

    async fn execute(
        &self,
        input: CommandInput,
        ctx: &mut ExecutionContext,
        engine: &Engine,
    ) -> anyhow::Result<Value> {
        let name = input.arg(0).map(Value::to_string).unwrap_or_default();
        let params: BTreeMap<String, Value> = input
            .modifier("with")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        let targets = target_elements(input.modifier("on"), engine, ctx);
        for target in &targets {
            engine.install_behavior(&name, *target, params.clone()).await?;
        }
        Ok(Value::Array(targets.into_iter().map(Value::Element).collect()))
    }
}
