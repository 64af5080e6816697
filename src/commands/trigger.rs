//! trigger / send: dispatch an event and wait for its handlers

use async_trait::async_trait;
use std::sync::Arc;

use super::word;
use crate::engine::Engine;
use crate::host::EventTarget;
use crate::registry::{
    Command, CommandInput, CommandMetadata, InputContract, RawInput, ValidationErrorKind,
    ValidationResult,
};
use crate::types::{AstNode, Event, ExecutionContext, Value};

pub struct Trigger {
    name: &'static str,
}

impl Trigger {
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }
}

#[async_trait(?Send)]
impl Command for Trigger {
    fn metadata(&self) -> Option<CommandMetadata> {
        Some(
            CommandMetadata::new(self.name, "Dispatch an event to elements")
                .syntax(format!("{} <event> [on <target>] [with <detail>]", self.name))
                .example(format!("{} refresh on #list", self.name)),
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
        if let Some(node) = raw.arg(0) {
            let name = match word(node) {
                Some(name) => name,
                None => engine.evaluate_value(node, ctx).await?.to_string(),
            };
            input.args.push(Value::String(name));
        }

        if let Some(node) = raw.modifier("on").or_else(|| raw.modifier("to")) {
            match node {
                AstNode::Identifier { name } if name == "window" || name == "document" => {
                    input.deferred.insert("target".into(), node.clone());
                }
                other => {
                    let target = engine.evaluate_value(other, ctx).await?;
                    input.modifiers.insert("on".into(), target);
                }
            }
        }
        if let Some(node) = raw.modifier("with") {
            let detail = engine.evaluate_value(node, ctx).await?;
            input.modifiers.insert("with".into(), detail);
        }
        Ok(input)
    }

    fn validate(&self, input: &CommandInput) -> ValidationResult {
        match input.arg(0).and_then(Value::as_str) {
            Some(name) if !name.is_empty() => ValidationResult::ok(),
            _ => ValidationResult::error(ValidationErrorKind::MissingArgument, "missing event name"),
        }
    }

    /// `{result, wasAsync}` where `result` is the last dispatched event
    async fn execute(
        &self,
        input: CommandInput,
        ctx: &mut ExecutionContext,
        engine: &Engine,
    ) -> anyhow::Result<Value> {
        let name = input.arg(0).map(Value::to_string).unwrap_or_default();
        let detail = input.modifier("with").cloned().unwrap_or_default();

        let targets: Vec<EventTarget> = match input.deferred("target") {
            Some(AstNode::Identifier { name }) if name == "window" => vec![EventTarget::Window],
            Some(_) => vec![EventTarget::Document],
            None => super::target_elements(input.modifier("on"), engine, ctx)
                .into_iter()
                .map(EventTarget::Node)
                .collect(),
        };

        let mut last = Value::Undefined;
        for target in targets {
            let event = Arc::new(Event::with_detail(name.clone(), detail.clone()));
            engine
                .host()
                .dispatch_event(target, Arc::clone(&event))
                .await;
            last = Value::Event(event);
        }

        Ok(Value::object([
            ("result", last),
            ("wasAsync", Value::Bool(true)),
        ]))
    }
}
