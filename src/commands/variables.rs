//! set, increment, decrement
//!
//! The assignment target is never evaluated. `$name` is a global, `@name`
//! an attribute of `me`, any other identifier a local.

use async_trait::async_trait;

use super::word;
use crate::engine::Engine;
use crate::registry::{
    Command, CommandInput, CommandMetadata, InputContract, RawInput, ValidationErrorKind,
    ValidationResult,
};
use crate::types::{AstNode, ExecutionContext, Value};

/// Where an assignment lands
#[derive(Debug, Clone, PartialEq)]
enum Target {
    Local(String),
    Global(String),
    Attribute(String),
}

impl Target {
    fn from_node(node: &AstNode) -> Option<Self> {
        match node {
            AstNode::Attribute { name } => Some(Target::Attribute(name.clone())),
            other => {
                let name = word(other)?;
                Some(match name.strip_prefix('$') {
                    Some(global) => Target::Global(global.to_string()),
                    None => Target::Local(name),
                })
            }
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Target::Local(_) => "local",
            Target::Global(_) => "global",
            Target::Attribute(_) => "attribute",
        }
    }

    fn name(&self) -> &str {
        match self {
            Target::Local(n) | Target::Global(n) | Target::Attribute(n) => n,
        }
    }

    fn read(&self, ctx: &ExecutionContext, engine: &Engine) -> Value {
        match self {
            Target::Local(name) => ctx.lookup(name).unwrap_or_default(),
            Target::Global(name) => ctx.global(name).unwrap_or_default(),
            Target::Attribute(name) => ctx
                .me_element()
                .and_then(|me| engine.host().get_attribute(me, name))
                .map(Value::String)
                .unwrap_or_default(),
        }
    }

    fn write(&self, value: &Value, ctx: &mut ExecutionContext, engine: &Engine) -> anyhow::Result<()> {
        match self {
            Target::Local(name) => ctx.set_local(name.clone(), value.clone()),
            Target::Global(name) => ctx.set_global(name.clone(), value.clone()),
            Target::Attribute(name) => {
                let me = ctx
                    .me_element()
                    .ok_or_else(|| anyhow::anyhow!("@{} needs an element as me", name))?;
                engine.host().set_attribute(me, name, &value.to_string());
            }
        }
        Ok(())
    }

    /// `{target, value, targetType}`; unwraps to `value`
    fn report(&self, value: Value) -> Value {
        Value::object([
            ("target", Value::from(self.name())),
            ("value", value),
            ("targetType", Value::from(self.kind())),
        ])
    }
}

fn missing_target(raw: Option<&AstNode>) -> ValidationResult {
    match raw {
        None => ValidationResult::error(ValidationErrorKind::MissingArgument, "missing target"),
        Some(node) => ValidationResult::error(
            ValidationErrorKind::InvalidArgument,
            format!("cannot assign to a {}", node.kind_name()),
        ),
    }
}

/* ===================== set ===================== */

pub struct Set;

#[async_trait(?Send)]
impl Command for Set {
    fn metadata(&self) -> Option<CommandMetadata> {
        Some(
            CommandMetadata::new("set", "Assign a value to a variable or attribute")
                .syntax("set <target> to <value>")
                .example("set $count to 0")
                .example("set @aria-expanded to 'true'"),
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
        if let Some(target) = raw.arg(0) {
            input.deferred.insert("target".into(), target.clone());
        }
        let value = raw.modifier("to").or_else(|| raw.arg(1));
        if let Some(node) = value {
            let value = engine.evaluate_value(node, ctx).await?;
            input.modifiers.insert("to".into(), value);
        }
        Ok(input)
    }

    fn validate(&self, input: &CommandInput) -> ValidationResult {
        let raw = input.deferred("target");
        if raw.and_then(Target::from_node).is_none() {
            return missing_target(raw).with_suggestion("set x to 1");
        }
        if input.modifier("to").is_none() {
            return ValidationResult::error(ValidationErrorKind::MissingArgument, "missing value")
                .with_suggestion("set x to 1");
        }
        ValidationResult::ok()
    }

    async fn execute(
        &self,
        input: CommandInput,
        ctx: &mut ExecutionContext,
        engine: &Engine,
    ) -> anyhow::Result<Value> {
        let target = input
            .deferred("target")
            .and_then(Target::from_node)
            .ok_or_else(|| anyhow::anyhow!("missing target"))?;
        let value = input.modifier("to").cloned().unwrap_or_default();
        target.write(&value, ctx, engine)?;
        Ok(target.report(value))
    }
}

/* ===================== increment / decrement ===================== */

pub struct Step {
    name: &'static str,
    sign: f64,
}

impl Step {
    pub fn increment() -> Self {
        Self {
            name: "increment",
            sign: 1.0,
        }
    }

    pub fn decrement() -> Self {
        Self {
            name: "decrement",
            sign: -1.0,
        }
    }
}

#[async_trait(?Send)]
impl Command for Step {
    fn metadata(&self) -> Option<CommandMetadata> {
        Some(
            CommandMetadata::new(self.name, "Add to or subtract from a numeric variable")
                .syntax(format!("{} <target> [by <amount>]", self.name))
                .example(format!("{} $clicks", self.name)),
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
        if let Some(target) = raw.arg(0) {
            input.deferred.insert("target".into(), target.clone());
        }
        if let Some(node) = raw.modifier("by") {
            let amount = engine.evaluate_value(node, ctx).await?;
            input.modifiers.insert("by".into(), amount);
        }
        Ok(input)
    }

    fn validate(&self, input: &CommandInput) -> ValidationResult {
        let raw = input.deferred("target");
        if raw.and_then(Target::from_node).is_none() {
            return missing_target(raw);
        }
        match input.modifier("by") {
            Some(amount) if amount.as_f64().is_none() => ValidationResult::error(
                ValidationErrorKind::TypeMismatch,
                format!("amount must be a number, got {}", amount.type_name()),
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
        let mut target = input
            .deferred("target")
            .and_then(Target::from_node)
            .ok_or_else(|| anyhow::anyhow!("missing target"))?;

        // A plain name that only exists as a global updates the global
        if let Target::Local(name) = &target {
            if !ctx.locals.contains_key(name) && ctx.global(name).is_some() {
                target = Target::Global(name.clone());
            }
        }

        let amount = input.modifier("by").and_then(Value::as_f64).unwrap_or(1.0);
        let current = target.read(ctx, engine).as_f64().unwrap_or(0.0);
        let value = Value::Number(current + self.sign * amount);
        target.write(&value, ctx, engine)?;
        Ok(target.report(value))
    }
}
