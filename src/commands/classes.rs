//! add, remove, toggle (class lists)

use async_trait::async_trait;

use super::{first_modifier, target_elements};
use crate::engine::Engine;
use crate::registry::{
    Command, CommandInput, CommandMetadata, InputContract, RawInput, ValidationErrorKind,
    ValidationResult,
};
use crate::types::{AstNode, ExecutionContext, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Add,
    Remove,
    Toggle,
}

pub struct ClassCommand {
    op: Op,
}

impl ClassCommand {
    pub fn add() -> Self {
        Self { op: Op::Add }
    }

    pub fn remove() -> Self {
        Self { op: Op::Remove }
    }

    pub fn toggle() -> Self {
        Self { op: Op::Toggle }
    }

    fn keywords(&self) -> &'static [&'static str] {
        match self.op {
            Op::Add => &["to", "on"],
            Op::Remove => &["from", "on"],
            Op::Toggle => &["on", "to", "from"],
        }
    }
}

/// Class names written as `.a.b`, `a b` or `.a`
fn class_names(text: &str) -> Vec<String> {
    text.split(|c: char| c == '.' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[async_trait(?Send)]
impl Command for ClassCommand {
    fn metadata(&self) -> Option<CommandMetadata> {
        let meta = match self.op {
            Op::Add => CommandMetadata::new("add", "Add classes to elements")
                .syntax("add .class [to <target>]")
                .example("add .active to me"),
            Op::Remove => CommandMetadata::new("remove", "Remove classes from elements")
                .syntax("remove .class [from <target>]")
                .example("remove .hidden from #menu"),
            Op::Toggle => CommandMetadata::new("toggle", "Toggle classes on elements")
                .syntax("toggle .class [on <target>]")
                .example("toggle .open on closest .panel"),
        };
        Some(meta)
    }

    fn input_contract(&self) -> InputContract {
        InputContract::Raw
    }

    /// A selector argument names classes and is not queried
    async fn parse_input(
        &self,
        raw: RawInput<'_>,
        engine: &Engine,
        ctx: &mut ExecutionContext,
    ) -> anyhow::Result<CommandInput> {
        let mut input = CommandInput::default();
        for arg in raw.args {
            let text = match arg {
                AstNode::Selector { value } => value.clone(),
                other => engine.evaluate_value(other, ctx).await?.to_string(),
            };
            input
                .args
                .extend(class_names(&text).into_iter().map(Value::String));
        }
        for keyword in self.keywords() {
            if let Some(node) = raw.modifier(keyword) {
                let target = engine.evaluate_value(node, ctx).await?;
                input.modifiers.insert(keyword.to_string(), target);
            }
        }
        Ok(input)
    }

    fn validate(&self, input: &CommandInput) -> ValidationResult {
        if input.args.is_empty() {
            return ValidationResult::error(
                ValidationErrorKind::MissingArgument,
                "expected at least one class name",
            );
        }
        ValidationResult::ok()
    }

    async fn execute(
        &self,
        input: CommandInput,
        ctx: &mut ExecutionContext,
        engine: &Engine,
    ) -> anyhow::Result<Value> {
        let target = first_modifier(&input.modifiers, self.keywords());
        let elements = target_elements(target, engine, ctx);
        let host = engine.host();
        for node in &elements {
            for class in input.args.iter().filter_map(Value::as_str) {
                match self.op {
                    Op::Add => host.add_class(*node, class),
                    Op::Remove => host.remove_class(*node, class),
                    Op::Toggle if host.has_class(*node, class) => host.remove_class(*node, class),
                    Op::Toggle => host.add_class(*node, class),
                }
            }
        }
        Ok(Value::Array(elements.into_iter().map(Value::Element).collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_names() {
        assert_eq!(class_names(".a.b"), vec!["a", "b"]);
        assert_eq!(class_names("one two"), vec!["one", "two"]);
        assert!(class_names(".").is_empty());
    }
}
