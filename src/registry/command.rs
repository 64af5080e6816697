//! Command contract
//!
//! Every command, builtin or third-party, implements [`Command`]. The engine
//! never interprets command-specific grammar; it hands the raw argument nodes
//! and keyword modifiers to the command (or evaluates them positionally for
//! commands using the evaluated contract) and runs the result through the
//! adapter.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::engine::Engine;
use crate::types::{AstNode, ExecutionContext, Value};

/// Descriptive metadata, used for registration, help and error suggestions
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CommandMetadata {
    pub name: String,
    pub description: String,
    pub syntax: Option<String>,
    pub examples: Vec<String>,
}

impl CommandMetadata {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            ..Self::default()
        }
    }

    pub fn syntax(mut self, syntax: impl Into<String>) -> Self {
        self.syntax = Some(syntax.into());
        self
    }

    pub fn example(mut self, example: impl Into<String>) -> Self {
        self.examples.push(example.into());
        self
    }

    /// Usage hints attached to failures: the syntax string, then the first example
    pub fn suggestions(&self) -> Vec<String> {
        self.syntax
            .iter()
            .chain(self.examples.first())
            .cloned()
            .collect()
    }
}

/// How a command receives its arguments
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InputContract {
    /// Arguments and modifiers are evaluated by the adapter, in order
    #[default]
    Evaluated,
    /// The command's own `parse_input` sees the raw nodes
    Raw,
}

/// Unevaluated arguments of one invocation
#[derive(Debug, Clone, Copy)]
pub struct RawInput<'a> {
    pub args: &'a [AstNode],
    pub modifiers: &'a BTreeMap<String, AstNode>,
}

impl<'a> RawInput<'a> {
    pub fn arg(&self, index: usize) -> Option<&'a AstNode> {
        self.args.get(index)
    }

    pub fn modifier(&self, keyword: &str) -> Option<&'a AstNode> {
        self.modifiers.get(keyword)
    }
}

/// Parsed input handed to `validate` and `execute`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandInput {
    pub args: Vec<Value>,
    pub modifiers: BTreeMap<String, Value>,
    /// Nodes the command runs itself (branch bodies, loop conditions)
    pub deferred: BTreeMap<String, AstNode>,
}

impl CommandInput {
    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }

    pub fn modifier(&self, keyword: &str) -> Option<&Value> {
        self.modifiers.get(keyword)
    }

    pub fn deferred(&self, key: &str) -> Option<&AstNode> {
        self.deferred.get(key)
    }
}

/* ===================== Validation ===================== */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValidationErrorKind {
    MissingArgument,
    InvalidArgument,
    TypeMismatch,
    UnknownCommand,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationError {
    #[serde(rename = "type")]
    pub kind: ValidationErrorKind,
    pub message: String,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }

    pub fn error(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            valid: false,
            errors: vec![ValidationError {
                kind,
                message: message.into(),
                suggestions: Vec::new(),
            }],
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        if let Some(last) = self.errors.last_mut() {
            last.suggestions.push(suggestion.into());
        }
        self
    }

    /// Joined messages of every error
    pub fn message(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.message.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }

    pub fn suggestions(&self) -> Vec<String> {
        self.errors
            .iter()
            .flat_map(|e| e.suggestions.iter().cloned())
            .collect()
    }
}

/* ===================== Command Trait ===================== */

/// A command implementation
///
/// Only `execute` is required. A command registered without either a
/// `name` or `metadata` is rejected at registration.
#[async_trait(?Send)]
pub trait Command {
    fn name(&self) -> Option<&str> {
        None
    }

    fn metadata(&self) -> Option<CommandMetadata> {
        None
    }

    fn input_contract(&self) -> InputContract {
        InputContract::Evaluated
    }

    /// Turn raw nodes into input (only called for [`InputContract::Raw`])
    ///
    /// The default evaluates every argument and modifier, the same way the
    /// evaluated contract does.
    async fn parse_input(
        &self,
        raw: RawInput<'_>,
        engine: &Engine,
        ctx: &mut ExecutionContext,
    ) -> anyhow::Result<CommandInput> {
        evaluate_input(raw, engine, ctx).await
    }

    fn validate(&self, _input: &CommandInput) -> ValidationResult {
        ValidationResult::ok()
    }

    /// Run the command
    ///
    /// Control flow is raised as a tagged error:
    /// `Err(ExecutionSignal::Halt.into())`.
    async fn execute(
        &self,
        input: CommandInput,
        ctx: &mut ExecutionContext,
        engine: &Engine,
    ) -> anyhow::Result<Value>;
}

/// Evaluate every argument and modifier in source order
pub async fn evaluate_input(
    raw: RawInput<'_>,
    engine: &Engine,
    ctx: &mut ExecutionContext,
) -> anyhow::Result<CommandInput> {
    let mut input = CommandInput::default();
    for node in raw.args {
        input.args.push(engine.evaluate_value(node, ctx).await?);
    }
    for (keyword, node) in raw.modifiers {
        let value = engine.evaluate_value(node, ctx).await?;
        input.modifiers.insert(keyword.clone(), value);
    }
    Ok(input)
}
