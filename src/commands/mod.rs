//! Builtin commands
//!
//! Each builtin goes through the same [`Command`] contract and adapter as a
//! third-party command; nothing here is special-cased by the engine.

mod classes;
mod conditional;
mod control;
mod install;
mod log;
mod repeat;
mod trigger;
mod variables;
mod wait;

use crate::engine::Engine;
use crate::errors::ConfigError;
use crate::host::NodeId;
use crate::registry::{Command, CommandRegistry};
use crate::types::{AstNode, ExecutionContext, Value};

/// Register every builtin command
pub fn register_builtins(registry: &mut CommandRegistry) -> Result<(), ConfigError> {
    registry.register(control::Halt)?;
    registry.register(control::Exit)?;
    registry.register(control::Return)?;
    registry.register(control::Break)?;
    registry.register(control::Continue)?;
    registry.register(log::Log)?;
    registry.register(variables::Set)?;
    registry.register(variables::Step::increment())?;
    registry.register(variables::Step::decrement())?;
    registry.register(classes::ClassCommand::add())?;
    registry.register(classes::ClassCommand::remove())?;
    registry.register(classes::ClassCommand::toggle())?;
    registry.register(trigger::Trigger::new("trigger"))?;
    registry.register(trigger::Trigger::new("send"))?;
    registry.register(wait::Wait)?;
    registry.register(conditional::If)?;
    registry.register(repeat::Repeat)?;
    registry.register(install::Install)?;
    Ok(())
}

/* ===================== Shared Helpers ===================== */

/// A bare word: an identifier's name or a string literal
fn word(node: &AstNode) -> Option<String> {
    match node {
        AstNode::Identifier { name } => Some(name.clone()),
        AstNode::Literal {
            value: serde_json::Value::String(s),
        } => Some(s.clone()),
        _ => None,
    }
}

/// Elements named by a target value, defaulting to `me`
///
/// Strings are treated as selectors and queried.
fn target_elements(target: Option<&Value>, engine: &Engine, ctx: &ExecutionContext) -> Vec<NodeId> {
    match target {
        Some(Value::String(selector)) => engine.query(selector),
        Some(value) => value.elements(),
        None => ctx.me_element().into_iter().collect(),
    }
}

/// First modifier present among `keywords`
fn first_modifier<'a>(
    modifiers: &'a std::collections::BTreeMap<String, Value>,
    keywords: &[&str],
) -> Option<&'a Value> {
    keywords.iter().find_map(|k| modifiers.get(*k))
}
