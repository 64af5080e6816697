//! Static program checks
//!
//! A walk over the AST that reports problems visible without running
//! anything. Nothing here mutates the engine.

use serde::Serialize;
use std::fmt;

use crate::registry::CommandRegistry;
use crate::types::{AstNode, EventHandlerNode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {}", label, self.message)
    }
}

/// Report unknown commands, empty behaviors and unknown event sources
pub fn check_program(
    program: &AstNode,
    registry: &CommandRegistry,
    sources: &[String],
) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    walk(program, registry, sources, &mut diagnostics);
    diagnostics
}

fn walk(node: &AstNode, registry: &CommandRegistry, sources: &[String], out: &mut Vec<Diagnostic>) {
    match node {
        AstNode::Command(cmd) if !registry.has(&cmd.name) => out.push(Diagnostic {
            severity: Severity::Error,
            message: format!("unknown command '{}'", cmd.name),
        }),
        AstNode::EventHandler(handler) => check_handler(handler, sources, out),
        AstNode::Behavior(behavior) => {
            if behavior.event_handlers.is_empty() && behavior.init_block.is_none() {
                out.push(Diagnostic {
                    severity: Severity::Warning,
                    message: format!(
                        "behavior '{}' has no event handlers or init block",
                        behavior.name
                    ),
                });
            }
            for handler in &behavior.event_handlers {
                check_handler(handler, sources, out);
            }
        }
        _ => {}
    }

    for child in node.children() {
        walk(child, registry, sources, out);
    }
}

fn check_handler(handler: &EventHandlerNode, sources: &[String], out: &mut Vec<Diagnostic>) {
    if let Some(source) = &handler.source {
        if !sources.contains(source) {
            out.push(Diagnostic {
                severity: Severity::Warning,
                message: format!(
                    "'{}' handler uses unknown event source '{}'",
                    handler.event, source
                ),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BehaviorNode, EventHandlerNode};

    #[test]
    fn test_reports_unknown_commands_in_nested_bodies() {
        let registry = CommandRegistry::new();
        let handler = EventHandlerNode::new("click", vec![AstNode::command("frobnicate", vec![])]);
        let program = AstNode::Program {
            statements: vec![AstNode::EventHandler(handler)],
        };

        let diagnostics = check_program(&program, &registry, &[]);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].severity, Severity::Error);
        assert_eq!(diagnostics[0].to_string(), "error: unknown command 'frobnicate'");
    }

    #[test]
    fn test_warns_on_empty_behavior_and_unknown_source() {
        let registry = CommandRegistry::new();
        let mut handler = EventHandlerNode::new("tick", vec![]);
        handler.source = Some("clock".into());
        let program = AstNode::Program {
            statements: vec![
                AstNode::Behavior(BehaviorNode {
                    name: "Empty".into(),
                    parameters: vec![],
                    event_handlers: vec![],
                    init_block: None,
                }),
                AstNode::EventHandler(handler),
            ],
        };

        let diagnostics = check_program(&program, &registry, &[]);
        assert_eq!(diagnostics.len(), 2);
        assert!(diagnostics.iter().all(|d| d.severity == Severity::Warning));

        let known = check_program(&program, &registry, &["clock".to_string()]);
        assert_eq!(known.len(), 1);
    }
}
