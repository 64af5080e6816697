//! Abstract Syntax Tree node types
//!
//! The parser produces these; the engine only reads them. Nodes are tagged
//! by a `type` field in their JSON form:
//!
//! ```json
//! { "type": "command", "name": "add", "args": [{ "type": "selector", "value": ".active" }] }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// AST node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AstNode {
    Command(CommandNode),
    EventHandler(EventHandlerNode),
    Behavior(BehaviorNode),
    Program {
        #[serde(default)]
        statements: Vec<AstNode>,
    },
    Block {
        #[serde(default)]
        commands: Vec<AstNode>,
    },
    InitBlock {
        #[serde(default)]
        commands: Vec<AstNode>,
    },
    #[serde(alias = "CommandSequence")]
    Sequence {
        #[serde(default)]
        commands: Vec<AstNode>,
    },
    ObjectLiteral {
        #[serde(default)]
        properties: Vec<ObjectProperty>,
    },

    /* Expression kinds, handed to the expression evaluator */
    Literal {
        value: serde_json::Value,
    },
    Identifier {
        name: String,
    },
    Selector {
        value: String,
    },
    /// `@name` attribute of `me`
    Attribute {
        name: String,
    },
    Member {
        object: Box<AstNode>,
        property: String,
    },
    Binary {
        operator: String,
        left: Box<AstNode>,
        right: Box<AstNode>,
    },
    Unary {
        operator: String,
        operand: Box<AstNode>,
    },
    Array {
        #[serde(default)]
        elements: Vec<AstNode>,
    },
}

impl AstNode {
    /// Node type name as it appears in the `type` tag
    pub fn kind_name(&self) -> &'static str {
        match self {
            AstNode::Command(_) => "command",
            AstNode::EventHandler(_) => "eventHandler",
            AstNode::Behavior(_) => "behavior",
            AstNode::Program { .. } => "program",
            AstNode::Block { .. } => "block",
            AstNode::InitBlock { .. } => "initBlock",
            AstNode::Sequence { .. } => "sequence",
            AstNode::ObjectLiteral { .. } => "objectLiteral",
            AstNode::Literal { .. } => "literal",
            AstNode::Identifier { .. } => "identifier",
            AstNode::Selector { .. } => "selector",
            AstNode::Attribute { .. } => "attribute",
            AstNode::Member { .. } => "member",
            AstNode::Binary { .. } => "binary",
            AstNode::Unary { .. } => "unary",
            AstNode::Array { .. } => "array",
        }
    }

    /// Convenience constructor for a command node
    pub fn command(name: impl Into<String>, args: Vec<AstNode>) -> Self {
        AstNode::Command(CommandNode {
            name: name.into(),
            args,
            modifiers: BTreeMap::new(),
        })
    }

    pub fn literal(value: impl Into<serde_json::Value>) -> Self {
        AstNode::Literal {
            value: value.into(),
        }
    }

    pub fn ident(name: impl Into<String>) -> Self {
        AstNode::Identifier { name: name.into() }
    }

    pub fn selector(value: impl Into<String>) -> Self {
        AstNode::Selector {
            value: value.into(),
        }
    }

    pub fn sequence(commands: Vec<AstNode>) -> Self {
        AstNode::Sequence { commands }
    }

    pub fn block(commands: Vec<AstNode>) -> Self {
        AstNode::Block { commands }
    }

    /// Nested nodes, in source order (used by static checks)
    pub fn children(&self) -> Vec<&AstNode> {
        match self {
            AstNode::Command(cmd) => cmd.args.iter().chain(cmd.modifiers.values()).collect(),
            AstNode::EventHandler(handler) => handler.commands.iter().collect(),
            AstNode::Behavior(behavior) => behavior
                .event_handlers
                .iter()
                .flat_map(|h| h.commands.iter())
                .chain(behavior.init_block.as_deref())
                .collect(),
            AstNode::Program { statements } => statements.iter().collect(),
            AstNode::Block { commands }
            | AstNode::InitBlock { commands }
            | AstNode::Sequence { commands } => commands.iter().collect(),
            AstNode::ObjectLiteral { properties } => properties
                .iter()
                .flat_map(|p| [&p.key, &p.value])
                .collect(),
            AstNode::Member { object, .. } => vec![object.as_ref()],
            AstNode::Binary { left, right, .. } => vec![left.as_ref(), right.as_ref()],
            AstNode::Unary { operand, .. } => vec![operand.as_ref()],
            AstNode::Array { elements } => elements.iter().collect(),
            AstNode::Literal { .. }
            | AstNode::Identifier { .. }
            | AstNode::Selector { .. }
            | AstNode::Attribute { .. } => Vec::new(),
        }
    }
}

/// A command invocation with raw, unevaluated arguments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandNode {
    pub name: String,
    #[serde(default)]
    pub args: Vec<AstNode>,
    /// Keyword-introduced arguments (`to`, `from`, `on`, `with`, ...)
    #[serde(default)]
    pub modifiers: BTreeMap<String, AstNode>,
}

impl CommandNode {
    pub fn with_modifier(mut self, keyword: impl Into<String>, node: AstNode) -> Self {
        self.modifiers.insert(keyword.into(), node);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventHandlerNode {
    pub event: String,
    /// Additional event names bound to the same body
    #[serde(default)]
    pub events: Vec<String>,
    /// `window`, `document`, `me`, a local variable name, or a CSS selector
    #[serde(default)]
    pub target: Option<String>,
    /// Delegation selector matched against `event.target` and its ancestors
    #[serde(default)]
    pub selector: Option<String>,
    #[serde(default)]
    pub modifiers: EventModifiers,
    /// Names hydrated from the event into locals (`on click(clientX)`)
    #[serde(default)]
    pub params: Vec<String>,
    #[serde(default)]
    pub commands: Vec<AstNode>,
    #[serde(default)]
    pub watch: Option<WatchSpec>,
    /// Name of an injected custom event source
    #[serde(default)]
    pub source: Option<String>,
}

impl EventHandlerNode {
    pub fn new(event: impl Into<String>, commands: Vec<AstNode>) -> Self {
        Self {
            event: event.into(),
            events: Vec::new(),
            target: None,
            selector: None,
            modifiers: EventModifiers::default(),
            params: Vec::new(),
            commands,
            watch: None,
            source: None,
        }
    }

    /// Every event name this handler listens for
    pub fn event_names(&self) -> Vec<&str> {
        let mut names = vec![self.event.as_str()];
        for extra in &self.events {
            if !names.contains(&extra.as_str()) {
                names.push(extra);
            }
        }
        names
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventModifiers {
    #[serde(default)]
    pub prevent: bool,
    #[serde(default)]
    pub stop: bool,
    #[serde(default)]
    pub once: bool,
    #[serde(default)]
    pub debounce: Option<u64>,
    #[serde(default)]
    pub throttle: Option<u64>,
}

/// Rate limiting applied to a binding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimit {
    /// Trailing edge: run once after `ms` of quiet
    Debounce(u64),
    /// Leading edge: run, then ignore firings for `ms`
    Throttle(u64),
}

impl EventModifiers {
    /// The single rate limit in effect; debounce wins if both are given
    pub fn rate_limit(&self) -> Option<RateLimit> {
        match (self.debounce, self.throttle) {
            (Some(ms), _) => Some(RateLimit::Debounce(ms)),
            (None, Some(ms)) => Some(RateLimit::Throttle(ms)),
            (None, None) => None,
        }
    }
}

/// Specialized bindings that observe mutations instead of listening
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum WatchSpec {
    /// Changes of one attribute on the handler's owner
    Attribute { name: String },
    /// Child list / text changes of another element
    Content { target: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BehaviorNode {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<String>,
    #[serde(default)]
    pub event_handlers: Vec<EventHandlerNode>,
    #[serde(default)]
    pub init_block: Option<Box<AstNode>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectProperty {
    pub key: AstNode,
    pub value: AstNode,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_node_from_json() {
        let json = r#"{
            "type": "command",
            "name": "add",
            "args": [{ "type": "selector", "value": ".active" }],
            "modifiers": { "to": { "type": "identifier", "name": "me" } }
        }"#;

        let node: AstNode = serde_json::from_str(json).unwrap();
        let AstNode::Command(cmd) = node else {
            unreachable!("Expected command node, got {:?}", node);
        };
        assert_eq!(cmd.name, "add");
        assert_eq!(cmd.args, vec![AstNode::selector(".active")]);
        assert_eq!(cmd.modifiers.get("to"), Some(&AstNode::ident("me")));
    }

    #[test]
    fn test_command_sequence_alias() {
        let json = r#"{ "type": "CommandSequence", "commands": [] }"#;
        let node: AstNode = serde_json::from_str(json).unwrap();
        assert_eq!(node, AstNode::sequence(vec![]));
    }

    #[test]
    fn test_event_handler_defaults() {
        let json = r#"{
            "type": "eventHandler",
            "event": "click",
            "modifiers": { "debounce": 100, "throttle": 50 },
            "commands": []
        }"#;
        let node: AstNode = serde_json::from_str(json).unwrap();
        let AstNode::EventHandler(handler) = node else {
            unreachable!("Expected event handler");
        };
        assert_eq!(handler.target, None);
        assert_eq!(handler.modifiers.rate_limit(), Some(RateLimit::Debounce(100)));
    }

    #[test]
    fn test_watch_spec_tagging() {
        let json = r#"{ "kind": "attribute", "name": "data-state" }"#;
        let watch: WatchSpec = serde_json::from_str(json).unwrap();
        assert_eq!(
            watch,
            WatchSpec::Attribute {
                name: "data-state".into()
            }
        );
    }

    #[test]
    fn test_event_names_deduplicates() {
        let mut handler = EventHandlerNode::new("click", vec![]);
        handler.events = vec!["click".into(), "keyup".into()];
        assert_eq!(handler.event_names(), vec!["click", "keyup"]);
    }
}
