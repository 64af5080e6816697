//! Expression evaluation
//!
//! The engine hands every expression node (literals, identifiers, selectors,
//! operators, object literals) to an [`ExpressionEvaluator`]. Statements never reach it.
//! [`BasicEvaluator`] covers the expression kinds of the AST without
//! suspending; a host embedding a richer expression language swaps in its
//! own evaluator through `EngineBuilder::evaluator`.

use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::warn;

use super::Engine;
use crate::errors::RuntimeError;
use crate::types::{AstNode, ExecutionContext, ObjectProperty, Value};

#[async_trait(?Send)]
pub trait ExpressionEvaluator {
    async fn evaluate(
        &self,
        node: &AstNode,
        ctx: &ExecutionContext,
        engine: &Engine,
    ) -> Result<Value, RuntimeError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct BasicEvaluator;

impl BasicEvaluator {
    pub fn new() -> Self {
        Self
    }

    fn eval(
        &self,
        node: &AstNode,
        ctx: &ExecutionContext,
        engine: &Engine,
    ) -> Result<Value, RuntimeError> {
        match node {
            AstNode::Literal { value } => Ok(Value::from_json(value)),
            AstNode::Identifier { name } => Ok(identifier(name, ctx)),
            AstNode::Selector { value } => Ok(Value::Array(
                engine.query(value).into_iter().map(Value::Element).collect(),
            )),
            AstNode::Attribute { name } => Ok(ctx
                .me_element()
                .and_then(|me| engine.host().get_attribute(me, name))
                .map(Value::String)
                .unwrap_or(Value::Null)),
            AstNode::Member { object, property } => {
                let object = self.eval(object, ctx, engine)?;
                Ok(member(&object, property, engine))
            }
            AstNode::Binary {
                operator,
                left,
                right,
            } => self.binary(operator, left, right, ctx, engine),
            AstNode::Unary { operator, operand } => {
                let value = self.eval(operand, ctx, engine)?;
                match operator.as_str() {
                    "not" | "!" => Ok(Value::Bool(!value.is_truthy())),
                    "no" => Ok(Value::Bool(match &value {
                        Value::Array(items) => items.is_empty(),
                        other => !other.is_truthy(),
                    })),
                    "-" => Ok(value
                        .as_f64()
                        .map(|n| Value::Number(-n))
                        .unwrap_or(Value::Null)),
                    other => Err(RuntimeError::Evaluation(format!(
                        "unknown unary operator '{}'",
                        other
                    ))),
                }
            }
            AstNode::Array { elements } => elements
                .iter()
                .map(|e| self.eval(e, ctx, engine))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            AstNode::ObjectLiteral { properties } => self.object(properties, ctx, engine),
            statement => Err(RuntimeError::Evaluation(format!(
                "'{}' is not an expression",
                statement.kind_name()
            ))),
        }
    }

    /// Build a mapping; keys are taken as written unless they are
    /// computed expressions
    fn object(
        &self,
        properties: &[ObjectProperty],
        ctx: &ExecutionContext,
        engine: &Engine,
    ) -> Result<Value, RuntimeError> {
        let mut map = BTreeMap::new();
        for property in properties {
            let key = match literal_key(&property.key) {
                Some(key) => key,
                None => self.eval(&property.key, ctx, engine)?.to_string(),
            };
            map.insert(key, self.eval(&property.value, ctx, engine)?);
        }
        Ok(Value::Object(map))
    }

    fn binary(
        &self,
        operator: &str,
        left: &AstNode,
        right: &AstNode,
        ctx: &ExecutionContext,
        engine: &Engine,
    ) -> Result<Value, RuntimeError> {
        // Short-circuit before evaluating the right side
        match operator {
            "and" | "&&" => {
                let l = self.eval(left, ctx, engine)?;
                if !l.is_truthy() {
                    return Ok(l);
                }
                return self.eval(right, ctx, engine);
            }
            "or" | "||" => {
                let l = self.eval(left, ctx, engine)?;
                if l.is_truthy() {
                    return Ok(l);
                }
                return self.eval(right, ctx, engine);
            }
            _ => {}
        }

        let l = self.eval(left, ctx, engine)?;
        let r = self.eval(right, ctx, engine)?;
        let numbers = l.as_f64().zip(r.as_f64());

        let value = match operator {
            "+" => match (&l, &r) {
                (Value::String(a), b) => Value::String(format!("{}{}", a, b)),
                (a, Value::String(b)) => Value::String(format!("{}{}", a, b)),
                _ => numbers.map(|(a, b)| Value::Number(a + b)).unwrap_or(Value::Null),
            },
            "-" => numbers.map(|(a, b)| Value::Number(a - b)).unwrap_or(Value::Null),
            "*" => numbers.map(|(a, b)| Value::Number(a * b)).unwrap_or(Value::Null),
            "/" => match numbers {
                Some((a, b)) if b != 0.0 => Value::Number(a / b),
                _ => Value::Null,
            },
            "%" | "mod" => match numbers {
                Some((a, b)) if b != 0.0 => Value::Number(a % b),
                _ => Value::Null,
            },
            "==" | "is" => Value::Bool(loose_eq(&l, &r)),
            "!=" | "is not" => Value::Bool(!loose_eq(&l, &r)),
            "<" | ">" | "<=" | ">=" => {
                let ordering = match (&l, &r) {
                    (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
                    _ => numbers.and_then(|(a, b)| a.partial_cmp(&b)),
                };
                Value::Bool(ordering.map_or(false, |o| match operator {
                    "<" => o == Ordering::Less,
                    ">" => o == Ordering::Greater,
                    "<=" => o != Ordering::Greater,
                    _ => o != Ordering::Less,
                }))
            }
            "matches" => {
                let Some(node) = l.elements().first().copied() else {
                    return Ok(Value::Bool(false));
                };
                let selector = r.to_string();
                match engine.host().matches(node, &selector) {
                    Ok(matched) => Value::Bool(matched),
                    Err(err) => {
                        warn!(error = %err, "Selector match failed");
                        Value::Bool(false)
                    }
                }
            }
            other => {
                return Err(RuntimeError::Evaluation(format!(
                    "unknown operator '{}'",
                    other
                )))
            }
        };
        Ok(value)
    }
}

#[async_trait(?Send)]
impl ExpressionEvaluator for BasicEvaluator {
    async fn evaluate(
        &self,
        node: &AstNode,
        ctx: &ExecutionContext,
        engine: &Engine,
    ) -> Result<Value, RuntimeError> {
        self.eval(node, ctx, engine)
    }
}

/// Keys taken as written: identifiers by name, literals by value
fn literal_key(node: &AstNode) -> Option<String> {
    match node {
        AstNode::Identifier { name } => Some(name.clone()),
        AstNode::Literal { value } => Some(match value {
            serde_json::Value::String(s) => s.clone(),
            other => Value::from_json(other).to_string(),
        }),
        _ => None,
    }
}

fn identifier(name: &str, ctx: &ExecutionContext) -> Value {
    match name {
        "me" | "my" | "I" | "myself" => ctx.me.clone(),
        "it" | "its" => ctx.it.clone(),
        "result" => ctx.result.clone(),
        "you" | "your" => ctx.you.clone(),
        "event" => ctx.event.clone().map(Value::Event).unwrap_or_default(),
        "detail" => ctx
            .event
            .as_ref()
            .map(|e| e.detail().clone())
            .unwrap_or_default(),
        "target" => ctx.locals.get("target").cloned().unwrap_or_else(|| {
            ctx.event
                .as_ref()
                .and_then(|e| e.target_node())
                .map(Value::Element)
                .unwrap_or_default()
        }),
        _ => match name.strip_prefix('$') {
            Some(global) => ctx.global(global).unwrap_or_default(),
            None => ctx.lookup(name).unwrap_or_default(),
        },
    }
}

fn member(object: &Value, property: &str, engine: &Engine) -> Value {
    match (object, property) {
        (Value::Object(map), _) => map.get(property).cloned().unwrap_or_default(),
        (Value::Array(items), "length") => Value::Number(items.len() as f64),
        (Value::Array(items), "first") => items.first().cloned().unwrap_or_default(),
        (Value::Array(items), "last") => items.last().cloned().unwrap_or_default(),
        (Value::String(s), "length") => Value::Number(s.chars().count() as f64),
        (Value::Event(event), _) => event.property(property),
        (Value::Element(node), _) => engine
            .host()
            .get_attribute(*node, property)
            .map(Value::String)
            .unwrap_or(Value::Null),
        _ => Value::Undefined,
    }
}

/// Equality that lets numbers compare with their string forms
fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(n), Value::String(_)) | (Value::String(_), Value::Number(n)) => {
            let other = if matches!(a, Value::Number(_)) { b } else { a };
            other.as_f64() == Some(*n)
        }
        (Value::Null, Value::Undefined) | (Value::Undefined, Value::Null) => true,
        _ => a == b,
    }
}
