//! Tests for node dispatch, result unwrapping and object literals

use super::super::*;
use super::helpers::{command, ident, lit, parse, run_local, Fixture};
use crate::registry::CommandInput;
use async_trait::async_trait;
use serde_json::json;

/// Returns whatever shape it was given as its first argument
struct Shape;

#[async_trait(?Send)]
impl Command for Shape {
    fn name(&self) -> Option<&str> {
        Some("shape")
    }

    async fn execute(
        &self,
        input: CommandInput,
        _ctx: &mut ExecutionContext,
        _engine: &Engine,
    ) -> anyhow::Result<Value> {
        Ok(input.args.into_iter().next().unwrap_or_default())
    }
}

#[tokio::test]
async fn test_wrapper_results_are_unwrapped_into_it() {
    run_local(async {
        let fx = Fixture::new();
        fx.engine.register_command(Shape).unwrap();

        fx.run(json!({
            "type": "sequence",
            "commands": [
                command("shape", vec![lit(json!({ "result": "x", "wasAsync": true }))]),
                command("record", vec![ident("it")]),
                command("shape", vec![lit(json!({ "value": 5 }))]),
                command("record", vec![ident("it")]),
                command("shape", vec![lit(json!({ "data": [1, 2], "status": 200, "headers": {} }))]),
                command("record", vec![ident("result")]),
            ]
        }))
        .await
        .unwrap();

        assert_eq!(
            fx.logged(),
            vec![Value::from("x"), Value::Number(5.0), Value::Number(1.0)]
        );
    })
    .await;
}

#[tokio::test]
async fn test_untaken_branch_leaves_it_alone() {
    run_local(async {
        let fx = Fixture::new();
        fx.run(json!({
            "type": "sequence",
            "commands": [
                command("record", vec![lit(5)]),
                {
                    "type": "command",
                    "name": "if",
                    "args": [lit(false)],
                    "modifiers": { "then": { "type": "block", "commands": [] } }
                },
                command("record", vec![ident("it")]),
            ]
        }))
        .await
        .unwrap();

        assert_eq!(fx.logged(), vec![Value::Number(5.0), Value::Number(5.0)]);
    })
    .await;
}

#[tokio::test]
async fn test_program_binds_handlers_before_init_blocks() {
    run_local(async {
        let fx = Fixture::new();
        fx.run(json!({
            "type": "program",
            "statements": [
                {
                    "type": "initBlock",
                    "commands": [command("trigger", vec![ident("ping")])]
                },
                {
                    "type": "eventHandler",
                    "event": "ping",
                    "commands": [command("record", vec![lit("pong")])]
                },
                command("record", vec![lit("after")]),
            ]
        }))
        .await
        .unwrap();

        assert_eq!(fx.logged(), vec![Value::from("pong"), Value::from("after")]);
    })
    .await;
}

#[tokio::test]
async fn test_implicit_command_pattern_is_dispatched() {
    run_local(async {
        let fx = Fixture::new();
        fx.run(lit(json!({ "command": "add", "selector": ".active" })))
            .await
            .unwrap();
        assert!(fx.doc.has_class(fx.button, "active"));
    })
    .await;
}

#[tokio::test]
async fn test_object_literal_keys() {
    run_local(async {
        let fx = Fixture::new();
        let node = parse(json!({
            "type": "objectLiteral",
            "properties": [
                { "key": ident("name"), "value": ident("name") },
                { "key": lit("quoted"), "value": lit(1) },
                {
                    "key": { "type": "binary", "operator": "+", "left": lit("a"), "right": lit("b") },
                    "value": lit(true)
                },
            ]
        }));
        let mut ctx = fx.ctx();
        ctx.set_local("name", Value::from("Ada"));

        let value = fx.engine.execute(&node, &mut ctx).await.unwrap();
        assert_eq!(
            value,
            Value::object([
                ("name", Value::from("Ada")),
                ("quoted", Value::Number(1.0)),
                ("ab", Value::Bool(true)),
            ])
        );
    })
    .await;
}

#[tokio::test]
async fn test_nested_object_literals_take_keys_as_written() {
    run_local(async {
        let fx = Fixture::new();
        let entry = json!({
            "type": "objectLiteral",
            "properties": [{ "key": ident("name"), "value": ident("name") }]
        });
        let node = parse(json!({ "type": "array", "elements": [entry.clone(), entry] }));
        let mut ctx = fx.ctx();
        ctx.set_local("name", Value::from("Ada"));

        let value = fx.engine.evaluate_value(&node, &mut ctx).await.unwrap();
        let ada = Value::object([("name", Value::from("Ada"))]);
        assert_eq!(value, Value::Array(vec![ada.clone(), ada]));
    })
    .await;
}

#[tokio::test]
async fn test_written_object_literal_is_not_an_implicit_command() {
    run_local(async {
        let fx = Fixture::new();
        let value = fx
            .run(json!({
                "type": "objectLiteral",
                "properties": [
                    { "key": ident("command"), "value": lit("add") },
                    { "key": ident("selector"), "value": lit(".active") },
                ]
            }))
            .await
            .unwrap();

        assert!(!fx.doc.has_class(fx.button, "active"));
        assert_eq!(
            value,
            Value::object([
                ("command", Value::from("add")),
                ("selector", Value::from(".active")),
            ])
        );
    })
    .await;
}

#[tokio::test]
async fn test_selector_results_feed_first_element_forward() {
    run_local(async {
        let fx = Fixture::new();
        fx.run(json!({
            "type": "sequence",
            "commands": [
                { "type": "selector", "value": "#btn" },
                command("record", vec![ident("it")]),
            ]
        }))
        .await
        .unwrap();

        assert_eq!(fx.logged(), vec![Value::Element(fx.button)]);
    })
    .await;
}

#[tokio::test]
async fn test_invalid_selector_query_is_empty() {
    run_local(async {
        let fx = Fixture::new();
        let value = fx
            .run(json!({ "type": "selector", "value": "invalid[[[" }))
            .await
            .unwrap();
        assert_eq!(value, Value::Array(vec![]));
    })
    .await;
}

#[tokio::test]
async fn test_expressions() {
    run_local(async {
        let fx = Fixture::new();
        fx.engine.globals().borrow_mut().insert("count".into(), Value::Number(4.0));

        let cases = vec![
            (json!({ "type": "binary", "operator": "*", "left": ident("$count"), "right": lit(2) }), Value::Number(8.0)),
            (json!({ "type": "binary", "operator": ">", "left": ident("count"), "right": lit(3) }), Value::Bool(true)),
            (json!({ "type": "binary", "operator": "and", "left": lit(0), "right": lit("never") }), Value::Number(0.0)),
            (json!({ "type": "unary", "operator": "not", "operand": lit("") }), Value::Bool(true)),
            (json!({ "type": "member", "object": lit(json!({ "a": { "b": 3 } })), "property": "a" }), Value::object([("b", Value::Number(3.0))])),
            (json!({ "type": "attribute", "name": "id" }), Value::from("btn")),
            (json!({ "type": "binary", "operator": "matches", "left": ident("me"), "right": lit("button") }), Value::Bool(true)),
        ];

        for (json, expected) in cases {
            let node = parse(json.clone());
            let mut ctx = fx.ctx();
            let value = fx.engine.evaluate_value(&node, &mut ctx).await.unwrap();
            assert_eq!(value, expected, "evaluating {}", json);
        }
    })
    .await;
}

#[tokio::test]
async fn test_statements_are_not_expressions_for_the_evaluator() {
    run_local(async {
        let fx = Fixture::new();
        let ctx = fx.ctx();
        let err = BasicEvaluator::new()
            .evaluate(&AstNode::block(vec![]), &ctx, &fx.engine)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Evaluation failed: 'block' is not an expression");
    })
    .await;
}
