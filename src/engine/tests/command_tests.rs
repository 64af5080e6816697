//! Tests for the builtin commands

use super::super::*;
use super::helpers::{command, ident, lit, run_local, Fixture};
use crate::errors::RuntimeError;
use serde_json::json;

fn with_modifiers(
    name: &str,
    args: Vec<serde_json::Value>,
    modifiers: serde_json::Value,
) -> serde_json::Value {
    json!({ "type": "command", "name": name, "args": args, "modifiers": modifiers })
}

fn block(commands: Vec<serde_json::Value>) -> serde_json::Value {
    json!({ "type": "block", "commands": commands })
}

fn binary(operator: &str, left: serde_json::Value, right: serde_json::Value) -> serde_json::Value {
    json!({ "type": "binary", "operator": operator, "left": left, "right": right })
}

/* ===================== Variables ===================== */

#[tokio::test]
async fn test_set_locals_globals_and_attributes() {
    run_local(async {
        let fx = Fixture::new();
        let node = super::helpers::parse(json!({
            "type": "sequence",
            "commands": [
                with_modifiers("set", vec![ident("x")], json!({ "to": lit(1) })),
                with_modifiers("set", vec![ident("$total")], json!({ "to": lit("all") })),
                with_modifiers(
                    "set",
                    vec![json!({ "type": "attribute", "name": "aria-expanded" })],
                    json!({ "to": lit(true) })
                ),
            ]
        }));
        let mut ctx = fx.ctx();
        fx.engine.execute(&node, &mut ctx).await.unwrap();

        assert_eq!(ctx.locals.get("x"), Some(&Value::Number(1.0)));
        assert_eq!(ctx.global("total"), Some(Value::from("all")));
        assert_eq!(
            fx.doc.get_attribute(fx.button, "aria-expanded"),
            Some("true".to_string())
        );
        // `it` carries the assigned value, not the report
        assert_eq!(ctx.it, Value::Bool(true));
    })
    .await;
}

#[tokio::test]
async fn test_set_attribute_writes_large_numbers_in_full() {
    run_local(async {
        let fx = Fixture::new();
        fx.run(with_modifiers(
            "set",
            vec![json!({ "type": "attribute", "name": "data-n" })],
            json!({ "to": lit(1e20) }),
        ))
        .await
        .unwrap();

        assert_eq!(
            fx.doc.get_attribute(fx.button, "data-n"),
            Some("100000000000000000000".to_string())
        );
    })
    .await;
}

#[tokio::test]
async fn test_set_rejects_selector_targets() {
    run_local(async {
        let fx = Fixture::new();
        let err = fx
            .run(with_modifiers(
                "set",
                vec![json!({ "type": "selector", "value": ".a" })],
                json!({ "to": lit(1) }),
            ))
            .await
            .unwrap_err();

        let RuntimeError::CommandFailed {
            command,
            message,
            suggestions,
        } = err
        else {
            unreachable!("Expected command failure, got {:?}", err);
        };
        assert_eq!(command, "set");
        assert_eq!(message, "cannot assign to a selector");
        assert_eq!(suggestions[0], "set x to 1");
        assert!(suggestions.contains(&"set <target> to <value>".to_string()));
    })
    .await;
}

#[tokio::test]
async fn test_increment_and_decrement() {
    run_local(async {
        let fx = Fixture::new();
        fx.engine
            .globals()
            .borrow_mut()
            .insert("clicks".into(), Value::Number(2.0));

        let node = super::helpers::parse(json!({
            "type": "sequence",
            "commands": [
                command("increment", vec![ident("clicks")]),
                with_modifiers("increment", vec![ident("step")], json!({ "by": lit(5) })),
                with_modifiers("decrement", vec![ident("step")], json!({ "by": lit(2) })),
            ]
        }));
        let mut ctx = fx.ctx();
        fx.engine.execute(&node, &mut ctx).await.unwrap();

        assert_eq!(ctx.global("clicks"), Some(Value::Number(3.0)));
        assert!(!ctx.locals.contains_key("clicks"));
        assert_eq!(ctx.locals.get("step"), Some(&Value::Number(3.0)));
        assert_eq!(ctx.it, Value::Number(3.0));
    })
    .await;
}

#[tokio::test]
async fn test_increment_rejects_non_numeric_amount() {
    run_local(async {
        let fx = Fixture::new();
        let err = fx
            .run(with_modifiers("increment", vec![ident("n")], json!({ "by": lit("lots") })))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("amount must be a number, got string"));
    })
    .await;
}

/* ===================== Classes ===================== */

#[tokio::test]
async fn test_class_commands() {
    run_local(async {
        let fx = Fixture::new();
        let panel = fx.doc.create_element("div");
        fx.doc.set_attribute(panel, "class", "panel");
        fx.doc.append_child(fx.doc.body(), panel);

        fx.run(command("add", vec![json!({ "type": "selector", "value": ".active" })]))
            .await
            .unwrap();
        assert!(fx.doc.has_class(fx.button, "active"));

        fx.run(with_modifiers(
            "add",
            vec![lit("open wide")],
            json!({ "to": { "type": "selector", "value": ".panel" } }),
        ))
        .await
        .unwrap();
        assert!(fx.doc.has_class(panel, "open"));
        assert!(fx.doc.has_class(panel, "wide"));

        fx.run(with_modifiers("remove", vec![lit("wide")], json!({ "from": lit(".panel") })))
            .await
            .unwrap();
        assert!(!fx.doc.has_class(panel, "wide"));

        fx.run(command("toggle", vec![lit("active")])).await.unwrap();
        fx.run(command("toggle", vec![lit("on")])).await.unwrap();
        assert!(!fx.doc.has_class(fx.button, "active"));
        assert!(fx.doc.has_class(fx.button, "on"));
    })
    .await;
}

#[tokio::test]
async fn test_class_command_needs_a_class() {
    run_local(async {
        let fx = Fixture::new();
        let err = fx.run(command("add", vec![])).await.unwrap_err();
        assert!(matches!(err, RuntimeError::CommandFailed { ref command, .. } if command == "add"));
    })
    .await;
}

/* ===================== Events ===================== */

#[tokio::test]
async fn test_trigger_with_detail() {
    run_local(async {
        let fx = Fixture::new();
        fx.run(json!({
            "type": "eventHandler",
            "event": "greet",
            "params": ["name"],
            "commands": [command("record", vec![ident("name")])]
        }))
        .await
        .unwrap();

        let value = fx
            .run(with_modifiers(
                "send",
                vec![ident("greet")],
                json!({
                    "with": {
                        "type": "objectLiteral",
                        "properties": [{ "key": ident("name"), "value": lit("Ada") }]
                    }
                }),
            ))
            .await
            .unwrap();

        assert_eq!(fx.logged(), vec![Value::from("Ada")]);
        let Value::Object(report) = value else {
            unreachable!("Expected trigger report, got {:?}", value);
        };
        assert_eq!(report.get("wasAsync"), Some(&Value::Bool(true)));
        assert!(matches!(report.get("result"), Some(Value::Event(_))));
    })
    .await;
}

#[tokio::test]
async fn test_trigger_on_window() {
    run_local(async {
        let fx = Fixture::new();
        fx.run(json!({
            "type": "eventHandler",
            "event": "resized",
            "target": "window",
            "commands": [command("record", vec![lit("resized")])]
        }))
        .await
        .unwrap();

        fx.run(with_modifiers("trigger", vec![lit("resized")], json!({ "on": ident("window") })))
            .await
            .unwrap();
        assert_eq!(fx.logged(), vec![Value::from("resized")]);
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_wait_preserves_it() {
    run_local(async {
        let fx = Fixture::new();
        let started = tokio::time::Instant::now();
        fx.run(json!({
            "type": "sequence",
            "commands": [
                command("record", vec![lit("before")]),
                command("wait", vec![lit("250ms")]),
                command("record", vec![ident("it")]),
            ]
        }))
        .await
        .unwrap();

        assert!(started.elapsed() >= std::time::Duration::from_millis(250));
        assert_eq!(fx.logged(), vec![Value::from("before"), Value::from("before")]);
    })
    .await;
}

/* ===================== Control Flow ===================== */

#[tokio::test]
async fn test_if_else() {
    run_local(async {
        let fx = Fixture::new();
        for (flag, expected) in [(true, "yes"), (false, "no")] {
            fx.log.borrow_mut().clear();
            let value = fx
                .run(json!({
                    "type": "sequence",
                    "commands": [
                        with_modifiers(
                            "if",
                            vec![lit(flag)],
                            json!({
                                "then": block(vec![command("record", vec![lit("yes")])]),
                                "else": block(vec![command("record", vec![lit("no")])]),
                            })
                        ),
                        command("record", vec![ident("it")]),
                    ]
                }))
                .await
                .unwrap();

            assert_eq!(fx.logged(), vec![Value::from(expected), Value::from(expected)]);
            assert_eq!(value, Value::from(expected));
        }
    })
    .await;
}

#[tokio::test]
async fn test_repeat_times_with_break_and_continue() {
    run_local(async {
        let fx = Fixture::new();
        let value = fx
            .run(with_modifiers(
                "repeat",
                vec![block(vec![
                    with_modifiers(
                        "if",
                        vec![binary("==", ident("index"), lit(1))],
                        json!({ "then": block(vec![command("continue", vec![])]) }),
                    ),
                    with_modifiers(
                        "if",
                        vec![binary("==", ident("index"), lit(3))],
                        json!({ "then": block(vec![command("break", vec![])]) }),
                    ),
                    command("record", vec![ident("index")]),
                ])],
                json!({ "times": lit(5) }),
            ))
            .await
            .unwrap();

        assert_eq!(fx.logged(), vec![Value::Number(0.0), Value::Number(2.0)]);
        assert_eq!(
            value,
            Value::object([
                ("lastResult", Value::Number(2.0)),
                ("type", Value::from("times")),
            ])
        );
    })
    .await;
}

#[tokio::test]
async fn test_repeat_while() {
    run_local(async {
        let fx = Fixture::new();
        let node = super::helpers::parse(json!({
            "type": "sequence",
            "commands": [
                with_modifiers("set", vec![ident("n")], json!({ "to": lit(0) })),
                with_modifiers(
                    "repeat",
                    vec![block(vec![command("increment", vec![ident("n")])])],
                    json!({ "while": binary("<", ident("n"), lit(3)) }),
                ),
            ]
        }));
        let mut ctx = fx.ctx();
        fx.engine.execute(&node, &mut ctx).await.unwrap();

        assert_eq!(ctx.locals.get("n"), Some(&Value::Number(3.0)));
        assert_eq!(ctx.it, Value::Number(3.0));
    })
    .await;
}

#[tokio::test]
async fn test_repeat_needs_times_or_while() {
    run_local(async {
        let fx = Fixture::new();
        let err = fx
            .run(command("repeat", vec![block(vec![])]))
            .await
            .unwrap_err();
        let RuntimeError::CommandFailed {
            message,
            suggestions,
            ..
        } = err
        else {
            unreachable!("Expected command failure, got {:?}", err);
        };
        assert_eq!(message, "expected 'times' or 'while'");
        assert_eq!(
            suggestions,
            vec![
                "repeat 3 times ... end",
                "repeat (<n> times | while <condition>) <commands> end",
                "repeat 3 times increment $n end",
            ]
        );
    })
    .await;
}

#[tokio::test]
async fn test_return_inside_repeat_leaves_the_sequence() {
    run_local(async {
        let fx = Fixture::new();
        let value = fx
            .run(json!({
                "type": "sequence",
                "commands": [
                    with_modifiers(
                        "repeat",
                        vec![block(vec![command("return", vec![ident("index")])])],
                        json!({ "times": lit(3) }),
                    ),
                    command("record", vec![lit("unreachable")]),
                ]
            }))
            .await
            .unwrap();

        assert_eq!(value, Value::Number(0.0));
        assert!(fx.logged().is_empty());
    })
    .await;
}

#[tokio::test]
async fn test_log_yields_first_value() {
    run_local(async {
        let fx = Fixture::new();
        let value = fx
            .run(command("log", vec![lit("hello"), ident("me")]))
            .await
            .unwrap();
        assert_eq!(value, Value::from("hello"));
    })
    .await;
}

#[tokio::test]
async fn test_builtins_describe_themselves() {
    run_local(async {
        let fx = Fixture::new();
        for name in ["set", "increment", "add", "toggle", "send", "wait", "if", "repeat", "install"] {
            assert!(fx.engine.has_command(name), "{} should be registered", name);
            assert!(fx.engine.describe_command(name).is_some(), "{} has no metadata", name);
        }
        assert!(fx.engine.has_command("HALT"));
    })
    .await;
}
