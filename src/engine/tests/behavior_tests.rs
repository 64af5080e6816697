//! Tests for behavior definition and installation

use super::super::*;
use super::helpers::{command, ident, lit, run_local, Fixture};
use crate::errors::RuntimeError;
use maplit::btreemap;
use serde_json::json;

fn counter_behavior() -> serde_json::Value {
    json!({
        "type": "behavior",
        "name": "Counter",
        "parameters": ["start", "step"],
        "initBlock": {
            "type": "block",
            "commands": [command("record", vec![ident("start"), ident("step"), ident("label")])]
        },
        "eventHandlers": [{
            "event": "click",
            "commands": [command("record", vec![ident("start")])]
        }]
    })
}

#[tokio::test]
async fn test_declared_params_default_and_extras_pass_through() {
    run_local(async {
        let fx = Fixture::new();
        fx.run(counter_behavior()).await.unwrap();
        assert!(fx.engine.has_behavior("Counter"));

        fx.engine
            .install_behavior(
                "Counter",
                fx.button,
                btreemap! {
                    "start".to_string() => Value::Number(1.0),
                    "label".to_string() => Value::from("x"),
                },
            )
            .await
            .unwrap();

        assert_eq!(
            fx.logged(),
            vec![Value::Number(1.0), Value::Undefined, Value::from("x")]
        );
    })
    .await;
}

#[tokio::test]
async fn test_installed_handlers_see_params() {
    run_local(async {
        let fx = Fixture::new();
        fx.run(counter_behavior()).await.unwrap();
        fx.engine
            .install_behavior(
                "Counter",
                fx.button,
                btreemap! { "start".to_string() => Value::Number(7.0) },
            )
            .await
            .unwrap();
        fx.log.borrow_mut().clear();

        fx.fire("click", Value::Undefined).await;
        assert_eq!(fx.logged(), vec![Value::Number(7.0)]);
    })
    .await;
}

#[tokio::test]
async fn test_each_install_is_isolated() {
    run_local(async {
        let fx = Fixture::new();
        let other = fx.doc.create_element("div");
        fx.doc.append_child(fx.doc.body(), other);
        fx.run(counter_behavior()).await.unwrap();

        for (element, start) in [(fx.button, 1.0), (other, 2.0)] {
            fx.engine
                .install_behavior(
                    "Counter",
                    element,
                    btreemap! { "start".to_string() => Value::Number(start) },
                )
                .await
                .unwrap();
        }
        fx.log.borrow_mut().clear();

        fx.engine
            .trigger(EventTarget::Node(other), "click", Value::Undefined)
            .await;
        fx.fire("click", Value::Undefined).await;
        assert_eq!(fx.logged(), vec![Value::Number(2.0), Value::Number(1.0)]);
    })
    .await;
}

#[tokio::test]
async fn test_unknown_behavior() {
    run_local(async {
        let fx = Fixture::new();
        let err = fx
            .engine
            .install_behavior("Missing", fx.button, Default::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::Config(ConfigError::BehaviorNotFound(ref name)) if name == "Missing"
        ));
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_slow_init_times_out_and_attaches_nothing() {
    run_local(async {
        let fx = Fixture::with_config(RuntimeConfig {
            behavior_timeout_ms: 50,
            ..Default::default()
        });
        fx.run(json!({
            "type": "behavior",
            "name": "Sluggish",
            "initBlock": { "type": "block", "commands": [command("wait", vec![lit("1s")])] },
            "eventHandlers": [{ "event": "click", "commands": [] }]
        }))
        .await
        .unwrap();

        let err = fx
            .engine
            .install_behavior("Sluggish", fx.button, Default::default())
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "behavior 'Sluggish' init timed out after 50ms");
        assert_eq!(fx.doc.listener_count(EventTarget::Node(fx.button)), 0);
    })
    .await;
}

#[tokio::test]
async fn test_halt_in_init_aborts_install() {
    run_local(async {
        let fx = Fixture::new();
        fx.run(json!({
            "type": "behavior",
            "name": "Refuses",
            "initBlock": { "type": "block", "commands": [command("halt", vec![])] },
            "eventHandlers": [{ "event": "click", "commands": [] }]
        }))
        .await
        .unwrap();

        let err = fx
            .engine
            .install_behavior("Refuses", fx.button, Default::default())
            .await
            .unwrap_err();
        assert!(err.is_halt());
        assert_eq!(fx.doc.listener_count(EventTarget::Node(fx.button)), 0);
    })
    .await;
}

#[tokio::test]
async fn test_install_command() {
    run_local(async {
        let fx = Fixture::new();
        fx.run(counter_behavior()).await.unwrap();

        fx.run(json!({
            "type": "command",
            "name": "install",
            "args": [ident("Counter")],
            "modifiers": {
                "with": {
                    "type": "objectLiteral",
                    "properties": [{ "key": ident("start"), "value": lit(3) }]
                },
                "on": { "type": "selector", "value": "#btn" }
            }
        }))
        .await
        .unwrap();
        fx.log.borrow_mut().clear();

        fx.fire("click", Value::Undefined).await;
        assert_eq!(fx.logged(), vec![Value::Number(3.0)]);
    })
    .await;
}

#[tokio::test]
async fn test_install_command_reports_missing_behavior() {
    run_local(async {
        let fx = Fixture::new();
        let err = fx
            .run(command("install", vec![ident("Nowhere")]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Behavior not found: Nowhere"));
    })
    .await;
}
