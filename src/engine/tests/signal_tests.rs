//! Tests for control-flow signals crossing sequences, blocks and commands

use super::super::*;
use super::helpers::{command, ident, lit, parse, run_local, Fixture};
use crate::errors::RuntimeError;
use crate::registry::CommandInput;
use crate::types::{signal, ExecutionSignal};
use async_trait::async_trait;
use serde_json::json;

#[tokio::test]
async fn test_halt_stops_sequence_and_reaches_caller() {
    run_local(async {
        let fx = Fixture::new();
        let result = fx
            .run(json!({
                "type": "sequence",
                "commands": [
                    command("record", vec![lit(1)]),
                    command("record", vec![lit(2)]),
                    command("halt", vec![]),
                    command("record", vec![lit(3)]),
                ]
            }))
            .await;

        let err = result.unwrap_err();
        assert!(err.is_halt());
        assert_eq!(fx.logged(), vec![Value::Number(1.0), Value::Number(2.0)]);
    })
    .await;
}

#[tokio::test]
async fn test_return_sets_it_and_short_circuits() {
    run_local(async {
        let fx = Fixture::new();
        let node = parse(json!({
            "type": "sequence",
            "commands": [
                command("record", vec![lit(1)]),
                command("return", vec![lit(42)]),
                command("record", vec![lit(3)]),
            ]
        }));
        let mut ctx = fx.ctx();

        let value = fx.engine.execute(&node, &mut ctx).await.unwrap();
        assert_eq!(value, Value::Number(42.0));
        assert_eq!(ctx.it, Value::Number(42.0));
        assert_eq!(ctx.result, Value::Number(42.0));
        assert_eq!(fx.logged(), vec![Value::Number(1.0)]);
    })
    .await;
}

#[tokio::test]
async fn test_exit_stops_silently() {
    run_local(async {
        let fx = Fixture::new();
        let value = fx
            .run(json!({
                "type": "sequence",
                "commands": [
                    command("record", vec![lit("kept")]),
                    command("exit", vec![]),
                    command("record", vec![lit("skipped")]),
                ]
            }))
            .await
            .unwrap();

        assert_eq!(value, Value::from("kept"));
        assert_eq!(fx.logged(), vec![Value::from("kept")]);
    })
    .await;
}

#[tokio::test]
async fn test_block_hands_exit_to_enclosing_sequence() {
    run_local(async {
        let fx = Fixture::new();
        fx.run(json!({
            "type": "sequence",
            "commands": [
                {
                    "type": "block",
                    "commands": [
                        command("record", vec![lit(1)]),
                        command("exit", vec![]),
                        command("record", vec![lit(2)]),
                    ]
                },
                command("record", vec![lit(3)]),
            ]
        }))
        .await
        .unwrap();

        assert_eq!(fx.logged(), vec![Value::Number(1.0)]);
    })
    .await;
}

#[tokio::test]
async fn test_return_inside_branch_leaves_the_handler_body() {
    run_local(async {
        let fx = Fixture::new();
        let value = fx
            .run(json!({
                "type": "sequence",
                "commands": [
                    {
                        "type": "command",
                        "name": "if",
                        "args": [lit(true)],
                        "modifiers": {
                            "then": { "type": "block", "commands": [command("return", vec![lit("early")])] }
                        }
                    },
                    command("record", vec![lit("late")]),
                ]
            }))
            .await
            .unwrap();

        assert_eq!(value, Value::from("early"));
        assert!(fx.logged().is_empty());
    })
    .await;
}

#[tokio::test]
async fn test_stray_loop_signal_is_dropped_at_the_top() {
    run_local(async {
        let fx = Fixture::new();
        let value = fx.run(command("break", vec![])).await.unwrap();
        assert_eq!(value, Value::Undefined);
    })
    .await;
}

#[tokio::test]
async fn test_unknown_command_is_an_error_not_a_signal() {
    run_local(async {
        let fx = Fixture::new();
        let err = fx.run(command("frobnicate", vec![ident("me")])).await.unwrap_err();
        assert!(matches!(err, RuntimeError::UnknownCommand(ref name) if name == "frobnicate"));
        assert!(!err.is_signal());
    })
    .await;
}

struct Explode;

#[async_trait(?Send)]
impl Command for Explode {
    fn metadata(&self) -> Option<CommandMetadata> {
        Some(
            CommandMetadata::new("explode", "Always fails")
                .syntax("explode <what>")
                .example("explode 'boiler'"),
        )
    }

    async fn execute(
        &self,
        input: CommandInput,
        _ctx: &mut ExecutionContext,
        _engine: &Engine,
    ) -> anyhow::Result<Value> {
        anyhow::bail!("{} is on fire", input.args.first().cloned().unwrap_or_default())
    }
}

/// Raises a signal wrapped in extra context, as a nested helper would
struct WrappedHalt;

#[async_trait(?Send)]
impl Command for WrappedHalt {
    fn name(&self) -> Option<&str> {
        Some("wrappedHalt")
    }

    async fn execute(
        &self,
        _input: CommandInput,
        _ctx: &mut ExecutionContext,
        _engine: &Engine,
    ) -> anyhow::Result<Value> {
        Err(signal::into_error(ExecutionSignal::Halt).context("while wrapping"))
    }
}

#[tokio::test]
async fn test_command_failure_carries_name_and_suggestions() {
    run_local(async {
        let fx = Fixture::new();
        fx.engine.register_command(Explode).unwrap();

        let err = fx
            .run(command("explode", vec![lit("boiler")]))
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
        assert_eq!(command, "explode");
        assert_eq!(message, "boiler is on fire");
        assert_eq!(suggestions, vec!["explode <what>", "explode 'boiler'"]);
    })
    .await;
}

#[tokio::test]
async fn test_signals_are_never_wrapped_as_failures() {
    run_local(async {
        let fx = Fixture::new();
        fx.engine.register_command(WrappedHalt).unwrap();

        let err = fx
            .run(json!({
                "type": "sequence",
                "commands": [command("wrappedHalt", vec![]), command("record", vec![lit(1)])]
            }))
            .await
            .unwrap_err();
        assert!(err.is_halt());
        assert!(fx.logged().is_empty());
    })
    .await;
}

#[tokio::test]
async fn test_exception_and_result_modes_agree() {
    run_local(async {
        let fx = Fixture::new();
        let node = parse(command("return", vec![lit(7)]));

        let mut ctx = fx.ctx();
        let result_mode = fx.engine.execute_signal(&node, &mut ctx).await.unwrap();
        assert_eq!(
            result_mode,
            Err(ExecutionSignal::returning(Some(Value::Number(7.0))))
        );

        let mut ctx = fx.ctx();
        let raised = fx.engine.execute_raising(&node, &mut ctx).await.unwrap_err();
        let recovered = signal::from_error(raised).unwrap();
        assert_eq!(result_mode, Err(recovered));
    })
    .await;
}
