//! wait: suspend the current activation
//!
//! Accepts milliseconds as a number or a duration string (`250ms`, `2s`).
//! `it` is carried through unchanged.

use async_trait::async_trait;
use std::time::Duration;

use crate::engine::Engine;
use crate::registry::{
    Command, CommandInput, CommandMetadata, ValidationErrorKind, ValidationResult,
};
use crate::types::{ExecutionContext, Value};

pub struct Wait;

fn duration_of(value: &Value) -> Option<Duration> {
    if let Value::Number(ms) = value {
        return (*ms >= 0.0).then(|| Duration::from_millis(*ms as u64));
    }
    let text = value.as_str()?.trim();
    let (number, scale) = if let Some(ms) = text.strip_suffix("ms") {
        (ms, 1.0)
    } else if let Some(s) = text.strip_suffix('s') {
        (s, 1000.0)
    } else {
        (text, 1.0)
    };
    let ms: f64 = number.trim().parse().ok()?;
    (ms >= 0.0).then(|| Duration::from_millis((ms * scale) as u64))
}

#[async_trait(?Send)]
impl Command for Wait {
    fn metadata(&self) -> Option<CommandMetadata> {
        Some(
            CommandMetadata::new("wait", "Pause before the next command")
                .syntax("wait <duration>")
                .example("wait 200ms"),
        )
    }

    fn validate(&self, input: &CommandInput) -> ValidationResult {
        match input.arg(0) {
            None => ValidationResult::error(ValidationErrorKind::MissingArgument, "missing duration"),
            Some(value) if duration_of(value).is_none() => ValidationResult::error(
                ValidationErrorKind::InvalidArgument,
                format!("'{}' is not a duration", value),
            ),
            Some(_) => ValidationResult::ok(),
        }
    }

    async fn execute(
        &self,
        input: CommandInput,
        ctx: &mut ExecutionContext,
        _engine: &Engine,
    ) -> anyhow::Result<Value> {
        let delay = input
            .arg(0)
            .and_then(duration_of)
            .ok_or_else(|| anyhow::anyhow!("missing duration"))?;
        tokio::time::sleep(delay).await;
        Ok(Value::object([
            ("result", ctx.it.clone()),
            ("wasAsync", Value::Bool(true)),
        ]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_forms() {
        assert_eq!(duration_of(&Value::Number(20.0)), Some(Duration::from_millis(20)));
        assert_eq!(duration_of(&Value::from("250ms")), Some(Duration::from_millis(250)));
        assert_eq!(duration_of(&Value::from("2s")), Some(Duration::from_secs(2)));
        assert_eq!(duration_of(&Value::from("soon")), None);
        assert_eq!(duration_of(&Value::Number(-1.0)), None);
    }
}
