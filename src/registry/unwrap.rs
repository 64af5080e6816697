//! Result unwrapping
//!
//! Commands often return a descriptive wrapper instead of a bare value.
//! Before a command's result lands in `it`/`result`, it goes through
//! [`unwrap_result`], which picks the meaningful payload. Rules are checked
//! in this order; the first shape that matches wins:
//!
//! | shape                                      | yields                        |
//! |--------------------------------------------|-------------------------------|
//! | `{result, wasAsync}`                       | `result`                      |
//! | `{result, executed}`                       | `result`                      |
//! | `{lastResult, type}`                       | `lastResult`                  |
//! | `{conditionResult, executedBranch, result?}` | `result`, or no update      |
//! | `{value}` (only key)                       | `value`                       |
//! | `{target, value, targetType}`              | `value`                       |
//! | `{data, status, headers}`                  | `data`                        |
//!
//! A non-empty array is then reduced to its first element, unless the
//! wrapper carried `preserveArrayResult: true`.

use std::collections::BTreeMap;

use crate::types::Value;

/// Outcome of unwrapping a command result
#[derive(Debug, Clone, PartialEq)]
pub enum Unwrapped {
    /// Assign this to `it`/`result`
    Value(Value),
    /// Leave `it`/`result` untouched
    NoUpdate,
}

impl Unwrapped {
    pub fn into_value(self) -> Value {
        match self {
            Unwrapped::Value(v) => v,
            Unwrapped::NoUpdate => Value::Undefined,
        }
    }
}

fn has_all(map: &BTreeMap<String, Value>, keys: &[&str]) -> bool {
    keys.iter().all(|k| map.contains_key(*k))
}

fn field(map: &BTreeMap<String, Value>, key: &str) -> Value {
    map.get(key).cloned().unwrap_or_default()
}

pub fn unwrap_result(value: Value) -> Unwrapped {
    let Value::Object(map) = &value else {
        return Unwrapped::Value(first_of_array(value));
    };

    let payload = if has_all(map, &["result", "wasAsync"]) {
        field(map, "result")
    } else if has_all(map, &["result", "executed"]) {
        let result = field(map, "result");
        if map.get("preserveArrayResult").is_some_and(Value::is_truthy) {
            return Unwrapped::Value(result);
        }
        result
    } else if has_all(map, &["lastResult", "type"]) {
        field(map, "lastResult")
    } else if has_all(map, &["conditionResult", "executedBranch"]) {
        match map.get("result") {
            Some(result) => result.clone(),
            None => return Unwrapped::NoUpdate,
        }
    } else if map.len() == 1 && map.contains_key("value") {
        field(map, "value")
    } else if has_all(map, &["target", "value", "targetType"]) {
        field(map, "value")
    } else if has_all(map, &["data", "status", "headers"]) {
        field(map, "data")
    } else {
        return Unwrapped::Value(value);
    };

    Unwrapped::Value(first_of_array(payload))
}

fn first_of_array(value: Value) -> Value {
    match value {
        Value::Array(mut items) if !items.is_empty() => items.swap_remove(0),
        other => other,
    }
}
