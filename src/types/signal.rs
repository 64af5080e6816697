//! Control-flow signals
//!
//! `halt`, `exit`, `break`, `continue` and `return` are not failures; they
//! describe where execution should go next. Inside the engine they travel in
//! the `Err` arm of a [`SignalResult`] (Result mode), while genuine failures
//! travel in the outer `Result<_, RuntimeError>`:
//!
//! ```text
//! Result<SignalResult, RuntimeError>
//!        |             `-- genuine error, propagated with `?`
//!        `-- Ok(value) | Err(ExecutionSignal)
//! ```
//!
//! Command implementations return `anyhow::Result<Value>` and raise signals
//! as tagged errors (exception mode): `Err(ExecutionSignal::Halt.into())`.
//! [`from_error`] and [`into_error`] convert between the two representations
//! at the adapter boundary.

use serde::Serialize;

use super::values::Value;
use crate::errors::RuntimeError;

/// Control flow intent
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ExecutionSignal {
    #[error("halt")]
    Halt,
    #[error("exit")]
    Exit {
        #[serde(rename = "returnValue", skip_serializing_if = "Option::is_none")]
        return_value: Option<Value>,
    },
    #[error("break")]
    Break,
    #[error("continue")]
    Continue,
    #[error("return")]
    Return {
        #[serde(rename = "returnValue", skip_serializing_if = "Option::is_none")]
        return_value: Option<Value>,
    },
}

/// Result-mode outcome of one evaluation
pub type SignalResult<T = Value> = Result<T, ExecutionSignal>;

impl ExecutionSignal {
    pub fn exit(value: Option<Value>) -> Self {
        ExecutionSignal::Exit {
            return_value: value,
        }
    }

    pub fn returning(value: Option<Value>) -> Self {
        ExecutionSignal::Return {
            return_value: value,
        }
    }

    pub fn is_halt(&self) -> bool {
        matches!(self, ExecutionSignal::Halt)
    }

    pub fn is_exit(&self) -> bool {
        matches!(self, ExecutionSignal::Exit { .. })
    }

    pub fn is_break(&self) -> bool {
        matches!(self, ExecutionSignal::Break)
    }

    pub fn is_continue(&self) -> bool {
        matches!(self, ExecutionSignal::Continue)
    }

    pub fn is_return(&self) -> bool {
        matches!(self, ExecutionSignal::Return { .. })
    }

    /// The value carried by `exit`/`return`, if any
    pub fn return_value(&self) -> Option<&Value> {
        match self {
            ExecutionSignal::Exit { return_value } | ExecutionSignal::Return { return_value } => {
                return_value.as_ref()
            }
            _ => None,
        }
    }
}

/* ===================== Boundary Conversion ===================== */

/// Recover a control-flow signal from a tagged error
///
/// Recognizes a bare `ExecutionSignal` and a `RuntimeError::Signal` that
/// escaped a nested engine call. Anything else is handed back untouched.
pub fn from_error(err: anyhow::Error) -> Result<ExecutionSignal, anyhow::Error> {
    let err = match err.downcast::<ExecutionSignal>() {
        Ok(signal) => return Ok(signal),
        Err(err) => err,
    };
    match err.downcast::<RuntimeError>() {
        Ok(RuntimeError::Signal(signal)) => Ok(signal),
        Ok(other) => Err(anyhow::Error::new(other)),
        Err(err) => Err(err),
    }
}

/// Turn a signal into a tagged error (exception mode)
pub fn into_error(signal: ExecutionSignal) -> anyhow::Error {
    anyhow::Error::new(signal)
}

/// Tagged-error predicate: is this error a control-flow signal?
pub fn is_signal(err: &anyhow::Error) -> bool {
    signal_of(err).is_some()
}

/// Borrow the signal inside a tagged error, if there is one
pub fn signal_of(err: &anyhow::Error) -> Option<&ExecutionSignal> {
    if let Some(signal) = err.downcast_ref::<ExecutionSignal>() {
        return Some(signal);
    }
    match err.downcast_ref::<RuntimeError>() {
        Some(RuntimeError::Signal(signal)) => Some(signal),
        _ => None,
    }
}

/// Lift a Result-mode outcome into exception mode
pub fn into_exception<T>(result: SignalResult<T>) -> anyhow::Result<T> {
    result.map_err(into_error)
}
