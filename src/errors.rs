//! Error types
//!
//! Control-flow signals are not errors and never get wrapped in a
//! "command failed" message; when one escapes to a caller that cannot handle
//! it, it is reported as `RuntimeError::Signal` so it stays recognizable.

use crate::types::ExecutionSignal;

/// Engine-level failure
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    #[error("Command '{command}' failed: {message}{}", render_suggestions(.suggestions))]
    CommandFailed {
        command: String,
        message: String,
        suggestions: Vec<String>,
    },

    #[error("Evaluation failed: {0}")]
    Evaluation(String),

    #[error("Unhandled control flow signal: {0}")]
    Signal(ExecutionSignal),

    #[error(transparent)]
    Selector(#[from] SelectorError),
}

impl RuntimeError {
    pub fn is_signal(&self) -> bool {
        matches!(self, RuntimeError::Signal(_))
    }

    /// True if this is a `halt` that propagated to the caller
    pub fn is_halt(&self) -> bool {
        matches!(self, RuntimeError::Signal(ExecutionSignal::Halt))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, RuntimeError::Timeout { .. })
    }
}

fn render_suggestions(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        String::new()
    } else {
        format!(" (suggestions: {})", suggestions.join("; "))
    }
}

/// Fatal configuration problems, never retried
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Command registered without a resolvable name")]
    UnnamedCommand,

    #[error("Behavior not found: {0}")]
    BehaviorNotFound(String),

    #[error("Invalid setting '{key}': {reason}")]
    InvalidSetting { key: String, reason: String },

    #[error("Failed to load configuration: {0}")]
    Load(String),
}

/// A selector the host could not parse
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Invalid selector '{selector}': {reason}")]
pub struct SelectorError {
    pub selector: String,
    pub reason: String,
}

impl SelectorError {
    pub fn new(selector: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            reason: reason.into(),
        }
    }
}
