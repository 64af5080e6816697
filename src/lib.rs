pub mod cleanup;
pub mod cli;
pub mod commands;
pub mod config;
pub mod dom;
pub mod engine;
pub mod errors;
pub mod hooks;
pub mod host;
pub mod registry;
pub mod types;

// Re-export main types
pub use types::*;

pub use config::RuntimeConfig;
pub use engine::{Engine, EngineBuilder, EventSource, ExpressionEvaluator, Subscription};
pub use errors::{ConfigError, RuntimeError};
pub use hooks::{CommandHooks, HookContext};
pub use host::{EventTarget, Host, NodeId};
pub use registry::{Command, CommandInput, CommandMetadata};
