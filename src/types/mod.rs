//! Type definitions for the runtime
//!
//! This module contains all the core types threaded through execution:
//! - AST nodes (AstNode, CommandNode, EventHandlerNode, BehaviorNode)
//! - Runtime values (Value)
//! - Control flow (ExecutionSignal, SignalResult)
//! - Execution context (ExecutionContext, Globals)
//! - Host events (Event)

use std::future::Future;
use std::pin::Pin;

pub mod ast;
pub mod context;
pub mod event;
pub mod signal;
pub mod values;

// Re-export all types for convenient access
pub use ast::{
    AstNode, BehaviorNode, CommandNode, EventHandlerNode, EventModifiers, ObjectProperty,
    RateLimit, WatchSpec,
};
pub use context::{ExecutionContext, Globals};
pub use event::{Event, EventId};
pub use signal::{ExecutionSignal, SignalResult};
pub use values::Value;

/// Boxed, non-`Send` future used for async recursion through the dispatcher.
///
/// The runtime is single-threaded (it runs inside a `tokio::task::LocalSet`),
/// so none of the futures it produces need to cross threads.
pub type LocalBoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;
