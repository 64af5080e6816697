//! Tests for the engine
//!
//! Organized by feature area

mod behavior_tests;
mod command_tests;
mod dispatch_tests;
mod helpers;
mod signal_tests;
