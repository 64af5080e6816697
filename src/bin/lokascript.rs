//! LokaScript CLI
//!
//! Runs AST programs against an in-memory document, checks them statically,
//! and lists the builtin commands.

use lokascript_core::cli;
use tokio::task::LocalSet;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() {
    // LOKASCRIPT_LOG wins over RUST_LOG; warnings only by default
    let filter = EnvFilter::try_from_env("LOKASCRIPT_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let outcome = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(anyhow::Error::from)
        .and_then(|rt| {
            // The engine is single-threaded and spawns local tasks
            let local = LocalSet::new();
            local.block_on(&rt, cli::run_cli())
        });

    if let Err(e) = outcome {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
