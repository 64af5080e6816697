use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use crate::config::RuntimeConfig;
use crate::dom::{Document, NodeSpec};
use crate::engine::{Engine, Severity};
use crate::host::{EventTarget, Host, NullHost};
use crate::types::{AstNode, Value};

#[derive(Parser)]
#[command(name = "lokascript")]
#[command(about = "LokaScript - run hyperscript-style programs against a document", long_about = None)]
pub struct Cli {
    /// Path to config file (overrides LOKASCRIPT_CONFIG_PATH)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Behavior timeout in milliseconds (overrides config file and env vars)
    #[arg(long, global = true)]
    pub behavior_timeout_ms: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a program and print the resulting document and globals
    Run {
        /// Program AST as JSON
        program: PathBuf,

        /// Document to run against (JSON node tree); defaults to an empty body
        #[arg(short = 'd', long = "document")]
        document: Option<PathBuf>,

        /// Events to fire after the program ran, as `event@selector`
        /// (`@window`, `@document`, or no target for the body)
        #[arg(short = 'f', long = "fire")]
        fire: Vec<String>,

        /// Detail attached to every fired event (JSON)
        #[arg(long)]
        detail: Option<String>,

        /// Time to let debounced handlers and timers finish, in milliseconds
        #[arg(long, default_value = "0")]
        settle_ms: u64,

        /// Keep listeners of removed elements
        #[arg(long)]
        no_auto_cleanup: bool,
    },

    /// Report problems in a program without running it
    Check {
        /// Program AST as JSON
        program: PathBuf,
    },

    /// List the builtin commands
    Commands,
}

/// Run the CLI by parsing process arguments
///
/// Must be awaited inside a `tokio::task::LocalSet`.
pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    run_cli_with_args(cli).await
}

/// Run the CLI with provided arguments
pub async fn run_cli_from_args(args: Vec<String>) -> Result<()> {
    let cli = Cli::parse_from(args);
    run_cli_with_args(cli).await
}

async fn run_cli_with_args(cli: Cli) -> Result<()> {
    // Load and validate configuration before doing anything else
    let load_config = |no_auto_cleanup: bool| -> Result<RuntimeConfig> {
        let config = RuntimeConfig::builder()
            .config_path(cli.config.clone())
            .behavior_timeout_ms(cli.behavior_timeout_ms)
            .auto_cleanup(no_auto_cleanup.then_some(false))
            .build()?;
        Ok(config)
    };

    match cli.command {
        Commands::Run {
            ref program,
            ref document,
            ref fire,
            ref detail,
            settle_ms,
            no_auto_cleanup,
        } => {
            let config = load_config(no_auto_cleanup)?;
            let program = read_program(program)?;
            let doc = match document {
                Some(path) => {
                    let spec: NodeSpec = read_json(path)?;
                    Document::from_spec(&spec)
                }
                None => Document::new(),
            };
            let detail = match detail {
                Some(raw) => {
                    let json: serde_json::Value =
                        serde_json::from_str(raw).context("Invalid --detail JSON")?;
                    Value::from_json(&json)
                }
                None => Value::Undefined,
            };

            let host: Rc<dyn Host> = doc.clone();
            let engine = Engine::builder(host).config(config).build()?;

            let mut ctx = engine.context(Some(doc.body()));
            let result = engine.execute(&program, &mut ctx).await?;

            for spec in fire {
                let (event, target) = parse_fire(spec);
                for target in fire_targets(&engine, doc.as_ref(), target) {
                    engine.trigger(target, event, detail.clone()).await;
                }
            }
            if settle_ms > 0 {
                tokio::time::sleep(Duration::from_millis(settle_ms)).await;
            }
            doc.flush_mutations();

            let globals: BTreeMap<String, Value> = engine
                .globals()
                .borrow()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            let output = serde_json::json!({
                "result": result,
                "globals": globals,
                "document": doc.to_spec(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Commands::Check { ref program } => {
            let config = load_config(false)?;
            let program = read_program(program)?;
            let engine = Engine::builder(Rc::new(NullHost::new()))
                .config(config)
                .build()?;

            let diagnostics = engine.check(&program);
            for diagnostic in &diagnostics {
                println!("{}", diagnostic);
            }
            let errors = diagnostics
                .iter()
                .filter(|d| d.severity == Severity::Error)
                .count();
            if errors > 0 {
                anyhow::bail!("{} error(s) found", errors);
            }
            if diagnostics.is_empty() {
                println!("✓ No problems found");
            }
        }

        Commands::Commands => {
            let engine = Engine::new(Rc::new(NullHost::new()))?;
            for name in engine.command_names() {
                match engine.describe_command(&name) {
                    Some(meta) => println!(
                        "  {:<10} {}  ({})",
                        name,
                        meta.description,
                        meta.syntax.as_deref().unwrap_or(&name)
                    ),
                    None => println!("  {}", name),
                }
            }
        }
    }

    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
}

fn read_program(path: &Path) -> Result<AstNode> {
    read_json(path)
}

/// Split `event@target`; a missing target means the body
fn parse_fire(spec: &str) -> (&str, Option<&str>) {
    match spec.split_once('@') {
        Some((event, target)) if !target.is_empty() => (event, Some(target)),
        Some((event, _)) => (event, None),
        None => (spec, None),
    }
}

fn fire_targets(engine: &Engine, doc: &Document, target: Option<&str>) -> Vec<EventTarget> {
    match target {
        None => vec![EventTarget::Node(doc.body())],
        Some("window") => vec![EventTarget::Window],
        Some("document") => vec![EventTarget::Document],
        Some(selector) => engine
            .query(selector)
            .into_iter()
            .map(EventTarget::Node)
            .collect(),
    }
}
