//! Command registry
//!
//! Maps command names (case-insensitive) to adapters. Entries are either
//! eager, holding a ready command, or lazy, holding a factory that builds
//! the command on first lookup:
//!
//! ```text
//! CommandRegistry
//! ├── "add"    -> Eager(CommandAdapter)
//! └── "fetch"  -> Lazy(factory, OnceCell<CommandAdapter>)
//! ```

mod adapter;
mod command;
mod unwrap;

pub use adapter::CommandAdapter;
pub use command::{
    evaluate_input, Command, CommandInput, CommandMetadata, InputContract, RawInput,
    ValidationError, ValidationErrorKind, ValidationResult,
};
pub use unwrap::{unwrap_result, Unwrapped};

use std::cell::OnceCell;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::debug;

use crate::errors::ConfigError;

type CommandFactory = Box<dyn Fn() -> Rc<dyn Command>>;

enum Entry {
    Eager(Rc<CommandAdapter>),
    Lazy {
        name: String,
        factory: CommandFactory,
        adapter: OnceCell<Rc<CommandAdapter>>,
    },
}

impl Entry {
    fn adapter(&self) -> Rc<CommandAdapter> {
        match self {
            Entry::Eager(adapter) => Rc::clone(adapter),
            Entry::Lazy {
                name,
                factory,
                adapter,
            } => Rc::clone(adapter.get_or_init(|| {
                debug!(command = %name, "Building lazy command");
                Rc::new(CommandAdapter::new(name.clone(), factory()))
            })),
        }
    }

    fn is_built(&self) -> bool {
        match self {
            Entry::Eager(_) => true,
            Entry::Lazy { adapter, .. } => adapter.get().is_some(),
        }
    }
}

#[derive(Default)]
pub struct CommandRegistry {
    entries: HashMap<String, Entry>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a command under its own name
    ///
    /// The name comes from `Command::name`, falling back to the metadata
    /// name. A command with neither is a configuration error. Registering a
    /// name twice replaces the earlier entry.
    pub fn register<C: Command + 'static>(&mut self, command: C) -> Result<(), ConfigError> {
        self.register_rc(Rc::new(command))
    }

    pub fn register_rc(&mut self, command: Rc<dyn Command>) -> Result<(), ConfigError> {
        let name = command
            .name()
            .map(str::to_string)
            .or_else(|| command.metadata().map(|m| m.name))
            .filter(|n| !n.trim().is_empty())
            .ok_or(ConfigError::UnnamedCommand)?;

        debug!(command = %name, "Registering command");
        let adapter = CommandAdapter::new(name.clone(), command);
        self.entries
            .insert(name.to_lowercase(), Entry::Eager(Rc::new(adapter)));
        Ok(())
    }

    /// Register a command that is only built the first time it is looked up
    pub fn register_lazy<F>(&mut self, name: &str, factory: F) -> Result<(), ConfigError>
    where
        F: Fn() -> Rc<dyn Command> + 'static,
    {
        if name.trim().is_empty() {
            return Err(ConfigError::UnnamedCommand);
        }
        self.entries.insert(
            name.to_lowercase(),
            Entry::Lazy {
                name: name.to_string(),
                factory: Box::new(factory),
                adapter: OnceCell::new(),
            },
        );
        Ok(())
    }

    pub fn has(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_lowercase())
    }

    pub fn get_adapter(&self, name: &str) -> Option<Rc<CommandAdapter>> {
        self.entries.get(&name.to_lowercase()).map(Entry::adapter)
    }

    /// Whether a lazy entry has been built yet (eager entries always are)
    pub fn is_loaded(&self, name: &str) -> bool {
        self.entries
            .get(&name.to_lowercase())
            .is_some_and(Entry::is_built)
    }

    /// Run a command's own validation against already-parsed input
    pub fn validate_command(&self, name: &str, input: &CommandInput) -> ValidationResult {
        match self.get_adapter(name) {
            Some(adapter) => adapter.command().validate(input),
            None => ValidationResult::error(
                ValidationErrorKind::UnknownCommand,
                format!("Unknown command: {}", name),
            ),
        }
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn describe(&self, name: &str) -> Option<CommandMetadata> {
        self.get_adapter(name).and_then(|a| a.metadata())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
