// src/core/commands/mod.rs

//! The command table and the per-type command modules that fill it.
//!
//! Every module exposes a `register` function. `CommandRegistry::with_builtin_commands`
//! calls them all once at startup; after that the table is read-only and is
//! shared by every connection without locking.

pub mod command_spec;
pub mod hash;
pub mod helpers;
pub mod keys;
pub mod list;
pub mod script;
pub mod server;
pub mod set;
pub mod string;
pub mod transaction;
pub mod zset;

pub use command_spec::{
    CommandContext, CommandDescriptor, CommandFlags, CommandHandler, DataHandler, KeySpec,
    TxCommand,
};

use crate::core::SpinelKvError;
use bytes::Bytes;
use std::collections::HashMap;

/// Maps a lowercase command name to its descriptor.
#[derive(Debug, Default)]
pub struct CommandRegistry {
    commands: HashMap<&'static str, CommandDescriptor>,
}

impl CommandRegistry {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// The table with every built-in command registered.
    pub fn with_builtin_commands() -> Result<Self, SpinelKvError> {
        let mut registry = Self::new();
        string::register(&mut registry)?;
        keys::register(&mut registry)?;
        hash::register(&mut registry)?;
        list::register(&mut registry)?;
        set::register(&mut registry)?;
        zset::register(&mut registry)?;
        server::register(&mut registry)?;
        script::register(&mut registry)?;
        transaction::register(&mut registry)?;
        Ok(registry)
    }

    /// Adds a command. Registering the same name twice is an error.
    pub fn register(&mut self, descriptor: CommandDescriptor) -> Result<(), SpinelKvError> {
        if self.commands.contains_key(descriptor.name) {
            return Err(SpinelKvError::Internal(format!(
                "command '{}' registered twice",
                descriptor.name
            )));
        }
        self.commands.insert(descriptor.name, descriptor);
        Ok(())
    }

    /// Looks up a command by its exact lowercase name.
    pub fn get(&self, name: &str) -> Option<&CommandDescriptor> {
        self.commands.get(name)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// The keys a raw request (name included) writes. Empty for reads and unknown commands.
    pub fn write_keys(&self, request: &[Bytes]) -> Vec<Bytes> {
        let Some((name, args)) = request.split_first() else {
            return Vec::new();
        };
        let name = String::from_utf8_lossy(name).to_ascii_lowercase();
        match self.get(&name) {
            Some(descriptor) if descriptor.is_write() => descriptor.keys.keys(args),
            _ => Vec::new(),
        }
    }
}
