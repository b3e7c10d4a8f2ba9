// src/core/commands/command_spec.rs

//! Describes a registered command: its handler, its flags and where its keys are.

use crate::core::state::ServerState;
use crate::core::{RespValue, SpinelKvError};
use bitflags::bitflags;
use bytes::Bytes;

bitflags! {
    /// Flags that describe the properties and behavior of a command.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct CommandFlags: u32 {
        /// The command modifies the dataset and goes through replication.
        const REPLICATE    = 1 << 0;
        /// The command is rejected inside `MULTI`.
        const TX_FORBIDDEN = 1 << 1;
    }
}

/// Which positional arguments (after the command name) are keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySpec {
    /// Only the first argument is a key.
    FirstArgOnly,
    /// Every nth argument starting at the first, e.g. `Stride(2)` for `MSET`.
    Stride(usize),
    NoKey,
}

impl KeySpec {
    /// The key arguments of `args`, which exclude the command name.
    pub fn keys(&self, args: &[Bytes]) -> Vec<Bytes> {
        match *self {
            KeySpec::FirstArgOnly => args.first().cloned().into_iter().collect(),
            KeySpec::Stride(n) => args.iter().step_by(n.max(1)).cloned().collect(),
            KeySpec::NoKey => Vec::new(),
        }
    }

    /// The key used for routing and hashing.
    pub fn first_key<'a>(&self, args: &'a [Bytes]) -> Option<&'a Bytes> {
        match self {
            KeySpec::NoKey => None,
            _ => args.first(),
        }
    }
}

/// Everything a data command handler can see.
pub struct CommandContext<'a> {
    pub state: &'a ServerState,
    /// The arguments after the command name.
    pub args: &'a [Bytes],
}

pub type DataHandler = fn(&CommandContext<'_>) -> Result<RespValue, SpinelKvError>;

/// Transaction commands run against the session rather than the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum TxCommand {
    Watch,
    Unwatch,
    Multi,
    Prepare,
    Exec,
    Discard,
}

#[derive(Clone, Copy)]
pub enum CommandHandler {
    Data(DataHandler),
    Transaction(TxCommand),
    /// Replies `OK` and closes the connection.
    Quit,
}

impl std::fmt::Debug for CommandHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandHandler::Data(_) => f.write_str("Data"),
            CommandHandler::Transaction(cmd) => write!(f, "Transaction({cmd})"),
            CommandHandler::Quit => f.write_str("Quit"),
        }
    }
}

/// One entry of the command table. Immutable after registration.
#[derive(Debug, Clone)]
pub struct CommandDescriptor {
    pub name: &'static str,
    pub handler: CommandHandler,
    pub flags: CommandFlags,
    pub keys: KeySpec,
    /// Redis convention: exact if positive, minimum if negative, counting the name.
    pub arity: i32,
}

impl CommandDescriptor {
    /// A read-only command whose first argument is its key.
    pub fn new(name: &'static str, arity: i32, handler: DataHandler) -> Self {
        Self {
            name,
            handler: CommandHandler::Data(handler),
            flags: CommandFlags::empty(),
            keys: KeySpec::FirstArgOnly,
            arity,
        }
    }

    pub fn transaction(name: &'static str, arity: i32, command: TxCommand) -> Self {
        Self {
            name,
            handler: CommandHandler::Transaction(command),
            flags: CommandFlags::empty(),
            keys: KeySpec::NoKey,
            arity,
        }
    }

    pub fn write(mut self) -> Self {
        self.flags |= CommandFlags::REPLICATE;
        self
    }

    pub fn tx_forbidden(mut self) -> Self {
        self.flags |= CommandFlags::TX_FORBIDDEN;
        self
    }

    pub fn keys(mut self, keys: KeySpec) -> Self {
        self.keys = keys;
        self
    }

    pub fn no_key(self) -> Self {
        self.keys(KeySpec::NoKey)
    }

    pub fn is_write(&self) -> bool {
        self.flags.contains(CommandFlags::REPLICATE)
    }

    pub fn is_tx_forbidden(&self) -> bool {
        self.flags.contains(CommandFlags::TX_FORBIDDEN)
    }

    pub fn is_keyless(&self) -> bool {
        self.keys == KeySpec::NoKey
    }

    /// Checks `argc`, the argument count including the command name.
    pub fn check_arity(&self, argc: usize) -> bool {
        let argc = argc as i32;
        if self.arity >= 0 {
            argc == self.arity
        } else {
            argc >= -self.arity
        }
    }
}
