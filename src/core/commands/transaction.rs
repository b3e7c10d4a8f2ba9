// src/core/commands/transaction.rs

//! Registers the transaction commands. Their behavior lives in
//! `core::handler::transaction_handler` since it needs the session.

use super::{CommandDescriptor, CommandRegistry, KeySpec, TxCommand};
use crate::core::SpinelKvError;

pub fn register(registry: &mut CommandRegistry) -> Result<(), SpinelKvError> {
    registry.register(
        CommandDescriptor::transaction("watch", -2, TxCommand::Watch)
            .keys(KeySpec::Stride(1))
            .tx_forbidden(),
    )?;
    registry.register(
        CommandDescriptor::transaction("unwatch", 1, TxCommand::Unwatch).tx_forbidden(),
    )?;
    registry.register(CommandDescriptor::transaction("multi", 1, TxCommand::Multi))?;
    registry.register(CommandDescriptor::transaction("prepare", 1, TxCommand::Prepare))?;
    registry.register(CommandDescriptor::transaction("exec", 1, TxCommand::Exec))?;
    registry.register(CommandDescriptor::transaction("discard", 1, TxCommand::Discard))?;
    Ok(())
}
