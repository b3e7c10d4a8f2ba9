// src/core/commands/script.rs

//! The `SCRIPT` family. The dispatcher folds `SCRIPT <sub>` into a single
//! command name (`scriptload`, `scriptexists`, ...) before lookup, so each
//! subcommand is registered as a command of its own.

use super::helpers::arg_str;
use super::{CommandContext, CommandDescriptor, CommandRegistry};
use crate::core::{RespValue, SpinelKvError};
use bytes::Bytes;

pub fn register(registry: &mut CommandRegistry) -> Result<(), SpinelKvError> {
    registry.register(script("scriptload", 2, load))?;
    registry.register(script("scriptexists", -2, exists))?;
    registry.register(script("scriptflush", 1, flush))?;
    registry.register(script("scriptlen", 1, len))?;
    Ok(())
}

fn script(
    name: &'static str,
    arity: i32,
    handler: super::DataHandler,
) -> CommandDescriptor {
    CommandDescriptor::new(name, arity, handler)
        .no_key()
        .tx_forbidden()
}

/// `SCRIPT LOAD <body>` replies with the SHA1 of the body.
fn load(ctx: &CommandContext<'_>) -> Result<RespValue, SpinelKvError> {
    let sha1 = ctx.state.scripts.load(ctx.args[0].clone());
    Ok(RespValue::BulkString(Bytes::from(sha1)))
}

fn exists(ctx: &CommandContext<'_>) -> Result<RespValue, SpinelKvError> {
    let sha1s = ctx
        .args
        .iter()
        .map(|arg| arg_str(arg).map(str::to_string))
        .collect::<Result<Vec<_>, _>>()?;
    let flags = ctx.state.scripts.exists(&sha1s);
    Ok(RespValue::Array(
        flags.into_iter().map(RespValue::Integer).collect(),
    ))
}

fn flush(ctx: &CommandContext<'_>) -> Result<RespValue, SpinelKvError> {
    ctx.state.scripts.flush();
    Ok(RespValue::ok())
}

fn len(ctx: &CommandContext<'_>) -> Result<RespValue, SpinelKvError> {
    Ok(RespValue::Integer(ctx.state.scripts.len() as i64))
}
