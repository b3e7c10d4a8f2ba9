// src/core/commands/list.rs

//! List commands.

use super::helpers::parse_i64;
use super::{CommandContext, CommandDescriptor, CommandRegistry};
use crate::core::storage::{ListEnd, ListOps};
use crate::core::{RespValue, SpinelKvError};

pub fn register(registry: &mut CommandRegistry) -> Result<(), SpinelKvError> {
    registry.register(CommandDescriptor::new("lpush", -3, lpush).write())?;
    registry.register(CommandDescriptor::new("rpush", -3, rpush).write())?;
    registry.register(CommandDescriptor::new("lpop", 2, lpop).write())?;
    registry.register(CommandDescriptor::new("rpop", 2, rpop).write())?;
    registry.register(CommandDescriptor::new("llen", 2, llen))?;
    registry.register(CommandDescriptor::new("lrange", 4, lrange))?;
    Ok(())
}

fn push(ctx: &CommandContext<'_>, end: ListEnd) -> Result<RespValue, SpinelKvError> {
    let len = ctx
        .state
        .engine()
        .push(ctx.args[0].clone(), ctx.args[1..].to_vec(), end)?;
    Ok(RespValue::Integer(len as i64))
}

fn lpush(ctx: &CommandContext<'_>) -> Result<RespValue, SpinelKvError> {
    push(ctx, ListEnd::Left)
}

fn rpush(ctx: &CommandContext<'_>) -> Result<RespValue, SpinelKvError> {
    push(ctx, ListEnd::Right)
}

fn lpop(ctx: &CommandContext<'_>) -> Result<RespValue, SpinelKvError> {
    Ok(RespValue::bulk_or_null(
        ctx.state.engine().pop(&ctx.args[0], ListEnd::Left)?,
    ))
}

fn rpop(ctx: &CommandContext<'_>) -> Result<RespValue, SpinelKvError> {
    Ok(RespValue::bulk_or_null(
        ctx.state.engine().pop(&ctx.args[0], ListEnd::Right)?,
    ))
}

fn llen(ctx: &CommandContext<'_>) -> Result<RespValue, SpinelKvError> {
    Ok(RespValue::Integer(ctx.state.engine().llen(&ctx.args[0])? as i64))
}

fn lrange(ctx: &CommandContext<'_>) -> Result<RespValue, SpinelKvError> {
    let start = parse_i64(&ctx.args[1])?;
    let stop = parse_i64(&ctx.args[2])?;
    Ok(RespValue::bulk_array(
        ctx.state.engine().lrange(&ctx.args[0], start, stop)?,
    ))
}
