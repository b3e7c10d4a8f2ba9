// src/core/commands/set.rs

//! Set commands.

use super::{CommandContext, CommandDescriptor, CommandRegistry};
use crate::core::storage::SetOps;
use crate::core::{RespValue, SpinelKvError};

pub fn register(registry: &mut CommandRegistry) -> Result<(), SpinelKvError> {
    registry.register(CommandDescriptor::new("sadd", -3, sadd).write())?;
    registry.register(CommandDescriptor::new("srem", -3, srem).write())?;
    registry.register(CommandDescriptor::new("smembers", 2, smembers))?;
    registry.register(CommandDescriptor::new("sismember", 3, sismember))?;
    registry.register(CommandDescriptor::new("scard", 2, scard))?;
    Ok(())
}

fn sadd(ctx: &CommandContext<'_>) -> Result<RespValue, SpinelKvError> {
    Ok(RespValue::Integer(
        ctx.state
            .engine()
            .sadd(ctx.args[0].clone(), ctx.args[1..].to_vec())?,
    ))
}

fn srem(ctx: &CommandContext<'_>) -> Result<RespValue, SpinelKvError> {
    Ok(RespValue::Integer(
        ctx.state.engine().srem(&ctx.args[0], &ctx.args[1..])?,
    ))
}

fn smembers(ctx: &CommandContext<'_>) -> Result<RespValue, SpinelKvError> {
    Ok(RespValue::bulk_array(
        ctx.state.engine().smembers(&ctx.args[0])?,
    ))
}

fn sismember(ctx: &CommandContext<'_>) -> Result<RespValue, SpinelKvError> {
    let found = ctx.state.engine().sismember(&ctx.args[0], &ctx.args[1])?;
    Ok(RespValue::Integer(found as i64))
}

fn scard(ctx: &CommandContext<'_>) -> Result<RespValue, SpinelKvError> {
    Ok(RespValue::Integer(ctx.state.engine().scard(&ctx.args[0])? as i64))
}
