// src/core/commands/hash.rs

//! Hash commands.

use super::helpers::{parse_i64, require_pairs};
use super::{CommandContext, CommandDescriptor, CommandRegistry};
use crate::core::storage::HashOps;
use crate::core::{RespValue, SpinelKvError};

pub fn register(registry: &mut CommandRegistry) -> Result<(), SpinelKvError> {
    registry.register(CommandDescriptor::new("hset", -4, hset).write())?;
    registry.register(CommandDescriptor::new("hget", 3, hget))?;
    registry.register(CommandDescriptor::new("hmget", -3, hmget))?;
    registry.register(CommandDescriptor::new("hdel", -3, hdel).write())?;
    registry.register(CommandDescriptor::new("hgetall", 2, hgetall))?;
    registry.register(CommandDescriptor::new("hlen", 2, hlen))?;
    registry.register(CommandDescriptor::new("hexists", 3, hexists))?;
    registry.register(CommandDescriptor::new("hincrby", 4, hincrby).write())?;
    Ok(())
}

/// `HSET key field value [field value ...]`
fn hset(ctx: &CommandContext<'_>) -> Result<RespValue, SpinelKvError> {
    require_pairs(ctx.args, 2, 1, "hset")?;
    let pairs = ctx.args[1..]
        .chunks_exact(2)
        .map(|pair| (pair[0].clone(), pair[1].clone()))
        .collect();
    Ok(RespValue::Integer(
        ctx.state.engine().hset(ctx.args[0].clone(), pairs)?,
    ))
}

fn hget(ctx: &CommandContext<'_>) -> Result<RespValue, SpinelKvError> {
    Ok(RespValue::bulk_or_null(
        ctx.state.engine().hget(&ctx.args[0], &ctx.args[1])?,
    ))
}

fn hmget(ctx: &CommandContext<'_>) -> Result<RespValue, SpinelKvError> {
    let engine = ctx.state.engine();
    let key = &ctx.args[0];
    let values = ctx.args[1..]
        .iter()
        .map(|field| engine.hget(key, field).map(RespValue::bulk_or_null))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(RespValue::Array(values))
}

fn hdel(ctx: &CommandContext<'_>) -> Result<RespValue, SpinelKvError> {
    Ok(RespValue::Integer(
        ctx.state.engine().hdel(&ctx.args[0], &ctx.args[1..])?,
    ))
}

/// Field/value pairs flattened into one array.
fn hgetall(ctx: &CommandContext<'_>) -> Result<RespValue, SpinelKvError> {
    let pairs = ctx.state.engine().hgetall(&ctx.args[0])?;
    Ok(RespValue::bulk_array(
        pairs.into_iter().flat_map(|(field, value)| [field, value]),
    ))
}

fn hlen(ctx: &CommandContext<'_>) -> Result<RespValue, SpinelKvError> {
    Ok(RespValue::Integer(ctx.state.engine().hlen(&ctx.args[0])? as i64))
}

fn hexists(ctx: &CommandContext<'_>) -> Result<RespValue, SpinelKvError> {
    let found = ctx.state.engine().hget(&ctx.args[0], &ctx.args[1])?.is_some();
    Ok(RespValue::Integer(found as i64))
}

fn hincrby(ctx: &CommandContext<'_>) -> Result<RespValue, SpinelKvError> {
    let delta = parse_i64(&ctx.args[2])?;
    Ok(RespValue::Integer(ctx.state.engine().hincr_by(
        ctx.args[0].clone(),
        ctx.args[1].clone(),
        delta,
    )?))
}
