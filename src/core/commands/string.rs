// src/core/commands/string.rs

//! String commands.

use super::helpers::{ArgParser, parse_i64, require_pairs};
use super::{CommandContext, CommandDescriptor, CommandRegistry, KeySpec};
use crate::core::storage::{SetCondition, SetOptions, StringOps};
use crate::core::{RespValue, SpinelKvError};
use std::time::Duration;

pub fn register(registry: &mut CommandRegistry) -> Result<(), SpinelKvError> {
    registry.register(CommandDescriptor::new("get", 2, get))?;
    registry.register(CommandDescriptor::new("set", -3, set).write())?;
    registry.register(CommandDescriptor::new("setnx", 3, setnx).write())?;
    registry.register(CommandDescriptor::new("setex", 4, setex).write())?;
    registry.register(CommandDescriptor::new("getset", 3, getset).write())?;
    registry.register(CommandDescriptor::new("mget", -2, mget).keys(KeySpec::Stride(1)))?;
    registry.register(
        CommandDescriptor::new("mset", -3, mset)
            .write()
            .keys(KeySpec::Stride(2)),
    )?;
    registry.register(CommandDescriptor::new("incr", 2, incr).write())?;
    registry.register(CommandDescriptor::new("decr", 2, decr).write())?;
    registry.register(CommandDescriptor::new("incrby", 3, incrby).write())?;
    registry.register(CommandDescriptor::new("decrby", 3, decrby).write())?;
    registry.register(CommandDescriptor::new("append", 3, append).write())?;
    registry.register(CommandDescriptor::new("strlen", 2, strlen))?;
    Ok(())
}

fn get(ctx: &CommandContext<'_>) -> Result<RespValue, SpinelKvError> {
    Ok(RespValue::bulk_or_null(ctx.state.engine().get(&ctx.args[0])?))
}

/// `SET key value [EX seconds | PX milliseconds] [NX | XX]`
fn set(ctx: &CommandContext<'_>) -> Result<RespValue, SpinelKvError> {
    let mut options = SetOptions::default();
    let mut parser = ArgParser::new(&ctx.args[2..]);
    while !parser.is_done() {
        if let Some(secs) = parser.match_option("ex")? {
            options.expiry = Some(expire_duration(parse_i64(secs)?, 1_000, "set")?);
        } else if let Some(millis) = parser.match_option("px")? {
            options.expiry = Some(expire_duration(parse_i64(millis)?, 1, "set")?);
        } else if parser.match_flag("nx") && options.condition == SetCondition::Always {
            options.condition = SetCondition::IfMissing;
        } else if parser.match_flag("xx") && options.condition == SetCondition::Always {
            options.condition = SetCondition::IfExists;
        } else {
            return Err(SpinelKvError::Syntax);
        }
    }

    let stored = ctx
        .state
        .engine()
        .set(ctx.args[0].clone(), ctx.args[1].clone(), options)?;
    Ok(if stored { RespValue::ok() } else { RespValue::Null })
}

fn expire_duration(amount: i64, unit_ms: u64, command: &str) -> Result<Duration, SpinelKvError> {
    if amount <= 0 {
        return Err(SpinelKvError::InvalidExpireTime(command.to_string()));
    }
    Ok(Duration::from_millis((amount as u64).saturating_mul(unit_ms)))
}

fn setnx(ctx: &CommandContext<'_>) -> Result<RespValue, SpinelKvError> {
    let options = SetOptions {
        condition: SetCondition::IfMissing,
        ..Default::default()
    };
    let stored = ctx
        .state
        .engine()
        .set(ctx.args[0].clone(), ctx.args[1].clone(), options)?;
    Ok(RespValue::Integer(stored as i64))
}

fn setex(ctx: &CommandContext<'_>) -> Result<RespValue, SpinelKvError> {
    let options = SetOptions {
        expiry: Some(expire_duration(parse_i64(&ctx.args[1])?, 1_000, "setex")?),
        ..Default::default()
    };
    ctx.state
        .engine()
        .set(ctx.args[0].clone(), ctx.args[2].clone(), options)?;
    Ok(RespValue::ok())
}

fn getset(ctx: &CommandContext<'_>) -> Result<RespValue, SpinelKvError> {
    let previous = ctx
        .state
        .engine()
        .getset(ctx.args[0].clone(), ctx.args[1].clone())?;
    Ok(RespValue::bulk_or_null(previous))
}

/// Keys holding a non-string value read as null.
fn mget(ctx: &CommandContext<'_>) -> Result<RespValue, SpinelKvError> {
    let engine = ctx.state.engine();
    Ok(RespValue::Array(
        ctx.args
            .iter()
            .map(|key| RespValue::bulk_or_null(engine.get(key).ok().flatten()))
            .collect(),
    ))
}

fn mset(ctx: &CommandContext<'_>) -> Result<RespValue, SpinelKvError> {
    require_pairs(ctx.args, 2, 0, "mset")?;
    let engine = ctx.state.engine();
    for pair in ctx.args.chunks_exact(2) {
        engine.set(pair[0].clone(), pair[1].clone(), SetOptions::default())?;
    }
    Ok(RespValue::ok())
}

fn incr_by(ctx: &CommandContext<'_>, delta: i64) -> Result<RespValue, SpinelKvError> {
    Ok(RespValue::Integer(
        ctx.state.engine().incr_by(ctx.args[0].clone(), delta)?,
    ))
}

fn incr(ctx: &CommandContext<'_>) -> Result<RespValue, SpinelKvError> {
    incr_by(ctx, 1)
}

fn decr(ctx: &CommandContext<'_>) -> Result<RespValue, SpinelKvError> {
    incr_by(ctx, -1)
}

fn incrby(ctx: &CommandContext<'_>) -> Result<RespValue, SpinelKvError> {
    incr_by(ctx, parse_i64(&ctx.args[1])?)
}

fn decrby(ctx: &CommandContext<'_>) -> Result<RespValue, SpinelKvError> {
    let delta = parse_i64(&ctx.args[1])?
        .checked_neg()
        .ok_or(SpinelKvError::Overflow)?;
    incr_by(ctx, delta)
}

fn append(ctx: &CommandContext<'_>) -> Result<RespValue, SpinelKvError> {
    let len = ctx
        .state
        .engine()
        .append(ctx.args[0].clone(), &ctx.args[1])?;
    Ok(RespValue::Integer(len as i64))
}

fn strlen(ctx: &CommandContext<'_>) -> Result<RespValue, SpinelKvError> {
    Ok(RespValue::Integer(ctx.state.engine().strlen(&ctx.args[0])? as i64))
}
