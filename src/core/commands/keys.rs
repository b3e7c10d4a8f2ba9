// src/core/commands/keys.rs

//! Generic keyspace commands.

use super::helpers::{ArgParser, arg_str, parse_i64};
use super::{CommandContext, CommandDescriptor, CommandRegistry, KeySpec};
use crate::core::storage::{KeyOps, KeyTtl};
use crate::core::{RespValue, SpinelKvError};
use bytes::Bytes;
use std::time::Duration;

const DEFAULT_SCAN_COUNT: usize = 10;

pub fn register(registry: &mut CommandRegistry) -> Result<(), SpinelKvError> {
    registry.register(
        CommandDescriptor::new("del", -2, del)
            .write()
            .keys(KeySpec::Stride(1)),
    )?;
    registry.register(CommandDescriptor::new("exists", -2, exists).keys(KeySpec::Stride(1)))?;
    registry.register(CommandDescriptor::new("expire", 3, expire).write())?;
    registry.register(CommandDescriptor::new("pexpire", 3, pexpire).write())?;
    registry.register(CommandDescriptor::new("ttl", 2, ttl))?;
    registry.register(CommandDescriptor::new("pttl", 2, pttl))?;
    registry.register(CommandDescriptor::new("persist", 2, persist).write())?;
    registry.register(CommandDescriptor::new("type", 2, key_type))?;
    registry.register(CommandDescriptor::new("keys", 2, keys).no_key())?;
    registry.register(
        CommandDescriptor::new("scan", -2, scan)
            .no_key()
            .tx_forbidden(),
    )?;
    registry.register(CommandDescriptor::new("dbsize", 1, dbsize).no_key())?;
    registry.register(CommandDescriptor::new("flushdb", 1, flushdb).write().no_key())?;
    Ok(())
}

fn del(ctx: &CommandContext<'_>) -> Result<RespValue, SpinelKvError> {
    let engine = ctx.state.engine();
    let removed = ctx.args.iter().filter(|key| engine.del(key)).count();
    Ok(RespValue::Integer(removed as i64))
}

/// Counts a key once per mention, so `EXISTS a a` is 2 when `a` exists.
fn exists(ctx: &CommandContext<'_>) -> Result<RespValue, SpinelKvError> {
    let engine = ctx.state.engine();
    let found = ctx.args.iter().filter(|key| engine.exists(key)).count();
    Ok(RespValue::Integer(found as i64))
}

fn expire_in(ctx: &CommandContext<'_>, unit_ms: i64) -> Result<RespValue, SpinelKvError> {
    let amount = parse_i64(&ctx.args[1])?;
    let engine = ctx.state.engine();
    // A non-positive timeout expires the key immediately.
    if amount <= 0 {
        return Ok(RespValue::Integer(engine.del(&ctx.args[0]) as i64));
    }
    let millis = amount.checked_mul(unit_ms).ok_or(SpinelKvError::NotAnInteger)?;
    let applied = engine.expire(&ctx.args[0], Duration::from_millis(millis as u64));
    Ok(RespValue::Integer(applied as i64))
}

fn expire(ctx: &CommandContext<'_>) -> Result<RespValue, SpinelKvError> {
    expire_in(ctx, 1_000)
}

fn pexpire(ctx: &CommandContext<'_>) -> Result<RespValue, SpinelKvError> {
    expire_in(ctx, 1)
}

fn ttl_reply(ttl: KeyTtl, in_millis: bool) -> RespValue {
    RespValue::Integer(match ttl {
        KeyTtl::Missing => -2,
        KeyTtl::Persistent => -1,
        KeyTtl::Expires(left) if in_millis => left.as_millis() as i64,
        KeyTtl::Expires(left) => ((left.as_millis() + 500) / 1_000) as i64,
    })
}

fn ttl(ctx: &CommandContext<'_>) -> Result<RespValue, SpinelKvError> {
    Ok(ttl_reply(ctx.state.engine().ttl(&ctx.args[0]), false))
}

fn pttl(ctx: &CommandContext<'_>) -> Result<RespValue, SpinelKvError> {
    Ok(ttl_reply(ctx.state.engine().ttl(&ctx.args[0]), true))
}

fn persist(ctx: &CommandContext<'_>) -> Result<RespValue, SpinelKvError> {
    Ok(RespValue::Integer(
        ctx.state.engine().persist(&ctx.args[0]) as i64,
    ))
}

fn key_type(ctx: &CommandContext<'_>) -> Result<RespValue, SpinelKvError> {
    let name = ctx.state.engine().key_type(&ctx.args[0]).unwrap_or("none");
    Ok(RespValue::SimpleString(name.to_string()))
}

fn keys(ctx: &CommandContext<'_>) -> Result<RespValue, SpinelKvError> {
    let pattern = arg_str(&ctx.args[0])?;
    Ok(RespValue::bulk_array(ctx.state.engine().keys(pattern)))
}

/// `SCAN cursor [MATCH pattern] [COUNT count]`
fn scan(ctx: &CommandContext<'_>) -> Result<RespValue, SpinelKvError> {
    let cursor = parse_i64(&ctx.args[0])?;
    if cursor < 0 {
        return Err(SpinelKvError::NotAnInteger);
    }
    let mut pattern = None;
    let mut count = DEFAULT_SCAN_COUNT;
    let mut parser = ArgParser::new(&ctx.args[1..]);
    while !parser.is_done() {
        if let Some(p) = parser.match_option("match")? {
            pattern = Some(arg_str(p)?);
        } else if let Some(c) = parser.match_option("count")? {
            count = match parse_i64(c)? {
                n if n >= 1 => n as usize,
                _ => return Err(SpinelKvError::Syntax),
            };
        } else {
            return Err(SpinelKvError::Syntax);
        }
    }

    let (next, keys) = ctx.state.engine().scan(cursor as u64, pattern, count);
    let mut fmt = itoa::Buffer::new();
    Ok(RespValue::Array(vec![
        RespValue::BulkString(Bytes::copy_from_slice(fmt.format(next).as_bytes())),
        RespValue::bulk_array(keys),
    ]))
}

fn dbsize(ctx: &CommandContext<'_>) -> Result<RespValue, SpinelKvError> {
    Ok(RespValue::Integer(ctx.state.engine().dbsize() as i64))
}

fn flushdb(ctx: &CommandContext<'_>) -> Result<RespValue, SpinelKvError> {
    ctx.state.engine().flush();
    Ok(RespValue::ok())
}
