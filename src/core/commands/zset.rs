// src/core/commands/zset.rs

//! Sorted set commands. Scores are replied as bulk strings.

use super::helpers::{ArgParser, format_f64, parse_f64, parse_i64, require_pairs};
use super::{CommandContext, CommandDescriptor, CommandRegistry};
use crate::core::storage::ZSetOps;
use crate::core::{RespValue, SpinelKvError};

pub fn register(registry: &mut CommandRegistry) -> Result<(), SpinelKvError> {
    registry.register(CommandDescriptor::new("zadd", -4, zadd).write())?;
    registry.register(CommandDescriptor::new("zincrby", 4, zincrby).write())?;
    registry.register(CommandDescriptor::new("zscore", 3, zscore))?;
    registry.register(CommandDescriptor::new("zrem", -3, zrem).write())?;
    registry.register(CommandDescriptor::new("zcard", 2, zcard))?;
    registry.register(CommandDescriptor::new("zrange", -4, zrange))?;
    Ok(())
}

/// `ZADD key score member [score member ...]`
fn zadd(ctx: &CommandContext<'_>) -> Result<RespValue, SpinelKvError> {
    require_pairs(ctx.args, 2, 1, "zadd")?;
    let members = ctx.args[1..]
        .chunks_exact(2)
        .map(|pair| Ok((parse_f64(&pair[0])?, pair[1].clone())))
        .collect::<Result<Vec<_>, SpinelKvError>>()?;
    Ok(RespValue::Integer(
        ctx.state.engine().zadd(ctx.args[0].clone(), members)?,
    ))
}

fn zincrby(ctx: &CommandContext<'_>) -> Result<RespValue, SpinelKvError> {
    let delta = parse_f64(&ctx.args[1])?;
    let score = ctx
        .state
        .engine()
        .zincr_by(ctx.args[0].clone(), delta, ctx.args[2].clone())?;
    Ok(RespValue::BulkString(format_f64(score)))
}

fn zscore(ctx: &CommandContext<'_>) -> Result<RespValue, SpinelKvError> {
    let score = ctx.state.engine().zscore(&ctx.args[0], &ctx.args[1])?;
    Ok(RespValue::bulk_or_null(score.map(format_f64)))
}

fn zrem(ctx: &CommandContext<'_>) -> Result<RespValue, SpinelKvError> {
    Ok(RespValue::Integer(
        ctx.state.engine().zrem(&ctx.args[0], &ctx.args[1..])?,
    ))
}

fn zcard(ctx: &CommandContext<'_>) -> Result<RespValue, SpinelKvError> {
    Ok(RespValue::Integer(ctx.state.engine().zcard(&ctx.args[0])? as i64))
}

/// `ZRANGE key start stop [WITHSCORES]`
fn zrange(ctx: &CommandContext<'_>) -> Result<RespValue, SpinelKvError> {
    let start = parse_i64(&ctx.args[1])?;
    let stop = parse_i64(&ctx.args[2])?;
    let mut parser = ArgParser::new(&ctx.args[3..]);
    let with_scores = parser.match_flag("withscores");
    if !parser.is_done() {
        return Err(SpinelKvError::Syntax);
    }

    let members = ctx.state.engine().zrange(&ctx.args[0], start, stop)?;
    Ok(if with_scores {
        RespValue::bulk_array(
            members
                .into_iter()
                .flat_map(|(member, score)| [member, format_f64(score)]),
        )
    } else {
        RespValue::bulk_array(members.into_iter().map(|(member, _)| member))
    })
}
