// src/core/commands/server.rs

//! Connection and server introspection commands.

use super::helpers::{arg_str, parse_i64};
use super::{CommandContext, CommandDescriptor, CommandFlags, CommandHandler, CommandRegistry, KeySpec};
use crate::core::{RespValue, SpinelKvError, metrics};
use bytes::Bytes;
use std::fmt::Write;
use std::time::{SystemTime, UNIX_EPOCH};

pub fn register(registry: &mut CommandRegistry) -> Result<(), SpinelKvError> {
    registry.register(CommandDescriptor::new("ping", -1, ping).no_key())?;
    registry.register(CommandDescriptor::new("echo", 2, echo).no_key())?;
    registry.register(CommandDescriptor::new("info", -1, info).no_key())?;
    registry.register(CommandDescriptor::new("time", 1, time).no_key())?;
    registry.register(CommandDescriptor::new("slowlog", -2, slowlog).no_key())?;
    registry.register(CommandDescriptor {
        name: "quit",
        handler: CommandHandler::Quit,
        flags: CommandFlags::empty(),
        keys: KeySpec::NoKey,
        arity: 1,
    })?;
    Ok(())
}

/// `PING [message]`
fn ping(ctx: &CommandContext<'_>) -> Result<RespValue, SpinelKvError> {
    match ctx.args {
        [] => Ok(RespValue::SimpleString("PONG".into())),
        [message] => Ok(RespValue::BulkString(message.clone())),
        _ => Err(SpinelKvError::WrongArgumentCount("ping".into())),
    }
}

fn echo(ctx: &CommandContext<'_>) -> Result<RespValue, SpinelKvError> {
    Ok(RespValue::BulkString(ctx.args[0].clone()))
}

/// `INFO [section]`. Sections: server, clients, stats, transactions.
fn info(ctx: &CommandContext<'_>) -> Result<RespValue, SpinelKvError> {
    let section = match ctx.args {
        [] => None,
        [section] => Some(arg_str(section)?.to_ascii_lowercase()),
        _ => return Err(SpinelKvError::Syntax),
    };
    let wants = |name: &str| {
        section
            .as_deref()
            .is_none_or(|s| s == name || s == "all" || s == "default")
    };

    let state = ctx.state;
    let mut out = String::new();
    if wants("server") {
        let _ = write!(
            out,
            "# Server\r\nspinelkv_version:{}\r\ntcp_port:{}\r\nuptime_in_seconds:{}\r\nrole:{}\r\n\r\n",
            env!("CARGO_PKG_VERSION"),
            state.config.port,
            state.uptime().as_secs(),
            if state.is_master() { "master" } else { "slave" },
        );
    }
    if wants("clients") {
        let _ = write!(
            out,
            "# Clients\r\nconnected_clients:{}\r\n\r\n",
            state.clients.len()
        );
    }
    if wants("stats") {
        let _ = write!(
            out,
            "# Stats\r\ntotal_connections_received:{}\r\ntotal_commands_processed:{}\r\nslow_queries:{}\r\nslowlog_len:{}\r\n\r\n",
            state.stats.get_total_connections(),
            state.stats.get_total_commands(),
            state.stats.get_slow_queries(),
            state.slow_log.len(),
        );
    }
    if wants("transactions") {
        let tracked = state.tx.locks().tracked_keys();
        metrics::TX_TRACKED_KEYS.set(tracked as f64);
        let _ = write!(
            out,
            "# Transactions\r\ntx_enabled:{}\r\ntx_in_flight:{}\r\ntx_tracked_keys:{}\r\ntx_lock_shards:{}\r\n\r\n",
            u8::from(state.tx.is_enabled()),
            state.tx.in_flight(),
            tracked,
            state.tx.locks().shard_count(),
        );
    }
    Ok(RespValue::BulkString(Bytes::from(out)))
}

/// `TIME`: unix seconds and the microseconds within that second.
fn time(_ctx: &CommandContext<'_>) -> Result<RespValue, SpinelKvError> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| SpinelKvError::Internal(e.to_string()))?;
    let mut fmt = itoa::Buffer::new();
    let secs = Bytes::copy_from_slice(fmt.format(now.as_secs()).as_bytes());
    let micros = Bytes::copy_from_slice(fmt.format(now.subsec_micros()).as_bytes());
    Ok(RespValue::bulk_array([secs, micros]))
}

/// `SLOWLOG GET [count] | LEN | RESET`
fn slowlog(ctx: &CommandContext<'_>) -> Result<RespValue, SpinelKvError> {
    let sub = arg_str(&ctx.args[0])?.to_ascii_lowercase();
    let slow_log = &ctx.state.slow_log;
    match (sub.as_str(), &ctx.args[1..]) {
        ("get", []) => Ok(slow_log.get_slow_log(None)),
        ("get", [count]) => {
            let count = parse_i64(count)?;
            if count < 0 {
                return Err(SpinelKvError::NotAnInteger);
            }
            Ok(slow_log.get_slow_log(Some(count as usize)))
        }
        ("len", []) => Ok(RespValue::Integer(slow_log.len() as i64)),
        ("reset", []) => {
            slow_log.reset();
            Ok(RespValue::ok())
        }
        ("get" | "len" | "reset", _) => Err(SpinelKvError::WrongArgumentCount("slowlog".into())),
        _ => Err(SpinelKvError::UnknownSubcommand(sub)),
    }
}
