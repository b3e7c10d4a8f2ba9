// src/core/handler/dispatcher.rs

//! The single entry point for executing a decoded request.
//!
//! `Dispatcher::handle_request` is shared by the socket loop, by `EXEC` for
//! each queued command, and by replication replay through virtual sessions.
//! It always leaves its reply, or the error reply, in the session's writer.

use super::transaction_handler;
use crate::connection::SessionState;
use crate::core::cluster::slot::key_hash;
use crate::core::commands::{CommandContext, CommandDescriptor, CommandHandler};
use crate::core::transaction::{ModifyStamp, TxState};
use crate::core::transaction::clock::now_nanos;
use crate::core::{RespValue, SpinelKvError, metrics};
use bytes::Bytes;
use futures::FutureExt;
use futures::future::BoxFuture;
use std::time::{Duration, Instant};
use tracing::{Instrument, info_span, warn};

/// The longest argument text written to a slow-query log line.
const SLOW_LOG_ARGS_MAX: usize = 256;

pub struct Dispatcher;

impl Dispatcher {
    /// Runs one request. `request[0]` is the command name as sent by the client.
    ///
    /// Command errors are written to the session as error replies and the
    /// result is `Ok`. An `Err` is returned only when the reply itself could
    /// not be produced, which currently never happens; callers propagate it
    /// like any other connection failure.
    pub fn handle_request<'a>(
        session: &'a mut SessionState,
        request: Vec<Bytes>,
    ) -> BoxFuture<'a, Result<(), SpinelKvError>> {
        let name = request
            .first()
            .map(|name| String::from_utf8_lossy(name).to_ascii_lowercase())
            .unwrap_or_default();
        let span = info_span!("command", name = %name, client.id = session.id);
        async move {
            let start = Instant::now();
            let mut repl_cost = Duration::ZERO;
            let outcome = dispatch(session, name, request, &mut repl_cost).await;
            let cost = start.elapsed();

            let key = match outcome {
                Ok(Dispatched { reply, key }) => {
                    if let Some(reply) = reply {
                        session.writer.write_value(reply);
                    }
                    key
                }
                Err(Failed { err, key }) => {
                    session.writer.write_error(&err);
                    key
                }
            };

            let state = &session.state;
            state.stats.increment_total_commands();
            metrics::COMMANDS_PROCESSED_TOTAL.inc();
            metrics::COMMAND_LATENCY_SECONDS.observe(cost.as_secs_f64());
            if cost >= state.config.slow_time {
                report_slow(session, &key, cost, repl_cost);
            }
            Ok(())
        }
        .instrument(span)
        .boxed()
    }
}

/// What a successful dispatch leaves behind. `reply` is `None` when the
/// handler already wrote to the session (e.g. `EXEC`).
struct Dispatched {
    reply: Option<RespValue>,
    key: SlowKey,
}

struct Failed {
    err: SpinelKvError,
    key: SlowKey,
}

/// What the slow log reports about a request.
struct SlowKey {
    command: String,
    key: Bytes,
    args: Vec<Bytes>,
}

impl SlowKey {
    fn fail(self, err: SpinelKvError) -> Failed {
        Failed { err, key: self }
    }

    fn done(self, reply: Option<RespValue>) -> Dispatched {
        Dispatched { reply, key: self }
    }
}

async fn dispatch(
    session: &mut SessionState,
    mut name: String,
    mut request: Vec<Bytes>,
    repl_cost: &mut Duration,
) -> Result<Dispatched, Failed> {
    session.tx.reconcile_expired();
    session.query_start = now_nanos();
    session.key_hash = 0;

    let mut slow = SlowKey {
        command: name.clone(),
        key: Bytes::new(),
        args: request.clone(),
    };
    if name.is_empty() {
        return Err(slow.fail(SpinelKvError::EmptyCommand(name)));
    }

    if session.tx.should_queue(&name) {
        session.tx.enqueue(request);
        return Ok(slow.done(Some(RespValue::SimpleString("QUEUED".into()))));
    }

    if name == "script" {
        if request.len() < 2 {
            return Err(slow.fail(SpinelKvError::WrongArgumentCount(name)));
        }
        let sub = request.remove(1);
        name.push_str(&String::from_utf8_lossy(&sub).to_ascii_lowercase());
        slow.command.clone_from(&name);
    }

    let state = std::sync::Arc::clone(&session.state);
    let Some(descriptor) = state.registry.get(&name) else {
        return Err(slow.fail(SpinelKvError::EmptyCommand(name)));
    };
    if !descriptor.check_arity(request.len()) {
        return Err(slow.fail(SpinelKvError::WrongArgumentCount(name)));
    }
    if descriptor.is_tx_forbidden() && session.tx.state().contains(TxState::MULTI) {
        return Err(slow.fail(SpinelKvError::NotAllowedInMulti(name)));
    }

    let args = &request[1..];
    let first_key = descriptor.keys.first_key(args).cloned();
    let mut _unlock = None;
    if let Some(key) = &first_key {
        slow.key = key.clone();
        session.key_hash = key_hash(key);
        let (foreign, guard) = state.redirect.check(&name, key, session.key_hash);
        if foreign {
            return match state.redirect.redirect(&request, key).await {
                Ok(reply) => Ok(slow.done(Some(reply))),
                Err(e) => Err(slow.fail(e)),
            };
        }
        _unlock = guard;
    }

    match descriptor.handler {
        CommandHandler::Quit => {
            session.quit = true;
            Ok(slow.done(Some(RespValue::ok())))
        }
        CommandHandler::Transaction(command) => {
            match transaction_handler::handle(session, command, args).await {
                Ok(()) => Ok(slow.done(None)),
                Err(e) => Err(slow.fail(e)),
            }
        }
        CommandHandler::Data(handler) => {
            match apply(session, descriptor, handler, &request, repl_cost).await {
                Ok(reply) => Ok(slow.done(Some(reply))),
                Err(e) => Err(slow.fail(e)),
            }
        }
    }
}

/// Runs a data command: replicates (if active), then stamps the watched keys a
/// write touches and applies it locally. No await separates the stamp lookup
/// from the apply other than the key mutex waits.
async fn apply(
    session: &mut SessionState,
    descriptor: &CommandDescriptor,
    handler: crate::core::commands::DataHandler,
    request: &[Bytes],
    repl_cost: &mut Duration,
) -> Result<RespValue, SpinelKvError> {
    let state = std::sync::Arc::clone(&session.state);
    let args = &request[1..];

    if descriptor.is_write() && !session.bypass_replication && state.replication.is_active() {
        let started = Instant::now();
        let replicated = state.replication.replicate(request, session.key_hash).await;
        *repl_cost = started.elapsed();
        replicated?;
    }

    let _stamp = if descriptor.is_write()
        && !descriptor.is_keyless()
        && state.tx.is_enabled()
        && state.is_master()
    {
        Some(ModifyStamp::acquire(&session.tx, descriptor.keys.keys(args)).await)
    } else {
        None
    };

    let ctx = CommandContext {
        state: &state,
        args,
    };
    handler(&ctx)
}

fn report_slow(session: &SessionState, slow: &SlowKey, cost: Duration, repl_cost: Duration) {
    let state = &session.state;
    state.stats.increment_slow_queries();
    metrics::SLOW_QUERIES_TOTAL.inc();

    let mut args = slow
        .args
        .iter()
        .map(|arg| String::from_utf8_lossy(arg))
        .collect::<Vec<_>>()
        .join(" ");
    if args.len() > SLOW_LOG_ARGS_MAX {
        let mut end = SLOW_LOG_ARGS_MAX;
        while !args.is_char_boundary(end) {
            end -= 1;
        }
        args.truncate(end);
        args.push_str("...");
    }
    let addr = session
        .addr
        .map_or_else(|| "internal".to_string(), |addr| addr.to_string());
    warn!(
        client.addr = %addr,
        cost_us = cost.as_micros() as u64,
        repl_cost_us = repl_cost.as_micros() as u64,
        "slow query: {args}"
    );
    state
        .slow_log_sink
        .send(&slow.command, &slow.key, cost.as_nanos() as u64);
}
