// src/core/handler/transaction_handler.rs

//! Executes `WATCH`, `UNWATCH`, `MULTI`, `PREPARE`, `EXEC` and `DISCARD`
//! against the session's `TxSession`.

use super::Dispatcher;
use crate::connection::SessionState;
use crate::core::SpinelKvError;
use crate::core::commands::TxCommand;
use crate::core::transaction::{PrepareState, TxState};
use bytes::Bytes;
use std::sync::Arc;
use tracing::debug;

/// Runs a transaction command and writes its reply. `args` excludes the name.
pub async fn handle(
    session: &mut SessionState,
    command: TxCommand,
    args: &[Bytes],
) -> Result<(), SpinelKvError> {
    if !session.tx.coordinator().is_enabled() {
        return Err(SpinelKvError::TxDisabled);
    }
    match command {
        TxCommand::Watch => {
            if !session.state.is_master() {
                return Err(SpinelKvError::TxNotInMaster);
            }
            session.tx.watch(args, session.query_start);
            write_ok(session);
        }
        TxCommand::Unwatch => {
            session.tx.unwatch();
            write_ok(session);
        }
        TxCommand::Multi => {
            if !session.state.is_master() {
                return Err(SpinelKvError::TxNotInMaster);
            }
            session.tx.begin_multi()?;
            write_ok(session);
        }
        TxCommand::Prepare => {
            let state = Arc::clone(&session.state);
            session.tx.prepare(&state.registry).await?;
            write_ok(session);
        }
        TxCommand::Exec => exec(session).await?,
        TxCommand::Discard => {
            if !session.tx.state().contains(TxState::MULTI) {
                return Err(SpinelKvError::DiscardWithoutMulti);
            }
            session.tx.discard();
            write_ok(session);
        }
    }
    Ok(())
}

fn write_ok(session: &mut SessionState) {
    session.writer.write_status("OK");
}

/// Runs the queued commands of a prepared transaction and replies with one
/// array holding each command's reply.
async fn exec(session: &mut SessionState) -> Result<(), SpinelKvError> {
    if !session.tx.state().contains(TxState::PREPARE) {
        return Err(SpinelKvError::ExecNotPrepared);
    }
    if matches!(
        session.tx.prepare_state(),
        PrepareState::KeyModified | PrepareState::LockFail
    ) {
        session.writer.write_bulk(None);
        return Ok(());
    }
    if session.tx.queued().is_empty() {
        session.writer.write_status("(empty array)");
        session.tx.finish_exec();
        return Ok(());
    }

    let queue = session.tx.begin_exec()?;
    debug!(commands = queue.len(), "Executing transaction");
    session.writer.set_cached();
    let mut result = Ok(());
    for request in queue {
        if let Err(e) = Dispatcher::handle_request(session, request).await {
            result = Err(e);
            break;
        }
    }
    session.writer.unset_cached();
    session.writer.flush_cached();
    session.tx.finish_exec();
    result
}
