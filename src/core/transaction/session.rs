// src/core/transaction/session.rs

//! Per-connection transaction state.

use super::prepare::{LockPhase, PrepareLock, acquire_all};
use super::{TxCoordinator, TxPermit, TxWatchKey};
use crate::core::commands::CommandRegistry;
use crate::core::{SpinelKvError, metrics};
use bitflags::bitflags;
use bytes::Bytes;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::debug;

bitflags! {
    /// The transaction state of one connection. Flags combine, e.g. a client
    /// that watched keys and then sent `MULTI` is `WATCH | MULTI`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TxState: u8 {
        const WATCH   = 1 << 0;
        const MULTI   = 1 << 1;
        const PREPARE = 1 << 2;
    }
}

/// Outcome of the last `PREPARE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
pub enum PrepareState {
    /// Not prepared, or prepared without taking any lock.
    #[default]
    None,
    KeyModified,
    LockFail,
    Locked,
}

/// Commands that are executed immediately even while queuing.
const CONTROL_COMMANDS: [&str; 6] = ["watch", "unwatch", "multi", "prepare", "exec", "discard"];

#[derive(Debug)]
pub struct TxSession {
    coordinator: Arc<TxCoordinator>,
    client_id: u64,
    state: TxState,
    queuing: bool,
    /// Key -> timestamp of the `WATCH` that registered it.
    watch_keys: HashMap<Bytes, i64>,
    queue: Vec<Vec<Bytes>>,
    prepare_state: PrepareState,
    permit: Option<TxPermit>,
    prepare_lock: Option<Arc<PrepareLock>>,
    /// Set once this session has won the release of its own prepare lock.
    claimed: bool,
}

impl TxSession {
    pub fn new(coordinator: Arc<TxCoordinator>, client_id: u64) -> Self {
        Self {
            coordinator,
            client_id,
            state: TxState::empty(),
            queuing: false,
            watch_keys: HashMap::new(),
            queue: Vec::new(),
            prepare_state: PrepareState::None,
            permit: None,
            prepare_lock: None,
            claimed: false,
        }
    }

    pub fn coordinator(&self) -> &Arc<TxCoordinator> {
        &self.coordinator
    }

    pub fn state(&self) -> TxState {
        self.state
    }

    pub fn prepare_state(&self) -> PrepareState {
        self.prepare_state
    }

    pub fn is_queuing(&self) -> bool {
        self.queuing
    }

    pub fn queued(&self) -> &[Vec<Bytes>] {
        &self.queue
    }

    pub fn watched_at(&self, key: &[u8]) -> Option<i64> {
        self.watch_keys.get(key).copied()
    }

    pub fn watch_count(&self) -> usize {
        self.watch_keys.len()
    }

    pub fn prepare_lock(&self) -> Option<&Arc<PrepareLock>> {
        self.prepare_lock.as_ref()
    }

    /// True if `command` must be queued instead of executed.
    pub fn should_queue(&self, command: &str) -> bool {
        self.queuing && !CONTROL_COMMANDS.contains(&command)
    }

    pub fn enqueue(&mut self, args: Vec<Bytes>) {
        self.queue.push(args);
    }

    /// True while this session owns the prepare mutex of `key`.
    pub fn holds_lock_on(&self, key: &[u8]) -> bool {
        self.prepare_lock
            .as_ref()
            .is_some_and(|lock| lock.contains(key))
    }

    /// Resets the session if the watchdog has taken its prepare lock away.
    pub fn reconcile_expired(&mut self) -> bool {
        // Only a finished release counts. While the watchdog is still
        // deregistering keys, a new WATCH could lose its registration.
        let expired = !self.claimed
            && self
                .prepare_lock
                .as_ref()
                .is_some_and(|lock| lock.phase() == LockPhase::Released);
        if expired {
            debug!(client.id = self.client_id, "Prepared transaction expired");
            self.reset();
        }
        expired
    }

    /// Registers the keys as watched at `ts`. Re-watching a key overwrites its timestamp.
    pub fn watch(&mut self, keys: &[Bytes], ts: i64) {
        self.state |= TxState::WATCH;
        let locks = self.coordinator.locks();
        for key in keys {
            locks.add_watch_key(self.client_id, key, true);
            self.watch_keys.insert(key.clone(), ts);
        }
    }

    /// Forgets all watched keys. No-op when not watching.
    pub fn unwatch(&mut self) {
        if !self.state.contains(TxState::WATCH) {
            return;
        }
        self.state.remove(TxState::WATCH);
        self.unwatch_keys();
    }

    fn unwatch_keys(&mut self) {
        let locks = self.coordinator.locks();
        for (key, _) in self.watch_keys.drain() {
            locks.remove_watch_key(self.client_id, &key);
        }
    }

    /// Enters `MULTI`, reserving an in-flight slot.
    pub fn begin_multi(&mut self) -> Result<(), SpinelKvError> {
        if self.state.contains(TxState::MULTI) {
            return Err(SpinelKvError::MultiNested);
        }
        self.permit = Some(self.coordinator.try_begin()?);
        self.state |= TxState::MULTI;
        self.queuing = true;
        Ok(())
    }

    /// Runs the prepare algorithm. On failure the transaction is discarded and
    /// the session returns to the idle state.
    pub async fn prepare(&mut self, registry: &CommandRegistry) -> Result<(), SpinelKvError> {
        if !self.state.contains(TxState::MULTI) {
            return Err(SpinelKvError::PrepareWithoutMulti);
        }
        if self.state.contains(TxState::PREPARE) {
            return Err(SpinelKvError::PrepareNested);
        }

        match self.try_prepare(registry).await {
            Ok(()) => {
                self.state |= TxState::PREPARE;
                metrics::TX_PREPARE_TOTAL.with_label_values(&["ok"]).inc();
                Ok(())
            }
            Err(e) => {
                let label = match e {
                    SpinelKvError::WatchKeyChanged => "watch_changed",
                    _ => "lock_fail",
                };
                metrics::TX_PREPARE_TOTAL.with_label_values(&[label]).inc();
                self.unwatch_keys();
                self.reset();
                Err(e)
            }
        }
    }

    async fn try_prepare(&mut self, registry: &CommandRegistry) -> Result<(), SpinelKvError> {
        self.prepare_state = PrepareState::None;
        if self.queue.is_empty() && self.watch_keys.is_empty() {
            return Ok(());
        }
        if self.watch_changed() {
            self.prepare_state = PrepareState::KeyModified;
            return Err(SpinelKvError::WatchKeyChanged);
        }
        if self.queue.is_empty() {
            return Ok(());
        }

        let update_keys: BTreeSet<Bytes> = self
            .queue
            .iter()
            .flat_map(|args| registry.write_keys(args))
            .filter(|key| !self.watch_keys.contains_key(key))
            .collect();
        if self.watch_keys.is_empty() && update_keys.is_empty() {
            return Ok(());
        }

        let locks = Arc::clone(self.coordinator.locks());
        let mut ordered: BTreeMap<Bytes, Arc<TxWatchKey>> = BTreeMap::new();
        for key in self.watch_keys.keys() {
            let watch_key = locks
                .watch_key(key)
                .unwrap_or_else(|| locks.add_watch_key(self.client_id, key, true));
            ordered.insert(key.clone(), watch_key);
        }
        for key in &update_keys {
            ordered.insert(key.clone(), locks.add_watch_key(self.client_id, key, false));
        }
        let keys: Vec<Arc<TxWatchKey>> = ordered.into_values().collect();

        let acquired = acquire_all(
            &keys,
            self.coordinator.lock_attempts,
            self.coordinator.lock_retry_backoff,
        )
        .await;
        let Some(mut held) = acquired else {
            for key in &update_keys {
                locks.remove_watch_key(self.client_id, key);
            }
            self.prepare_state = PrepareState::LockFail;
            return Err(SpinelKvError::PrepareLockFail);
        };

        // A write may have finished between the first check and the lock.
        if self.watch_changed() {
            while let Some(lock) = held.pop() {
                drop(lock);
            }
            for key in &update_keys {
                locks.remove_watch_key(self.client_id, key);
            }
            self.prepare_state = PrepareState::KeyModified;
            return Err(SpinelKvError::WatchKeyChanged);
        }

        self.prepare_lock = Some(PrepareLock::arm(
            self.client_id,
            locks,
            held,
            self.permit.take(),
            self.coordinator.prepare_timeout,
        ));
        self.prepare_state = PrepareState::Locked;
        Ok(())
    }

    fn watch_changed(&self) -> bool {
        let locks = self.coordinator.locks();
        self.watch_keys.iter().any(|(key, watched_at)| {
            locks
                .watch_key(key)
                .is_some_and(|watch_key| *watched_at < watch_key.modify_ts())
        })
    }

    /// Takes over the prepare lock for `EXEC`. Stops queuing and returns the
    /// queued commands. Fails with `PrepareLockTimeout` if the watchdog got
    /// there first, in which case the session is reset.
    pub fn begin_exec(&mut self) -> Result<Vec<Vec<Bytes>>, SpinelKvError> {
        if let Some(lock) = &self.prepare_lock {
            if !lock.claim() {
                lock.wait_released();
                self.reset();
                return Err(SpinelKvError::PrepareLockTimeout);
            }
            self.claimed = true;
        }
        self.queuing = false;
        Ok(std::mem::take(&mut self.queue))
    }

    /// Ends a transaction whose queue ran: releases the prepare lock, or the
    /// watch registrations when no lock was needed.
    pub fn finish_exec(&mut self) {
        match self.prepare_lock.take() {
            Some(lock) => lock.release(),
            None => self.unwatch_keys(),
        }
        self.reset();
    }

    /// The `DISCARD` path. Also runs when the connection goes away.
    pub fn discard(&mut self) {
        if self.state.is_empty() {
            return;
        }
        if self.state.contains(TxState::PREPARE) {
            match self.prepare_lock.take() {
                Some(lock) => {
                    if self.claimed || lock.claim() {
                        lock.release();
                    } else {
                        lock.wait_released();
                    }
                }
                None => self.unwatch_keys(),
            }
        } else if self.state.contains(TxState::WATCH) {
            self.unwatch_keys();
        }
        self.reset();
    }

    /// Returns to the idle state. Registrations must already be released.
    fn reset(&mut self) {
        self.state = TxState::empty();
        self.queuing = false;
        self.queue.clear();
        self.watch_keys.clear();
        self.prepare_state = PrepareState::None;
        self.prepare_lock = None;
        self.permit = None;
        self.claimed = false;
    }
}

impl Drop for TxSession {
    fn drop(&mut self) {
        self.discard();
    }
}
