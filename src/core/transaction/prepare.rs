// src/core/transaction/prepare.rs

//! The prepare lock: exclusive ownership of every key a prepared transaction
//! will read-check or write, plus the watchdog that takes it back from clients
//! that never send `EXEC` or `DISCARD`.
//!
//! The lock moves through `Locked -> Releasing -> Released`. Exactly one party
//! wins the `Locked -> Releasing` transition: the owning session when it runs
//! `EXEC`/`DISCARD`, or the watchdog when the timeout fires first. The winner
//! performs the release; the loser does nothing.

use super::TxPermit;
use super::locker::{TxShardLocker, TxWatchKey};
use crate::core::metrics;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;
use tokio::sync::{OwnedMutexGuard, oneshot};
use tracing::{debug, warn};

/// A key mutex held on behalf of a transaction.
pub type HeldLock = (Arc<TxWatchKey>, OwnedMutexGuard<()>);

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[repr(u8)]
pub enum LockPhase {
    Locked = 0,
    Releasing = 1,
    Released = 2,
}

impl LockPhase {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => LockPhase::Locked,
            1 => LockPhase::Releasing,
            _ => LockPhase::Released,
        }
    }
}

/// Try-locks `keys` in order, all or nothing, up to `attempts` times.
///
/// A failed attempt drops every guard it took before sleeping, so a caller
/// never waits while holding part of the set.
pub async fn acquire_all(
    keys: &[Arc<TxWatchKey>],
    attempts: u32,
    backoff: Duration,
) -> Option<Vec<HeldLock>> {
    for attempt in 1..=attempts {
        let mut held: Vec<HeldLock> = Vec::with_capacity(keys.len());
        let mut complete = true;
        for key in keys {
            match key.try_lock() {
                Some(guard) => held.push((Arc::clone(key), guard)),
                None => {
                    complete = false;
                    break;
                }
            }
        }
        if complete {
            return Some(held);
        }

        while let Some(lock) = held.pop() {
            drop(lock);
        }
        debug!(attempt, "prepare try-lock contended");
        if attempt < attempts {
            tokio::time::sleep(backoff).await;
        }
    }
    None
}

/// Locks held by one prepared transaction.
#[derive(Debug)]
pub struct PrepareLock {
    client_id: u64,
    locks: Arc<TxShardLocker>,
    phase: AtomicU8,
    keys: HashSet<Bytes>,
    held: Mutex<Vec<HeldLock>>,
    permit: Mutex<Option<TxPermit>>,
    release_tx: Mutex<Option<oneshot::Sender<()>>>,
}

impl PrepareLock {
    /// Wraps the acquired guards and starts the watchdog.
    pub fn arm(
        client_id: u64,
        locks: Arc<TxShardLocker>,
        held: Vec<HeldLock>,
        permit: Option<TxPermit>,
        timeout: Duration,
    ) -> Arc<Self> {
        let (release_tx, release_rx) = oneshot::channel();
        let keys = held.iter().map(|(key, _)| key.key().clone()).collect();
        let lock = Arc::new(Self {
            client_id,
            locks,
            phase: AtomicU8::new(LockPhase::Locked as u8),
            keys,
            held: Mutex::new(held),
            permit: Mutex::new(permit),
            release_tx: Mutex::new(Some(release_tx)),
        });

        let watchdog = Arc::clone(&lock);
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(timeout) => {
                    if watchdog.claim() {
                        warn!(
                            client.id = watchdog.client_id,
                            keys = watchdog.keys.len(),
                            "Prepare lock not released after {:?}; releasing it.",
                            timeout
                        );
                        metrics::TX_WATCHDOG_EXPIRED_TOTAL.inc();
                        watchdog.release();
                    }
                }
                _ = release_rx => {}
            }
        });

        lock
    }

    pub fn phase(&self) -> LockPhase {
        LockPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    pub fn is_locked(&self) -> bool {
        self.phase() == LockPhase::Locked
    }

    pub fn client_id(&self) -> u64 {
        self.client_id
    }

    /// True if `key` is one of the locked keys.
    pub fn contains(&self, key: &[u8]) -> bool {
        self.keys.contains(key)
    }

    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    /// Moves `Locked -> Releasing`. Returns true for the single caller that wins
    /// and must then call `release`. Winning also stops the watchdog timer.
    pub fn claim(&self) -> bool {
        let won = self
            .phase
            .compare_exchange(
                LockPhase::Locked as u8,
                LockPhase::Releasing as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        if won && let Some(tx) = self.release_tx.lock().take() {
            let _ = tx.send(());
        }
        won
    }

    /// Waits for the `claim` winner to finish `release`. The release holds no
    /// await point, so the wait is short and never crosses a suspension.
    pub fn wait_released(&self) {
        while self.phase() != LockPhase::Released {
            std::thread::yield_now();
        }
    }

    /// Unlocks every key in reverse acquisition order, deregisters the client
    /// from them and returns the transaction permit. Only the `claim` winner
    /// calls this.
    pub fn release(&self) {
        let held = std::mem::take(&mut *self.held.lock());
        for (key, guard) in held.into_iter().rev() {
            drop(guard);
            self.locks.remove_watch_key(self.client_id, key.key());
        }
        self.permit.lock().take();
        self.phase.store(LockPhase::Released as u8, Ordering::Release);
    }
}
