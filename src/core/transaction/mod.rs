// src/core/transaction/mod.rs

//! Cross-connection coordination for `WATCH`/`MULTI`/`PREPARE`/`EXEC`/`DISCARD`.
//!
//! `TxCoordinator` is the process-wide part: the sharded key registry, the
//! in-flight transaction ceiling and the prepare tunables. `TxSession` is the
//! per-connection part and lives inside each `SessionState`.

pub mod clock;
pub mod locker;
pub mod prepare;
pub mod session;
pub mod stamp;

pub use locker::{TxLocker, TxShardLocker, TxWatchKey};
pub use prepare::{LockPhase, PrepareLock};
pub use session::{PrepareState, TxSession, TxState};
pub use stamp::ModifyStamp;

use crate::config::TransactionConfig;
use crate::core::{SpinelKvError, metrics};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

/// Shared transaction machinery, owned by `ServerState`.
#[derive(Debug)]
pub struct TxCoordinator {
    enabled: bool,
    locks: Arc<TxShardLocker>,
    in_flight: Arc<AtomicI64>,
    parallel_limit: i64,
    prepare_timeout: Duration,
    lock_attempts: u32,
    lock_retry_backoff: Duration,
}

impl TxCoordinator {
    pub fn new(config: &TransactionConfig) -> Self {
        Self {
            enabled: config.enabled,
            locks: Arc::new(TxShardLocker::new(config.shards)),
            in_flight: Arc::new(AtomicI64::new(0)),
            parallel_limit: config.parallel_limit as i64,
            prepare_timeout: config.prepare_timeout,
            lock_attempts: config.lock_attempts,
            lock_retry_backoff: config.lock_retry_backoff,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn locks(&self) -> &Arc<TxShardLocker> {
        &self.locks
    }

    /// Transactions currently between `MULTI` and their end.
    pub fn in_flight(&self) -> i64 {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn prepare_timeout(&self) -> Duration {
        self.prepare_timeout
    }

    /// Reserves an in-flight slot for a new `MULTI`.
    pub fn try_begin(&self) -> Result<TxPermit, SpinelKvError> {
        let limit = self.parallel_limit;
        self.in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < limit).then_some(n + 1)
            })
            .map_err(|_| SpinelKvError::TxQpsLimit)?;
        metrics::TX_IN_FLIGHT.inc();
        Ok(TxPermit {
            counter: Arc::clone(&self.in_flight),
        })
    }
}

/// One in-flight transaction slot. Dropping it frees the slot.
#[derive(Debug)]
pub struct TxPermit {
    counter: Arc<AtomicI64>,
}

impl Drop for TxPermit {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::AcqRel);
        metrics::TX_IN_FLIGHT.dec();
    }
}
