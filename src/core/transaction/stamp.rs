// src/core/transaction/stamp.rs

//! Modify-timestamp stamping for ordinary writes.

use super::TxWatchKey;
use super::clock::now_nanos;
use super::session::TxSession;
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;

/// Held by a write command for the duration of its handler.
///
/// For each watched key the write touches, the key mutex is held unless the
/// writing session already owns it through its prepare lock. On drop every key
/// is stamped with a fresh clock reading and the mutexes are released in
/// reverse order.
#[derive(Debug, Default)]
pub struct ModifyStamp {
    held: Vec<(Arc<TxWatchKey>, Option<OwnedMutexGuard<()>>)>,
}

impl ModifyStamp {
    /// Locks the watched keys among `keys`. Keys are sorted and de-duplicated
    /// first, so concurrent multi-key writers take mutexes in the same order.
    ///
    /// A key can become watched while this waits for another key's mutex. The
    /// watched set is read again once every mutex is held, and the whole set is
    /// retaken in order if it grew.
    pub async fn acquire(session: &TxSession, mut keys: Vec<Bytes>) -> Self {
        keys.sort_unstable();
        keys.dedup();
        loop {
            let watched = watched_keys(session, &keys);
            let mut held = Vec::with_capacity(watched.len());
            for (key, watch_key) in watched {
                let guard = if session.holds_lock_on(&key) {
                    None
                } else {
                    Some(watch_key.lock().await)
                };
                held.push((watch_key, guard));
            }

            let stable = watched_keys(session, &keys)
                .iter()
                .all(|(_, watch_key)| held.iter().any(|(h, _)| Arc::ptr_eq(h, watch_key)));
            if stable {
                return Self { held };
            }
            // Nothing is written yet: release without stamping.
            while let Some((_, guard)) = held.pop() {
                drop(guard);
            }
        }
    }

    /// Number of keys that will be stamped.
    pub fn len(&self) -> usize {
        self.held.len()
    }

    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }
}

fn watched_keys(session: &TxSession, keys: &[Bytes]) -> Vec<(Bytes, Arc<TxWatchKey>)> {
    let locks = session.coordinator().locks();
    keys.iter()
        .filter_map(|key| locks.watch_key(key).map(|watch_key| (key.clone(), watch_key)))
        .filter(|(_, watch_key)| watch_key.is_watched())
        .collect()
}

impl Drop for ModifyStamp {
    fn drop(&mut self) {
        if self.held.is_empty() {
            return;
        }
        let ts = now_nanos();
        while let Some((watch_key, guard)) = self.held.pop() {
            watch_key.store_modify_ts(ts);
            drop(guard);
        }
    }
}
