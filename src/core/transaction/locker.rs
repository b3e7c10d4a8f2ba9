// src/core/transaction/locker.rs

//! The process-wide registry of keys that some transaction cares about.
//!
//! A key enters the registry on its first `WATCH`, or when a `PREPARE` needs
//! to lock it, and leaves when the last interested client deregisters. Writers
//! consult the registry to stamp modify timestamps on watched keys.

use crate::core::cluster::slot::crc32;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One key that at least one client is interested in.
#[derive(Debug)]
pub struct TxWatchKey {
    key: Bytes,
    /// Set once any client has watched the key. Never cleared.
    watched: AtomicBool,
    /// Timestamp of the last write, in nanoseconds.
    modify_ts: AtomicI64,
    /// Held during a prepare critical section and by writers stamping the key.
    mu: Arc<Mutex<()>>,
}

impl TxWatchKey {
    fn new(key: Bytes, watched: bool) -> Self {
        Self {
            key,
            watched: AtomicBool::new(watched),
            modify_ts: AtomicI64::new(0),
            mu: Arc::new(Mutex::new(())),
        }
    }

    pub fn key(&self) -> &Bytes {
        &self.key
    }

    pub fn is_watched(&self) -> bool {
        self.watched.load(Ordering::Acquire)
    }

    pub fn modify_ts(&self) -> i64 {
        self.modify_ts.load(Ordering::Acquire)
    }

    /// Records a write. The timestamp never moves backwards.
    pub fn store_modify_ts(&self, ts: i64) {
        self.modify_ts.fetch_max(ts, Ordering::AcqRel);
    }

    /// Takes the key mutex if it is free.
    pub fn try_lock(&self) -> Option<OwnedMutexGuard<()>> {
        Arc::clone(&self.mu).try_lock_owned().ok()
    }

    /// Waits for the key mutex.
    pub async fn lock(&self) -> OwnedMutexGuard<()> {
        Arc::clone(&self.mu).lock_owned().await
    }
}

#[derive(Debug)]
struct WatchEntry {
    key: Arc<TxWatchKey>,
    clients: HashSet<u64>,
}

/// One shard of the registry.
#[derive(Debug, Default)]
pub struct TxLocker {
    keys: RwLock<HashMap<Bytes, WatchEntry>>,
}

impl TxLocker {
    /// Registers `client_id` as interested in `key`, creating the entry if
    /// needed. Passing `watched = true` marks the key as watched.
    pub fn add_watch_key(&self, client_id: u64, key: &Bytes, watched: bool) -> Arc<TxWatchKey> {
        let mut keys = self.keys.write();
        let entry = keys.entry(key.clone()).or_insert_with(|| WatchEntry {
            key: Arc::new(TxWatchKey::new(key.clone(), watched)),
            clients: HashSet::new(),
        });
        if watched {
            entry.key.watched.store(true, Ordering::Release);
        }
        entry.clients.insert(client_id);
        Arc::clone(&entry.key)
    }

    /// Removes `client_id` from `key`. The entry is dropped once nobody is left.
    pub fn remove_watch_key(&self, client_id: u64, key: &[u8]) {
        let mut keys = self.keys.write();
        if let Some(entry) = keys.get_mut(key) {
            entry.clients.remove(&client_id);
            if entry.clients.is_empty() {
                keys.remove(key);
            }
        }
    }

    pub fn get_watch_key(&self, key: &[u8]) -> Option<Arc<TxWatchKey>> {
        self.keys.read().get(key).map(|entry| Arc::clone(&entry.key))
    }

    /// Number of clients registered on `key`.
    pub fn client_count(&self, key: &[u8]) -> usize {
        self.keys.read().get(key).map_or(0, |entry| entry.clients.len())
    }

    pub fn len(&self) -> usize {
        self.keys.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A fixed set of `TxLocker` shards selected by CRC32 of the full key name.
#[derive(Debug)]
pub struct TxShardLocker {
    shards: Vec<TxLocker>,
}

impl TxShardLocker {
    pub fn new(shards: usize) -> Self {
        let shards = shards.max(1);
        Self {
            shards: (0..shards).map(|_| TxLocker::default()).collect(),
        }
    }

    pub fn shard_for(&self, key: &[u8]) -> &TxLocker {
        &self.shards[crc32(key) as usize % self.shards.len()]
    }

    pub fn add_watch_key(&self, client_id: u64, key: &Bytes, watched: bool) -> Arc<TxWatchKey> {
        self.shard_for(key).add_watch_key(client_id, key, watched)
    }

    pub fn remove_watch_key(&self, client_id: u64, key: &[u8]) {
        self.shard_for(key).remove_watch_key(client_id, key)
    }

    pub fn watch_key(&self, key: &[u8]) -> Option<Arc<TxWatchKey>> {
        self.shard_for(key).get_watch_key(key)
    }

    pub fn client_count(&self, key: &[u8]) -> usize {
        self.shard_for(key).client_count(key)
    }

    /// Total number of registered keys across all shards.
    pub fn tracked_keys(&self) -> usize {
        self.shards.iter().map(TxLocker::len).sum()
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }
}
