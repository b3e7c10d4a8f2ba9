// src/core/latency.rs

//! Implements the slow log: a bounded history of commands whose execution
//! took longer than the configured threshold. This is the backend of `SLOWLOG`.

use crate::core::RespValue;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};

/// The maximum length of a single key to be stored in the slow log.
/// This prevents very large keys from consuming excessive memory.
const SLOWLOG_MAX_ARG_LEN: usize = 128;

/// Receives one report per slow command.
pub trait SlowLogSink: Send + Sync + std::fmt::Debug {
    fn send(&self, command: &str, key: &[u8], cost_ns: u64);
}

/// Represents a single slow log entry.
#[derive(Debug, Clone)]
pub struct SlowLogEntry {
    pub id: u64,
    /// Unix time in seconds when the entry was recorded.
    pub timestamp: u64,
    pub cost_ns: u64,
    pub command: String,
    pub key: Bytes,
}

#[derive(Debug)]
struct SlowLogInner {
    entries: VecDeque<SlowLogEntry>,
    next_id: u64,
}

/// A capacity-bounded ring of slow log entries.
#[derive(Debug)]
pub struct SlowLog {
    inner: Mutex<SlowLogInner>,
    capacity: usize,
}

impl SlowLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(SlowLogInner {
                entries: VecDeque::with_capacity(capacity.min(1024)),
                next_id: 0,
            }),
            capacity,
        }
    }

    /// Adds an entry. If the ring is full, the oldest entry is removed.
    /// Long keys are truncated.
    pub fn record(&self, command: &str, key: &[u8], cost_ns: u64) {
        if self.capacity == 0 {
            return;
        }
        let key = if key.len() > SLOWLOG_MAX_ARG_LEN {
            let mut truncated = key[..SLOWLOG_MAX_ARG_LEN].to_vec();
            truncated.extend_from_slice(b"... (truncated)");
            Bytes::from(truncated)
        } else {
            Bytes::copy_from_slice(key)
        };
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        let mut inner = self.inner.lock();
        if inner.entries.len() == self.capacity {
            inner.entries.pop_front();
        }
        let id = inner.next_id;
        inner.next_id += 1;
        inner.entries.push_back(SlowLogEntry {
            id,
            timestamp,
            cost_ns,
            command: command.to_string(),
            key,
        });
    }

    /// The newest `count` entries, newest first.
    pub fn latest(&self, count: usize) -> Vec<SlowLogEntry> {
        let inner = self.inner.lock();
        inner.entries.iter().rev().take(count).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn reset(&self) {
        self.inner.lock().entries.clear();
    }

    /// Implements `SLOWLOG GET [count]`.
    pub fn get_slow_log(&self, count: Option<usize>) -> RespValue {
        let logs = self
            .latest(count.unwrap_or(10))
            .into_iter()
            .map(|entry| {
                RespValue::Array(vec![
                    RespValue::Integer(entry.id as i64),
                    RespValue::Integer(entry.timestamp as i64),
                    // Cost in microseconds.
                    RespValue::Integer((entry.cost_ns / 1_000) as i64),
                    RespValue::Array(vec![
                        RespValue::BulkString(Bytes::from(entry.command)),
                        RespValue::BulkString(entry.key),
                    ]),
                ])
            })
            .collect();
        RespValue::Array(logs)
    }
}

impl Default for SlowLog {
    fn default() -> Self {
        Self::new(128)
    }
}

impl SlowLogSink for SlowLog {
    fn send(&self, command: &str, key: &[u8], cost_ns: u64) {
        self.record(command, key, cost_ns);
    }
}
