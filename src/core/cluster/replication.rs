// src/core/cluster/replication.rs

//! The replicate-then-apply hook.
//!
//! For write commands the dispatcher hands the raw request to a `ReplicationHook`
//! before applying it locally. The hook decides whether the write is durable;
//! an error aborts the command and is sent to the client.

use crate::connection::SessionState;
use crate::core::SpinelKvError;
use crate::core::handler::Dispatcher;
use crate::core::state::ServerState;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::VecDeque;
use std::fmt::Debug;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

#[async_trait]
pub trait ReplicationHook: Send + Sync + Debug {
    /// False when the node runs as a degraded single node; writes then apply directly.
    fn is_active(&self) -> bool;

    async fn replicate(&self, request: &[Bytes], key_hash: u32) -> Result<(), SpinelKvError>;
}

/// No replication: every write applies locally at once.
#[derive(Debug, Default)]
pub struct NoReplication;

#[async_trait]
impl ReplicationHook for NoReplication {
    fn is_active(&self) -> bool {
        false
    }

    async fn replicate(&self, _request: &[Bytes], _key_hash: u32) -> Result<(), SpinelKvError> {
        Ok(())
    }
}

/// One replicated write.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub index: u64,
    pub key_hash: u32,
    pub request: Vec<Bytes>,
}

#[derive(Debug)]
struct Inner {
    entries: VecDeque<LogEntry>,
    next_index: u64,
}

/// A bounded, ordered, in-memory log of replicated writes. Once full, the
/// oldest entries are dropped.
#[derive(Debug)]
pub struct ReplicationLog {
    inner: Mutex<Inner>,
    capacity: usize,
}

impl ReplicationLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: VecDeque::with_capacity(capacity.min(16384)),
                next_index: 1,
            }),
            capacity: capacity.max(1),
        }
    }

    /// A snapshot of the retained entries, oldest first.
    pub async fn entries(&self) -> Vec<LogEntry> {
        self.inner.lock().await.entries.iter().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Applies every retained entry to `state`, in order, through a virtual
    /// session that skips replication. Returns the number of entries replayed.
    pub async fn replay_into(&self, state: &Arc<ServerState>) -> Result<usize, SpinelKvError> {
        let entries = self.entries().await;
        let mut session = SessionState::new_virtual(Arc::clone(state));
        for entry in &entries {
            Dispatcher::handle_request(&mut session, entry.request.clone()).await?;
            session.writer.clear();
        }
        debug!(entries = entries.len(), "Replayed replication log");
        Ok(entries.len())
    }
}

#[async_trait]
impl ReplicationHook for ReplicationLog {
    fn is_active(&self) -> bool {
        true
    }

    async fn replicate(&self, request: &[Bytes], key_hash: u32) -> Result<(), SpinelKvError> {
        let mut inner = self.inner.lock().await;
        if inner.entries.len() == self.capacity {
            inner.entries.pop_front();
        }
        let index = inner.next_index;
        inner.next_index += 1;
        inner.entries.push_back(LogEntry {
            index,
            key_hash,
            request: request.to_vec(),
        });
        Ok(())
    }
}
