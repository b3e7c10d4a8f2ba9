// src/connection/guard.rs

//! Defines `ConnectionGuard`, an RAII guard for connection resource management.

use crate::core::metrics;
use crate::core::state::ServerState;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::debug;

/// Keeps the client registry and the connected-clients gauge in step with the
/// set of live connections, whichever way the handler exits.
pub struct ConnectionGuard {
    pub(crate) state: Arc<ServerState>,
    pub(crate) session_id: u64,
    pub(crate) addr: SocketAddr,
}

impl ConnectionGuard {
    /// Registers the client and bumps the gauge.
    pub(crate) fn new(state: Arc<ServerState>, session_id: u64, addr: SocketAddr) -> Self {
        state.clients.insert(session_id, addr);
        metrics::CONNECTED_CLIENTS.inc();
        Self {
            state,
            session_id,
            addr,
        }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        metrics::CONNECTED_CLIENTS.dec();
        if self.state.clients.remove(&self.session_id).is_none() {
            debug!(client.id = self.session_id, "Client was not registered upon cleanup");
        }
        debug!("Cleaned up connection {}", self.addr);
    }
}
