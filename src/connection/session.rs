// src/connection/session.rs

//! Defines the state associated with a single client session.

use crate::core::protocol::ReplyWriter;
use crate::core::state::ServerState;
use crate::core::transaction::TxSession;
use crate::core::transaction::clock::now_nanos;
use std::net::SocketAddr;
use std::sync::Arc;

/// Holds the state specific to a single client session.
///
/// Sessions backed by a socket are created by the accept loop. Virtual
/// sessions have no socket and are used to replay replicated writes through
/// the same dispatch path.
#[derive(Debug)]
pub struct SessionState {
    pub id: u64,
    /// `None` for virtual sessions.
    pub addr: Option<SocketAddr>,
    pub state: Arc<ServerState>,
    pub writer: ReplyWriter,
    /// Clock reading taken when the current request started.
    pub query_start: i64,
    /// Routing hash of the current request's key, 0 for keyless commands.
    pub key_hash: u32,
    pub tx: TxSession,
    /// Writes from this session skip the replication hook.
    pub bypass_replication: bool,
    /// Set by `QUIT`. The connection closes after flushing the reply.
    pub quit: bool,
}

impl SessionState {
    pub fn new(state: Arc<ServerState>, id: u64, addr: Option<SocketAddr>) -> Self {
        let tx = TxSession::new(Arc::clone(&state.tx), id);
        Self {
            id,
            addr,
            state,
            writer: ReplyWriter::new(),
            query_start: now_nanos(),
            key_hash: 0,
            tx,
            bypass_replication: false,
            quit: false,
        }
    }

    /// A socket-less session whose writes are applied without replication.
    pub fn new_virtual(state: Arc<ServerState>) -> Self {
        let id = state.next_client_id();
        let mut session = Self::new(state, id, None);
        session.bypass_replication = true;
        session
    }

    pub fn is_virtual(&self) -> bool {
        self.addr.is_none()
    }
}
