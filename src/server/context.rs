// src/server/context.rs

use crate::core::state::ServerState;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{Semaphore, broadcast};
use tokio::task::JoinSet;

/// Holds all the initialized state required to run the server's main loop.
pub struct ServerContext {
    pub state: Arc<ServerState>,
    pub listener: TcpListener,
    pub shutdown_tx: broadcast::Sender<()>,
    pub background_tasks: JoinSet<Result<(), anyhow::Error>>,
    /// One permit per connected client, `max_clients` in total.
    pub connection_permits: Arc<Semaphore>,
}

impl ServerContext {
    pub fn new(state: Arc<ServerState>, listener: TcpListener) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let connection_permits = Arc::new(Semaphore::new(state.config.max_clients));
        Self {
            state,
            listener,
            shutdown_tx,
            background_tasks: JoinSet::new(),
            connection_permits,
        }
    }
}
