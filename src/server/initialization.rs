// src/server/initialization.rs

//! Builds the server state and binds the listener.

use super::context::ServerContext;
use crate::config::Config;
use crate::core::state::ServerState;
use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Initializes all server components before starting the main loop.
pub async fn setup(config: Config) -> Result<ServerContext> {
    log_startup_info(&config);

    let state = ServerState::initialize(config).context("Failed to initialize server state")?;
    let listener = TcpListener::bind((state.config.host.as_str(), state.config.port))
        .await
        .with_context(|| {
            format!(
                "Failed to bind {}:{}",
                state.config.host, state.config.port
            )
        })?;
    info!(
        "SpinelKV server listening on {}:{}",
        state.config.host, state.config.port
    );

    Ok(ServerContext::new(state, listener))
}

/// Logs key configuration parameters at startup.
fn log_startup_info(config: &Config) {
    if config.transaction.enabled {
        info!(
            shards = config.transaction.shards,
            parallel_limit = config.transaction.parallel_limit,
            prepare_timeout = ?config.transaction.prepare_timeout,
            "Distributed transactions enabled."
        );
    } else {
        warn!("Distributed transactions are disabled; WATCH/MULTI/EXEC will be rejected.");
    }
    if config.cluster.enabled {
        info!(
            "Server starting in CLUSTER mode, serving slots {:?}, redirecting to {}.",
            config.cluster.owned_slots, config.cluster.redirect_addr
        );
    } else {
        info!("Server starting in STANDALONE mode.");
    }
    if config.replication.enabled {
        info!(
            "Writes go through the in-process replication log (capacity {}).",
            config.replication.log_capacity
        );
    }
}
