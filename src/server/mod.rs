// src/server/mod.rs

//! Process-level server: listener setup, the accept loop, background tasks
//! and graceful shutdown.

use crate::config::Config;
use crate::core::state::ServerState;
use anyhow::{Context, Result};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal::unix::{SignalKind, signal};
use tracing::info;

mod connection_loop;
mod context;
mod initialization;
mod metrics_server;
mod spawner;

pub use context::ServerContext;

/// The main server startup function. Runs until SIGINT or SIGTERM.
pub async fn run(config: Config) -> Result<()> {
    let mut sigint =
        signal(SignalKind::interrupt()).context("Failed to register SIGINT handler")?;
    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to register SIGTERM handler")?;
    let shutdown = async move {
        tokio::select! {
            _ = sigint.recv() => info!("SIGINT received, initiating graceful shutdown."),
            _ = sigterm.recv() => info!("SIGTERM received, initiating graceful shutdown."),
        }
    };

    let mut server_context = initialization::setup(config).await?;
    spawner::spawn_all(&mut server_context).await?;
    connection_loop::run(server_context, shutdown).await;
    Ok(())
}

/// Serves an already-built state on an already-bound listener until
/// `shutdown` resolves. Background tasks are spawned as in `run`.
pub async fn serve(
    state: Arc<ServerState>,
    listener: TcpListener,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    let mut server_context = ServerContext::new(state, listener);
    spawner::spawn_all(&mut server_context).await?;
    connection_loop::run(server_context, shutdown).await;
    Ok(())
}
