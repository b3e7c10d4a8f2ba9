// src/server/spawner.rs

//! Spawns the long-running tasks that live next to the accept loop.

use super::context::ServerContext;
use super::metrics_server;
use anyhow::Result;
use std::sync::Arc;

/// Spawns every background task the configuration asks for.
pub async fn spawn_all(ctx: &mut ServerContext) -> Result<()> {
    if ctx.state.config.metrics.enabled {
        let state = Arc::clone(&ctx.state);
        let shutdown_rx = ctx.shutdown_tx.subscribe();
        ctx.background_tasks
            .spawn(async move { metrics_server::run_metrics_server(state, shutdown_rx).await });
    }
    Ok(())
}
