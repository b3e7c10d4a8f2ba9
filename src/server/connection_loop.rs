// src/server/connection_loop.rs

//! Contains the main server loop for accepting connections and handling graceful shutdown.

use super::context::ServerContext;
use crate::connection::ConnectionHandler;
use crate::core::{SpinelKvError, metrics};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// How long connections get to finish after the shutdown signal.
const CLIENT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Accepts connections until `shutdown` resolves or a background task fails.
pub async fn run(mut ctx: ServerContext, shutdown: impl Future<Output = ()>) {
    let mut client_tasks = JoinSet::new();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown => {
                info!("Shutdown requested, stopping the accept loop.");
                break;
            }

            Some(res) = ctx.background_tasks.join_next() => {
                match res {
                    Ok(Ok(())) => warn!("A background task finished unexpectedly without an error."),
                    Ok(Err(e)) => { error!("CRITICAL: Background task failed: {}. Shutting down.", e); break; }
                    Err(e) => { error!("CRITICAL: Background task panicked: {e:?}. Shutting down."); break; }
                }
            },

            res = ctx.listener.accept() => {
                let (socket, addr) = match res {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                        continue;
                    }
                };
                ctx.state.stats.increment_total_connections();
                metrics::CONNECTIONS_RECEIVED_TOTAL.inc();

                let Ok(permit) = Arc::clone(&ctx.connection_permits).try_acquire_owned() else {
                    warn!("Rejecting connection from {}: max clients reached.", addr);
                    client_tasks.spawn(reject(socket));
                    continue;
                };

                info!("Accepted new connection from: {}", addr);
                let session_id = ctx.state.next_client_id();
                let state = Arc::clone(&ctx.state);
                let shutdown_rx = ctx.shutdown_tx.subscribe();
                client_tasks.spawn(async move {
                    let _permit = permit;
                    let mut handler = ConnectionHandler::new(socket, addr, state, session_id, shutdown_rx);
                    if let Err(e) = handler.run().await {
                        warn!("Connection from {} terminated unexpectedly: {}", addr, e);
                    }
                });
            },

            Some(res) = client_tasks.join_next() => {
                if let Err(e) = res
                    && e.is_panic()
                {
                    error!("A client handler panicked: {e:?}");
                }
            },
        }
    }

    info!("Shutting down. Sending signal to all tasks.");
    if ctx.shutdown_tx.send(()).is_err() {
        debug!("No task was listening for the shutdown signal.");
    }

    let drained = tokio::time::timeout(CLIENT_DRAIN_TIMEOUT, async {
        while client_tasks.join_next().await.is_some() {}
    })
    .await;
    if drained.is_err() {
        warn!("Timed out waiting for client connections to close.");
        client_tasks.shutdown().await;
    }
    info!("All client connections closed.");

    if tokio::time::timeout(Duration::from_secs(10), async {
        while ctx.background_tasks.join_next().await.is_some() {}
    })
    .await
    .is_err()
    {
        warn!("Timed out waiting for background tasks to finish cleanly.");
    };
    info!("Server shutdown complete.");
}

/// Tells an over-limit client why it is being turned away, then closes.
async fn reject(mut socket: TcpStream) {
    let reply = format!("-{}\r\n", SpinelKvError::MaxClients);
    if let Err(e) = socket.write_all(reply.as_bytes()).await {
        debug!("Failed to send max-clients error: {}", e);
    }
    let _ = socket.shutdown().await;
}
