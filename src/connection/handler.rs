// src/connection/handler.rs

//! Defines the `ConnectionHandler` which manages the full lifecycle of a client connection.

use super::guard::ConnectionGuard;
use super::session::SessionState;
use crate::core::handler::Dispatcher;
use crate::core::protocol::RequestCodec;
use crate::core::state::ServerState;
use crate::core::{SpinelKvError, metrics};
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

/// What the next read from the socket produced.
enum Incoming {
    Request(Vec<Bytes>),
    Closed,
    TimedOut,
    Failed(SpinelKvError),
}

/// Runs the read-dispatch-write loop of one client.
pub struct ConnectionHandler {
    framed: Framed<TcpStream, RequestCodec>,
    addr: SocketAddr,
    state: Arc<ServerState>,
    shutdown_rx: broadcast::Receiver<()>,
    session: SessionState,
}

impl ConnectionHandler {
    pub fn new(
        socket: TcpStream,
        addr: SocketAddr,
        state: Arc<ServerState>,
        session_id: u64,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Self {
        let session = SessionState::new(Arc::clone(&state), session_id, Some(addr));
        Self {
            framed: Framed::new(socket, RequestCodec),
            addr,
            state,
            shutdown_rx,
            session,
        }
    }

    /// Serves requests until the client leaves, misbehaves, idles past its
    /// deadline, sends `QUIT`, or the server shuts down. Transaction state is
    /// released when the session drops, whichever way the loop ends.
    pub async fn run(&mut self) -> Result<(), SpinelKvError> {
        let _guard = ConnectionGuard::new(Arc::clone(&self.state), self.session.id, self.addr);
        loop {
            let deadline = self
                .state
                .admission
                .read_timeout(self.state.config.keepalive);

            let incoming = tokio::select! {
                biased;
                _ = self.shutdown_rx.recv() => {
                    info!("Connection handler for {} received shutdown signal.", self.addr);
                    break;
                }
                incoming = next_request(&mut self.framed, deadline) => incoming,
            };

            let request = match incoming {
                Incoming::Request(request) => request,
                Incoming::Closed => {
                    debug!("Connection from {} closed by peer.", self.addr);
                    break;
                }
                Incoming::TimedOut => {
                    debug!("Connection from {} idle past its read deadline.", self.addr);
                    break;
                }
                Incoming::Failed(e) if e.is_protocol_error() => {
                    metrics::PROTOCOL_ERRORS_TOTAL.inc();
                    debug!("Protocol error from {}: {}", self.addr, e);
                    break;
                }
                Incoming::Failed(e) => {
                    if is_normal_disconnect(&e) {
                        debug!("Connection from {} closed: {}", self.addr, e);
                    } else {
                        warn!("Connection error for {}: {}", self.addr, e);
                    }
                    break;
                }
            };

            Dispatcher::handle_request(&mut self.session, request).await?;
            let reply = self.session.writer.take();
            if !reply.is_empty() {
                self.framed.send(reply).await?;
            }
            if self.session.quit {
                debug!("Client {} sent QUIT.", self.addr);
                break;
            }
        }
        Ok(())
    }
}

async fn next_request(
    framed: &mut Framed<TcpStream, RequestCodec>,
    deadline: Option<Duration>,
) -> Incoming {
    let next = match deadline {
        Some(deadline) => match tokio::time::timeout(deadline, framed.next()).await {
            Ok(next) => next,
            Err(_) => return Incoming::TimedOut,
        },
        None => framed.next().await,
    };
    match next {
        Some(Ok(request)) => Incoming::Request(request),
        Some(Err(e)) => Incoming::Failed(e),
        None => Incoming::Closed,
    }
}

/// Resets, broken pipes and a partial frame left at EOF are ordinary ways for
/// a client to go away.
fn is_normal_disconnect(e: &SpinelKvError) -> bool {
    matches!(e, SpinelKvError::Io(arc_err) if matches!(
        arc_err.kind(),
        std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::UnexpectedEof
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::Other
    ))
}
