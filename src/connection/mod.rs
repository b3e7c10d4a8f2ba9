// src/connection/mod.rs

//! Manages the lifecycle of a single client TCP connection: request decoding,
//! dispatch, reply flushing and session cleanup.

mod guard;
mod handler;
mod session;

pub use guard::ConnectionGuard;
pub use handler::ConnectionHandler;
pub use session::SessionState;
