// src/core/handler/mod.rs

//! Request dispatch: the command-independent policy that runs before every
//! handler, and the transaction commands that act on the session itself.

pub mod dispatcher;
pub mod transaction_handler;

pub use dispatcher::Dispatcher;
