// src/core/mod.rs

//! The central module containing the core logic and data structures of SpinelKV.

pub mod cluster;
pub mod commands;
pub mod errors;
pub mod handler;
pub mod latency;
pub mod metrics;
pub mod protocol;
pub mod scripting;
pub mod state;
pub mod storage;
pub mod transaction;

pub use errors::SpinelKvError;
pub use protocol::RespValue;
