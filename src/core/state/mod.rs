// src/core/state/mod.rs

//! The shared runtime state of the server.

mod core;
mod stats;

pub use self::core::{Collaborators, ServerState};
pub use stats::StatsState;
