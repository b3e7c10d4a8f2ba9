// src/core/cluster/mod.rs

//! Collaborators at the edge of the dispatcher: key hashing and slot ownership,
//! the replicate-then-apply hook and admission control.

pub mod admission;
pub mod redirect;
pub mod replication;
pub mod slot;

pub use admission::{AdmissionControl, KeepAlive};
pub use redirect::{LocalOwnership, RedirectCheck, SlotOwnership, UnlockGuard};
pub use replication::{LogEntry, NoReplication, ReplicationHook, ReplicationLog};
