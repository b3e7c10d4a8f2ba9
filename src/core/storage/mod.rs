// src/core/storage/mod.rs

//! The storage engine boundary.
//!
//! The command layer talks to storage only through these per-type traits, so
//! any engine that implements `Engine` can sit behind the dispatcher.
//! `MemoryEngine` is the in-process implementation.

pub mod memory;
pub mod value;

pub use memory::MemoryEngine;
pub use value::{DataValue, StoredValue, ZSet};

use crate::core::SpinelKvError;
use bytes::Bytes;
use std::time::Duration;

/// The remaining lifetime of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    Missing,
    Persistent,
    Expires(Duration),
}

/// Precondition for `SET`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SetCondition {
    #[default]
    Always,
    /// `NX`
    IfMissing,
    /// `XX`
    IfExists,
}

#[derive(Debug, Clone, Default)]
pub struct SetOptions {
    pub expiry: Option<Duration>,
    pub condition: SetCondition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListEnd {
    Left,
    Right,
}

pub trait KeyOps {
    fn del(&self, key: &[u8]) -> bool;
    fn exists(&self, key: &[u8]) -> bool;
    fn key_type(&self, key: &[u8]) -> Option<&'static str>;
    /// Sets a relative expiry. Returns false if the key does not exist.
    fn expire(&self, key: &[u8], ttl: Duration) -> bool;
    fn persist(&self, key: &[u8]) -> bool;
    fn ttl(&self, key: &[u8]) -> KeyTtl;
    fn keys(&self, pattern: &str) -> Vec<Bytes>;
    /// Returns the next cursor (0 when done) and up to `count` keys.
    fn scan(&self, cursor: u64, pattern: Option<&str>, count: usize) -> (u64, Vec<Bytes>);
    fn dbsize(&self) -> usize;
    fn flush(&self);
}

pub trait StringOps {
    fn get(&self, key: &[u8]) -> Result<Option<Bytes>, SpinelKvError>;
    /// Returns false when the `SET` condition was not met.
    fn set(&self, key: Bytes, value: Bytes, options: SetOptions) -> Result<bool, SpinelKvError>;
    fn getset(&self, key: Bytes, value: Bytes) -> Result<Option<Bytes>, SpinelKvError>;
    fn incr_by(&self, key: Bytes, delta: i64) -> Result<i64, SpinelKvError>;
    /// Returns the new length.
    fn append(&self, key: Bytes, value: &[u8]) -> Result<usize, SpinelKvError>;
    fn strlen(&self, key: &[u8]) -> Result<usize, SpinelKvError>;
}

pub trait HashOps {
    /// Returns the number of fields that were added.
    fn hset(&self, key: Bytes, pairs: Vec<(Bytes, Bytes)>) -> Result<i64, SpinelKvError>;
    fn hget(&self, key: &[u8], field: &[u8]) -> Result<Option<Bytes>, SpinelKvError>;
    fn hdel(&self, key: &[u8], fields: &[Bytes]) -> Result<i64, SpinelKvError>;
    fn hgetall(&self, key: &[u8]) -> Result<Vec<(Bytes, Bytes)>, SpinelKvError>;
    fn hlen(&self, key: &[u8]) -> Result<usize, SpinelKvError>;
    fn hincr_by(&self, key: Bytes, field: Bytes, delta: i64) -> Result<i64, SpinelKvError>;
}

pub trait ListOps {
    /// Returns the new length.
    fn push(&self, key: Bytes, values: Vec<Bytes>, end: ListEnd) -> Result<usize, SpinelKvError>;
    fn pop(&self, key: &[u8], end: ListEnd) -> Result<Option<Bytes>, SpinelKvError>;
    fn llen(&self, key: &[u8]) -> Result<usize, SpinelKvError>;
    fn lrange(&self, key: &[u8], start: i64, stop: i64) -> Result<Vec<Bytes>, SpinelKvError>;
}

pub trait SetOps {
    fn sadd(&self, key: Bytes, members: Vec<Bytes>) -> Result<i64, SpinelKvError>;
    fn srem(&self, key: &[u8], members: &[Bytes]) -> Result<i64, SpinelKvError>;
    fn smembers(&self, key: &[u8]) -> Result<Vec<Bytes>, SpinelKvError>;
    fn sismember(&self, key: &[u8], member: &[u8]) -> Result<bool, SpinelKvError>;
    fn scard(&self, key: &[u8]) -> Result<usize, SpinelKvError>;
}

pub trait ZSetOps {
    fn zadd(&self, key: Bytes, members: Vec<(f64, Bytes)>) -> Result<i64, SpinelKvError>;
    fn zincr_by(&self, key: Bytes, delta: f64, member: Bytes) -> Result<f64, SpinelKvError>;
    fn zscore(&self, key: &[u8], member: &[u8]) -> Result<Option<f64>, SpinelKvError>;
    fn zrem(&self, key: &[u8], members: &[Bytes]) -> Result<i64, SpinelKvError>;
    fn zcard(&self, key: &[u8]) -> Result<usize, SpinelKvError>;
    fn zrange(&self, key: &[u8], start: i64, stop: i64)
    -> Result<Vec<(Bytes, f64)>, SpinelKvError>;
}

/// Everything the command layer needs from storage.
pub trait Engine:
    KeyOps + StringOps + HashOps + ListOps + SetOps + ZSetOps + Send + Sync + std::fmt::Debug
{
}

impl<T> Engine for T where
    T: KeyOps + StringOps + HashOps + ListOps + SetOps + ZSetOps + Send + Sync + std::fmt::Debug
{
}
