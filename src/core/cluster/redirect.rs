// src/core/cluster/redirect.rs

//! Key ownership: decides whether a request is served here or answered with a
//! redirect to the node that owns its slot.

use super::slot::{NUM_SLOTS, get_slot};
use crate::core::{RespValue, SpinelKvError};
use async_trait::async_trait;
use bytes::Bytes;
use std::any::Any;
use std::fmt::Debug;
use std::ops::RangeInclusive;

/// An opaque value held until the request that obtained it has finished.
pub type UnlockGuard = Box<dyn Any + Send>;

#[async_trait]
pub trait RedirectCheck: Send + Sync + Debug {
    /// Returns true if the key belongs elsewhere. A returned guard is dropped
    /// once the local execution of the request is complete.
    fn check(&self, command: &str, key: &[u8], key_hash: u32) -> (bool, Option<UnlockGuard>);

    /// Produces the reply for a request that `check` marked as foreign.
    async fn redirect(&self, request: &[Bytes], key: &[u8]) -> Result<RespValue, SpinelKvError>;
}

/// Single-node ownership: every key is local.
#[derive(Debug, Default)]
pub struct LocalOwnership;

#[async_trait]
impl RedirectCheck for LocalOwnership {
    fn check(&self, _command: &str, _key: &[u8], _key_hash: u32) -> (bool, Option<UnlockGuard>) {
        (false, None)
    }

    async fn redirect(&self, _request: &[Bytes], _key: &[u8]) -> Result<RespValue, SpinelKvError> {
        Err(SpinelKvError::Internal(
            "redirect requested for a local key".to_string(),
        ))
    }
}

/// Serves a fixed set of hash slots and answers `MOVED` for the rest.
#[derive(Debug)]
pub struct SlotOwnership {
    owned: Vec<bool>,
    redirect_addr: String,
}

impl SlotOwnership {
    pub fn new(ranges: &[RangeInclusive<u16>], redirect_addr: impl Into<String>) -> Self {
        let mut owned = vec![false; NUM_SLOTS];
        for range in ranges {
            for slot in range.clone() {
                if let Some(flag) = owned.get_mut(slot as usize) {
                    *flag = true;
                }
            }
        }
        Self {
            owned,
            redirect_addr: redirect_addr.into(),
        }
    }

    pub fn owns(&self, slot: u16) -> bool {
        self.owned.get(slot as usize).copied().unwrap_or(false)
    }
}

#[async_trait]
impl RedirectCheck for SlotOwnership {
    fn check(&self, _command: &str, key: &[u8], _key_hash: u32) -> (bool, Option<UnlockGuard>) {
        (!self.owns(get_slot(key)), None)
    }

    async fn redirect(&self, _request: &[Bytes], key: &[u8]) -> Result<RespValue, SpinelKvError> {
        Err(SpinelKvError::Moved {
            slot: get_slot(key),
            addr: self.redirect_addr.clone(),
        })
    }
}

/// Parses `"<start>-<end>"` or a single `"<slot>"`.
pub fn parse_slot_range(spec: &str) -> Result<RangeInclusive<u16>, String> {
    let parse = |s: &str| {
        s.trim()
            .parse::<u16>()
            .ok()
            .filter(|slot| (*slot as usize) < NUM_SLOTS)
            .ok_or_else(|| format!("invalid slot '{s}' in range '{spec}'"))
    };
    let (start, end) = match spec.split_once('-') {
        Some((start, end)) => (parse(start)?, parse(end)?),
        None => {
            let slot = parse(spec)?;
            (slot, slot)
        }
    };
    if start > end {
        return Err(format!("slot range '{spec}' is reversed"));
    }
    Ok(start..=end)
}
