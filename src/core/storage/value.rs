// src/core/storage/value.rs

//! Defines the values held by the in-memory engine.

use bytes::Bytes;
use ordered_float::OrderedFloat;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::time::Instant;

/// A hard limit on the size of a single string value.
pub const MAX_STRING_SIZE: usize = 512 * 1024 * 1024;

/// A wrapper for all values stored in the engine, containing the data and its expiry.
#[derive(Debug, Clone)]
pub struct StoredValue {
    pub data: DataValue,
    pub expiry: Option<Instant>,
}

impl StoredValue {
    pub fn new(data: DataValue) -> Self {
        Self { data, expiry: None }
    }

    pub fn is_expired(&self) -> bool {
        self.expiry.is_some_and(|at| at <= Instant::now())
    }
}

/// The typed payload of a key. The variant name is what `TYPE` reports.
#[derive(Debug, Clone, strum_macros::IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum DataValue {
    String(Bytes),
    Hash(HashMap<Bytes, Bytes>),
    List(VecDeque<Bytes>),
    Set(HashSet<Bytes>),
    ZSet(ZSet),
}

impl DataValue {
    pub fn type_name(&self) -> &'static str {
        self.into()
    }

    /// True for a collection with no elements left. Strings are never empty in this sense.
    pub fn is_empty_collection(&self) -> bool {
        match self {
            DataValue::String(_) => false,
            DataValue::Hash(h) => h.is_empty(),
            DataValue::List(l) => l.is_empty(),
            DataValue::Set(s) => s.is_empty(),
            DataValue::ZSet(z) => z.is_empty(),
        }
    }
}

/// A sorted set: members ordered by score, then lexicographically.
#[derive(Debug, Clone, Default)]
pub struct ZSet {
    scores: HashMap<Bytes, f64>,
    ordered: BTreeSet<(OrderedFloat<f64>, Bytes)>,
}

impl ZSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the score of `member`. Returns true if the member is new.
    pub fn insert(&mut self, member: Bytes, score: f64) -> bool {
        let previous = self.scores.insert(member.clone(), score);
        if let Some(old) = previous {
            self.ordered.remove(&(OrderedFloat(old), member.clone()));
        }
        self.ordered.insert((OrderedFloat(score), member));
        previous.is_none()
    }

    pub fn remove(&mut self, member: &[u8]) -> bool {
        match self.scores.remove_entry(member) {
            Some((member, score)) => {
                self.ordered.remove(&(OrderedFloat(score), member));
                true
            }
            None => false,
        }
    }

    pub fn score(&self, member: &[u8]) -> Option<f64> {
        self.scores.get(member).copied()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Members by rank in `start..=stop`, already clamped to the set.
    pub fn range(&self, start: usize, stop: usize) -> Vec<(Bytes, f64)> {
        self.ordered
            .iter()
            .skip(start)
            .take(stop.saturating_sub(start) + 1)
            .map(|(score, member)| (member.clone(), score.into_inner()))
            .collect()
    }
}

/// Converts Redis-style inclusive `start`/`stop` indexes, where negative values
/// count from the end, into a clamped `(start, stop)` pair. `None` means empty.
pub fn normalize_range(start: i64, stop: i64, len: usize) -> Option<(usize, usize)> {
    let len = len as i64;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if len == 0 || start > stop || start >= len {
        return None;
    }
    Some((start as usize, stop as usize))
}
