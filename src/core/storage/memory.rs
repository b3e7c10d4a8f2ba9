// src/core/storage/memory.rs

//! An in-memory engine on a sharded concurrent map. Expired keys are removed
//! lazily when they are next touched.

use super::value::{DataValue, MAX_STRING_SIZE, StoredValue, ZSet, normalize_range};
use super::{
    HashOps, KeyOps, KeyTtl, ListEnd, ListOps, SetCondition, SetOps, SetOptions, StringOps,
    ZSetOps,
};
use crate::core::SpinelKvError;
use crate::core::protocol::resp_frame::parse_int;
use bytes::{Bytes, BytesMut};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant};
use wildmatch::WildMatch;

#[derive(Debug, Default)]
pub struct MemoryEngine {
    entries: DashMap<Bytes, StoredValue>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn purge_if_expired(&self, key: &[u8]) {
        self.entries.remove_if(key, |_, value| value.is_expired());
    }

    /// Runs `f` on a live value. Missing and expired keys give `Ok(None)`.
    fn read<T>(
        &self,
        key: &[u8],
        f: impl FnOnce(&DataValue) -> Result<T, SpinelKvError>,
    ) -> Result<Option<T>, SpinelKvError> {
        self.purge_if_expired(key);
        match self.entries.get(key) {
            Some(entry) => f(&entry.data).map(Some),
            None => Ok(None),
        }
    }

    /// Runs `f` on the value at `key`, creating it with `init` if missing.
    fn upsert<T>(
        &self,
        key: Bytes,
        init: impl FnOnce() -> DataValue,
        f: impl FnOnce(&mut DataValue) -> Result<T, SpinelKvError>,
    ) -> Result<T, SpinelKvError> {
        let mut entry = match self.entries.entry(key) {
            Entry::Occupied(occupied) => {
                let mut entry = occupied.into_ref();
                if entry.is_expired() {
                    *entry = StoredValue::new(init());
                }
                entry
            }
            Entry::Vacant(vacant) => vacant.insert(StoredValue::new(init())),
        };
        f(&mut entry.data)
    }

    /// Runs `f` on an existing live value, then drops the key if `f` emptied a collection.
    fn modify<T>(
        &self,
        key: &[u8],
        f: impl FnOnce(&mut DataValue) -> Result<T, SpinelKvError>,
    ) -> Result<Option<T>, SpinelKvError> {
        self.purge_if_expired(key);
        let result = match self.entries.get_mut(key) {
            Some(mut entry) => f(&mut entry.data).map(Some),
            None => return Ok(None),
        };
        self.entries
            .remove_if(key, |_, value| value.data.is_empty_collection());
        result
    }

    fn live_keys(&self) -> Vec<Bytes> {
        let now = Instant::now();
        self.entries
            .iter()
            .filter(|entry| entry.expiry.is_none_or(|at| at > now))
            .map(|entry| entry.key().clone())
            .collect()
    }
}

fn matches_pattern(pattern: &WildMatch, key: &[u8]) -> bool {
    pattern.matches(&String::from_utf8_lossy(key))
}

impl KeyOps for MemoryEngine {
    fn del(&self, key: &[u8]) -> bool {
        match self.entries.remove(key) {
            Some((_, value)) => !value.is_expired(),
            None => false,
        }
    }

    fn exists(&self, key: &[u8]) -> bool {
        self.purge_if_expired(key);
        self.entries.contains_key(key)
    }

    fn key_type(&self, key: &[u8]) -> Option<&'static str> {
        self.read(key, |value| Ok(value.type_name())).ok().flatten()
    }

    fn expire(&self, key: &[u8], ttl: Duration) -> bool {
        self.purge_if_expired(key);
        match self.entries.get_mut(key) {
            Some(mut entry) => {
                entry.expiry = Some(Instant::now() + ttl);
                true
            }
            None => false,
        }
    }

    fn persist(&self, key: &[u8]) -> bool {
        self.purge_if_expired(key);
        match self.entries.get_mut(key) {
            Some(mut entry) => entry.expiry.take().is_some(),
            None => false,
        }
    }

    fn ttl(&self, key: &[u8]) -> KeyTtl {
        self.purge_if_expired(key);
        match self.entries.get(key) {
            None => KeyTtl::Missing,
            Some(entry) => match entry.expiry {
                None => KeyTtl::Persistent,
                Some(at) => KeyTtl::Expires(at.saturating_duration_since(Instant::now())),
            },
        }
    }

    fn keys(&self, pattern: &str) -> Vec<Bytes> {
        let pattern = WildMatch::new(pattern);
        let mut keys: Vec<Bytes> = self
            .live_keys()
            .into_iter()
            .filter(|key| matches_pattern(&pattern, key))
            .collect();
        keys.sort();
        keys
    }

    fn scan(&self, cursor: u64, pattern: Option<&str>, count: usize) -> (u64, Vec<Bytes>) {
        let mut all = self.live_keys();
        all.sort();
        let start = cursor as usize;
        if start >= all.len() {
            return (0, Vec::new());
        }
        let end = (start + count.max(1)).min(all.len());
        let pattern = pattern.map(WildMatch::new);
        let page = all[start..end]
            .iter()
            .filter(|key| pattern.as_ref().is_none_or(|p| matches_pattern(p, key)))
            .cloned()
            .collect();
        let next = if end >= all.len() { 0 } else { end as u64 };
        (next, page)
    }

    fn dbsize(&self) -> usize {
        self.live_keys().len()
    }

    fn flush(&self) {
        self.entries.clear();
    }
}

impl StringOps for MemoryEngine {
    fn get(&self, key: &[u8]) -> Result<Option<Bytes>, SpinelKvError> {
        self.read(key, |value| match value {
            DataValue::String(s) => Ok(s.clone()),
            _ => Err(SpinelKvError::WrongType),
        })
    }

    fn set(&self, key: Bytes, value: Bytes, options: SetOptions) -> Result<bool, SpinelKvError> {
        self.purge_if_expired(&key);
        let exists = self.entries.contains_key(&key);
        let allowed = match options.condition {
            SetCondition::Always => true,
            SetCondition::IfMissing => !exists,
            SetCondition::IfExists => exists,
        };
        if !allowed {
            return Ok(false);
        }
        let mut stored = StoredValue::new(DataValue::String(value));
        stored.expiry = options.expiry.map(|ttl| Instant::now() + ttl);
        self.entries.insert(key, stored);
        Ok(true)
    }

    fn getset(&self, key: Bytes, value: Bytes) -> Result<Option<Bytes>, SpinelKvError> {
        let previous = self.get(&key)?;
        self.entries
            .insert(key, StoredValue::new(DataValue::String(value)));
        Ok(previous)
    }

    fn incr_by(&self, key: Bytes, delta: i64) -> Result<i64, SpinelKvError> {
        self.purge_if_expired(&key);
        let mut entry = self
            .entries
            .entry(key)
            .or_insert_with(|| StoredValue::new(DataValue::String(Bytes::from_static(b"0"))));
        let DataValue::String(s) = &mut entry.data else {
            return Err(SpinelKvError::WrongType);
        };
        let current = parse_int(s).ok_or(SpinelKvError::NotAnInteger)?;
        let next = current.checked_add(delta).ok_or(SpinelKvError::Overflow)?;
        let mut fmt = itoa::Buffer::new();
        *s = Bytes::copy_from_slice(fmt.format(next).as_bytes());
        Ok(next)
    }

    fn append(&self, key: Bytes, value: &[u8]) -> Result<usize, SpinelKvError> {
        self.purge_if_expired(&key);
        let mut entry = self
            .entries
            .entry(key)
            .or_insert_with(|| StoredValue::new(DataValue::String(Bytes::new())));
        let DataValue::String(s) = &mut entry.data else {
            return Err(SpinelKvError::WrongType);
        };
        let required_len = s.len().saturating_add(value.len());
        if required_len > MAX_STRING_SIZE {
            return Err(SpinelKvError::Internal(
                "string length is greater than maximum allowed size (512MB)".to_string(),
            ));
        }
        let mut joined = BytesMut::with_capacity(required_len);
        joined.extend_from_slice(s);
        joined.extend_from_slice(value);
        *s = joined.freeze();
        Ok(required_len)
    }

    fn strlen(&self, key: &[u8]) -> Result<usize, SpinelKvError> {
        Ok(self.get(key)?.map_or(0, |s| s.len()))
    }
}

impl HashOps for MemoryEngine {
    fn hset(&self, key: Bytes, pairs: Vec<(Bytes, Bytes)>) -> Result<i64, SpinelKvError> {
        self.upsert(
            key,
            || DataValue::Hash(HashMap::new()),
            |value| match value {
                DataValue::Hash(h) => Ok(pairs
                    .into_iter()
                    .filter(|(field, v)| h.insert(field.clone(), v.clone()).is_none())
                    .count() as i64),
                _ => Err(SpinelKvError::WrongType),
            },
        )
    }

    fn hget(&self, key: &[u8], field: &[u8]) -> Result<Option<Bytes>, SpinelKvError> {
        Ok(self
            .read(key, |value| match value {
                DataValue::Hash(h) => Ok(h.get(field).cloned()),
                _ => Err(SpinelKvError::WrongType),
            })?
            .flatten())
    }

    fn hdel(&self, key: &[u8], fields: &[Bytes]) -> Result<i64, SpinelKvError> {
        Ok(self
            .modify(key, |value| match value {
                DataValue::Hash(h) => {
                    Ok(fields.iter().filter(|f| h.remove(*f).is_some()).count() as i64)
                }
                _ => Err(SpinelKvError::WrongType),
            })?
            .unwrap_or(0))
    }

    fn hgetall(&self, key: &[u8]) -> Result<Vec<(Bytes, Bytes)>, SpinelKvError> {
        Ok(self
            .read(key, |value| match value {
                DataValue::Hash(h) => {
                    let mut pairs: Vec<_> =
                        h.iter().map(|(f, v)| (f.clone(), v.clone())).collect();
                    pairs.sort();
                    Ok(pairs)
                }
                _ => Err(SpinelKvError::WrongType),
            })?
            .unwrap_or_default())
    }

    fn hlen(&self, key: &[u8]) -> Result<usize, SpinelKvError> {
        Ok(self
            .read(key, |value| match value {
                DataValue::Hash(h) => Ok(h.len()),
                _ => Err(SpinelKvError::WrongType),
            })?
            .unwrap_or(0))
    }

    fn hincr_by(&self, key: Bytes, field: Bytes, delta: i64) -> Result<i64, SpinelKvError> {
        self.upsert(
            key,
            || DataValue::Hash(HashMap::new()),
            |value| {
                let DataValue::Hash(h) = value else {
                    return Err(SpinelKvError::WrongType);
                };
                let current = match h.get(&field) {
                    Some(v) => parse_int(v).ok_or(SpinelKvError::NotAnInteger)?,
                    None => 0,
                };
                let next = current.checked_add(delta).ok_or(SpinelKvError::Overflow)?;
                let mut fmt = itoa::Buffer::new();
                h.insert(field, Bytes::copy_from_slice(fmt.format(next).as_bytes()));
                Ok(next)
            },
        )
    }
}

impl ListOps for MemoryEngine {
    fn push(&self, key: Bytes, values: Vec<Bytes>, end: ListEnd) -> Result<usize, SpinelKvError> {
        self.upsert(
            key,
            || DataValue::List(VecDeque::new()),
            |value| {
                let DataValue::List(list) = value else {
                    return Err(SpinelKvError::WrongType);
                };
                for v in values {
                    match end {
                        ListEnd::Left => list.push_front(v),
                        ListEnd::Right => list.push_back(v),
                    }
                }
                Ok(list.len())
            },
        )
    }

    fn pop(&self, key: &[u8], end: ListEnd) -> Result<Option<Bytes>, SpinelKvError> {
        Ok(self
            .modify(key, |value| match value {
                DataValue::List(list) => Ok(match end {
                    ListEnd::Left => list.pop_front(),
                    ListEnd::Right => list.pop_back(),
                }),
                _ => Err(SpinelKvError::WrongType),
            })?
            .flatten())
    }

    fn llen(&self, key: &[u8]) -> Result<usize, SpinelKvError> {
        Ok(self
            .read(key, |value| match value {
                DataValue::List(list) => Ok(list.len()),
                _ => Err(SpinelKvError::WrongType),
            })?
            .unwrap_or(0))
    }

    fn lrange(&self, key: &[u8], start: i64, stop: i64) -> Result<Vec<Bytes>, SpinelKvError> {
        Ok(self
            .read(key, |value| match value {
                DataValue::List(list) => Ok(match normalize_range(start, stop, list.len()) {
                    Some((from, to)) => list.range(from..=to).cloned().collect(),
                    None => Vec::new(),
                }),
                _ => Err(SpinelKvError::WrongType),
            })?
            .unwrap_or_default())
    }
}

impl SetOps for MemoryEngine {
    fn sadd(&self, key: Bytes, members: Vec<Bytes>) -> Result<i64, SpinelKvError> {
        self.upsert(
            key,
            || DataValue::Set(HashSet::new()),
            |value| match value {
                DataValue::Set(set) => Ok(members.into_iter().filter(|m| set.insert(m.clone())).count() as i64),
                _ => Err(SpinelKvError::WrongType),
            },
        )
    }

    fn srem(&self, key: &[u8], members: &[Bytes]) -> Result<i64, SpinelKvError> {
        Ok(self
            .modify(key, |value| match value {
                DataValue::Set(set) => Ok(members.iter().filter(|m| set.remove(*m)).count() as i64),
                _ => Err(SpinelKvError::WrongType),
            })?
            .unwrap_or(0))
    }

    fn smembers(&self, key: &[u8]) -> Result<Vec<Bytes>, SpinelKvError> {
        Ok(self
            .read(key, |value| match value {
                DataValue::Set(set) => {
                    let mut members: Vec<Bytes> = set.iter().cloned().collect();
                    members.sort();
                    Ok(members)
                }
                _ => Err(SpinelKvError::WrongType),
            })?
            .unwrap_or_default())
    }

    fn sismember(&self, key: &[u8], member: &[u8]) -> Result<bool, SpinelKvError> {
        Ok(self
            .read(key, |value| match value {
                DataValue::Set(set) => Ok(set.contains(member)),
                _ => Err(SpinelKvError::WrongType),
            })?
            .unwrap_or(false))
    }

    fn scard(&self, key: &[u8]) -> Result<usize, SpinelKvError> {
        Ok(self
            .read(key, |value| match value {
                DataValue::Set(set) => Ok(set.len()),
                _ => Err(SpinelKvError::WrongType),
            })?
            .unwrap_or(0))
    }
}

impl ZSetOps for MemoryEngine {
    fn zadd(&self, key: Bytes, members: Vec<(f64, Bytes)>) -> Result<i64, SpinelKvError> {
        self.upsert(
            key,
            || DataValue::ZSet(ZSet::new()),
            |value| match value {
                DataValue::ZSet(zset) => Ok(members
                    .into_iter()
                    .filter(|(score, member)| zset.insert(member.clone(), *score))
                    .count() as i64),
                _ => Err(SpinelKvError::WrongType),
            },
        )
    }

    fn zincr_by(&self, key: Bytes, delta: f64, member: Bytes) -> Result<f64, SpinelKvError> {
        self.upsert(
            key,
            || DataValue::ZSet(ZSet::new()),
            |value| {
                let DataValue::ZSet(zset) = value else {
                    return Err(SpinelKvError::WrongType);
                };
                let next = zset.score(&member).unwrap_or(0.0) + delta;
                if next.is_nan() {
                    return Err(SpinelKvError::NotAFloat);
                }
                zset.insert(member, next);
                Ok(next)
            },
        )
    }

    fn zscore(&self, key: &[u8], member: &[u8]) -> Result<Option<f64>, SpinelKvError> {
        Ok(self
            .read(key, |value| match value {
                DataValue::ZSet(zset) => Ok(zset.score(member)),
                _ => Err(SpinelKvError::WrongType),
            })?
            .flatten())
    }

    fn zrem(&self, key: &[u8], members: &[Bytes]) -> Result<i64, SpinelKvError> {
        Ok(self
            .modify(key, |value| match value {
                DataValue::ZSet(zset) => {
                    Ok(members.iter().filter(|m| zset.remove(m)).count() as i64)
                }
                _ => Err(SpinelKvError::WrongType),
            })?
            .unwrap_or(0))
    }

    fn zcard(&self, key: &[u8]) -> Result<usize, SpinelKvError> {
        Ok(self
            .read(key, |value| match value {
                DataValue::ZSet(zset) => Ok(zset.len()),
                _ => Err(SpinelKvError::WrongType),
            })?
            .unwrap_or(0))
    }

    fn zrange(
        &self,
        key: &[u8],
        start: i64,
        stop: i64,
    ) -> Result<Vec<(Bytes, f64)>, SpinelKvError> {
        Ok(self
            .read(key, |value| match value {
                DataValue::ZSet(zset) => Ok(match normalize_range(start, stop, zset.len()) {
                    Some((from, to)) => zset.range(from, to),
                    None => Vec::new(),
                }),
                _ => Err(SpinelKvError::WrongType),
            })?
            .unwrap_or_default())
    }
}
