// src/core/scripting/script_cache.rs

use bytes::Bytes;
use dashmap::DashMap;
use sha1::{Digest, Sha1};

/// Stores script bodies keyed by the hex SHA1 of their source, for `SCRIPT LOAD`
/// and `SCRIPT EXISTS`. Scripts are cached, never executed here.
#[derive(Debug, Default)]
pub struct ScriptCache {
    scripts: DashMap<String, Bytes>,
}

impl ScriptCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a script into the cache and returns its SHA1 hash.
    /// If the script already exists, it is simply overwritten.
    pub fn load(&self, script: Bytes) -> String {
        let mut hasher = Sha1::new();
        hasher.update(&script);
        let sha1 = hex::encode(hasher.finalize());
        self.scripts.insert(sha1.clone(), script);
        sha1
    }

    pub fn get(&self, sha1: &str) -> Option<Bytes> {
        self.scripts.get(sha1).map(|v| v.value().clone())
    }

    /// One flag per hash: 1 if cached, 0 otherwise. Hashes match case-insensitively.
    pub fn exists(&self, sha1s: &[String]) -> Vec<i64> {
        sha1s
            .iter()
            .map(|sha1| self.scripts.contains_key(&sha1.to_ascii_lowercase()) as i64)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }

    pub fn flush(&self) {
        self.scripts.clear();
    }
}
