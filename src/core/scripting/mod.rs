// src/core/scripting/mod.rs

//! Script caching for the `SCRIPT` command family.

mod script_cache;

pub use script_cache::ScriptCache;
