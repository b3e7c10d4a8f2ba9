// src/core/errors.rs

//! Defines the primary error type for the entire application.
//!
//! The `Display` text of every variant is exactly what a client receives in a
//! RESP error reply, so the strings here are part of the wire contract.

use std::num::{ParseFloatError, ParseIntError};
use std::sync::Arc;
use thiserror::Error;

/// The main error enum, representing all possible failures within the server.
#[derive(Error, Debug)]
pub enum SpinelKvError {
    #[error("IO Error: {0}")]
    Io(Arc<std::io::Error>),

    #[error("Incomplete data in stream")]
    IncompleteData,

    // --- Protocol errors (fatal to the connection) ---
    #[error("ERR unbalanced quotes in request")]
    UnbalancedQuotes,

    #[error("ERR invalid multibulk length")]
    InvalidMultiBulkLength,

    #[error("ERR invalid bulk length")]
    InvalidBulkLength,

    #[error("expected '$', got '{0}'")]
    UnexpectedByte(char),

    // --- Command usage errors ---
    #[error("ERR empty command for '{0}' command")]
    EmptyCommand(String),

    #[error("ERR wrong number of arguments for '{0}' command")]
    WrongArgumentCount(String),

    #[error("ERR syntax error")]
    Syntax,

    #[error("ERR invalid expire time in '{0}' command")]
    InvalidExpireTime(String),

    #[error("ERR value is not an integer or out of range")]
    NotAnInteger,

    #[error("ERR value is not a valid float")]
    NotAFloat,

    #[error("ERR increment or decrement would overflow")]
    Overflow,

    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,

    #[error("ERR unknown subcommand '{0}'")]
    UnknownSubcommand(String),

    #[error("ERR {0} inside MULTI is not allowed")]
    NotAllowedInMulti(String),

    #[error("ERR max number of clients reached")]
    MaxClients,

    // --- Transaction sequencing errors ---
    #[error("ERR tx command disable")]
    TxDisabled,

    #[error("ERR tx in slave node")]
    TxNotInMaster,

    #[error("ERR MULTI calls can not be nested")]
    MultiNested,

    #[error("ERR tx qps too high")]
    TxQpsLimit,

    #[error("ERR PREPARE without MULTI")]
    PrepareWithoutMulti,

    #[error("ERR PREPARE calls can not be nested")]
    PrepareNested,

    #[error("ERR Exec not prepared")]
    ExecNotPrepared,

    #[error("ERR DISCARD without MULTI")]
    DiscardWithoutMulti,

    // --- Optimistic-conflict errors ---
    #[error("ERR watch key changed")]
    WatchKeyChanged,

    #[error("ERR prepare lock fail")]
    PrepareLockFail,

    #[error("ERR prepare lock timeout")]
    PrepareLockTimeout,

    // --- Collaborator errors ---
    /// The key's hash slot is served by another node.
    #[error("MOVED {slot} {addr}")]
    Moved { slot: u16, addr: String },

    #[error("ERR replication failed: {0}")]
    Replication(String),

    #[error("ERR internal error: {0}")]
    Internal(String),
}

impl SpinelKvError {
    /// Returns true for wire-level decode failures that must terminate the connection.
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            SpinelKvError::UnbalancedQuotes
                | SpinelKvError::InvalidMultiBulkLength
                | SpinelKvError::InvalidBulkLength
                | SpinelKvError::UnexpectedByte(_)
        )
    }
}

// Manual implementation of Clone because `std::io::Error` is not cloneable.
impl Clone for SpinelKvError {
    fn clone(&self) -> Self {
        match self {
            SpinelKvError::Io(e) => SpinelKvError::Io(Arc::clone(e)),
            SpinelKvError::IncompleteData => SpinelKvError::IncompleteData,
            SpinelKvError::UnbalancedQuotes => SpinelKvError::UnbalancedQuotes,
            SpinelKvError::InvalidMultiBulkLength => SpinelKvError::InvalidMultiBulkLength,
            SpinelKvError::InvalidBulkLength => SpinelKvError::InvalidBulkLength,
            SpinelKvError::UnexpectedByte(c) => SpinelKvError::UnexpectedByte(*c),
            SpinelKvError::EmptyCommand(s) => SpinelKvError::EmptyCommand(s.clone()),
            SpinelKvError::WrongArgumentCount(s) => SpinelKvError::WrongArgumentCount(s.clone()),
            SpinelKvError::Syntax => SpinelKvError::Syntax,
            SpinelKvError::InvalidExpireTime(s) => SpinelKvError::InvalidExpireTime(s.clone()),
            SpinelKvError::NotAnInteger => SpinelKvError::NotAnInteger,
            SpinelKvError::NotAFloat => SpinelKvError::NotAFloat,
            SpinelKvError::Overflow => SpinelKvError::Overflow,
            SpinelKvError::WrongType => SpinelKvError::WrongType,
            SpinelKvError::UnknownSubcommand(s) => SpinelKvError::UnknownSubcommand(s.clone()),
            SpinelKvError::NotAllowedInMulti(s) => SpinelKvError::NotAllowedInMulti(s.clone()),
            SpinelKvError::MaxClients => SpinelKvError::MaxClients,
            SpinelKvError::TxDisabled => SpinelKvError::TxDisabled,
            SpinelKvError::TxNotInMaster => SpinelKvError::TxNotInMaster,
            SpinelKvError::MultiNested => SpinelKvError::MultiNested,
            SpinelKvError::TxQpsLimit => SpinelKvError::TxQpsLimit,
            SpinelKvError::PrepareWithoutMulti => SpinelKvError::PrepareWithoutMulti,
            SpinelKvError::PrepareNested => SpinelKvError::PrepareNested,
            SpinelKvError::ExecNotPrepared => SpinelKvError::ExecNotPrepared,
            SpinelKvError::DiscardWithoutMulti => SpinelKvError::DiscardWithoutMulti,
            SpinelKvError::WatchKeyChanged => SpinelKvError::WatchKeyChanged,
            SpinelKvError::PrepareLockFail => SpinelKvError::PrepareLockFail,
            SpinelKvError::PrepareLockTimeout => SpinelKvError::PrepareLockTimeout,
            SpinelKvError::Moved { slot, addr } => SpinelKvError::Moved {
                slot: *slot,
                addr: addr.clone(),
            },
            SpinelKvError::Replication(s) => SpinelKvError::Replication(s.clone()),
            SpinelKvError::Internal(s) => SpinelKvError::Internal(s.clone()),
        }
    }
}

impl PartialEq for SpinelKvError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (SpinelKvError::Io(e1), SpinelKvError::Io(e2)) => e1.to_string() == e2.to_string(),
            (SpinelKvError::UnexpectedByte(c1), SpinelKvError::UnexpectedByte(c2)) => c1 == c2,
            (SpinelKvError::EmptyCommand(s1), SpinelKvError::EmptyCommand(s2)) => s1 == s2,
            (SpinelKvError::WrongArgumentCount(s1), SpinelKvError::WrongArgumentCount(s2)) => {
                s1 == s2
            }
            (SpinelKvError::InvalidExpireTime(s1), SpinelKvError::InvalidExpireTime(s2)) => {
                s1 == s2
            }
            (SpinelKvError::UnknownSubcommand(s1), SpinelKvError::UnknownSubcommand(s2)) => {
                s1 == s2
            }
            (SpinelKvError::NotAllowedInMulti(s1), SpinelKvError::NotAllowedInMulti(s2)) => {
                s1 == s2
            }
            (
                SpinelKvError::Moved { slot: s1, addr: a1 },
                SpinelKvError::Moved { slot: s2, addr: a2 },
            ) => s1 == s2 && a1 == a2,
            (SpinelKvError::Replication(s1), SpinelKvError::Replication(s2)) => s1 == s2,
            (SpinelKvError::Internal(s1), SpinelKvError::Internal(s2)) => s1 == s2,
            _ => core::mem::discriminant(self) == core::mem::discriminant(other),
        }
    }
}

// --- From trait implementations for easy error conversion ---

impl From<std::io::Error> for SpinelKvError {
    fn from(e: std::io::Error) -> Self {
        SpinelKvError::Io(Arc::new(e))
    }
}

impl From<ParseIntError> for SpinelKvError {
    fn from(_: ParseIntError) -> Self {
        SpinelKvError::NotAnInteger
    }
}

impl From<ParseFloatError> for SpinelKvError {
    fn from(_: ParseFloatError) -> Self {
        SpinelKvError::NotAFloat
    }
}
