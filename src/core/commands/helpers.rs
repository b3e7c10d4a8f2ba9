// src/core/commands/helpers.rs

//! Provides helper functions for parsing command arguments.
//! These helpers reduce boilerplate and ensure consistent error handling across commands.

use crate::core::SpinelKvError;
use crate::core::protocol::resp_frame::parse_int;
use bytes::Bytes;

/// Interprets an argument as UTF-8 text.
pub fn arg_str(arg: &Bytes) -> Result<&str, SpinelKvError> {
    std::str::from_utf8(arg).map_err(|_| SpinelKvError::Syntax)
}

pub fn parse_i64(arg: &[u8]) -> Result<i64, SpinelKvError> {
    parse_int(arg).ok_or(SpinelKvError::NotAnInteger)
}

/// Parses a float, accepting `inf`, `+inf` and `-inf`. NaN is rejected.
pub fn parse_f64(arg: &[u8]) -> Result<f64, SpinelKvError> {
    let text = std::str::from_utf8(arg).map_err(|_| SpinelKvError::NotAFloat)?;
    let value: f64 = text.parse()?;
    if value.is_nan() {
        return Err(SpinelKvError::NotAFloat);
    }
    Ok(value)
}

/// Formats a float the way replies show it: integral values lose the `.0`.
pub fn format_f64(value: f64) -> Bytes {
    if value.is_infinite() {
        return Bytes::from_static(if value > 0.0 { b"inf" } else { b"-inf" });
    }
    let mut fmt = ryu::Buffer::new();
    let text = fmt.format(value);
    Bytes::copy_from_slice(text.strip_suffix(".0").unwrap_or(text).as_bytes())
}

/// Fails with `WrongArgumentCount` unless `args.len() % step == rem`.
pub fn require_pairs(args: &[Bytes], step: usize, rem: usize, name: &str) -> Result<(), SpinelKvError> {
    if args.len() % step != rem {
        return Err(SpinelKvError::WrongArgumentCount(name.to_string()));
    }
    Ok(())
}

/// A helper struct to parse optional trailing arguments sequentially.
pub struct ArgParser<'a> {
    args: &'a [Bytes],
    cursor: usize,
}

impl<'a> ArgParser<'a> {
    /// Creates a new parser over a slice of arguments.
    pub fn new(args: &'a [Bytes]) -> Self {
        Self { args, cursor: 0 }
    }

    /// Consumes the next argument if it equals `flag`, ignoring case.
    pub fn match_flag(&mut self, flag: &str) -> bool {
        if self
            .args
            .get(self.cursor)
            .is_some_and(|arg| arg.eq_ignore_ascii_case(flag.as_bytes()))
        {
            self.cursor += 1;
            return true;
        }
        false
    }

    /// Consumes `<name> <value>` if the next argument is `name`, returning the value.
    pub fn match_option(&mut self, name: &str) -> Result<Option<&'a Bytes>, SpinelKvError> {
        if !self.match_flag(name) {
            return Ok(None);
        }
        let value = self.args.get(self.cursor).ok_or(SpinelKvError::Syntax)?;
        self.cursor += 1;
        Ok(Some(value))
    }

    pub fn is_done(&self) -> bool {
        self.cursor >= self.args.len()
    }
}
