// src/core/protocol/reply_writer.rs

//! The per-session output buffer.
//!
//! In direct mode every write is encoded straight into the buffer. In cached
//! mode writes are collected as frames and `flush_cached` emits them as one
//! RESP array, which is how `EXEC` turns N queued replies into a single reply.

use super::resp_frame::{RespFrame, encode_frame};
use super::resp_value::RespValue;
use crate::core::SpinelKvError;
use bytes::{Bytes, BytesMut};

const INITIAL_CAPACITY: usize = 8 * 1024;

#[derive(Debug)]
pub struct ReplyWriter {
    buf: BytesMut,
    cached: bool,
    pending: Vec<RespFrame>,
}

impl Default for ReplyWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplyWriter {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_CAPACITY),
            cached: false,
            pending: Vec::new(),
        }
    }

    /// Switches to cached mode. Replies written from now on are kept as frames.
    pub fn set_cached(&mut self) {
        self.cached = true;
    }

    /// Leaves cached mode. Frames collected so far stay pending for `flush_cached`.
    pub fn unset_cached(&mut self) {
        self.cached = false;
    }

    pub fn is_cached(&self) -> bool {
        self.cached
    }

    /// Writes the collected frames as one `*N` array reply.
    pub fn flush_cached(&mut self) {
        let frames = std::mem::take(&mut self.pending);
        self.cached = false;
        encode_frame(&RespFrame::Array(frames), &mut self.buf);
    }

    pub fn write_status(&mut self, status: &str) {
        self.write_frame(RespFrame::SimpleString(status.to_string()));
    }

    pub fn write_error(&mut self, err: &SpinelKvError) {
        self.write_frame(RespFrame::Error(err.to_string()));
    }

    pub fn write_integer(&mut self, n: i64) {
        self.write_frame(RespFrame::Integer(n));
    }

    /// `None` is written as the null bulk string `$-1`.
    pub fn write_bulk(&mut self, value: Option<Bytes>) {
        self.write_frame(value.map_or(RespFrame::Null, RespFrame::BulkString));
    }

    /// `None` is written as the null array `*-1`.
    pub fn write_array(&mut self, items: Option<Vec<RespFrame>>) {
        self.write_frame(items.map_or(RespFrame::NullArray, RespFrame::Array));
    }

    /// A list of byte strings. `None` is written as the empty array `*0`.
    pub fn write_slice_array(&mut self, items: Option<Vec<Bytes>>) {
        self.write_frame(RespFrame::from_args(items.unwrap_or_default()));
    }

    pub fn write_value(&mut self, value: RespValue) {
        self.write_frame(value.into());
    }

    pub fn write_frame(&mut self, frame: RespFrame) {
        if self.cached {
            self.pending.push(frame);
        } else {
            encode_frame(&frame, &mut self.buf);
        }
    }

    /// True if nothing is waiting to be sent.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Takes the encoded bytes, leaving the buffer empty.
    pub fn take(&mut self) -> Bytes {
        self.buf.split().freeze()
    }

    /// Discards any pending output, including a half-built cached reply.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.pending.clear();
        self.cached = false;
    }
}
