// src/core/protocol/resp_frame.rs

//! Implements the RESP reply frame structure and the corresponding `Encoder`
//! and `Decoder`. Requests from clients go through `RequestCodec` instead; this
//! codec is the reply side of the wire.

use crate::core::SpinelKvError;
use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// The CRLF sequence used to terminate lines in RESP.
pub(crate) const CRLF: &[u8] = b"\r\n";
pub(crate) const CRLF_LEN: usize = 2;

// Protocol-level limits to prevent denial-of-service attacks.
pub(crate) const MAX_FRAME_ELEMENTS: usize = 1_024 * 1_024;
pub(crate) const MAX_BULK_STRING_SIZE: usize = 512 * 1024 * 1024;
const MAX_RECURSION_DEPTH: usize = 256;

/// A single RESP reply frame.
#[derive(Debug, Clone, PartialEq)]
pub enum RespFrame {
    SimpleString(String),
    Error(String),
    Integer(i64),
    BulkString(Bytes),
    /// `$-1\r\n`
    Null,
    /// `*-1\r\n`
    NullArray,
    Array(Vec<RespFrame>),
}

impl RespFrame {
    /// Encodes the frame into a fresh buffer.
    pub fn encode_to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        encode_frame(self, &mut buf);
        buf.freeze()
    }

    /// Builds an array of bulk strings, the shape every request takes on the wire.
    pub fn from_args<I>(args: I) -> Self
    where
        I: IntoIterator<Item = Bytes>,
    {
        RespFrame::Array(args.into_iter().map(RespFrame::BulkString).collect())
    }
}

/// Appends the RESP encoding of `frame` to `dst`. Encoding never fails.
pub fn encode_frame(frame: &RespFrame, dst: &mut BytesMut) {
    match frame {
        RespFrame::SimpleString(s) => encode_line(b'+', s.as_bytes(), dst),
        RespFrame::Error(s) => encode_line(b'-', s.as_bytes(), dst),
        RespFrame::Integer(i) => {
            let mut fmt = itoa::Buffer::new();
            encode_line(b':', fmt.format(*i).as_bytes(), dst);
        }
        RespFrame::BulkString(b) => {
            encode_len(b'$', b.len(), dst);
            dst.extend_from_slice(b);
            dst.extend_from_slice(CRLF);
        }
        RespFrame::Null => dst.extend_from_slice(b"$-1\r\n"),
        RespFrame::NullArray => dst.extend_from_slice(b"*-1\r\n"),
        RespFrame::Array(arr) => {
            encode_len(b'*', arr.len(), dst);
            for item in arr {
                encode_frame(item, dst);
            }
        }
    }
}

/// Writes a `<prefix><len>\r\n` header.
pub(crate) fn encode_len(prefix: u8, len: usize, dst: &mut BytesMut) {
    let mut fmt = itoa::Buffer::new();
    encode_line(prefix, fmt.format(len).as_bytes(), dst);
}

fn encode_line(prefix: u8, body: &[u8], dst: &mut BytesMut) {
    dst.reserve(body.len() + 3);
    dst.extend_from_slice(&[prefix]);
    dst.extend_from_slice(body);
    dst.extend_from_slice(CRLF);
}

/// A `tokio_util::codec` implementation for encoding and decoding `RespFrame`s.
#[derive(Debug, Default)]
pub struct RespFrameCodec;

impl Encoder<RespFrame> for RespFrameCodec {
    type Error = SpinelKvError;

    fn encode(&mut self, item: RespFrame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_frame(&item, dst);
        Ok(())
    }
}

impl Decoder for RespFrameCodec {
    type Item = RespFrame;
    type Error = SpinelKvError;

    /// Decodes one reply frame. Returns `Ok(None)` until the whole frame is buffered.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }

        let mut bytes = &src[..];
        match self.decode_recursive(&mut bytes, 0) {
            Ok(frame) => {
                let len = src.len() - bytes.len();
                src.advance(len);
                Ok(Some(frame))
            }
            Err(SpinelKvError::IncompleteData) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl RespFrameCodec {
    fn decode_recursive(&self, bytes: &mut &[u8], depth: usize) -> Result<RespFrame, SpinelKvError> {
        if depth > MAX_RECURSION_DEPTH {
            return Err(SpinelKvError::InvalidMultiBulkLength);
        }
        if bytes.is_empty() {
            return Err(SpinelKvError::IncompleteData);
        }

        let prefix = bytes[0];
        *bytes = &bytes[1..];
        match prefix {
            b'+' => Ok(RespFrame::SimpleString(self.parse_text(bytes)?)),
            b'-' => Ok(RespFrame::Error(self.parse_text(bytes)?)),
            b':' => Ok(RespFrame::Integer(self.parse_number(bytes)?)),
            b'$' => self.parse_bulk_string(bytes),
            b'*' => self.parse_array(bytes, depth),
            other => Err(SpinelKvError::UnexpectedByte(other as char)),
        }
    }

    fn parse_line<'a>(&self, bytes: &mut &'a [u8]) -> Result<&'a [u8], SpinelKvError> {
        let pos = find_crlf(bytes).ok_or(SpinelKvError::IncompleteData)?;
        let line = &bytes[..pos];
        *bytes = &bytes[pos + CRLF_LEN..];
        Ok(line)
    }

    fn parse_text(&self, bytes: &mut &[u8]) -> Result<String, SpinelKvError> {
        let line = self.parse_line(bytes)?;
        Ok(String::from_utf8_lossy(line).into_owned())
    }

    fn parse_number(&self, bytes: &mut &[u8]) -> Result<i64, SpinelKvError> {
        let line = self.parse_line(bytes)?;
        parse_int(line).ok_or(SpinelKvError::NotAnInteger)
    }

    fn parse_bulk_string(&self, bytes: &mut &[u8]) -> Result<RespFrame, SpinelKvError> {
        let line = self.parse_line(bytes)?;
        let len = parse_int(line).ok_or(SpinelKvError::InvalidBulkLength)?;
        if len == -1 {
            return Ok(RespFrame::Null);
        }
        if len < 0 || len as usize > MAX_BULK_STRING_SIZE {
            return Err(SpinelKvError::InvalidBulkLength);
        }

        let len = len as usize;
        if bytes.len() < len + CRLF_LEN {
            return Err(SpinelKvError::IncompleteData);
        }
        if &bytes[len..len + CRLF_LEN] != CRLF {
            return Err(SpinelKvError::InvalidBulkLength);
        }

        let data = Bytes::copy_from_slice(&bytes[..len]);
        *bytes = &bytes[len + CRLF_LEN..];
        Ok(RespFrame::BulkString(data))
    }

    fn parse_array(&self, bytes: &mut &[u8], depth: usize) -> Result<RespFrame, SpinelKvError> {
        let line = self.parse_line(bytes)?;
        let len = parse_int(line).ok_or(SpinelKvError::InvalidMultiBulkLength)?;
        if len == -1 {
            return Ok(RespFrame::NullArray);
        }
        if len < 0 || len as usize > MAX_FRAME_ELEMENTS {
            return Err(SpinelKvError::InvalidMultiBulkLength);
        }

        let mut frames = Vec::with_capacity(len as usize);
        for _ in 0..len {
            frames.push(self.decode_recursive(bytes, depth + 1)?);
        }
        Ok(RespFrame::Array(frames))
    }
}

/// Finds the next CRLF sequence in a buffer.
pub(crate) fn find_crlf(src: &[u8]) -> Option<usize> {
    src.windows(CRLF_LEN).position(|window| window == CRLF)
}

/// Parses an optionally negative ASCII decimal. Rejects empty input and any
/// non-digit byte.
pub(crate) fn parse_int(b: &[u8]) -> Option<i64> {
    let (negative, digits) = match b.split_first() {
        Some((b'-', rest)) => (true, rest),
        _ => (false, b),
    };
    if digits.is_empty() {
        return None;
    }
    let mut n: i64 = 0;
    for &d in digits {
        if !d.is_ascii_digit() {
            return None;
        }
        n = n.checked_mul(10)?.checked_add(i64::from(d - b'0'))?;
    }
    Some(if negative { -n } else { n })
}
