// src/core/protocol/request.rs

//! The request side of the wire: decodes RESP multi-bulk requests and the
//! legacy inline form into argument vectors.
//!
//! A decoded request borrows its arguments from the consumed frame, so each
//! argument is a cheap `Bytes` slice. Anything left in the buffer after a
//! complete request stays there to be combined with the next read.

use super::resp_frame::{CRLF_LEN, MAX_BULK_STRING_SIZE, MAX_FRAME_ELEMENTS, parse_int};
use crate::core::SpinelKvError;
use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Upper bound on the up-front argument allocation. A header alone can
/// declare a million arguments, and the frame may never arrive.
const SPANS_PREALLOC: usize = 64;

/// Decodes requests and writes pre-encoded reply bytes.
#[derive(Debug, Default)]
pub struct RequestCodec;

impl Decoder for RequestCodec {
    type Item = Vec<Bytes>;
    type Error = SpinelKvError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            if src.is_empty() {
                return Ok(None);
            }
            if src[0] == b'*' {
                return decode_multibulk(src);
            }

            let Some(newline) = src.iter().position(|&b| b == b'\n') else {
                return Ok(None);
            };
            let line_end = if newline > 0 && src[newline - 1] == b'\r' {
                newline - 1
            } else {
                newline
            };
            let args = split_inline(&src[..line_end])?;
            src.advance(newline + 1);
            // Blank lines produce no command.
            if !args.is_empty() {
                return Ok(Some(args));
            }
        }
    }
}

impl Encoder<Bytes> for RequestCodec {
    type Error = SpinelKvError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.extend_from_slice(&item);
        Ok(())
    }
}

/// Parses `*<argc>\r\n($<len>\r\n<bytes>\r\n)*`. Returns `Ok(None)` and leaves
/// `src` untouched when the frame is not complete yet.
fn decode_multibulk(src: &mut BytesMut) -> Result<Option<Vec<Bytes>>, SpinelKvError> {
    let buf = &src[..];
    let Some(header_end) = buf.iter().position(|&b| b == b'\n') else {
        return Ok(None);
    };
    if header_end < 2 || buf[header_end - 1] != b'\r' {
        return Err(SpinelKvError::InvalidMultiBulkLength);
    }
    let count = match parse_int(&buf[1..header_end - 1]) {
        Some(n) if n > 0 && n as usize <= MAX_FRAME_ELEMENTS => n as usize,
        _ => return Err(SpinelKvError::InvalidMultiBulkLength),
    };

    let mut spans = Vec::with_capacity(count.min(SPANS_PREALLOC));
    let mut pos = header_end + 1;
    for _ in 0..count {
        if pos >= buf.len() {
            return Ok(None);
        }
        if buf[pos] != b'$' {
            return Err(SpinelKvError::UnexpectedByte(buf[pos] as char));
        }
        let Some(offset) = buf[pos..].iter().position(|&b| b == b'\n') else {
            return Ok(None);
        };
        let line_end = pos + offset;
        if offset < 2 || buf[line_end - 1] != b'\r' {
            return Err(SpinelKvError::InvalidBulkLength);
        }
        let size = match parse_int(&buf[pos + 1..line_end - 1]) {
            Some(n) if n >= 0 && n as usize <= MAX_BULK_STRING_SIZE => n as usize,
            _ => return Err(SpinelKvError::InvalidBulkLength),
        };

        let data_start = line_end + 1;
        let data_end = data_start + size;
        if data_end + 1 >= buf.len() {
            return Ok(None);
        }
        if &buf[data_end..data_end + CRLF_LEN] != b"\r\n" {
            return Err(SpinelKvError::InvalidBulkLength);
        }
        spans.push((data_start, data_end));
        pos = data_end + CRLF_LEN;
    }

    let frame = src.split_to(pos).freeze();
    Ok(Some(
        spans
            .into_iter()
            .map(|(start, end)| frame.slice(start..end))
            .collect(),
    ))
}

/// Splits an inline request line on spaces. A token may be wrapped in `'` or
/// `"`, and inside quotes `\n`, `\r` and `\t` are unescaped. A quote must open
/// a token and a closing quote must end one.
pub fn split_inline(line: &[u8]) -> Result<Vec<Bytes>, SpinelKvError> {
    let mut args = Vec::new();
    let mut rest = line;
    let mut quote: Option<u8> = None;
    let mut escape = false;

    'outer: loop {
        let current = rest;
        let mut token = Vec::with_capacity(current.len());
        for (i, &c) in current.iter().enumerate() {
            match quote {
                None => {
                    if c == b' ' {
                        if !token.is_empty() {
                            args.push(Bytes::from(token));
                        }
                        rest = &current[i + 1..];
                        continue 'outer;
                    }
                    if c == b'"' || c == b'\'' {
                        if i != 0 {
                            return Err(SpinelKvError::UnbalancedQuotes);
                        }
                        quote = Some(c);
                        rest = &current[i + 1..];
                        continue 'outer;
                    }
                    token.push(c);
                }
                Some(q) => {
                    if escape {
                        escape = false;
                        token.push(match c {
                            b'n' => b'\n',
                            b'r' => b'\r',
                            b't' => b'\t',
                            other => other,
                        });
                    } else if c == q {
                        quote = None;
                        args.push(Bytes::from(token));
                        rest = &current[i + 1..];
                        if rest.first().is_some_and(|&b| b != b' ') {
                            return Err(SpinelKvError::UnbalancedQuotes);
                        }
                        continue 'outer;
                    } else if c == b'\\' {
                        escape = true;
                    } else {
                        token.push(c);
                    }
                }
            }
        }

        if quote.is_some() {
            return Err(SpinelKvError::UnbalancedQuotes);
        }
        if !current.is_empty() {
            args.push(Bytes::copy_from_slice(current));
        }
        return Ok(args);
    }
}

/// Encodes a request as a RESP multi-bulk frame, the form clients send.
pub fn encode_request<I, T>(args: I) -> Bytes
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    let args: Vec<T> = args.into_iter().collect();
    let mut dst = BytesMut::new();
    super::resp_frame::encode_len(b'*', args.len(), &mut dst);
    for arg in &args {
        let arg = arg.as_ref();
        super::resp_frame::encode_len(b'$', arg.len(), &mut dst);
        dst.extend_from_slice(arg);
        dst.extend_from_slice(b"\r\n");
    }
    dst.freeze()
}
