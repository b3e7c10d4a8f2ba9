// tests/property/codec_test.rs

//! Property-based tests for the request decoder: arbitrary arguments survive
//! the wire, however the bytes are split across reads.

use bytes::{Bytes, BytesMut};
use proptest::prelude::*;
use spinelkv::core::protocol::{RequestCodec, RespFrame, RespFrameCodec, encode_request};
use tokio_util::codec::Decoder;

fn arg_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..64)
}

fn frame_strategy() -> impl Strategy<Value = RespFrame> {
    let leaf = prop_oneof![
        "[a-zA-Z0-9 ]{0,20}".prop_map(RespFrame::SimpleString),
        "[a-zA-Z0-9 ]{0,20}".prop_map(RespFrame::Error),
        any::<i64>().prop_map(RespFrame::Integer),
        arg_strategy().prop_map(|b| RespFrame::BulkString(Bytes::from(b))),
        Just(RespFrame::Null),
        Just(RespFrame::NullArray),
    ];
    leaf.prop_recursive(4, 32, 6, |inner| {
        prop::collection::vec(inner, 0..6).prop_map(RespFrame::Array)
    })
}

/// Feeds `wire` to the decoder in the given chunk sizes and collects requests.
fn decode_in_chunks(wire: &[u8], chunks: &[usize]) -> Vec<Vec<Bytes>> {
    let mut codec = RequestCodec;
    let mut buf = BytesMut::new();
    let mut out = Vec::new();
    let mut pos = 0;
    let mut sizes = chunks.iter().cycle();
    while pos < wire.len() {
        let size = (*sizes.next().unwrap()).max(1).min(wire.len() - pos);
        buf.extend_from_slice(&wire[pos..pos + size]);
        pos += size;
        while let Some(request) = codec.decode(&mut buf).unwrap() {
            out.push(request);
        }
    }
    assert!(buf.is_empty(), "leftover bytes: {buf:?}");
    out
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 200,
        max_shrink_iters: 1000,
        ..ProptestConfig::default()
    })]

    #[test]
    fn test_multibulk_survives_any_split(
        requests in prop::collection::vec(prop::collection::vec(arg_strategy(), 1..6), 1..5),
        chunks in prop::collection::vec(1usize..16, 1..8)
    ) {
        let mut wire = Vec::new();
        for request in &requests {
            wire.extend_from_slice(&encode_request(request));
        }

        let decoded = decode_in_chunks(&wire, &chunks);
        let expected: Vec<Vec<Bytes>> = requests
            .iter()
            .map(|args| args.iter().map(|a| Bytes::copy_from_slice(a)).collect())
            .collect();
        prop_assert_eq!(decoded, expected);
    }

    #[test]
    fn test_truncated_request_is_never_complete(
        args in prop::collection::vec(arg_strategy(), 1..6),
        cut in any::<prop::sample::Index>()
    ) {
        let wire = encode_request(&args);
        let len = cut.index(wire.len());
        let mut buf = BytesMut::from(&wire[..len]);
        prop_assert_eq!(RequestCodec.decode(&mut buf).unwrap(), None);
        prop_assert_eq!(buf.len(), len);
    }

    #[test]
    fn test_inline_tokens_split_on_spaces(
        tokens in prop::collection::vec("[a-zA-Z0-9:_.-]{1,12}", 1..8),
        gaps in prop::collection::vec(1usize..4, 8)
    ) {
        let mut line = String::new();
        for (i, token) in tokens.iter().enumerate() {
            line.push_str(token);
            line.push_str(&" ".repeat(gaps[i]));
        }
        line.push_str("\r\n");

        let mut buf = BytesMut::from(line.as_bytes());
        let decoded = RequestCodec.decode(&mut buf).unwrap().unwrap();
        let expected: Vec<Bytes> = tokens
            .iter()
            .map(|t| Bytes::copy_from_slice(t.as_bytes()))
            .collect();
        prop_assert_eq!(decoded, expected);
        prop_assert!(buf.is_empty());
    }

    #[test]
    fn test_reply_frames_decode_to_themselves(
        frame in frame_strategy(),
        split in any::<prop::sample::Index>()
    ) {
        let wire = frame.encode_to_bytes();
        let at = split.index(wire.len());

        let mut buf = BytesMut::from(&wire[..at]);
        prop_assert_eq!(RespFrameCodec.decode(&mut buf).unwrap(), None);
        buf.extend_from_slice(&wire[at..]);
        prop_assert_eq!(RespFrameCodec.decode(&mut buf).unwrap(), Some(frame));
        prop_assert!(buf.is_empty());
    }
}
