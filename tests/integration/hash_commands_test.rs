// tests/integration/hash_commands_test.rs

//! Integration tests for hash commands.

use super::test_helpers::{TestContext, bulk, error, ok};
use spinelkv::core::protocol::RespFrame;

#[tokio::test]
async fn test_hset_hget_hlen() {
    let ctx = TestContext::new();
    let mut s = ctx.session();

    assert_eq!(
        ctx.run(&mut s, &["HSET", "h", "a", "1", "b", "2"]).await,
        RespFrame::Integer(2)
    );
    // Updating an existing field is not counted.
    assert_eq!(
        ctx.run(&mut s, &["HSET", "h", "a", "10", "c", "3"]).await,
        RespFrame::Integer(1)
    );
    assert_eq!(ctx.run(&mut s, &["HGET", "h", "a"]).await, bulk("10"));
    assert_eq!(ctx.run(&mut s, &["HGET", "h", "zz"]).await, RespFrame::Null);
    assert_eq!(ctx.run(&mut s, &["HGET", "nohash", "a"]).await, RespFrame::Null);
    assert_eq!(ctx.run(&mut s, &["HLEN", "h"]).await, RespFrame::Integer(3));
    assert_eq!(
        ctx.run(&mut s, &["HSET", "h", "a"]).await,
        error("ERR wrong number of arguments for 'hset' command")
    );
    assert_eq!(
        ctx.run(&mut s, &["HSET", "h", "a", "1", "b"]).await,
        error("ERR wrong number of arguments for 'hset' command")
    );
}

#[tokio::test]
async fn test_hmget_hgetall_hexists() {
    let ctx = TestContext::new();
    let mut s = ctx.session();

    assert_eq!(
        ctx.run(&mut s, &["HSET", "h", "b", "2", "a", "1"]).await,
        RespFrame::Integer(2)
    );
    assert_eq!(
        ctx.run(&mut s, &["HMGET", "h", "a", "x", "b"]).await,
        RespFrame::Array(vec![bulk("1"), RespFrame::Null, bulk("2")])
    );
    assert_eq!(
        ctx.run(&mut s, &["HGETALL", "h"]).await,
        RespFrame::Array(vec![bulk("a"), bulk("1"), bulk("b"), bulk("2")])
    );
    assert_eq!(
        ctx.run(&mut s, &["HGETALL", "missing"]).await,
        RespFrame::Array(vec![])
    );
    assert_eq!(ctx.run(&mut s, &["HEXISTS", "h", "a"]).await, RespFrame::Integer(1));
    assert_eq!(ctx.run(&mut s, &["HEXISTS", "h", "z"]).await, RespFrame::Integer(0));
}

#[tokio::test]
async fn test_hdel_removes_empty_hash() {
    let ctx = TestContext::new();
    let mut s = ctx.session();

    assert_eq!(
        ctx.run(&mut s, &["HSET", "h", "a", "1", "b", "2"]).await,
        RespFrame::Integer(2)
    );
    assert_eq!(
        ctx.run(&mut s, &["HDEL", "h", "a", "zz"]).await,
        RespFrame::Integer(1)
    );
    assert_eq!(ctx.run(&mut s, &["HDEL", "h", "b"]).await, RespFrame::Integer(1));
    assert_eq!(ctx.run(&mut s, &["EXISTS", "h"]).await, RespFrame::Integer(0));
    assert_eq!(ctx.run(&mut s, &["HDEL", "h", "b"]).await, RespFrame::Integer(0));
}

#[tokio::test]
async fn test_hincrby() {
    let ctx = TestContext::new();
    let mut s = ctx.session();

    assert_eq!(
        ctx.run(&mut s, &["HINCRBY", "h", "n", "5"]).await,
        RespFrame::Integer(5)
    );
    assert_eq!(
        ctx.run(&mut s, &["HINCRBY", "h", "n", "-7"]).await,
        RespFrame::Integer(-2)
    );
    assert_eq!(ctx.run(&mut s, &["HSET", "h", "s", "x"]).await, RespFrame::Integer(1));
    assert_eq!(
        ctx.run(&mut s, &["HINCRBY", "h", "s", "1"]).await,
        error("ERR value is not an integer or out of range")
    );
}

#[tokio::test]
async fn test_hash_commands_on_string() {
    let ctx = TestContext::new();
    let mut s = ctx.session();

    assert_eq!(ctx.run(&mut s, &["SET", "k", "v"]).await, ok());
    assert_eq!(
        ctx.run(&mut s, &["HSET", "k", "f", "v"]).await,
        error("WRONGTYPE Operation against a key holding the wrong kind of value")
    );
    assert_eq!(
        ctx.run(&mut s, &["HGET", "k", "f"]).await,
        error("WRONGTYPE Operation against a key holding the wrong kind of value")
    );
}
