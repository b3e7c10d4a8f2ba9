// tests/integration/string_commands_test.rs

//! Integration tests for string and key commands.

use super::test_helpers::{TestContext, bulk, error, ok, status};
use spinelkv::core::protocol::RespFrame;
use std::time::Duration;

#[tokio::test]
async fn test_set_get_and_overwrite() {
    let ctx = TestContext::new();
    let mut s = ctx.session();

    assert_eq!(ctx.run(&mut s, &["GET", "missing"]).await, RespFrame::Null);
    assert_eq!(ctx.run(&mut s, &["SET", "k", "v1"]).await, ok());
    assert_eq!(ctx.run(&mut s, &["SET", "k", "v2"]).await, ok());
    assert_eq!(ctx.run(&mut s, &["GET", "k"]).await, bulk("v2"));
    assert_eq!(ctx.run(&mut s, &["STRLEN", "k"]).await, RespFrame::Integer(2));
}

#[tokio::test]
async fn test_set_conditions() {
    let ctx = TestContext::new();
    let mut s = ctx.session();

    assert_eq!(ctx.run(&mut s, &["SET", "k", "a", "XX"]).await, RespFrame::Null);
    assert_eq!(ctx.run(&mut s, &["SET", "k", "a", "NX"]).await, ok());
    assert_eq!(ctx.run(&mut s, &["SET", "k", "b", "NX"]).await, RespFrame::Null);
    assert_eq!(ctx.run(&mut s, &["SET", "k", "c", "xx"]).await, ok());
    assert_eq!(ctx.run(&mut s, &["GET", "k"]).await, bulk("c"));
    assert_eq!(
        ctx.run(&mut s, &["SET", "k", "d", "NX", "XX"]).await,
        error("ERR syntax error")
    );
    assert_eq!(
        ctx.run(&mut s, &["SET", "k", "d", "EX"]).await,
        error("ERR syntax error")
    );
    assert_eq!(
        ctx.run(&mut s, &["SET", "k", "d", "EX", "0"]).await,
        error("ERR invalid expire time in 'set' command")
    );
}

#[tokio::test]
async fn test_set_with_expiry() {
    let ctx = TestContext::new();
    let mut s = ctx.session();

    assert_eq!(ctx.run(&mut s, &["SET", "k", "v", "PX", "50"]).await, ok());
    assert_eq!(ctx.run(&mut s, &["GET", "k"]).await, bulk("v"));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(ctx.run(&mut s, &["GET", "k"]).await, RespFrame::Null);
    assert_eq!(ctx.run(&mut s, &["EXISTS", "k"]).await, RespFrame::Integer(0));
}

#[tokio::test]
async fn test_setnx_setex_getset() {
    let ctx = TestContext::new();
    let mut s = ctx.session();

    assert_eq!(ctx.run(&mut s, &["SETNX", "k", "1"]).await, RespFrame::Integer(1));
    assert_eq!(ctx.run(&mut s, &["SETNX", "k", "2"]).await, RespFrame::Integer(0));
    assert_eq!(ctx.run(&mut s, &["GETSET", "k", "3"]).await, bulk("1"));
    assert_eq!(ctx.run(&mut s, &["GETSET", "new", "x"]).await, RespFrame::Null);

    assert_eq!(ctx.run(&mut s, &["SETEX", "t", "100", "v"]).await, ok());
    assert_eq!(ctx.run(&mut s, &["TTL", "t"]).await, RespFrame::Integer(100));
    assert_eq!(
        ctx.run(&mut s, &["SETEX", "t", "-1", "v"]).await,
        error("ERR invalid expire time in 'setex' command")
    );
}

#[tokio::test]
async fn test_mset_mget() {
    let ctx = TestContext::new();
    let mut s = ctx.session();

    assert_eq!(ctx.run(&mut s, &["MSET", "a", "1", "b", "2"]).await, ok());
    assert_eq!(ctx.run(&mut s, &["HSET", "h", "f", "v"]).await, RespFrame::Integer(1));
    assert_eq!(
        ctx.run(&mut s, &["MGET", "a", "missing", "b", "h"]).await,
        RespFrame::Array(vec![bulk("1"), RespFrame::Null, bulk("2"), RespFrame::Null])
    );
    assert_eq!(
        ctx.run(&mut s, &["MSET", "a", "1", "b"]).await,
        error("ERR wrong number of arguments for 'mset' command")
    );
}

#[tokio::test]
async fn test_counters() {
    let ctx = TestContext::new();
    let mut s = ctx.session();

    assert_eq!(ctx.run(&mut s, &["INCR", "n"]).await, RespFrame::Integer(1));
    assert_eq!(ctx.run(&mut s, &["INCRBY", "n", "10"]).await, RespFrame::Integer(11));
    assert_eq!(ctx.run(&mut s, &["DECR", "n"]).await, RespFrame::Integer(10));
    assert_eq!(ctx.run(&mut s, &["DECRBY", "n", "-5"]).await, RespFrame::Integer(15));
    assert_eq!(ctx.run(&mut s, &["GET", "n"]).await, bulk("15"));

    assert_eq!(ctx.run(&mut s, &["SET", "text", "abc"]).await, ok());
    assert_eq!(
        ctx.run(&mut s, &["INCR", "text"]).await,
        error("ERR value is not an integer or out of range")
    );
    assert_eq!(
        ctx.run(&mut s, &["INCRBY", "n", "x"]).await,
        error("ERR value is not an integer or out of range")
    );

    assert_eq!(
        ctx.run(&mut s, &["SET", "max", "9223372036854775807"]).await,
        ok()
    );
    assert_eq!(
        ctx.run(&mut s, &["INCR", "max"]).await,
        error("ERR increment or decrement would overflow")
    );
}

#[tokio::test]
async fn test_append() {
    let ctx = TestContext::new();
    let mut s = ctx.session();

    assert_eq!(ctx.run(&mut s, &["APPEND", "k", "Hello"]).await, RespFrame::Integer(5));
    assert_eq!(ctx.run(&mut s, &["APPEND", "k", " World"]).await, RespFrame::Integer(11));
    assert_eq!(ctx.run(&mut s, &["GET", "k"]).await, bulk("Hello World"));
}

#[tokio::test]
async fn test_wrong_type() {
    let ctx = TestContext::new();
    let mut s = ctx.session();

    assert_eq!(ctx.run(&mut s, &["LPUSH", "list", "a"]).await, RespFrame::Integer(1));
    assert_eq!(
        ctx.run(&mut s, &["GET", "list"]).await,
        error("WRONGTYPE Operation against a key holding the wrong kind of value")
    );
    // SET replaces a value of any type.
    assert_eq!(ctx.run(&mut s, &["SET", "list", "x"]).await, ok());
    assert_eq!(ctx.run(&mut s, &["TYPE", "list"]).await, status("string"));
}

#[tokio::test]
async fn test_del_exists_type() {
    let ctx = TestContext::new();
    let mut s = ctx.session();

    assert_eq!(ctx.run(&mut s, &["MSET", "a", "1", "b", "2"]).await, ok());
    assert_eq!(
        ctx.run(&mut s, &["EXISTS", "a", "a", "zz"]).await,
        RespFrame::Integer(2)
    );
    assert_eq!(ctx.run(&mut s, &["DEL", "a", "b", "zz"]).await, RespFrame::Integer(2));
    assert_eq!(ctx.run(&mut s, &["TYPE", "a"]).await, status("none"));
    assert_eq!(ctx.run(&mut s, &["DBSIZE"]).await, RespFrame::Integer(0));
}

#[tokio::test]
async fn test_expire_ttl_persist() {
    let ctx = TestContext::new();
    let mut s = ctx.session();

    assert_eq!(ctx.run(&mut s, &["TTL", "k"]).await, RespFrame::Integer(-2));
    assert_eq!(ctx.run(&mut s, &["SET", "k", "v"]).await, ok());
    assert_eq!(ctx.run(&mut s, &["TTL", "k"]).await, RespFrame::Integer(-1));
    assert_eq!(ctx.run(&mut s, &["EXPIRE", "k", "10"]).await, RespFrame::Integer(1));
    assert_eq!(ctx.run(&mut s, &["TTL", "k"]).await, RespFrame::Integer(10));
    let RespFrame::Integer(pttl) = ctx.run(&mut s, &["PTTL", "k"]).await else {
        panic!("PTTL should reply with an integer");
    };
    assert!(pttl > 9_000 && pttl <= 10_000);
    assert_eq!(ctx.run(&mut s, &["PERSIST", "k"]).await, RespFrame::Integer(1));
    assert_eq!(ctx.run(&mut s, &["PERSIST", "k"]).await, RespFrame::Integer(0));
    assert_eq!(ctx.run(&mut s, &["TTL", "k"]).await, RespFrame::Integer(-1));

    assert_eq!(ctx.run(&mut s, &["PEXPIRE", "k", "0"]).await, RespFrame::Integer(1));
    assert_eq!(ctx.run(&mut s, &["EXISTS", "k"]).await, RespFrame::Integer(0));
    assert_eq!(ctx.run(&mut s, &["EXPIRE", "k", "10"]).await, RespFrame::Integer(0));
}

#[tokio::test]
async fn test_keys_and_scan() {
    let ctx = TestContext::new();
    let mut s = ctx.session();

    for key in ["user:1", "user:2", "user:3", "order:1"] {
        assert_eq!(ctx.run(&mut s, &["SET", key, "v"]).await, ok());
    }
    assert_eq!(
        ctx.run(&mut s, &["KEYS", "user:*"]).await,
        RespFrame::Array(vec![bulk("user:1"), bulk("user:2"), bulk("user:3")])
    );

    let mut cursor = "0".to_string();
    let mut seen = Vec::new();
    loop {
        let reply = ctx.run(&mut s, &["SCAN", &cursor, "COUNT", "2"]).await;
        let RespFrame::Array(parts) = reply else {
            panic!("SCAN should reply with an array");
        };
        let [RespFrame::BulkString(next), RespFrame::Array(keys)] = parts.as_slice() else {
            panic!("unexpected SCAN reply shape");
        };
        seen.extend(keys.iter().cloned());
        cursor = String::from_utf8_lossy(next).into_owned();
        if cursor == "0" {
            break;
        }
    }
    assert_eq!(seen.len(), 4);

    assert_eq!(
        ctx.run(&mut s, &["SCAN", "0", "MATCH", "order:*", "COUNT", "10"]).await,
        RespFrame::Array(vec![bulk("0"), RespFrame::Array(vec![bulk("order:1")])])
    );
    assert_eq!(
        ctx.run(&mut s, &["SCAN", "0", "COUNT", "0"]).await,
        error("ERR syntax error")
    );
}

#[tokio::test]
async fn test_flushdb() {
    let ctx = TestContext::new();
    let mut s = ctx.session();

    assert_eq!(ctx.run(&mut s, &["MSET", "a", "1", "b", "2"]).await, ok());
    assert_eq!(ctx.run(&mut s, &["DBSIZE"]).await, RespFrame::Integer(2));
    assert_eq!(ctx.run(&mut s, &["FLUSHDB"]).await, ok());
    assert_eq!(ctx.run(&mut s, &["DBSIZE"]).await, RespFrame::Integer(0));
}
