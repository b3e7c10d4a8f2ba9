// tests/integration/set_commands_test.rs

//! Integration tests for set commands.

use super::test_helpers::{TestContext, bulk, error, ok};
use spinelkv::core::protocol::RespFrame;

#[tokio::test]
async fn test_sadd_smembers_scard() {
    let ctx = TestContext::new();
    let mut s = ctx.session();

    assert_eq!(
        ctx.run(&mut s, &["SADD", "s", "b", "a", "b"]).await,
        RespFrame::Integer(2)
    );
    assert_eq!(ctx.run(&mut s, &["SADD", "s", "a"]).await, RespFrame::Integer(0));
    assert_eq!(
        ctx.run(&mut s, &["SMEMBERS", "s"]).await,
        RespFrame::Array(vec![bulk("a"), bulk("b")])
    );
    assert_eq!(ctx.run(&mut s, &["SCARD", "s"]).await, RespFrame::Integer(2));
    assert_eq!(
        ctx.run(&mut s, &["SISMEMBER", "s", "a"]).await,
        RespFrame::Integer(1)
    );
    assert_eq!(
        ctx.run(&mut s, &["SISMEMBER", "s", "z"]).await,
        RespFrame::Integer(0)
    );
    assert_eq!(
        ctx.run(&mut s, &["SMEMBERS", "none"]).await,
        RespFrame::Array(vec![])
    );
}

#[tokio::test]
async fn test_srem_removes_empty_set() {
    let ctx = TestContext::new();
    let mut s = ctx.session();

    assert_eq!(
        ctx.run(&mut s, &["SADD", "s", "a", "b"]).await,
        RespFrame::Integer(2)
    );
    assert_eq!(
        ctx.run(&mut s, &["SREM", "s", "a", "b", "c"]).await,
        RespFrame::Integer(2)
    );
    assert_eq!(ctx.run(&mut s, &["EXISTS", "s"]).await, RespFrame::Integer(0));
    assert_eq!(ctx.run(&mut s, &["SREM", "s", "a"]).await, RespFrame::Integer(0));
}

#[tokio::test]
async fn test_set_commands_on_string() {
    let ctx = TestContext::new();
    let mut s = ctx.session();

    assert_eq!(ctx.run(&mut s, &["SET", "k", "v"]).await, ok());
    assert_eq!(
        ctx.run(&mut s, &["SADD", "k", "m"]).await,
        error("WRONGTYPE Operation against a key holding the wrong kind of value")
    );
}
