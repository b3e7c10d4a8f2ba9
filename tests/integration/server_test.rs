// tests/integration/server_test.rs

//! End-to-end tests over real TCP connections.

use super::test_helpers::{TestServer, bulk, error, ok, status};
use bytes::Bytes;
use spinelkv::config::Config;
use spinelkv::core::protocol::RespFrame;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

#[tokio::test]
async fn test_set_then_get() {
    let server = TestServer::start().await;
    let mut client = server.client().await;

    assert_eq!(client.cmd(&["SET", "a", "b"]).await, ok());
    assert_eq!(client.cmd(&["GET", "a"]).await, bulk("b"));

    server.stop().await;
}

#[tokio::test]
async fn test_prepared_exec_returns_one_array() {
    let server = TestServer::start().await;
    let mut client = server.client().await;

    assert_eq!(client.cmd(&["SET", "a", "b"]).await, ok());
    assert_eq!(client.cmd(&["MULTI"]).await, ok());
    assert_eq!(client.cmd(&["GET", "a"]).await, status("QUEUED"));
    assert_eq!(client.cmd(&["PREPARE"]).await, ok());
    assert_eq!(
        client.cmd(&["EXEC"]).await,
        RespFrame::Array(vec![bulk("b")])
    );

    server.stop().await;
}

#[tokio::test]
async fn test_watch_detects_write_from_other_connection() {
    let server = TestServer::start().await;
    let mut watcher = server.client().await;
    let mut writer = server.client().await;

    assert_eq!(watcher.cmd(&["WATCH", "a"]).await, ok());
    assert_eq!(writer.cmd(&["SET", "a", "c"]).await, ok());
    assert_eq!(watcher.cmd(&["MULTI"]).await, ok());
    assert_eq!(watcher.cmd(&["GET", "a"]).await, status("QUEUED"));
    assert_eq!(
        watcher.cmd(&["PREPARE"]).await,
        error("ERR watch key changed")
    );
    // The transaction was discarded.
    assert_eq!(watcher.cmd(&["EXEC"]).await, error("ERR Exec not prepared"));
    assert_eq!(watcher.cmd(&["GET", "a"]).await, bulk("c"));

    server.stop().await;
}

#[tokio::test]
async fn test_exec_of_empty_queue_replies_empty_array_status() {
    let server = TestServer::start().await;
    let mut client = server.client().await;

    assert_eq!(client.cmd(&["MULTI"]).await, ok());
    assert_eq!(client.cmd(&["PREPARE"]).await, ok());
    assert_eq!(client.cmd(&["EXEC"]).await, status("(empty array)"));
    assert_eq!(server.state.tx.in_flight(), 0);

    server.stop().await;
}

#[tokio::test]
async fn test_truncated_bulk_closes_connection_without_reply() {
    let server = TestServer::start().await;
    let client = server.client().await;

    let mut stream = client.into_stream();
    stream.write_all(b"*2\r\n$3\r\nfoo").await.unwrap();
    stream.shutdown().await.unwrap();

    let mut rest = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut rest))
        .await
        .expect("server did not close the connection")
        .unwrap();
    assert!(rest.is_empty(), "unexpected reply: {rest:?}");

    server.stop().await;
}

#[tokio::test]
async fn test_malformed_bulk_header_closes_connection() {
    let server = TestServer::start().await;
    let mut client = server.client().await;

    client.send_raw(b"*1\r\n+PING\r\n").await;
    assert!(client.read_to_end().await.is_empty());

    server.stop().await;
}

#[tokio::test]
async fn test_inline_requests() {
    let server = TestServer::start().await;
    let mut client = server.client().await;

    client.send_raw(b"PING\r\n").await;
    assert_eq!(client.read_reply().await, status("PONG"));

    client.send_raw(b"SET greeting \"hello world\"\n").await;
    assert_eq!(client.read_reply().await, ok());
    assert_eq!(client.cmd(&["GET", "greeting"]).await, bulk("hello world"));

    // A blank line produces no command and no reply.
    client.send_raw(b"\r\nECHO hi\r\n").await;
    assert_eq!(client.read_reply().await, bulk("hi"));

    server.stop().await;
}

#[tokio::test]
async fn test_unbalanced_inline_quotes_close_connection() {
    let server = TestServer::start().await;
    let mut client = server.client().await;

    client.send_raw(b"SET a \"b\r\n").await;
    assert!(client.read_to_end().await.is_empty());

    server.stop().await;
}

#[tokio::test]
async fn test_pipelined_requests_answered_in_order() {
    let server = TestServer::start().await;
    let mut client = server.client().await;

    client
        .send_raw(b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\n1\r\n*2\r\n$4\r\nINCR\r\n$1\r\nk\r\n*2\r\n$3\r\nGET\r\n$1\r\nk\r\n")
        .await;
    assert_eq!(client.read_reply().await, ok());
    assert_eq!(client.read_reply().await, RespFrame::Integer(2));
    assert_eq!(client.read_reply().await, bulk("2"));

    server.stop().await;
}

#[tokio::test]
async fn test_request_split_across_writes() {
    let server = TestServer::start().await;
    let mut client = server.client().await;

    client.send_raw(b"*2\r\n$4\r\nEC").await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    client.send_raw(b"HO\r\n$5\r\nhel").await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    client.send_raw(b"lo\r\n").await;
    assert_eq!(client.read_reply().await, bulk("hello"));

    server.stop().await;
}

#[tokio::test]
async fn test_command_errors_keep_connection_open() {
    let server = TestServer::start().await;
    let mut client = server.client().await;

    assert_eq!(
        client.cmd(&["NOSUCHCMD"]).await,
        error("ERR empty command for 'nosuchcmd' command")
    );
    assert_eq!(
        client.cmd(&["GET"]).await,
        error("ERR wrong number of arguments for 'get' command")
    );
    assert_eq!(client.cmd(&["PING"]).await, status("PONG"));

    server.stop().await;
}

#[tokio::test]
async fn test_quit_replies_ok_and_closes() {
    let server = TestServer::start().await;
    let mut client = server.client().await;

    assert_eq!(client.cmd(&["QUIT"]).await, ok());
    assert!(client.read_to_end().await.is_empty());

    server.stop().await;
}

#[tokio::test]
async fn test_disconnect_releases_transaction_state() {
    let server = TestServer::start().await;
    let mut client = server.client().await;

    assert_eq!(client.cmd(&["WATCH", "a"]).await, ok());
    assert_eq!(client.cmd(&["MULTI"]).await, ok());
    assert_eq!(client.cmd(&["SET", "a", "1"]).await, status("QUEUED"));
    assert_eq!(client.cmd(&["PREPARE"]).await, ok());
    assert_eq!(server.state.tx.locks().tracked_keys(), 1);
    drop(client);

    let locks = server.state.tx.locks();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while locks.tracked_keys() > 0 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(locks.tracked_keys(), 0);
    assert_eq!(server.state.tx.in_flight(), 0);

    // Another client can lock the key right away.
    let mut other = server.client().await;
    assert_eq!(other.cmd(&["WATCH", "a"]).await, ok());
    assert_eq!(other.cmd(&["MULTI"]).await, ok());
    assert_eq!(other.cmd(&["SET", "a", "2"]).await, status("QUEUED"));
    assert_eq!(other.cmd(&["PREPARE"]).await, ok());
    assert_eq!(other.cmd(&["EXEC"]).await, RespFrame::Array(vec![ok()]));

    server.stop().await;
}

#[tokio::test]
async fn test_max_clients_rejects_extra_connection() {
    let config = Config {
        max_clients: 1,
        ..Config::default()
    };
    let server = TestServer::start_with(config).await;
    let mut first = server.client().await;
    assert_eq!(first.cmd(&["PING"]).await, status("PONG"));

    let mut second = server.client().await;
    assert_eq!(
        second.read_reply().await,
        error("ERR max number of clients reached")
    );

    drop(first);
    server.stop().await;
}

#[tokio::test]
async fn test_binary_safe_values() {
    let server = TestServer::start().await;
    let mut client = server.client().await;

    let value = Bytes::from_static(b"\x00\r\n\xff");
    client
        .send_frame(RespFrame::from_args([
            Bytes::from_static(b"SET"),
            Bytes::from_static(b"bin"),
            value.clone(),
        ]))
        .await;
    assert_eq!(client.read_reply().await, ok());
    assert_eq!(
        client.cmd(&["GET", "bin"]).await,
        RespFrame::BulkString(value)
    );

    server.stop().await;
}

#[tokio::test]
async fn test_idle_connection_closed_after_keepalive() {
    let config = Config {
        keepalive: Duration::from_millis(100),
        ..Config::default()
    };
    let server = TestServer::start_with(config).await;
    let client = server.client().await;

    assert!(client.read_to_end().await.is_empty());

    server.stop().await;
}

#[tokio::test]
async fn test_clients_registered_while_connected() {
    let server = TestServer::start().await;
    let mut client = server.client().await;
    assert_eq!(client.cmd(&["PING"]).await, status("PONG"));
    assert_eq!(server.state.clients.len(), 1);

    assert_eq!(client.cmd(&["QUIT"]).await, ok());
    let _ = client.read_to_end().await;
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !server.state.clients.is_empty() && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(server.state.clients.is_empty());

    server.stop().await;
}
