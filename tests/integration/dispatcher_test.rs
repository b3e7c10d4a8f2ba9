// tests/integration/dispatcher_test.rs

//! Integration tests for command lookup, argument checks, the slow log and
//! slot redirects.

use super::test_helpers::{TestContext, bulk, error, ok, status};
use parking_lot::Mutex;
use spinelkv::config::Config;
use spinelkv::core::cluster::slot::{get_slot, key_hash};
use spinelkv::core::latency::SlowLogSink;
use spinelkv::core::protocol::RespFrame;
use spinelkv::core::state::Collaborators;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_unknown_command() {
    let ctx = TestContext::new();
    let mut s = ctx.session();

    assert_eq!(
        ctx.run(&mut s, &["NOSUCHCMD", "a"]).await,
        error("ERR empty command for 'nosuchcmd' command")
    );
}

#[tokio::test]
async fn test_arity_is_checked_before_execution() {
    let ctx = TestContext::new();
    let mut s = ctx.session();

    assert_eq!(
        ctx.run(&mut s, &["GET"]).await,
        error("ERR wrong number of arguments for 'get' command")
    );
    assert_eq!(
        ctx.run(&mut s, &["GET", "a", "b"]).await,
        error("ERR wrong number of arguments for 'get' command")
    );
    assert_eq!(
        ctx.run(&mut s, &["SET", "k"]).await,
        error("ERR wrong number of arguments for 'set' command")
    );
    assert_eq!(ctx.run(&mut s, &["EXISTS", "k"]).await, RespFrame::Integer(0));
}

#[tokio::test]
async fn test_command_names_ignore_case() {
    let ctx = TestContext::new();
    let mut s = ctx.session();

    assert_eq!(ctx.run(&mut s, &["sEt", "k", "v"]).await, ok());
    assert_eq!(ctx.run(&mut s, &["get", "k"]).await, bulk("v"));
    assert_eq!(ctx.run(&mut s, &["Ping"]).await, status("PONG"));
}

#[tokio::test]
async fn test_ping_echo_time() {
    let ctx = TestContext::new();
    let mut s = ctx.session();

    assert_eq!(ctx.run(&mut s, &["PING", "hello"]).await, bulk("hello"));
    assert_eq!(
        ctx.run(&mut s, &["PING", "a", "b"]).await,
        error("ERR wrong number of arguments for 'ping' command")
    );
    assert_eq!(ctx.run(&mut s, &["ECHO", "x y"]).await, bulk("x y"));

    let RespFrame::Array(parts) = ctx.run(&mut s, &["TIME"]).await else {
        panic!("TIME should reply with an array");
    };
    let [RespFrame::BulkString(secs), RespFrame::BulkString(micros)] = parts.as_slice() else {
        panic!("unexpected TIME reply shape");
    };
    let secs: u64 = std::str::from_utf8(secs).unwrap().parse().unwrap();
    let micros: u64 = std::str::from_utf8(micros).unwrap().parse().unwrap();
    assert!(secs > 1_600_000_000);
    assert!(micros < 1_000_000);
}

#[tokio::test]
async fn test_script_subcommands_are_folded() {
    let ctx = TestContext::new();
    let mut s = ctx.session();

    assert_eq!(
        ctx.run(&mut s, &["SCRIPT", "LOAD", "return 1"]).await,
        bulk("e0e1f9fabfc9d4800c877a703b823ac0578ff8db")
    );
    assert_eq!(ctx.run(&mut s, &["script", "len"]).await, RespFrame::Integer(1));
    assert_eq!(
        ctx.run(
            &mut s,
            &["SCRIPT", "EXISTS", "e0e1f9fabfc9d4800c877a703b823ac0578ff8db", "ffff"]
        )
        .await,
        RespFrame::Array(vec![RespFrame::Integer(1), RespFrame::Integer(0)])
    );
    assert_eq!(ctx.run(&mut s, &["SCRIPT", "FLUSH"]).await, ok());
    assert_eq!(ctx.run(&mut s, &["SCRIPT", "LEN"]).await, RespFrame::Integer(0));

    assert_eq!(
        ctx.run(&mut s, &["SCRIPT"]).await,
        error("ERR wrong number of arguments for 'script' command")
    );
    assert_eq!(
        ctx.run(&mut s, &["SCRIPT", "FOO"]).await,
        error("ERR empty command for 'scriptfoo' command")
    );
    assert_eq!(
        ctx.run(&mut s, &["SCRIPT", "LOAD"]).await,
        error("ERR wrong number of arguments for 'scriptload' command")
    );
}

#[tokio::test]
async fn test_key_hash_is_recorded_on_session() {
    let ctx = TestContext::new();
    let mut s = ctx.session();

    ctx.run(&mut s, &["GET", "user:{42}:name"]).await;
    assert_eq!(s.key_hash, key_hash(b"user:{42}:name"));
    assert_eq!(s.key_hash, key_hash(b"42"));

    ctx.run(&mut s, &["PING"]).await;
    assert_eq!(s.key_hash, 0);
}

#[tokio::test]
async fn test_info_sections() {
    let ctx = TestContext::new();
    let mut s = ctx.session();

    let RespFrame::BulkString(all) = ctx.run(&mut s, &["INFO"]).await else {
        panic!("INFO should reply with a bulk string");
    };
    let all = String::from_utf8(all.to_vec()).unwrap();
    for section in ["# Server", "# Clients", "# Stats", "# Transactions"] {
        assert!(all.contains(section), "missing {section} in {all}");
    }
    assert!(all.contains("role:master"));
    assert!(all.contains("tx_enabled:1"));
    assert!(all.contains("tx_lock_shards:200"));

    let RespFrame::BulkString(one) = ctx.run(&mut s, &["INFO", "Clients"]).await else {
        panic!("INFO should reply with a bulk string");
    };
    let one = String::from_utf8(one.to_vec()).unwrap();
    assert!(one.starts_with("# Clients\r\n"));
    assert!(!one.contains("# Server"));

    assert_eq!(
        ctx.run(&mut s, &["INFO", "a", "b"]).await,
        error("ERR syntax error")
    );
}

#[tokio::test]
async fn test_slowlog_records_commands_over_threshold() {
    let config = Config {
        slow_time: Duration::ZERO,
        ..Config::default()
    };
    let ctx = TestContext::with_config(config);
    let mut s = ctx.session();

    assert_eq!(ctx.run(&mut s, &["SET", "k", "v"]).await, ok());

    // A command is recorded after its reply is built, so SLOWLOG sees only
    // the commands before it.
    let RespFrame::Array(entries) = ctx.run(&mut s, &["SLOWLOG", "GET", "1"]).await else {
        panic!("SLOWLOG GET should reply with an array");
    };
    assert_eq!(entries.len(), 1);
    let RespFrame::Array(fields) = &entries[0] else {
        panic!("slow log entry should be an array");
    };
    assert_eq!(fields[0], RespFrame::Integer(0));
    assert!(matches!(fields[1], RespFrame::Integer(ts) if ts > 0));
    assert_eq!(
        fields[3],
        RespFrame::Array(vec![bulk("set"), bulk("k")])
    );

    assert_eq!(ctx.run(&mut s, &["SLOWLOG", "LEN"]).await, RespFrame::Integer(2));
    assert_eq!(ctx.run(&mut s, &["SLOWLOG", "RESET"]).await, ok());
    assert_eq!(ctx.run(&mut s, &["SLOWLOG", "LEN"]).await, RespFrame::Integer(1));
    assert_eq!(
        ctx.run(&mut s, &["SLOWLOG", "FOO"]).await,
        error("ERR unknown subcommand 'foo'")
    );
    assert_eq!(
        ctx.run(&mut s, &["SLOWLOG", "LEN", "x"]).await,
        error("ERR wrong number of arguments for 'slowlog' command")
    );
    assert!(ctx.state.stats.get_slow_queries() >= 6);
}

#[tokio::test]
async fn test_fast_commands_are_not_slow() {
    let ctx = TestContext::new();
    let mut s = ctx.session();

    assert_eq!(ctx.run(&mut s, &["SET", "k", "v"]).await, ok());
    assert_eq!(ctx.run(&mut s, &["SLOWLOG", "LEN"]).await, RespFrame::Integer(0));
}

#[derive(Debug, Default)]
struct RecordingSink {
    reports: Mutex<Vec<(String, Vec<u8>)>>,
}

impl SlowLogSink for RecordingSink {
    fn send(&self, command: &str, key: &[u8], _cost_ns: u64) {
        self.reports.lock().push((command.to_string(), key.to_vec()));
    }
}

#[tokio::test]
async fn test_custom_slow_log_sink() {
    let config = Config {
        slow_time: Duration::ZERO,
        ..Config::default()
    };
    let sink = Arc::new(RecordingSink::default());
    let mut collaborators = Collaborators::from_config(&config).unwrap();
    collaborators.slow_log_sink = Some(Arc::clone(&sink) as Arc<dyn SlowLogSink>);
    let ctx = TestContext::with_collaborators(config, collaborators);
    let mut s = ctx.session();

    assert_eq!(ctx.run(&mut s, &["HSET", "h", "f", "v"]).await, RespFrame::Integer(1));
    assert_eq!(ctx.run(&mut s, &["SCRIPT", "LEN"]).await, RespFrame::Integer(0));

    let reports = sink.reports.lock().clone();
    assert_eq!(
        reports,
        vec![
            ("hset".to_string(), b"h".to_vec()),
            ("scriptlen".to_string(), Vec::new()),
        ]
    );
    // The built-in log is bypassed.
    assert!(ctx.state.slow_log.is_empty());
}

#[tokio::test]
async fn test_foreign_slot_is_redirected() {
    let mut config = Config::default();
    config.cluster.enabled = true;
    config.cluster.owned_slots = vec![get_slot(b"local").to_string()];
    config.cluster.redirect_addr = "10.0.0.2:7000".to_string();
    let ctx = TestContext::with_config(config);
    let mut s = ctx.session();

    assert_ne!(get_slot(b"local"), get_slot(b"remote"));
    assert_eq!(ctx.run(&mut s, &["SET", "local", "v"]).await, ok());
    assert_eq!(
        ctx.run(&mut s, &["SET", "remote", "v"]).await,
        error(&format!("MOVED {} 10.0.0.2:7000", get_slot(b"remote")))
    );
    assert_eq!(s.key_hash, key_hash(b"remote"));
    // Keyless commands are always served.
    assert_eq!(ctx.run(&mut s, &["PING"]).await, status("PONG"));
    assert_eq!(ctx.run(&mut s, &["DBSIZE"]).await, RespFrame::Integer(1));
}
