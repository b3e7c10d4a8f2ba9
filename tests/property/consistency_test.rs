// tests/property/consistency_test.rs

//! Property-based tests that compare command results against a simple model.

use crate::test_helpers::{TestContext, bulk};
use proptest::prelude::*;
use spinelkv::core::protocol::RespFrame;
use std::collections::{BTreeMap, VecDeque};

#[derive(Debug, Clone)]
enum ListOp {
    LPush(String),
    RPush(String),
    LPop,
    RPop,
}

fn list_op() -> impl Strategy<Value = ListOp> {
    prop_oneof![
        "[a-z]{1,4}".prop_map(ListOp::LPush),
        "[a-z]{1,4}".prop_map(ListOp::RPush),
        Just(ListOp::LPop),
        Just(ListOp::RPop),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 100,
        max_shrink_iters: 1000,
        ..ProptestConfig::default()
    })]

    #[test]
    fn test_incrby_matches_sum(deltas in prop::collection::vec(-1_000_000i64..1_000_000, 1..30)) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let ctx = TestContext::new();
            let mut s = ctx.session();
            let mut expected = 0i64;
            for delta in &deltas {
                expected += delta;
                let reply = ctx.run(&mut s, &["INCRBY", "n", &delta.to_string()]).await;
                assert_eq!(reply, RespFrame::Integer(expected));
            }
            assert_eq!(ctx.run(&mut s, &["GET", "n"]).await, bulk(&expected.to_string()));
        });
    }

    #[test]
    fn test_list_matches_deque(ops in prop::collection::vec(list_op(), 1..40)) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let ctx = TestContext::new();
            let mut s = ctx.session();
            let mut model: VecDeque<String> = VecDeque::new();
            for op in &ops {
                let reply = match op {
                    ListOp::LPush(v) => ctx.run(&mut s, &["LPUSH", "l", v]).await,
                    ListOp::RPush(v) => ctx.run(&mut s, &["RPUSH", "l", v]).await,
                    ListOp::LPop => ctx.run(&mut s, &["LPOP", "l"]).await,
                    ListOp::RPop => ctx.run(&mut s, &["RPOP", "l"]).await,
                };
                let expected = match op {
                    ListOp::LPush(v) => {
                        model.push_front(v.clone());
                        RespFrame::Integer(model.len() as i64)
                    }
                    ListOp::RPush(v) => {
                        model.push_back(v.clone());
                        RespFrame::Integer(model.len() as i64)
                    }
                    ListOp::LPop => model.pop_front().map_or(RespFrame::Null, |v| bulk(&v)),
                    ListOp::RPop => model.pop_back().map_or(RespFrame::Null, |v| bulk(&v)),
                };
                assert_eq!(reply, expected, "after {op:?}");
            }

            let all = ctx.run(&mut s, &["LRANGE", "l", "0", "-1"]).await;
            assert_eq!(all, RespFrame::Array(model.iter().map(|v| bulk(v)).collect()));
            let exists = if model.is_empty() { 0 } else { 1 };
            assert_eq!(ctx.run(&mut s, &["EXISTS", "l"]).await, RespFrame::Integer(exists));
        });
    }

    #[test]
    fn test_lrange_matches_slice(
        len in 0usize..12,
        start in -15i64..15,
        stop in -15i64..15
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let ctx = TestContext::new();
            let mut s = ctx.session();
            let items: Vec<String> = (0..len).map(|i| i.to_string()).collect();
            if !items.is_empty() {
                let mut args = vec!["RPUSH", "l"];
                args.extend(items.iter().map(String::as_str));
                ctx.run(&mut s, &args).await;
            }

            let n = len as i64;
            let from = if start < 0 { (n + start).max(0) } else { start };
            let to = if stop < 0 { n + stop } else { stop.min(n - 1) };
            let expected: Vec<RespFrame> = if n == 0 || from > to || from >= n {
                Vec::new()
            } else {
                items[from as usize..=to as usize].iter().map(|v| bulk(v)).collect()
            };

            let reply = ctx
                .run(&mut s, &["LRANGE", "l", &start.to_string(), &stop.to_string()])
                .await;
            assert_eq!(reply, RespFrame::Array(expected));
        });
    }

    #[test]
    fn test_zrange_is_sorted_by_score_then_member(
        members in prop::collection::btree_map("[a-z]{1,3}", -100i32..100, 1..20)
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let ctx = TestContext::new();
            let mut s = ctx.session();
            for (member, score) in &members {
                let reply = ctx.run(&mut s, &["ZADD", "z", &score.to_string(), member]).await;
                assert_eq!(reply, RespFrame::Integer(1));
            }

            let mut expected: Vec<(i32, &String)> =
                members.iter().map(|(m, score)| (*score, m)).collect();
            expected.sort();
            let reply = ctx.run(&mut s, &["ZRANGE", "z", "0", "-1"]).await;
            assert_eq!(
                reply,
                RespFrame::Array(expected.iter().map(|(_, m)| bulk(m)).collect())
            );
            assert_eq!(
                ctx.run(&mut s, &["ZCARD", "z"]).await,
                RespFrame::Integer(members.len() as i64)
            );
        });
    }

    #[test]
    fn test_hgetall_matches_map(
        fields in prop::collection::btree_map("[a-z]{1,6}", "[a-z0-9]{0,6}", 1..15)
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let ctx = TestContext::new();
            let mut s = ctx.session();
            let mut args = vec!["HSET", "h"];
            for (field, value) in &fields {
                args.push(field);
                args.push(value);
            }
            assert_eq!(
                ctx.run(&mut s, &args).await,
                RespFrame::Integer(fields.len() as i64)
            );

            let sorted: BTreeMap<_, _> = fields.clone();
            let expected: Vec<RespFrame> = sorted
                .iter()
                .flat_map(|(f, v)| [bulk(f), bulk(v)])
                .collect();
            assert_eq!(ctx.run(&mut s, &["HGETALL", "h"]).await, RespFrame::Array(expected));
        });
    }
}
