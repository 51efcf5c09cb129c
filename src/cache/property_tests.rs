//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check replay, overwrite, and type-isolation properties.

use proptest::prelude::*;
use std::time::Duration;
use tempfile::TempDir;

use crate::cache::{Cache, TaggedValue};
use crate::config::PersistenceConfig;
use crate::context::Context;
use crate::error::ErrorKind;

// == Strategies ==
/// Keys from a small alphabet so operations collide often, including spaces.
fn key_strategy() -> impl Strategy<Value = String> {
    "[a-c][a-c ]{0,2}[a-c]"
}

fn value_strategy() -> impl Strategy<Value = TaggedValue> {
    prop_oneof![
        any::<i64>().prop_map(TaggedValue::Int),
        any::<u64>().prop_map(TaggedValue::Uint),
        any::<f64>()
            .prop_filter("NaN never equals itself", |f| !f.is_nan())
            .prop_map(TaggedValue::Float),
        "[ -~\n\t]{0,24}".prop_map(TaggedValue::Str),
        "[a-z ]{0,12}".prop_map(|text| {
            let n = text.len();
            let doc = serde_json::json!({ "text": text, "n": n });
            TaggedValue::Obj(serde_json::to_vec(&doc).unwrap())
        }),
    ]
}

#[derive(Debug, Clone)]
enum CacheOp {
    Set {
        key: String,
        value: TaggedValue,
        ttl_secs: u64,
    },
    Incr {
        key: String,
    },
    Delete {
        key: String,
    },
    Cleanup,
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        4 => (key_strategy(), value_strategy(), prop_oneof![Just(0u64), Just(3600u64)])
            .prop_map(|(key, value, ttl_secs)| CacheOp::Set { key, value, ttl_secs }),
        1 => key_strategy().prop_map(|key| CacheOp::Incr { key }),
        2 => key_strategy().prop_map(|key| CacheOp::Delete { key }),
        1 => Just(CacheOp::Cleanup),
    ]
}

fn run(cache: &Cache, op: &CacheOp) {
    let ctx = Context::background();
    match op {
        CacheOp::Set {
            key,
            value,
            ttl_secs,
        } => cache
            .set_value(&ctx, key, value.clone(), Duration::from_secs(*ttl_secs))
            .unwrap(),
        CacheOp::Incr { key } => {
            // Mismatched kinds and overflow are expected outcomes here.
            let _ = cache.incr(&ctx, key);
        }
        CacheOp::Delete { key } => cache.delete(&ctx, key).unwrap(),
        CacheOp::Cleanup => {
            cache.cleanup(&ctx).unwrap();
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    // Closing and reopening a persistent cache reproduces the map built by
    // applying the same operations to a memory-only cache.
    #[test]
    fn prop_replay_reconstructs_map(ops in prop::collection::vec(cache_op_strategy(), 1..40)) {
        let dir = TempDir::new().expect("temp dir");
        let config = PersistenceConfig::at(dir.path().join("cache.aof"));
        let ctx = Context::background();

        let persistent = Cache::new(&config, &ctx).unwrap();
        let model = Cache::in_memory();
        for op in &ops {
            run(&persistent, op);
            run(&model, op);
        }
        persistent.close().unwrap();
        drop(persistent);

        let replayed = Cache::new(&config, &ctx).unwrap();
        let mut expected = model.snapshot();
        let mut actual = replayed.snapshot();
        // Expiry timestamps are computed per call, so compare them loosely.
        for entry in expected.values_mut().chain(actual.values_mut()) {
            entry.expire_at = entry.expire_at.map(|_| 1);
        }
        prop_assert_eq!(actual, expected);
    }

    // The typed getters never coerce strings into numbers or numbers into strings.
    #[test]
    fn prop_type_isolation(key in key_strategy(), text in "[a-z0-9]{0,16}", n in any::<i64>()) {
        let cache = Cache::in_memory();
        let ctx = Context::background();

        cache.set(&ctx, &key, text.as_str(), Duration::ZERO).unwrap();
        prop_assert_eq!(cache.get_int(&ctx, &key).unwrap_err().kind(), ErrorKind::TypeMismatch);
        prop_assert_eq!(cache.get_float(&ctx, &key).unwrap_err().kind(), ErrorKind::TypeMismatch);
        prop_assert_eq!(cache.get_string(&ctx, &key).unwrap(), text);

        cache.set(&ctx, &key, &n, Duration::ZERO).unwrap();
        prop_assert_eq!(cache.get_string(&ctx, &key).unwrap_err().kind(), ErrorKind::TypeMismatch);
        prop_assert_eq!(cache.get_int(&ctx, &key).unwrap(), n);
    }

    // Storing V1 then V2 under one key leaves exactly V2.
    #[test]
    fn prop_overwrite_semantics(
        key in key_strategy(),
        first in value_strategy(),
        second in value_strategy()
    ) {
        let cache = Cache::in_memory();
        let ctx = Context::background();

        cache.set_value(&ctx, &key, first, Duration::ZERO).unwrap();
        cache.set_value(&ctx, &key, second.clone(), Duration::ZERO).unwrap();

        prop_assert_eq!(cache.get(&ctx, &key).unwrap(), second);
        prop_assert_eq!(cache.len(), 1);
    }

    // A signed counter created by incr counts exactly the number of calls.
    #[test]
    fn prop_incr_counts_calls(key in key_strategy(), calls in 1usize..50) {
        let cache = Cache::in_memory();
        let ctx = Context::background();

        for _ in 0..calls {
            cache.incr(&ctx, &key).unwrap();
        }
        prop_assert_eq!(cache.get_int(&ctx, &key).unwrap(), calls as i64);
    }
}
