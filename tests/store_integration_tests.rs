//! Integration Tests for the Expiring Store
//!
//! Exercises the public API the way chat-event handlers use it: many
//! concurrent callers, TTL'd toggles, deleted-message feeds and rate limits.

use std::sync::Arc;
use std::time::Duration;

use expiring_store::{Config, ExpiringStore, JsonStore, Position, Shape, StoreError, StoredValue};
use serde_json::json;
use tokio::time::sleep;
use tokio_test::{assert_err, assert_ok};

// == Helper Functions ==

fn secs(n: u64) -> Option<Duration> {
    Some(Duration::from_secs(n))
}

// == TTL ==

#[tokio::test(start_paused = true)]
async fn test_ttl_removal() {
    let store = JsonStore::new();
    store.set("insult:5e1f", json!(true), secs(5));

    assert_eq!(store.get_scalar("insult:5e1f"), Some(json!(true)));

    sleep(Duration::from_millis(5_010)).await;

    assert_eq!(store.get("insult:5e1f"), None);
    assert!(store.keys().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_ttl_cancellation_on_overwrite() {
    let store = JsonStore::new();
    store.set("auto_reply:77aa", json!("v1"), secs(10));

    sleep(Duration::from_secs(1)).await;
    store.set("auto_reply:77aa", json!("v2"), secs(30));

    sleep(Duration::from_secs(10)).await;
    assert_eq!(store.get_scalar("auto_reply:77aa"), Some(json!("v2")));

    sleep(Duration::from_secs(21)).await;
    assert_eq!(store.get_scalar("auto_reply:77aa"), None);
    assert_eq!(store.stats().expirations, 1);
}

#[tokio::test(start_paused = true)]
async fn test_remove_cancels_timer_before_reinsert() {
    let store = JsonStore::new();
    store.set("self_reaction:01", json!("🔥"), secs(5));
    assert!(store.remove("self_reaction:01"));

    sleep(Duration::from_secs(3)).await;
    store.set("self_reaction:01", json!("💀"), None);

    sleep(Duration::from_secs(10)).await;
    assert_eq!(store.get_scalar("self_reaction:01"), Some(json!("💀")));
}

// == Removal ==

#[tokio::test]
async fn test_removal_idempotence() {
    let store = JsonStore::new();

    assert!(!store.remove("absent"));

    store.set("present", json!(1), None);
    assert!(store.remove("present"));
    assert!(!store.remove("present"));
}

// == Shapes ==

#[tokio::test]
async fn test_type_mismatch_isolation() {
    let store = JsonStore::new();
    store.set("k", json!("x"), None);

    let err = assert_err!(store.list_append("k", [json!(1)], Position::Front, None));
    assert_eq!(
        err,
        StoreError::TypeMismatch {
            key: "k".to_string(),
            expected: Shape::List,
            found: Shape::Scalar,
        }
    );
    assert_eq!(store.get("k"), Some(StoredValue::Scalar(json!("x"))));
}

#[tokio::test]
async fn test_list_ordering() {
    let store = JsonStore::new();
    assert_ok!(store.list_push("k", json!("a")));
    assert_ok!(store.list_push("k", json!("b")));

    assert_eq!(store.get("k"), Some(StoredValue::List(vec![json!("b"), json!("a")])));
}

#[tokio::test]
async fn test_emptied_list_is_not_deleted() {
    let store = JsonStore::new();
    assert_ok!(store.list_push("snipe:c0", json!({"content": "hi"})));
    assert!(store.list_remove_one("snipe:c0", &json!({"content": "hi"})));

    assert_eq!(store.get_list("snipe:c0"), Some(vec![]));
    assert_eq!(store.list_members("snipe:c0"), Some(vec![]));
    assert_eq!(store.keys(), vec!["snipe:c0".to_string()]);
}

#[tokio::test]
async fn test_returned_lists_are_copies() {
    let store = JsonStore::new();
    assert_ok!(store.list_push("k", json!(1)));

    let mut snapshot = store.get_list("k").unwrap();
    snapshot.push(json!(2));

    assert_eq!(store.get_list("k"), Some(vec![json!(1)]));
}

// == Rate Limiting ==

#[tokio::test(start_paused = true)]
async fn test_rate_limiter_fixed_window() {
    let store = JsonStore::new();
    let window = Duration::from_secs(60);

    assert!(!store.check_rate_limit("u", 3, window));
    assert!(!store.check_rate_limit("u", 3, window));
    assert!(store.check_rate_limit("u", 3, window));
    assert!(store.check_rate_limit("u", 3, window));

    sleep(window).await;

    assert!(!store.check_rate_limit("u", 3, window));
}

#[tokio::test]
async fn test_rate_limiter_parameter_stickiness() {
    let store = JsonStore::new();
    let window = Duration::from_secs(60);

    assert!(!store.check_rate_limit("u", 3, window));
    assert!(!store.check_rate_limit("u", 3, window));
    // A larger limit on a later call does not raise the limit in force
    assert!(store.check_rate_limit("u", 10, window));
}

#[tokio::test]
async fn test_rate_limit_buckets_are_independent_of_entries() {
    let store = JsonStore::new();
    store.set("u", json!("entry"), None);

    assert!(store.check_rate_limit("u", 1, Duration::from_secs(60)));
    assert_eq!(store.get_scalar("u"), Some(json!("entry")));
    assert!(store.remove("u"));
    assert!(store.is_rate_limited("u"));
}

// == Concurrency ==

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_rate_limit_checks_are_linearized() {
    let store = JsonStore::new();
    let limit = 5;
    let calls = 200;

    let tasks: Vec<_> = (0..calls)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move { store.check_rate_limit("spam:1", limit, Duration::from_secs(3600)) })
        })
        .collect();

    let mut limited = 0;
    for task in tasks {
        if task.await.unwrap() {
            limited += 1;
        }
    }

    assert_eq!(limited, calls - (limit as usize - 1));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_appends_keep_every_value() {
    let store: Arc<ExpiringStore<u32>> = Arc::new(ExpiringStore::new());

    let tasks: Vec<_> = (0..8u32)
        .map(|writer| {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                for i in 0..50 {
                    store
                        .list_append("feed", [writer * 1000 + i], Position::Front, secs(60))
                        .unwrap();
                }
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap();
    }

    let mut items = store.get_list("feed").unwrap();
    items.sort_unstable();
    items.dedup();
    assert_eq!(items.len(), 400);
    assert!(store.ttl("feed").flatten().is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_short_ttl_overwrites_never_leave_stale_removals() {
    let store: ExpiringStore<u32> = ExpiringStore::new();

    let tasks: Vec<_> = (0..4u32)
        .map(|writer| {
            let store = store.clone();
            tokio::spawn(async move {
                for i in 0..200 {
                    store.set("contested", writer * 1000 + i, Some(Duration::from_millis(1)));
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap();
    }

    // The last write stands until its own timer fires, never before
    store.set("contested", 42, Some(Duration::from_secs(60)));
    sleep(Duration::from_millis(50)).await;
    assert_eq!(store.get_scalar("contested"), Some(42));
    assert_eq!(store.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_timers_clean_up_many_keys() {
    let store: ExpiringStore<u32> = ExpiringStore::new();

    for i in 0..100u32 {
        store.set(format!("toggle:{}", i), i, Some(Duration::from_millis(20)));
    }
    assert_eq!(store.len(), 100);

    sleep(Duration::from_millis(300)).await;

    assert!(store.is_empty());
    assert_eq!(store.stats().expirations, 100);
}

// == Configuration ==

#[tokio::test(start_paused = true)]
async fn test_put_without_default_ttl_persists() {
    let config = Config {
        default_ttl: 0,
        ..Config::default()
    };
    let store = JsonStore::with_config(&config);
    store.put("pack:aa", json!(true));

    sleep(Duration::from_secs(86_400)).await;

    assert_eq!(store.get_scalar("pack:aa"), Some(json!(true)));
}
