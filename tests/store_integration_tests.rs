//! Integration Tests for the Store
//!
//! Drives the public API end to end: bounded eviction, expiry, structured
//! values and the shared store with its background sweeper.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use expiring_store::{
    EvictionStrategy, MockClock, SharedStore, Store, StoreConfig, StoreError,
};
use futures::StreamExt;
use serde_json::{json, Value};
use tokio_test::{assert_err, assert_ok};
use tracing_subscriber::EnvFilter;

// == Helper Functions ==

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn mock_store<V: Clone>(config: StoreConfig) -> (Store<String, V>, Arc<MockClock>) {
    init_tracing();
    let clock = Arc::new(MockClock::new(0));
    let store = Store::new(config.with_passive_sweep_probability(0.0))
        .unwrap()
        .with_clock(clock.clone());
    (store, clock)
}

// == Eviction ==

#[test]
fn test_lru_evicts_least_recently_read() {
    let (mut store, _) = mock_store(
        StoreConfig::default()
            .with_max_size(3)
            .with_eviction_strategy(EvictionStrategy::Lru),
    );

    store.set("a".to_string(), 1);
    store.set("b".to_string(), 2);
    store.set("c".to_string(), 3);
    assert_eq!(store.get("a"), Some(1));
    assert_eq!(store.get("b"), Some(2));
    store.set("d".to_string(), 4);

    assert!(store.has("a"));
    assert!(store.has("b"));
    assert!(!store.has("c"));
    assert!(store.has("d"));

    // has() is not a use, so "a" is now the oldest touch
    store.set("e".to_string(), 5);

    assert!(!store.has("a"));
    assert!(store.has("b"));
    assert!(store.has("d"));
    assert!(store.has("e"));
    assert_eq!(store.len(), 3);
    assert_eq!(store.stats().evictions, 2);
}

#[test]
fn test_fifo_ignores_reads() {
    let (mut store, _) = mock_store(
        StoreConfig::default()
            .with_max_size(2)
            .with_eviction_strategy(EvictionStrategy::Fifo),
    );

    store.set("a".to_string(), 1);
    store.set("b".to_string(), 2);
    store.get("a");
    store.set("c".to_string(), 3);

    assert_eq!(store.keys(), vec!["b".to_string(), "c".to_string()]);
}

#[test]
fn test_eviction_callback_sees_each_victim_once() {
    let evicted = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&evicted);
    let (store, _) = mock_store(StoreConfig::default().with_max_size(2));
    let mut store = store.with_on_evict(move |key: &String, value: &u32| {
        sink.lock().unwrap().push((key.clone(), *value));
        Ok(())
    });

    store.populate((1..=5).map(|i| (format!("k{}", i), i)));
    store.delete("k5");

    assert_eq!(
        *evicted.lock().unwrap(),
        vec![
            ("k1".to_string(), 1),
            ("k2".to_string(), 2),
            ("k3".to_string(), 3),
        ]
    );
    assert_eq!(store.stats().evictions, 3);
}

#[test]
fn test_failing_callback_does_not_block_writes() {
    let (store, _) = mock_store(StoreConfig::default().with_max_size(1));
    let mut store = store.with_on_evict(|_: &String, _: &u32| anyhow::bail!("sink unavailable"));

    store.set("a".to_string(), 1);
    store.set("b".to_string(), 2);

    assert_eq!(store.get("b"), Some(2));
    assert!(!store.has("a"));
    assert_eq!(store.stats().callback_failures, 1);
}

// == Expiration ==

#[test]
fn test_default_ttl_expires_entries() {
    let (mut store, clock) = mock_store(StoreConfig::default().with_ttl_ms(1_000));

    store.set("session".to_string(), 7);
    clock.advance(999);
    assert_eq!(store.get("session"), Some(7));

    clock.advance(1);
    assert_eq!(store.get("session"), None);
    assert_eq!(store.stats().expirations, 1);
}

#[test]
fn test_explicit_ttl_overrides_default() {
    let (mut store, clock) = mock_store(StoreConfig::default().with_ttl_ms(10_000));

    assert_ok!(store.set_with_ttl("short".to_string(), 1, 50));
    store.set("long".to_string(), 2);
    assert_eq!(store.ttl_remaining_ms("short"), Some(50));

    clock.advance(50);
    assert!(!store.has("short"));
    assert!(store.has("long"));
}

#[test]
fn test_negative_ttl_is_rejected() {
    let (mut store, _) = mock_store::<u32>(StoreConfig::default());

    let err = assert_err!(store.set_with_ttl("k".to_string(), 1, -5));

    assert_eq!(err, StoreError::InvalidTtl(-5));
    assert!(store.is_empty());
}

#[test]
fn test_sweep_expired_without_reads() {
    let (mut store, clock) = mock_store(StoreConfig::default());
    for i in 0..10 {
        assert_ok!(store.set_with_ttl(format!("t{}", i), i, 100));
    }
    store.set("keep".to_string(), 99);

    clock.advance(100);

    assert_eq!(store.sweep_expired(), 10);
    assert_eq!(store.keys(), vec!["keep".to_string()]);
    assert_eq!(store.tracked_len(), 0);
}

#[test]
fn test_iteration_skips_expired_entries() {
    let (mut store, clock) = mock_store(StoreConfig::default());
    store.set("a".to_string(), 1);
    assert_ok!(store.set_with_ttl("b".to_string(), 2, 10));
    store.set("c".to_string(), 3);
    clock.advance(10);

    let items: Vec<(String, u32)> = store.iter().collect();

    assert_eq!(items, vec![("a".to_string(), 1), ("c".to_string(), 3)]);
    assert_eq!(store.len(), 2);
}

// == Structured Values ==

#[test]
fn test_add_merges_nested_objects() {
    let (mut store, _) = mock_store::<Value>(StoreConfig::default());
    store.set(
        "user".to_string(),
        json!({ "name": "ada", "prefs": { "theme": "dark", "lang": "en" } }),
    );

    store.add("user".to_string(), json!({ "prefs": { "lang": "fr" }, "age": 36 }));

    assert_eq!(
        store.get("user"),
        Some(json!({
            "name": "ada",
            "prefs": { "theme": "dark", "lang": "fr" },
            "age": 36
        }))
    );
}

#[test]
fn test_add_on_missing_key_inserts_patch() {
    let (mut store, _) = mock_store::<Value>(StoreConfig::default());

    store.add("new".to_string(), json!({ "x": 1 }));

    assert_eq!(store.get("new"), Some(json!({ "x": 1 })));
}

#[test]
fn test_remove_paths_from_document() {
    let (mut store, _) = mock_store::<Value>(StoreConfig::default());
    store.set(
        "doc".to_string(),
        json!({ "a": { "b": 1, "c": 2 }, "list": [10, 20, 30] }),
    );

    let removed = assert_ok!(store.remove_paths("doc", &["a.b", "list[1]", "missing.path"]));

    assert_eq!(removed, 2);
    assert_eq!(
        store.get("doc"),
        Some(json!({ "a": { "c": 2 }, "list": [10, 30] }))
    );
}

#[test]
fn test_remove_paths_errors() {
    let (mut store, _) = mock_store::<Value>(StoreConfig::default());
    store.set("scalar".to_string(), json!(5));

    assert!(matches!(
        store.remove_paths("absent", &["a"]),
        Err(StoreError::KeyNotFound(_))
    ));
    assert!(matches!(
        store.remove_paths("scalar", &["a"]),
        Err(StoreError::NotStructured(_))
    ));
    assert!(matches!(
        store.remove_paths("scalar", &["a..b"]),
        Err(StoreError::InvalidPath(_))
    ));
}

// == Scans ==

#[test]
fn test_find_and_filter() {
    let (mut store, _) = mock_store(StoreConfig::default());
    store.populate([
        ("apple".to_string(), 3),
        ("banana".to_string(), 8),
        ("cherry".to_string(), 12),
    ]);

    assert_eq!(store.find(|_, value| *value > 5), Some(8));
    assert_eq!(store.find(|key, _| key.starts_with('z')), None);
    assert_eq!(store.filter(|_, value| value % 2 == 0), vec![8, 12]);
}

// == Destroy ==

#[test]
fn test_destroy_then_reuse_as_plain_map() {
    let (mut store, clock) = mock_store(StoreConfig::default().with_ttl_ms(100));
    store.set("a".to_string(), 1);

    store.destroy();
    store.destroy();
    assert!(store.is_destroyed());
    assert!(store.is_empty());

    store.set("b".to_string(), 2);
    clock.advance(1_000);
    assert_eq!(store.get("b"), Some(2));
}

// == Configuration ==

#[test]
fn test_invalid_config_is_rejected() {
    let config = StoreConfig::default().with_sweep_chunk_size(0);

    let result = Store::<String, u32>::new(config);

    assert!(matches!(result, Err(StoreError::Configuration(_))));
}

// == Shared Store ==

#[tokio::test(start_paused = true)]
async fn test_shared_store_background_sweep() {
    init_tracing();
    let clock = Arc::new(MockClock::new(0));
    let config = StoreConfig::default()
        .with_sweep_interval_ms(500)
        .with_sweep_chunk_size(4)
        .with_passive_sweep_probability(0.0);
    let store: Store<String, u32> = Store::new(config).unwrap().with_clock(clock.clone());
    let shared = SharedStore::new(store);

    {
        let mut store = shared.lock().await;
        for i in 0..20 {
            store.set_with_ttl(format!("k{}", i), i, 100).unwrap();
        }
        store.set("keep".to_string(), 1);
    }
    clock.advance(100);
    tokio::time::sleep(Duration::from_millis(600)).await;

    {
        let store = shared.lock().await;
        assert_eq!(store.len(), 1);
        assert_eq!(store.stats().expirations, 20);
    }

    shared.destroy().await;
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert!(!shared.is_sweeping());
}

#[tokio::test]
async fn test_shared_store_entries_stream() {
    init_tracing();
    let store: Store<String, u32> = Store::new(StoreConfig::default()).unwrap();
    let shared = SharedStore::new(store);
    shared
        .lock()
        .await
        .populate([("x".to_string(), 1), ("y".to_string(), 2)]);

    let items: Vec<(String, u32)> = shared.entries().collect().await;

    assert_eq!(items, vec![("x".to_string(), 1), ("y".to_string(), 2)]);
    shared.destroy().await;
}

#[tokio::test]
async fn test_shared_store_across_tasks() {
    let store: Store<String, u32> =
        Store::new(StoreConfig::default().with_max_size(100)).unwrap();
    let shared = SharedStore::new(store);

    let mut handles = Vec::new();
    for worker in 0..4u32 {
        let shared = shared.clone();
        handles.push(tokio::spawn(async move {
            for i in 0..50u32 {
                shared.lock().await.set(format!("w{}-{}", worker, i), i);
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let store = shared.lock().await;
    assert_eq!(store.len(), 100);
    assert_eq!(store.stats().evictions, 100);
    drop(store);
    shared.destroy().await;
}
