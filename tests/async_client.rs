#![cfg(feature = "async")]

use redguard::{AsyncCacheClient, AsyncIdWorker, CacheOptions, KeyValueStore, LocalStore};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Shop {
    id: u64,
    name: String,
}

fn shop(id: u64, name: &str) -> Shop {
    Shop {
        id,
        name: name.into(),
    }
}

fn client() -> (Arc<LocalStore>, AsyncCacheClient<LocalStore>) {
    let store = Arc::new(LocalStore::new());
    let options = CacheOptions::default()
        .with_jitter_max(Duration::ZERO)
        .with_rebuild_workers(4)
        .with_mutex_retries(5)
        .with_mutex_backoff(Duration::from_millis(5));
    (
        Arc::clone(&store),
        AsyncCacheClient::with_options(store, options),
    )
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within 2s");
}

const TTL: Duration = Duration::from_secs(60);

#[tokio::test]
async fn pass_through_absorbs_repeated_misses() {
    let (_store, cache) = client();
    let calls = Arc::new(AtomicUsize::new(0));

    for _ in 0..2 {
        let counted = Arc::clone(&calls);
        let found: Option<Shop> = cache
            .query_with_pass_through("cache:shop:", &999u64, move |_| async move {
                counted.fetch_add(1, Ordering::SeqCst);
                Ok(None)
            }, TTL)
            .await
            .unwrap();
        assert_eq!(found, None);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn pass_through_caches_present_values() {
    let (_store, cache) = client();
    let calls = Arc::new(AtomicUsize::new(0));

    let mut reads = Vec::new();
    for _ in 0..2 {
        let counted = Arc::clone(&calls);
        let found = cache
            .query_with_pass_through("cache:shop:", &1u64, move |id| async move {
                counted.fetch_add(1, Ordering::SeqCst);
                Ok(Some(shop(id, "A")))
            }, TTL)
            .await
            .unwrap();
        reads.push(found);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(reads[0], reads[1]);
    assert_eq!(reads[0], Some(shop(1, "A")));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_stale_reads_trigger_at_most_one_rebuild() {
    let (_store, cache) = client();
    let cache = Arc::new(cache);
    let calls = Arc::new(AtomicUsize::new(0));
    cache
        .set_with_logical_expire("cache:shop:9", &shop(9, "old"), Duration::ZERO)
        .await
        .unwrap();

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let calls = Arc::clone(&calls);
            tokio::spawn(async move {
                let counted = Arc::clone(&calls);
                cache
                    .query_with_logical_expire("cache:shop:", &9u64, move |id| async move {
                        counted.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        Ok(Some(shop(id, "new")))
                    }, TTL)
                    .await
                    .unwrap()
            })
        })
        .collect();

    for task in tasks {
        let read = task.await.unwrap().unwrap();
        assert!(read == shop(9, "old") || read == shop(9, "new"));
    }

    wait_until(|| calls.load(Ordering::SeqCst) >= 1).await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn stale_entry_refreshes_in_the_background() {
    let (store, cache) = client();
    cache
        .set_with_logical_expire("cache:shop:2", &shop(2, "old"), Duration::ZERO)
        .await
        .unwrap();

    let stale: Option<Shop> = cache
        .query_with_logical_expire("cache:shop:", &2u64, |id| async move {
            Ok(Some(shop(id, "new")))
        }, TTL)
        .await
        .unwrap();
    assert_eq!(stale, Some(shop(2, "old")));

    wait_until(|| {
        store
            .get("cache:shop:2")
            .map(|json| json.map_or(false, |json| json.contains("new")))
            .unwrap_or(false)
    })
    .await;

    let refreshed: Option<Shop> = cache
        .query_with_logical_expire("cache:shop:", &2u64, |_| async {
            panic!("refreshed entry must not trigger a rebuild")
        }, TTL)
        .await
        .unwrap();
    assert_eq!(refreshed, Some(shop(2, "new")));
}

#[tokio::test]
async fn mutex_variant_fills_once_then_hits() {
    let (_store, cache) = client();
    let calls = Arc::new(AtomicUsize::new(0));

    let mut reads = Vec::new();
    for _ in 0..2 {
        let counted = Arc::clone(&calls);
        let found = cache
            .query_with_mutex("cache:shop:", &5u64, move |id| {
                let counted = Arc::clone(&counted);
                async move {
                    counted.fetch_add(1, Ordering::SeqCst);
                    Ok(Some(shop(id, "A")))
                }
            }, TTL)
            .await
            .unwrap();
        reads.push(found);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(reads[0], Some(shop(5, "A")));
    assert_eq!(reads[0], reads[1]);
}

#[tokio::test]
async fn async_ids_strictly_increase() {
    let store = Arc::new(LocalStore::new());
    let worker = AsyncIdWorker::new(store);

    let mut last = 0;
    for _ in 0..200 {
        let id = worker.next_id("order").await.unwrap();
        assert!(id > last);
        last = id;
    }
}
