use redguard::{CacheClient, CacheOptions, DistributedLock, LocalStore, RedguardError};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Address {
    city: String,
    street: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Shop {
    id: u64,
    name: String,
    address: Option<Address>,
}

fn shop(id: u64) -> Shop {
    Shop {
        id,
        name: format!("shop-{id}"),
        address: Some(Address {
            city: "Hangzhou".into(),
            street: "1 Wenyi Rd".into(),
        }),
    }
}

fn client(null_ttl: Duration) -> (Arc<LocalStore>, CacheClient<LocalStore>) {
    let store = Arc::new(LocalStore::new());
    let options = CacheOptions::default()
        .with_null_ttl(null_ttl)
        .with_jitter_max(Duration::ZERO)
        .with_rebuild_workers(2)
        .with_mutex_retries(50)
        .with_mutex_backoff(Duration::from_millis(10));
    (Arc::clone(&store), CacheClient::with_options(store, options))
}

const TTL: Duration = Duration::from_secs(60);

#[test]
fn missing_id_hits_the_database_at_most_once() {
    let (_store, cache) = client(Duration::from_secs(60));
    let calls = AtomicUsize::new(0);

    let first: Option<Shop> = cache
        .query_with_pass_through("cache:shop:", &999u64, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }, TTL)
        .unwrap();
    assert_eq!(first, None);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // The tombstone absorbs the repeat lookup.
    let second: Option<Shop> = cache
        .query_with_pass_through("cache:shop:", &999u64, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }, TTL)
        .unwrap();
    assert_eq!(second, None);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn tombstone_expiry_reopens_the_fallback_path() {
    let (_store, cache) = client(Duration::from_millis(50));
    let calls = AtomicUsize::new(0);
    let lookup = |calls: &AtomicUsize| {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(None::<Shop>)
    };

    for _ in 0..2 {
        let found = cache
            .query_with_pass_through("cache:shop:", &999u64, |_| lookup(&calls), TTL)
            .unwrap();
        assert_eq!(found, None);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    thread::sleep(Duration::from_millis(80));
    let found = cache
        .query_with_pass_through("cache:shop:", &999u64, |_| lookup(&calls), TTL)
        .unwrap();
    assert_eq!(found, None);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn present_id_is_served_from_cache_on_the_second_read() {
    let (_store, cache) = client(Duration::from_secs(60));
    let calls = AtomicUsize::new(0);

    let first = cache
        .query_with_pass_through("cache:shop:", &1u64, |id| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(Some(shop(*id)))
        }, TTL)
        .unwrap();
    let second = cache
        .query_with_pass_through("cache:shop:", &1u64, |id| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(Some(shop(*id)))
        }, TTL)
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(first, second);
    assert_eq!(first, Some(shop(1)));
}

#[test]
fn plain_write_round_trips_nested_payloads() {
    let (_store, cache) = client(Duration::from_secs(60));
    let original = shop(7);
    cache.set("cache:shop:7", &original, TTL).unwrap();

    let read: Option<Shop> = cache
        .query_with_pass_through("cache:shop:", &7u64, |_| {
            panic!("hit must not consult the database")
        }, TTL)
        .unwrap();
    assert_eq!(read, Some(original));
}

#[test]
fn invalidate_forces_a_fresh_database_read() {
    let (_store, cache) = client(Duration::from_secs(60));
    let calls = AtomicUsize::new(0);

    for _ in 0..2 {
        let _ = cache
            .query_with_pass_through("cache:shop:", &3u64, |id| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(Some(shop(*id)))
            }, TTL)
            .unwrap();
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    assert!(cache.invalidate("cache:shop:3").unwrap());
    let _ = cache
        .query_with_pass_through("cache:shop:", &3u64, |id| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(Some(shop(*id)))
        }, TTL)
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn mutex_variant_fills_once_then_hits() {
    let (_store, cache) = client(Duration::from_secs(60));
    let calls = AtomicUsize::new(0);
    let lookup = |id: &u64| {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(Some(shop(*id)))
    };

    let first = cache
        .query_with_mutex("cache:shop:", &5u64, &lookup, TTL)
        .unwrap();
    let second = cache
        .query_with_mutex("cache:shop:", &5u64, &lookup, TTL)
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(first, second);
}

#[test]
fn mutex_variant_gives_up_under_persistent_contention() {
    let (store, cache) = client(Duration::from_secs(60));

    // Somebody else holds the rebuild lock and never lets go.
    let foreign = DistributedLock::new(Arc::clone(&store), Duration::from_secs(30));
    let _held = foreign.try_acquire("lock:5").unwrap().unwrap();

    let outcome: Result<Option<Shop>, _> =
        cache.query_with_mutex("cache:shop:", &5u64, |_| Ok(None), TTL);
    assert!(matches!(outcome, Err(RedguardError::RetryExhausted(_))));
}

#[test]
fn concurrent_mutex_readers_share_one_database_hit() {
    let (_store, cache) = client(Duration::from_secs(60));
    let cache = Arc::new(cache);
    let calls = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let calls = Arc::clone(&calls);
            thread::spawn(move || {
                cache
                    .query_with_mutex("cache:shop:", &11u64, |id| {
                        calls.fetch_add(1, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(30));
                        Ok(Some(shop(*id)))
                    }, TTL)
                    .unwrap()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), Some(shop(11)));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
