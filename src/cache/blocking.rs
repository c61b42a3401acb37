/*
 *
 *  *
 *  *      Copyright (c) 2018-2025, SnackCloud All rights reserved.
 *  *
 *  *   Redistribution and use in source and binary forms, with or without
 *  *   modification, are permitted provided that the following conditions are met:
 *  *
 *  *   Redistributions of source code must retain the above copyright notice,
 *  *   this list of conditions and the following disclaimer.
 *  *   Redistributions in binary form must reproduce the above copyright
 *  *   notice, this list of conditions and the following disclaimer in the
 *  *   documentation and/or other materials provided with the distribution.
 *  *   Neither the name of the www.snackcloud.cn developer nor the names of its
 *  *   contributors may be used to endorse or promote products derived from
 *  *   this software without specific prior written permission.
 *  *   Author: SnackCloud
 *  *
 *
 */
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Display;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::cache::{cache_key, decode, encode, jittered, TimedValue};
use crate::config::CacheOptions;
use crate::errors::{RedguardError, RedguardResult};
use crate::executor::RebuildExecutor;
use crate::lock::DistributedLock;
use crate::store::KeyValueStore;

/// Read-through cache client over a shared key-value store.
///
/// Callers hand it a key prefix, an identifier and a database fallback; it
/// returns `Ok(Some(value))` or a well-defined `Ok(None)`. Two read
/// strategies guard the two failure modes of read-through caches:
///
/// - [`query_with_pass_through`](Self::query_with_pass_through) absorbs
///   repeated lookups of ids that exist nowhere (cache penetration) by
///   caching an empty tombstone after the first double miss.
/// - [`query_with_logical_expire`](Self::query_with_logical_expire) keeps a
///   hot key from stampeding the database when it goes stale (cache
///   breakdown): readers always get an immediate answer, possibly stale,
///   while at most one background rebuild per key is in flight.
pub struct CacheClient<S> {
    store: Arc<S>,
    lock: DistributedLock<S>,
    rebuild_pool: RebuildExecutor,
    options: CacheOptions,
}

impl<S: KeyValueStore> CacheClient<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_options(store, CacheOptions::default())
    }

    pub fn with_options(store: Arc<S>, options: CacheOptions) -> Self {
        let lock = DistributedLock::new(Arc::clone(&store), options.lock_ttl);
        let rebuild_pool = RebuildExecutor::new(options.rebuild_workers, options.rebuild_queue);
        Self {
            store,
            lock,
            rebuild_pool,
            options,
        }
    }

    #[inline]
    pub fn options(&self) -> &CacheOptions {
        &self.options
    }

    /// Plain write: serialized value under a store-enforced TTL.
    pub fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> RedguardResult<()> {
        let json = encode(value)?;
        self.store.set(key, &json, Some(ttl))
    }

    /// Envelope write with `now + ttl` as the logical expiry and **no**
    /// store-side TTL. Used to pre-warm entries ahead of a traffic spike so
    /// they are always present and merely judged stale.
    pub fn set_with_logical_expire<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> RedguardResult<()> {
        let json = encode(&TimedValue::wrap(value, ttl))?;
        self.store.set(key, &json, None)
    }

    /// Drops a cache entry after its database row changed. Repopulation is
    /// lazy, on the next read.
    pub fn invalidate(&self, key: &str) -> RedguardResult<bool> {
        self.store.delete(key)
    }

    /// Anti-penetration read. A hit deserializes and returns; a tombstone
    /// returns `Ok(None)` without touching the database; a miss consults the
    /// fallback, caching either the value (with jittered TTL) or an empty
    /// tombstone.
    ///
    /// Does not protect a single hot key from concurrent rebuilds; that is
    /// [`query_with_logical_expire`](Self::query_with_logical_expire)'s job.
    pub fn query_with_pass_through<R, ID, F>(
        &self,
        key_prefix: &str,
        id: &ID,
        db_fallback: F,
        ttl: Duration,
    ) -> RedguardResult<Option<R>>
    where
        R: Serialize + DeserializeOwned,
        ID: Display,
        F: FnOnce(&ID) -> RedguardResult<Option<R>>,
    {
        let key = cache_key(key_prefix, id);
        match self.store.get(&key)? {
            Some(json) if !json.is_empty() => return decode(&json).map(Some),
            Some(_) => {
                // Tombstone: known absent, the database stays untouched.
                debug!(%key, "tombstone hit");
                return Ok(None);
            }
            None => {}
        }
        self.fill_plain(&key, id, db_fallback, ttl)
    }

    /// Anti-breakdown read for entries pre-warmed via
    /// [`set_with_logical_expire`](Self::set_with_logical_expire).
    ///
    /// An absent key returns `Ok(None)`: a genuine cold cache is not filled
    /// transparently here. A stale envelope is still returned immediately
    /// (stale-while-revalidate) while the rebuild happens on the background
    /// pool, guarded by a per-key lock so at most one rebuild is in flight.
    pub fn query_with_logical_expire<R, ID, F>(
        &self,
        key_prefix: &str,
        id: &ID,
        db_fallback: F,
        rebuild_ttl: Duration,
    ) -> RedguardResult<Option<R>>
    where
        R: Serialize + DeserializeOwned + Send + 'static,
        ID: Display + Clone + Send + 'static,
        F: FnOnce(&ID) -> RedguardResult<Option<R>> + Send + 'static,
    {
        let key = cache_key(key_prefix, id);
        let Some(json) = self.store.get(&key)? else {
            return Ok(None);
        };
        let envelope: TimedValue<R> = decode(&json)?;
        if !envelope.is_expired() {
            return Ok(Some(envelope.data));
        }

        let lock_key = cache_key(&self.options.lock_prefix, id);
        if let Some(token) = self.lock.try_acquire(&lock_key)? {
            let store = Arc::clone(&self.store);
            let lock = self.lock.clone();
            let id = id.clone();
            let job_key = key.clone();
            let job_lock_key = lock_key.clone();
            let job_token = token.clone();

            let submitted = self.rebuild_pool.submit(move || {
                let outcome = rebuild_entry(&store, &job_key, &id, db_fallback, rebuild_ttl);
                if let Err(err) = outcome {
                    // Contained here; the stale value already served stands.
                    error!(key = %job_key, %err, "cache rebuild failed");
                }
                if let Err(err) = lock.release(&job_lock_key, &job_token) {
                    error!(lock_key = %job_lock_key, %err, "rebuild lock release failed");
                }
            });

            if !submitted {
                // An unreleased lock would stall rebuilds for a full TTL.
                warn!(%key, "rebuild rejected; releasing lock");
                self.lock.release(&lock_key, &token)?;
            }
        }

        Ok(Some(envelope.data))
    }

    /// Mutex-based anti-breakdown variant: blocks the calling thread with a
    /// bounded sleep-and-retry loop instead of serving stale data. Strictly
    /// worse tail latency than the logical-expiration strategy; kept for
    /// entries that must never be served stale.
    pub fn query_with_mutex<R, ID, F>(
        &self,
        key_prefix: &str,
        id: &ID,
        db_fallback: F,
        ttl: Duration,
    ) -> RedguardResult<Option<R>>
    where
        R: Serialize + DeserializeOwned,
        ID: Display,
        F: Fn(&ID) -> RedguardResult<Option<R>>,
    {
        let key = cache_key(key_prefix, id);
        let lock_key = cache_key(&self.options.lock_prefix, id);

        for _ in 0..self.options.mutex_retries {
            match self.store.get(&key)? {
                Some(json) if !json.is_empty() => return decode(&json).map(Some),
                Some(_) => return Ok(None),
                None => {}
            }

            let Some(token) = self.lock.try_acquire(&lock_key)? else {
                thread::sleep(self.options.mutex_backoff);
                continue;
            };

            // The previous holder may have filled the key between our read
            // and this acquisition; re-check before going to the database.
            match self.store.get(&key) {
                Ok(Some(json)) => {
                    self.lock.release(&lock_key, &token)?;
                    return if json.is_empty() {
                        Ok(None)
                    } else {
                        decode(&json).map(Some)
                    };
                }
                Ok(None) => {}
                Err(err) => {
                    let _ = self.lock.release(&lock_key, &token);
                    return Err(err);
                }
            }

            let filled = self.fill_plain(&key, id, |id| db_fallback(id), ttl);
            let released = self.lock.release(&lock_key, &token);
            let value = filled?;
            released?;
            return Ok(value);
        }

        Err(RedguardError::RetryExhausted(key))
    }

    fn fill_plain<R, ID, F>(
        &self,
        key: &str,
        id: &ID,
        db_fallback: F,
        ttl: Duration,
    ) -> RedguardResult<Option<R>>
    where
        R: Serialize + DeserializeOwned,
        ID: Display,
        F: FnOnce(&ID) -> RedguardResult<Option<R>>,
    {
        match db_fallback(id)? {
            Some(value) => {
                self.set(key, &value, jittered(ttl, self.options.jitter_max))?;
                Ok(Some(value))
            }
            None => {
                self.store.set(key, "", Some(self.options.null_ttl))?;
                Ok(None)
            }
        }
    }
}

/// Runs on the rebuild pool. A vanished row drops the envelope so readers
/// stop seeing a value that no longer exists.
fn rebuild_entry<S, R, ID, F>(
    store: &Arc<S>,
    key: &str,
    id: &ID,
    db_fallback: F,
    rebuild_ttl: Duration,
) -> RedguardResult<()>
where
    S: KeyValueStore,
    R: Serialize,
    F: FnOnce(&ID) -> RedguardResult<Option<R>>,
{
    match db_fallback(id)? {
        Some(value) => {
            let json = encode(&TimedValue::wrap(&value, rebuild_ttl))?;
            store.set(key, &json, None)
        }
        None => store.delete(key).map(|_| ()),
    }
}
