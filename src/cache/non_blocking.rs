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
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::cache::{cache_key, decode, encode, jittered, TimedValue};
use crate::config::CacheOptions;
use crate::errors::{RedguardError, RedguardResult};
use crate::executor::AsyncRebuildExecutor;
use crate::lock::AsyncDistributedLock;
use crate::store::AsyncKeyValueStore;

/// Asynchronous twin of [`CacheClient`](crate::CacheClient). Same strategies,
/// same guarantees; database fallbacks are futures and take the id by value.
///
/// Rebuild jobs are spawned onto the current tokio runtime, bounded by the
/// configured worker count.
pub struct AsyncCacheClient<S> {
    store: Arc<S>,
    lock: AsyncDistributedLock<S>,
    rebuild_pool: AsyncRebuildExecutor,
    options: CacheOptions,
}

impl<S: AsyncKeyValueStore> AsyncCacheClient<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_options(store, CacheOptions::default())
    }

    pub fn with_options(store: Arc<S>, options: CacheOptions) -> Self {
        let lock = AsyncDistributedLock::new(Arc::clone(&store), options.lock_ttl);
        let rebuild_pool = AsyncRebuildExecutor::new(options.rebuild_workers);
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
    pub async fn set<T: Serialize + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> RedguardResult<()> {
        let json = encode(value)?;
        self.store.set(key, &json, Some(ttl)).await
    }

    /// Envelope write with `now + ttl` as the logical expiry and **no**
    /// store-side TTL.
    pub async fn set_with_logical_expire<T: Serialize + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> RedguardResult<()> {
        let json = encode(&TimedValue::wrap(value, ttl))?;
        self.store.set(key, &json, None).await
    }

    /// Drops a cache entry after its database row changed.
    pub async fn invalidate(&self, key: &str) -> RedguardResult<bool> {
        self.store.delete(key).await
    }

    /// Anti-penetration read; see the blocking client for the contract.
    pub async fn query_with_pass_through<R, ID, F, Fut>(
        &self,
        key_prefix: &str,
        id: &ID,
        db_fallback: F,
        ttl: Duration,
    ) -> RedguardResult<Option<R>>
    where
        R: Serialize + DeserializeOwned + Sync,
        ID: Display + Clone,
        F: FnOnce(ID) -> Fut,
        Fut: Future<Output = RedguardResult<Option<R>>>,
    {
        let key = cache_key(key_prefix, id);
        match self.store.get(&key).await? {
            Some(json) if !json.is_empty() => return decode(&json).map(Some),
            Some(_) => {
                debug!(%key, "tombstone hit");
                return Ok(None);
            }
            None => {}
        }

        match db_fallback(id.clone()).await? {
            Some(value) => {
                self.set(&key, &value, jittered(ttl, self.options.jitter_max))
                    .await?;
                Ok(Some(value))
            }
            None => {
                self.store
                    .set(&key, "", Some(self.options.null_ttl))
                    .await?;
                Ok(None)
            }
        }
    }

    /// Anti-breakdown read (stale-while-revalidate); see the blocking client
    /// for the contract.
    pub async fn query_with_logical_expire<R, ID, F, Fut>(
        &self,
        key_prefix: &str,
        id: &ID,
        db_fallback: F,
        rebuild_ttl: Duration,
    ) -> RedguardResult<Option<R>>
    where
        R: Serialize + DeserializeOwned + Send + 'static,
        ID: Display + Clone + Send + 'static,
        F: FnOnce(ID) -> Fut + Send + 'static,
        Fut: Future<Output = RedguardResult<Option<R>>> + Send + 'static,
    {
        let key = cache_key(key_prefix, id);
        let Some(json) = self.store.get(&key).await? else {
            return Ok(None);
        };
        let envelope: TimedValue<R> = decode(&json)?;
        if !envelope.is_expired() {
            return Ok(Some(envelope.data));
        }

        let lock_key = cache_key(&self.options.lock_prefix, id);
        if let Some(token) = self.lock.try_acquire(&lock_key).await? {
            let store = Arc::clone(&self.store);
            let lock = self.lock.clone();
            let id = id.clone();
            let job_key = key.clone();
            let job_lock_key = lock_key.clone();
            let job_token = token.clone();

            let submitted = self.rebuild_pool.submit(async move {
                let outcome =
                    rebuild_entry(store.as_ref(), &job_key, id, db_fallback, rebuild_ttl).await;
                if let Err(err) = outcome {
                    // Contained here; the stale value already served stands.
                    error!(key = %job_key, %err, "cache rebuild failed");
                }
                if let Err(err) = lock.release(&job_lock_key, &job_token).await {
                    error!(lock_key = %job_lock_key, %err, "rebuild lock release failed");
                }
            });

            if !submitted {
                // An unreleased lock would stall rebuilds for a full TTL.
                warn!(%key, "rebuild rejected; releasing lock");
                self.lock.release(&lock_key, &token).await?;
            }
        }

        Ok(Some(envelope.data))
    }

    /// Mutex-based anti-breakdown variant with a bounded retry loop; the
    /// caller's task sleeps between attempts instead of getting stale data.
    pub async fn query_with_mutex<R, ID, F, Fut>(
        &self,
        key_prefix: &str,
        id: &ID,
        db_fallback: F,
        ttl: Duration,
    ) -> RedguardResult<Option<R>>
    where
        R: Serialize + DeserializeOwned + Sync,
        ID: Display + Clone,
        F: Fn(ID) -> Fut,
        Fut: Future<Output = RedguardResult<Option<R>>>,
    {
        let key = cache_key(key_prefix, id);
        let lock_key = cache_key(&self.options.lock_prefix, id);

        for _ in 0..self.options.mutex_retries {
            match self.store.get(&key).await? {
                Some(json) if !json.is_empty() => return decode(&json).map(Some),
                Some(_) => return Ok(None),
                None => {}
            }

            let Some(token) = self.lock.try_acquire(&lock_key).await? else {
                tokio::time::sleep(self.options.mutex_backoff).await;
                continue;
            };

            // The previous holder may have filled the key between our read
            // and this acquisition; re-check before going to the database.
            match self.store.get(&key).await {
                Ok(Some(json)) => {
                    self.lock.release(&lock_key, &token).await?;
                    return if json.is_empty() {
                        Ok(None)
                    } else {
                        decode(&json).map(Some)
                    };
                }
                Ok(None) => {}
                Err(err) => {
                    let _ = self.lock.release(&lock_key, &token).await;
                    return Err(err);
                }
            }

            let filled = self.fill_plain(&key, id.clone(), &db_fallback, ttl).await;
            let released = self.lock.release(&lock_key, &token).await;
            let value = filled?;
            released?;
            return Ok(value);
        }

        Err(RedguardError::RetryExhausted(key))
    }

    async fn fill_plain<R, ID, F, Fut>(
        &self,
        key: &str,
        id: ID,
        db_fallback: &F,
        ttl: Duration,
    ) -> RedguardResult<Option<R>>
    where
        R: Serialize + DeserializeOwned + Sync,
        F: Fn(ID) -> Fut,
        Fut: Future<Output = RedguardResult<Option<R>>>,
    {
        match db_fallback(id).await? {
            Some(value) => {
                self.set(key, &value, jittered(ttl, self.options.jitter_max))
                    .await?;
                Ok(Some(value))
            }
            None => {
                self.store
                    .set(key, "", Some(self.options.null_ttl))
                    .await?;
                Ok(None)
            }
        }
    }
}

/// Runs on the rebuild pool. A vanished row drops the envelope so readers
/// stop seeing a value that no longer exists.
async fn rebuild_entry<S, R, ID, F, Fut>(
    store: &S,
    key: &str,
    id: ID,
    db_fallback: F,
    rebuild_ttl: Duration,
) -> RedguardResult<()>
where
    S: AsyncKeyValueStore,
    R: Serialize,
    F: FnOnce(ID) -> Fut,
    Fut: Future<Output = RedguardResult<Option<R>>>,
{
    match db_fallback(id).await? {
        Some(value) => {
            let json = encode(&TimedValue::wrap(&value, rebuild_ttl))?;
            store.set(key, &json, None).await
        }
        None => store.delete(key).await.map(|_| ()),
    }
}
