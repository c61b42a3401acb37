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
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[cfg(feature = "async")]
use async_trait::async_trait;

use crate::errors::{RedguardError, RedguardResult};
use crate::store::KeyValueStore;
#[cfg(feature = "async")]
use crate::store::AsyncKeyValueStore;

struct StoredValue {
    value: String,
    /// `None` means no store-side expiration.
    deadline: Option<Instant>,
}

impl StoredValue {
    #[inline]
    fn is_expired(&self, now: Instant) -> bool {
        self.deadline.map_or(false, |deadline| deadline <= now)
    }
}

/// In-process store with the same TTL semantics as Redis: expired entries
/// behave as absent. Single mutex over the map, so every trait operation is
/// atomic. Backs the test suites and embedded single-process deployments.
#[derive(Default)]
pub struct LocalStore {
    entries: Mutex<HashMap<String, StoredValue>>,
}

impl LocalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every expired entry. Expiry is otherwise reaped lazily on access.
    pub fn purge_expired(&self) -> usize {
        let mut entries = self.entries.lock();
        let now = Instant::now();
        let before = entries.len();
        entries.retain(|_, stored| !stored.is_expired(now));
        before - entries.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    fn live_value(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock();
        let now = Instant::now();
        match entries.get(key) {
            Some(stored) if !stored.is_expired(now) => Some(stored.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }
}

impl KeyValueStore for LocalStore {
    fn get(&self, key: &str) -> RedguardResult<Option<String>> {
        Ok(self.live_value(key))
    }

    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> RedguardResult<()> {
        let stored = StoredValue {
            value: value.to_string(),
            deadline: ttl.map(|ttl| Instant::now() + ttl),
        };
        self.entries.lock().insert(key.to_string(), stored);
        Ok(())
    }

    fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> RedguardResult<bool> {
        let mut entries = self.entries.lock();
        let now = Instant::now();
        if entries.get(key).map_or(false, |stored| !stored.is_expired(now)) {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            StoredValue {
                value: value.to_string(),
                deadline: Some(now + ttl),
            },
        );
        Ok(true)
    }

    fn delete(&self, key: &str) -> RedguardResult<bool> {
        let mut entries = self.entries.lock();
        let now = Instant::now();
        match entries.remove(key) {
            Some(stored) => Ok(!stored.is_expired(now)),
            None => Ok(false),
        }
    }

    fn increment(&self, key: &str) -> RedguardResult<i64> {
        let mut entries = self.entries.lock();
        let now = Instant::now();
        let current = match entries.get(key) {
            Some(stored) if !stored.is_expired(now) => {
                stored.value.parse::<i64>().map_err(|_| {
                    RedguardError::DeserializationError(format!(
                        "counter '{key}' holds a non-integer value"
                    ))
                })?
            }
            _ => 0,
        };
        let next = current + 1;
        entries.insert(
            key.to_string(),
            StoredValue {
                value: next.to_string(),
                deadline: None,
            },
        );
        Ok(next)
    }

    fn expire(&self, key: &str, ttl: Duration) -> RedguardResult<()> {
        let mut entries = self.entries.lock();
        let now = Instant::now();
        if let Some(stored) = entries.get_mut(key) {
            if !stored.is_expired(now) {
                stored.deadline = Some(now + ttl);
            }
        }
        Ok(())
    }

    fn compare_and_delete(&self, key: &str, expected: &str) -> RedguardResult<bool> {
        let mut entries = self.entries.lock();
        let now = Instant::now();
        match entries.get(key) {
            Some(stored) if !stored.is_expired(now) && stored.value == expected => {
                entries.remove(key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(feature = "async")]
#[async_trait]
impl AsyncKeyValueStore for LocalStore {
    async fn get(&self, key: &str) -> RedguardResult<Option<String>> {
        KeyValueStore::get(self, key)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> RedguardResult<()> {
        KeyValueStore::set(self, key, value, ttl)
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> RedguardResult<bool> {
        KeyValueStore::set_if_absent(self, key, value, ttl)
    }

    async fn delete(&self, key: &str) -> RedguardResult<bool> {
        KeyValueStore::delete(self, key)
    }

    async fn increment(&self, key: &str) -> RedguardResult<i64> {
        KeyValueStore::increment(self, key)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> RedguardResult<()> {
        KeyValueStore::expire(self, key, ttl)
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> RedguardResult<bool> {
        KeyValueStore::compare_and_delete(self, key, expected)
    }
}
