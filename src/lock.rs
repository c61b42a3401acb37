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
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::errors::RedguardResult;
use crate::store::KeyValueStore;
#[cfg(feature = "async")]
use crate::store::AsyncKeyValueStore;

/// Proof of a successful acquisition. Release requires it back, so a holder
/// whose lock already expired cannot delete a lock re-acquired by another
/// holder in the meantime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockToken(String);

impl LockToken {
    fn generate() -> Self {
        let token: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(16)
            .map(char::from)
            .collect();
        LockToken(token)
    }

    #[inline]
    pub(crate) fn value(&self) -> &str {
        &self.0
    }
}

/// Non-reentrant, TTL-bounded mutual exclusion keyed by string, built on the
/// store's atomic set-if-absent. Acquisition is a single non-blocking
/// attempt; contention is a normal negative result, never an error. The TTL
/// reaps locks whose holder crashed before releasing.
pub struct DistributedLock<S> {
    store: Arc<S>,
    lock_ttl: Duration,
}

impl<S> Clone for DistributedLock<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            lock_ttl: self.lock_ttl,
        }
    }
}

impl<S: KeyValueStore> DistributedLock<S> {
    pub fn new(store: Arc<S>, lock_ttl: Duration) -> Self {
        Self { store, lock_ttl }
    }

    /// Returns `Some(token)` iff this call created the lock key.
    pub fn try_acquire(&self, lock_key: &str) -> RedguardResult<Option<LockToken>> {
        let token = LockToken::generate();
        if self
            .store
            .set_if_absent(lock_key, token.value(), self.lock_ttl)?
        {
            Ok(Some(token))
        } else {
            Ok(None)
        }
    }

    /// Atomic compare-and-delete. Returns false when the lock had already
    /// expired and is gone or held by a different token.
    pub fn release(&self, lock_key: &str, token: &LockToken) -> RedguardResult<bool> {
        let released = self.store.compare_and_delete(lock_key, token.value())?;
        if !released {
            warn!(lock_key, "lock expired before release; skipping delete");
        }
        Ok(released)
    }
}

/// Async twin of [`DistributedLock`].
#[cfg(feature = "async")]
pub struct AsyncDistributedLock<S> {
    store: Arc<S>,
    lock_ttl: Duration,
}

#[cfg(feature = "async")]
impl<S> Clone for AsyncDistributedLock<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            lock_ttl: self.lock_ttl,
        }
    }
}

#[cfg(feature = "async")]
impl<S: AsyncKeyValueStore> AsyncDistributedLock<S> {
    pub fn new(store: Arc<S>, lock_ttl: Duration) -> Self {
        Self { store, lock_ttl }
    }

    pub async fn try_acquire(&self, lock_key: &str) -> RedguardResult<Option<LockToken>> {
        let token = LockToken::generate();
        if self
            .store
            .set_if_absent(lock_key, token.value(), self.lock_ttl)
            .await?
        {
            Ok(Some(token))
        } else {
            Ok(None)
        }
    }

    pub async fn release(&self, lock_key: &str, token: &LockToken) -> RedguardResult<bool> {
        let released = self
            .store
            .compare_and_delete(lock_key, token.value())
            .await?;
        if !released {
            warn!(lock_key, "lock expired before release; skipping delete");
        }
        Ok(released)
    }
}
