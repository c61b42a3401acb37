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
mod local;
mod redis;

use std::time::Duration;

#[cfg(feature = "async")]
use async_trait::async_trait;

pub use local::*;
pub use redis::*;

use crate::RedguardResult;

/// The shared key-value operations the caching layer builds on.
///
/// The store provides the only serialization points this crate relies on:
/// `set_if_absent` (lock acquisition), `increment` (id sequences) and
/// `compare_and_delete` (token-checked lock release) must each be atomic.
/// Everything is string-typed; serialization lives above this trait.
pub trait KeyValueStore: Send + Sync + 'static {
    fn get(&self, key: &str) -> RedguardResult<Option<String>>;

    /// `ttl: None` stores without store-side expiration.
    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> RedguardResult<()>;

    /// Returns true iff this call created the key.
    fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> RedguardResult<bool>;

    /// Returns true iff the key existed.
    fn delete(&self, key: &str) -> RedguardResult<bool>;

    /// Creates the key at 0 when absent, then increments.
    fn increment(&self, key: &str) -> RedguardResult<i64>;

    fn expire(&self, key: &str, ttl: Duration) -> RedguardResult<()>;

    /// Deletes the key only if its current value equals `expected`.
    /// Returns true iff the delete happened.
    fn compare_and_delete(&self, key: &str, expected: &str) -> RedguardResult<bool>;
}

/// Asynchronous twin of [`KeyValueStore`].
#[cfg(feature = "async")]
#[async_trait]
pub trait AsyncKeyValueStore: Send + Sync + 'static {
    async fn get(&self, key: &str) -> RedguardResult<Option<String>>;

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> RedguardResult<()>;

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> RedguardResult<bool>;

    async fn delete(&self, key: &str) -> RedguardResult<bool>;

    async fn increment(&self, key: &str) -> RedguardResult<i64>;

    async fn expire(&self, key: &str, ttl: Duration) -> RedguardResult<()>;

    async fn compare_and_delete(&self, key: &str, expected: &str) -> RedguardResult<bool>;
}
