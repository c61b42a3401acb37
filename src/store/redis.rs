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
use redis::Commands;
use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "async")]
use async_trait::async_trait;
#[cfg(feature = "async")]
use redis::AsyncCommands;

use crate::connection::SyncRedisConnectionManager;
#[cfg(feature = "async")]
use crate::connection::AsyncRedisConnectionManager;
use crate::errors::RedguardResult;
use crate::scripts;
use crate::store::KeyValueStore;
#[cfg(feature = "async")]
use crate::store::AsyncKeyValueStore;

/// TTLs below one second round up rather than truncating to "no expiry".
#[inline]
fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

/// Blocking Redis-backed store.
pub struct RedisStore {
    connection_manager: Arc<SyncRedisConnectionManager>,
}

impl RedisStore {
    pub fn new(connection_manager: Arc<SyncRedisConnectionManager>) -> Self {
        Self { connection_manager }
    }
}

impl KeyValueStore for RedisStore {
    fn get(&self, key: &str) -> RedguardResult<Option<String>> {
        let mut conn = self.connection_manager.get_connection()?;
        Ok(conn.get(key)?)
    }

    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> RedguardResult<()> {
        let mut conn = self.connection_manager.get_connection()?;
        match ttl {
            Some(ttl) => conn.set_ex::<_, _, ()>(key, value, ttl_secs(ttl))?,
            None => conn.set::<_, _, ()>(key, value)?,
        }
        Ok(())
    }

    fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> RedguardResult<bool> {
        let mut conn = self.connection_manager.get_connection()?;
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs(ttl))
            .query(&mut conn)?;
        Ok(reply.is_some())
    }

    fn delete(&self, key: &str) -> RedguardResult<bool> {
        let mut conn = self.connection_manager.get_connection()?;
        let deleted: i64 = conn.del(key)?;
        Ok(deleted > 0)
    }

    fn increment(&self, key: &str) -> RedguardResult<i64> {
        let mut conn = self.connection_manager.get_connection()?;
        Ok(conn.incr(key, 1)?)
    }

    fn expire(&self, key: &str, ttl: Duration) -> RedguardResult<()> {
        let mut conn = self.connection_manager.get_connection()?;
        conn.expire::<_, i64>(key, ttl_secs(ttl) as i64)?;
        Ok(())
    }

    fn compare_and_delete(&self, key: &str, expected: &str) -> RedguardResult<bool> {
        let mut conn = self.connection_manager.get_connection()?;
        let deleted: i64 = scripts::compare_and_delete()
            .key(key)
            .arg(expected)
            .invoke(&mut conn)?;
        Ok(deleted > 0)
    }
}

/// Async Redis-backed store.
#[cfg(feature = "async")]
pub struct AsyncRedisStore {
    connection_manager: Arc<AsyncRedisConnectionManager>,
}

#[cfg(feature = "async")]
impl AsyncRedisStore {
    pub fn new(connection_manager: Arc<AsyncRedisConnectionManager>) -> Self {
        Self { connection_manager }
    }
}

#[cfg(feature = "async")]
#[async_trait]
impl AsyncKeyValueStore for AsyncRedisStore {
    async fn get(&self, key: &str) -> RedguardResult<Option<String>> {
        let mut conn = self.connection_manager.get_connection().await?;
        Ok(conn.get(key).await?)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> RedguardResult<()> {
        let mut conn = self.connection_manager.get_connection().await?;
        match ttl {
            Some(ttl) => conn.set_ex::<_, _, ()>(key, value, ttl_secs(ttl)).await?,
            None => conn.set::<_, _, ()>(key, value).await?,
        }
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> RedguardResult<bool> {
        let mut conn = self.connection_manager.get_connection().await?;
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs(ttl))
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn delete(&self, key: &str) -> RedguardResult<bool> {
        let mut conn = self.connection_manager.get_connection().await?;
        let deleted: i64 = conn.del(key).await?;
        Ok(deleted > 0)
    }

    async fn increment(&self, key: &str) -> RedguardResult<i64> {
        let mut conn = self.connection_manager.get_connection().await?;
        Ok(conn.incr(key, 1).await?)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> RedguardResult<()> {
        let mut conn = self.connection_manager.get_connection().await?;
        conn.expire::<_, i64>(key, ttl_secs(ttl) as i64).await?;
        Ok(())
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> RedguardResult<bool> {
        let mut conn = self.connection_manager.get_connection().await?;
        let deleted: i64 = scripts::compare_and_delete()
            .key(key)
            .arg(expected)
            .invoke_async(&mut conn)
            .await?;
        Ok(deleted > 0)
    }
}
