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
use std::time::Duration;

use crate::config::RedguardConfig;
use crate::errors::RedguardResult;

/// Blocking connection source.
pub struct SyncRedisConnectionManager {
    client: redis::Client,
    connection_timeout: Duration,
}

impl SyncRedisConnectionManager {
    pub fn new(config: &RedguardConfig) -> RedguardResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self {
            client,
            connection_timeout: config.connection_timeout,
        })
    }

    pub fn get_connection(&self) -> RedguardResult<redis::Connection> {
        Ok(self
            .client
            .get_connection_with_timeout(self.connection_timeout)?)
    }

    pub fn check_connection(&self) -> bool {
        match self.get_connection() {
            Ok(mut conn) => redis::cmd("PING").query::<String>(&mut conn).is_ok(),
            Err(_) => false,
        }
    }
}

/// Async connection source built on the redis crate's multiplexed
/// auto-reconnecting manager. Cloning the handle is cheap.
#[cfg(feature = "async")]
pub struct AsyncRedisConnectionManager {
    manager: redis::aio::ConnectionManager,
}

#[cfg(feature = "async")]
impl AsyncRedisConnectionManager {
    pub async fn new(config: &RedguardConfig) -> RedguardResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        let manager = client.get_connection_manager().await?;
        Ok(Self { manager })
    }

    pub async fn get_connection(&self) -> RedguardResult<redis::aio::ConnectionManager> {
        Ok(self.manager.clone())
    }

    pub async fn check_connection(&self) -> bool {
        match self.get_connection().await {
            Ok(mut conn) => redis::cmd("PING")
                .query_async::<String>(&mut conn)
                .await
                .is_ok(),
            Err(_) => false,
        }
    }
}
