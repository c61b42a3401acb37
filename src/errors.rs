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
use thiserror::Error;

/// Result alias used across the crate.
pub type RedguardResult<T> = Result<T, RedguardError>;

/// Errors surfaced by the caching layer.
///
/// Absence of a value is never an error: cache misses, tombstone hits and
/// lock contention are all encoded in return values. Only infrastructure
/// failures and exhausted retry/sequence budgets land here.
#[derive(Debug, Error)]
pub enum RedguardError {
    /// The shared store could not be reached or rejected a command.
    #[error("redis error: {0}")]
    RedisError(#[from] redis::RedisError),

    #[error("serialization error: {0}")]
    SerializationError(String),

    #[error("deserialization error: {0}")]
    DeserializationError(String),

    /// The caller-supplied database fallback failed. Inside an async rebuild
    /// this is caught at the job boundary and logged; on synchronous paths it
    /// propagates to the caller.
    #[error("database fallback error: {0}")]
    FallbackError(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The mutex-based rebuild variant gave up after its retry ceiling.
    #[error("lock retries exhausted while rebuilding '{0}'")]
    RetryExhausted(String),

    /// The per-day counter outgrew the configured sequence bit budget.
    /// Returned instead of silently corrupting the timestamp segment.
    #[error("id sequence overflow for prefix '{prefix}': {sequence}")]
    SequenceOverflow { prefix: String, sequence: i64 },
}

impl RedguardError {
    /// Wraps a caller-side database error as a fallback failure.
    pub fn fallback<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        RedguardError::FallbackError(Box::new(err))
    }
}
