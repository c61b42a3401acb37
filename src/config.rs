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

/// Connection-level configuration.
#[derive(Debug, Clone)]
pub struct RedguardConfig {
    pub redis_url: String,
    pub connection_timeout: Duration,
}

impl RedguardConfig {
    pub fn single_server(redis_url: impl Into<String>) -> Self {
        Self {
            redis_url: redis_url.into(),
            connection_timeout: Duration::from_secs(5),
        }
    }

    #[inline]
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }
}

/// Behavioural knobs for the cache client, lock and rebuild pool.
///
/// Fixed per client rather than per call. The per-call surface stays the one
/// the generic API already accepts (key prefix, id, fallback, ttl).
#[derive(Debug, Clone)]
pub struct CacheOptions {
    /// TTL of the "known absent" tombstone written on a double miss.
    pub null_ttl: Duration,
    /// Upper bound of the random TTL jitter added on pass-through fills,
    /// spreading expirations of keys seeded at the same time.
    pub jitter_max: Duration,
    /// Store-side TTL of a lock token. Safety net against dead holders,
    /// not a bound on the protected work.
    pub lock_ttl: Duration,
    /// Namespace prepended to the id when deriving a rebuild lock key.
    pub lock_prefix: String,
    /// Worker threads (or concurrent tasks) in the rebuild pool.
    pub rebuild_workers: usize,
    /// Bounded rebuild queue depth; a full queue rejects the job.
    pub rebuild_queue: usize,
    /// Retry ceiling of the mutex-based rebuild variant.
    pub mutex_retries: u32,
    /// Sleep between mutex-variant retries.
    pub mutex_backoff: Duration,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            null_ttl: Duration::from_secs(2 * 60),
            jitter_max: Duration::from_secs(30),
            lock_ttl: Duration::from_secs(10),
            lock_prefix: "lock:".to_string(),
            rebuild_workers: 10,
            rebuild_queue: 64,
            mutex_retries: 20,
            mutex_backoff: Duration::from_millis(50),
        }
    }
}

impl CacheOptions {
    #[inline]
    pub fn with_null_ttl(mut self, ttl: Duration) -> Self {
        self.null_ttl = ttl;
        self
    }

    #[inline]
    pub fn with_jitter_max(mut self, jitter: Duration) -> Self {
        self.jitter_max = jitter;
        self
    }

    #[inline]
    pub fn with_lock_ttl(mut self, ttl: Duration) -> Self {
        self.lock_ttl = ttl;
        self
    }

    #[inline]
    pub fn with_lock_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.lock_prefix = prefix.into();
        self
    }

    #[inline]
    pub fn with_rebuild_workers(mut self, workers: usize) -> Self {
        self.rebuild_workers = workers.max(1);
        self
    }

    #[inline]
    pub fn with_rebuild_queue(mut self, depth: usize) -> Self {
        self.rebuild_queue = depth.max(1);
        self
    }

    #[inline]
    pub fn with_mutex_retries(mut self, retries: u32) -> Self {
        self.mutex_retries = retries;
        self
    }

    #[inline]
    pub fn with_mutex_backoff(mut self, backoff: Duration) -> Self {
        self.mutex_backoff = backoff;
        self
    }
}

/// Knobs for the distributed id worker.
#[derive(Debug, Clone)]
pub struct IdWorkerOptions {
    /// Reference instant subtracted from the current unix time so that the
    /// timestamp segment stays small and positive. 2022-01-01T00:00:00Z.
    pub epoch_offset: i64,
    /// Width of the per-day sequence segment.
    pub sequence_bits: u32,
}

impl Default for IdWorkerOptions {
    fn default() -> Self {
        Self {
            epoch_offset: 1_640_995_200,
            sequence_bits: 32,
        }
    }
}

impl IdWorkerOptions {
    #[inline]
    pub fn with_epoch_offset(mut self, epoch_offset: i64) -> Self {
        self.epoch_offset = epoch_offset;
        self
    }

    #[inline]
    pub fn with_sequence_bits(mut self, bits: u32) -> Self {
        debug_assert!(bits > 0 && bits < 63);
        self.sequence_bits = bits;
        self
    }
}
