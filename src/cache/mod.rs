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
mod blocking;
#[cfg(feature = "async")]
mod non_blocking;

pub use blocking::*;
#[cfg(feature = "async")]
pub use non_blocking::*;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::time::Duration;

use crate::errors::{RedguardError, RedguardResult};

/// Envelope stored by the logical-expiration strategy: the payload plus an
/// application-level staleness stamp. Entries carrying it get **no**
/// store-side TTL; the store never evicts them and staleness is judged by
/// comparing `expire_at` to the clock at read time.
///
/// An envelope key must only ever be read back through the logical-expiration
/// strategy; mixing strategies on one key is a caller error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimedValue<T> {
    pub data: T,
    pub expire_at: DateTime<Utc>,
}

impl<T> TimedValue<T> {
    /// Stamps `value` with `now + ttl`.
    pub fn wrap(data: T, ttl: Duration) -> Self {
        let ttl = chrono::Duration::milliseconds(ttl.as_millis().min(i64::MAX as u128) as i64);
        Self {
            data,
            expire_at: Utc::now() + ttl,
        }
    }

    #[inline]
    pub fn is_expired(&self) -> bool {
        self.expire_at <= Utc::now()
    }
}

#[inline]
pub(crate) fn cache_key<ID: Display>(key_prefix: &str, id: &ID) -> String {
    format!("{key_prefix}{id}")
}

/// `ttl` plus a uniform random slice of `jitter_max`, so many keys seeded at
/// the same moment do not all expire together.
pub(crate) fn jittered(ttl: Duration, jitter_max: Duration) -> Duration {
    if jitter_max.is_zero() {
        return ttl;
    }
    let bound_ms = u64::try_from(jitter_max.as_millis()).unwrap_or(u64::MAX);
    let jitter_ms = rand::thread_rng().gen_range(0..=bound_ms);
    ttl + Duration::from_millis(jitter_ms)
}

pub(crate) fn encode<T: Serialize>(value: &T) -> RedguardResult<String> {
    serde_json::to_string(value).map_err(|e| RedguardError::SerializationError(e.to_string()))
}

pub(crate) fn decode<T: DeserializeOwned>(json: &str) -> RedguardResult<T> {
    serde_json::from_str(json).map_err(|e| RedguardError::DeserializationError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Shop {
        id: u64,
        name: String,
    }

    #[test]
    fn fresh_envelope_is_not_expired() {
        let wrapped = TimedValue::wrap(
            Shop {
                id: 1,
                name: "A".into(),
            },
            Duration::from_secs(10),
        );
        assert!(!wrapped.is_expired());
    }

    #[test]
    fn zero_ttl_envelope_is_expired() {
        let wrapped = TimedValue::wrap(7u64, Duration::ZERO);
        assert!(wrapped.is_expired());
    }

    #[test]
    fn envelope_round_trips_through_json() {
        let wrapped = TimedValue::wrap(
            Shop {
                id: 42,
                name: "coffee".into(),
            },
            Duration::from_secs(60),
        );
        let json = encode(&wrapped).unwrap();
        let back: TimedValue<Shop> = decode(&json).unwrap();
        assert_eq!(back.data, wrapped.data);
        assert_eq!(back.expire_at, wrapped.expire_at);
    }

    #[test]
    fn cache_key_concatenates_prefix_and_id() {
        assert_eq!(cache_key("cache:shop:", &1u64), "cache:shop:1");
        assert_eq!(cache_key("cache:user:", &"abc"), "cache:user:abc");
    }

    #[test]
    fn jitter_stays_within_its_bound() {
        let base = Duration::from_secs(60);
        let bound = Duration::from_secs(30);
        for _ in 0..100 {
            let total = jittered(base, bound);
            assert!(total >= base && total <= base + bound);
        }
        assert_eq!(jittered(base, Duration::ZERO), base);
    }

    #[test]
    fn jitter_survives_a_bound_beyond_u64_milliseconds() {
        let base = Duration::from_secs(60);
        let total = jittered(base, Duration::new(u64::MAX, 0));
        assert!(total >= base);
    }
}
