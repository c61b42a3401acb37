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
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::config::IdWorkerOptions;
use crate::errors::{RedguardError, RedguardResult};
use crate::store::KeyValueStore;
#[cfg(feature = "async")]
use crate::store::AsyncKeyValueStore;

/// Distributed id generator: a seconds-granularity timestamp segment above a
/// per-(prefix, day) counter segment incremented atomically in the shared
/// store. No central sequence, no clock-collision across processes; ids are
/// strictly increasing within a (prefix, day) bucket as long as the counter
/// is durable and never reset mid-day.
pub struct IdWorker<S> {
    store: Arc<S>,
    options: IdWorkerOptions,
}

#[inline]
fn counter_key(prefix: &str, now: DateTime<Utc>) -> String {
    format!("icr:{prefix}:{}", now.format("%Y:%m:%d"))
}

fn compose(options: &IdWorkerOptions, prefix: &str, now: DateTime<Utc>, sequence: i64) -> RedguardResult<i64> {
    if sequence >= 1i64 << options.sequence_bits {
        // Reject instead of letting the sequence bleed into the timestamp
        // segment and corrupt the ordering guarantee.
        return Err(RedguardError::SequenceOverflow {
            prefix: prefix.to_string(),
            sequence,
        });
    }
    let timestamp = now.timestamp() - options.epoch_offset;
    Ok(timestamp << options.sequence_bits | sequence)
}

impl<S: KeyValueStore> IdWorker<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_options(store, IdWorkerOptions::default())
    }

    pub fn with_options(store: Arc<S>, options: IdWorkerOptions) -> Self {
        Self { store, options }
    }

    pub fn next_id(&self, prefix: &str) -> RedguardResult<i64> {
        self.next_id_at(prefix, Utc::now())
    }

    fn next_id_at(&self, prefix: &str, now: DateTime<Utc>) -> RedguardResult<i64> {
        let sequence = self.store.increment(&counter_key(prefix, now))?;
        compose(&self.options, prefix, now, sequence)
    }
}

/// Async twin of [`IdWorker`].
#[cfg(feature = "async")]
pub struct AsyncIdWorker<S> {
    store: Arc<S>,
    options: IdWorkerOptions,
}

#[cfg(feature = "async")]
impl<S: AsyncKeyValueStore> AsyncIdWorker<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_options(store, IdWorkerOptions::default())
    }

    pub fn with_options(store: Arc<S>, options: IdWorkerOptions) -> Self {
        Self { store, options }
    }

    pub async fn next_id(&self, prefix: &str) -> RedguardResult<i64> {
        let now = Utc::now();
        let sequence = self.store.increment(&counter_key(prefix, now)).await?;
        compose(&self.options, prefix, now, sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LocalStore;
    use chrono::TimeZone;

    fn worker() -> IdWorker<LocalStore> {
        IdWorker::with_options(
            Arc::new(LocalStore::new()),
            // Narrow sequence segment keeps the overflow path reachable.
            IdWorkerOptions::default().with_sequence_bits(8),
        )
    }

    #[test]
    fn counter_key_is_per_prefix_and_day() {
        let day = Utc.with_ymd_and_hms(2026, 8, 26, 12, 0, 0).unwrap();
        assert_eq!(counter_key("order", day), "icr:order:2026:08:26");
        assert_eq!(counter_key("user", day), "icr:user:2026:08:26");
    }

    #[test]
    fn ids_increase_within_one_day() {
        let worker = worker();
        let day = Utc.with_ymd_and_hms(2026, 8, 26, 9, 30, 0).unwrap();
        let mut last = 0;
        for _ in 0..100 {
            let id = worker.next_id_at("order", day).unwrap();
            assert!(id > last);
            last = id;
        }
    }

    #[test]
    fn later_day_ids_exceed_earlier_day_ids() {
        let worker = worker();
        let monday = Utc.with_ymd_and_hms(2026, 8, 24, 23, 59, 59).unwrap();
        let tuesday = Utc.with_ymd_and_hms(2026, 8, 25, 0, 0, 1).unwrap();

        let mut monday_max = 0;
        for _ in 0..50 {
            monday_max = worker.next_id_at("order", monday).unwrap();
        }
        let tuesday_first = worker.next_id_at("order", tuesday).unwrap();
        assert!(tuesday_first > monday_max);
    }

    #[test]
    fn timestamp_segment_sits_above_the_sequence() {
        let options = IdWorkerOptions::default().with_sequence_bits(8);
        let now = Utc.with_ymd_and_hms(2026, 8, 26, 0, 0, 0).unwrap();
        let id = compose(&options, "order", now, 3).unwrap();
        assert_eq!(id >> 8, now.timestamp() - options.epoch_offset);
        assert_eq!(id & 0xff, 3);
    }

    #[test]
    fn sequence_overflow_is_rejected() {
        let worker = worker();
        let day = Utc.with_ymd_and_hms(2026, 8, 26, 9, 30, 0).unwrap();
        for _ in 0..255 {
            worker.next_id_at("hot", day).unwrap();
        }
        let err = worker.next_id_at("hot", day).unwrap_err();
        assert!(matches!(err, RedguardError::SequenceOverflow { .. }));
    }
}
