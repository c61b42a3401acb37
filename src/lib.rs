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
//!
//! <p align="center">
//!   <strong>A Redis read-through caching toolkit for Rust</strong>
//! </p>
//!
//! ## 🎯 Features
//!
//! - **🕳️ Penetration guard**: repeated lookups of ids that exist nowhere are
//!   absorbed by a short-lived "known absent" tombstone after one double miss
//! - **🔥 Breakdown guard**: hot keys carry an application-level expiry stamp;
//!   stale reads return immediately while a single locked background rebuild
//!   refreshes the entry (stale-while-revalidate)
//! - **🔒 Distributed lock**: non-reentrant, TTL-bounded set-if-absent lock
//!   with token-checked atomic release
//! - **🔢 Ordered ids**: 64-bit identifiers from a timestamp segment and a
//!   per-day atomic counter, no central sequence
//! - **⚡ Dual runtime**: blocking and async clients with identical semantics
//! - **🧩 Pluggable store**: Redis in production, an in-process store for
//!   tests and embedding
//!
//! ## 📦 Installation
//!
//! ```toml
//! [dependencies]
//! redguard = "0.1"
//! ```
//!
//! ## Quickstart
//!
//! ```rust,no_run
//! use redguard::{CacheClient, RedguardConfig, RedisStore, SyncRedisConnectionManager};
//! use serde::{Deserialize, Serialize};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[derive(Serialize, Deserialize)]
//! struct Shop {
//!     id: u64,
//!     name: String,
//! }
//!
//! fn main() -> redguard::RedguardResult<()> {
//!     let config = RedguardConfig::single_server("redis://127.0.0.1:6379");
//!     let manager = Arc::new(SyncRedisConnectionManager::new(&config)?);
//!     let cache = CacheClient::new(Arc::new(RedisStore::new(manager)));
//!
//!     // Read-through with penetration protection; the closure is the
//!     // database lookup, invoked only on a true miss.
//!     let shop = cache.query_with_pass_through(
//!         "cache:shop:",
//!         &1u64,
//!         |_id| {
//!             Ok(Some(Shop {
//!                 id: 1,
//!                 name: "coffee".into(),
//!             }))
//!         },
//!         Duration::from_secs(30 * 60),
//!     )?;
//!     assert!(shop.is_some());
//!     Ok(())
//! }
//! ```
//!
//! Hot keys expected to spike are pre-warmed with
//! [`CacheClient::set_with_logical_expire`] and read back with
//! [`CacheClient::query_with_logical_expire`], which never blocks a reader on
//! a rebuild.

mod cache;
mod config;
mod connection;
mod errors;
mod executor;
mod id;
mod lock;
mod scripts;
mod store;

pub use cache::*;
pub use config::*;
pub use connection::*;
pub use errors::*;
pub use executor::*;
pub use id::*;
pub use lock::*;
pub use store::*;
