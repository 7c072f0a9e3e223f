// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Typed object pooling with per-thread fast paths.
//!
//! This crate provides [`Pool`], a reuse pool for short-lived objects with two
//! tiers:
//!
//! - A **striped tier**: one cache-line-padded slot per hardware thread,
//!   accessed with a single atomic pointer swap and no locking. Each OS thread
//!   is assigned a stripe on first use and sticks to it.
//! - A **shared tier**: a generational store (current and victim generations,
//!   in the style of the standard library's global allocator caches) behind a
//!   short mutex. Values displaced from a full stripe land here.
//!
//! [`Pool::shard`] derives a [`PoolShard`] with its own private stripes over
//! the same shared tier, for subsystems that want to keep their churn off the
//! parent pool's stripes.
//!
//! # Examples
//!
//! ```
//! use restash::Pool;
//!
//! let pool: Pool<Vec<u8>> = Pool::new().with_reset(|buf: &mut Vec<u8>| {
//!     buf.clear();
//!     buf.capacity() <= 4096
//! });
//!
//! let mut buf = pool.get();
//! buf.extend_from_slice(b"scratch");
//! pool.put(buf);
//!
//! // The same thread gets its value back without touching the allocator.
//! let buf = pool.get();
//! assert!(buf.is_empty());
//! ```

mod pool;
mod shard;
mod simple;

pub use pool::Pool;
pub use shard::PoolShard;
pub use simple::SimplePool;
