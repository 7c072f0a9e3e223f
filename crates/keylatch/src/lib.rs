// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Per-key read/write locking without per-key mutex objects.
//!
//! [`MutexMap`] behaves like a `HashMap<String, RwLock<()>>` would if it
//! could: any number of readers or a single writer per key, keys independent
//! of each other. Instead of materializing a long-lived lock per key, it
//! keeps one mutex over a map of small lock cells. A cell exists only while
//! its key is locked or waited on; the moment the last share is released with
//! nobody waiting, the cell is removed and its condition variable is parked
//! in a [`restash::Pool`] for reuse.
//!
//! Acquisition returns a [`KeyGuard`] that releases on drop, so a share can
//! be released exactly once by construction.
//!
//! # Examples
//!
//! ```
//! use keylatch::MutexMap;
//!
//! let map = MutexMap::new();
//!
//! // Any number of concurrent readers per key.
//! let r1 = map.rlock("user:1");
//! let r2 = map.rlock("user:1");
//!
//! // A writer has to wait for them...
//! assert!(map.try_lock("user:1").is_none());
//! drop((r1, r2));
//!
//! // ...and gets in once they are gone.
//! let w = map.lock("user:1");
//! drop(w);
//!
//! // Fully unlocked keys leave no trace behind.
//! assert_eq!(map.len(), 0);
//! ```

mod map;

pub use map::{KeyGuard, MutexMap};
