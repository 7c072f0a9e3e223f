// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Derived pool handles with private stripes.

use std::sync::Arc;

use crate::pool::Shared;

/// A handle derived from a [`Pool`](crate::Pool) with its own striped tier.
///
/// A shard keeps a subsystem's churn off the parent pool's stripes while
/// still sharing the slower tiers: `get` falls back from the shard's stripes
/// to the parent's stripes and then to the shared generational tier, and
/// values displaced from a full shard stripe cascade the same way down.
///
/// Hooks (allocator, reset) are the parent pool's; [`Pool::gc`](crate::Pool::gc)
/// on the parent does not touch a shard's private stripes, which are released
/// with [`release`](PoolShard::release) or on drop.
pub struct PoolShard<T> {
    stripes: crate::pool::Stripes<T>,
    shared: Arc<Shared<T>>,
}

impl<T> PoolShard<T> {
    pub(crate) fn new(shared: Arc<Shared<T>>) -> Self {
        Self {
            stripes: crate::pool::Stripes::new(),
            shared,
        }
    }

    /// Returns a pooled value, or a freshly allocated one.
    pub fn get(&self) -> T {
        if let Some(value) = self.stripes.take() {
            return *value;
        }
        if let Some(value) = self.shared.stripes.take() {
            return *value;
        }
        if let Some(value) = self.shared.take_slow() {
            return *value;
        }
        self.shared.allocate()
    }

    /// Returns a value to the pool through this shard's stripes.
    pub fn put(&self, value: T) {
        let Some(boxed) = self.shared.recycle(value) else {
            return;
        };
        let Some(displaced) = self.stripes.put(boxed) else {
            return;
        };
        let Some(displaced) = self.shared.stripes.put(displaced) else {
            return;
        };
        self.shared.put_slow(displaced);
    }

    /// Drops the values parked on this shard's private stripes.
    pub fn release(&self) {
        self.stripes.clear();
    }
}

impl<T> std::fmt::Debug for PoolShard<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolShard").finish_non_exhaustive()
    }
}
