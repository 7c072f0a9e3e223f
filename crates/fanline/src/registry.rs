// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The read-optimized directory of per-key timelines.
//!
//! The directory is an immutable snapshot map named by a single atomic
//! pointer. Readers load the pointer once and work on the snapshot with no
//! further synchronization; writers clone, mutate, and compare-and-swap,
//! retrying on contention. Reads outnumber directory mutations by orders of
//! magnitude here, which is what makes the copy-on-write rebuild worth its
//! cost. It is also why stale deletion, the one mutation driven purely by
//! time, is clamped to a generous threshold.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use arc_swap::ArcSwap;
use hashbrown::{HashMap, HashSet};
use tracing::debug;

use crate::{Clock, StatusRef, StatusTimeline};

type Snapshot = HashMap<String, Arc<CachedTimeline>>;

/// A concurrency-safe map of [`StatusTimeline`]s keyed by owner id,
/// optimizing very heavily for reads over writes.
///
/// Timelines are created lazily by [`must_get`](StatusTimelines::must_get)
/// and expire in two stages when an idle timeout is configured: an entry
/// idle past the timeout has its window cleared (the entry itself stays, at
/// negligible cost), and an entry idle past `max(10 × timeout, 1h)` is
/// deleted from the directory during [`trim`](StatusTimelines::trim).
pub struct StatusTimelines {
    /// The current snapshot; read-only outside the CAS loop.
    snapshot: ArcSwap<Snapshot>,
    cap: usize,
    ttl: Duration,
    clock: Clock,
}

/// A timeline plus its last-use time.
struct CachedTimeline {
    timeline: Arc<StatusTimeline>,
    /// Nanoseconds of clock time; only maintained when a timeout is set.
    last: AtomicU64,
}

impl CachedTimeline {
    fn last_used(&self) -> Duration {
        Duration::from_nanos(self.last.load(Ordering::Acquire))
    }
}

impl StatusTimelines {
    /// Creates an empty registry.
    ///
    /// New timelines are initialized with capacity `cap`; a zero `ttl`
    /// disables idle eviction entirely.
    ///
    /// # Panics
    ///
    /// Panics if `cap` is zero.
    #[must_use]
    pub fn new(cap: usize, ttl: Duration, clock: Clock) -> Self {
        assert!(cap > 0, "timeline capacity must be positive");
        debug!(cap, ?ttl, "initializing timeline registry");
        Self {
            snapshot: ArcSwap::from_pointee(Snapshot::new()),
            cap,
            ttl,
            clock,
        }
    }

    /// Returns the timeline stored under `key`, creating it if absent.
    ///
    /// Repeat calls for the same key return the same timeline (until the
    /// entry is deleted), and stamp its last-use time when idle eviction is
    /// enabled.
    pub fn must_get(&self, key: &str) -> Arc<StatusTimeline> {
        let cached = match self.snapshot.load().get(key) {
            Some(cached) => Arc::clone(cached),
            None => self.insert_missing(key),
        };
        if self.ttl > Duration::ZERO {
            cached.last.store(self.now_nanos(), Ordering::Release);
        }
        Arc::clone(&cached.timeline)
    }

    fn insert_missing(&self, key: &str) -> Arc<CachedTimeline> {
        let mut out = None;
        self.snapshot.rcu(|current| {
            // Someone may have inserted the key between our miss and this
            // CAS attempt.
            if let Some(existing) = current.get(key) {
                out = Some(Arc::clone(existing));
                return Arc::clone(current);
            }
            let cached = Arc::new(CachedTimeline {
                timeline: Arc::new(StatusTimeline::new(self.cap)),
                last: AtomicU64::new(0),
            });
            out = Some(Arc::clone(&cached));
            let mut next = (**current).clone();
            next.insert(key.to_owned(), cached);
            Arc::new(next)
        });
        out.expect("rcu closure always produces a timeline")
    }

    /// Returns the timeline stored under `key` without creating one or
    /// touching its last-use time.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Arc<StatusTimeline>> {
        self.snapshot.load().get(key).map(|cached| Arc::clone(&cached.timeline))
    }

    /// Inserts `status` into the timeline under `key` iff that timeline
    /// already exists; never creates one.
    pub fn insert_one(&self, key: &str, status: &StatusRef) -> bool {
        match self.snapshot.load().get(key) {
            Some(cached) => cached.timeline.insert_one(status),
            None => false,
        }
    }

    /// Deletes the entry under `key`, if any.
    pub fn delete(&self, key: &str) {
        self.snapshot.rcu(|current| {
            if !current.contains_key(key) {
                return Arc::clone(current);
            }
            let mut next = (**current).clone();
            next.remove(key);
            Arc::new(next)
        });
    }

    /// Removes the given status ids from every stored timeline.
    pub fn remove_by_status_ids(&self, ids: &[&str]) {
        for cached in self.snapshot.load().values() {
            cached.timeline.remove_by_status_ids(ids);
        }
    }

    /// Removes statuses authored (or boosted) by the given accounts from
    /// every stored timeline.
    pub fn remove_by_account_ids(&self, account_ids: &[&str]) {
        for cached in self.snapshot.load().values() {
            cached.timeline.remove_by_account_ids(account_ids);
        }
    }

    /// Runs one maintenance sweep.
    ///
    /// Without a timeout this trims every timeline. With one, each entry is
    /// trimmed, cleared, or marked for deletion by idle time; marked keys
    /// are dropped in a single snapshot rebuild that re-checks idleness
    /// inside the CAS loop, so a concurrent access cannot lose its timeline.
    pub fn trim(&self) {
        if self.ttl == Duration::ZERO {
            for cached in self.snapshot.load().values() {
                cached.timeline.trim();
            }
            return;
        }

        // Deleting a key rewrites the read-optimized snapshot, so the
        // deletion threshold is clamped well above the clear threshold.
        let staleout = (self.ttl * 10).max(Duration::from_secs(60 * 60));
        let now = self.clock.now();

        let mut stale: HashSet<String> = HashSet::new();
        for (key, cached) in self.snapshot.load().iter() {
            let idle = now.saturating_sub(cached.last_used());
            if idle >= staleout {
                stale.insert(key.clone());
            } else if idle >= self.ttl {
                cached.timeline.clear();
            } else {
                cached.timeline.trim();
            }
        }
        if stale.is_empty() {
            return;
        }

        self.snapshot.rcu(|current| {
            let mut next = Snapshot::with_capacity(current.len());
            let mut dropped = false;
            for (key, cached) in current.iter() {
                // Final staleness check: a concurrent must_get may have
                // refreshed the entry since it was marked.
                if stale.contains(key) && now.saturating_sub(cached.last_used()) >= staleout {
                    dropped = true;
                    continue;
                }
                next.insert(key.clone(), Arc::clone(cached));
            }
            if dropped { Arc::new(next) } else { Arc::clone(current) }
        });
        debug!(marked = stale.len(), "dropped stale timelines from registry");
    }

    /// Clears the timeline under `key`, if any; the entry is retained.
    pub fn clear(&self, key: &str) {
        if let Some(cached) = self.snapshot.load().get(key) {
            cached.timeline.clear();
        }
    }

    /// Clears every stored timeline; entries are retained.
    pub fn clear_all(&self) {
        for cached in self.snapshot.load().values() {
            cached.timeline.clear();
        }
    }

    /// Returns the number of stored timelines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshot.load().len()
    }

    /// Returns whether no timelines are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn now_nanos(&self) -> u64 {
        u64::try_from(self.clock.now().as_nanos()).unwrap_or(u64::MAX)
    }
}

impl std::fmt::Debug for StatusTimelines {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusTimelines")
            .field("len", &self.len())
            .field("cap", &self.cap)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn must_get_returns_the_same_identity() {
        let registry = StatusTimelines::new(8, Duration::ZERO, Clock::new_frozen());
        let a = registry.must_get("u1");
        let b = registry.must_get("u1");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn insert_one_never_creates() {
        let registry = StatusTimelines::new(8, Duration::ZERO, Clock::new_frozen());
        let status = StatusRef::new("10", "acct");

        assert!(!registry.insert_one("u1", &status));
        assert_eq!(registry.len(), 0);

        let timeline = registry.must_get("u1");
        assert!(registry.insert_one("u1", &status));
        assert_eq!(timeline.len(), 1);
    }

    #[test]
    fn delete_removes_the_entry() {
        let registry = StatusTimelines::new(8, Duration::ZERO, Clock::new_frozen());
        let _ = registry.must_get("u1");
        registry.delete("u1");
        assert!(registry.get("u1").is_none());
        // Deleting an absent key is a no-op.
        registry.delete("u1");
        assert!(registry.is_empty());
    }

    #[test]
    fn removals_fan_out_to_every_timeline() {
        let registry = StatusTimelines::new(8, Duration::ZERO, Clock::new_frozen());
        registry.must_get("a").insert_one(&StatusRef::new("10", "alice"));
        registry.must_get("b").insert_one(&StatusRef::new("10", "alice"));
        registry.must_get("b").insert_one(&StatusRef::new("20", "bob"));

        registry.remove_by_status_ids(&["10"]);
        assert_eq!(registry.must_get("a").len(), 0);
        assert_eq!(registry.must_get("b").len(), 1);

        registry.remove_by_account_ids(&["bob"]);
        assert_eq!(registry.must_get("b").len(), 0);
    }

    #[test]
    fn clear_keeps_the_entry() {
        let registry = StatusTimelines::new(8, Duration::ZERO, Clock::new_frozen());
        let timeline = registry.must_get("u1");
        timeline.insert_one(&StatusRef::new("10", "acct"));

        registry.clear("u1");
        assert_eq!(registry.len(), 1);
        assert!(Arc::ptr_eq(&timeline, &registry.must_get("u1")));
        assert!(timeline.is_empty());
    }
}
