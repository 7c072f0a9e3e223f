// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The keyed lock map.
//!
//! One mutex guards a map of per-key lock cells. Every read or write of a
//! cell's state happens under that mutex; the only thing a blocked thread
//! does outside it is sleep on the cell's condition variable, which
//! atomically releases the map mutex for the duration of the wait.
//!
//! A cell tracks its lock kind, share count, and waiter count. The waiter
//! count is what makes self-eviction safe: a cell may only be removed when
//! its count reaches zero *and* no thread is between "went to sleep" and
//! "woke up and re-checked", which is exactly `waiters == 0`.

use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::{Condvar, Mutex};
use restash::Pool;

/// A map of read/write locks keyed by string.
///
/// Behaves as a `map[key]RwLock` without materializing long-lived lock
/// objects: cells are created on first contention-free acquisition, pooled
/// and reused across keys, and evicted the moment a key is fully unlocked
/// with no waiters.
///
/// Locking never fails; the blocking variants park the calling thread until
/// the share is granted. Acquisition is not cancellable.
pub struct MutexMap {
    cells: Mutex<HashMap<Arc<str>, Cell>>,
    pool: Pool<Arc<Condvar>>,
}

impl MutexMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cells: Mutex::new(HashMap::new()),
            // A condvar is only re-pooled once every clone handed to waiters
            // has been dropped.
            pool: Pool::with_allocator(|| Arc::new(Condvar::new()))
                .with_reset(|cond| Arc::strong_count(cond) == 1),
        }
    }

    /// Acquires a write lock on `key`, blocking until it is held.
    pub fn lock(&self, key: &str) -> KeyGuard<'_> {
        self.lock_inner(key, Kind::Write)
    }

    /// Acquires a read lock on `key`, blocking until it is held.
    pub fn rlock(&self, key: &str) -> KeyGuard<'_> {
        self.lock_inner(key, Kind::Read)
    }

    /// Acquires a write lock on `key`, or returns `None` on immediate
    /// contention.
    pub fn try_lock(&self, key: &str) -> Option<KeyGuard<'_>> {
        self.try_lock_inner(key, Kind::Write)
    }

    /// Acquires a read lock on `key`, or returns `None` on immediate
    /// contention.
    pub fn try_rlock(&self, key: &str) -> Option<KeyGuard<'_>> {
        self.try_lock_inner(key, Kind::Read)
    }

    /// Returns the number of keys currently locked or waited on.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.lock().len()
    }

    /// Returns whether no key is currently locked or waited on.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock_inner(&self, key: &str, want: Kind) -> KeyGuard<'_> {
        let key: Arc<str> = Arc::from(key);
        let mut cells = self.cells.lock();
        loop {
            let cell = cells
                .entry(Arc::clone(&key))
                .or_insert_with(|| Cell::new(self.pool.get()));
            if cell.try_acquire(want) {
                drop(cells);
                return KeyGuard { map: self, key };
            }

            // Contended: sleep on the cell's condvar. The wait releases the
            // map mutex atomically and reacquires it before returning, so the
            // waiter count is maintained entirely under the mutex.
            cell.waiters += 1;
            let cond = Arc::clone(&cell.cond);
            cond.wait(&mut cells);
            cells
                .get_mut(&*key)
                .expect("BUG: lock cell evicted with waiters")
                .waiters -= 1;
        }
    }

    fn try_lock_inner(&self, key: &str, want: Kind) -> Option<KeyGuard<'_>> {
        let key: Arc<str> = Arc::from(key);
        let mut cells = self.cells.lock();
        let cell = cells
            .entry(Arc::clone(&key))
            .or_insert_with(|| Cell::new(self.pool.get()));
        if cell.try_acquire(want) {
            drop(cells);
            Some(KeyGuard { map: self, key })
        } else {
            None
        }
    }

    fn unlock(&self, key: &str) {
        let mut cells = self.cells.lock();
        let cell = cells.get_mut(key).expect("BUG: unlock for unknown key");
        if !cell.release() {
            // Still held by other readers.
            return;
        }
        if cell.waiters > 0 {
            cell.cond.notify_all();
            return;
        }

        // Fully unlocked with nobody waiting: self-evict and re-pool.
        let cell = cells.remove(key).expect("BUG: lock cell vanished");
        self.pool.put(cell.cond);
        compact(&mut cells);
    }
}

impl Default for MutexMap {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MutexMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutexMap").field("len", &self.len()).finish_non_exhaustive()
    }
}

/// Releases its share of the key's lock when dropped.
///
/// Dropping is the only way to release, so each acquired share is released
/// exactly once.
#[must_use = "the lock is released when the guard is dropped"]
pub struct KeyGuard<'a> {
    map: &'a MutexMap,
    key: Arc<str>,
}

impl KeyGuard<'_> {
    /// Returns the key this guard holds a share of.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        self.map.unlock(&self.key);
    }
}

impl std::fmt::Debug for KeyGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyGuard").field("key", &self.key).finish()
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Kind {
    Read,
    Write,
}

/// Per-key lock state. Only ever touched under the map mutex.
struct Cell {
    kind: Option<Kind>,
    count: u32,
    waiters: u32,
    cond: Arc<Condvar>,
}

impl Cell {
    fn new(cond: Arc<Condvar>) -> Self {
        Self {
            kind: None,
            count: 0,
            waiters: 0,
            cond,
        }
    }

    fn try_acquire(&mut self, want: Kind) -> bool {
        match (self.kind, want) {
            (None, _) => {
                self.kind = Some(want);
                self.count = 1;
                true
            }
            (Some(Kind::Read), Kind::Read) => {
                self.count += 1;
                true
            }
            _ => false,
        }
    }

    /// Drops one share; returns `true` once the cell is fully unlocked.
    fn release(&mut self) -> bool {
        assert!(self.count > 0, "BUG: lock count underflow");
        if self.kind == Some(Kind::Write) {
            assert_eq!(self.count, 1, "BUG: write lock with multiple shares");
        }
        self.count -= 1;
        if self.count == 0 {
            self.kind = None;
            true
        } else {
            false
        }
    }
}

/// Shrinks the map's allocation once occupancy falls far below capacity.
fn compact(cells: &mut HashMap<Arc<str>, Cell>) {
    if cells.capacity() > 32 && cells.len() < cells.capacity() / 8 {
        cells.shrink_to_fit();
    }
}
