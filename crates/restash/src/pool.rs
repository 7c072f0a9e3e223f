// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The pool proper: striped slots over a generational shared tier.

use std::cell::Cell;
use std::ptr;
use std::sync::Arc;
use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::shard::PoolShard;
use crate::simple::SimplePool;

/// A concurrency-safe reuse pool for values of type `T`.
///
/// `get` prefers the calling thread's stripe, falls back to the shared tier,
/// and finally allocates. `put` parks the value on the calling thread's
/// stripe, pushing any displaced occupant down to the shared tier. Neither
/// operation blocks on anything slower than the shared tier's short mutex.
///
/// An optional reset hook (see [`with_reset`](Pool::with_reset)) is applied to
/// every value on its way back in; values it rejects are dropped instead of
/// pooled.
pub struct Pool<T> {
    shared: Arc<Shared<T>>,
}

impl<T: Default + 'static> Pool<T> {
    /// Creates a pool that allocates missing values with `T::default()`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_allocator(T::default)
    }
}

impl<T: Default + 'static> Default for Pool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Pool<T> {
    /// Creates a pool that allocates missing values with `new`.
    #[must_use]
    pub fn with_allocator(new: impl Fn() -> T + Send + Sync + 'static) -> Self {
        Self {
            shared: Arc::new(Shared {
                stripes: Stripes::new(),
                tier: Mutex::new(SimplePool::new()),
                new: Box::new(new),
                reset: None,
            }),
        }
    }

    /// Installs a reset hook applied to every value passed to [`put`](Pool::put).
    ///
    /// The hook should return the value to a reusable state and report whether
    /// it is worth keeping; values it rejects are dropped.
    ///
    /// # Panics
    ///
    /// Panics if called after [`shard`](Pool::shard) has handed out a derived
    /// handle; install hooks while the pool is still exclusively owned.
    #[must_use]
    pub fn with_reset(mut self, reset: impl Fn(&mut T) -> bool + Send + Sync + 'static) -> Self {
        Arc::get_mut(&mut self.shared)
            .expect("install pool hooks before sharding the pool")
            .reset = Some(Box::new(reset));
        self
    }

    /// Installs the predicate consulted by [`gc`](Pool::gc).
    ///
    /// The predicate receives the sizes of the current and victim generations
    /// and returns whether the victim generation should be promoted into the
    /// current one (rather than discarded). Without a predicate, the victim
    /// generation survives while the current generation holds fewer than 64
    /// values.
    pub fn set_check(&self, check: impl Fn(usize, usize) -> bool + Send + Sync + 'static) {
        self.shared.tier.lock().set_check(check);
    }

    /// Returns a pooled value, or a freshly allocated one.
    pub fn get(&self) -> T {
        if let Some(value) = self.shared.stripes.take() {
            return *value;
        }
        if let Some(value) = self.shared.take_slow() {
            return *value;
        }
        self.shared.allocate()
    }

    /// Returns a value to the pool.
    pub fn put(&self, value: T) {
        let Some(boxed) = self.shared.recycle(value) else {
            return;
        };
        if let Some(displaced) = self.shared.stripes.put(boxed) {
            self.shared.put_slow(displaced);
        }
    }

    /// Ages the pool's contents.
    ///
    /// Drops everything parked on the stripes, then rotates the shared tier's
    /// generations: the victim generation is promoted or discarded according
    /// to the installed predicate, and the current generation becomes the new
    /// victim. Two consecutive collections with a rejecting predicate empty
    /// the pool entirely.
    pub fn gc(&self) {
        self.shared.stripes.clear();
        self.shared.tier.lock().gc();
    }

    /// Returns the approximate number of values currently pooled.
    #[must_use]
    pub fn size(&self) -> usize {
        self.shared.stripes.occupied() + self.shared.tier.lock().len()
    }

    /// Derives a handle with its own private stripes over the same shared tier.
    #[must_use]
    pub fn shard(&self) -> PoolShard<T> {
        PoolShard::new(Arc::clone(&self.shared))
    }
}

impl<T> std::fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool").field("size", &self.size()).finish_non_exhaustive()
    }
}

/// State shared between a pool and every shard derived from it.
pub(crate) struct Shared<T> {
    pub(crate) stripes: Stripes<T>,
    tier: Mutex<SimplePool<Box<T>>>,
    new: Box<dyn Fn() -> T + Send + Sync>,
    reset: Option<Box<dyn Fn(&mut T) -> bool + Send + Sync>>,
}

impl<T> Shared<T> {
    pub(crate) fn take_slow(&self) -> Option<Box<T>> {
        self.tier.lock().get()
    }

    pub(crate) fn put_slow(&self, value: Box<T>) {
        self.tier.lock().put(value);
    }

    pub(crate) fn allocate(&self) -> T {
        (self.new)()
    }

    /// Applies the reset hook; `None` means the value was rejected.
    pub(crate) fn recycle(&self, mut value: T) -> Option<Box<T>> {
        if let Some(reset) = &self.reset {
            if !reset(&mut value) {
                return None;
            }
        }
        Some(Box::new(value))
    }
}

/// The striped tier: one padded slot per hardware thread.
pub(crate) struct Stripes<T> {
    slots: Box<[Slot<T>]>,
}

impl<T> Stripes<T> {
    pub(crate) fn new() -> Self {
        let n = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        Self {
            slots: (0..n).map(|_| Slot::new()).collect(),
        }
    }

    /// Swaps `value` into the calling thread's slot, returning the displaced
    /// occupant if the slot was full.
    pub(crate) fn put(&self, value: Box<T>) -> Option<Box<T>> {
        let slot = &self.slots[stripe_index(self.slots.len())];
        let prev = slot.swap(Box::into_raw(value));
        // SAFETY: every non-null pointer in a slot came from Box::into_raw,
        // and the swap above is the single point that takes it back out.
        (!prev.is_null()).then(|| unsafe { Box::from_raw(prev) })
    }

    /// Empties and returns the calling thread's slot.
    pub(crate) fn take(&self) -> Option<Box<T>> {
        let slot = &self.slots[stripe_index(self.slots.len())];
        let prev = slot.swap(ptr::null_mut());
        // SAFETY: as in `put`, the pointer was produced by Box::into_raw and
        // ownership transfers with the swap.
        (!prev.is_null()).then(|| unsafe { Box::from_raw(prev) })
    }

    /// Drops every parked value across all slots.
    pub(crate) fn clear(&self) {
        for slot in &self.slots {
            let prev = slot.swap(ptr::null_mut());
            if !prev.is_null() {
                // SAFETY: the pointer was produced by Box::into_raw and the
                // swap transferred ownership to us.
                drop(unsafe { Box::from_raw(prev) });
            }
        }
    }

    pub(crate) fn occupied(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_occupied()).count()
    }
}

impl<T> Drop for Stripes<T> {
    fn drop(&mut self) {
        self.clear();
    }
}

// SAFETY: a slot owns the value behind its pointer, and every access is an
// atomic swap that transfers that ownership whole, so sharing the stripe set
// across threads moves values of `T` between threads but never aliases them.
unsafe impl<T: Send> Send for Stripes<T> {}
// SAFETY: as above; `&Stripes` only exposes the swap-based transfer.
unsafe impl<T: Send> Sync for Stripes<T> {}

/// A striped slot, aligned so neighbouring slots never share a cache line.
#[repr(align(64))]
struct Slot<T> {
    ptr: AtomicPtr<T>,
}

impl<T> Slot<T> {
    fn new() -> Self {
        Self {
            ptr: AtomicPtr::new(ptr::null_mut()),
        }
    }

    fn swap(&self, new: *mut T) -> *mut T {
        self.ptr.swap(new, Ordering::AcqRel)
    }

    fn is_occupied(&self) -> bool {
        !self.ptr.load(Ordering::Acquire).is_null()
    }
}

/// Returns this thread's stripe, assigning indices round-robin on first use.
fn stripe_index(len: usize) -> usize {
    static NEXT_STRIPE: AtomicUsize = AtomicUsize::new(0);
    thread_local! {
        static STRIPE: Cell<usize> = const { Cell::new(usize::MAX) };
    }
    STRIPE.with(|cell| {
        let mut idx = cell.get();
        if idx == usize::MAX {
            idx = NEXT_STRIPE.fetch_add(1, Ordering::Relaxed);
            cell.set(idx);
        }
        idx % len
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_allocates_when_empty() {
        let pool: Pool<Vec<u8>> = Pool::new();
        assert_eq!(pool.size(), 0);
        assert!(pool.get().is_empty());
    }

    #[test]
    fn put_then_get_reuses_on_same_thread() {
        let pool: Pool<Vec<u8>> = Pool::new();
        let mut value = pool.get();
        value.push(7);
        pool.put(value);
        assert_eq!(pool.size(), 1);

        // Same thread, same stripe: we get the identical value back.
        let value = pool.get();
        assert_eq!(value, vec![7]);
        assert_eq!(pool.size(), 0);
    }

    #[test]
    fn reset_hook_runs_and_gates() {
        let pool: Pool<Vec<u8>> = Pool::new().with_reset(|buf: &mut Vec<u8>| {
            buf.clear();
            buf.capacity() <= 8
        });

        pool.put(vec![1, 2, 3]);
        assert_eq!(pool.size(), 1);
        assert!(pool.get().is_empty(), "reset hook should clear the value");

        // A value the hook rejects is dropped, not pooled.
        pool.put(Vec::with_capacity(1024));
        assert_eq!(pool.size(), 0);
    }

    #[test]
    fn displaced_value_reaches_shared_tier() {
        let pool: Pool<u32> = Pool::new();
        pool.put(1);
        pool.put(2);
        // Stripe holds the later value; the displaced one sits in the tier.
        assert_eq!(pool.size(), 2);
        assert_eq!(pool.get(), 2);
        assert_eq!(pool.get(), 1);
        assert_eq!(pool.get(), 0);
    }

    #[test]
    fn gc_rotates_generations() {
        let pool: Pool<u32> = Pool::new();
        for i in 0..4 {
            pool.put(i);
        }
        assert_eq!(pool.size(), 4);

        // First collection: stripe dropped, tier contents become victims and
        // survive under the default predicate.
        pool.gc();
        assert_eq!(pool.size(), 3);

        // Values remain reachable from the victim generation.
        assert_ne!(pool.get(), 0);
        assert_eq!(pool.size(), 2);
    }

    #[test]
    fn gc_discards_when_check_rejects() {
        let pool: Pool<u32> = Pool::new();
        pool.set_check(|_current, _victim| false);
        for i in 0..4 {
            pool.put(i);
        }
        pool.gc();
        pool.gc();
        assert_eq!(pool.size(), 0);
    }

    #[test]
    fn gc_promotes_when_check_accepts() {
        let pool: Pool<u32> = Pool::new();
        pool.set_check(|_current, _victim| true);
        pool.put(1);
        pool.put(2);
        pool.gc();
        pool.gc();
        // Survives arbitrarily many collections while the predicate accepts.
        assert_eq!(pool.size(), 1);
    }

    #[test]
    fn shard_shares_the_tier() {
        let pool: Pool<u32> = Pool::new();
        let shard = pool.shard();

        // Overflowing the shard's stripe cascades through the parent's stripe
        // into the shared tier, where the parent can see the values.
        shard.put(1);
        shard.put(2);
        shard.put(3);
        assert_eq!(pool.size(), 2);

        // Releasing the shard drops only its private stripe occupant.
        shard.release();
        let drained = std::iter::from_fn(|| {
            let v = pool.get();
            (v != 0).then_some(v)
        })
        .count();
        assert_eq!(drained, 2);
    }
}
