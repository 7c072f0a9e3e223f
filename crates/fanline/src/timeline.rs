// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! A single bounded, sorted timeline window.
//!
//! A window holds the most useful contiguous run of a logical timeline:
//! up to `cap` statuses sorted by id descending, plus two flags recording
//! whether the window is known to reach the newest (`preloaded_hi`) or the
//! oldest (`preloaded_lo`) end of the stream. The flags are what let a page
//! request be answered from memory: a request for statuses older than `X`
//! is satisfiable iff the window holds something below `X`, or is known to
//! hold the bottom of the stream.
//!
//! All state sits behind one `RwLock`. Store fetches happen with the lock
//! released; only the cheap inspect and merge steps hold it.

use parking_lot::RwLock;

use crate::store::{Direction, FetchResult, Page, StatusFilter, TimelineStore};
use crate::{Error, StatusRef};

/// A bounded, ordered window of recent statuses for one logical timeline.
///
/// Shared freely behind `&self`; every operation takes the window's own lock.
///
/// # Examples
///
/// ```
/// use fanline::{StatusRef, StatusTimeline};
///
/// let timeline = StatusTimeline::new(800);
/// assert!(timeline.insert_one(&StatusRef::new("01AB", "acct-1")));
/// assert!(!timeline.insert_one(&StatusRef::new("01AB", "acct-1")), "duplicate");
/// assert_eq!(timeline.len(), 1);
/// ```
pub struct StatusTimeline {
    inner: RwLock<Window>,
}

impl StatusTimeline {
    /// Creates an empty window retaining at most `cap` statuses.
    ///
    /// # Panics
    ///
    /// Panics if `cap` is zero.
    #[must_use]
    pub fn new(cap: usize) -> Self {
        assert!(cap > 0, "timeline capacity must be positive");
        Self {
            inner: RwLock::new(Window {
                cap,
                items: Vec::new(),
                preloaded_hi: false,
                preloaded_lo: false,
            }),
        }
    }

    /// Inserts a single status, returning whether the window accepted it.
    ///
    /// A status is accepted iff its id is not already present and it either
    /// fits above the window's floor, or the window is below capacity, or the
    /// window holds the bottom of the stream (in which case the top gives way
    /// instead).
    pub fn insert_one(&self, status: &StatusRef) -> bool {
        self.inner.write().insert_one(status)
    }

    /// Serves a page request, pulling from `store` on a miss.
    ///
    /// The window lock is held only to inspect and to merge; the store fetch
    /// itself runs with no lock held. Dropping the returned future cancels
    /// the fetch and leaves the window unchanged.
    ///
    /// Returns the requested statuses (sorted by id descending) and, when
    /// more results may exist in the requested direction, the id to continue
    /// from.
    ///
    /// # Errors
    ///
    /// Returns the store's error unchanged; the window keeps its previous
    /// state, including preload flags.
    pub async fn load<S>(
        &self,
        page: &Page,
        store: &S,
        filter: &dyn StatusFilter,
    ) -> Result<(Vec<StatusRef>, Option<String>), Error>
    where
        S: TimelineStore,
    {
        if page.limit == 0 {
            return Ok((Vec::new(), None));
        }

        {
            let window = self.inner.read();
            if window.satisfies(page) {
                return Ok(window.page_slice(page));
            }
        }

        let fetched = store.fetch(page, filter).await?;

        let mut window = self.inner.write();
        window.merge(page, fetched);
        Ok(window.page_slice(page))
    }

    /// Records that the given statuses now have prepared frontend
    /// representations cached alongside them.
    ///
    /// Statuses handed back by later loads carry the updated flag, letting
    /// callers skip re-preparing what they have already rendered once.
    pub fn mark_prepared(&self, ids: &[&str]) {
        let mut window = self.inner.write();
        for id in ids {
            if let Ok(pos) = window.position(id) {
                window.items[pos].prepared = true;
            }
        }
    }

    /// Removes any statuses with the given ids.
    pub fn remove_by_status_ids(&self, ids: &[&str]) {
        self.inner.write().remove_ids(ids);
    }

    /// Removes any statuses authored by the given accounts, including boosts
    /// of statuses authored by them.
    pub fn remove_by_account_ids(&self, account_ids: &[&str]) {
        self.inner.write().remove_accounts(account_ids);
    }

    /// Retains at most the window's capacity worth of statuses.
    pub fn trim(&self) {
        self.inner.write().trim();
    }

    /// Drops every status and both preload flags.
    pub fn clear(&self) {
        self.inner.write().clear();
    }

    /// Returns the number of statuses currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().items.len()
    }

    /// Returns whether the window holds no statuses.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for StatusTimeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let window = self.inner.read();
        f.debug_struct("StatusTimeline")
            .field("cap", &window.cap)
            .field("len", &window.items.len())
            .field("preloaded_hi", &window.preloaded_hi)
            .field("preloaded_lo", &window.preloaded_lo)
            .finish()
    }
}

/// The lock-protected window state.
struct Window {
    cap: usize,
    /// Sorted by id descending; ids unique.
    items: Vec<StatusRef>,
    preloaded_hi: bool,
    preloaded_lo: bool,
}

impl Window {
    /// Locates `id`, or the position it would occupy, in descending order.
    fn position(&self, id: &str) -> Result<usize, usize> {
        self.items.binary_search_by(|item| id.cmp(item.id.as_str()))
    }

    fn insert_one(&mut self, status: &StatusRef) -> bool {
        let Err(pos) = self.position(&status.id) else {
            // Already present.
            return false;
        };

        let below_lo = !self.items.is_empty() && pos == self.items.len();
        if below_lo && self.items.len() >= self.cap && !self.preloaded_lo {
            // Too old to fit a full window that may be missing older items.
            return false;
        }

        self.items.insert(pos, status.clone());
        if self.items.len() > self.cap {
            if below_lo {
                // Admitted beneath the old floor: the top gives way, and the
                // window no longer reaches the newest end.
                let excess = self.items.len() - self.cap;
                self.items.drain(..excess);
                self.preloaded_hi = false;
            } else {
                self.items.truncate(self.cap);
                self.preloaded_lo = false;
            }
        }
        true
    }

    /// Whether `page` can be answered without consulting the store.
    fn satisfies(&self, page: &Page) -> bool {
        match (&page.from_id, page.direction) {
            (None, _) => self.preloaded_hi,
            (Some(from), Direction::Older) => {
                self.preloaded_lo || self.items.last().is_some_and(|item| item.id.as_str() < from.as_str())
            }
            (Some(from), Direction::Newer) => {
                self.preloaded_hi || self.items.first().is_some_and(|item| item.id.as_str() > from.as_str())
            }
        }
    }

    /// Cuts the requested slice out of the window, with a continuation id
    /// when more results may exist in the requested direction.
    fn page_slice(&self, page: &Page) -> (Vec<StatusRef>, Option<String>) {
        match (&page.from_id, page.direction) {
            (None, _) => {
                let end = page.limit.min(self.items.len());
                let slice = self.items[..end].to_vec();
                let exhausted = self.preloaded_lo && end == self.items.len();
                let next = if exhausted { None } else { slice.last().map(|s| s.id.clone()) };
                (slice, next)
            }
            (Some(from), Direction::Older) => {
                let start = match self.position(from) {
                    Ok(i) => i + 1,
                    Err(i) => i,
                };
                let end = (start + page.limit).min(self.items.len());
                let slice = self.items[start..end].to_vec();
                let exhausted = self.preloaded_lo && end == self.items.len();
                let next = if exhausted { None } else { slice.last().map(|s| s.id.clone()) };
                (slice, next)
            }
            (Some(from), Direction::Newer) => {
                let end = match self.position(from) {
                    Ok(i) => i,
                    Err(i) => i,
                };
                let start = end.saturating_sub(page.limit);
                let slice = self.items[start..end].to_vec();
                let exhausted = self.preloaded_hi && start == 0;
                let next = if exhausted { None } else { slice.first().map(|s| s.id.clone()) };
                (slice, next)
            }
        }
    }

    /// Folds a fetched slice into the window and updates the preload flags.
    fn merge(&mut self, page: &Page, fetched: FetchResult) {
        let more = fetched.more;
        for status in fetched.statuses {
            if let Err(pos) = self.position(&status.id) {
                self.items.insert(pos, status);
            }
            // Duplicates keep the already-cached entry (and its prepared
            // state).
        }

        match (&page.from_id, page.direction) {
            (None, _) => {
                // Anchored at the top of the stream.
                self.preloaded_hi = true;
                if !more {
                    self.preloaded_lo = true;
                }
            }
            (Some(_), Direction::Older) => {
                if !more {
                    self.preloaded_lo = true;
                }
            }
            (Some(_), Direction::Newer) => {
                if !more {
                    self.preloaded_hi = true;
                }
            }
        }

        // Respect the capacity bound by trimming the side opposite the
        // fetch.
        if self.items.len() > self.cap {
            match (&page.from_id, page.direction) {
                (Some(_), Direction::Older) => {
                    let excess = self.items.len() - self.cap;
                    self.items.drain(..excess);
                    self.preloaded_hi = false;
                }
                _ => {
                    self.items.truncate(self.cap);
                    self.preloaded_lo = false;
                }
            }
        }
    }

    fn remove_ids(&mut self, ids: &[&str]) {
        for id in ids {
            if let Ok(pos) = self.position(id) {
                let was_lowest = pos + 1 == self.items.len();
                self.items.remove(pos);
                if was_lowest {
                    self.preloaded_lo = false;
                }
            }
        }
    }

    fn remove_accounts(&mut self, account_ids: &[&str]) {
        let old_lowest = self.items.last().map(|s| s.id.clone());
        self.items.retain(|status| {
            !(account_ids.contains(&status.account_id.as_str())
                || status
                    .boost_of_account_id
                    .as_deref()
                    .is_some_and(|author| account_ids.contains(&author)))
        });
        if let Some(old_lowest) = old_lowest {
            if self.items.last().map(|s| s.id.as_str()) != Some(old_lowest.as_str()) {
                self.preloaded_lo = false;
            }
        }
    }

    fn trim(&mut self) {
        if self.items.len() > self.cap {
            self.items.truncate(self.cap);
            self.preloaded_lo = false;
        }
    }

    fn clear(&mut self) {
        self.items.clear();
        self.preloaded_hi = false;
        self.preloaded_lo = false;
    }
}
