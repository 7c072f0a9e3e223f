// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Hostname ancestor matching against an atomically published domain set.
//!
//! [`DomainSet`] answers, for a hostname `h`, "is `h` or any ancestor of `h`
//! in the set?" in a handful of pointer hops. Domains are held in a radix
//! trie keyed by reversed labels; the whole trie is immutable and named by a
//! single atomic pointer, so readers do one load and walk with no further
//! synchronization. [`rebuild`](DomainSet::rebuild) constructs a replacement
//! off-line and swaps it in; the old trie is freed when its last reader drops
//! it.
//!
//! Inputs are expected to be lowercased and IDNA-normalized by the caller;
//! labels are treated as opaque bytes here.
//!
//! # Examples
//!
//! ```
//! use arbor::DomainSet;
//!
//! let set = DomainSet::new();
//! set.rebuild(["example.org", "bad.example.com"]);
//!
//! assert!(set.matches("a.b.example.org"));
//! assert!(!set.matches("example.com"));
//! assert_eq!(set.matches_on("a.bad.example.com").as_deref(), Some("bad.example.com"));
//! ```

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwapOption;

mod node;

use node::Trie;

/// A set of domains supporting ancestor matching.
///
/// The set distinguishes "empty" from "not loaded": after [`clear`]
/// (or before the first [`rebuild`]) the set is unloaded, and the
/// `*_or_load` methods will invoke their loader to hydrate it. This mirrors
/// cache-invalidation driven use, where clearing means "refetch the domain
/// list on next query".
///
/// [`clear`]: DomainSet::clear
/// [`rebuild`]: DomainSet::rebuild
#[derive(Default)]
pub struct DomainSet {
    root: ArcSwapOption<Trie>,
}

impl DomainSet {
    /// Creates an unloaded set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a trie from `domains` and atomically publishes it.
    ///
    /// Higher-level domains supersede deeper ones regardless of input order:
    /// a set rebuilt from `["a.example.org", "example.org"]` stores only
    /// `example.org`. Empty entries are ignored.
    pub fn rebuild<I, S>(&self, domains: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.root.store(Some(Arc::new(Trie::build(domains))));
    }

    /// Returns whether `domain` or any ancestor of it is in the set.
    ///
    /// Returns `false` when the set is unloaded or `domain` is empty.
    #[must_use]
    pub fn matches(&self, domain: &str) -> bool {
        self.root.load().as_ref().is_some_and(|trie| trie.matches(domain))
    }

    /// Returns the stored ancestor that `domain` matched on, if any.
    ///
    /// This walks the same path as [`matches`](DomainSet::matches) but pays
    /// to reconstruct the matched ancestor, so prefer `matches` when the
    /// entry itself is not needed.
    #[must_use]
    pub fn matches_on(&self, domain: &str) -> Option<String> {
        self.root.load().as_ref().and_then(|trie| trie.matches_on(domain))
    }

    /// Like [`matches`](DomainSet::matches), hydrating an unloaded set from
    /// `load` first.
    ///
    /// # Errors
    ///
    /// Returns the loader's error if hydration was needed and failed; the set
    /// stays unloaded.
    pub fn matches_or_load<E>(
        &self,
        domain: &str,
        load: impl FnOnce() -> Result<Vec<String>, E>,
    ) -> Result<bool, E> {
        Ok(self.hydrate(load)?.matches(domain))
    }

    /// Like [`matches_on`](DomainSet::matches_on), hydrating an unloaded set
    /// from `load` first.
    ///
    /// # Errors
    ///
    /// Returns the loader's error if hydration was needed and failed; the set
    /// stays unloaded.
    pub fn matches_on_or_load<E>(
        &self,
        domain: &str,
        load: impl FnOnce() -> Result<Vec<String>, E>,
    ) -> Result<Option<String>, E> {
        Ok(self.hydrate(load)?.matches_on(domain))
    }

    /// Drops the published trie, triggering a reload on the next `*_or_load`
    /// query.
    pub fn clear(&self) {
        self.root.store(None);
    }

    /// Returns whether a trie is currently published.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.root.load().is_some()
    }

    fn hydrate<E>(&self, load: impl FnOnce() -> Result<Vec<String>, E>) -> Result<Arc<Trie>, E> {
        if let Some(trie) = self.root.load_full() {
            return Ok(trie);
        }
        let trie = Arc::new(Trie::build(load()?));
        self.root.store(Some(Arc::clone(&trie)));
        Ok(trie)
    }
}

impl fmt::Display for DomainSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.root.load() {
            Some(trie) => fmt::Display::fmt(trie, f),
            None => f.write_str("<unloaded>"),
        }
    }
}

impl fmt::Debug for DomainSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomainSet").field("loaded", &self.is_loaded()).finish()
    }
}
