// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The seams between timeline windows and the durable store.

use std::future::Future;

use crate::{Error, StatusRef};

/// Which way a page request walks along the timeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Toward higher ids (more recent statuses).
    Newer,
    /// Toward lower ids (older statuses).
    Older,
}

/// A page request against a timeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Page {
    /// The side of `from_id` being requested.
    pub direction: Direction,
    /// Exclusive id boundary. `None` addresses the top of the stream: the
    /// very newest statuses, regardless of direction.
    pub from_id: Option<String>,
    /// Maximum number of statuses wanted.
    pub limit: usize,
}

impl Page {
    /// The newest `limit` statuses.
    #[must_use]
    pub fn newest(limit: usize) -> Self {
        Self {
            direction: Direction::Older,
            from_id: None,
            limit,
        }
    }

    /// Up to `limit` statuses strictly older than `id`.
    #[must_use]
    pub fn older_than(id: impl Into<String>, limit: usize) -> Self {
        Self {
            direction: Direction::Older,
            from_id: Some(id.into()),
            limit,
        }
    }

    /// Up to `limit` statuses strictly newer than `id`, closest to `id`
    /// first.
    #[must_use]
    pub fn newer_than(id: impl Into<String>, limit: usize) -> Self {
        Self {
            direction: Direction::Newer,
            from_id: Some(id.into()),
            limit,
        }
    }
}

/// One fetched slice of a timeline, as returned by a [`TimelineStore`].
#[derive(Clone, Debug, Default)]
pub struct FetchResult {
    /// The fetched statuses, sorted by id descending.
    pub statuses: Vec<StatusRef>,
    /// Whether the store holds further statuses beyond this slice in the
    /// requested direction.
    pub more: bool,
}

/// A visibility predicate applied to candidate statuses.
///
/// Implementations must be pure and cheap: a single fetch may consult the
/// predicate once per candidate row. Any closure `Fn(&StatusRef) -> bool`
/// is a filter.
pub trait StatusFilter: Send + Sync {
    /// Returns whether the status may appear on the timeline being loaded.
    fn keep(&self, status: &StatusRef) -> bool;
}

impl<F> StatusFilter for F
where
    F: Fn(&StatusRef) -> bool + Send + Sync,
{
    fn keep(&self, status: &StatusRef) -> bool {
        self(status)
    }
}

/// Pages statuses out of the durable store.
///
/// The store is the source of truth a window falls back to on a miss; every
/// window is fully reconstructable through this trait alone.
pub trait TimelineStore {
    /// Fetches up to `page.limit` statuses on the requested side of
    /// `page.from_id`, applying `filter` before returning.
    ///
    /// The returned slice must be sorted by id descending, and
    /// [`FetchResult::more`] must be `true` iff the store holds additional
    /// statuses beyond the slice in the requested direction.
    ///
    /// Cancellation is the caller's: dropping the returned future must abort
    /// the fetch. An implementation that detects cancellation itself should
    /// return [`Error::Cancelled`].
    fn fetch(&self, page: &Page, filter: &dyn StatusFilter) -> impl Future<Output = Result<FetchResult, Error>> + Send;
}
