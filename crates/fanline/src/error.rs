// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Errors surfaced by timeline loads.

/// A boxed error source from a store adapter.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// An error from a timeline load.
///
/// Only operations that reach the durable store can fail; everything held in
/// memory is total. Errors are never cached: window state and preload flags
/// are unchanged when a load returns one, so the caller may simply retry.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The in-flight store call was cancelled.
    #[error("timeline load cancelled")]
    Cancelled,

    /// The store failed transiently; retrying may succeed.
    #[error("timeline store unavailable")]
    StoreUnavailable(#[source] BoxError),

    /// The store failed in a way that will not succeed on retry.
    #[error("timeline store failed")]
    StoreFatal(#[source] BoxError),
}

impl Error {
    /// Wraps a transient store failure.
    pub fn unavailable(source: impl Into<BoxError>) -> Self {
        Self::StoreUnavailable(source.into())
    }

    /// Wraps a permanent store failure.
    pub fn fatal(source: impl Into<BoxError>) -> Self {
        Self::StoreFatal(source.into())
    }

    /// Returns whether retrying the failed operation could succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}
