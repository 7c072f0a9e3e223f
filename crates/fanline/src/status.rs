// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The compact status representation held in timeline windows.

/// A reference to a status, small enough to cache by the hundreds per
/// timeline.
///
/// All ids are ULID strings: lexicographic order is chronological, and a
/// window sorted by `id` descending reads newest-first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusRef {
    /// ULID of the status.
    pub id: String,
    /// ULID of the authoring account.
    pub account_id: String,
    /// ULID of the boosted status, when this status is a boost.
    pub boost_of_id: Option<String>,
    /// ULID of the boosted status's author, when this status is a boost.
    pub boost_of_account_id: Option<String>,
    /// ULID of the replied-to status, when this status is a reply.
    pub in_reply_to_id: Option<String>,
    /// Creation time in unix milliseconds.
    pub created_at: i64,
    /// Whether the frontend representation of this status has already been
    /// prepared. Purely a cache hint; never affects ordering or identity.
    pub prepared: bool,
}

impl StatusRef {
    /// Creates a plain (non-boost, non-reply) status reference.
    pub fn new(id: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            account_id: account_id.into(),
            boost_of_id: None,
            boost_of_account_id: None,
            in_reply_to_id: None,
            created_at: 0,
            prepared: false,
        }
    }

    /// Marks this status as a boost of another status.
    #[must_use]
    pub fn with_boost(mut self, of_id: impl Into<String>, of_account_id: impl Into<String>) -> Self {
        self.boost_of_id = Some(of_id.into());
        self.boost_of_account_id = Some(of_account_id.into());
        self
    }

    /// Marks this status as a reply.
    #[must_use]
    pub fn with_reply_to(mut self, id: impl Into<String>) -> Self {
        self.in_reply_to_id = Some(id.into());
        self
    }

    /// Sets the creation time.
    #[must_use]
    pub fn with_created_at(mut self, unix_millis: i64) -> Self {
        self.created_at = unix_millis;
        self
    }
}
