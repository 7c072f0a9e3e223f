// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! In-process status timeline caching for a federated server.
//!
//! This crate holds the hot read path between request handlers and the
//! durable store: bounded, sorted windows of recent statuses
//! ([`StatusTimeline`]), a read-optimized directory of those windows keyed
//! by owner id ([`StatusTimelines`]), and the adapter seams the windows pull
//! through on a miss ([`TimelineStore`], [`StatusFilter`]).
//!
//! The cache is in-process only: there is no cross-process coherence, and
//! nothing here persists. Every window is reconstructable from the store, so
//! dropping cached state is always safe, and the eviction machinery leans on
//! that freely.
//!
//! # Examples
//!
//! ```
//! use fanline::{Clock, StatusRef, TimelineCaches, TimelineConfig};
//!
//! let caches = TimelineCaches::new(&TimelineConfig::default(), Clock::new());
//!
//! // New statuses are fanned out into whichever timelines already exist.
//! let home = caches.home.must_get("account-1");
//! caches.home.insert_one("account-1", &StatusRef::new("01AB23", "account-2"));
//! assert_eq!(home.len(), 1);
//!
//! // Deleting a status removes it everywhere.
//! caches.home.remove_by_status_ids(&["01AB23"]);
//! assert!(home.is_empty());
//! ```

mod clock;
mod config;
mod error;
mod registry;
mod status;
mod store;
mod timeline;

pub use clock::Clock;
pub use config::{TimelineCaches, TimelineConfig};
pub use error::{BoxError, Error};
pub use registry::StatusTimelines;
pub use status::StatusRef;
pub use store::{Direction, FetchResult, Page, StatusFilter, TimelineStore};
pub use timeline::StatusTimeline;
