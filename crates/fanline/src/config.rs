// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Instance-level assembly of the timeline caches.

use std::time::Duration;

use tracing::debug;

use crate::{Clock, StatusTimeline, StatusTimelines};

/// Capacities and idle timeouts for the instance's timeline caches.
///
/// A zero timeout disables idle eviction for that cache kind. The instance
/// timelines (public, local) have no timeout: they are shared by everyone
/// and never go idle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimelineConfig {
    /// Capacity of the public timeline window.
    pub public_cap: usize,
    /// Capacity of the local timeline window.
    pub local_cap: usize,
    /// Capacity of each home timeline window.
    pub home_cap: usize,
    /// Capacity of each list timeline window.
    pub list_cap: usize,
    /// Capacity of each tag timeline window.
    pub tag_cap: usize,
    /// Idle timeout for home timelines.
    pub home_timeout: Duration,
    /// Idle timeout for list timelines.
    pub list_timeout: Duration,
    /// Idle timeout for tag timelines.
    pub tag_timeout: Duration,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            public_cap: 800,
            local_cap: 800,
            home_cap: 800,
            list_cap: 800,
            tag_cap: 400,
            home_timeout: Duration::ZERO,
            list_timeout: Duration::ZERO,
            tag_timeout: Duration::ZERO,
        }
    }
}

/// The full set of status timeline caches for one instance.
#[derive(Debug)]
pub struct TimelineCaches {
    /// Instance-level cache of the public timeline.
    pub public: StatusTimeline,
    /// Instance-level cache of the local timeline.
    pub local: StatusTimeline,
    /// Home timelines, keyed by account id.
    pub home: StatusTimelines,
    /// List timelines, keyed by list id.
    pub list: StatusTimelines,
    /// Tag timelines, keyed by tag id.
    pub tag: StatusTimelines,
}

impl TimelineCaches {
    /// Builds every cache from `config`.
    ///
    /// # Panics
    ///
    /// Panics if any configured capacity is zero.
    #[must_use]
    pub fn new(config: &TimelineConfig, clock: Clock) -> Self {
        debug!(cap = config.public_cap, "initializing public timeline cache");
        debug!(cap = config.local_cap, "initializing local timeline cache");
        debug!(cap = config.home_cap, timeout = ?config.home_timeout, "initializing home timeline caches");
        debug!(cap = config.list_cap, timeout = ?config.list_timeout, "initializing list timeline caches");
        debug!(cap = config.tag_cap, timeout = ?config.tag_timeout, "initializing tag timeline caches");

        Self {
            public: StatusTimeline::new(config.public_cap),
            local: StatusTimeline::new(config.local_cap),
            home: StatusTimelines::new(config.home_cap, config.home_timeout, clock.clone()),
            list: StatusTimelines::new(config.list_cap, config.list_timeout, clock.clone()),
            tag: StatusTimelines::new(config.tag_cap, config.tag_timeout, clock),
        }
    }

    /// Runs one maintenance sweep over every cache.
    pub fn trim(&self) {
        self.public.trim();
        self.local.trim();
        self.home.trim();
        self.list.trim();
        self.tag.trim();
    }

    /// Drops all cached content everywhere. Registry entries are retained.
    pub fn clear_all(&self) {
        self.public.clear();
        self.local.clear();
        self.home.clear_all();
        self.list.clear_all();
        self.tag.clear_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_documented_capacities() {
        let config = TimelineConfig::default();
        assert_eq!(config.public_cap, 800);
        assert_eq!(config.local_cap, 800);
        assert_eq!(config.home_cap, 800);
        assert_eq!(config.list_cap, 800);
        assert_eq!(config.tag_cap, 400);
    }

    #[test]
    fn caches_are_assembled_from_config() {
        let caches = TimelineCaches::new(&TimelineConfig::default(), Clock::new_frozen());
        assert!(caches.public.is_empty());
        assert!(caches.home.is_empty());

        let home = caches.home.must_get("account-1");
        assert!(home.is_empty());
        caches.trim();
        caches.clear_all();
        assert_eq!(caches.home.len(), 1, "clear_all retains registry entries");
    }
}
