// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! A controllable monotonic time source.
//!
//! Idle tracking needs nothing more than "how long since X", so the clock
//! hands out opaque monotonic offsets rather than wall-clock times. The
//! frozen variant lets tests jump time forward instead of sleeping.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// A monotonic clock handle.
///
/// Cheap to clone; clones share state, so advancing one frozen handle
/// advances every clone of it.
#[derive(Clone, Debug)]
pub struct Clock(Inner);

#[derive(Clone, Debug)]
enum Inner {
    System { epoch: Instant },
    Frozen { now: Arc<Mutex<Duration>> },
}

impl Clock {
    /// Creates a clock backed by the system's monotonic time.
    #[must_use]
    pub fn new() -> Self {
        Self(Inner::System { epoch: Instant::now() })
    }

    /// Creates a clock that only moves when [`advance`](Clock::advance) is
    /// called.
    #[must_use]
    pub fn new_frozen() -> Self {
        Self(Inner::Frozen {
            now: Arc::new(Mutex::new(Duration::ZERO)),
        })
    }

    /// Returns the time elapsed on this clock since it was created.
    #[must_use]
    pub fn now(&self) -> Duration {
        match &self.0 {
            Inner::System { epoch } => epoch.elapsed(),
            Inner::Frozen { now } => *now.lock(),
        }
    }

    /// Moves a frozen clock forward.
    ///
    /// # Panics
    ///
    /// Panics when called on a system clock; only frozen clocks are
    /// controllable.
    pub fn advance(&self, by: Duration) {
        match &self.0 {
            Inner::Frozen { now } => *now.lock() += by,
            Inner::System { .. } => panic!("advance is only supported on a frozen clock"),
        }
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}
