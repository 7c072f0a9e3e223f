// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Idle eviction and snapshot behavior of [`StatusTimelines`].

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use fanline::{Clock, StatusRef, StatusTimelines};

const HOUR: Duration = Duration::from_secs(60 * 60);

fn status(id: &str) -> StatusRef {
    StatusRef::new(id, format!("acct-{id}"))
}

/// An entry idle past the timeout is cleared but retained; idle past the
/// clamped staleout it is deleted from the directory.
#[test]
fn idle_entries_are_cleared_then_dropped() {
    let clock = Clock::new_frozen();
    let registry = StatusTimelines::new(8, Duration::from_secs(1), clock.clone());

    let timeline = registry.must_get("u1");
    timeline.insert_one(&status("10"));

    // Idle longer than the timeout: the window is cleared, the entry stays.
    clock.advance(Duration::from_millis(1200));
    registry.trim();
    let after = registry.get("u1").expect("entry must be retained");
    assert!(Arc::ptr_eq(&timeline, &after));
    assert!(timeline.is_empty(), "idle window must be cleared");

    // Idle past max(10 x timeout, 1h) = 1h: the entry is deleted.
    clock.advance(HOUR);
    registry.trim();
    assert!(registry.get("u1").is_none());
    assert_eq!(registry.len(), 0);
}

#[test]
fn staleout_is_clamped_to_an_hour() {
    let clock = Clock::new_frozen();
    let registry = StatusTimelines::new(8, Duration::from_secs(1), clock.clone());
    let _ = registry.must_get("u1");

    // 10 x timeout would be 10s, but deletion must wait for the 1h clamp.
    clock.advance(Duration::from_secs(600));
    registry.trim();
    assert!(registry.get("u1").is_some(), "below the clamp: retained");

    clock.advance(HOUR);
    registry.trim();
    assert!(registry.get("u1").is_none());
}

#[test]
fn access_refreshes_idleness() {
    let clock = Clock::new_frozen();
    let registry = StatusTimelines::new(8, Duration::from_secs(1), clock.clone());
    let _ = registry.must_get("u1");

    // Keep touching the entry; it must survive any number of sweeps.
    for _ in 0..5 {
        clock.advance(HOUR);
        let _ = registry.must_get("u1");
        registry.trim();
        assert!(registry.get("u1").is_some());
    }

    let timeline = registry.must_get("u1");
    timeline.insert_one(&status("10"));
    registry.trim();
    assert_eq!(timeline.len(), 1, "freshly used entries keep their contents");
}

#[test]
fn zero_ttl_disables_idle_eviction() {
    let clock = Clock::new_frozen();
    let registry = StatusTimelines::new(8, Duration::ZERO, clock.clone());

    let timeline = registry.must_get("u1");
    timeline.insert_one(&status("10"));

    clock.advance(HOUR * 24);
    registry.trim();
    assert_eq!(registry.len(), 1);
    assert_eq!(timeline.len(), 1, "trim with no timeout leaves items alone");
}

/// A handle obtained before a deletion keeps working against its timeline;
/// the directory just no longer references it.
#[test]
fn deleted_entries_stay_usable_for_old_holders() {
    let registry = StatusTimelines::new(8, Duration::ZERO, Clock::new_frozen());
    let timeline = registry.must_get("u1");
    timeline.insert_one(&status("10"));

    registry.delete("u1");
    assert!(registry.get("u1").is_none());

    // The old handle still works; a new must_get builds a fresh window.
    assert_eq!(timeline.len(), 1);
    let fresh = registry.must_get("u1");
    assert!(!Arc::ptr_eq(&timeline, &fresh));
    assert!(fresh.is_empty());
}

#[test]
fn concurrent_gets_converge_on_one_timeline() {
    let registry = Arc::new(StatusTimelines::new(8, Duration::ZERO, Clock::new_frozen()));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let registry = Arc::clone(&registry);
        handles.push(thread::spawn(move || registry.must_get("shared")));
    }
    let timelines: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    // Whatever the interleaving, all callers ended up with the same window.
    for timeline in &timelines {
        assert!(Arc::ptr_eq(timeline, &timelines[0]));
    }
    assert_eq!(registry.len(), 1);
}

#[test]
fn readers_are_undisturbed_by_churn() {
    let registry = Arc::new(StatusTimelines::new(8, Duration::ZERO, Clock::new_frozen()));
    for i in 0..16 {
        let timeline = registry.must_get(&format!("key-{i}"));
        timeline.insert_one(&status(&format!("{i:04}")));
    }

    let mut handles = Vec::new();
    for t in 0..4 {
        let registry = Arc::clone(&registry);
        handles.push(thread::spawn(move || {
            for i in 0..500usize {
                let key = format!("key-{}", (t + i) % 16);
                match i % 4 {
                    0 => drop(registry.must_get(&key)),
                    1 => registry.delete(&key),
                    2 => registry.remove_by_status_ids(&["0001", "0002"]),
                    _ => {
                        // Reads against whatever snapshot is current.
                        if let Some(timeline) = registry.get(&key) {
                            let _ = timeline.len();
                        }
                    }
                }
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
}
