// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Cross-thread locking behavior of [`MutexMap`].

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, mpsc};
use std::thread;
use std::time::Duration;

use keylatch::MutexMap;

/// Ten readers hold the key while a writer waits; the writer must get in
/// exactly when the last reader leaves, and the key must vanish afterwards.
#[test]
fn writer_waits_for_all_readers() {
    let map = Arc::new(MutexMap::new());
    let active_readers = Arc::new(AtomicU32::new(0));
    let ready = Arc::new(Barrier::new(11));

    let mut readers = Vec::new();
    for _ in 0..10 {
        let map = Arc::clone(&map);
        let active = Arc::clone(&active_readers);
        let ready = Arc::clone(&ready);
        let (done_tx, done_rx) = mpsc::channel::<()>();
        readers.push((done_tx, thread::spawn(move || {
            let guard = map.rlock("k");
            active.fetch_add(1, Ordering::SeqCst);
            ready.wait();
            done_rx.recv().unwrap();
            active.fetch_sub(1, Ordering::SeqCst);
            drop(guard);
        })));
    }

    ready.wait();
    assert_eq!(active_readers.load(Ordering::SeqCst), 10);

    let writer = {
        let map = Arc::clone(&map);
        let active = Arc::clone(&active_readers);
        thread::spawn(move || {
            let guard = map.lock("k");
            // All readers must be gone before the write lock is granted.
            assert_eq!(active.load(Ordering::SeqCst), 0);
            drop(guard);
        })
    };

    // Give the writer time to end up blocked behind the readers.
    thread::sleep(Duration::from_millis(50));
    assert!(!writer.is_finished());

    // Release readers one by one, in spawn order.
    for (done_tx, handle) in readers {
        done_tx.send(()).unwrap();
        handle.join().unwrap();
    }

    writer.join().unwrap();
    assert_eq!(map.len(), 0, "fully unlocked key must be evicted");
}

#[test]
fn readers_wait_for_writer() {
    let map = Arc::new(MutexMap::new());
    let writer_holds = Arc::new(Barrier::new(2));

    let guard = map.lock("k");

    let reader = {
        let map = Arc::clone(&map);
        let writer_holds = Arc::clone(&writer_holds);
        thread::spawn(move || {
            writer_holds.wait();
            let _guard = map.rlock("k");
        })
    };

    writer_holds.wait();
    thread::sleep(Duration::from_millis(50));
    assert!(!reader.is_finished(), "reader must block behind the writer");

    drop(guard);
    reader.join().unwrap();
    assert_eq!(map.len(), 0);
}

/// Two writers hammer one key: their critical sections must never overlap.
#[test]
fn writers_are_mutually_exclusive() {
    let map = Arc::new(MutexMap::new());
    let in_critical = Arc::new(AtomicU32::new(0));

    let mut handles = Vec::new();
    for _ in 0..4 {
        let map = Arc::clone(&map);
        let in_critical = Arc::clone(&in_critical);
        handles.push(thread::spawn(move || {
            for _ in 0..200 {
                let guard = map.lock("hot");
                assert_eq!(in_critical.fetch_add(1, Ordering::SeqCst), 0);
                in_critical.fetch_sub(1, Ordering::SeqCst);
                drop(guard);
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(map.len(), 0);
}

#[test]
fn try_lock_contention_across_threads() {
    let map = Arc::new(MutexMap::new());
    let guard = map.lock("k");

    let map2 = Arc::clone(&map);
    let handle = thread::spawn(move || {
        assert!(map2.try_lock("k").is_none());
        assert!(map2.try_rlock("k").is_none());
        // A different key is unaffected.
        assert!(map2.try_lock("j").is_some());
    });
    handle.join().unwrap();

    drop(guard);
    assert_eq!(map.len(), 0);
}

/// Many threads over many keys; afterwards the map must be completely empty.
#[test]
fn stress_leaves_no_cells_behind() {
    let map = Arc::new(MutexMap::new());
    let counters: Arc<Vec<AtomicUsize>> = Arc::new((0..8).map(|_| AtomicUsize::new(0)).collect());

    let mut handles = Vec::new();
    for t in 0..8 {
        let map = Arc::clone(&map);
        let counters = Arc::clone(&counters);
        handles.push(thread::spawn(move || {
            for i in 0..500usize {
                let key = format!("key-{}", i % 8);
                if (t + i) % 3 == 0 {
                    let _guard = map.lock(&key);
                    counters[i % 8].fetch_add(1, Ordering::Relaxed);
                } else {
                    let _guard = map.rlock(&key);
                    counters[i % 8].load(Ordering::Relaxed);
                }
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(map.len(), 0);
}
