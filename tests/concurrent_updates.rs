//! Concurrent writers on distinct topics must not disturb each other.
//!
//! Each topic gets its own writers; the final state of every topic must equal
//! a sequential replay of that topic's own writes.

use proptest::prelude::*;
use std::sync::Arc;
use std::thread;
use telemetry_host::{Implementation, SensorDescriptor, SensorStore, SensorValue};

fn topic(i: usize) -> String {
    format!("sensors/{}", i)
}

/// Spawn `writers` threads per topic, each pushing `per_writer` values.
///
/// Values encode (writer, sequence) so ordering per writer can be checked.
fn run_writers(store: &Arc<SensorStore>, topics: usize, writers: usize, per_writer: usize) {
    let mut handles = Vec::new();
    for t in 0..topics {
        for w in 0..writers {
            let store = store.clone();
            handles.push(thread::spawn(move || {
                for seq in 0..per_writer {
                    let value = (w * 1_000_000 + seq) as f64;
                    assert!(store.update(&topic(t), SensorValue::Number(value)).is_some());
                }
            }));
        }
    }
    for h in handles {
        h.join().unwrap();
    }
}

fn check_topic(store: &SensorStore, t: usize, writers: usize, per_writer: usize, capacity: usize) {
    let snap = store.get(&topic(t)).unwrap();
    let total = writers * per_writer;
    assert_eq!(snap.history.len(), total.min(capacity));

    // the last value is the newest history entry
    let last = snap.history.last().map(|h| h.value.clone());
    assert_eq!(snap.current_value, last);

    // every value belongs to this topic's writers and each writer's values
    // appear in the order that writer sent them
    let mut last_seq = vec![None::<usize>; writers];
    for entry in &snap.history {
        let SensorValue::Number(v) = entry.value else {
            panic!("non-numeric history entry {:?}", entry.value);
        };
        let v = v as usize;
        let (w, seq) = (v / 1_000_000, v % 1_000_000);
        assert!(w < writers && seq < per_writer);
        if let Some(prev) = last_seq[w] {
            assert!(seq > prev);
        }
        last_seq[w] = Some(seq);
    }
    assert!(snap.history.windows(2).all(|p| p[0].timestamp <= p[1].timestamp));
}

#[test]
fn test_threaded_writers_per_topic() {
    let (topics, writers, per_writer, capacity) = (8, 4, 250, 100);
    let store = Arc::new(SensorStore::new());
    for t in 0..topics {
        store.register(
            SensorDescriptor::new(topic(t), "s", "counter", Implementation::Graph).with_history(capacity),
        );
    }

    run_writers(&store, topics, writers, per_writer);

    for t in 0..topics {
        check_topic(&store, t, writers, per_writer, capacity);
    }
    assert_eq!(store.get_all().len(), topics);
}

#[test]
fn test_readers_never_see_partial_updates() {
    let store = Arc::new(SensorStore::new());
    store.register(SensorDescriptor::new("g", "g", "counter", Implementation::Graph).with_history(5_000));

    let writer = {
        let store = store.clone();
        thread::spawn(move || {
            for i in 0..2_000 {
                store.update("g", SensorValue::Number(i as f64));
            }
        })
    };
    let reader = {
        let store = store.clone();
        thread::spawn(move || {
            for _ in 0..2_000 {
                let all = store.get_all();
                let snap = &all["g"];
                // value and history always move together
                assert_eq!(snap.current_value, snap.history.last().map(|h| h.value.clone()));
                assert_eq!(snap.last_updated, snap.history.last().map(|h| h.timestamp));
            }
        })
    };

    writer.join().unwrap();
    reader.join().unwrap();
    assert_eq!(store.get("g").unwrap().history.len(), 2_000);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Final history length and last value match a per-topic replay.
    #[test]
    fn concurrent_writes_match_sequential_replay(
        topics in 1usize..=6,
        writers in 1usize..=4,
        per_writer in 1usize..=40,
        capacity in 1usize..=64,
    ) {
        let store = Arc::new(SensorStore::new());
        for t in 0..topics {
            store.register(
                SensorDescriptor::new(topic(t), "s", "counter", Implementation::Graph).with_history(capacity),
            );
        }

        run_writers(&store, topics, writers, per_writer);

        for t in 0..topics {
            let snap = store.get(&topic(t)).unwrap();
            prop_assert_eq!(snap.history.len(), (writers * per_writer).min(capacity));
            prop_assert_eq!(
                snap.current_value.clone(),
                snap.history.last().map(|h| h.value.clone())
            );
        }
        // with a single writer the replay is fully determined
        if writers == 1 {
            for t in 0..topics {
                let snap = store.get(&topic(t)).unwrap();
                prop_assert_eq!(snap.current_value, Some(SensorValue::Number((per_writer - 1) as f64)));
            }
        }
    }
}
