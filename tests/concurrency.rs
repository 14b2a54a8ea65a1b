//! Concurrent writers and readers against one engine.

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use serde_json::json;
use tiercfg::{Engine, EngineSettings, ErrorKind, NodeType, Schema, Value};

fn engine(retry_attempts: u32) -> Arc<Engine> {
    let settings = EngineSettings {
        retry_attempts,
        lock_timeout: Duration::from_secs(10),
        ..EngineSettings::default()
    };
    let engine = Engine::in_memory(Schema::default(), settings);
    engine.create_node("acme", "acme", None, NodeType::Org).unwrap();
    engine.create_node("acme", "eng", Some("acme"), NodeType::Team).unwrap();
    engine.create_node("acme", "ops", Some("acme"), NodeType::Team).unwrap();
    Arc::new(engine)
}

#[test]
fn test_exactly_one_expected_version_winner() {
    let engine = engine(1);
    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|i| {
            let engine = Arc::clone(&engine);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let patch = Value::from_json(json!({ "writer": i })).unwrap();
                engine.patch_config("eng", patch, Some(0), None)
            })
        })
        .collect();

    let results: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().expect("Thread panicked"))
        .collect();

    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1, "exactly one writer should commit v1");
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert_eq!(err.kind(), ErrorKind::VersionConflict);
    }
    assert_eq!(engine.current_fragment("eng").unwrap().version, 1);
    assert_eq!(engine.history("eng", None).unwrap().len(), 1);
}

#[test]
fn test_retrying_writers_all_land() {
    let engine = engine(1_000);
    let threads = 6;
    let per_thread = 10;

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                for n in 0..per_thread {
                    let key = format!("w{}_{}", t, n);
                    let patch = Value::from_json(json!({ "seen": { key: true } })).unwrap();
                    engine.patch_with_retry("eng", patch, Some("worker")).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    let total = (threads * per_thread) as u64;
    let current = engine.current_fragment("eng").unwrap();
    assert_eq!(current.version, total);
    let seen = current.fragment.to_json();
    assert_eq!(seen["seen"].as_object().unwrap().len(), total as usize);

    let versions: Vec<u64> = engine
        .history("eng", Some(1_000))
        .unwrap()
        .iter()
        .map(|e| e.version)
        .collect();
    let expected: Vec<u64> = (1..=total).rev().collect();
    assert_eq!(versions, expected);
}

#[test]
fn test_different_nodes_are_independent() {
    let engine = engine(1);
    let handles: Vec<_> = ["eng", "ops"]
        .into_iter()
        .map(|node| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                for i in 0..20u64 {
                    let patch = Value::from_json(json!({ "n": i })).unwrap();
                    engine.patch_config(node, patch, Some(i), None).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    assert_eq!(engine.current_fragment("eng").unwrap().version, 20);
    assert_eq!(engine.current_fragment("ops").unwrap().version, 20);
}

#[test]
fn test_readers_see_committed_versions_only() {
    let engine = engine(1);
    let writer = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || {
            for i in 1..=30i64 {
                let patch = Value::from_json(json!({ "tools": { "x": i % 2 == 0 }, "n": i })).unwrap();
                engine.patch_config("acme", patch, None, None).unwrap();
            }
        })
    };

    let reader = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || {
            let mut last = 0;
            for _ in 0..200 {
                let effective = engine.resolve("eng").unwrap();
                let version = effective.versions.version_of("acme").unwrap();
                assert!(version >= last, "acme version went backwards");
                last = version;

                let doc = effective.document().to_json();
                if version > 0 {
                    // every resolved document matches the snapshot it claims
                    assert_eq!(doc["n"], version);
                }
            }
        })
    };

    writer.join().expect("Thread panicked");
    reader.join().expect("Thread panicked");
}
