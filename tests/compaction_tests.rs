//! Tests for compaction
//!
//! These tests verify:
//! - The newest value of a key survives a squash
//! - Candidate selection (threshold, active segment, batch size)
//! - The reader/compactor barrier keeps in-flight readers safe
//! - The background thread squashes without being asked

use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use cinderkv::config::Config;
use cinderkv::engine::Engine;
use cinderkv::CinderError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn compaction_config(temp_dir: &TempDir, max_segments: usize, batch: usize) -> Config {
    Config::builder()
        .data_dir(temp_dir.path())
        .background_compaction(false)
        .max_segment_count(max_segments)
        .compaction_batch_size(batch)
        .sparse_index_interval(2)
        .build()
}

/// One flush per generation; every generation overwrites "k" and adds its
/// own key
fn write_generations(engine: &Engine, generations: usize) {
    for i in 1..=generations {
        engine.put("k", &format!("v{}", i)).unwrap();
        engine.put(&format!("only{}", i), &format!("{}", i)).unwrap();
        engine.flush().unwrap();
    }
}

fn wait_until(timeout: Duration, cond: impl Fn() -> bool) {
    let deadline = Instant::now() + timeout;
    while !cond() {
        assert!(Instant::now() < deadline, "condition not reached in {:?}", timeout);
        thread::sleep(Duration::from_millis(2));
    }
}

// =============================================================================
// Squash Tests
// =============================================================================

#[test]
fn test_compaction_preserves_latest_values() {
    let temp_dir = TempDir::new().unwrap();
    let engine = Engine::open(compaction_config(&temp_dir, 3, 5)).unwrap();
    write_generations(&engine, 5);

    let report = engine.compact().unwrap().unwrap();
    assert_eq!(report.inputs, vec![1, 2, 3, 4, 5]);
    assert_eq!(report.output, 1);
    assert_eq!(report.records_written, 6);

    assert_eq!(engine.get("k").unwrap(), Some("v5".to_string()));
    for i in 1..=5 {
        assert_eq!(engine.get(&format!("only{}", i)).unwrap(), Some(format!("{}", i)));
    }
    assert_eq!(engine.storage().segment_sequences(), vec![1]);

    let layout = engine.storage().layout();
    for seq in 2..=5 {
        assert!(!layout.path_for(seq).exists(), "segment {} should be gone", seq);
    }
    assert!(!layout.placeholder_path().exists());
    assert_eq!(
        fs::read_to_string(layout.path_for(1)).unwrap(),
        "k:v5\nonly1:1\nonly2:2\nonly3:3\nonly4:4\nonly5:5\n"
    );
    drop(engine);

    let engine = Engine::open(compaction_config(&temp_dir, 3, 5)).unwrap();
    assert_eq!(engine.get("k").unwrap(), Some("v5".to_string()));
    assert_eq!(engine.get_range("only1", "only5").unwrap(), vec!["1", "2", "3", "4", "5"]);
}

#[test]
fn test_merged_segment_stays_behind_newer_segments() {
    let temp_dir = TempDir::new().unwrap();
    let engine = Engine::open(compaction_config(&temp_dir, 3, 3)).unwrap();
    write_generations(&engine, 6);

    let report = engine.compact().unwrap().unwrap();
    assert_eq!(report.inputs, vec![1, 2, 3]);
    assert_eq!(engine.storage().segment_sequences(), vec![6, 5, 4, 1]);

    // Newer, uncompacted segments still win
    assert_eq!(engine.get("k").unwrap(), Some("v6".to_string()));
    assert_eq!(engine.get("only3").unwrap(), Some("3".to_string()));
    assert_eq!(
        engine.get_range("k", "k").unwrap(),
        vec!["v6".to_string()]
    );
}

#[test]
fn test_no_compaction_within_limit() {
    let temp_dir = TempDir::new().unwrap();
    let engine = Engine::open(compaction_config(&temp_dir, 10, 5)).unwrap();
    write_generations(&engine, 3);

    assert_eq!(engine.compact().unwrap(), None);
    assert_eq!(engine.storage().segment_sequences(), vec![3, 2, 1]);
}

#[test]
fn test_active_segment_is_never_selected() {
    let temp_dir = TempDir::new().unwrap();
    let engine = Engine::open(compaction_config(&temp_dir, 1, 5)).unwrap();
    write_generations(&engine, 1);

    // Two files on disk (segment 1 plus the empty active one), but only one
    // candidate
    assert_eq!(engine.compact().unwrap(), None);
    assert!(engine.storage().layout().path_for(2).exists());
}

#[test]
fn test_failed_step_leaves_inputs_intact() {
    let temp_dir = TempDir::new().unwrap();
    let engine = Engine::open(compaction_config(&temp_dir, 3, 5)).unwrap();
    write_generations(&engine, 4);

    let layout = engine.storage().layout();
    fs::write(layout.path_for(1), b"k:\xff\n").unwrap();

    let err = engine.compact().unwrap_err();
    assert!(matches!(err, CinderError::Corruption(_)));
    for seq in 1..=4 {
        assert!(layout.path_for(seq).exists());
    }
    assert!(!layout.placeholder_path().exists());
    assert_eq!(engine.storage().segment_count(), 4);
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_in_flight_reader_blocks_file_deletion() {
    let temp_dir = TempDir::new().unwrap();
    let engine = Engine::open(compaction_config(&temp_dir, 3, 5)).unwrap();
    write_generations(&engine, 5);

    let barrier = engine.storage().barrier();
    let layout = engine.storage().layout();
    let reader = barrier.read();
    let late_read_done = AtomicBool::new(false);

    thread::scope(|s| {
        let compactor = s.spawn(|| engine.compact());

        // The compactor has built its output and waits for the reader
        wait_until(Duration::from_secs(5), || barrier.pending_exclusive() == 1);
        assert!(layout.placeholder_path().exists());
        for seq in 1..=5 {
            assert!(layout.path_for(seq).exists());
        }

        // A reader arriving now queues behind the compactor
        let late_reader = s.spawn(|| {
            let value = engine.get("k");
            late_read_done.store(true, Ordering::SeqCst);
            value
        });
        thread::sleep(Duration::from_millis(30));
        assert!(!late_read_done.load(Ordering::SeqCst));
        assert_eq!(barrier.active_readers(), 1);

        drop(reader);

        let report = compactor.join().unwrap().unwrap().unwrap();
        assert_eq!(report.inputs, vec![1, 2, 3, 4, 5]);
        assert_eq!(late_reader.join().unwrap().unwrap(), Some("v5".to_string()));
    });

    assert_eq!(barrier.active_readers(), 0);
    assert!(!barrier.is_exclusive());
}

#[test]
fn test_concurrent_range_reads_during_compaction() {
    let temp_dir = TempDir::new().unwrap();
    let engine = Engine::open(compaction_config(&temp_dir, 3, 5)).unwrap();
    write_generations(&engine, 5);

    thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                for _ in 0..50 {
                    let values = engine.get_range("only1", "only5").unwrap();
                    assert_eq!(values, vec!["1", "2", "3", "4", "5"]);
                    assert_eq!(engine.get("k").unwrap(), Some("v5".to_string()));
                }
            });
        }
        s.spawn(|| engine.compact().unwrap());
    });

    assert_eq!(engine.storage().segment_sequences(), vec![1]);
}

#[test]
fn test_background_compactor_squashes() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp_dir.path())
        .max_segment_count(3)
        .compaction_batch_size(5)
        .compaction_poll_interval_ms(10)
        .build();
    let engine = Engine::open(config).unwrap();
    write_generations(&engine, 5);

    wait_until(Duration::from_secs(5), || engine.segment_count() < 5);
    assert_eq!(engine.get("k").unwrap(), Some("v5".to_string()));
    for i in 1..=5 {
        assert_eq!(engine.get(&format!("only{}", i)).unwrap(), Some(format!("{}", i)));
    }
    engine.close().unwrap();
}
