//! Tests for the storage layer
//!
//! These tests verify:
//! - Segment naming and startup index rebuild
//! - Sparse index lookups (point and range) across restarts
//! - Raw segment reads
//! - Error surfacing on the read path

use std::fs;

use cinderkv::config::Config;
use cinderkv::engine::Engine;
use cinderkv::storage::{build_segment, RawSegmentReader, SegmentLayout, StorageManager};
use cinderkv::CinderError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn sparse_config(temp_dir: &TempDir, interval: usize) -> Config {
    Config::builder()
        .data_dir(temp_dir.path())
        .background_compaction(false)
        .sparse_index_interval(interval)
        .build()
}

fn key(i: usize) -> String {
    format!("key{:02}", i)
}

// =============================================================================
// Index Rebuild Tests
// =============================================================================

#[test]
fn test_sparse_index_lookups_after_restart() {
    let temp_dir = TempDir::new().unwrap();
    {
        let engine = Engine::open(sparse_config(&temp_dir, 3)).unwrap();
        for i in 0..20 {
            engine.put(&key(i), &format!("value{}", i)).unwrap();
        }
        engine.flush().unwrap();
    }

    let engine = Engine::open(sparse_config(&temp_dir, 3)).unwrap();
    let segments = engine.storage().snapshot();
    assert_eq!(segments.len(), 1);
    // Records 0, 3, 6, ... 18 are indexed
    assert_eq!(segments[0].index().len(), 7);
    assert_eq!(segments[0].record_count(), 20);

    for i in 0..20 {
        assert_eq!(engine.get(&key(i)).unwrap(), Some(format!("value{}", i)), "{}", key(i));
    }
    for absent in ["key05a", "key99", "a", "zzz"] {
        assert_eq!(engine.get(absent).unwrap(), None, "{}", absent);
    }

    // Both bounds fall on non-indexed keys
    let values = engine.get_range(&key(4), &key(11)).unwrap();
    let expected: Vec<String> = (4..=11).map(|i| format!("value{}", i)).collect();
    assert_eq!(values, expected);

    assert_eq!(engine.get_range("key04a", "key05").unwrap(), vec!["value5"]);
    assert_eq!(engine.get_range("key19a", "key99").unwrap(), Vec::<String>::new());
}

#[test]
fn test_range_spans_segments_with_different_sparsity() {
    let temp_dir = TempDir::new().unwrap();
    {
        let engine = Engine::open(sparse_config(&temp_dir, 1)).unwrap();
        for i in 0..10 {
            engine.put(&key(i), "old").unwrap();
        }
        engine.flush().unwrap();
    }

    // Same data directory, sparser policy (indexes are rebuilt on open)
    let engine = Engine::open(sparse_config(&temp_dir, 4)).unwrap();
    for i in (0..10).step_by(2) {
        engine.put(&key(i), "new").unwrap();
    }
    engine.flush().unwrap();

    let values = engine.get_range(&key(0), &key(9)).unwrap();
    let expected: Vec<&str> = (0..10).map(|i| if i % 2 == 0 { "new" } else { "old" }).collect();
    assert_eq!(values, expected);
}

#[test]
fn test_index_offsets_point_at_value_bytes() {
    let temp_dir = TempDir::new().unwrap();
    let config = sparse_config(&temp_dir, 1);
    let path = temp_dir.path().join("cache-data-7.seg");
    fs::write(&path, "apple:red\nbanana:yellow\ncherry:dark\n").unwrap();

    let segment = build_segment(&path, 7, &config).unwrap().unwrap();
    let bytes = fs::read(&path).unwrap();

    for (key, value) in [("apple", "red"), ("banana", "yellow"), ("cherry", "dark")] {
        let offset = segment.index().get(key).unwrap() as usize;
        assert_eq!(&bytes[offset..offset + value.len()], value.as_bytes());
        assert_eq!(bytes[offset - 1], b':');
    }
}

#[test]
fn test_startup_rejects_unparseable_segment_name() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("cache-data-abc.seg"), "a:1\n").unwrap();

    let err = StorageManager::open(&sparse_config(&temp_dir, 1)).err().unwrap();
    assert!(matches!(err, CinderError::InvalidFormat(_)));
}

#[test]
fn test_startup_rejects_non_canonical_segment_names() {
    for name in ["backup-3.seg", "cache-data-007.seg"] {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(name), "a:1\n").unwrap();

        let err = Engine::open(sparse_config(&temp_dir, 1)).err().unwrap();
        assert!(matches!(err, CinderError::InvalidFormat(_)), "{}", name);
    }
}

#[test]
fn test_empty_segment_is_skipped_and_reused_as_active() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("cache-data-3.seg"), "a:1\n").unwrap();
    fs::write(temp_dir.path().join("cache-data-5.seg"), "").unwrap();

    let storage = StorageManager::open(&sparse_config(&temp_dir, 1)).unwrap();
    assert_eq!(storage.segment_sequences(), vec![3]);
    assert_eq!(storage.active_sequence(), 5);
    assert!(temp_dir.path().join("cache-data-5.seg").exists());
}

#[test]
fn test_segments_are_ordered_newest_first() {
    let temp_dir = TempDir::new().unwrap();
    for seq in [2, 10, 1] {
        fs::write(
            temp_dir.path().join(format!("cache-data-{}.seg", seq)),
            format!("k:{}\n", seq),
        )
        .unwrap();
    }

    let storage = StorageManager::open(&sparse_config(&temp_dir, 1)).unwrap();
    assert_eq!(storage.segment_sequences(), vec![10, 2, 1]);
    assert_eq!(storage.active_sequence(), 11);
    // Numeric, not lexicographic: 10 is newer than 2
    assert_eq!(storage.get("k").unwrap(), Some("10".to_string()));
}

#[test]
fn test_stale_placeholder_is_removed_at_startup() {
    let temp_dir = TempDir::new().unwrap();
    let placeholder = temp_dir.path().join("cache-data-0.seg");
    fs::write(&placeholder, "k:stale\n").unwrap();
    fs::write(temp_dir.path().join("cache-data-1.seg"), "k:real\n").unwrap();

    let storage = StorageManager::open(&sparse_config(&temp_dir, 1)).unwrap();
    assert!(!placeholder.exists());
    assert_eq!(storage.segment_sequences(), vec![1]);
    assert_eq!(storage.get("k").unwrap(), Some("real".to_string()));
}

#[test]
fn test_custom_prefix_and_extension() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp_dir.path())
        .background_compaction(false)
        .segment_prefix("data")
        .segment_extension("dat")
        .build();
    let engine = Engine::open(config).unwrap();

    engine.put("a", "1").unwrap();
    let sequence = engine.flush().unwrap().unwrap();

    let expected = temp_dir.path().join(format!("data-{}.dat", sequence));
    assert_eq!(fs::read_to_string(expected).unwrap(), "a:1\n");
}

// =============================================================================
// Raw Reader Tests
// =============================================================================

#[test]
fn test_raw_reader_ranges() {
    let temp_dir = TempDir::new().unwrap();
    let layout = SegmentLayout::new(temp_dir.path(), "cache-data", "seg");
    fs::write(layout.path_for(1), "a:1\nbb:22\n").unwrap();
    let reader = RawSegmentReader::new(layout.clone(), 16);

    assert_eq!(reader.read_range(1, 4, 9).unwrap(), "bb:22\n");
    assert_eq!(reader.read_to(1, 3).unwrap(), "a:1\n");
    assert_eq!(reader.read_from(1, 7).unwrap(), "22\n");
    assert_eq!(reader.read_single_value(1, 7).unwrap(), "22");
    assert_eq!(reader.segment_len(1).unwrap(), 10);

    assert!(matches!(reader.read_range(1, 5, 4), Err(CinderError::Corruption(_))));
    // Past end of file
    assert!(matches!(reader.read_range(1, 0, 100), Err(CinderError::Io(_))));
}

#[test]
fn test_materialize_all_last_occurrence_wins() {
    let temp_dir = TempDir::new().unwrap();
    let layout = SegmentLayout::new(temp_dir.path(), "cache-data", "seg");
    fs::write(layout.path_for(1), "a:1\nb:2\nnoseparator\na:3\n").unwrap();
    let reader = RawSegmentReader::new(layout.clone(), 16);

    let content = reader.materialize_all(&layout.path_for(1)).unwrap();
    assert_eq!(content.len(), 2);
    assert_eq!(content["a"], "3");
    assert_eq!(content["b"], "2");
}

// =============================================================================
// Read Path Error Tests
// =============================================================================

#[test]
fn test_io_failure_is_reported_not_a_miss() {
    let temp_dir = TempDir::new().unwrap();
    let engine = Engine::open(sparse_config(&temp_dir, 1)).unwrap();

    engine.put("k", "v").unwrap();
    let sequence = engine.flush().unwrap().unwrap();
    fs::remove_file(engine.storage().layout().path_for(sequence)).unwrap();

    let err = engine.get("k").unwrap_err();
    assert!(matches!(err, CinderError::Io(_)));
    assert!(engine.get_range("a", "z").is_err());
}

#[test]
fn test_oversized_stored_value_is_corruption() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("cache-data-1.seg"), "k:abcdefgh\n").unwrap();

    let config = Config::builder()
        .data_dir(temp_dir.path())
        .background_compaction(false)
        .sparse_index_interval(1)
        .max_value_size(4)
        .build();
    let storage = StorageManager::open(&config).unwrap();

    assert!(matches!(storage.get("k"), Err(CinderError::Corruption(_))));
}
