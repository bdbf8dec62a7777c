//! Tests for the Write-Ahead Log
//!
//! These tests verify:
//! - Appending records and reading them back in log order
//! - Sync strategies and truncation
//! - Recovery from malformed lines and partial tails

use std::fs;

use cinderkv::config::WalSyncStrategy;
use cinderkv::wal::{RecoveryResult, WalLine, WalReader, WalRecovery, WalWriter};
use cinderkv::Record;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn record(key: &str, value: &str) -> Record {
    Record::new(key, value).unwrap()
}

// =============================================================================
// Writer Tests
// =============================================================================

#[test]
fn test_append_uses_record_layout() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("wal.log");

    let mut writer = WalWriter::open(&path, WalSyncStrategy::EveryWrite).unwrap();
    assert_eq!(writer.append(&record("k1", "v1")).unwrap(), 1);
    assert_eq!(writer.append(&record("k2", "v2")).unwrap(), 2);

    assert_eq!(fs::read_to_string(&path).unwrap(), "k1:v1\nk2:v2\n");
    assert_eq!(writer.record_count(), 2);
}

#[test]
fn test_reopen_appends_at_end() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("wal.log");

    {
        let mut writer = WalWriter::open(&path, WalSyncStrategy::EveryWrite).unwrap();
        writer.append(&record("a", "1")).unwrap();
    }
    {
        let mut writer =
            WalWriter::open(&path, WalSyncStrategy::EveryNEntries { count: 10 }).unwrap();
        writer.append(&record("b", "2")).unwrap();
        writer.sync().unwrap();
    }

    assert_eq!(fs::read_to_string(&path).unwrap(), "a:1\nb:2\n");
}

#[test]
fn test_truncate_empties_log_and_keeps_it_writable() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("wal.log");

    let mut writer = WalWriter::open(&path, WalSyncStrategy::EveryWrite).unwrap();
    writer.append(&record("a", "1")).unwrap();
    writer.truncate().unwrap();

    assert_eq!(fs::metadata(&path).unwrap().len(), 0);
    assert_eq!(writer.record_count(), 0);

    writer.append(&record("b", "2")).unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), "b:2\n");
}

// =============================================================================
// Reader Tests
// =============================================================================

#[test]
fn test_reader_classifies_lines() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("wal.log");
    fs::write(&path, "a:1\ngarbage\nb:\nc:3-partial").unwrap();

    let lines: Vec<WalLine> = WalReader::open(&path)
        .unwrap()
        .collect::<cinderkv::Result<_>>()
        .unwrap();

    assert_eq!(
        lines,
        vec![
            WalLine::Record(record("a", "1")),
            WalLine::Malformed("garbage".to_string()),
            WalLine::Record(record("b", "")),
            WalLine::Partial(11),
        ]
    );
}

// =============================================================================
// Recovery Tests
// =============================================================================

#[test]
fn test_recover_missing_file() {
    let temp_dir = TempDir::new().unwrap();
    let (records, result) = WalRecovery::recover(&temp_dir.path().join("absent.log")).unwrap();

    assert!(records.is_empty());
    assert_eq!(result, RecoveryResult::default());
}

#[test]
fn test_recover_keeps_log_order_and_counts() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("wal.log");
    fs::write(&path, "k:1\n:nokey\nk:2\nj:9\nhalf").unwrap();

    let (records, result) = WalRecovery::recover(&path).unwrap();

    assert_eq!(records, vec![record("k", "1"), record("k", "2"), record("j", "9")]);
    assert_eq!(
        result,
        RecoveryResult {
            records_recovered: 3,
            records_skipped: 1,
            was_truncated: true,
        }
    );
}

#[test]
fn test_verify_clean_log() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("wal.log");

    let mut writer = WalWriter::open(&path, WalSyncStrategy::EveryWrite).unwrap();
    for i in 0..10 {
        writer.append(&record(&format!("k{}", i), "v")).unwrap();
    }

    let result = WalRecovery::verify(&path).unwrap();
    assert_eq!(result.records_recovered, 10);
    assert!(!result.was_truncated);
}
