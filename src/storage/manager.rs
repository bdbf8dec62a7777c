//! Storage Manager
//!
//! Owns the segment list and coordinates reads across segments.
//!
//! ## Responsibilities
//! - Rebuild every segment index at startup (newest → oldest)
//! - Resolve point lookups and range scans newest → oldest
//! - Write MemTable flushes into the active segment and rotate it
//! - Swap compacted segments into the list

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard, RwLock};

use crate::config::Config;
use crate::error::Result;
use crate::record::{Record, RECORD_TERMINATOR};

use super::barrier::SegmentBarrier;
use super::index::{self, record_start};
use super::layout::{AgeOrder, SegmentLayout, PLACEHOLDER_SEQUENCE};
use super::reader::RawSegmentReader;
use super::segment::{self, Segment};

/// Immutable snapshot of the segment list, newest first
pub type SegmentList = Arc<Vec<Arc<Segment>>>;

/// Manages the storage layer
///
/// ## Concurrency:
/// - `segments`: copy-on-write snapshot; readers clone the `Arc` and never
///   observe a partially updated list
/// - `list_lock`: serializes the two mutations (flush prepend, compaction
///   tail replacement)
/// - `barrier`: readers hold it shared while touching segment files;
///   compaction holds it exclusively while deleting and renaming them
pub struct StorageManager {
    config: Config,
    layout: SegmentLayout,
    reader: RawSegmentReader,
    segments: RwLock<SegmentList>,
    list_lock: Mutex<()>,
    barrier: SegmentBarrier,
    /// Held for a whole squash step so two compactors never pick the same
    /// inputs
    compaction: Mutex<()>,
    /// Sequence number of the writable segment
    active_sequence: AtomicU64,
}

impl StorageManager {
    /// Open or create storage in the configured data directory
    ///
    /// On startup:
    /// 1. Create directory if it doesn't exist
    /// 2. Remove a compaction placeholder left by an interrupted squash
    /// 3. Build one sparse index per non-empty segment, newest first
    /// 4. Resolve (and create) the active segment
    pub fn open(config: &Config) -> Result<Self> {
        fs::create_dir_all(&config.data_dir)?;
        let layout = SegmentLayout::from_config(config);

        let placeholder = layout.placeholder_path();
        if placeholder.exists() {
            tracing::warn!(
                "Removing stale compaction output {}",
                placeholder.display()
            );
            fs::remove_file(&placeholder)?;
        }

        let segments = index::build_all(&layout, config)?;
        let active_sequence = Self::resolve_active_sequence(&layout)?;

        OpenOptions::new()
            .create(true)
            .append(true)
            .open(layout.path_for(active_sequence))?;

        tracing::info!(
            "Storage opened: {} indexed segments, active segment {}",
            segments.len(),
            active_sequence
        );

        Ok(Self {
            config: config.clone(),
            reader: RawSegmentReader::new(layout.clone(), config.max_value_size),
            layout,
            segments: RwLock::new(Arc::new(segments.into_iter().map(Arc::new).collect())),
            list_lock: Mutex::new(()),
            barrier: SegmentBarrier::new(),
            compaction: Mutex::new(()),
            active_sequence: AtomicU64::new(active_sequence),
        })
    }

    /// The newest segment stays active if it is still empty; otherwise a new
    /// one follows it
    fn resolve_active_sequence(layout: &SegmentLayout) -> Result<u64> {
        let newest = layout
            .list_sequences(AgeOrder::NewestFirst)?
            .into_iter()
            .find(|(sequence, _)| *sequence != PLACEHOLDER_SEQUENCE);

        Ok(match newest {
            Some((sequence, path)) if fs::metadata(&path)?.len() == 0 => sequence,
            Some((sequence, _)) => sequence + 1,
            None => 1,
        })
    }

    // =========================================================================
    // Read Path
    // =========================================================================

    /// Point lookup across segments, newest → oldest
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.barrier.read();
        let segments = self.snapshot();

        for segment in segments.iter() {
            if !segment.may_contain(key) {
                continue;
            }
            if let Some(value) = self.lookup_in_segment(segment, key)? {
                return Ok(Some(value));
            }
        }

        Ok(None)
    }

    fn lookup_in_segment(&self, segment: &Segment, key: &str) -> Result<Option<String>> {
        let index = segment.index();

        // Fast path: the key itself is indexed
        if let Some(offset) = index.get(key) {
            return self
                .reader
                .read_single_value(segment.sequence(), offset)
                .map(Some);
        }

        // Window between the nearest indexed neighbours
        let from = index
            .floor(key)
            .map(|(k, offset)| record_start(k, offset))
            .unwrap_or(0);
        let to_exclusive = index
            .higher(key)
            .map(|(k, offset)| record_start(k, offset))
            .unwrap_or_else(|| segment.len());

        if to_exclusive <= from {
            return Ok(None);
        }

        let window = self
            .reader
            .read_range(segment.sequence(), from, to_exclusive - 1)?;
        Ok(find_last_in_window(&window, key).map(str::to_string))
    }

    /// Resolve every key in `from..=to` not already present in `resolved`
    ///
    /// Segments are visited newest → oldest with exactly one range read each;
    /// the first segment to mention a key wins.
    pub fn scan_into(&self, from: &str, to: &str, resolved: &mut BTreeMap<String, String>) -> Result<()> {
        if from > to {
            return Ok(());
        }

        let _guard = self.barrier.read();
        let segments = self.snapshot();

        for segment in segments.iter() {
            let index = segment.index();
            let start = index
                .floor(from)
                .map(|(k, offset)| record_start(k, offset))
                .unwrap_or(0);
            let end_exclusive = index
                .higher(to)
                .map(|(k, offset)| record_start(k, offset))
                .unwrap_or_else(|| segment.len());

            if end_exclusive <= start {
                continue;
            }

            let window = self
                .reader
                .read_range(segment.sequence(), start, end_exclusive - 1)?;

            // Within one segment the last occurrence wins
            let mut found: BTreeMap<&str, &str> = BTreeMap::new();
            for (key, value) in complete_records(&window) {
                if key >= from && key <= to {
                    found.insert(key, value);
                }
            }

            for (key, value) in found {
                if !resolved.contains_key(key) {
                    resolved.insert(key.to_string(), value.to_string());
                }
            }
        }

        Ok(())
    }

    // =========================================================================
    // Write Path
    // =========================================================================

    /// Write sorted records into the active segment, install its index at the
    /// head of the list, then rotate to a fresh active segment
    ///
    /// Returns the sequence number the records were written to.
    pub fn flush(&self, records: &[Record]) -> Result<u64> {
        let sequence = self.active_sequence.load(Ordering::SeqCst);
        let encoded = segment::encode_record_slice(sequence, records, &self.config);

        segment::write_segment_file(&self.layout.path_for(sequence), &encoded.bytes)?;

        if let Some(segment) = encoded.segment {
            let _list = self.list_lock.lock();
            let mut next = Vec::with_capacity(self.segment_count() + 1);
            next.push(Arc::new(segment));
            next.extend(self.snapshot().iter().cloned());
            *self.segments.write() = Arc::new(next);
        }

        let next_active = sequence + 1;
        self.active_sequence.store(next_active, Ordering::SeqCst);
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.layout.path_for(next_active))?;

        tracing::info!(
            "Flushed {} records ({} bytes) to segment {}",
            records.len(),
            encoded.bytes.len(),
            sequence
        );
        Ok(sequence)
    }

    /// Replace the compacted segments with their merged result at the tail
    ///
    /// Callers hold the barrier exclusively. `merged` is None when every
    /// input was empty.
    pub fn install_compacted(&self, removed: &[u64], merged: Option<Segment>) {
        let _list = self.list_lock.lock();
        let current = self.snapshot();

        let mut next: Vec<Arc<Segment>> = current
            .iter()
            .filter(|segment| !removed.contains(&segment.sequence()))
            .cloned()
            .collect();
        if let Some(segment) = merged {
            next.push(Arc::new(segment));
        }

        *self.segments.write() = Arc::new(next);
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Current segment list, newest first
    pub fn snapshot(&self) -> SegmentList {
        Arc::clone(&self.segments.read())
    }

    /// Number of indexed segments
    pub fn segment_count(&self) -> usize {
        self.segments.read().len()
    }

    /// Sequence numbers of indexed segments, newest first
    pub fn segment_sequences(&self) -> Vec<u64> {
        self.snapshot().iter().map(|s| s.sequence()).collect()
    }

    pub fn active_sequence(&self) -> u64 {
        self.active_sequence.load(Ordering::SeqCst)
    }

    pub fn barrier(&self) -> &SegmentBarrier {
        &self.barrier
    }

    pub fn compaction_lock(&self) -> MutexGuard<'_, ()> {
        self.compaction.lock()
    }

    pub fn layout(&self) -> &SegmentLayout {
        &self.layout
    }

    pub fn reader(&self) -> &RawSegmentReader {
        &self.reader
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

/// Records of a window, dropping any unterminated trailing bytes
fn complete_records(window: &str) -> impl Iterator<Item = (&str, &str)> {
    let complete = match window.rfind(RECORD_TERMINATOR as char) {
        Some(end) => &window[..end + 1],
        None => "",
    };
    complete
        .split_terminator(RECORD_TERMINATOR as char)
        .filter_map(|line| line.split_once(':'))
}

/// Binary search a window of sorted records for `key`, returning the value of
/// the last equal-key record
fn find_last_in_window<'a>(window: &'a str, key: &str) -> Option<&'a str> {
    let records: Vec<(&str, &str)> = complete_records(window).collect();
    let mut pos = records.partition_point(|(k, _)| *k < key);

    let mut value = None;
    while pos < records.len() && records[pos].0 == key {
        value = Some(records[pos].1);
        pos += 1;
    }
    value
}
