//! Sparse Segment Index
//!
//! Maps a subset of a segment's keys to the byte offset where their value
//! begins. Record `i` of a segment (0-based, in file order) is indexed iff
//! `i % interval == 0`; the same policy is applied when a segment is flushed,
//! rebuilt at startup, or produced by compaction.

use std::collections::BTreeMap;
use std::fs;
use std::ops::Bound;
use std::path::Path;

use crate::config::Config;
use crate::error::{CinderError, Result};
use crate::record::{KEY_VALUE_SEPARATOR, RECORD_TERMINATOR};

use super::bloom::BloomFilter;
use super::layout::{AgeOrder, SegmentLayout, PLACEHOLDER_SEQUENCE};
use super::segment::Segment;

/// Ordered key -> value offset mapping for one segment
#[derive(Debug, Clone, Default)]
pub struct SegmentIndex {
    entries: BTreeMap<String, u64>,
}

impl SegmentIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: String, value_offset: u64) {
        self.entries.insert(key, value_offset);
    }

    /// Value offset of an indexed key
    pub fn get(&self, key: &str) -> Option<u64> {
        self.entries.get(key).copied()
    }

    /// Largest indexed key <= `key`
    pub fn floor(&self, key: &str) -> Option<(&str, u64)> {
        self.entries
            .range::<str, _>((Bound::Unbounded, Bound::Included(key)))
            .next_back()
            .map(|(k, &offset)| (k.as_str(), offset))
    }

    /// Smallest indexed key > `key`
    pub fn higher(&self, key: &str) -> Option<(&str, u64)> {
        self.entries
            .range::<str, _>((Bound::Excluded(key), Bound::Unbounded))
            .next()
            .map(|(k, &offset)| (k.as_str(), offset))
    }

    /// Indexed entries with `from <= key <= to`
    pub fn sub_range<'a>(&'a self, from: &'a str, to: &'a str) -> impl Iterator<Item = (&'a str, u64)> + 'a {
        let bounds = if from <= to {
            Some((Bound::Included(from), Bound::Included(to)))
        } else {
            None
        };
        bounds
            .into_iter()
            .flat_map(move |b| self.entries.range::<str, _>(b))
            .map(|(k, &offset)| (k.as_str(), offset))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Byte offset of the first byte of the record whose value starts at
/// `value_offset`
pub fn record_start(key: &str, value_offset: u64) -> u64 {
    value_offset - key.len() as u64 - 1
}

/// Accumulates the sparse index and bloom filter of one segment as its
/// records are observed in file order
pub struct SparseIndexBuilder {
    interval: usize,
    index: SegmentIndex,
    bloom: BloomFilter,
    record_count: usize,
}

impl SparseIndexBuilder {
    pub fn new(expected_records: usize, interval: usize, false_positive_rate: f64) -> Self {
        Self {
            interval: interval.max(1),
            index: SegmentIndex::new(),
            bloom: BloomFilter::new(expected_records, false_positive_rate),
            record_count: 0,
        }
    }

    pub fn for_config(expected_records: usize, config: &Config) -> Self {
        Self::new(
            expected_records,
            config.sparse_index_interval,
            config.bloom_false_positive_rate,
        )
    }

    /// Register one record whose value begins at `value_offset`
    pub fn observe(&mut self, key: &str, value_offset: u64) {
        if self.record_count % self.interval == 0 {
            self.index.insert(key.to_string(), value_offset);
        }
        self.bloom.insert(key.as_bytes());
        self.record_count += 1;
    }

    /// Single linear pass over raw segment bytes
    ///
    /// Bytes up to the first ':' of a line form the key; the value starts at
    /// the next byte; '\n' ends the record.
    pub fn scan(&mut self, bytes: &[u8]) -> Result<()> {
        let mut key_start = 0usize;
        let mut in_key = true;

        for (i, &byte) in bytes.iter().enumerate() {
            if byte == RECORD_TERMINATOR {
                key_start = i + 1;
                in_key = true;
                continue;
            }
            if in_key && byte == KEY_VALUE_SEPARATOR {
                in_key = false;
                if i == key_start {
                    continue;
                }
                let key = std::str::from_utf8(&bytes[key_start..i]).map_err(|_| {
                    CinderError::Corruption(format!("key at offset {} is not valid UTF-8", key_start))
                })?;
                self.observe(key, i as u64 + 1);
            }
        }
        Ok(())
    }

    pub fn record_count(&self) -> usize {
        self.record_count
    }

    /// Finish the segment. Zero observed records yields None (nothing to
    /// index).
    pub fn finish(self, sequence: u64, len: u64) -> Option<Segment> {
        if self.record_count == 0 {
            return None;
        }
        Some(Segment::new(sequence, self.index, self.bloom, len, self.record_count))
    }
}

/// Build the index of one segment file
pub fn build_segment(path: &Path, sequence: u64, config: &Config) -> Result<Option<Segment>> {
    let bytes = fs::read(path)?;
    build_segment_from_bytes(&bytes, sequence, config)
}

pub fn build_segment_from_bytes(bytes: &[u8], sequence: u64, config: &Config) -> Result<Option<Segment>> {
    let expected = bytes.iter().filter(|&&b| b == RECORD_TERMINATOR).count();
    let mut builder = SparseIndexBuilder::for_config(expected, config);
    builder.scan(bytes)?;
    Ok(builder.finish(sequence, bytes.len() as u64))
}

/// Startup rebuild: one index per segment on disk, newest first
///
/// Empty segments are skipped (left on disk); a file name without a
/// sequence number aborts with `InvalidFormat`. The compaction placeholder is
/// never indexed.
pub fn build_all(layout: &SegmentLayout, config: &Config) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();

    for (sequence, path) in layout.list_sequences(AgeOrder::NewestFirst)? {
        if sequence == PLACEHOLDER_SEQUENCE {
            continue;
        }
        match build_segment(&path, sequence, config)? {
            Some(segment) => {
                tracing::info!(
                    "Loaded index of segment {}: {} records, {} indexed",
                    sequence,
                    segment.record_count(),
                    segment.index().len()
                );
                segments.push(segment);
            }
            None => tracing::debug!("Segment {} is empty, not indexed", sequence),
        }
    }

    Ok(segments)
}
