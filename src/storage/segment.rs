//! Segment metadata and the flush-time segment encoder

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use crate::config::Config;
use crate::error::Result;
use crate::record::{self, Record};

use super::bloom::BloomFilter;
use super::index::{SegmentIndex, SparseIndexBuilder};

/// An immutable segment as the read path sees it: its sequence number, the
/// sparse index and bloom filter built over its records, and its size.
#[derive(Debug, Clone)]
pub struct Segment {
    sequence: u64,
    index: SegmentIndex,
    bloom: BloomFilter,
    len: u64,
    record_count: usize,
}

impl Segment {
    pub fn new(sequence: u64, index: SegmentIndex, bloom: BloomFilter, len: u64, record_count: usize) -> Self {
        Self {
            sequence,
            index,
            bloom,
            len,
            record_count,
        }
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn index(&self) -> &SegmentIndex {
        &self.index
    }

    /// File size in bytes
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn record_count(&self) -> usize {
        self.record_count
    }

    /// False only if the key is definitely not in this segment
    pub fn may_contain(&self, key: &str) -> bool {
        self.bloom.may_contain(key.as_bytes())
    }

    /// Same segment under a different sequence number (compaction output
    /// renamed from the placeholder)
    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }
}

/// Encoded segment content plus the segment built over it
pub struct EncodedSegment {
    pub bytes: Vec<u8>,
    pub segment: Option<Segment>,
}

/// Concatenate sorted records into one `key:value\n` buffer, computing each
/// value's offset within the buffer as it is appended
pub fn encode_records<'a, I>(sequence: u64, records: I, expected: usize, config: &Config) -> EncodedSegment
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut builder = SparseIndexBuilder::for_config(expected, config);
    let mut buf = String::new();

    for (key, value) in records {
        let value_offset = (buf.len() + key.len() + 1) as u64;
        builder.observe(key, value_offset);
        buf.push_str(&record::encode(key, value));
    }

    let len = buf.len() as u64;
    EncodedSegment {
        segment: builder.finish(sequence, len),
        bytes: buf.into_bytes(),
    }
}

/// Flush-side convenience over a record slice
pub fn encode_record_slice(sequence: u64, records: &[Record], config: &Config) -> EncodedSegment {
    encode_records(
        sequence,
        records.iter().map(|r| (r.key.as_str(), r.value.as_str())),
        records.len(),
        config,
    )
}

/// Truncate-then-write a segment file and fsync it
pub fn write_segment_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(())
}
