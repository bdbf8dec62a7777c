//! Storage Module
//!
//! Persistent storage layer built from append-only text segments.
//!
//! ## Responsibilities
//! - Persist MemTable flushes as sorted segments
//! - Sparse index and bloom filter per segment
//! - Point lookups and range scans, newest segment first
//! - Coordinate readers with compaction file swaps
//!
//! ## File Format
//! ```text
//! <data_dir>/<prefix>-<seq>.<ext>
//! ┌──────────────────────────────┐
//! │ key:value\n                  │
//! │ key:value\n                  │
//! │ ... (sorted by key)          │
//! └──────────────────────────────┘
//! ```
//!
//! A higher sequence number means a newer segment. Sequence 0 is reserved for
//! compaction output before it is renamed into place.

mod barrier;
mod bloom;
mod index;
mod layout;
mod manager;
mod reader;
mod segment;

pub use barrier::{ExclusiveGuard, ReadGuard, SegmentBarrier};
pub use bloom::BloomFilter;
pub use index::{build_all, build_segment, record_start, SegmentIndex, SparseIndexBuilder};
pub use layout::{AgeOrder, SegmentLayout, PLACEHOLDER_SEQUENCE};
pub use manager::{SegmentList, StorageManager};
pub use reader::RawSegmentReader;
pub use segment::{encode_record_slice, encode_records, write_segment_file, EncodedSegment, Segment};
