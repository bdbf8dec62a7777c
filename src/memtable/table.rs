//! MemTable implementation
//!
//! SkipMap-based memtable with atomic size tracking.

use std::ops::Bound;
use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_skiplist::SkipMap;

use crate::record::{self, Record};

/// In-memory table for recent writes
///
/// Writers are expected to be serialized by the caller (the engine holds the
/// WAL lock across append + insert); readers never block.
pub struct MemTable {
    data: SkipMap<String, String>,
    /// Sum of `key:value\n` lengths currently held
    size: AtomicUsize,
}

impl MemTable {
    /// Create a new empty MemTable
    pub fn new() -> Self {
        Self {
            data: SkipMap::new(),
            size: AtomicUsize::new(0),
        }
    }

    /// Get a value by key
    pub fn get(&self, key: &str) -> Option<String> {
        self.data.get(key).map(|entry| entry.value().clone())
    }

    /// Insert or overwrite a key, returning the new encoded size
    pub fn put(&self, key: String, value: String) -> usize {
        let added = record::encoded_len(&key, &value);
        let removed = self
            .data
            .get(key.as_str())
            .map(|entry| record::encoded_len(entry.key(), entry.value()))
            .unwrap_or(0);

        self.data.insert(key, value);

        if removed > 0 {
            self.size.fetch_sub(removed, Ordering::SeqCst);
        }
        self.size.fetch_add(added, Ordering::SeqCst) + added
    }

    /// Records with `from <= key <= to`, in ascending key order
    pub fn sub_range(&self, from: &str, to: &str) -> Vec<Record> {
        if from > to {
            return Vec::new();
        }
        self.data
            .range::<str, _>((Bound::Included(from), Bound::Included(to)))
            .map(|entry| Record {
                key: entry.key().clone(),
                value: entry.value().clone(),
            })
            .collect()
    }

    /// Snapshot of every record in ascending key order (for flush)
    pub fn records(&self) -> Vec<Record> {
        self.data
            .iter()
            .map(|entry| Record {
                key: entry.key().clone(),
                value: entry.value().clone(),
            })
            .collect()
    }

    /// Approximate encoded size in bytes
    pub fn size(&self) -> usize {
        self.size.load(Ordering::SeqCst)
    }

    pub fn entry_count(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Clear all entries (after successful flush)
    pub fn clear(&self) {
        self.data.clear();
        self.size.store(0, Ordering::SeqCst);
    }
}

impl Default for MemTable {
    fn default() -> Self {
        Self::new()
    }
}
