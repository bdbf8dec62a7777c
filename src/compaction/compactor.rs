//! Compactor - one squash step over the oldest segments.
//!
//! 1. List segment files; do nothing unless the count exceeds the maximum
//! 2. Select the oldest `compaction_batch_size` immutable segments
//! 3. Materialize them oldest-first so the newest value of every key wins
//! 4. Write the merged, sorted output under the placeholder sequence
//! 5. Index the output
//! 6. Under the exclusive barrier: rename the output over the oldest input,
//!    swap the segment list, delete the remaining inputs

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use crate::error::Result;
use crate::storage::{self, AgeOrder, StorageManager, PLACEHOLDER_SEQUENCE};

/// Outcome of a squash step that did something
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactionReport {
    /// Sequence numbers merged, oldest first
    pub inputs: Vec<u64>,
    /// Sequence number the merged segment now lives under
    pub output: u64,
    /// Distinct keys written
    pub records_written: usize,
    pub bytes_written: u64,
}

/// Executes squash steps against one storage manager
pub struct Compactor {
    storage: Arc<StorageManager>,
}

impl Compactor {
    pub fn new(storage: Arc<StorageManager>) -> Self {
        Self { storage }
    }

    /// Run one squash step. Returns None when the segment count is within
    /// bounds or fewer than two segments qualify.
    pub fn run_once(&self) -> Result<Option<CompactionReport>> {
        let _running = self.storage.compaction_lock();
        let selected = match self.select()? {
            Some(selected) => selected,
            None => return Ok(None),
        };

        let placeholder = self.storage.layout().placeholder_path();
        match self.squash(&selected) {
            Ok(report) => Ok(Some(report)),
            Err(e) => {
                if placeholder.exists() {
                    if let Err(cleanup) = fs::remove_file(&placeholder) {
                        tracing::warn!(
                            "Failed to remove compaction output {}: {}",
                            placeholder.display(),
                            cleanup
                        );
                    }
                }
                Err(e)
            }
        }
    }

    /// Oldest immutable segments, if the directory holds too many
    fn select(&self) -> Result<Option<Vec<(u64, PathBuf)>>> {
        let config = self.storage.config();
        let layout = self.storage.layout();
        let active = self.storage.active_sequence();

        let files = layout.list_sequences(AgeOrder::OldestFirst)?;
        if files.len() <= config.max_segment_count {
            return Ok(None);
        }

        let selected: Vec<_> = files
            .into_iter()
            .filter(|(sequence, _)| *sequence != PLACEHOLDER_SEQUENCE && *sequence < active)
            .take(config.compaction_batch_size)
            .collect();

        if selected.len() < 2 {
            return Ok(None);
        }
        Ok(Some(selected))
    }

    fn squash(&self, selected: &[(u64, PathBuf)]) -> Result<CompactionReport> {
        let started = Instant::now();
        let config = self.storage.config();
        let layout = self.storage.layout();
        let reader = self.storage.reader();

        // Oldest first: each later (newer) segment overwrites older values
        let mut merged: BTreeMap<String, String> = BTreeMap::new();
        for (sequence, path) in selected {
            let content = reader.materialize_all(path)?;
            tracing::debug!("Materialized segment {}: {} keys", sequence, content.len());
            merged.extend(content);
        }

        let placeholder = layout.placeholder_path();
        let encoded = storage::encode_records(
            PLACEHOLDER_SEQUENCE,
            merged.iter().map(|(k, v)| (k.as_str(), v.as_str())),
            merged.len(),
            config,
        );
        storage::write_segment_file(&placeholder, &encoded.bytes)?;

        // Re-derive the index from the written file, as a restart would
        let segment = storage::build_segment(&placeholder, PLACEHOLDER_SEQUENCE, config)?;

        let (output, oldest_path) = (selected[0].0, &selected[0].1);
        let inputs: Vec<u64> = selected.iter().map(|(sequence, _)| *sequence).collect();

        {
            let _exclusive = self.storage.barrier().exclusive();

            // The list is swapped before the deletes; an input whose delete
            // fails is no longer read but is indexed again on restart.
            fs::rename(&placeholder, oldest_path)?;
            self.storage
                .install_compacted(&inputs, segment.map(|s| s.with_sequence(output)));

            for (_, path) in &selected[1..] {
                fs::remove_file(path)?;
            }
        }

        let report = CompactionReport {
            inputs,
            output,
            records_written: merged.len(),
            bytes_written: encoded.bytes.len() as u64,
        };
        tracing::info!(
            "Compacted segments {:?} into segment {} ({} records, {} bytes) in {:?}",
            report.inputs,
            report.output,
            report.records_written,
            report.bytes_written,
            started.elapsed()
        );
        Ok(report)
    }
}
