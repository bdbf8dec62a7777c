//! WAL Recovery
//!
//! Handles crash recovery by replaying the WAL.

use std::path::Path;

use crate::error::Result;
use crate::record::Record;

use super::{WalLine, WalReader};

/// Handles WAL recovery after crash
pub struct WalRecovery;

/// Result of a recovery operation
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Number of records successfully recovered
    pub records_recovered: u64,

    /// Number of malformed lines skipped
    pub records_skipped: u64,

    /// Whether an unterminated tail (partial append) was found and dropped
    pub was_truncated: bool,
}

impl WalRecovery {
    /// Recover records from a WAL file, in log order
    ///
    /// Malformed lines are skipped; an unterminated final line is the
    /// remainder of an interrupted append and is dropped. A missing file
    /// recovers nothing.
    pub fn recover(path: &Path) -> Result<(Vec<Record>, RecoveryResult)> {
        let mut result = RecoveryResult::default();
        let mut records = Vec::new();

        if !path.exists() {
            return Ok((records, result));
        }

        for line in WalReader::open(path)? {
            match line? {
                WalLine::Record(record) => {
                    result.records_recovered += 1;
                    records.push(record);
                }
                WalLine::Malformed(raw) => {
                    tracing::warn!("Skipping malformed WAL line '{}'", raw.escape_debug());
                    result.records_skipped += 1;
                }
                WalLine::Partial(len) => {
                    tracing::warn!("Dropping {} byte partial record at WAL tail", len);
                    result.was_truncated = true;
                }
            }
        }

        Ok((records, result))
    }

    /// Inspect a WAL file without collecting its records
    pub fn verify(path: &Path) -> Result<RecoveryResult> {
        let (_, result) = Self::recover(path)?;
        Ok(result)
    }
}
