//! Engine Module
//!
//! The core storage engine that coordinates all components.
//!
//! ## Responsibilities
//! - Coordinate WAL, MemTable, and Storage
//! - Handle concurrent read/write access
//! - Trigger flushes when MemTable is full
//! - Manage crash recovery on startup
//! - Own the background compactor

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::compaction::{BackgroundCompactor, CompactionReport, Compactor};
use crate::config::Config;
use crate::error::{CinderError, Result};
use crate::memtable::MemTable;
use crate::protocol::{Command, Response};
use crate::record::{self, Record};
use crate::storage::StorageManager;
use crate::wal::{WalRecovery, WalWriter};

/// The main storage engine
///
/// ## Concurrency Model
///
/// - **Writes** (put/put_batch): serialized by the `wal` mutex
///   - WAL append → MemTable insert, both under the same guard
///   - A put is visible to every later get once it returns
///
/// - **Flushes**: serialized by `flush_lock`, size checked before and after
///   taking it (double-checked). The flush then holds the `wal` mutex for
///   its whole write segment → clear MemTable → truncate WAL sequence.
///
/// - **Reads** (get/get_range/scan): never take the WAL or flush locks
///   - MemTable is a lock-free SkipMap
///   - Segment files are read under the storage barrier (shared)
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// Write-ahead log for durability (exclusive access needed)
    wal: Mutex<WalWriter>,

    /// In-memory table for recent writes (lock-free reads)
    memtable: MemTable,

    /// Persistent storage manager, shared with the compactor thread
    storage: Arc<StorageManager>,

    /// At most one flush at a time
    flush_lock: Mutex<()>,

    /// Background compaction thread, if enabled
    compactor: Mutex<Option<BackgroundCompactor>>,
}

impl Engine {
    /// Open or create an engine with the given config
    ///
    /// On startup:
    /// 1. Open storage (creates the data directory, rebuilds segment indexes)
    /// 2. Replay the WAL into the MemTable
    /// 3. Flush recovered records so the WAL can be emptied
    /// 4. Start background compaction if enabled
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;

        let storage = Arc::new(StorageManager::open(&config)?);
        let memtable = MemTable::new();
        let wal_path = config.wal_path();

        let (records, recovery) = WalRecovery::recover(&wal_path)?;
        if recovery.records_recovered > 0 || recovery.records_skipped > 0 || recovery.was_truncated {
            tracing::info!(
                "WAL recovery: {} records recovered, {} skipped, partial tail: {}",
                recovery.records_recovered,
                recovery.records_skipped,
                recovery.was_truncated
            );
        }

        for record in records {
            memtable.put(record.key, record.value);
        }

        // Recovered data is durable in a segment before the log is emptied
        if !memtable.is_empty() {
            tracing::info!("Flushing {} recovered records", memtable.entry_count());
            storage.flush(&memtable.records())?;
            memtable.clear();
        }

        let mut wal = WalWriter::open(&wal_path, config.wal_sync_strategy)?;
        wal.truncate()?;

        let compactor = if config.background_compaction {
            Some(BackgroundCompactor::start(Arc::clone(&storage))?)
        } else {
            None
        };

        tracing::info!(
            "Engine opened at {} ({} segments)",
            config.data_dir.display(),
            storage.segment_count()
        );

        Ok(Self {
            config,
            wal: Mutex::new(wal),
            memtable,
            storage,
            flush_lock: Mutex::new(()),
            compactor: Mutex::new(compactor),
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::builder().data_dir(path).build())
    }

    /// Execute a command
    ///
    /// Routes commands to appropriate handlers; failures become ERROR
    /// responses
    pub fn execute(&self, command: Command) -> Response {
        let result = match command {
            Command::Get { key } => self.get(&key).map(|value| match value {
                Some(value) => Response::Value(value),
                None => Response::NotFound,
            }),
            Command::GetRange { from, to } => self.get_range(&from, &to).map(Response::Values),
            Command::Put { records } => self.put_batch(records).map(Response::Stored),
        };

        result.unwrap_or_else(|e| {
            tracing::warn!("Command failed: {}", e);
            Response::from_error(&e)
        })
    }

    // =========================================================================
    // Read Path
    // =========================================================================

    /// Get a value by key
    ///
    /// Search order:
    /// 1. MemTable (most recent writes)
    /// 2. Segments (newest to oldest)
    ///
    /// An I/O failure while reading a segment is returned as an error, never
    /// as a miss.
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        record::validate_key(key)?;

        if let Some(value) = self.memtable.get(key) {
            return Ok(Some(value));
        }
        self.storage.get(key)
    }

    /// Values of every key in `from..=to`, ascending by key
    pub fn get_range(&self, from: &str, to: &str) -> Result<Vec<String>> {
        Ok(self
            .scan(from, to)?
            .into_iter()
            .map(|record| record.value)
            .collect())
    }

    /// Records with `from <= key <= to`, ascending by key, each resolved to
    /// its newest value. An inverted range is empty.
    pub fn scan(&self, from: &str, to: &str) -> Result<Vec<Record>> {
        if from > to {
            return Ok(Vec::new());
        }

        // MemTable entries shadow every segment
        let mut resolved: BTreeMap<String, String> = self
            .memtable
            .sub_range(from, to)
            .into_iter()
            .map(|record| (record.key, record.value))
            .collect();

        self.storage.scan_into(from, to, &mut resolved)?;

        Ok(resolved
            .into_iter()
            .map(|(key, value)| Record { key, value })
            .collect())
    }

    // =========================================================================
    // Write Path
    // =========================================================================

    /// Put a key-value pair
    ///
    /// Steps:
    /// 1. Validate the record
    /// 2. Write to WAL (durability)
    /// 3. Write to MemTable
    /// 4. Flush if a threshold is reached
    ///
    /// The threshold check runs after the insert rather than before the
    /// append, so the write that reaches the threshold flushes immediately
    /// instead of the next one.
    pub fn put(&self, key: &str, value: &str) -> Result<()> {
        let record = self.validated(key, value)?;

        {
            let mut wal = self.wal.lock();
            wal.append(&record)?;
            self.memtable.put(record.key, record.value);
        }

        self.maybe_flush();
        Ok(())
    }

    /// Put several pairs, returning how many were stored
    ///
    /// Every record is validated before any is written.
    pub fn put_batch(&self, records: Vec<Record>) -> Result<usize> {
        let records = records
            .into_iter()
            .map(|r| self.validated(&r.key, &r.value))
            .collect::<Result<Vec<_>>>()?;
        let count = records.len();

        {
            let mut wal = self.wal.lock();
            for record in records {
                wal.append(&record)?;
                self.memtable.put(record.key, record.value);
            }
        }

        self.maybe_flush();
        Ok(count)
    }

    fn validated(&self, key: &str, value: &str) -> Result<Record> {
        if value.len() > self.config.max_value_size {
            return Err(CinderError::ValueTooLarge {
                size: value.len(),
                max: self.config.max_value_size,
            });
        }
        Record::new(key, value)
    }

    fn needs_flush(&self) -> bool {
        self.memtable.entry_count() >= self.config.memtable_flush_threshold
            || self.memtable.size() >= self.config.max_segment_size_bytes()
    }

    /// Double-checked flush after a write. A failed flush is logged; the
    /// records stay in the MemTable and WAL and the next write retries.
    fn maybe_flush(&self) {
        if !self.needs_flush() {
            return;
        }
        let _flush = self.flush_lock.lock();
        if !self.needs_flush() {
            return;
        }
        if let Err(e) = self.flush_internal() {
            tracing::error!("MemTable flush failed: {}", e);
        }
    }

    /// Flush memtable to disk (public API)
    ///
    /// Forces a flush regardless of memtable size. Returns the sequence
    /// number written, or None if the MemTable was empty.
    pub fn flush(&self) -> Result<Option<u64>> {
        let _flush = self.flush_lock.lock();
        self.flush_internal()
    }

    /// Internal flush implementation (called with flush lock held)
    fn flush_internal(&self) -> Result<Option<u64>> {
        // Writers stay out until the WAL is truncated
        let mut wal = self.wal.lock();

        if self.memtable.is_empty() {
            return Ok(None);
        }

        // Step 1: Write the segment and install its index
        let records = self.memtable.records();
        let sequence = self.storage.flush(&records)?;

        // Step 2: Clear memtable
        self.memtable.clear();

        // Step 3: Truncate WAL (records are now durable in the segment)
        wal.truncate()?;

        Ok(Some(sequence))
    }

    /// Run one compaction step synchronously
    pub fn compact(&self) -> Result<Option<CompactionReport>> {
        Compactor::new(Arc::clone(&self.storage)).run_once()
    }

    /// Close the engine gracefully
    ///
    /// Stops the compactor, flushes any pending data and syncs the WAL
    pub fn close(&self) -> Result<()> {
        if let Some(compactor) = self.compactor.lock().take() {
            compactor.stop();
        }

        self.flush()?;
        self.wal.lock().sync()?;

        tracing::info!("Engine closed");
        Ok(())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Get the current memtable size
    pub fn memtable_size(&self) -> usize {
        self.memtable.size()
    }

    /// Get the memtable entry count
    pub fn memtable_entry_count(&self) -> usize {
        self.memtable.entry_count()
    }

    /// Get the number of indexed segments
    pub fn segment_count(&self) -> usize {
        self.storage.segment_count()
    }

    /// Whether the background compactor thread is running
    pub fn is_compacting_in_background(&self) -> bool {
        self.compactor
            .lock()
            .as_ref()
            .map(|c| c.is_running())
            .unwrap_or(false)
    }

    /// Get the storage manager
    pub fn storage(&self) -> &StorageManager {
        &self.storage
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Some(compactor) = self.compactor.get_mut().take() {
            compactor.stop();
        }
    }
}
