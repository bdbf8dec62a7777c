//! WAL Writer
//!
//! Handles appending records to the WAL file.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::config::WalSyncStrategy;
use crate::error::Result;
use crate::record::Record;

/// Writes records to the WAL file
pub struct WalWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    sync_strategy: WalSyncStrategy,
    /// Records appended since the last fsync
    unsynced: usize,
    /// Records currently held by the log (reset on truncate)
    record_count: u64,
}

impl WalWriter {
    /// Open or create a WAL file, positioned at its end
    pub fn open(path: &Path, sync_strategy: WalSyncStrategy) -> Result<Self> {
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(path)?;
        file.seek(SeekFrom::End(0))?;

        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            sync_strategy,
            unsynced: 0,
            record_count: 0,
        })
    }

    /// Append a record to the WAL
    ///
    /// The record is handed to the OS before this returns; fsync follows the
    /// configured sync strategy.
    pub fn append(&mut self, record: &Record) -> Result<u64> {
        self.writer.write_all(record.encode().as_bytes())?;
        self.writer.flush()?;

        self.record_count += 1;
        self.unsynced += 1;

        let must_sync = match self.sync_strategy {
            WalSyncStrategy::EveryWrite => true,
            WalSyncStrategy::EveryNEntries { count } => self.unsynced >= count,
        };
        if must_sync {
            self.sync()?;
        }

        Ok(self.record_count)
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        self.unsynced = 0;
        Ok(())
    }

    /// Drop every logged record (their content is durable in a segment now)
    pub fn truncate(&mut self) -> Result<()> {
        self.writer.flush()?;
        let file = self.writer.get_mut();
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.sync_all()?;

        self.unsynced = 0;
        self.record_count = 0;
        Ok(())
    }

    /// Records appended since open or the last truncate
    pub fn record_count(&self) -> u64 {
        self.record_count
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
