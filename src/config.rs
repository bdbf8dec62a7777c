//! Configuration for CinderKV
//!
//! Centralized configuration with sensible defaults. A `Config` is built once
//! (from the builder or a properties file) and handed to every component at
//! construction; nothing inside the engine reads process-wide state.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{CinderError, Result};

/// Main configuration for a CinderKV instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Directory holding the segment files and the write-ahead log
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── wal.log                 (write-ahead log)
    ///     ├── cache-data-1.seg        (segments)
    ///     └── cache-data-2.seg
    pub data_dir: PathBuf,

    /// Segment file name prefix (`<prefix>-<seq>.<ext>`)
    pub segment_prefix: String,

    /// Segment file extension, without the dot
    pub segment_extension: String,

    /// Segment count above which the compactor squashes the oldest segments
    pub max_segment_count: usize,

    /// Encoded MemTable size (KB) that forces a flush into a new segment
    pub max_segment_size_kb: u64,

    /// Largest value accepted by `put`; bounds single-value reads
    pub max_value_size: usize,

    /// Every Nth record of a segment is recorded in its sparse index
    pub sparse_index_interval: usize,

    /// Target false positive rate of the per-segment bloom filters
    pub bloom_false_positive_rate: f64,

    // -------------------------------------------------------------------------
    // Compaction Configuration
    // -------------------------------------------------------------------------
    /// How many of the oldest segments are merged per squash step
    pub compaction_batch_size: usize,

    /// Delay between two polls of the data directory
    pub compaction_poll_interval_ms: u64,

    /// Whether `Engine::open` starts the background compactor thread
    pub background_compaction: bool,

    // -------------------------------------------------------------------------
    // WAL / MemTable Configuration
    // -------------------------------------------------------------------------
    /// File name of the write-ahead log inside `data_dir`
    pub wal_file_name: String,

    /// Sync strategy: how often to fsync WAL
    pub wal_sync_strategy: WalSyncStrategy,

    /// MemTable entry count that triggers a flush
    pub memtable_flush_threshold: usize,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address
    pub listen_addr: String,

    /// Max concurrent client connections
    pub max_connections: usize,

    /// Connection read timeout (milliseconds, 0 = none)
    pub read_timeout_ms: u64,

    /// Connection write timeout (milliseconds, 0 = none)
    pub write_timeout_ms: u64,
}

/// WAL sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalSyncStrategy {
    /// fsync after every write (safest, slowest)
    EveryWrite,

    /// fsync after N uncommitted entries (balanced durability/performance)
    EveryNEntries { count: usize },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./cinderkv_data"),
            segment_prefix: "cache-data".to_string(),
            segment_extension: "seg".to_string(),
            max_segment_count: 10,
            max_segment_size_kb: 64,
            max_value_size: 4096,
            sparse_index_interval: 100,
            bloom_false_positive_rate: 0.01,
            compaction_batch_size: 5,
            compaction_poll_interval_ms: 100,
            background_compaction: true,
            wal_file_name: "wal.log".to_string(),
            wal_sync_strategy: WalSyncStrategy::EveryNEntries { count: 100 },
            memtable_flush_threshold: 5000,
            listen_addr: "127.0.0.1:4421".to_string(),
            max_connections: 1024,
            read_timeout_ms: 0,
            write_timeout_ms: 0,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Full path of the write-ahead log
    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join(&self.wal_file_name)
    }

    /// Size in bytes at which the MemTable is flushed regardless of entry count
    pub fn max_segment_size_bytes(&self) -> usize {
        (self.max_segment_size_kb as usize).saturating_mul(1024)
    }

    /// Load a properties file (`key=value` per line)
    pub fn from_properties_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            CinderError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_properties_str(&text)
    }

    /// Parse properties text on top of the defaults
    pub fn from_properties_str(text: &str) -> Result<Self> {
        let mut config = Config::default();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }

            let (key, value) = match line.find(['=', ':']) {
                Some(pos) => (line[..pos].trim(), line[pos + 1..].trim()),
                None => {
                    return Err(CinderError::Config(format!(
                        "property line without separator: '{}'",
                        line
                    )))
                }
            };

            config.apply_property(key, value)?;
        }

        config.validate()?;
        Ok(config)
    }

    fn apply_property(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "data.directory.location" => self.data_dir = PathBuf::from(value),
            "data.files.extension" => self.segment_extension = value.trim_start_matches('.').to_string(),
            "data.files.prefix" => self.segment_prefix = value.to_string(),
            "data.files.max.amount" => self.max_segment_count = parse_number(key, value)?,
            "data.files.max.kilobytes.size" => self.max_segment_size_kb = parse_number(key, value)?,
            "data.values.max.bytes" => self.max_value_size = parse_number(key, value)?,
            "memtable.flush.threshold" => self.memtable_flush_threshold = parse_number(key, value)?,
            "index.sparsity" => self.sparse_index_interval = parse_number(key, value)?,
            "compaction.batch.size" => self.compaction_batch_size = parse_number(key, value)?,
            "compaction.poll.millis" => self.compaction_poll_interval_ms = parse_number(key, value)?,
            "compaction.background" => {
                self.background_compaction = value.parse().map_err(|_| {
                    CinderError::Config(format!("property '{}' must be true or false, got '{}'", key, value))
                })?
            }
            "wal.file.name" => self.wal_file_name = value.to_string(),
            "wal.sync.every" => {
                let count: usize = parse_number(key, value)?;
                self.wal_sync_strategy = if count <= 1 {
                    WalSyncStrategy::EveryWrite
                } else {
                    WalSyncStrategy::EveryNEntries { count }
                };
            }
            "bloom.false.positive.rate" => {
                self.bloom_false_positive_rate = value.parse().map_err(|_| {
                    CinderError::Config(format!("property '{}' must be a number, got '{}'", key, value))
                })?
            }
            "server.listen.address" => self.listen_addr = value.to_string(),
            "server.max.connections" => self.max_connections = parse_number(key, value)?,
            "server.read.timeout.millis" => self.read_timeout_ms = parse_number(key, value)?,
            "server.write.timeout.millis" => self.write_timeout_ms = parse_number(key, value)?,
            _ => tracing::debug!("Ignoring unknown property '{}'", key),
        }
        Ok(())
    }

    /// Reject configurations the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.segment_extension.is_empty() {
            return Err(CinderError::Config("segment extension must not be empty".to_string()));
        }
        if self.segment_prefix.is_empty() || self.segment_prefix.contains('.') {
            return Err(CinderError::Config(format!(
                "invalid segment prefix '{}'",
                self.segment_prefix
            )));
        }
        if self.memtable_flush_threshold == 0 {
            return Err(CinderError::Config("memtable flush threshold must be > 0".to_string()));
        }
        if self.max_segment_size_kb == 0 {
            return Err(CinderError::Config("max segment size must be > 0".to_string()));
        }
        if self.sparse_index_interval == 0 {
            return Err(CinderError::Config("sparse index interval must be > 0".to_string()));
        }
        if self.max_value_size == 0 {
            return Err(CinderError::Config("max value size must be > 0".to_string()));
        }
        if self.compaction_batch_size < 2 {
            return Err(CinderError::Config("compaction batch size must be >= 2".to_string()));
        }
        if !(self.bloom_false_positive_rate > 0.0 && self.bloom_false_positive_rate < 1.0) {
            return Err(CinderError::Config(
                "bloom false positive rate must be in (0, 1)".to_string(),
            ));
        }
        let segment_suffix = format!(".{}", self.segment_extension);
        if self.wal_file_name.is_empty() || self.wal_file_name.ends_with(&segment_suffix) {
            return Err(CinderError::Config(format!(
                "WAL file name '{}' collides with the segment extension",
                self.wal_file_name
            )));
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| {
        CinderError::Config(format!(
            "Unable to parse property '{}' - the value must be a valid integer number, but provided: '{}'",
            key, value
        ))
    })
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all storage)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    pub fn segment_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.segment_prefix = prefix.into();
        self
    }

    pub fn segment_extension(mut self, extension: impl Into<String>) -> Self {
        self.config.segment_extension = extension.into();
        self
    }

    /// Set the segment count that triggers compaction
    pub fn max_segment_count(mut self, count: usize) -> Self {
        self.config.max_segment_count = count;
        self
    }

    pub fn max_segment_size_kb(mut self, kb: u64) -> Self {
        self.config.max_segment_size_kb = kb;
        self
    }

    pub fn max_value_size(mut self, bytes: usize) -> Self {
        self.config.max_value_size = bytes;
        self
    }

    /// Index every Nth record of each segment
    pub fn sparse_index_interval(mut self, interval: usize) -> Self {
        self.config.sparse_index_interval = interval;
        self
    }

    pub fn bloom_false_positive_rate(mut self, rate: f64) -> Self {
        self.config.bloom_false_positive_rate = rate;
        self
    }

    pub fn compaction_batch_size(mut self, size: usize) -> Self {
        self.config.compaction_batch_size = size;
        self
    }

    pub fn compaction_poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.compaction_poll_interval_ms = ms;
        self
    }

    /// Enable or disable the background compactor thread
    pub fn background_compaction(mut self, enabled: bool) -> Self {
        self.config.background_compaction = enabled;
        self
    }

    pub fn wal_file_name(mut self, name: impl Into<String>) -> Self {
        self.config.wal_file_name = name.into();
        self
    }

    /// Set the WAL sync strategy
    pub fn wal_sync_strategy(mut self, strategy: WalSyncStrategy) -> Self {
        self.config.wal_sync_strategy = strategy;
        self
    }

    /// Set the MemTable entry count that triggers a flush
    pub fn memtable_flush_threshold(mut self, entries: usize) -> Self {
        self.config.memtable_flush_threshold = entries;
        self
    }

    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the maximum number of concurrent connections
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
