//! # CinderKV
//!
//! An embedded, log-structured key-value store with:
//! - Write-Ahead Logging (WAL) for durability
//! - Crash recovery by replaying the WAL
//! - Sparse per-segment indexes and bloom filters
//! - Background compaction of old segments
//! - Line-based TCP client protocol
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      TCP Server                              │
//! │              (one thread per connection)                     │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                       Engine                                 │
//! │         (serialized writes / lock-free MemTable reads)       │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │     WAL     │          │  MemTable   │
//!   │  (Append)   │          │  (SkipMap)  │
//!   └─────────────┘          └──────┬──────┘
//!                                   │ flush
//!                                   ▼
//!                           ┌─────────────┐      ┌─────────────┐
//!                           │   Storage   │◄─────│  Compactor  │
//!                           │ (segments)  │      │ (background)│
//!                           └─────────────┘      └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod record;

pub mod compaction;
pub mod engine;
pub mod memtable;
pub mod network;
pub mod protocol;
pub mod storage;
pub mod wal;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use config::{Config, WalSyncStrategy};
pub use engine::Engine;
pub use error::{CinderError, Result};
pub use record::Record;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of CinderKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
