//! MemTable Module
//!
//! In-memory data structure for recent writes.
//!
//! ## Responsibilities
//! - Fast reads and writes in memory
//! - Lock-free reads concurrent with writers and flushes
//! - Track entry count and encoded size for flush triggers
//! - Ordered iteration for segment creation and range queries
//!
//! ## Data Structure Choice
//! `crossbeam_skiplist::SkipMap`: ordered keys (required for segment
//! generation and inclusive sub-ranges) and reads that never take a lock.

mod table;

pub use table::MemTable;
