//! Write-Ahead Log (WAL) Module
//!
//! Provides durability for MemTable contents that have not been flushed yet.
//!
//! ## Responsibilities
//! - Append every record before it is applied to the MemTable
//! - Truncate once the MemTable has been flushed into a segment
//! - Crash recovery and replay
//!
//! ## File Format
//! The log uses the same record layout as the segments, unsorted and
//! append-only:
//! ```text
//! key1:value1\n
//! key2:value2\n
//! key1:value3\n   <- later records win on replay
//! ```

mod writer;
mod reader;
mod recovery;

pub use writer::WalWriter;
pub use reader::{WalLine, WalReader};
pub use recovery::{WalRecovery, RecoveryResult};
