//! Compaction Module
//!
//! Bounds the number of segments by squashing the oldest ones into one.
//!
//! ## Responsibilities
//! - Select the oldest immutable segments once the count is over the limit
//! - Merge them so the newest value of each key survives
//! - Swap the merged segment in while readers are held off the deleted files
//! - Run the above on a dedicated background thread

mod background;
mod compactor;

pub use background::BackgroundCompactor;
pub use compactor::{CompactionReport, Compactor};
