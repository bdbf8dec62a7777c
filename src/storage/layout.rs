//! Segment naming and layout
//!
//! Pure mapping between sequence numbers and `<prefix>-<seq>.<ext>` file
//! paths inside the data directory.

use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::{CinderError, Result};

/// Sequence number reserved for the temporary output of a compaction
pub const PLACEHOLDER_SEQUENCE: u64 = 0;

/// Sort direction for segment lists
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgeOrder {
    OldestFirst,
    NewestFirst,
}

/// Where segments live and how they are named
#[derive(Debug, Clone)]
pub struct SegmentLayout {
    dir: PathBuf,
    prefix: String,
    extension: String,
}

impl SegmentLayout {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            extension: extension.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.data_dir,
            &config.segment_prefix,
            &config.segment_extension,
        )
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// "cache-data-42.seg" inside the data directory
    pub fn path_for(&self, sequence: u64) -> PathBuf {
        self.dir
            .join(format!("{}-{}.{}", self.prefix, sequence, self.extension))
    }

    pub fn placeholder_path(&self) -> PathBuf {
        self.path_for(PLACEHOLDER_SEQUENCE)
    }

    /// Whether the file carries the segment extension
    pub fn is_segment_file(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| ext.to_string_lossy() == self.extension.as_str())
            .unwrap_or(false)
    }

    /// Parse the sequence number of a `<prefix>-<seq>.<ext>` file name.
    /// Anything `path_for` would not produce, such as a foreign prefix or
    /// zero-padded digits, is `InvalidFormat`.
    pub fn sequence_of(&self, path: &Path) -> Result<u64> {
        let invalid = || CinderError::InvalidFormat(path.display().to_string());

        let name = path.file_name().ok_or_else(invalid)?.to_string_lossy();
        let digits = name
            .strip_prefix(self.prefix.as_str())
            .and_then(|rest| rest.strip_prefix('-'))
            .and_then(|rest| rest.strip_suffix(self.extension.as_str()))
            .and_then(|rest| rest.strip_suffix('.'))
            .ok_or_else(invalid)?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let sequence: u64 = digits.parse().map_err(|_| invalid())?;
        if sequence.to_string() != digits {
            return Err(invalid());
        }
        Ok(sequence)
    }

    /// Order two segment files by age. Files without a parseable sequence
    /// number fail the comparison.
    pub fn compare_by_age(&self, a: &Path, b: &Path, order: AgeOrder) -> Result<Ordering> {
        let ordering = self.sequence_of(a)?.cmp(&self.sequence_of(b)?);
        Ok(match order {
            AgeOrder::OldestFirst => ordering,
            AgeOrder::NewestFirst => ordering.reverse(),
        })
    }

    /// Every file in the data directory with the segment extension, unsorted
    pub fn list_segment_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.is_file() && self.is_segment_file(&path) {
                files.push(path);
            }
        }
        Ok(files)
    }

    /// Segment files paired with their sequence numbers, sorted by age.
    /// Any unparseable name is an `InvalidFormat` error.
    pub fn list_sequences(&self, order: AgeOrder) -> Result<Vec<(u64, PathBuf)>> {
        let mut segments = self
            .list_segment_files()?
            .into_iter()
            .map(|path| Ok((self.sequence_of(&path)?, path)))
            .collect::<Result<Vec<_>>>()?;

        segments.sort_by_key(|(sequence, _)| *sequence);
        if order == AgeOrder::NewestFirst {
            segments.reverse();
        }
        Ok(segments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> SegmentLayout {
        SegmentLayout::new("/data", "cache-data", "seg")
    }

    #[test]
    fn test_path_round_trips_through_sequence() {
        let layout = layout();
        let path = layout.path_for(42);
        assert_eq!(path, PathBuf::from("/data/cache-data-42.seg"));
        assert_eq!(layout.sequence_of(&path).unwrap(), 42);
    }

    #[test]
    fn test_invalid_names() {
        let layout = layout();
        for name in [
            "/data/cache-data.seg",
            "/data/cache-data-x1.seg",
            "/data/cache-data-.seg",
            "/data/backup-3.seg",
            "/data/cache-data-007.seg",
            "/data/cache-data-+7.seg",
            "/data/old-cache-data-3.seg",
        ] {
            let err = layout.sequence_of(Path::new(name)).unwrap_err();
            assert!(matches!(err, CinderError::InvalidFormat(_)), "{}", name);
        }
    }

    #[test]
    fn test_placeholder_and_large_sequences_parse() {
        let layout = layout();
        assert_eq!(layout.sequence_of(&layout.placeholder_path()).unwrap(), 0);
        assert_eq!(layout.sequence_of(&layout.path_for(u64::MAX)).unwrap(), u64::MAX);
    }

    #[test]
    fn test_compare_by_age() {
        let layout = layout();
        let old = layout.path_for(2);
        let new = layout.path_for(10);
        assert_eq!(
            layout.compare_by_age(&old, &new, AgeOrder::OldestFirst).unwrap(),
            Ordering::Less
        );
        assert_eq!(
            layout.compare_by_age(&old, &new, AgeOrder::NewestFirst).unwrap(),
            Ordering::Greater
        );
    }
}
