//! Raw Segment Reader
//!
//! Byte-range reads against segment files. Every call opens, reads and closes
//! its own file handle; nothing is held across calls.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::{CinderError, Result};
use crate::record::{Record, RECORD_TERMINATOR};

use super::layout::SegmentLayout;

/// Reads slices of segment files as UTF-8 text
#[derive(Debug, Clone)]
pub struct RawSegmentReader {
    layout: SegmentLayout,
    max_value_size: usize,
}

impl RawSegmentReader {
    pub fn new(layout: SegmentLayout, max_value_size: usize) -> Self {
        Self {
            layout,
            max_value_size,
        }
    }

    pub fn layout(&self) -> &SegmentLayout {
        &self.layout
    }

    /// Current length of a segment file
    pub fn segment_len(&self, sequence: u64) -> Result<u64> {
        Ok(fs::metadata(self.layout.path_for(sequence))?.len())
    }

    /// Read bytes `from..=to_inclusive`
    pub fn read_range(&self, sequence: u64, from: u64, to_inclusive: u64) -> Result<String> {
        if from > to_inclusive {
            return Err(CinderError::Corruption(format!(
                "invalid byte range {}..={} for segment {}",
                from, to_inclusive, sequence
            )));
        }
        let mut file = File::open(self.layout.path_for(sequence))?;
        file.seek(SeekFrom::Start(from))?;

        let mut buf = vec![0u8; (to_inclusive - from + 1) as usize];
        file.read_exact(&mut buf)?;
        decode(sequence, buf)
    }

    /// Read from `from` to the end of the file
    pub fn read_from(&self, sequence: u64, from: u64) -> Result<String> {
        let mut file = File::open(self.layout.path_for(sequence))?;
        file.seek(SeekFrom::Start(from))?;

        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;
        decode(sequence, buf)
    }

    /// Read bytes `0..=to_inclusive`
    pub fn read_to(&self, sequence: u64, to_inclusive: u64) -> Result<String> {
        self.read_range(sequence, 0, to_inclusive)
    }

    /// Read the value starting at `offset`, up to its terminator
    ///
    /// At most `max_value_size + 1` bytes are read. A value that runs past that
    /// bound without a terminator is reported as corruption rather than
    /// silently truncated; a value ending at EOF without a terminator is
    /// returned as-is.
    pub fn read_single_value(&self, sequence: u64, offset: u64) -> Result<String> {
        let mut file = File::open(self.layout.path_for(sequence))?;
        file.seek(SeekFrom::Start(offset))?;

        let limit = self.max_value_size as u64 + 1;
        let mut buf = Vec::with_capacity(limit as usize);
        file.take(limit).read_to_end(&mut buf)?;

        match buf.iter().position(|&b| b == RECORD_TERMINATOR) {
            Some(end) => {
                buf.truncate(end);
                decode(sequence, buf)
            }
            None if (buf.len() as u64) < limit => decode(sequence, buf),
            None => Err(CinderError::Corruption(format!(
                "value at offset {} of segment {} exceeds {} bytes",
                offset, sequence, self.max_value_size
            ))),
        }
    }

    /// Full key -> value content of a segment file. The last occurrence of a
    /// duplicate key wins; lines without a separator are skipped.
    pub fn materialize_all(&self, segment_file: &Path) -> Result<BTreeMap<String, String>> {
        let text = String::from_utf8(fs::read(segment_file)?).map_err(|_| {
            CinderError::Corruption(format!("{} is not valid UTF-8", segment_file.display()))
        })?;

        let mut content = BTreeMap::new();
        for line in text.split_terminator(RECORD_TERMINATOR as char) {
            match Record::parse_line(line) {
                Some(record) => {
                    content.insert(record.key, record.value);
                }
                None => tracing::warn!(
                    "Skipping malformed line in {}: '{}'",
                    segment_file.display(),
                    line.escape_debug()
                ),
            }
        }
        Ok(content)
    }
}

fn decode(sequence: u64, buf: Vec<u8>) -> Result<String> {
    String::from_utf8(buf)
        .map_err(|_| CinderError::Corruption(format!("segment {} holds invalid UTF-8", sequence)))
}
