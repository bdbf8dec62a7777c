//! WAL Reader
//!
//! Reads the WAL back one line at a time.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::Result;
use crate::record::{Record, RECORD_TERMINATOR};

/// One line read back from the log
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalLine {
    /// A complete, well-formed record
    Record(Record),
    /// A terminated line that does not parse as `key:value`
    Malformed(String),
    /// Trailing bytes without a terminator (interrupted append)
    Partial(usize),
}

/// Reads entries from the WAL file
pub struct WalReader {
    reader: BufReader<File>,
    buf: Vec<u8>,
}

impl WalReader {
    /// Open a WAL file for reading
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            reader: BufReader::new(File::open(path)?),
            buf: Vec::new(),
        })
    }

    /// Read the next line from the WAL
    pub fn next_line(&mut self) -> Result<Option<WalLine>> {
        self.buf.clear();
        let read = self.reader.read_until(RECORD_TERMINATOR, &mut self.buf)?;
        if read == 0 {
            return Ok(None);
        }

        if self.buf.last() != Some(&RECORD_TERMINATOR) {
            return Ok(Some(WalLine::Partial(self.buf.len())));
        }

        let line = &self.buf[..self.buf.len() - 1];
        let line = match std::str::from_utf8(line) {
            Ok(line) => line,
            Err(_) => {
                return Ok(Some(WalLine::Malformed(
                    String::from_utf8_lossy(line).into_owned(),
                )))
            }
        };

        Ok(Some(match Record::parse_line(line) {
            Some(record) => WalLine::Record(record),
            None => WalLine::Malformed(line.to_string()),
        }))
    }
}

impl Iterator for WalReader {
    type Item = Result<WalLine>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_line().transpose()
    }
}
