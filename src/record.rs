//! Record definitions
//!
//! A record is a `(key, value)` pair of opaque strings, serialized on disk
//! (segments and WAL alike) as `key:value\n`.

use crate::error::{CinderError, Result};

/// Separates key from value on disk
pub const KEY_VALUE_SEPARATOR: u8 = b':';

/// Terminates a record on disk
pub const RECORD_TERMINATOR: u8 = b'\n';

/// A single key-value pair
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Record {
    pub key: String,
    pub value: String,
}

impl Record {
    /// Create a validated record
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Result<Self> {
        let record = Self {
            key: key.into(),
            value: value.into(),
        };
        validate_key(&record.key)?;
        validate_value(&record.value)?;
        Ok(record)
    }

    /// Serialize as `key:value\n`
    pub fn encode(&self) -> String {
        encode(&self.key, &self.value)
    }

    /// Length of the serialized form in bytes
    pub fn encoded_len(&self) -> usize {
        encoded_len(&self.key, &self.value)
    }

    /// Parse one line (without its terminator). Returns None if the line
    /// carries no separator or an empty key.
    pub fn parse_line(line: &str) -> Option<Self> {
        let (key, value) = line.split_once(KEY_VALUE_SEPARATOR as char)?;
        if key.is_empty() {
            return None;
        }
        Some(Self {
            key: key.to_string(),
            value: value.to_string(),
        })
    }
}

/// Serialize a key/value pair as `key:value\n`
pub fn encode(key: &str, value: &str) -> String {
    let mut line = String::with_capacity(encoded_len(key, value));
    line.push_str(key);
    line.push(KEY_VALUE_SEPARATOR as char);
    line.push_str(value);
    line.push(RECORD_TERMINATOR as char);
    line
}

pub fn encoded_len(key: &str, value: &str) -> usize {
    key.len() + value.len() + 2
}

pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(CinderError::InvalidRecord("key must not be empty".to_string()));
    }
    if key.bytes().any(is_reserved) {
        return Err(CinderError::InvalidRecord(format!(
            "key '{}' contains ':' or a newline",
            key.escape_debug()
        )));
    }
    Ok(())
}

pub fn validate_value(value: &str) -> Result<()> {
    if value.bytes().any(is_reserved) {
        return Err(CinderError::InvalidRecord(format!(
            "value '{}' contains ':' or a newline",
            value.escape_debug()
        )));
    }
    Ok(())
}

fn is_reserved(byte: u8) -> bool {
    byte == KEY_VALUE_SEPARATOR || byte == RECORD_TERMINATOR || byte == b'\r'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_layout() {
        let record = Record::new("key", "value").unwrap();
        assert_eq!(record.encode(), "key:value\n");
        assert_eq!(record.encoded_len(), 10);
    }

    #[test]
    fn test_reserved_characters_rejected() {
        assert!(Record::new("a:b", "v").is_err());
        assert!(Record::new("a", "line\nbreak").is_err());
        assert!(Record::new("", "v").is_err());
        assert!(Record::new("a", "").is_ok());
    }

    #[test]
    fn test_parse_line() {
        assert_eq!(
            Record::parse_line("k:v"),
            Some(Record { key: "k".into(), value: "v".into() })
        );
        assert_eq!(Record::parse_line("no separator"), None);
        assert_eq!(Record::parse_line(":orphan"), None);
    }
}
