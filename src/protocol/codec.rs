//! Protocol codec
//!
//! Parsing and rendering of request and response lines.
//!
//! ## Request Grammar
//! ```text
//! request  := "GET" SP key
//!           | "GET" SP from "-" to
//!           | "PUT" SP pair (";" pair)*
//! pair     := key "," value
//! ```
//!
//! Keys and values are trimmed of surrounding whitespace. A point-lookup key
//! therefore never contains '-'.

use std::io::{BufRead, Read, Write};

use crate::error::{CinderError, Result};
use crate::record::{self, Record};

use super::response::NOT_FOUND;
use super::{Command, Response};

/// Longest request or response line accepted, terminator included
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

const ERROR_PREFIX: &str = "ERROR: ";
const VALUES_PREFIX: &str = "VALUES ";
const STORED_PREFIX: &str = "OK ";

// =============================================================================
// Command Parsing/Encoding
// =============================================================================

/// Parse one request line (terminator optional)
pub fn parse_command(line: &str) -> Result<Command> {
    let line = line.trim();
    let (keyword, args) = match line.split_once(' ') {
        Some((keyword, args)) => (keyword, args.trim()),
        None => (line, ""),
    };

    match keyword {
        "GET" => parse_get(line, args),
        "PUT" => parse_put(line, args),
        "" => Err(CinderError::Protocol("Empty request".to_string())),
        other => Err(CinderError::Protocol(format!("Unknown command '{}'", other))),
    }
}

fn parse_get(line: &str, args: &str) -> Result<Command> {
    if args.is_empty() {
        return Err(CinderError::Protocol(format!("Input '{}' is invalid", line)));
    }

    let (from, to) = match args.split_once('-') {
        Some((from, to)) => (from.trim(), to.trim()),
        None => {
            record::validate_key(args).map_err(|e| CinderError::Protocol(e.to_string()))?;
            return Ok(Command::Get {
                key: args.to_string(),
            });
        }
    };

    if from.is_empty() || to.is_empty() || to.contains('-') || from >= to {
        return Err(CinderError::Protocol(format!(
            "Range request '{}' is not valid",
            line
        )));
    }

    Ok(Command::GetRange {
        from: from.to_string(),
        to: to.to_string(),
    })
}

fn parse_put(line: &str, args: &str) -> Result<Command> {
    if !args.contains(',') {
        return Err(CinderError::Protocol(format!("Input '{}' is invalid", line)));
    }

    let mut records = Vec::new();
    for pair in args.split(';').map(str::trim).filter(|pair| !pair.is_empty()) {
        let (key, value) = pair.split_once(',').ok_or_else(|| {
            CinderError::Protocol(format!("Pair '{}' is missing a ',' separator", pair))
        })?;
        let record = Record::new(key.trim(), value.trim())
            .map_err(|e| CinderError::Protocol(e.to_string()))?;
        records.push(record);
    }

    Ok(Command::Put { records })
}

/// Render a command as its request line (with terminator)
pub fn encode_command(command: &Command) -> String {
    match command {
        Command::Get { key } => format!("GET {}\n", key),
        Command::GetRange { from, to } => format!("GET {}-{}\n", from, to),
        Command::Put { records } => {
            let pairs: Vec<String> = records
                .iter()
                .map(|r| format!("{},{}", r.key, r.value))
                .collect();
            format!("PUT {}\n", pairs.join(";"))
        }
    }
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Read one line without its terminator. Returns None at end of stream.
///
/// Lines longer than `MAX_LINE_BYTES` are a protocol error.
pub fn read_line<R: BufRead>(reader: &mut R) -> Result<Option<String>> {
    let mut line = String::new();
    let read = reader
        .by_ref()
        .take(MAX_LINE_BYTES as u64 + 1)
        .read_line(&mut line)?;

    if read == 0 {
        return Ok(None);
    }
    if !line.ends_with('\n') && read > MAX_LINE_BYTES {
        return Err(CinderError::Protocol(format!(
            "Line exceeds {} bytes",
            MAX_LINE_BYTES
        )));
    }

    let trimmed_len = line.trim_end_matches(['\n', '\r']).len();
    line.truncate(trimmed_len);
    Ok(Some(line))
}

/// Write a command to a stream
pub fn write_command<W: Write>(writer: &mut W, command: &Command) -> Result<()> {
    writer.write_all(encode_command(command).as_bytes())?;
    writer.flush()?;
    Ok(())
}

/// Write a response to a stream
pub fn write_response<W: Write>(writer: &mut W, response: &Response) -> Result<()> {
    writer.write_all(response.encode().as_bytes())?;
    writer.flush()?;
    Ok(())
}

/// Read the response to `command` from a stream
///
/// The expected shape depends on the request: point lookups answer with one
/// line, range lookups with a count line plus that many values.
pub fn read_response<R: BufRead>(reader: &mut R, command: &Command) -> Result<Response> {
    let line = read_line(reader)?.ok_or_else(|| {
        CinderError::Protocol("Connection closed before a response arrived".to_string())
    })?;

    if let Some(message) = line.strip_prefix(ERROR_PREFIX) {
        return Ok(Response::Error(message.to_string()));
    }

    match command {
        Command::Get { .. } if line == NOT_FOUND => Ok(Response::NotFound),
        Command::Get { .. } => Ok(Response::Value(line)),
        Command::GetRange { .. } => {
            let count = parse_count(&line, VALUES_PREFIX)?;
            let mut values = Vec::with_capacity(count);
            for _ in 0..count {
                let value = read_line(reader)?.ok_or_else(|| {
                    CinderError::Protocol(format!(
                        "Connection closed after {} of {} values",
                        values.len(),
                        count
                    ))
                })?;
                values.push(value);
            }
            Ok(Response::Values(values))
        }
        Command::Put { .. } => Ok(Response::Stored(parse_count(&line, STORED_PREFIX)?)),
    }
}

fn parse_count(line: &str, prefix: &str) -> Result<usize> {
    line.strip_prefix(prefix)
        .and_then(|count| count.trim().parse().ok())
        .ok_or_else(|| CinderError::Protocol(format!("Unexpected response line '{}'", line)))
}
