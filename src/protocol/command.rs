//! Command definitions
//!
//! Represents requests from clients.

use crate::record::Record;

/// Command types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandType {
    Get,
    GetRange,
    Put,
}

impl CommandType {
    /// Leading word on the wire (GET serves both lookups)
    pub fn keyword(&self) -> &'static str {
        match self {
            CommandType::Get | CommandType::GetRange => "GET",
            CommandType::Put => "PUT",
        }
    }
}

/// A parsed command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Get a value by key
    Get { key: String },

    /// Values of every key in `from..=to`
    GetRange { from: String, to: String },

    /// Store one or more pairs
    Put { records: Vec<Record> },
}

impl Command {
    /// Get the command type
    pub fn command_type(&self) -> CommandType {
        match self {
            Command::Get { .. } => CommandType::Get,
            Command::GetRange { .. } => CommandType::GetRange,
            Command::Put { .. } => CommandType::Put,
        }
    }
}
