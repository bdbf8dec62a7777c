//! Response definitions
//!
//! Represents responses to clients.

use crate::error::CinderError;

/// Marker line for a point lookup miss
pub const NOT_FOUND: &str = "NULL";

/// A response to send to a client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Point lookup hit
    Value(String),

    /// Point lookup miss
    NotFound,

    /// Range lookup result, ascending key order
    Values(Vec<String>),

    /// Number of pairs stored by a PUT
    Stored(usize),

    /// Invalid request or failed operation
    Error(String),
}

impl Response {
    /// Create an ERROR response from an engine or protocol error
    pub fn from_error(error: &CinderError) -> Self {
        match error {
            // Protocol messages go out verbatim
            CinderError::Protocol(message) => Response::Error(message.clone()),
            other => Response::Error(other.to_string()),
        }
    }

    /// Wire form, including the trailing newline of every line
    pub fn encode(&self) -> String {
        match self {
            Response::Value(value) => format!("{}\n", value),
            Response::NotFound => format!("{}\n", NOT_FOUND),
            Response::Values(values) => {
                let mut out = format!("VALUES {}\n", values.len());
                for value in values {
                    out.push_str(value);
                    out.push('\n');
                }
                out
            }
            Response::Stored(count) => format!("OK {}\n", count),
            Response::Error(message) => format!("ERROR: {}\n", message.replace('\n', " ")),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error(_))
    }
}
