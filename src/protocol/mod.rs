//! Protocol Module
//!
//! Line-oriented text protocol between clients and the server.
//!
//! ## Protocol Format
//!
//! One request per line, one response per request. Every line ends in `\n`.
//!
//! ### Requests
//! ```text
//! PUT k1,v1;k2,v2      store one or more pairs
//! GET key              point lookup
//! GET from-to          range lookup (from < to)
//! ```
//!
//! ### Responses
//! ```text
//! OK <n>               n pairs stored
//! <value> | NULL       point lookup hit / miss
//! VALUES <n>           followed by n value lines, ascending key order
//! ERROR: <message>     invalid request or engine failure
//! ```

mod codec;
mod command;
mod response;

pub use codec::{encode_command, parse_command, read_line, read_response, write_command, write_response, MAX_LINE_BYTES};
pub use command::{Command, CommandType};
pub use response::Response;
