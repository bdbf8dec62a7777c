//! Network Module
//!
//! TCP server and client handling.
//!
//! ## Architecture
//! - Single acceptor thread
//! - One thread per accepted connection, up to `max_connections`
//! - Commands routed through Engine

mod connection;
mod server;

pub use connection::Connection;
pub use server::{Server, ShutdownHandle};
