//! TCP Server
//!
//! Accepts connections and serves each one on its own thread.

use std::io::Write;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use crate::config::Config;
use crate::engine::Engine;
use crate::error::Result;

use super::connection::Connection;

/// TCP server for CinderKV
pub struct Server {
    config: Config,
    engine: Arc<Engine>,
    listener: TcpListener,
    local_addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    active: Arc<AtomicUsize>,
}

/// Stops a running server from another thread
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
    addr: SocketAddr,
}

impl ShutdownHandle {
    /// Signal the server to stop accepting connections
    ///
    /// Connections already being served run until their clients disconnect.
    pub fn shutdown(&self) {
        self.flag.store(true, Ordering::SeqCst);
        // Wake the acceptor blocked in accept()
        let _ = TcpStream::connect(self.addr);
    }

    pub fn is_shutdown(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Decrements the live connection count when a connection thread ends
struct ActiveGuard(Arc<AtomicUsize>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Server {
    /// Bind `config.listen_addr`. Port 0 picks a free port; see `local_addr`.
    pub fn bind(config: Config, engine: Arc<Engine>) -> Result<Self> {
        let listener = TcpListener::bind(&config.listen_addr)?;
        let local_addr = listener.local_addr()?;

        Ok(Self {
            config,
            engine,
            listener,
            local_addr,
            shutdown: Arc::new(AtomicBool::new(false)),
            active: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            flag: Arc::clone(&self.shutdown),
            addr: self.local_addr,
        }
    }

    /// Number of connections currently being served
    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Start the server (blocking until shutdown)
    pub fn run(&self) -> Result<()> {
        tracing::info!("Listening on {}", self.local_addr);

        for stream in self.listener.incoming() {
            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }

            let stream = match stream {
                Ok(stream) => stream,
                Err(e) => {
                    tracing::warn!("Failed to accept connection: {}", e);
                    continue;
                }
            };

            if self.active_connections() >= self.config.max_connections {
                tracing::warn!(
                    "Refusing connection: {} connections already open",
                    self.config.max_connections
                );
                refuse(stream);
                continue;
            }

            self.spawn_connection(stream);
        }

        tracing::info!("Server on {} stopped accepting connections", self.local_addr);
        Ok(())
    }

    fn spawn_connection(&self, stream: TcpStream) {
        self.active.fetch_add(1, Ordering::SeqCst);
        let guard = ActiveGuard(Arc::clone(&self.active));
        let engine = Arc::clone(&self.engine);
        let (read_ms, write_ms) = (self.config.read_timeout_ms, self.config.write_timeout_ms);

        let spawned = thread::Builder::new()
            .name("cinderkv-conn".to_string())
            .spawn(move || {
                let _guard = guard;
                let result = Connection::new(stream, engine).and_then(|mut connection| {
                    connection.set_timeouts(read_ms, write_ms)?;
                    connection.handle()
                });
                if let Err(e) = result {
                    tracing::warn!("Connection ended with error: {}", e);
                }
            });

        // On spawn failure the closure (and its guard) is dropped
        if let Err(e) = spawned {
            tracing::error!("Failed to spawn connection thread: {}", e);
        }
    }
}

fn refuse(mut stream: TcpStream) {
    let _ = stream.write_all(b"ERROR: Too many connections\n");
    let _ = stream.flush();
}
