//! CinderKV Server Binary
//!
//! Starts the TCP server for CinderKV.

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

use cinderkv::network::{Server, ShutdownHandle};
use cinderkv::{Config, Engine};
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

/// CinderKV Server
#[derive(Parser, Debug)]
#[command(name = "cinderkv-server")]
#[command(about = "Embedded log-structured key-value store served over TCP")]
#[command(version)]
struct Args {
    /// Properties file (`key=value` lines); flags below override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Data directory
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Listen address (host:port)
    #[arg(short, long)]
    listen: Option<String>,

    /// Maximum concurrent connections
    #[arg(short, long)]
    max_connections: Option<usize>,

    /// Disable the background compaction thread
    #[arg(long)]
    no_compaction: bool,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,cinderkv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("CinderKV Server v{}", cinderkv::VERSION);
    tracing::info!("Data directory: {}", config.data_dir.display());
    tracing::info!("Listen address: {}", config.listen_addr);

    // Open engine
    let engine = match Engine::open(config.clone()) {
        Ok(e) => Arc::new(e),
        Err(e) => {
            tracing::error!("Failed to open engine: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("Engine initialized successfully");

    let server = match Server::bind(config, Arc::clone(&engine)) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Failed to bind: {}", e);
            std::process::exit(1);
        }
    };

    watch_stdin(server.shutdown_handle());

    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = engine.close() {
        tracing::error!("Failed to close engine cleanly: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Server stopped");
}

fn load_config(args: &Args) -> cinderkv::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_properties_file(path)?,
        None => Config::default(),
    };

    if let Some(dir) = &args.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(listen) = &args.listen {
        config.listen_addr = listen.clone();
    }
    if let Some(max) = args.max_connections {
        config.max_connections = max;
    }
    if args.no_compaction {
        config.background_compaction = false;
    }

    config.validate()?;
    Ok(config)
}

/// Typing `shutdown` on the console stops the accept loop. End of input is
/// ignored so the server keeps running when detached from a terminal.
fn watch_stdin(handle: ShutdownHandle) {
    let spawned = std::thread::Builder::new()
        .name("cinderkv-console".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                match line {
                    Ok(line) if line.trim() == "shutdown" => {
                        tracing::info!("Shutdown requested from console");
                        handle.shutdown();
                        return;
                    }
                    Ok(_) => {}
                    Err(_) => return,
                }
            }
        });

    if let Err(e) = spawned {
        tracing::warn!("Console watcher unavailable: {}", e);
    }
}
