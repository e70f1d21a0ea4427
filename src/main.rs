//! CacheDB server entry point.
//!
//! Sets up logging, the shared store and snapshot manager, optionally
//! restores a snapshot, then accepts connections until Ctrl+C.

use bytes::Bytes;
use cachedb::commands::CommandDispatcher;
use cachedb::connection::{handle_connection, ConnectionStats};
use cachedb::snapshot::{read_snapshot, SnapshotManager, DEFAULT_BACKUP_INTERVAL};
use cachedb::storage::Store;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Server configuration
struct Config {
    /// Host to bind to
    host: String,
    /// Port to listen on
    port: u16,
    /// Directory snapshots are written into
    snapshot_dir: String,
    /// Seconds between automatic backups
    backup_interval: Duration,
    /// Snapshot file to restore the store from at startup
    restore: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: cachedb::DEFAULT_HOST.to_string(),
            port: cachedb::DEFAULT_PORT,
            snapshot_dir: ".".to_string(),
            backup_interval: DEFAULT_BACKUP_INTERVAL,
            restore: None,
        }
    }
}

impl Config {
    /// Parse configuration from command-line arguments
    fn from_args() -> Self {
        let mut config = Config::default();
        let args: Vec<String> = std::env::args().collect();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--host" | "-h" => {
                    config.host = take_value(&args, &mut i, "--host");
                }
                "--port" | "-p" => {
                    config.port = take_value(&args, &mut i, "--port").parse().unwrap_or_else(|_| {
                        eprintln!("Error: invalid port number");
                        std::process::exit(1);
                    });
                }
                "--snapshot-dir" | "-d" => {
                    config.snapshot_dir = take_value(&args, &mut i, "--snapshot-dir");
                }
                "--backup-interval" => {
                    let secs: u64 = take_value(&args, &mut i, "--backup-interval")
                        .parse()
                        .unwrap_or_else(|_| {
                            eprintln!("Error: invalid backup interval");
                            std::process::exit(1);
                        });
                    config.backup_interval = Duration::from_secs(secs);
                }
                "--restore" => {
                    config.restore = Some(take_value(&args, &mut i, "--restore"));
                }
                "--help" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("CacheDB version {}", cachedb::VERSION);
                    std::process::exit(0);
                }
                _ => {
                    eprintln!("Unknown argument: {}", args[i]);
                    print_help();
                    std::process::exit(1);
                }
            }
            i += 1;
        }

        config
    }

    /// Returns the bind address as a string
    fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn take_value(args: &[String], i: &mut usize, flag: &str) -> String {
    *i += 1;
    match args.get(*i) {
        Some(v) => v.clone(),
        None => {
            eprintln!("Error: {} requires a value", flag);
            std::process::exit(1);
        }
    }
}

fn print_help() {
    println!(
        r#"
CacheDB - A Minimal In-Memory Cache Server with Snapshots

USAGE:
    cachedb [OPTIONS]

OPTIONS:
    -h, --host <HOST>              Host to bind to (default: 127.0.0.1)
    -p, --port <PORT>              Port to listen on (default: 6379)
    -d, --snapshot-dir <DIR>       Snapshot directory (default: .)
        --backup-interval <SECS>   Seconds between automatic backups (default: 300)
        --restore <FILE>           Restore the store from a snapshot file
    -v, --version                  Print version information
        --help                     Print this help message

CONNECTING:
    Use redis-cli or any Redis client to connect:
    $ redis-cli -p 6379
    127.0.0.1:6379> PING
    PONG
    127.0.0.1:6379> SET name "Ariz"
    OK
    127.0.0.1:6379> GET name
    "Ariz"
"#
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_args();

    let _subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    let store = Arc::new(Store::new());

    if let Some(path) = &config.restore {
        let pairs = read_snapshot(path)?;
        for (key, value) in pairs {
            store.set(Bytes::from(key), Bytes::from(value));
        }
        info!(path = %path, keys = store.len(), "Restored store from snapshot");
    }

    let snapshots = Arc::new(SnapshotManager::new(
        &config.snapshot_dir,
        config.backup_interval,
    ));
    info!(
        dir = %config.snapshot_dir,
        interval_secs = config.backup_interval.as_secs(),
        "Snapshot manager initialized"
    );

    let stats = Arc::new(ConnectionStats::new());

    let listener = TcpListener::bind(config.bind_address()).await?;
    println!(
        "CacheDB v{} listening on {}",
        cachedb::VERSION,
        config.bind_address()
    );
    info!("Listening on {}", config.bind_address());

    let shutdown = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
        info!("Shutdown signal received, stopping server...");
    };

    tokio::select! {
        _ = accept_loop(listener, Arc::clone(&store), Arc::clone(&snapshots), stats) => {}
        _ = shutdown => {}
    }

    // Best-effort parting snapshot so a clean shutdown loses nothing.
    if !store.is_empty() {
        match snapshots.save(&store) {
            Ok(path) => info!(path = %path.display(), "Final snapshot saved"),
            Err(e) => warn!(error = %e, "Final snapshot failed"),
        }
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Main loop that accepts incoming connections
async fn accept_loop(
    listener: TcpListener,
    store: Arc<Store>,
    snapshots: Arc<SnapshotManager>,
    stats: Arc<ConnectionStats>,
) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let dispatcher =
                    CommandDispatcher::new(Arc::clone(&store), Arc::clone(&snapshots));
                let stats = Arc::clone(&stats);

                tokio::spawn(async move {
                    handle_connection(stream, addr, dispatcher, stats).await;
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}
