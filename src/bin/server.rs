//! shardkv Server Binary
//!
//! Starts the TCP server for shardkv.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use shardkv::network::Server;
use shardkv::{Config, PartitionedStore};
use tracing_subscriber::{fmt, EnvFilter};

/// shardkv Server
#[derive(Parser, Debug)]
#[command(name = "shardkv-server")]
#[command(about = "Partitioned, durable, in-memory key-value store")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./shardkv_data")]
    data_dir: String,

    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:50051")]
    listen: String,

    /// Number of partitions
    #[arg(short, long, default_value = "16")]
    partitions: usize,

    /// Maximum concurrent connections
    #[arg(short, long, default_value = "1024")]
    max_connections: usize,

    /// Seconds between snapshots on each partition
    #[arg(long, default_value = "2")]
    snapshot_interval_secs: u64,

    /// Seconds between expiration sweeps on each partition
    #[arg(long, default_value = "1")]
    sweep_interval_secs: u64,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,shardkv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("shardkv Server v{}", shardkv::VERSION);
    tracing::info!("Data directory: {}", args.data_dir);
    tracing::info!("Listen address: {}", args.listen);

    let config = Config::builder()
        .data_dir(&args.data_dir)
        .listen_addr(args.listen.clone())
        .num_partitions(args.partitions)
        .max_connections(args.max_connections)
        .snapshot_interval(Duration::from_secs(args.snapshot_interval_secs))
        .sweep_interval(Duration::from_secs(args.sweep_interval_secs))
        .build();

    let store = match PartitionedStore::open(config.clone()) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            tracing::error!("Failed to open store: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("Store initialized with {} partitions", store.partition_count());

    let server = match Server::bind(config, Arc::clone(&store)) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Failed to bind server: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
    }

    if let Err(e) = store.shutdown() {
        tracing::error!("Store shutdown error: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Server stopped");
}
