//! Configuration for shardkv
//!
//! Centralized configuration with sensible defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration for a shardkv instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Directory for all partition WAL and snapshot files
    pub data_dir: PathBuf,

    /// Number of partitions; fixed for the lifetime of the store
    pub num_partitions: usize,

    // -------------------------------------------------------------------------
    // Background Worker Configuration
    // -------------------------------------------------------------------------
    /// How often each partition dumps a full snapshot and truncates its WAL
    pub snapshot_interval: Duration,

    /// How often each partition reaps expired entries from its map
    pub sweep_interval: Duration,

    // -------------------------------------------------------------------------
    // WAL Configuration
    // -------------------------------------------------------------------------
    /// Queued entries that trigger an immediate batch write
    pub wal_batch_size: usize,

    /// Longest a queued entry waits before the writer drains the batch
    pub wal_batch_timeout: Duration,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address
    pub listen_addr: String,

    /// Max concurrent client connections
    pub max_connections: usize,

    /// Connection read timeout (milliseconds)
    pub read_timeout_ms: u64,

    /// Connection write timeout (milliseconds)
    pub write_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./shardkv_data"),
            num_partitions: 16,
            snapshot_interval: Duration::from_secs(2),
            sweep_interval: Duration::from_secs(1),
            wal_batch_size: 100,
            wal_batch_timeout: Duration::from_millis(10),
            listen_addr: "127.0.0.1:50051".to_string(),
            max_connections: 1024,
            read_timeout_ms: 5000,
            write_timeout_ms: 5000,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn data_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.config.data_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn num_partitions(mut self, count: usize) -> Self {
        self.config.num_partitions = count;
        self
    }

    pub fn snapshot_interval(mut self, interval: Duration) -> Self {
        self.config.snapshot_interval = interval;
        self
    }

    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.config.sweep_interval = interval;
        self
    }

    pub fn wal_batch_size(mut self, size: usize) -> Self {
        self.config.wal_batch_size = size;
        self
    }

    pub fn wal_batch_timeout(mut self, timeout: Duration) -> Self {
        self.config.wal_batch_timeout = timeout;
        self
    }

    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
        self
    }

    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
