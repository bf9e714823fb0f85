//! # shardkv
//!
//! A partitioned, durable, in-memory key-value store with:
//! - A batched write-ahead log (WAL) per partition for durability
//! - Snapshot + WAL-replay crash recovery
//! - TTL expiration with a background sweeper
//! - Hash-routed partitions that share no common lock
//! - TCP-based client protocol
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      TCP Server                              │
//! │                  (Multiple Clients)                          │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                 PartitionedStore                             │
//! │              (hash(key) % N routing)                         │
//! └───────┬─────────────────────────────────────────┬───────────┘
//!         │                                         │
//!         ▼                                         ▼
//!  ┌─────────────┐                           ┌─────────────┐
//!  │ Partition 0 │            ...            │ Partition N │
//!  │  ┌───────┐  │                           │  ┌───────┐  │
//!  │  │  Map  │  │                           │  │  Map  │  │
//!  │  └───┬───┘  │                           │  └───┬───┘  │
//!  │  ┌───▼───┐  │                           │  ┌───▼───┐  │
//!  │  │  WAL  │  │                           │  │  WAL  │  │
//!  │  └───────┘  │                           │  └───────┘  │
//!  │  + snapshot │                           │  + snapshot │
//!  └─────────────┘                           └─────────────┘
//! ```
//!
//! Each partition runs two background workers: an expiration sweeper and a
//! periodic snapshotter that truncates the WAL after a successful dump.

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;

pub mod network;
pub mod protocol;
pub mod store;
pub mod wal;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use config::Config;
pub use error::{Result, ShardError};
pub use store::{PartitionStore, PartitionedStore};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of shardkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
