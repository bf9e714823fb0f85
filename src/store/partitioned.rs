//! Partitioned store
//!
//! Shards the key space across N independent partitions so operations on
//! distinct partitions never contend on a common lock. Each partition owns
//! its own WAL and snapshot file, named by index, so the whole store is
//! restartable from the data directory alone.

use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};

use crate::config::Config;
use crate::error::{Result, ShardError};

use super::PartitionStore;

/// A fixed-size collection of partitions with hash routing
pub struct PartitionedStore {
    partitions: Vec<PartitionStore>,
}

impl PartitionedStore {
    /// Open (or create) all partitions under `config.data_dir`, recovering
    /// each from its own snapshot + WAL pair.
    pub fn open(config: Config) -> Result<Self> {
        if config.num_partitions == 0 {
            return Err(ShardError::Config(
                "num_partitions must be at least 1".to_string(),
            ));
        }

        fs::create_dir_all(&config.data_dir)?;

        let mut partitions = Vec::with_capacity(config.num_partitions);
        for index in 0..config.num_partitions {
            let wal_path = config.data_dir.join(format!("WAL_partition_{index}.log"));
            partitions.push(PartitionStore::open(&wal_path, &config)?);
        }

        tracing::info!(
            partitions = config.num_partitions,
            data_dir = %config.data_dir.display(),
            "partitioned store opened"
        );
        Ok(Self { partitions })
    }

    /// Number of partitions, fixed at construction
    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    /// The partition index `key` routes to. Deterministic and stable for the
    /// process lifetime.
    pub fn partition_index(&self, key: &[u8]) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % self.partitions.len() as u64) as usize
    }

    fn partition_for(&self, key: &[u8]) -> &PartitionStore {
        &self.partitions[self.partition_index(key)]
    }

    /// Insert or replace a permanent entry
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.partition_for(key).put(key, value)
    }

    /// Insert or replace an entry expiring `ttl_ms` from now.
    /// `ttl_ms <= 0` means no TTL.
    pub fn put_with_ttl(&self, key: &[u8], value: &[u8], ttl_ms: i64) -> Result<()> {
        if ttl_ms <= 0 {
            return self.put(key, value);
        }
        self.partition_for(key).put_with_ttl(key, value, ttl_ms)
    }

    /// Current value for `key`, if present and not expired
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.partition_for(key).get(key)
    }

    /// Remove `key` if present
    pub fn remove(&self, key: &[u8]) -> Result<()> {
        self.partition_for(key).remove(key)
    }

    /// Entry count per partition, in index order
    pub fn partition_sizes(&self) -> Vec<usize> {
        self.partitions.iter().map(PartitionStore::len).collect()
    }

    /// Shut down every partition. All partitions are attempted even if one
    /// fails; the first error is reported. Idempotent.
    pub fn shutdown(&self) -> Result<()> {
        let mut first_err = None;
        for partition in &self.partitions {
            if let Err(e) = partition.shutdown() {
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
