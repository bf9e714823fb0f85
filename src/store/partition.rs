//! Partition store
//!
//! One shard of the key space: an in-memory map guarded by a reader/writer
//! lock, a batched WAL, and a snapshot file. Two background workers run per
//! partition: the sweeper reaps expired entries, the snapshotter periodically
//! dumps live state and truncates the WAL.
//!
//! ## Concurrency discipline
//! Mutations hold the map's exclusive lock and append to the WAL *while
//! holding it*, so the log order always matches the order in which mutations
//! became visible. GETs take the shared lock and never touch the WAL.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::{Mutex, RwLock, RwLockUpgradableReadGuard};

use crate::config::Config;
use crate::error::{Result, ShardError};
use crate::wal::{Wal, WalReader, WalRecord};

use super::record::{now_epoch_ms, Record};
use super::snapshot;

/// One partition: map, WAL, snapshot file, and its two workers
pub struct PartitionStore {
    inner: Arc<PartitionInner>,

    /// Dropping this disconnects both workers' stop receivers
    stop: Mutex<Option<Sender<()>>>,

    workers: Mutex<Vec<JoinHandle<()>>>,
}

struct PartitionInner {
    map: RwLock<HashMap<Vec<u8>, Record>>,
    wal: Wal,
    snapshot_path: PathBuf,
}

impl PartitionStore {
    /// Open a partition backed by `wal_path`, recovering state from the
    /// snapshot (if any) and the WAL tail, then start the workers.
    pub fn open(wal_path: &Path, config: &Config) -> Result<Self> {
        let snapshot_path = snapshot_path_for(wal_path);
        let now = now_epoch_ms();

        // 1. Snapshot, if one survived.
        let mut map = if snapshot_path.exists() {
            match snapshot::load(&snapshot_path, now) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        snapshot = %snapshot_path.display(),
                        "unreadable snapshot; recovering from the log alone"
                    );
                    HashMap::new()
                }
            }
        } else {
            HashMap::new()
        };

        // 2. WAL tail. Replay is ordered, so last write wins per key.
        if wal_path.exists() {
            let mut applied = 0u64;
            let mut skipped = 0u64;
            for record in WalReader::open(wal_path)? {
                match record {
                    Ok(WalRecord::Put { key, value }) => {
                        map.insert(key, Record::permanent(value));
                        applied += 1;
                    }
                    Ok(WalRecord::PutTtl {
                        key,
                        value,
                        expires_at_ms,
                    }) => {
                        map.insert(key, Record::with_expiration(value, expires_at_ms));
                        applied += 1;
                    }
                    Ok(WalRecord::Remove { key }) => {
                        map.remove(&key);
                        applied += 1;
                    }
                    Err(ShardError::Malformed(line)) => {
                        tracing::warn!(%line, "skipping malformed WAL line");
                        skipped += 1;
                    }
                    Err(e) => return Err(e),
                }
            }
            if applied > 0 || skipped > 0 {
                tracing::debug!(
                    wal = %wal_path.display(),
                    applied,
                    skipped,
                    "replayed WAL tail"
                );
            }
        }

        let wal = Wal::open(wal_path, config.wal_batch_size, config.wal_batch_timeout)?;
        let inner = Arc::new(PartitionInner {
            map: RwLock::new(map),
            wal,
            snapshot_path,
        });

        // 3. Background workers.
        let (stop_tx, stop_rx) = bounded::<()>(0);

        let sweeper_inner = Arc::clone(&inner);
        let sweeper_stop = stop_rx.clone();
        let sweep_interval = config.sweep_interval;
        let sweeper = thread::Builder::new()
            .name("shardkv-sweeper".to_string())
            .spawn(move || sweeper_loop(sweeper_inner, sweeper_stop, sweep_interval))?;

        let snapshot_inner = Arc::clone(&inner);
        let snapshot_interval = config.snapshot_interval;
        let snapshotter = thread::Builder::new()
            .name("shardkv-snapshot".to_string())
            .spawn(move || snapshot_loop(snapshot_inner, stop_rx, snapshot_interval))?;

        Ok(Self {
            inner,
            stop: Mutex::new(Some(stop_tx)),
            workers: Mutex::new(vec![sweeper, snapshotter]),
        })
    }

    /// Insert or replace a permanent entry. Returns once the WAL has
    /// accepted the record into its batch.
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let mut map = self.inner.map.write();
        self.inner.wal.append_batched(&WalRecord::Put {
            key: key.to_vec(),
            value: value.to_vec(),
        })?;
        map.insert(key.to_vec(), Record::permanent(value.to_vec()));
        Ok(())
    }

    /// Insert or replace an entry that expires `ttl_ms` from now.
    /// `ttl_ms <= 0` means no TTL.
    pub fn put_with_ttl(&self, key: &[u8], value: &[u8], ttl_ms: i64) -> Result<()> {
        if ttl_ms <= 0 {
            return self.put(key, value);
        }
        let expires_at_ms = now_epoch_ms().saturating_add(ttl_ms as u64);

        let mut map = self.inner.map.write();
        self.inner.wal.append_batched(&WalRecord::PutTtl {
            key: key.to_vec(),
            value: value.to_vec(),
            expires_at_ms,
        })?;
        map.insert(
            key.to_vec(),
            Record::with_expiration(value.to_vec(), expires_at_ms),
        );
        Ok(())
    }

    /// Current value for `key`, if present and not expired. Never mutates
    /// the map; expired entries are left for the sweeper.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let now = now_epoch_ms();
        let map = self.inner.map.read();
        Ok(map
            .get(key)
            .filter(|record| !record.is_expired(now))
            .map(|record| record.value.clone()))
    }

    /// Remove `key` if present. A REMOVE record is appended unconditionally;
    /// replaying a REMOVE of an absent key is a no-op.
    pub fn remove(&self, key: &[u8]) -> Result<()> {
        let mut map = self.inner.map.write();
        self.inner
            .wal
            .append_batched(&WalRecord::Remove { key: key.to_vec() })?;
        map.remove(key);
        Ok(())
    }

    /// Force everything appended so far to storage.
    pub fn sync(&self) -> Result<()> {
        self.inner.wal.flush()
    }

    /// Entry count, including entries the sweeper has not reaped yet.
    pub fn len(&self) -> usize {
        self.inner.map.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop the workers, flush the WAL, write a final snapshot, and close
    /// the log. Idempotent; later calls are no-ops.
    pub fn shutdown(&self) -> Result<()> {
        let stop = self.stop.lock().take();
        if stop.is_none() {
            return Ok(());
        }
        drop(stop);

        for handle in self.workers.lock().drain(..) {
            let _ = handle.join();
        }

        self.inner.wal.flush()?;
        self.inner.write_snapshot()?;
        self.inner.wal.close()?;
        Ok(())
    }
}

impl Drop for PartitionStore {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            tracing::warn!(error = %e, "partition shutdown failed during drop");
        }
    }
}

impl PartitionInner {
    /// Dump live entries and truncate the WAL.
    ///
    /// The dump runs under an upgradable read lock, so GETs proceed while
    /// the partition streams to the tmp file but no mutation can start. The
    /// guard is upgraded to exclusive for the rename and the WAL reset: with
    /// writers excluded from the moment the dump began, the truncated log
    /// cannot contain a record the snapshot missed.
    fn write_snapshot(&self) -> Result<()> {
        let now = now_epoch_ms();

        let map = self.map.upgradable_read();
        let tmp = snapshot::write_tmp(&self.snapshot_path, &map, now)?;

        let _map = RwLockUpgradableReadGuard::upgrade(map);
        fs::rename(&tmp, &self.snapshot_path)?;
        self.wal.reset()?;
        Ok(())
    }

    fn sweep_expired(&self) {
        let now = now_epoch_ms();
        let mut map = self.map.write();
        let before = map.len();
        map.retain(|_, record| !record.is_expired(now));
        let reaped = before - map.len();
        if reaped > 0 {
            tracing::trace!(reaped, "swept expired entries");
        }
    }
}

/// Snapshot file sits next to the log: `<wal>.snapshot`
fn snapshot_path_for(wal_path: &Path) -> PathBuf {
    let mut os = wal_path.as_os_str().to_os_string();
    os.push(".snapshot");
    PathBuf::from(os)
}

fn sweeper_loop(inner: Arc<PartitionInner>, stop: Receiver<()>, interval: Duration) {
    loop {
        match stop.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => inner.sweep_expired(),
            // Explicit stop or the partition dropped its sender.
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

fn snapshot_loop(inner: Arc<PartitionInner>, stop: Receiver<()>, interval: Duration) {
    loop {
        match stop.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {
                if let Err(e) = inner.write_snapshot() {
                    tracing::warn!(error = %e, "snapshot failed; retrying next interval");
                }
            }
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}
