//! WAL writer
//!
//! Batched, single-writer appender. Producers enqueue encoded lines under a
//! dedicated mutex; one background thread drains the queue when it reaches
//! the batch size or the batch timeout lapses, writes the lines in order,
//! and forces them to storage.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::error::{Result, ShardError};

use super::WalRecord;

/// Producer-side state, held under the batch mutex.
struct WalState {
    /// Encoded lines waiting for the writer
    queue: Vec<String>,

    /// Lines accepted by `append_batched` so far
    enqueued: u64,

    /// Lines written and synced to storage so far
    durable: u64,

    /// Set once `close` has begun; appends are rejected afterwards
    shutdown: bool,

    /// First write failure observed by the writer; latched until close
    failed: Option<String>,
}

struct WalInner {
    state: Mutex<WalState>,

    /// Wakes the writer thread: batch full, flush requested, or shutdown
    work: Condvar,

    /// Wakes flush callers once a batch has become durable
    done: Condvar,

    /// The log file. Only the writer thread and `reset` touch it, and `reset`
    /// runs only after a flush has drained the writer.
    file: Mutex<BufWriter<File>>,

    batch_size: usize,
    batch_timeout: Duration,
}

impl WalInner {
    fn write_batch(&self, batch: &[String]) -> std::io::Result<()> {
        let mut file = self.file.lock();
        for line in batch {
            file.write_all(line.as_bytes())?;
            file.write_all(b"\n")?;
        }
        file.flush()?;
        file.get_ref().sync_data()
    }
}

/// Batched write-ahead log for one partition
pub struct Wal {
    inner: Arc<WalInner>,
    writer: Mutex<Option<JoinHandle<()>>>,
}

impl Wal {
    /// Open the log in append mode and start the writer thread.
    /// Failure to open the file is fatal for the partition.
    pub fn open(path: &Path, batch_size: usize, batch_timeout: Duration) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;

        let inner = Arc::new(WalInner {
            state: Mutex::new(WalState {
                queue: Vec::new(),
                enqueued: 0,
                durable: 0,
                shutdown: false,
                failed: None,
            }),
            work: Condvar::new(),
            done: Condvar::new(),
            file: Mutex::new(BufWriter::new(file)),
            batch_size: batch_size.max(1),
            batch_timeout,
        });

        let writer_inner = Arc::clone(&inner);
        let handle = thread::Builder::new()
            .name("shardkv-wal-writer".to_string())
            .spawn(move || writer_loop(writer_inner))?;

        Ok(Self {
            inner,
            writer: Mutex::new(Some(handle)),
        })
    }

    /// Enqueue a record for durable write. Returns as soon as the record is
    /// in the batch; the writer makes it durable within the batch timeout.
    pub fn append_batched(&self, record: &WalRecord) -> Result<()> {
        let mut state = self.inner.state.lock();
        if state.shutdown {
            return Err(ShardError::ShuttingDown);
        }
        if let Some(message) = &state.failed {
            return Err(ShardError::wal_write(message));
        }

        state.queue.push(record.encode());
        state.enqueued += 1;
        if state.queue.len() >= self.inner.batch_size {
            self.inner.work.notify_one();
        }
        Ok(())
    }

    /// Force everything enqueued so far to the OS and to storage.
    /// Reports the writer's recorded error if a batch failed.
    pub fn flush(&self) -> Result<()> {
        let target = {
            let state = self.inner.state.lock();
            if let Some(message) = &state.failed {
                return Err(ShardError::wal_write(message));
            }
            state.enqueued
        };

        self.inner.work.notify_one();

        let mut state = self.inner.state.lock();
        while state.durable < target && state.failed.is_none() {
            self.inner.done.wait(&mut state);
        }
        match &state.failed {
            Some(message) => Err(ShardError::wal_write(message)),
            None => Ok(()),
        }
    }

    /// Truncate the log to zero length.
    ///
    /// Callers must guarantee no appends are in flight; the partition's
    /// snapshot path holds the map's exclusive lock across this call.
    pub fn reset(&self) -> Result<()> {
        // Drain the writer first so no swapped-out batch lands after the
        // truncation.
        self.flush()?;

        let mut file = self.inner.file.lock();
        file.flush()?;
        file.get_ref().set_len(0)?;
        Ok(())
    }

    /// Signal the writer to drain remaining entries, flush, and stop.
    /// Idempotent.
    pub fn close(&self) -> Result<()> {
        {
            let mut state = self.inner.state.lock();
            state.shutdown = true;
        }
        self.inner.work.notify_all();

        if let Some(handle) = self.writer.lock().take() {
            let _ = handle.join();
        }

        let state = self.inner.state.lock();
        match &state.failed {
            Some(message) => Err(ShardError::wal_write(message)),
            None => Ok(()),
        }
    }
}

impl Drop for Wal {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

fn writer_loop(inner: Arc<WalInner>) {
    loop {
        let batch = {
            let mut state = inner.state.lock();
            if state.queue.is_empty() {
                if state.shutdown {
                    break;
                }
                let _ = inner.work.wait_for(&mut state, inner.batch_timeout);
            }
            if state.queue.is_empty() {
                if state.shutdown {
                    break;
                }
                continue;
            }
            std::mem::take(&mut state.queue)
        };

        let written = batch.len() as u64;
        let result = inner.write_batch(&batch);

        let mut state = inner.state.lock();
        match result {
            Ok(()) => state.durable += written,
            Err(e) => {
                if state.failed.is_none() {
                    tracing::error!(error = %e, "WAL write failed; log marked unhealthy");
                    state.failed = Some(e.to_string());
                }
            }
        }
        drop(state);
        inner.done.notify_all();
    }

    // Wake any flush callers still waiting at shutdown.
    inner.done.notify_all();
}
