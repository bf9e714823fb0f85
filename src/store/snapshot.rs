//! Snapshot I/O
//!
//! A snapshot is a full dump of one partition's live entries, one
//! tab-delimited line per key: `<key>\t<value>\t<expires_at_ms_or_-1>`.
//! Keys and values use the same escaped-token encoding as the WAL. Writes go
//! to a sibling `.tmp` file that the caller renames over the target, so the
//! snapshot on disk is always either the old complete dump or the new one.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{Result, ShardError};
use crate::wal::{escape_token, unescape_token};

use super::Record;

/// The `.tmp` sibling a snapshot is staged in before the atomic rename
pub(crate) fn tmp_path(snapshot_path: &Path) -> PathBuf {
    let mut os = snapshot_path.as_os_str().to_os_string();
    os.push(".tmp");
    PathBuf::from(os)
}

/// Stream all live entries to the snapshot's `.tmp` sibling and sync it.
/// Returns the tmp path; the caller renames it over the target once no
/// concurrent mutation can slip between the dump and the WAL truncation.
pub(crate) fn write_tmp(
    snapshot_path: &Path,
    entries: &HashMap<Vec<u8>, Record>,
    now_ms: u64,
) -> Result<PathBuf> {
    let tmp = tmp_path(snapshot_path);
    let file = File::create(&tmp)?;
    let mut out = BufWriter::new(file);

    for (key, record) in entries {
        if record.is_expired(now_ms) {
            continue;
        }
        let expiry = record.expires_at_ms.map(|ms| ms as i64).unwrap_or(-1);
        writeln!(
            out,
            "{}\t{}\t{}",
            escape_token(key),
            escape_token(&record.value),
            expiry
        )?;
    }

    out.flush()?;
    out.get_ref().sync_data()?;
    Ok(tmp)
}

/// Load a snapshot file. Entries already expired at `now_ms` are dropped;
/// malformed lines are logged and skipped.
pub(crate) fn load(path: &Path, now_ms: u64) -> Result<HashMap<Vec<u8>, Record>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut entries = HashMap::new();

    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                tracing::warn!("skipping non-text snapshot line");
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        if line.is_empty() {
            continue;
        }
        match parse_line(&line) {
            Ok((key, record)) => {
                if !record.is_expired(now_ms) {
                    entries.insert(key, record);
                }
            }
            Err(e) => tracing::warn!(error = %e, "skipping malformed snapshot line"),
        }
    }

    Ok(entries)
}

fn parse_line(line: &str) -> Result<(Vec<u8>, Record)> {
    let mut fields = line.split('\t');
    match (fields.next(), fields.next(), fields.next(), fields.next()) {
        (Some(key), Some(value), Some(expiry), None) => {
            let key = unescape_token(key)?;
            let value = unescape_token(value)?;
            let expiry = expiry
                .parse::<i64>()
                .map_err(|_| ShardError::Malformed(line.to_string()))?;
            let record = if expiry < 0 {
                Record::permanent(value)
            } else {
                Record::with_expiration(value, expiry as u64)
            };
            Ok((key, record))
        }
        _ => Err(ShardError::Malformed(line.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_then_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let snapshot_path = dir.path().join("p.snapshot");

        let mut entries = HashMap::new();
        entries.insert(b"plain".to_vec(), Record::permanent(b"value".to_vec()));
        entries.insert(
            b"with ttl".to_vec(),
            Record::with_expiration(b"v\t2".to_vec(), 9_999_999_999_999),
        );

        let tmp = write_tmp(&snapshot_path, &entries, 0).unwrap();
        std::fs::rename(tmp, &snapshot_path).unwrap();

        let loaded = load(&snapshot_path, 0).unwrap();
        assert_eq!(loaded, entries);
    }

    #[test]
    fn test_expired_entries_skipped_on_both_sides() {
        let dir = TempDir::new().unwrap();
        let snapshot_path = dir.path().join("p.snapshot");

        let mut entries = HashMap::new();
        entries.insert(b"dead".to_vec(), Record::with_expiration(b"v".to_vec(), 10));
        entries.insert(b"live".to_vec(), Record::permanent(b"v".to_vec()));

        // Expired at write time: not dumped.
        let tmp = write_tmp(&snapshot_path, &entries, 100).unwrap();
        std::fs::rename(tmp, &snapshot_path).unwrap();
        let loaded = load(&snapshot_path, 0).unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(loaded.contains_key(b"live".as_slice()));

        // Expired at load time: dumped but dropped on the way back in.
        let tmp = write_tmp(&snapshot_path, &entries, 0).unwrap();
        std::fs::rename(tmp, &snapshot_path).unwrap();
        let loaded = load(&snapshot_path, 100).unwrap();
        assert_eq!(loaded.len(), 1);
    }

    #[test]
    fn test_malformed_lines_skipped() {
        let dir = TempDir::new().unwrap();
        let snapshot_path = dir.path().join("p.snapshot");
        std::fs::write(
            &snapshot_path,
            "good\tvalue\t-1\nno tabs here\nbad\tvalue\tnot_a_number\n",
        )
        .unwrap();

        let loaded = load(&snapshot_path, 0).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(
            loaded.get(b"good".as_slice()),
            Some(&Record::permanent(b"value".to_vec()))
        );
    }
}
