//! Write-Ahead Log (WAL) Module
//!
//! Provides durability guarantees through append-only logging.
//!
//! ## Responsibilities
//! - Record every mutation before it becomes visible in the map
//! - Batch writes on a dedicated writer thread to amortize fsync cost
//! - Truncate the log once a snapshot has captured its contents
//! - Replay the log tail during recovery
//!
//! ## File Format
//!
//! One newline-terminated text line per mutation:
//! ```text
//! PUT <key> <value>
//! PUT_TTL <key> <value> <expires_at_epoch_ms>
//! REMOVE <key>
//! ```
//!
//! Keys and values are escaped tokens, so arbitrary byte strings (including
//! whitespace and newlines) survive the line-oriented encoding.

mod record;
mod reader;
mod writer;

pub use reader::WalReader;
pub use record::WalRecord;
pub use writer::Wal;

pub(crate) use record::{escape_token, unescape_token};
