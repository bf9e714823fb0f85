//! WAL record definitions
//!
//! Defines the mutation records the log carries and their text encoding.

use crate::error::{Result, ShardError};

/// A single mutation recorded in the WAL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalRecord {
    /// Permanent write
    Put { key: Vec<u8>, value: Vec<u8> },

    /// Write with an absolute wall-clock expiration (epoch milliseconds UTC)
    PutTtl {
        key: Vec<u8>,
        value: Vec<u8>,
        expires_at_ms: u64,
    },

    /// Deletion
    Remove { key: Vec<u8> },
}

impl WalRecord {
    /// Encode as one log line, without the trailing newline.
    pub fn encode(&self) -> String {
        match self {
            WalRecord::Put { key, value } => {
                format!("PUT {} {}", escape_token(key), escape_token(value))
            }
            WalRecord::PutTtl {
                key,
                value,
                expires_at_ms,
            } => format!(
                "PUT_TTL {} {} {}",
                escape_token(key),
                escape_token(value),
                expires_at_ms
            ),
            WalRecord::Remove { key } => format!("REMOVE {}", escape_token(key)),
        }
    }

    /// Parse one log line. Unknown operations, wrong field counts, and bad
    /// escapes all report `Malformed` so recovery can skip the line.
    pub fn parse(line: &str) -> Result<Self> {
        let mut fields = line.split(' ');
        let op = fields.next().unwrap_or("");

        match op {
            "PUT" => match (fields.next(), fields.next(), fields.next()) {
                (Some(key), Some(value), None) => Ok(WalRecord::Put {
                    key: unescape_token(key)?,
                    value: unescape_token(value)?,
                }),
                _ => Err(malformed(line)),
            },
            "PUT_TTL" => match (fields.next(), fields.next(), fields.next(), fields.next()) {
                (Some(key), Some(value), Some(expiry), None) => {
                    let expires_at_ms = expiry.parse::<u64>().map_err(|_| malformed(line))?;
                    Ok(WalRecord::PutTtl {
                        key: unescape_token(key)?,
                        value: unescape_token(value)?,
                        expires_at_ms,
                    })
                }
                _ => Err(malformed(line)),
            },
            "REMOVE" => match (fields.next(), fields.next()) {
                (Some(key), None) => Ok(WalRecord::Remove {
                    key: unescape_token(key)?,
                }),
                _ => Err(malformed(line)),
            },
            _ => Err(malformed(line)),
        }
    }
}

fn malformed(line: &str) -> ShardError {
    ShardError::Malformed(line.to_string())
}

// =============================================================================
// Token Escaping
// =============================================================================

/// Escape an arbitrary byte string into a single whitespace-free ASCII token.
pub(crate) fn escape_token(raw: &[u8]) -> String {
    let mut out = String::with_capacity(raw.len());
    for &byte in raw {
        match byte {
            b'\\' => out.push_str("\\\\"),
            b' ' => out.push_str("\\s"),
            b'\t' => out.push_str("\\t"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            0x20..=0x7e => out.push(byte as char),
            _ => {
                out.push_str(&format!("\\x{:02x}", byte));
            }
        }
    }
    out
}

/// Invert [`escape_token`]. Bad escape sequences report `Malformed`.
pub(crate) fn unescape_token(token: &str) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(token.len());
    let mut bytes = token.bytes();

    while let Some(byte) = bytes.next() {
        if byte != b'\\' {
            out.push(byte);
            continue;
        }
        match bytes.next() {
            Some(b'\\') => out.push(b'\\'),
            Some(b's') => out.push(b' '),
            Some(b't') => out.push(b'\t'),
            Some(b'n') => out.push(b'\n'),
            Some(b'r') => out.push(b'\r'),
            Some(b'x') => {
                let hi = bytes.next().and_then(hex_value);
                let lo = bytes.next().and_then(hex_value);
                match (hi, lo) {
                    (Some(hi), Some(lo)) => out.push(hi << 4 | lo),
                    _ => return Err(ShardError::Malformed(format!("bad hex escape in {token:?}"))),
                }
            }
            _ => return Err(ShardError::Malformed(format!("bad escape in {token:?}"))),
        }
    }

    Ok(out)
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}
