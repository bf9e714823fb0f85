//! Protocol codec
//!
//! Encoding and decoding functions for the wire protocol.
//!
//! ## Wire Format
//!
//! ### Request (Command) Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │ Cmd (1)  │ Len (4)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Payload by Command Type
//! - GET:    key_len (4 bytes) + key
//! - PUT:    key_len (4 bytes) + key + ttl_ms (8 bytes, i64) + value
//! - REMOVE: key_len (4 bytes) + key
//! - PING:   empty
//!
//! ### Response Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │Status(1) │ Len (4)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```

use std::io::{Read, Write};

use crate::error::{Result, ShardError};

use super::{Command, Response, Status};

/// Header size: 1 byte command/status + 4 bytes length
pub const HEADER_SIZE: usize = 5;

/// Maximum payload size (16 MB)
pub const MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;

// =============================================================================
// Command Encoding/Decoding
// =============================================================================

/// Encode a command to bytes
///
/// Format: cmd_type (1) + payload_len (4) + payload
pub fn encode_command(command: &Command) -> Vec<u8> {
    let cmd_type = command.command_type() as u8;

    let payload = match command {
        Command::Get { key } | Command::Remove { key } => {
            let mut payload = Vec::with_capacity(4 + key.len());
            payload.extend_from_slice(&(key.len() as u32).to_be_bytes());
            payload.extend_from_slice(key);
            payload
        }
        Command::Put { key, value, ttl_ms } => {
            let mut payload = Vec::with_capacity(4 + key.len() + 8 + value.len());
            payload.extend_from_slice(&(key.len() as u32).to_be_bytes());
            payload.extend_from_slice(key);
            payload.extend_from_slice(&ttl_ms.to_be_bytes());
            payload.extend_from_slice(value);
            payload
        }
        Command::Ping => Vec::new(),
    };

    let mut message = Vec::with_capacity(HEADER_SIZE + payload.len());
    message.push(cmd_type);
    message.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    message.extend_from_slice(&payload);

    message
}

/// Decode a command from bytes
pub fn decode_command(bytes: &[u8]) -> Result<Command> {
    let payload = frame_payload(bytes, "command")?;
    let cmd_type = bytes[0];

    match cmd_type {
        0x01 => {
            let (key, rest) = split_key(payload, "GET")?;
            expect_empty(rest, "GET")?;
            Ok(Command::Get { key })
        }
        0x02 => decode_put_command(payload),
        0x03 => {
            let (key, rest) = split_key(payload, "REMOVE")?;
            expect_empty(rest, "REMOVE")?;
            Ok(Command::Remove { key })
        }
        0x04 => {
            expect_empty(payload, "PING")?;
            Ok(Command::Ping)
        }
        _ => Err(ShardError::Protocol(format!(
            "Unknown command type: 0x{cmd_type:02x}"
        ))),
    }
}

/// Decode PUT command payload: key_len + key + ttl_ms + value
fn decode_put_command(payload: &[u8]) -> Result<Command> {
    let (key, rest) = split_key(payload, "PUT")?;

    if rest.len() < 8 {
        return Err(ShardError::Protocol(
            "PUT command: missing ttl field".to_string(),
        ));
    }
    let mut ttl_bytes = [0u8; 8];
    ttl_bytes.copy_from_slice(&rest[..8]);
    let ttl_ms = i64::from_be_bytes(ttl_bytes);

    let value = rest[8..].to_vec();
    Ok(Command::Put { key, value, ttl_ms })
}

/// Split a `key_len (4) + key` prefix off a payload
fn split_key<'a>(payload: &'a [u8], command: &str) -> Result<(Vec<u8>, &'a [u8])> {
    if payload.len() < 4 {
        return Err(ShardError::Protocol(format!(
            "{command} command: missing key length"
        )));
    }
    let key_len = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]) as usize;
    if payload.len() < 4 + key_len {
        return Err(ShardError::Protocol(format!(
            "{command} command: incomplete key (expected {key_len}, got {})",
            payload.len() - 4
        )));
    }
    Ok((payload[4..4 + key_len].to_vec(), &payload[4 + key_len..]))
}

fn expect_empty(rest: &[u8], command: &str) -> Result<()> {
    if rest.is_empty() {
        Ok(())
    } else {
        Err(ShardError::Protocol(format!(
            "{command} command: unexpected trailing {} bytes",
            rest.len()
        )))
    }
}

// =============================================================================
// Response Encoding/Decoding
// =============================================================================

/// Encode a response to bytes
///
/// Format: status (1) + payload_len (4) + payload
pub fn encode_response(response: &Response) -> Vec<u8> {
    let payload = response.payload.as_deref().unwrap_or(&[]);

    let mut message = Vec::with_capacity(HEADER_SIZE + payload.len());
    message.push(response.status as u8);
    message.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    message.extend_from_slice(payload);

    message
}

/// Decode a response from bytes
pub fn decode_response(bytes: &[u8]) -> Result<Response> {
    let payload = frame_payload(bytes, "response")?;
    let status = match bytes[0] {
        0x00 => Status::Ok,
        0x01 => Status::NotFound,
        0x02 => Status::Error,
        other => {
            return Err(ShardError::Protocol(format!(
                "Unknown response status: 0x{other:02x}"
            )))
        }
    };

    let payload = if payload.is_empty() {
        None
    } else {
        Some(payload.to_vec())
    };

    Ok(Response { status, payload })
}

/// Validate a frame's header and return its payload slice
fn frame_payload<'a>(bytes: &'a [u8], kind: &str) -> Result<&'a [u8]> {
    if bytes.len() < HEADER_SIZE {
        return Err(ShardError::Protocol(format!(
            "Incomplete {kind} header: expected {HEADER_SIZE} bytes, got {}",
            bytes.len()
        )));
    }
    let payload_len = u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]) as usize;
    if payload_len > MAX_PAYLOAD_SIZE as usize {
        return Err(ShardError::Protocol(format!(
            "{kind} payload too large: {payload_len} bytes (max {MAX_PAYLOAD_SIZE})"
        )));
    }
    let total_len = HEADER_SIZE + payload_len;
    if bytes.len() < total_len {
        return Err(ShardError::Protocol(format!(
            "Incomplete {kind} payload: expected {total_len} bytes, got {}",
            bytes.len()
        )));
    }
    Ok(&bytes[HEADER_SIZE..total_len])
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Read a complete command from a stream
///
/// Blocks until a complete command is received or an error occurs
pub fn read_command<R: Read>(reader: &mut R) -> Result<Command> {
    let frame = read_frame(reader, "command")?;
    decode_command(&frame)
}

/// Write a command to a stream
pub fn write_command<W: Write>(writer: &mut W, command: &Command) -> Result<()> {
    writer.write_all(&encode_command(command))?;
    writer.flush()?;
    Ok(())
}

/// Read a complete response from a stream
pub fn read_response<R: Read>(reader: &mut R) -> Result<Response> {
    let frame = read_frame(reader, "response")?;
    decode_response(&frame)
}

/// Write a response to a stream
pub fn write_response<W: Write>(writer: &mut W, response: &Response) -> Result<()> {
    writer.write_all(&encode_response(response))?;
    writer.flush()?;
    Ok(())
}

fn read_frame<R: Read>(reader: &mut R, kind: &str) -> Result<Vec<u8>> {
    let mut header = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header)?;

    let payload_len = u32::from_be_bytes([header[1], header[2], header[3], header[4]]) as usize;
    if payload_len > MAX_PAYLOAD_SIZE as usize {
        return Err(ShardError::Protocol(format!(
            "{kind} payload too large: {payload_len} bytes (max {MAX_PAYLOAD_SIZE})"
        )));
    }

    let mut frame = Vec::with_capacity(HEADER_SIZE + payload_len);
    frame.extend_from_slice(&header);
    if payload_len > 0 {
        let mut payload = vec![0u8; payload_len];
        reader.read_exact(&mut payload)?;
        frame.extend_from_slice(&payload);
    }
    Ok(frame)
}
