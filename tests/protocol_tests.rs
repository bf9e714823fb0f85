//! Tests for the wire protocol codec
//!
//! These tests verify:
//! - Command and response round-trips
//! - Stream-based read/write helpers
//! - Rejection of truncated, oversized, and unknown frames

use std::io::Cursor;

use shardkv::protocol::{
    decode_command, decode_response, encode_command, encode_response, read_command,
    read_response, write_command, write_response, Command, Response, Status,
};
use shardkv::ShardError;

// =============================================================================
// Command Round-Trips
// =============================================================================

#[test]
fn test_get_round_trip() {
    let command = Command::Get {
        key: b"some_key".to_vec(),
    };
    let decoded = decode_command(&encode_command(&command)).unwrap();
    assert_eq!(decoded, command);
}

#[test]
fn test_put_round_trip() {
    let command = Command::Put {
        key: b"key".to_vec(),
        value: b"value".to_vec(),
        ttl_ms: 0,
    };
    let decoded = decode_command(&encode_command(&command)).unwrap();
    assert_eq!(decoded, command);
}

#[test]
fn test_put_with_ttl_round_trip() {
    let command = Command::Put {
        key: b"key".to_vec(),
        value: b"value".to_vec(),
        ttl_ms: 90_000,
    };
    let decoded = decode_command(&encode_command(&command)).unwrap();
    assert_eq!(decoded, command);
}

#[test]
fn test_put_negative_ttl_round_trip() {
    let command = Command::Put {
        key: b"key".to_vec(),
        value: b"value".to_vec(),
        ttl_ms: -1,
    };
    let decoded = decode_command(&encode_command(&command)).unwrap();
    assert_eq!(decoded, command);
}

#[test]
fn test_remove_round_trip() {
    let command = Command::Remove {
        key: b"doomed".to_vec(),
    };
    let decoded = decode_command(&encode_command(&command)).unwrap();
    assert_eq!(decoded, command);
}

#[test]
fn test_ping_round_trip() {
    let decoded = decode_command(&encode_command(&Command::Ping)).unwrap();
    assert_eq!(decoded, Command::Ping);
}

#[test]
fn test_binary_keys_and_values_round_trip() {
    let command = Command::Put {
        key: vec![0x00, 0xff, 0x0a, 0x09],
        value: vec![0xde, 0xad, 0xbe, 0xef, 0x00],
        ttl_ms: 1,
    };
    let decoded = decode_command(&encode_command(&command)).unwrap();
    assert_eq!(decoded, command);
}

#[test]
fn test_empty_key_and_value_round_trip() {
    let command = Command::Put {
        key: Vec::new(),
        value: Vec::new(),
        ttl_ms: 0,
    };
    let decoded = decode_command(&encode_command(&command)).unwrap();
    assert_eq!(decoded, command);
}

// =============================================================================
// Response Round-Trips
// =============================================================================

#[test]
fn test_ok_response_round_trip() {
    let response = Response::ok(Some(b"payload".to_vec()));
    let decoded = decode_response(&encode_response(&response)).unwrap();
    assert_eq!(decoded, response);
}

#[test]
fn test_ok_response_without_payload() {
    let response = Response::ok(None);
    let decoded = decode_response(&encode_response(&response)).unwrap();
    assert_eq!(decoded, response);
}

#[test]
fn test_not_found_response_round_trip() {
    let decoded = decode_response(&encode_response(&Response::not_found())).unwrap();
    assert_eq!(decoded.status, Status::NotFound);
    assert_eq!(decoded.payload, None);
}

#[test]
fn test_error_response_round_trip() {
    let response = Response::error("something broke");
    let decoded = decode_response(&encode_response(&response)).unwrap();
    assert_eq!(decoded.status, Status::Error);
    assert_eq!(decoded.payload, Some(b"something broke".to_vec()));
}

// =============================================================================
// Malformed Frame Rejection
// =============================================================================

#[test]
fn test_short_header_rejected() {
    assert!(matches!(
        decode_command(&[0x01, 0x00]),
        Err(ShardError::Protocol(_))
    ));
}

#[test]
fn test_unknown_command_type_rejected() {
    let frame = [0x7f, 0x00, 0x00, 0x00, 0x00];
    assert!(matches!(
        decode_command(&frame),
        Err(ShardError::Protocol(_))
    ));
}

#[test]
fn test_unknown_status_rejected() {
    let frame = [0x7f, 0x00, 0x00, 0x00, 0x00];
    assert!(matches!(
        decode_response(&frame),
        Err(ShardError::Protocol(_))
    ));
}

#[test]
fn test_oversized_payload_rejected() {
    // Header claims a 1 GB payload.
    let mut frame = vec![0x01];
    frame.extend_from_slice(&(1u32 << 30).to_be_bytes());
    assert!(matches!(
        decode_command(&frame),
        Err(ShardError::Protocol(_))
    ));
}

#[test]
fn test_truncated_payload_rejected() {
    // Header claims 10 payload bytes but only 2 follow.
    let mut frame = vec![0x01];
    frame.extend_from_slice(&10u32.to_be_bytes());
    frame.extend_from_slice(&[0x00, 0x01]);
    assert!(matches!(
        decode_command(&frame),
        Err(ShardError::Protocol(_))
    ));
}

#[test]
fn test_put_missing_ttl_rejected() {
    // PUT payload with a key but no ttl field.
    let mut payload = Vec::new();
    payload.extend_from_slice(&3u32.to_be_bytes());
    payload.extend_from_slice(b"key");

    let mut frame = vec![0x02];
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(&payload);

    assert!(matches!(
        decode_command(&frame),
        Err(ShardError::Protocol(_))
    ));
}

#[test]
fn test_key_length_past_payload_rejected() {
    // GET payload claiming a longer key than the payload holds.
    let mut payload = Vec::new();
    payload.extend_from_slice(&100u32.to_be_bytes());
    payload.extend_from_slice(b"short");

    let mut frame = vec![0x01];
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(&payload);

    assert!(matches!(
        decode_command(&frame),
        Err(ShardError::Protocol(_))
    ));
}

// =============================================================================
// Stream I/O Helpers
// =============================================================================

#[test]
fn test_stream_command_round_trip() {
    let command = Command::Put {
        key: b"stream_key".to_vec(),
        value: b"stream_value".to_vec(),
        ttl_ms: 12_345,
    };

    let mut buffer = Vec::new();
    write_command(&mut buffer, &command).unwrap();

    let mut cursor = Cursor::new(buffer);
    assert_eq!(read_command(&mut cursor).unwrap(), command);
}

#[test]
fn test_stream_response_round_trip() {
    let response = Response::ok(Some(b"hello".to_vec()));

    let mut buffer = Vec::new();
    write_response(&mut buffer, &response).unwrap();

    let mut cursor = Cursor::new(buffer);
    assert_eq!(read_response(&mut cursor).unwrap(), response);
}

#[test]
fn test_stream_multiple_commands_in_sequence() {
    let commands = vec![
        Command::Put {
            key: b"a".to_vec(),
            value: b"1".to_vec(),
            ttl_ms: 0,
        },
        Command::Get { key: b"a".to_vec() },
        Command::Remove { key: b"a".to_vec() },
        Command::Ping,
    ];

    let mut buffer = Vec::new();
    for command in &commands {
        write_command(&mut buffer, command).unwrap();
    }

    let mut cursor = Cursor::new(buffer);
    for command in &commands {
        assert_eq!(&read_command(&mut cursor).unwrap(), command);
    }
}

#[test]
fn test_stream_eof_is_io_error() {
    let mut cursor = Cursor::new(vec![0x01, 0x00]);
    assert!(matches!(
        read_command(&mut cursor),
        Err(ShardError::Io(_))
    ));
}
