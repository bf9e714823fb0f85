//! Connection Handler
//!
//! Handles individual client connections: reads framed commands in a loop,
//! executes them against the store, writes framed responses.

use std::io::ErrorKind;
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Result, ShardError};
use crate::protocol::{read_command, write_response, Command, Response};
use crate::store::PartitionedStore;

/// Handles a single client connection
pub struct Connection {
    stream: TcpStream,
    peer: String,
    store: Arc<PartitionedStore>,
}

impl Connection {
    /// Create a new connection handler
    pub fn new(stream: TcpStream, store: Arc<PartitionedStore>) -> Result<Self> {
        let peer = stream
            .peer_addr()
            .map_err(|e| ShardError::Network(format!("peer address unavailable: {e}")))?
            .to_string();
        Ok(Self {
            stream,
            peer,
            store,
        })
    }

    /// Set per-stream read/write timeouts
    pub fn set_timeouts(&self, read_ms: u64, write_ms: u64) -> Result<()> {
        self.stream
            .set_read_timeout(Some(Duration::from_millis(read_ms)))?;
        self.stream
            .set_write_timeout(Some(Duration::from_millis(write_ms)))?;
        Ok(())
    }

    /// Peer address for logging
    pub fn peer_addr(&self) -> &str {
        &self.peer
    }

    /// Handle the connection (blocking until the client disconnects)
    pub fn handle(&mut self) -> Result<()> {
        loop {
            let command = match read_command(&mut self.stream) {
                Ok(command) => command,
                Err(ShardError::Io(e)) if is_disconnect(&e) => return Ok(()),
                Err(e) => return Err(e),
            };

            let response = self.execute(&command);
            write_response(&mut self.stream, &response)?;
        }
    }

    /// Execute one command; internal errors become ERROR responses with the
    /// error text attached.
    fn execute(&self, command: &Command) -> Response {
        match command {
            Command::Get { key } => match self.store.get(key) {
                Ok(Some(value)) => Response::ok(Some(value)),
                Ok(None) => Response::not_found(),
                Err(e) => Response::error(&e.to_string()),
            },
            Command::Put { key, value, ttl_ms } => {
                match self.store.put_with_ttl(key, value, *ttl_ms) {
                    Ok(()) => Response::ok(None),
                    Err(e) => Response::error(&e.to_string()),
                }
            }
            Command::Remove { key } => match self.store.remove(key) {
                Ok(()) => Response::ok(None),
                Err(e) => Response::error(&e.to_string()),
            },
            Command::Ping => Response::ok(Some(b"PONG".to_vec())),
        }
    }
}

/// Errors that mean the client went away rather than a real failure
fn is_disconnect(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::UnexpectedEof
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::WouldBlock
            | ErrorKind::TimedOut
    )
}
