//! shardkv CLI Client
//!
//! Command-line interface for interacting with a shardkv server.
//!
//! Uses a single TCP stream for sequential write-then-read, the same pattern
//! as Redis clients. Cloning the socket into separate reader/writer handles
//! causes spurious connection aborts on Windows because shutdown on one
//! cloned handle affects the shared OS socket.

use std::io::Write;
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

use clap::{Parser, Subcommand};
use shardkv::protocol::{encode_command, read_response, Command, Response, Status};

/// shardkv CLI
#[derive(Parser, Debug)]
#[command(name = "shardkv-cli")]
#[command(about = "CLI for the shardkv key-value store")]
#[command(version)]
struct Args {
    /// Server address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:50051")]
    server: String,

    /// Connection timeout in milliseconds
    #[arg(short, long, default_value = "5000")]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Set {
        /// The key to set
        key: String,

        /// The value to set
        value: String,

        /// Expire the entry this many milliseconds from now (0 = never)
        #[arg(long, default_value = "0")]
        ttl_ms: i64,
    },

    /// Remove a key
    Del {
        /// The key to remove
        key: String,
    },

    /// Ping the server
    Ping,
}

fn main() {
    let args = Args::parse();

    let command = match &args.command {
        Commands::Get { key } => Command::Get {
            key: key.as_bytes().to_vec(),
        },
        Commands::Set { key, value, ttl_ms } => Command::Put {
            key: key.as_bytes().to_vec(),
            value: value.as_bytes().to_vec(),
            ttl_ms: *ttl_ms,
        },
        Commands::Del { key } => Command::Remove {
            key: key.as_bytes().to_vec(),
        },
        Commands::Ping => Command::Ping,
    };

    let mut stream = match TcpStream::connect_timeout(
        &args.server.parse().expect("Invalid server address"),
        Duration::from_millis(args.timeout),
    ) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to connect to {}: {}", args.server, e);
            std::process::exit(1);
        }
    };

    let _ = stream.set_read_timeout(Some(Duration::from_millis(args.timeout)));
    let _ = stream.set_write_timeout(Some(Duration::from_millis(args.timeout)));

    // Disable Nagle's algorithm for immediate sends
    let _ = stream.set_nodelay(true);

    // Write the command, then read the response from the same stream.
    let cmd_bytes = encode_command(&command);
    if let Err(e) = stream.write_all(&cmd_bytes).and_then(|_| stream.flush()) {
        eprintln!("Failed to send command: {}", e);
        std::process::exit(1);
    }

    let response = match read_response(&mut stream) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Failed to read response: {}", e);
            std::process::exit(1);
        }
    };

    // Half-close the write side so the server's read loop sees EOF
    // immediately instead of waiting for a read timeout.
    let _ = stream.shutdown(Shutdown::Write);
    drop(stream);

    handle_response(&args.command, response);
}

fn handle_response(cmd: &Commands, response: Response) {
    match response.status {
        Status::Ok => match cmd {
            Commands::Get { .. } => {
                if let Some(value) = response.payload {
                    // Try to print as UTF-8, fall back to debug bytes
                    match String::from_utf8(value.clone()) {
                        Ok(s) => println!("{}", s),
                        Err(_) => println!("{:?}", value),
                    }
                } else {
                    println!("(nil)");
                }
            }
            Commands::Set { .. } | Commands::Del { .. } => {
                println!("OK");
            }
            Commands::Ping => {
                let pong = response
                    .payload
                    .and_then(|p| String::from_utf8(p).ok())
                    .unwrap_or_else(|| "PONG".to_string());
                println!("{}", pong);
            }
        },
        Status::NotFound => {
            println!("(nil)");
        }
        Status::Error => {
            let message = response
                .payload
                .and_then(|p| String::from_utf8(p).ok())
                .unwrap_or_else(|| "(unknown error)".to_string());
            eprintln!("ERROR: {}", message);
            std::process::exit(1);
        }
    }
}
