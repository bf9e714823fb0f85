//! Integration tests for shardkv
//!
//! Component-level coverage lives in dedicated files:
//! - WAL tests: tests/wal_tests.rs
//! - Partition tests: tests/partition_tests.rs
//! - Partitioned store tests: tests/partitioned_tests.rs
//! - Protocol tests: tests/protocol_tests.rs
//!
//! This file covers configuration and full client-server round-trips over
//! TCP.

use std::net::TcpStream;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use shardkv::network::Server;
use shardkv::protocol::{read_response, write_command, Command, Status};
use shardkv::{Config, PartitionedStore};
use tempfile::TempDir;

// =============================================================================
// Config Tests
// =============================================================================

#[test]
fn test_config_default() {
    let config = Config::default();

    assert_eq!(config.data_dir.to_str().unwrap(), "./shardkv_data");
    assert_eq!(config.num_partitions, 16);
    assert_eq!(config.snapshot_interval, Duration::from_secs(2));
    assert_eq!(config.sweep_interval, Duration::from_secs(1));
    assert_eq!(config.wal_batch_size, 100);
    assert_eq!(config.wal_batch_timeout, Duration::from_millis(10));
    assert_eq!(config.listen_addr, "127.0.0.1:50051");
    assert_eq!(config.max_connections, 1024);
    assert_eq!(config.read_timeout_ms, 5000);
    assert_eq!(config.write_timeout_ms, 5000);
}

#[test]
fn test_config_builder() {
    let config = Config::builder()
        .data_dir("/custom/path")
        .num_partitions(8)
        .snapshot_interval(Duration::from_millis(500))
        .sweep_interval(Duration::from_millis(250))
        .wal_batch_size(10)
        .wal_batch_timeout(Duration::from_millis(1))
        .listen_addr("0.0.0.0:8080")
        .max_connections(100)
        .read_timeout_ms(1000)
        .write_timeout_ms(2000)
        .build();

    assert_eq!(config.data_dir.to_str().unwrap(), "/custom/path");
    assert_eq!(config.num_partitions, 8);
    assert_eq!(config.snapshot_interval, Duration::from_millis(500));
    assert_eq!(config.sweep_interval, Duration::from_millis(250));
    assert_eq!(config.wal_batch_size, 10);
    assert_eq!(config.wal_batch_timeout, Duration::from_millis(1));
    assert_eq!(config.listen_addr, "0.0.0.0:8080");
    assert_eq!(config.max_connections, 100);
    assert_eq!(config.read_timeout_ms, 1000);
    assert_eq!(config.write_timeout_ms, 2000);
}

#[test]
fn test_config_builder_default_values() {
    let config = Config::builder().build();
    let default_config = Config::default();

    assert_eq!(config.data_dir, default_config.data_dir);
    assert_eq!(config.num_partitions, default_config.num_partitions);
    assert_eq!(config.wal_batch_size, default_config.wal_batch_size);
}

// =============================================================================
// End-to-End Server Tests
// =============================================================================

struct TestServer {
    addr: std::net::SocketAddr,
    shutdown: Arc<std::sync::atomic::AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
    store: Arc<PartitionedStore>,
    _temp: TempDir,
}

impl TestServer {
    fn start() -> Self {
        let temp = TempDir::new().unwrap();
        let config = Config::builder()
            .data_dir(temp.path())
            .num_partitions(4)
            .listen_addr("127.0.0.1:0")
            .read_timeout_ms(2000)
            .write_timeout_ms(2000)
            .build();

        let store = Arc::new(PartitionedStore::open(config.clone()).unwrap());
        let server = Server::bind(config, Arc::clone(&store)).unwrap();
        let addr = server.local_addr().unwrap();
        let shutdown = server.shutdown_handle();

        let handle = thread::spawn(move || {
            server.run().unwrap();
        });

        Self {
            addr,
            shutdown,
            handle: Some(handle),
            store,
            _temp: temp,
        }
    }

    fn connect(&self) -> TcpStream {
        let stream = TcpStream::connect(self.addr).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        stream
    }

    fn stop(mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            handle.join().unwrap();
        }
        self.store.shutdown().unwrap();
    }
}

#[test]
fn test_server_put_get_remove_round_trip() {
    let server = TestServer::start();
    let mut stream = server.connect();

    // PUT
    write_command(
        &mut stream,
        &Command::Put {
            key: b"hello".to_vec(),
            value: b"world".to_vec(),
            ttl_ms: 0,
        },
    )
    .unwrap();
    let response = read_response(&mut stream).unwrap();
    assert_eq!(response.status, Status::Ok);

    // GET hit
    write_command(
        &mut stream,
        &Command::Get {
            key: b"hello".to_vec(),
        },
    )
    .unwrap();
    let response = read_response(&mut stream).unwrap();
    assert_eq!(response.status, Status::Ok);
    assert_eq!(response.payload, Some(b"world".to_vec()));

    // REMOVE
    write_command(
        &mut stream,
        &Command::Remove {
            key: b"hello".to_vec(),
        },
    )
    .unwrap();
    let response = read_response(&mut stream).unwrap();
    assert_eq!(response.status, Status::Ok);

    // GET miss
    write_command(
        &mut stream,
        &Command::Get {
            key: b"hello".to_vec(),
        },
    )
    .unwrap();
    let response = read_response(&mut stream).unwrap();
    assert_eq!(response.status, Status::NotFound);

    drop(stream);
    server.stop();
}

#[test]
fn test_server_ping() {
    let server = TestServer::start();
    let mut stream = server.connect();

    write_command(&mut stream, &Command::Ping).unwrap();
    let response = read_response(&mut stream).unwrap();
    assert_eq!(response.status, Status::Ok);
    assert_eq!(response.payload, Some(b"PONG".to_vec()));

    drop(stream);
    server.stop();
}

#[test]
fn test_server_put_with_ttl_expires() {
    let server = TestServer::start();
    let mut stream = server.connect();

    write_command(
        &mut stream,
        &Command::Put {
            key: b"ephemeral".to_vec(),
            value: b"here for a moment".to_vec(),
            ttl_ms: 500,
        },
    )
    .unwrap();
    assert_eq!(read_response(&mut stream).unwrap().status, Status::Ok);

    write_command(
        &mut stream,
        &Command::Get {
            key: b"ephemeral".to_vec(),
        },
    )
    .unwrap();
    let response = read_response(&mut stream).unwrap();
    assert_eq!(response.status, Status::Ok);
    assert_eq!(response.payload, Some(b"here for a moment".to_vec()));

    thread::sleep(Duration::from_millis(700));

    write_command(
        &mut stream,
        &Command::Get {
            key: b"ephemeral".to_vec(),
        },
    )
    .unwrap();
    assert_eq!(read_response(&mut stream).unwrap().status, Status::NotFound);

    drop(stream);
    server.stop();
}

#[test]
fn test_server_concurrent_clients() {
    let server = TestServer::start();

    let mut handles = Vec::new();
    for t in 0..4 {
        let addr = server.addr;
        handles.push(thread::spawn(move || {
            let mut stream = TcpStream::connect(addr).unwrap();
            stream
                .set_read_timeout(Some(Duration::from_secs(2)))
                .unwrap();
            for i in 0..25 {
                let key = format!("client_{t}_key_{i}").into_bytes();
                write_command(
                    &mut stream,
                    &Command::Put {
                        key: key.clone(),
                        value: b"v".to_vec(),
                        ttl_ms: 0,
                    },
                )
                .unwrap();
                assert_eq!(read_response(&mut stream).unwrap().status, Status::Ok);

                write_command(&mut stream, &Command::Get { key }).unwrap();
                let response = read_response(&mut stream).unwrap();
                assert_eq!(response.status, Status::Ok);
                assert_eq!(response.payload, Some(b"v".to_vec()));
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    server.stop();
}

#[test]
fn test_data_written_over_wire_survives_restart() {
    let temp = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp.path())
        .num_partitions(4)
        .listen_addr("127.0.0.1:0")
        .build();

    // Phase 1: serve a PUT, then shut everything down.
    {
        let store = Arc::new(PartitionedStore::open(config.clone()).unwrap());
        let server = Server::bind(config.clone(), Arc::clone(&store)).unwrap();
        let addr = server.local_addr().unwrap();
        let shutdown = server.shutdown_handle();
        let handle = thread::spawn(move || server.run().unwrap());

        let mut stream = TcpStream::connect(addr).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        write_command(
            &mut stream,
            &Command::Put {
                key: b"durable".to_vec(),
                value: b"value".to_vec(),
                ttl_ms: 0,
            },
        )
        .unwrap();
        assert_eq!(read_response(&mut stream).unwrap().status, Status::Ok);
        drop(stream);

        shutdown.store(true, Ordering::Relaxed);
        handle.join().unwrap();
        store.shutdown().unwrap();
    }

    // Phase 2: a fresh store on the same directory sees the data.
    let recovered = PartitionedStore::open(config).unwrap();
    assert_eq!(recovered.get(b"durable").unwrap(), Some(b"value".to_vec()));
}
