//! End-to-end tests over a real socket.

use herdb_core::{Config, Store};
use herdb_server::{HerdbClient, HerdbServer, ServerConfig, ServerError};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

struct Running {
    addr: SocketAddr,
    store: Arc<Store>,
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl Running {
    async fn stop(self) -> Arc<Store> {
        let _ = self.stop.send(());
        self.task.await.unwrap();
        self.store
    }
}

async fn start(config: ServerConfig) -> Running {
    let store = Arc::new(Store::open_in_memory(Config::new().segments(2).initial_capacity(16)).unwrap());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop, stopped) = oneshot::channel::<()>();
    let server = HerdbServer::new(config, Arc::clone(&store));
    let task = tokio::spawn(async move {
        server
            .serve(listener, async {
                let _ = stopped.await;
            })
            .await
            .unwrap();
    });
    Running {
        addr,
        store,
        stop,
        task,
    }
}

#[tokio::test]
async fn put_and_get_over_tcp() {
    let running = start(ServerConfig::default()).await;
    let mut client = HerdbClient::connect(running.addr).await.unwrap();

    client.put(b"language", b"rust").await.unwrap();
    client.put(b"empty", b"").await.unwrap();
    assert_eq!(client.get(b"language").await.unwrap(), Some(b"rust".to_vec()));
    assert_eq!(client.get(b"empty").await.unwrap(), Some(Vec::new()));
    assert_eq!(client.get(b"missing").await.unwrap(), None);

    let store = running.stop().await;
    assert_eq!(store.get(b"language").unwrap(), Some(b"rust".to_vec()));
}

#[tokio::test]
async fn store_errors_reach_the_client() {
    let running = start(ServerConfig::default()).await;
    let mut client = HerdbClient::connect(running.addr).await.unwrap();
    assert!(matches!(client.put(b"", b"v").await, Err(ServerError::Remote(_))));
    // The connection stays usable.
    client.put(b"k", b"v").await.unwrap();
    running.stop().await;
}

#[tokio::test]
async fn token_is_required_when_configured() {
    let running = start(ServerConfig::default().with_auth("funer")).await;
    let mut client = HerdbClient::connect(running.addr).await.unwrap();

    assert!(matches!(client.get(b"k").await, Err(ServerError::Unauthorized)));
    assert!(matches!(client.auth(b"nope").await, Err(ServerError::Unauthorized)));
    client.auth(b"funer").await.unwrap();
    client.put(b"k", b"v").await.unwrap();
    assert_eq!(client.get(b"k").await.unwrap(), Some(b"v".to_vec()));

    // Authentication is per connection.
    let mut other = HerdbClient::connect(running.addr).await.unwrap();
    assert!(matches!(other.get(b"k").await, Err(ServerError::Unauthorized)));
    running.stop().await;
}

#[tokio::test]
async fn oversized_frame_closes_connection() {
    let running = start(ServerConfig::default().with_max_frame_size(64)).await;
    let mut socket = TcpStream::connect(running.addr).await.unwrap();
    socket.write_all(&1024u32.to_be_bytes()).await.unwrap();

    let mut buf = [0u8; 8];
    let read = socket.read(&mut buf).await.unwrap_or(0);
    assert_eq!(read, 0);
    running.stop().await;
}

#[tokio::test]
async fn many_clients_in_parallel() {
    let running = start(ServerConfig::default()).await;
    let mut handles = Vec::new();
    for c in 0..8u32 {
        let addr = running.addr;
        handles.push(tokio::spawn(async move {
            let mut client = HerdbClient::connect(addr).await.unwrap();
            for i in 0..50u32 {
                let key = format!("c{c}-{i}");
                client.put(key.as_bytes(), &i.to_be_bytes()).await.unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let mut client = HerdbClient::connect(running.addr).await.unwrap();
    for c in 0..8u32 {
        for i in 0..50u32 {
            let key = format!("c{c}-{i}");
            assert_eq!(client.get(key.as_bytes()).await.unwrap(), Some(i.to_be_bytes().to_vec()));
        }
    }
    let store = running.stop().await;
    assert_eq!(store.stats().unwrap().keys(), 400);
}
