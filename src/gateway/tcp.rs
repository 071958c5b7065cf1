//! TCP gateway speaking newline-delimited JSON.
//!
//! Each line on the wire is one [`WireUpdate`]: a path and its new value.
//! The bridge process on the other end mirrors the realtime store both
//! ways, echoing writes back as updates so every client converges on the
//! same view.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::net::ToSocketAddrs;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{apply_fetch_options, DataSyncGateway, FetchOptions, Subscription};
use crate::error::GatewayError;

/// One line on the wire, in either direction.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireUpdate {
    path: String,
    value: Value,
}

#[derive(Debug, Default)]
struct Shared {
    /// Last value seen for each path. Serves fetches and the initial
    /// delivery on subscribe.
    cache: HashMap<String, Value>,
    /// Live subscribers per path.
    subscribers: HashMap<String, Vec<mpsc::Sender<Value>>>,
}

/// A gateway over a single TCP connection to a store bridge.
#[derive(Debug)]
pub struct TcpGateway {
    shared: Arc<Mutex<Shared>>,
    writer: tokio::sync::Mutex<OwnedWriteHalf>,
    connected: Arc<AtomicBool>,
}

impl TcpGateway {
    /// Connect to a bridge and start the read loop.
    pub async fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self, GatewayError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| GatewayError::Connection(e.to_string()))?;
        let (read_half, write_half) = stream.into_split();

        let shared = Arc::new(Mutex::new(Shared::default()));
        let connected = Arc::new(AtomicBool::new(true));

        tokio::spawn(read_loop(
            read_half,
            shared.clone(),
            connected.clone(),
        ));

        info!("connected to store bridge");
        Ok(Self {
            shared,
            writer: tokio::sync::Mutex::new(write_half),
            connected,
        })
    }
}

/// Read NDJSON updates until EOF or error, updating the cache and fanning
/// out to subscribers.
async fn read_loop(
    read_half: OwnedReadHalf,
    shared: Arc<Mutex<Shared>>,
    connected: Arc<AtomicBool>,
) {
    let mut reader = BufReader::new(read_half);
    let mut line = String::new();

    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                warn!("store bridge closed the connection");
                break;
            }
            Ok(_) => {
                let update: WireUpdate = match serde_json::from_str(line.trim()) {
                    Ok(update) => update,
                    Err(e) => {
                        warn!("ignoring malformed wire line: {}", e);
                        continue;
                    }
                };

                let senders: Vec<mpsc::Sender<Value>> = {
                    let mut shared = shared.lock().unwrap();
                    shared
                        .cache
                        .insert(update.path.clone(), update.value.clone());
                    shared
                        .subscribers
                        .get(&update.path)
                        .map(|subs| subs.to_vec())
                        .unwrap_or_default()
                };

                // Sends happen outside the lock; detached receivers are
                // pruned afterwards.
                let mut any_closed = false;
                for sender in &senders {
                    if sender.send(update.value.clone()).await.is_err() {
                        any_closed = true;
                    }
                }
                if any_closed {
                    let mut shared = shared.lock().unwrap();
                    if let Some(subs) = shared.subscribers.get_mut(&update.path) {
                        subs.retain(|s| !s.is_closed());
                    }
                    debug!("pruned detached subscribers for '{}'", update.path);
                }
            }
            Err(e) => {
                warn!("read error from store bridge: {}", e);
                break;
            }
        }
    }

    connected.store(false, Ordering::SeqCst);
}

#[async_trait]
impl DataSyncGateway for TcpGateway {
    async fn subscribe(&self, path: &str) -> Result<Subscription, GatewayError> {
        let (tx, rx) = mpsc::channel(16);

        let current = {
            let mut shared = self.shared.lock().unwrap();
            shared
                .subscribers
                .entry(path.to_string())
                .or_default()
                .push(tx.clone());
            shared.cache.get(path).cloned()
        };

        // Deliver the current state first so subscribers never start blind
        let initial = current.unwrap_or(Value::Null);
        tx.send(initial)
            .await
            .map_err(|_| GatewayError::Closed)?;

        Ok(Subscription::new(path, rx))
    }

    async fn fetch_once(&self, path: &str, options: FetchOptions) -> Result<Value, GatewayError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(GatewayError::Fetch {
                path: path.to_string(),
                reason: "connection lost".to_string(),
            });
        }
        let value = {
            let shared = self.shared.lock().unwrap();
            shared.cache.get(path).cloned().unwrap_or(Value::Null)
        };
        Ok(apply_fetch_options(value, &options))
    }

    async fn publish(&self, path: &str, value: Value) -> Result<(), GatewayError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(GatewayError::Publish {
                path: path.to_string(),
                reason: "connection lost".to_string(),
            });
        }

        let update = WireUpdate {
            path: path.to_string(),
            value,
        };
        let mut line = serde_json::to_string(&update).map_err(|e| GatewayError::Publish {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
        line.push('\n');

        let mut writer = self.writer.lock().await;
        writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| GatewayError::Publish {
                path: path.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    async fn check_reachable(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    async fn bridge_pair() -> (TcpGateway, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (gateway, server) =
            tokio::join!(TcpGateway::connect(addr), async {
                listener.accept().await.unwrap().0
            });
        (gateway.unwrap(), server)
    }

    #[tokio::test]
    async fn test_updates_reach_subscribers() {
        let (gateway, mut server) = bridge_pair().await;
        let mut sub = gateway.subscribe("status").await.unwrap();
        // Cache is empty at subscribe time
        assert_eq!(sub.recv().await, Some(Value::Null));

        server
            .write_all(b"{\"path\":\"status\",\"value\":\"ready\"}\n")
            .await
            .unwrap();
        assert_eq!(sub.recv().await, Some(json!("ready")));
    }

    #[tokio::test]
    async fn test_late_subscriber_gets_cached_value() {
        let (gateway, mut server) = bridge_pair().await;
        server
            .write_all(b"{\"path\":\"lastSeen\",\"value\":1700000000000}\n")
            .await
            .unwrap();

        // Wait until the read loop has absorbed the line
        let mut probe = gateway.subscribe("lastSeen").await.unwrap();
        let mut first = probe.recv().await.unwrap();
        while first == Value::Null {
            first = probe.recv().await.unwrap();
        }
        assert_eq!(first, json!(1_700_000_000_000_i64));

        let mut sub = gateway.subscribe("lastSeen").await.unwrap();
        assert_eq!(sub.recv().await, Some(json!(1_700_000_000_000_i64)));
    }

    #[tokio::test]
    async fn test_publish_writes_a_wire_line() {
        let (gateway, mut server) = bridge_pair().await;
        gateway.publish("command", json!("start")).await.unwrap();

        let mut buf = vec![0u8; 128];
        let n = server.read(&mut buf).await.unwrap();
        let line = String::from_utf8_lossy(&buf[..n]);
        let update: WireUpdate = serde_json::from_str(line.trim()).unwrap();
        assert_eq!(update.path, "command");
        assert_eq!(update.value, json!("start"));
    }

    #[tokio::test]
    async fn test_disconnect_flips_reachability() {
        let (gateway, server) = bridge_pair().await;
        assert!(gateway.check_reachable().await);

        drop(server);
        // The read loop notices EOF shortly after
        for _ in 0..50 {
            if !gateway.check_reachable().await {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(!gateway.check_reachable().await);
        assert!(gateway.publish("command", json!("stop")).await.is_err());
    }

    #[tokio::test]
    async fn test_malformed_lines_are_skipped() {
        let (gateway, mut server) = bridge_pair().await;
        let mut sub = gateway.subscribe("status").await.unwrap();
        assert_eq!(sub.recv().await, Some(Value::Null));

        server.write_all(b"not json at all\n").await.unwrap();
        server
            .write_all(b"{\"path\":\"status\",\"value\":\"measuring\"}\n")
            .await
            .unwrap();
        assert_eq!(sub.recv().await, Some(json!("measuring")));
    }
}
