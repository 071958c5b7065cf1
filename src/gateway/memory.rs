//! In-memory gateway.
//!
//! Backs the session tests and local demos: every path is a watch channel,
//! so subscribers get the current value on attach and each change after.
//! Reachability and publish failures can be injected to exercise the
//! offline and rollback paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tracing::debug;

use super::{apply_fetch_options, DataSyncGateway, FetchOptions, Subscription};
use crate::error::GatewayError;

/// A gateway over process-local state.
#[derive(Debug, Clone)]
pub struct MemoryGateway {
    paths: Arc<Mutex<HashMap<String, watch::Sender<Option<Value>>>>>,
    reachable: Arc<AtomicBool>,
    fail_publishes: Arc<AtomicBool>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self {
            paths: Arc::new(Mutex::new(HashMap::new())),
            reachable: Arc::new(AtomicBool::new(true)),
            fail_publishes: Arc::new(AtomicBool::new(false)),
        }
    }

    fn sender_for(&self, path: &str) -> watch::Sender<Option<Value>> {
        let mut paths = self.paths.lock().unwrap();
        paths
            .entry(path.to_string())
            .or_insert_with(|| watch::channel(None).0)
            .clone()
    }

    /// Set a path's value directly, bypassing publish failure injection.
    /// This is the "remote device wrote something" side of the store.
    pub fn put(&self, path: &str, value: Value) {
        self.sender_for(path).send_replace(Some(value));
    }

    /// The current value of a path, if any.
    pub fn get(&self, path: &str) -> Option<Value> {
        let paths = self.paths.lock().unwrap();
        paths.get(path).and_then(|tx| tx.borrow().clone())
    }

    /// Toggle simulated store reachability.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// When set, every publish fails with a rejection.
    pub fn set_publish_error(&self, fail: bool) {
        self.fail_publishes.store(fail, Ordering::SeqCst);
    }
}

impl Default for MemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataSyncGateway for MemoryGateway {
    async fn subscribe(&self, path: &str) -> Result<Subscription, GatewayError> {
        let sender = self.sender_for(path);
        let mut watch_rx = sender.subscribe();
        // Force the current value (even an initial None) to be delivered
        watch_rx.mark_changed();

        let (tx, rx) = mpsc::channel(16);
        let path_owned = path.to_string();
        tokio::spawn(async move {
            while watch_rx.changed().await.is_ok() {
                let value = watch_rx.borrow_and_update().clone();
                let value = value.unwrap_or(Value::Null);
                if tx.send(value).await.is_err() {
                    debug!("subscriber for '{}' detached", path_owned);
                    break;
                }
            }
        });

        Ok(Subscription::new(path, rx))
    }

    async fn fetch_once(&self, path: &str, options: FetchOptions) -> Result<Value, GatewayError> {
        if !self.reachable.load(Ordering::SeqCst) {
            return Err(GatewayError::Fetch {
                path: path.to_string(),
                reason: "store unreachable".to_string(),
            });
        }
        let value = self.get(path).unwrap_or(Value::Null);
        Ok(apply_fetch_options(value, &options))
    }

    async fn publish(&self, path: &str, value: Value) -> Result<(), GatewayError> {
        if self.fail_publishes.load(Ordering::SeqCst) {
            return Err(GatewayError::Publish {
                path: path.to_string(),
                reason: "write rejected".to_string(),
            });
        }
        self.put(path, value);
        Ok(())
    }

    async fn check_reachable(&self) -> bool {
        self.reachable.load(Ordering::SeqCst)
    }
}
