//! Data sync gateway abstraction.
//!
//! All communication with the realtime store goes through the
//! [`DataSyncGateway`] trait: path-keyed subscriptions, one-shot fetches,
//! and publishes. The session logic never sees a transport, which keeps it
//! testable against [`MemoryGateway`] and deployable against
//! [`TcpGateway`].

mod memory;
mod tcp;

pub use memory::MemoryGateway;
pub use tcp::TcpGateway;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::GatewayError;

/// Device status string, written by the probe.
pub const STATUS_PATH: &str = "status";
/// Epoch-millisecond heartbeat, refreshed by the probe every few seconds.
pub const LAST_SEEN_PATH: &str = "lastSeen";
/// Live per-second sample during a measurement.
pub const INSTANT_READING_PATH: &str = "instantReading";
/// Most recent finalized reading.
pub const LATEST_PATH: &str = "latest";
/// Collection of all finalized readings.
pub const READINGS_PATH: &str = "readings";
/// Command word consumed by the probe ("start" / "stop").
pub const COMMAND_PATH: &str = "command";

/// Options for a one-shot fetch.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Child field to order by before applying `limit_to_last`.
    pub order_by: Option<String>,
    /// Keep only the last N children in `order_by` order.
    pub limit_to_last: Option<usize>,
}

impl FetchOptions {
    /// The last `n` children ordered by `field`.
    pub fn last_by(field: &str, n: usize) -> Self {
        Self {
            order_by: Some(field.to_string()),
            limit_to_last: Some(n),
        }
    }
}

/// A live subscription to one store path.
///
/// Values arrive in publish order. Dropping the subscription (or calling
/// [`Subscription::cancel`]) detaches it from the gateway; the producer
/// side notices on its next send and stops forwarding.
#[derive(Debug)]
pub struct Subscription {
    path: String,
    rx: mpsc::Receiver<Value>,
}

impl Subscription {
    pub fn new(path: impl Into<String>, rx: mpsc::Receiver<Value>) -> Self {
        Self {
            path: path.into(),
            rx,
        }
    }

    /// Receive the next value. Returns `None` once the subscription is
    /// cancelled and drained, or the gateway has shut down.
    pub async fn recv(&mut self) -> Option<Value> {
        self.rx.recv().await
    }

    /// Stop receiving further values. Idempotent; values already queued
    /// may still be returned by [`Subscription::recv`].
    pub fn cancel(&mut self) {
        self.rx.close();
    }

    /// The store path this subscription observes.
    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Boundary between the session core and the realtime store.
///
/// Implementations must deliver the current value of a path immediately on
/// subscribe (or `Value::Null` if the path is empty), then every subsequent
/// change in order.
#[async_trait]
pub trait DataSyncGateway: Send + Sync {
    /// Observe a path. The first received value is the path's current state.
    async fn subscribe(&self, path: &str) -> Result<Subscription, GatewayError>;

    /// Read a path once, optionally ordered and truncated.
    async fn fetch_once(&self, path: &str, options: FetchOptions) -> Result<Value, GatewayError>;

    /// Write a value to a path.
    async fn publish(&self, path: &str, value: Value) -> Result<(), GatewayError>;

    /// Whether the store itself is currently reachable.
    async fn check_reachable(&self) -> bool;
}

/// Apply [`FetchOptions`] to a fetched collection value.
///
/// Ordering and truncation only make sense for object maps and arrays;
/// scalar values pass through untouched. Children missing the `order_by`
/// field sort first, matching store semantics where absent keys order
/// before present ones.
pub(crate) fn apply_fetch_options(value: Value, options: &FetchOptions) -> Value {
    let (Some(field), Some(limit)) = (&options.order_by, options.limit_to_last) else {
        return value;
    };

    let mut children: Vec<Value> = match value {
        Value::Object(map) => map.into_iter().map(|(_, v)| v).collect(),
        Value::Array(items) => items,
        other => return other,
    };

    children.sort_by(|a, b| {
        let key_a = a.get(field).and_then(Value::as_i64);
        let key_b = b.get(field).and_then(Value::as_i64);
        key_a.cmp(&key_b)
    });

    let skip = children.len().saturating_sub(limit);
    Value::Array(children.split_off(skip))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fetch_options_pass_through_without_limit() {
        let value = json!({ "a": 1, "b": 2 });
        let out = apply_fetch_options(value.clone(), &FetchOptions::default());
        assert_eq!(out, value);
    }

    #[test]
    fn test_limit_to_last_keeps_largest_keys() {
        let value = json!({
            "r1": { "timestamp": 100 },
            "r2": { "timestamp": 300 },
            "r3": { "timestamp": 200 }
        });
        let out = apply_fetch_options(value, &FetchOptions::last_by("timestamp", 2));
        assert_eq!(
            out,
            json!([{ "timestamp": 200 }, { "timestamp": 300 }])
        );
    }

    #[test]
    fn test_missing_order_field_sorts_first() {
        let value = json!([
            { "timestamp": 100 },
            { "other": true },
            { "timestamp": 50 }
        ]);
        let out = apply_fetch_options(value, &FetchOptions::last_by("timestamp", 2));
        assert_eq!(
            out,
            json!([{ "timestamp": 50 }, { "timestamp": 100 }])
        );
    }

    #[test]
    fn test_scalars_pass_through() {
        let out = apply_fetch_options(json!("ready"), &FetchOptions::last_by("timestamp", 1));
        assert_eq!(out, json!("ready"));
    }

    #[tokio::test]
    async fn test_subscription_cancel_is_idempotent() {
        let (tx, rx) = mpsc::channel(4);
        let mut sub = Subscription::new("status", rx);
        tx.send(json!("ready")).await.unwrap();

        sub.cancel();
        sub.cancel();

        // Queued value still drains, then the channel reports closed
        assert_eq!(sub.recv().await, Some(json!("ready")));
        assert_eq!(sub.recv().await, None);
        assert!(tx.send(json!("measuring")).await.is_err());
    }
}
