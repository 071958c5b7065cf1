//! Connectivity fusion.
//!
//! Three channels, three signal sources with different freshness semantics:
//! the store channel follows gateway reachability, while the sensor and
//! device channels are fused from the probe's status string and heartbeat
//! age. The fusion itself is a pure function ([`evaluate`]) so every rule
//! is testable without a running session; [`ConnectionMonitor`] adds the
//! stateful part: caching inputs, publishing snapshots, and reporting only
//! actual changes.

use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info};

use crate::config::TimingConfig;
use crate::data::{ChannelStates, ConnectivityState, DeviceStatus};

/// Compute the three channel states from current evidence.
///
/// The store channel is binary: reachable or not, never connecting. The
/// sensor and device channels move together, derived from the status
/// string. Any recognized status is proof of a live device, an
/// unrecognized non-empty value is ambiguous (connecting), and an absent
/// value is proven absence. A heartbeat older than the liveness window
/// overrides whatever the status claims, since a stale status string can
/// lie about an unplugged device.
pub fn evaluate(
    reachable: bool,
    status: Option<&DeviceStatus>,
    heartbeat_age: Option<Duration>,
    timing: &TimingConfig,
) -> ChannelStates {
    let store = if reachable {
        ConnectivityState::Connected
    } else {
        ConnectivityState::Disconnected
    };

    let from_status = match status {
        Some(DeviceStatus::Ready)
        | Some(DeviceStatus::Measuring)
        | Some(DeviceStatus::Completed)
        | Some(DeviceStatus::Stopped)
        | Some(DeviceStatus::Error(_)) => ConnectivityState::Connected,
        Some(DeviceStatus::Unknown(_)) => ConnectivityState::Connecting,
        None => ConnectivityState::Disconnected,
    };

    let device = match heartbeat_age {
        Some(age) if timing.is_stale(age) => ConnectivityState::Disconnected,
        _ => from_status,
    };

    ChannelStates {
        store,
        sensor: device,
        device,
    }
}

/// Stateful connectivity tracker.
///
/// Owned and driven by the session loop, which is the single writer for
/// connectivity state: status pushes, heartbeat pushes, and the periodic
/// staleness recheck all funnel through here.
#[derive(Debug)]
pub struct ConnectionMonitor {
    timing: TimingConfig,
    reachable: bool,
    status: Option<DeviceStatus>,
    /// Heartbeat payload: epoch seconds from the device's clock.
    last_seen: Option<i64>,
    states_tx: watch::Sender<ChannelStates>,
}

impl ConnectionMonitor {
    pub fn new(timing: TimingConfig) -> Self {
        Self {
            timing,
            reachable: false,
            status: None,
            last_seen: None,
            states_tx: watch::channel(ChannelStates::default()).0,
        }
    }

    /// A receiver that observes every connectivity change.
    pub fn watch(&self) -> watch::Receiver<ChannelStates> {
        self.states_tx.subscribe()
    }

    /// The current snapshot.
    pub fn states(&self) -> ChannelStates {
        *self.states_tx.borrow()
    }

    /// Record a status push. `None` means the path was cleared.
    pub fn note_status(&mut self, status: Option<DeviceStatus>) -> Option<ChannelStates> {
        self.status = status;
        self.refresh()
    }

    /// Record a heartbeat push carrying the device's last-seen timestamp
    /// in epoch seconds. Staleness is the payload's age against the client
    /// clock, so a timestamp persisted by a long-dead device is stale on
    /// its very first delivery.
    pub fn note_heartbeat(&mut self, last_seen_secs: i64) -> Option<ChannelStates> {
        self.last_seen = Some(last_seen_secs);
        self.refresh()
    }

    /// Record the result of a reachability probe.
    pub fn note_reachable(&mut self, reachable: bool) -> Option<ChannelStates> {
        self.reachable = reachable;
        self.refresh()
    }

    /// Periodic re-evaluation. Catches a device that went silent without
    /// ever publishing a final status.
    pub fn recheck(&mut self) -> Option<ChannelStates> {
        self.refresh()
    }

    /// Re-run the fusion; returns the new snapshot only when at least one
    /// channel actually changed.
    fn refresh(&mut self) -> Option<ChannelStates> {
        self.refresh_at(chrono::Utc::now().timestamp())
    }

    fn refresh_at(&mut self, now_secs: i64) -> Option<ChannelStates> {
        // A device clock slightly ahead of ours reads as age zero
        let heartbeat_age = self
            .last_seen
            .map(|seen| Duration::from_secs((now_secs - seen).max(0) as u64));
        let next = evaluate(
            self.reachable,
            self.status.as_ref(),
            heartbeat_age,
            &self.timing,
        );

        let changed = self.states_tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });

        if changed {
            info!("connectivity changed: {}", next);
            Some(next)
        } else {
            debug!("connectivity unchanged: {}", next);
            None
        }
    }
}
