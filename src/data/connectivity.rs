//! Tri-state connectivity model for the three monitored channels.
//!
//! The store channel reflects gateway reachability, while the sensor and
//! device channels are derived from the probe's status string and heartbeat.
//! Only the connection monitor mutates these values.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Connectivity state for a single channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectivityState {
    Connected,
    Connecting,
    Disconnected,
}

impl ConnectivityState {
    /// Returns a short symbol for display.
    pub fn symbol(&self) -> &'static str {
        match self {
            ConnectivityState::Connected => "OK",
            ConnectivityState::Connecting => "...",
            ConnectivityState::Disconnected => "DOWN",
        }
    }
}

impl fmt::Display for ConnectivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectivityState::Connected => "connected",
            ConnectivityState::Connecting => "connecting",
            ConnectivityState::Disconnected => "disconnected",
        };
        f.write_str(s)
    }
}

/// The connectivity of all three channels: data store, sensor, and the
/// device carrying the sensor.
///
/// Starts fully disconnected; every channel has to be proven live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelStates {
    pub store: ConnectivityState,
    pub sensor: ConnectivityState,
    pub device: ConnectivityState,
}

impl Default for ChannelStates {
    fn default() -> Self {
        Self {
            store: ConnectivityState::Disconnected,
            sensor: ConnectivityState::Disconnected,
            device: ConnectivityState::Disconnected,
        }
    }
}

impl ChannelStates {
    /// True when every channel is connected; the precondition for starting
    /// a measurement.
    pub fn all_connected(&self) -> bool {
        self.store == ConnectivityState::Connected
            && self.sensor == ConnectivityState::Connected
            && self.device == ConnectivityState::Connected
    }

    /// True when at least one channel is fully disconnected.
    pub fn any_disconnected(&self) -> bool {
        self.store == ConnectivityState::Disconnected
            || self.sensor == ConnectivityState::Disconnected
            || self.device == ConnectivityState::Disconnected
    }
}

impl fmt::Display for ChannelStates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "store={} sensor={} device={}",
            self.store, self.sensor, self.device
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_fully_disconnected() {
        let states = ChannelStates::default();
        assert!(!states.all_connected());
        assert!(states.any_disconnected());
    }

    #[test]
    fn test_all_connected_requires_every_channel() {
        let mut states = ChannelStates {
            store: ConnectivityState::Connected,
            sensor: ConnectivityState::Connected,
            device: ConnectivityState::Connected,
        };
        assert!(states.all_connected());
        assert!(!states.any_disconnected());

        states.sensor = ConnectivityState::Connecting;
        assert!(!states.all_connected());
        // Connecting is not Disconnected
        assert!(!states.any_disconnected());

        states.sensor = ConnectivityState::Disconnected;
        assert!(states.any_disconnected());
    }

    #[test]
    fn test_display() {
        let states = ChannelStates::default();
        assert_eq!(
            states.to_string(),
            "store=disconnected sensor=disconnected device=disconnected"
        );
    }
}
