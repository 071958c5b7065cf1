//! Session event stream.
//!
//! Every externally observable state change is announced exactly once on a
//! broadcast channel. Frontends subscribe with [`crate::session::ProbeSession::events`]
//! and render; they never poll internal state.

use crate::data::{ConnectivityState, ErrorReason, Reading};

/// An observable state change in the session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// One or more connectivity channels changed. Carries the full snapshot
    /// so consumers never need to track deltas.
    ConnectivityChanged {
        store: ConnectivityState,
        sensor: ConnectivityState,
        device: ConnectivityState,
    },

    /// A measurement began, either locally requested or observed remotely.
    MeasurementStarted,

    /// Live progress during an active measurement.
    MeasurementProgress {
        /// Completion percentage, clamped to `0..=100`.
        percent: u8,
        /// Seconds remaining as reported by the probe. May be negative if
        /// the probe overruns; display code clamps.
        seconds_remaining: i32,
    },

    /// The measurement finished with a final reading.
    MeasurementCompleted { heart_rate: i32, spo2: i32 },

    /// The measurement was stopped before completion.
    MeasurementStopped,

    /// The measurement failed on the probe.
    MeasurementError { reason: ErrorReason },

    /// A fresh history snapshot, newest first.
    HistoryUpdated(Vec<Reading>),

    /// The most recent finalized reading changed.
    LatestReading(Reading),
}
