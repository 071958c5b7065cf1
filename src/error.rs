//! Error types for the client core.
//!
//! Nothing here is fatal: transport failures are surfaced to the caller and
//! retryable, and everything else resolves to an event or a skipped record.

use thiserror::Error;

use crate::data::ChannelStates;

/// Errors produced by a gateway implementation.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Connection to the store failed or was lost.
    #[error("connection failed: {0}")]
    Connection(String),

    /// A publish was rejected by the store.
    #[error("publish to '{path}' rejected: {reason}")]
    Publish { path: String, reason: String },

    /// A one-shot fetch failed.
    #[error("fetch from '{path}' failed: {reason}")]
    Fetch { path: String, reason: String },

    /// The gateway has shut down and can no longer serve requests.
    #[error("gateway closed")]
    Closed,
}

/// Errors surfaced by the measurement session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Start was requested before every channel reported connected.
    #[error("device not ready ({0})")]
    NotReady(ChannelStates),

    /// Start was requested while a measurement is already running.
    #[error("a measurement is already in progress")]
    AlreadyMeasuring,

    /// Stop was requested with no measurement running.
    #[error("no measurement in progress")]
    NotMeasuring,

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Errors from the CSV export path.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("no readings to export")]
    Empty,

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
