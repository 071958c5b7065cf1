//! Data models and processing.
//!
//! Everything the core knows how to say about the probe lives here: the
//! tri-state connectivity model, the device status vocabulary, reading
//! records, history filtering, and the CSV export artifact.

pub mod connectivity;
pub mod duration;
pub mod export;
pub mod history;
pub mod reading;
pub mod status;

pub use connectivity::{ChannelStates, ConnectivityState};
pub use history::FilterSpec;
pub use reading::{HealthStatus, InstantReading, Reading};
pub use status::{DeviceStatus, ErrorReason};
