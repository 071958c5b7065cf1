//! # pulsewatch
//!
//! Client core for monitoring a fingertip heart-rate/SpO2 probe through a
//! realtime data store.
//!
//! The probe publishes its state to a handful of well-known store paths:
//! a status string, a heartbeat timestamp, a streamed per-second sample
//! while measuring, and finalized readings. This crate consumes those
//! paths through an abstract gateway, fuses them into a tri-state
//! connectivity model, drives the measurement lifecycle, and serves
//! filtered history.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       ProbeSession                           │
//! │  ┌──────────────┐   ┌─────────────────┐   ┌──────────────┐  │
//! │  │ Connection   │   │ Measurement     │   │ Reading      │  │
//! │  │ Monitor      │   │ state machine   │   │ Processor    │  │
//! │  └──────┬───────┘   └────────┬────────┘   └──────┬───────┘  │
//! │         └────────────────────┼───────────────────┘          │
//! │                              │ SessionEvent broadcast       │
//! └──────────────────────────────┼──────────────────────────────┘
//!                                │
//!                   ┌────────────┴────────────┐
//!                   │    DataSyncGateway      │
//!                   │  MemoryGateway | TCP    │
//!                   └─────────────────────────┘
//! ```
//!
//! - **[`gateway`]**: the store boundary, with subscriptions, one-shot
//!   fetches, and publishes over an abstract trait
//! - **[`session`]**: the measurement lifecycle and the single driver
//!   task that serializes all state mutation
//! - **[`monitor`]**: connectivity fusion from reachability, status, and
//!   heartbeat age
//! - **[`readings`]**: instant sample validation, progress, and display
//!   smoothing
//! - **[`data`]**: models, history filtering, and CSV export
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use pulsewatch::config::CoreConfig;
//! use pulsewatch::gateway::MemoryGateway;
//! use pulsewatch::session::ProbeSession;
//!
//! # tokio_test::block_on(async {
//! let gateway = Arc::new(MemoryGateway::new());
//! let session = ProbeSession::start(gateway, CoreConfig::default())
//!     .await
//!     .unwrap();
//! let mut events = session.events();
//! while let Ok(event) = events.recv().await {
//!     println!("{:?}", event);
//! }
//! # });
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod events;
pub mod gateway;
pub mod monitor;
pub mod readings;
pub mod session;

pub use config::{CoreConfig, SmoothingConfig, TimingConfig};
pub use data::{
    ChannelStates, ConnectivityState, DeviceStatus, ErrorReason, FilterSpec, HealthStatus,
    InstantReading, Reading,
};
pub use error::{ExportError, GatewayError, SessionError};
pub use events::SessionEvent;
pub use gateway::{DataSyncGateway, FetchOptions, MemoryGateway, Subscription, TcpGateway};
pub use monitor::ConnectionMonitor;
pub use readings::ReadingProcessor;
pub use session::ProbeSession;
