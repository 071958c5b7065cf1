//! Measurement session lifecycle.
//!
//! [`Machine`] is the bare finite-state machine: an explicit state plus a
//! transition function from device status events to emitted session
//! events. [`ProbeSession`] wraps it with the live plumbing: one
//! subscription per store path, the connectivity monitor, the sample
//! processor, and a single driver task that serializes every mutation.
//!
//! The probe is the source of truth for the lifecycle. The one exception
//! is `request_start`, which transitions optimistically so callers see
//! intent before the device acks, and rolls back if the command publish
//! fails.

use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::config::CoreConfig;
use crate::data::{history, ChannelStates, DeviceStatus, FilterSpec, InstantReading, Reading};
use crate::error::{GatewayError, SessionError};
use crate::events::SessionEvent;
use crate::gateway::{
    DataSyncGateway, FetchOptions, Subscription, COMMAND_PATH, INSTANT_READING_PATH,
    LAST_SEEN_PATH, LATEST_PATH, READINGS_PATH, STATUS_PATH,
};
use crate::monitor::ConnectionMonitor;
use crate::readings::ReadingProcessor;

/// Lifecycle state. Terminal classifications (completed, stopped, error)
/// decay to `Idle` immediately; they exist as events, not states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineState {
    Idle,
    Measuring,
}

/// The measurement state machine, free of any I/O.
#[derive(Debug)]
pub struct Machine {
    state: MachineState,
    last_hr: Option<i32>,
    last_spo2: Option<i32>,
}

impl Machine {
    pub fn new() -> Self {
        Self {
            state: MachineState::Idle,
            last_hr: None,
            last_spo2: None,
        }
    }

    pub fn state(&self) -> MachineState {
        self.state
    }

    /// Record the most recent known vitals, used when a session completes.
    pub fn note_vitals(&mut self, heart_rate: i32, spo2: i32) {
        self.last_hr = Some(heart_rate);
        self.last_spo2 = Some(spo2);
    }

    /// Forget vitals carried over from before this session. Called at
    /// command issuance so a completion without any valid frame cannot
    /// report a previous session's numbers.
    fn clear_vitals(&mut self) {
        self.last_hr = None;
        self.last_spo2 = None;
    }

    /// Apply a device status event and return the session events it
    /// produces. Idempotent on repeated `measuring`; stray terminal
    /// statuses while idle are ignored so a late echo from a previous
    /// session cannot resurrect it.
    pub fn apply_status(&mut self, status: &DeviceStatus) -> Vec<SessionEvent> {
        match (self.state, status) {
            (MachineState::Measuring, DeviceStatus::Measuring) => Vec::new(),
            (MachineState::Measuring, DeviceStatus::Completed) => {
                self.state = MachineState::Idle;
                vec![SessionEvent::MeasurementCompleted {
                    heart_rate: self.last_hr.unwrap_or(0),
                    spo2: self.last_spo2.unwrap_or(0),
                }]
            }
            (MachineState::Measuring, DeviceStatus::Stopped) => {
                self.state = MachineState::Idle;
                vec![SessionEvent::MeasurementStopped]
            }
            (MachineState::Measuring, DeviceStatus::Error(reason)) => {
                self.state = MachineState::Idle;
                vec![SessionEvent::MeasurementError {
                    reason: reason.clone(),
                }]
            }
            // The device says measuring while we think idle: resynchronize,
            // the device wins this race.
            (MachineState::Idle, DeviceStatus::Measuring) => {
                self.state = MachineState::Measuring;
                self.clear_vitals();
                vec![SessionEvent::MeasurementStarted]
            }
            _ => Vec::new(),
        }
    }
}

impl Default for Machine {
    fn default() -> Self {
        Self::new()
    }
}

/// A live monitoring session over one probe.
///
/// Dropping the session (or calling [`ProbeSession::shutdown`]) tears down
/// the driver task and every subscription.
pub struct ProbeSession {
    gateway: Arc<dyn DataSyncGateway>,
    machine: Arc<Mutex<Machine>>,
    events_tx: broadcast::Sender<SessionEvent>,
    connectivity: watch::Receiver<ChannelStates>,
    driver: JoinHandle<()>,
}

impl ProbeSession {
    /// Subscribe to every live path and start the driver task.
    pub async fn start(
        gateway: Arc<dyn DataSyncGateway>,
        config: CoreConfig,
    ) -> Result<Self, GatewayError> {
        let status_sub = gateway.subscribe(STATUS_PATH).await?;
        let heartbeat_sub = gateway.subscribe(LAST_SEEN_PATH).await?;
        let instant_sub = gateway.subscribe(INSTANT_READING_PATH).await?;
        let latest_sub = gateway.subscribe(LATEST_PATH).await?;

        let monitor = ConnectionMonitor::new(config.timing.clone());
        let connectivity = monitor.watch();
        let machine = Arc::new(Mutex::new(Machine::new()));
        let (events_tx, _) = broadcast::channel(64);

        let driver = Driver {
            gateway: gateway.clone(),
            machine: machine.clone(),
            monitor,
            processor: ReadingProcessor::new(),
            events_tx: events_tx.clone(),
            recheck_period: config.timing.recheck_period,
        };
        let handle = tokio::spawn(driver.run(status_sub, heartbeat_sub, instant_sub, latest_sub));

        Ok(Self {
            gateway,
            machine,
            events_tx,
            connectivity,
            driver: handle,
        })
    }

    /// Subscribe to session events. Each receiver sees every event emitted
    /// after it subscribes.
    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events_tx.subscribe()
    }

    /// Observe connectivity snapshots.
    pub fn connectivity(&self) -> watch::Receiver<ChannelStates> {
        self.connectivity.clone()
    }

    pub fn is_measuring(&self) -> bool {
        self.machine.lock().unwrap().state() == MachineState::Measuring
    }

    /// Ask the probe to begin a measurement.
    ///
    /// Requires every channel connected and no measurement in progress.
    /// Transitions to measuring before the publish so the caller's view
    /// reflects intent; a failed publish rolls the transition back and
    /// emits nothing.
    pub async fn request_start(&self) -> Result<(), SessionError> {
        let states = *self.connectivity.borrow();
        if !states.all_connected() {
            return Err(SessionError::NotReady(states));
        }

        {
            let mut machine = self.machine.lock().unwrap();
            if machine.state() == MachineState::Measuring {
                return Err(SessionError::AlreadyMeasuring);
            }
            machine.state = MachineState::Measuring;
            machine.clear_vitals();
        }

        if let Err(e) = self.gateway.publish(COMMAND_PATH, json!("start")).await {
            warn!("start command rejected, rolling back: {}", e);
            self.machine.lock().unwrap().state = MachineState::Idle;
            return Err(e.into());
        }

        info!("measurement started");
        let _ = self.events_tx.send(SessionEvent::MeasurementStarted);
        Ok(())
    }

    /// Ask the probe to stop the current measurement.
    ///
    /// The local transition to idle happens only when the `stopped` status
    /// echo arrives; declaring success before the device confirms would be
    /// a lie.
    pub async fn request_stop(&self) -> Result<(), SessionError> {
        if !self.is_measuring() {
            return Err(SessionError::NotMeasuring);
        }
        self.gateway.publish(COMMAND_PATH, json!("stop")).await?;
        info!("stop requested, awaiting device confirmation");
        Ok(())
    }

    /// Fetch the full reading history, newest first.
    pub async fn fetch_history(&self) -> Result<Vec<Reading>, SessionError> {
        let snapshot = self
            .gateway
            .fetch_once(READINGS_PATH, FetchOptions::default())
            .await?;
        let mut readings = history::decode_collection(&snapshot);
        history::sort_newest_first(&mut readings);
        Ok(readings)
    }

    /// Fetch the history, apply a filter, and announce the result.
    pub async fn filtered_history(&self, spec: &FilterSpec) -> Result<Vec<Reading>, SessionError> {
        let all = self.fetch_history().await?;
        let filtered = history::filter(&all, spec, chrono::Local::now());
        let _ = self
            .events_tx
            .send(SessionEvent::HistoryUpdated(filtered.clone()));
        Ok(filtered)
    }

    /// Fetch the most recent `n` readings, oldest first; the shape chart
    /// windows want.
    pub async fn fetch_recent(&self, n: usize) -> Result<Vec<Reading>, SessionError> {
        let snapshot = self
            .gateway
            .fetch_once(READINGS_PATH, FetchOptions::last_by("timestamp", n))
            .await?;
        let readings = history::decode_collection(&snapshot);
        Ok(history::recent(readings, n))
    }

    /// Tear down the driver task and all subscriptions. Idempotent.
    pub fn shutdown(&self) {
        self.driver.abort();
    }
}

impl Drop for ProbeSession {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

/// The single writer for session state. Runs until every subscription is
/// gone or the session is shut down.
struct Driver {
    gateway: Arc<dyn DataSyncGateway>,
    machine: Arc<Mutex<Machine>>,
    monitor: ConnectionMonitor,
    processor: ReadingProcessor,
    events_tx: broadcast::Sender<SessionEvent>,
    recheck_period: std::time::Duration,
}

impl Driver {
    async fn run(
        mut self,
        mut status_sub: Subscription,
        mut heartbeat_sub: Subscription,
        mut instant_sub: Subscription,
        mut latest_sub: Subscription,
    ) {
        let reachable = self.gateway.check_reachable().await;
        let changed = self.monitor.note_reachable(reachable);
        self.announce(changed);

        let mut tick = interval(self.recheck_period);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                value = status_sub.recv() => match value {
                    Some(value) => self.on_status(value),
                    None => break,
                },
                value = heartbeat_sub.recv() => match value {
                    Some(value) => self.on_heartbeat(value),
                    None => break,
                },
                value = instant_sub.recv() => match value {
                    Some(value) => self.on_instant(value),
                    None => break,
                },
                value = latest_sub.recv() => match value {
                    Some(value) => self.on_latest(value),
                    None => break,
                },
                _ = tick.tick() => {
                    let reachable = self.gateway.check_reachable().await;
                    let changed = self.monitor.note_reachable(reachable);
                    self.announce(changed);
                    let changed = self.monitor.recheck();
                    self.announce(changed);
                }
            }
        }

        debug!("session driver stopped");
    }

    fn on_status(&mut self, value: Value) {
        let status = value.as_str().and_then(DeviceStatus::parse);
        let changed = self.monitor.note_status(status.clone());
        self.announce(changed);

        let Some(status) = status else { return };
        let emitted = self.machine.lock().unwrap().apply_status(&status);

        let terminal = emitted.iter().any(|e| {
            matches!(
                e,
                SessionEvent::MeasurementCompleted { .. }
                    | SessionEvent::MeasurementStopped
                    | SessionEvent::MeasurementError { .. }
            )
        });
        for event in emitted {
            let _ = self.events_tx.send(event);
        }
        if terminal {
            self.processor.reset();
        }
    }

    fn on_heartbeat(&mut self, value: Value) {
        // Payload is the device's last-seen timestamp in epoch seconds;
        // its age against our clock decides staleness, so a value persisted
        // by a dead device never reads as a live heartbeat
        let Some(last_seen) = value.as_i64() else {
            if !value.is_null() {
                warn!("ignoring malformed heartbeat: {}", value);
            }
            return;
        };
        let changed = self.monitor.note_heartbeat(last_seen);
        self.announce(changed);
    }

    fn on_instant(&mut self, value: Value) {
        if self.machine.lock().unwrap().state() != MachineState::Measuring {
            return;
        }
        let sample: InstantReading = match serde_json::from_value(value) {
            Ok(sample) => sample,
            Err(e) => {
                warn!("ignoring malformed instant sample: {}", e);
                return;
            }
        };

        let update = self.processor.on_sample(&sample);
        if let Some((hr, spo2)) = update.vitals {
            self.machine.lock().unwrap().note_vitals(hr, spo2);
        }
        let _ = self.events_tx.send(SessionEvent::MeasurementProgress {
            percent: update.progress.percent,
            seconds_remaining: update.progress.seconds_remaining,
        });
    }

    fn on_latest(&mut self, value: Value) {
        if value.is_null() {
            return;
        }
        let reading: Reading = match serde_json::from_value(value) {
            Ok(reading) => reading,
            Err(e) => {
                warn!("ignoring malformed latest reading: {}", e);
                return;
            }
        };
        if !reading.is_well_formed() {
            warn!("ignoring malformed latest reading: hr={}", reading.heart_rate);
            return;
        }

        self.machine
            .lock()
            .unwrap()
            .note_vitals(reading.heart_rate, reading.spo2);

        // While measuring the latest record is the previous session's; it
        // is surfaced only once the session is idle again.
        if self.machine.lock().unwrap().state() == MachineState::Idle {
            let _ = self.events_tx.send(SessionEvent::LatestReading(reading));
        }
    }

    fn announce(&self, changed: Option<ChannelStates>) {
        if let Some(states) = changed {
            let _ = self.events_tx.send(SessionEvent::ConnectivityChanged {
                store: states.store,
                sensor: states.sensor,
                device: states.device,
            });
        }
    }
}
