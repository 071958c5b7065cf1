//! Runtime configuration.
//!
//! Timing and smoothing knobs with defaults tuned to the probe firmware's
//! 2-second heartbeat cadence. Values can be overridden from a TOML file or
//! `PULSEWATCH_*` environment variables; durations are given as strings
//! like `"6s"` or `"30ms"`.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context as _, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::data::duration::parse_duration;

/// Heartbeat and reachability timing.
#[derive(Debug, Clone)]
pub struct TimingConfig {
    /// Expected interval between probe heartbeats.
    pub heartbeat_interval: Duration,
    /// Heartbeat age beyond which the device is considered gone.
    pub liveness_window: Duration,
    /// How often connectivity is re-evaluated without new input.
    pub recheck_period: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        let heartbeat_interval = Duration::from_secs(2);
        Self {
            heartbeat_interval,
            // Three missed heartbeats
            liveness_window: heartbeat_interval * 3,
            recheck_period: Duration::from_secs(10),
        }
    }
}

impl TimingConfig {
    /// Whether a heartbeat of the given age means the device is gone.
    pub fn is_stale(&self, age: Duration) -> bool {
        age > self.liveness_window
    }
}

/// Display smoothing for instant vitals.
#[derive(Debug, Clone)]
pub struct SmoothingConfig {
    /// Differences smaller than this snap directly to the target.
    pub snap_threshold: i32,
    /// Number of interpolation steps for larger jumps.
    pub steps: u32,
    /// Delay between interpolation steps.
    pub step_interval: Duration,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            snap_threshold: 5,
            steps: 10,
            step_interval: Duration::from_millis(30),
        }
    }
}

/// Top-level configuration for the client core.
#[derive(Debug, Clone, Default)]
pub struct CoreConfig {
    pub timing: TimingConfig,
    pub smoothing: SmoothingConfig,
}

/// File/environment representation of [`CoreConfig`], with durations as
/// strings. Missing fields fall back to defaults.
#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    timing: RawTiming,
    #[serde(default)]
    smoothing: RawSmoothing,
}

#[derive(Debug, Default, Deserialize)]
struct RawTiming {
    heartbeat_interval: Option<String>,
    liveness_window: Option<String>,
    recheck_period: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawSmoothing {
    snap_threshold: Option<i32>,
    steps: Option<u32>,
    step_interval: Option<String>,
}

impl CoreConfig {
    /// Load configuration from a TOML file, with `PULSEWATCH_*` environment
    /// variables layered on top.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw: RawConfig = Config::builder()
            .add_source(File::from(path))
            .add_source(Environment::with_prefix("PULSEWATCH").separator("__"))
            .build()?
            .try_deserialize()
            .with_context(|| format!("invalid config file: {}", path.display()))?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawConfig) -> Result<Self> {
        let mut config = CoreConfig::default();

        if let Some(s) = raw.timing.heartbeat_interval {
            config.timing.heartbeat_interval =
                parse_duration(&s).context("timing.heartbeat_interval")?;
            // Keep the default ratio unless the window is set explicitly
            config.timing.liveness_window = config.timing.heartbeat_interval * 3;
        }
        if let Some(s) = raw.timing.liveness_window {
            config.timing.liveness_window = parse_duration(&s).context("timing.liveness_window")?;
        }
        if let Some(s) = raw.timing.recheck_period {
            config.timing.recheck_period = parse_duration(&s).context("timing.recheck_period")?;
        }

        if let Some(v) = raw.smoothing.snap_threshold {
            config.smoothing.snap_threshold = v;
        }
        if let Some(v) = raw.smoothing.steps {
            config.smoothing.steps = v;
        }
        if let Some(s) = raw.smoothing.step_interval {
            config.smoothing.step_interval =
                parse_duration(&s).context("smoothing.step_interval")?;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = CoreConfig::default();
        assert_eq!(config.timing.heartbeat_interval, Duration::from_secs(2));
        assert_eq!(config.timing.liveness_window, Duration::from_secs(6));
        assert_eq!(config.timing.recheck_period, Duration::from_secs(10));
        assert_eq!(config.smoothing.snap_threshold, 5);
        assert_eq!(config.smoothing.steps, 10);
        assert_eq!(config.smoothing.step_interval, Duration::from_millis(30));
    }

    #[test]
    fn test_staleness_boundary() {
        let timing = TimingConfig::default();
        assert!(!timing.is_stale(Duration::from_secs(6)));
        assert!(timing.is_stale(Duration::from_millis(6_001)));
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[timing]\nheartbeat_interval = \"1s\"\n\n[smoothing]\nsteps = 4"
        )
        .unwrap();

        let config = CoreConfig::from_file(file.path()).unwrap();
        assert_eq!(config.timing.heartbeat_interval, Duration::from_secs(1));
        // Window follows the interval when not set explicitly
        assert_eq!(config.timing.liveness_window, Duration::from_secs(3));
        assert_eq!(config.smoothing.steps, 4);
        assert_eq!(config.smoothing.snap_threshold, 5);
    }

    #[test]
    fn test_explicit_window_wins() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[timing]\nheartbeat_interval = \"1s\"\nliveness_window = \"10s\""
        )
        .unwrap();

        let config = CoreConfig::from_file(file.path()).unwrap();
        assert_eq!(config.timing.liveness_window, Duration::from_secs(10));
    }

    #[test]
    fn test_bad_duration_is_an_error() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[timing]\nrecheck_period = \"soon\"").unwrap();
        assert!(CoreConfig::from_file(file.path()).is_err());
    }
}
