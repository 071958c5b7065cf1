//! Reading models shared with the probe.
//!
//! These types match the JSON written by the device firmware: finalized
//! [`Reading`] records under the history path, and the streamed
//! [`InstantReading`] samples published while a measurement runs.

use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Serialize};

/// A finalized measurement record.
///
/// Created once per completed measurement by the device; the client only
/// ever holds read-only copies. Timestamps are seconds since the epoch and
/// are the only meaningful sort key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Reading {
    pub heart_rate: i32,
    pub spo2: i32,
    pub timestamp: i64,
    /// Measurement duration in seconds.
    pub duration: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<String>,
}

impl Default for Reading {
    fn default() -> Self {
        Self {
            heart_rate: 0,
            spo2: 0,
            timestamp: 0,
            duration: 0,
            method: None,
            algorithm: None,
        }
    }
}

impl Reading {
    /// A record is usable only when both vitals carry positive values;
    /// anything else is a partial write or firmware glitch.
    pub fn is_well_formed(&self) -> bool {
        self.heart_rate > 0 && self.spo2 > 0
    }

    /// Local wall-clock time of this reading, when representable.
    pub fn local_time(&self) -> Option<DateTime<Local>> {
        Local.timestamp_opt(self.timestamp, 0).earliest()
    }

    /// Classify the vitals into display bands.
    pub fn health_status(&self) -> HealthStatus {
        let hr = self.heart_rate;
        let spo2 = self.spo2;

        let hr_critical = hr < 40 || hr > 120;
        let hr_warning = (hr > 100 && hr <= 120) || (hr >= 40 && hr < 60);

        let spo2_critical = spo2 < 90;
        let spo2_warning = (90..=95).contains(&spo2);

        if hr_critical || spo2_critical {
            HealthStatus::Critical
        } else if hr_warning || spo2_warning {
            HealthStatus::Warning
        } else {
            HealthStatus::Normal
        }
    }
}

/// Health band for a pair of vitals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HealthStatus {
    Normal,
    Warning,
    Critical,
}

impl HealthStatus {
    /// Returns a short symbol for display.
    pub fn symbol(&self) -> &'static str {
        match self {
            HealthStatus::Normal => "OK",
            HealthStatus::Warning => "WARN",
            HealthStatus::Critical => "CRIT",
        }
    }
}

/// A streamed sample published while a measurement is running.
///
/// `has_valid_reading` is deliberately tri-state: `Some(true)` is a usable
/// frame, `Some(false)` is an explicit invalid frame, and `None` means the
/// firmware did not say. Invalid and absent frames still advance progress.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InstantReading {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_valid_reading: Option<bool>,
    #[serde(rename = "instantHR")]
    pub instant_hr: i32,
    #[serde(rename = "instantSPO2")]
    pub instant_spo2: i32,
    pub seconds_passed: i32,
    pub total_seconds: i32,
}

impl InstantReading {
    /// Only an explicit `true` counts as a valid frame.
    pub fn is_valid(&self) -> bool {
        self.has_valid_reading == Some(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_formed_requires_both_vitals() {
        let mut reading = Reading {
            heart_rate: 72,
            spo2: 98,
            timestamp: 1_700_000_000,
            ..Reading::default()
        };
        assert!(reading.is_well_formed());

        reading.spo2 = 0;
        assert!(!reading.is_well_formed());

        reading.spo2 = 98;
        reading.heart_rate = -1;
        assert!(!reading.is_well_formed());
    }

    #[test]
    fn test_health_bands() {
        let reading = |hr, spo2| Reading {
            heart_rate: hr,
            spo2,
            ..Reading::default()
        };

        assert_eq!(reading(72, 98).health_status(), HealthStatus::Normal);
        assert_eq!(reading(110, 98).health_status(), HealthStatus::Warning);
        assert_eq!(reading(50, 98).health_status(), HealthStatus::Warning);
        assert_eq!(reading(72, 93).health_status(), HealthStatus::Warning);
        assert_eq!(reading(130, 98).health_status(), HealthStatus::Critical);
        assert_eq!(reading(35, 98).health_status(), HealthStatus::Critical);
        assert_eq!(reading(72, 88).health_status(), HealthStatus::Critical);
    }

    #[test]
    fn test_reading_deserializes_firmware_json() {
        let json = r#"{
            "heartRate": 75,
            "spo2": 98,
            "timestamp": 1700000000,
            "duration": 60,
            "method": "reflective",
            "algorithm": "maxim"
        }"#;
        let reading: Reading = serde_json::from_str(json).unwrap();
        assert_eq!(reading.heart_rate, 75);
        assert_eq!(reading.spo2, 98);
        assert_eq!(reading.method.as_deref(), Some("reflective"));
    }

    #[test]
    fn test_instant_reading_field_names() {
        let json = r#"{
            "hasValidReading": true,
            "instantHR": 80,
            "instantSPO2": 97,
            "secondsPassed": 12,
            "totalSeconds": 60
        }"#;
        let sample: InstantReading = serde_json::from_str(json).unwrap();
        assert!(sample.is_valid());
        assert_eq!(sample.instant_hr, 80);
        assert_eq!(sample.instant_spo2, 97);
        assert_eq!(sample.seconds_passed, 12);
    }

    #[test]
    fn test_absent_validity_flag_is_not_valid() {
        let json = r#"{"instantHR": 80, "instantSPO2": 97}"#;
        let sample: InstantReading = serde_json::from_str(json).unwrap();
        assert_eq!(sample.has_valid_reading, None);
        assert!(!sample.is_valid());
    }
}
