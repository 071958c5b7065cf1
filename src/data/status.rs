//! Device status parsing.
//!
//! The probe publishes a single scalar status string. Everything the client
//! knows about the device's lifecycle arrives through this value, so the
//! parse is deliberately total: unrecognized strings are preserved rather
//! than dropped.

use std::fmt;

/// A device-reported status value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceStatus {
    /// Idle and ready to accept a start command.
    Ready,
    /// A measurement is in progress.
    Measuring,
    /// The last measurement finished successfully.
    Completed,
    /// The last measurement was stopped on request.
    Stopped,
    /// The last measurement ended in an error.
    Error(ErrorReason),
    /// A non-empty value this client does not recognize. Treated as a sign
    /// of life, not of failure.
    Unknown(String),
}

impl DeviceStatus {
    /// Parse a raw status string. Returns `None` for empty input, which the
    /// monitor treats as proven absence rather than an ambiguous signal.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        Some(match raw {
            "ready" => DeviceStatus::Ready,
            "measuring" => DeviceStatus::Measuring,
            "completed" => DeviceStatus::Completed,
            "stopped" => DeviceStatus::Stopped,
            _ => match raw.strip_prefix("error_") {
                Some(code) => DeviceStatus::Error(ErrorReason::parse(code)),
                None => DeviceStatus::Unknown(raw.to_string()),
            },
        })
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceStatus::Ready => f.write_str("ready"),
            DeviceStatus::Measuring => f.write_str("measuring"),
            DeviceStatus::Completed => f.write_str("completed"),
            DeviceStatus::Stopped => f.write_str("stopped"),
            DeviceStatus::Error(reason) => write!(f, "error_{}", reason.code()),
            DeviceStatus::Unknown(raw) => f.write_str(raw),
        }
    }
}

/// Reason code carried by an `error_*` status.
///
/// Unrecognized codes still terminate the session; they are carried through
/// as [`ErrorReason::Other`] instead of being silently discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorReason {
    FingerRemoved,
    Invalid,
    Range,
    NoValidReadings,
    Other(String),
}

impl ErrorReason {
    fn parse(code: &str) -> Self {
        match code {
            "finger_removed" => ErrorReason::FingerRemoved,
            "invalid" => ErrorReason::Invalid,
            "range" => ErrorReason::Range,
            "no_valid_readings" => ErrorReason::NoValidReadings,
            _ => ErrorReason::Other(code.to_string()),
        }
    }

    /// The wire-level reason code.
    pub fn code(&self) -> &str {
        match self {
            ErrorReason::FingerRemoved => "finger_removed",
            ErrorReason::Invalid => "invalid",
            ErrorReason::Range => "range",
            ErrorReason::NoValidReadings => "no_valid_readings",
            ErrorReason::Other(code) => code,
        }
    }

    /// A user-facing description of the failure.
    pub fn message(&self) -> String {
        match self {
            ErrorReason::FingerRemoved => {
                "Finger removed from the sensor. Please repeat the measurement.".to_string()
            }
            ErrorReason::Invalid => "Invalid reading detected.".to_string(),
            ErrorReason::Range => "Reading out of measurable range.".to_string(),
            ErrorReason::NoValidReadings => {
                "No valid readings during the measurement. \
                 Make sure your finger rests firmly on the sensor."
                    .to_string()
            }
            ErrorReason::Other(code) => format!("Unknown error occurred: {}", code),
        }
    }
}

impl fmt::Display for ErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_statuses() {
        assert_eq!(DeviceStatus::parse("ready"), Some(DeviceStatus::Ready));
        assert_eq!(DeviceStatus::parse("measuring"), Some(DeviceStatus::Measuring));
        assert_eq!(DeviceStatus::parse("completed"), Some(DeviceStatus::Completed));
        assert_eq!(DeviceStatus::parse("stopped"), Some(DeviceStatus::Stopped));
    }

    #[test]
    fn test_parse_empty_is_none() {
        assert_eq!(DeviceStatus::parse(""), None);
        assert_eq!(DeviceStatus::parse("   "), None);
    }

    #[test]
    fn test_parse_error_reasons() {
        assert_eq!(
            DeviceStatus::parse("error_finger_removed"),
            Some(DeviceStatus::Error(ErrorReason::FingerRemoved))
        );
        assert_eq!(
            DeviceStatus::parse("error_no_valid_readings"),
            Some(DeviceStatus::Error(ErrorReason::NoValidReadings))
        );
    }

    #[test]
    fn test_unrecognized_error_code_is_preserved() {
        let status = DeviceStatus::parse("error_sensor_overheat");
        assert_eq!(
            status,
            Some(DeviceStatus::Error(ErrorReason::Other(
                "sensor_overheat".to_string()
            )))
        );
        if let Some(DeviceStatus::Error(reason)) = status {
            assert_eq!(reason.code(), "sensor_overheat");
            assert!(reason.message().contains("sensor_overheat"));
        }
    }

    #[test]
    fn test_unknown_status_roundtrips() {
        let status = DeviceStatus::parse("calibrating");
        assert_eq!(status, Some(DeviceStatus::Unknown("calibrating".to_string())));
        assert_eq!(status.map(|s| s.to_string()), Some("calibrating".to_string()));
    }
}
