//! Instant sample processing.
//!
//! While a measurement runs the probe streams one sample per second. The
//! processor keeps the displayed vitals stable across invalid frames and
//! derives progress on every sample, valid or not. The canonical reading
//! is always the raw finalized value; smoothing only affects what a
//! display shows between targets.

use tracing::debug;

use crate::config::SmoothingConfig;
use crate::data::InstantReading;

/// Measurement progress derived from a streamed sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Completion percentage, clamped to `0..=100`.
    pub percent: u8,
    /// Seconds remaining as reported. Negative when the probe overruns.
    pub seconds_remaining: i32,
}

impl Progress {
    /// Seconds remaining clamped for display; the raw value stays
    /// available for diagnostics.
    pub fn display_seconds_remaining(&self) -> i32 {
        self.seconds_remaining.max(0)
    }
}

/// The outcome of processing one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleUpdate {
    pub progress: Progress,
    /// New display targets, present only when the frame was valid.
    pub vitals: Option<(i32, i32)>,
}

/// Per-session sample processor.
///
/// Holds the last displayed HR/SpO2 pair and applies validity hysteresis:
/// invalid or unmarked frames never clear the display, they only advance
/// progress.
#[derive(Debug, Default)]
pub struct ReadingProcessor {
    displayed_hr: Option<i32>,
    displayed_spo2: Option<i32>,
}

impl ReadingProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process one streamed sample.
    pub fn on_sample(&mut self, sample: &InstantReading) -> SampleUpdate {
        let progress = derive_progress(sample.seconds_passed, sample.total_seconds);

        let vitals = if sample.is_valid() {
            self.displayed_hr = Some(sample.instant_hr);
            self.displayed_spo2 = Some(sample.instant_spo2);
            Some((sample.instant_hr, sample.instant_spo2))
        } else {
            debug!(
                "invalid frame at {}s, retaining hr={:?} spo2={:?}",
                sample.seconds_passed, self.displayed_hr, self.displayed_spo2
            );
            None
        };

        SampleUpdate { progress, vitals }
    }

    /// The currently displayed vitals, if any valid frame has arrived.
    pub fn displayed(&self) -> Option<(i32, i32)> {
        self.displayed_hr.zip(self.displayed_spo2)
    }

    /// Clear all per-session state. Called when a session ends.
    pub fn reset(&mut self) {
        self.displayed_hr = None;
        self.displayed_spo2 = None;
    }
}

fn derive_progress(seconds_passed: i32, total_seconds: i32) -> Progress {
    let percent = if total_seconds > 0 {
        ((seconds_passed as f64 / total_seconds as f64) * 100.0).round() as i64
    } else {
        0
    };
    Progress {
        percent: percent.clamp(0, 100) as u8,
        seconds_remaining: total_seconds - seconds_passed,
    }
}

/// Interpolation path from the currently displayed value to a new target.
///
/// Small differences snap directly; larger jumps are split into a fixed
/// number of steps ending exactly at the target. The caller plays the
/// steps back at `config.step_interval`.
pub fn smoothing_steps(current: i32, target: i32, config: &SmoothingConfig) -> Vec<i32> {
    let diff = target - current;
    if diff == 0 {
        return Vec::new();
    }
    if diff.abs() < config.snap_threshold || config.steps <= 1 {
        return vec![target];
    }

    let steps = config.steps as i32;
    (1..=steps)
        .map(|i| {
            if i == steps {
                target
            } else {
                current + (diff * i) / steps
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(valid: Option<bool>, hr: i32, spo2: i32, passed: i32, total: i32) -> InstantReading {
        InstantReading {
            has_valid_reading: valid,
            instant_hr: hr,
            instant_spo2: spo2,
            seconds_passed: passed,
            total_seconds: total,
        }
    }

    #[test]
    fn test_valid_frame_updates_vitals_and_progress() {
        let mut processor = ReadingProcessor::new();
        let update = processor.on_sample(&sample(Some(true), 80, 97, 30, 60));
        assert_eq!(update.vitals, Some((80, 97)));
        assert_eq!(update.progress.percent, 50);
        assert_eq!(update.progress.seconds_remaining, 30);
        assert_eq!(processor.displayed(), Some((80, 97)));
    }

    #[test]
    fn test_invalid_frame_keeps_display_but_advances_progress() {
        let mut processor = ReadingProcessor::new();
        processor.on_sample(&sample(Some(true), 80, 97, 10, 60));

        let update = processor.on_sample(&sample(Some(false), 0, 0, 11, 60));
        assert_eq!(update.vitals, None);
        assert_eq!(update.progress.seconds_remaining, 49);
        assert_eq!(processor.displayed(), Some((80, 97)));
    }

    #[test]
    fn test_absent_validity_flag_is_treated_as_invalid() {
        let mut processor = ReadingProcessor::new();
        processor.on_sample(&sample(Some(true), 80, 97, 10, 60));
        let update = processor.on_sample(&sample(None, 90, 99, 11, 60));
        assert_eq!(update.vitals, None);
        assert_eq!(processor.displayed(), Some((80, 97)));
    }

    #[test]
    fn test_progress_clamps_but_remaining_goes_negative() {
        let update = ReadingProcessor::new().on_sample(&sample(None, 0, 0, 65, 60));
        assert_eq!(update.progress.percent, 100);
        assert_eq!(update.progress.seconds_remaining, -5);
        assert_eq!(update.progress.display_seconds_remaining(), 0);
    }

    #[test]
    fn test_zero_total_does_not_divide() {
        let update = ReadingProcessor::new().on_sample(&sample(None, 0, 0, 5, 0));
        assert_eq!(update.progress.percent, 0);
    }

    #[test]
    fn test_reset_clears_display() {
        let mut processor = ReadingProcessor::new();
        processor.on_sample(&sample(Some(true), 80, 97, 10, 60));
        processor.reset();
        assert_eq!(processor.displayed(), None);
    }

    #[test]
    fn test_small_difference_snaps() {
        let config = SmoothingConfig::default();
        assert_eq!(smoothing_steps(80, 83, &config), vec![83]);
        assert_eq!(smoothing_steps(80, 80, &config), Vec::<i32>::new());
    }

    #[test]
    fn test_large_difference_interpolates_to_target() {
        let config = SmoothingConfig::default();
        let steps = smoothing_steps(60, 100, &config);
        assert_eq!(steps.len(), config.steps as usize);
        assert_eq!(*steps.last().unwrap(), 100);
        // Monotonic toward the target
        assert!(steps.windows(2).all(|w| w[0] <= w[1]));
        assert!(steps.iter().all(|&v| v > 60 && v <= 100));
    }

    #[test]
    fn test_interpolation_handles_downward_jumps() {
        let config = SmoothingConfig::default();
        let steps = smoothing_steps(100, 60, &config);
        assert_eq!(*steps.last().unwrap(), 60);
        assert!(steps.windows(2).all(|w| w[0] >= w[1]));
    }
}
