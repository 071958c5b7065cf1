//! History filtering and collection decoding.
//!
//! Finalized readings live in the store as a loosely keyed collection. This
//! module turns a fetched snapshot into a clean, ordered `Vec<Reading>` and
//! filters it against a user-chosen time window.
//!
//! Day boundaries use local calendar midnight, not UTC midnight: "today"
//! must mean the user's today.

use chrono::{DateTime, Duration, Local, NaiveTime, TimeZone};
use serde_json::Value;
use tracing::warn;

use super::reading::Reading;

const MILLIS_PER_DAY: i64 = 86_400_000;

/// A time window over the reading history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterSpec {
    Today,
    Yesterday,
    Last7Days,
    All,
    /// Inclusive range in epoch milliseconds. Reading timestamps are stored
    /// in seconds and scaled up for the comparison.
    Custom { start_millis: i64, end_millis: i64 },
}

impl FilterSpec {
    /// A custom filter covering one local day, given the day's starting
    /// epoch millisecond. Equivalent to `Custom { start, start + 1 day - 1 }`.
    pub fn single_day(day_start_millis: i64) -> Self {
        FilterSpec::Custom {
            start_millis: day_start_millis,
            end_millis: day_start_millis + MILLIS_PER_DAY - 1,
        }
    }
}

/// Epoch seconds of local midnight for the day containing `t`.
pub fn local_day_start(t: DateTime<Local>) -> i64 {
    let midnight = t.date_naive().and_time(NaiveTime::MIN);
    Local
        .from_local_datetime(&midnight)
        .earliest()
        .map(|dt| dt.timestamp())
        // Midnight skipped by a DST transition: approximate with UTC days
        .unwrap_or_else(|| t.timestamp() - t.timestamp().rem_euclid(86_400))
}

/// Select the readings matching `spec`.
///
/// For non-custom presets the result is an order-preserving subsequence of
/// the input; callers sort before filtering.
pub fn filter(all: &[Reading], spec: &FilterSpec, now: DateTime<Local>) -> Vec<Reading> {
    let today_start = local_day_start(now);
    let yesterday_start = local_day_start(now - Duration::days(1));
    let week_start = local_day_start(now - Duration::days(7));

    all.iter()
        .filter(|reading| {
            let ts = reading.timestamp;
            match spec {
                FilterSpec::Today => ts >= today_start,
                FilterSpec::Yesterday => ts >= yesterday_start && ts < today_start,
                FilterSpec::Last7Days => ts >= week_start,
                FilterSpec::All => true,
                FilterSpec::Custom {
                    start_millis,
                    end_millis,
                } => {
                    let millis = ts * 1000;
                    millis >= *start_millis && millis <= *end_millis
                }
            }
        })
        .cloned()
        .collect()
}

/// Decode a fetched collection snapshot into readings.
///
/// The store keys records arbitrarily, so both object maps and arrays are
/// accepted. Malformed children (parse failures, non-positive vitals) are
/// skipped individually with a warning; one bad record never fails the
/// whole fetch.
pub fn decode_collection(value: &Value) -> Vec<Reading> {
    let children: Vec<&Value> = match value {
        Value::Object(map) => map.values().collect(),
        Value::Array(items) => items.iter().collect(),
        Value::Null => Vec::new(),
        other => {
            warn!("readings collection has unexpected shape: {}", other);
            Vec::new()
        }
    };

    children
        .into_iter()
        .filter_map(|child| match serde_json::from_value::<Reading>(child.clone()) {
            Ok(reading) if reading.is_well_formed() => Some(reading),
            Ok(reading) => {
                warn!(
                    "skipping malformed reading at ts={}: hr={} spo2={}",
                    reading.timestamp, reading.heart_rate, reading.spo2
                );
                None
            }
            Err(e) => {
                warn!("skipping unparseable reading: {}", e);
                None
            }
        })
        .collect()
}

/// Sort newest first; the order used for history lists and CSV export.
pub fn sort_newest_first(readings: &mut [Reading]) {
    readings.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}

/// Sort oldest first; the order used for chart windows.
pub fn sort_oldest_first(readings: &mut [Reading]) {
    readings.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
}

/// The most recent `n` readings, oldest first.
pub fn recent(mut readings: Vec<Reading>, n: usize) -> Vec<Reading> {
    sort_oldest_first(&mut readings);
    let skip = readings.len().saturating_sub(n);
    readings.split_off(skip)
}
