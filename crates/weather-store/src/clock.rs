use std::sync::Arc;

use chrono::{DateTime, Duration, SecondsFormat, SubsecRound, Utc};
use parking_lot::Mutex;
use serde_json::Value;

/// Source of server-side timestamps.
///
/// Every value handed out is truncated to whole microseconds, the precision
/// the persisted `Time`/`Created`/`LastAccess` labels carry.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl SystemClock {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self)
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        truncate(Utc::now())
    }
}

/// Clock that only moves when told to. Used by tests to stamp readings at
/// chosen instants.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(truncate(now)),
        }
    }

    pub fn shared(now: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self::new(now))
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = truncate(now);
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now = truncate(*now + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

pub fn truncate(instant: DateTime<Utc>) -> DateTime<Utc> {
    instant.trunc_subsecs(6)
}

/// Fixed-width RFC 3339 rendering: six fractional digits and a `Z` suffix,
/// so string order equals chronological order inside the store.
pub fn format_timestamp(instant: &DateTime<Utc>) -> String {
    truncate(*instant).to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn timestamp_value(instant: &DateTime<Utc>) -> Value {
    Value::String(format_timestamp(instant))
}

/// serde adapter for timestamp fields, used as `#[serde(with = "timestamp")]`.
pub mod timestamp {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(instant: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::format_timestamp(instant))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|instant| super::truncate(instant.with_timezone(&Utc)))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn formatted_timestamps_sort_chronologically() {
        let early = Utc.with_ymd_and_hms(2024, 1, 9, 23, 59, 59).unwrap();
        let late = early + Duration::microseconds(1);
        assert!(format_timestamp(&early) < format_timestamp(&late));
        assert_eq!(format_timestamp(&early), "2024-01-09T23:59:59.000000Z");
    }

    #[test]
    fn manual_clock_truncates_to_micros() {
        let instant = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap() + Duration::nanoseconds(1_999);
        let clock = ManualClock::new(instant);
        assert_eq!(clock.now().timestamp_subsec_nanos(), 1_000);
    }
}
