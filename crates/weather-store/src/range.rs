use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::clock::{timestamp_value, truncate};
use crate::error::StoreError;
use crate::query::Filter;

/// Inclusive `[start, end]` window over a timestamp field.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TimeRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeRange {
    /// Range as given; a reversed range simply matches nothing.
    pub fn inclusive(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start: truncate(start),
            end: truncate(end),
        }
    }

    /// Range for operations that require `start < end`.
    pub fn ordered(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, StoreError> {
        if start >= end {
            return Err(StoreError::InvalidRange);
        }
        Ok(Self::inclusive(start, end))
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn contains(&self, instant: &DateTime<Utc>) -> bool {
        *instant >= self.start && *instant <= self.end
    }

    pub fn filter(&self, field: &str) -> Filter {
        Filter::between(field, self.start_value(), self.end_value())
    }

    fn start_value(&self) -> Value {
        timestamp_value(&self.start)
    }

    fn end_value(&self) -> Value {
        timestamp_value(&self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn ordered_rejects_equal_and_reversed_bounds() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        assert!(matches!(
            TimeRange::ordered(start, start),
            Err(StoreError::InvalidRange)
        ));
        assert!(TimeRange::ordered(start, start - Duration::days(1)).is_err());
        assert!(TimeRange::ordered(start, start + Duration::days(1)).is_ok());
    }

    #[test]
    fn bounds_are_inclusive() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let end = start + Duration::hours(1);
        let range = TimeRange::inclusive(start, end);
        assert!(range.contains(&start));
        assert!(range.contains(&end));
        assert!(!range.contains(&(end + Duration::microseconds(1))));
    }
}
