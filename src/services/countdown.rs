//! Countdown clock for auction end times.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Remaining time until auction end, truncated to whole fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TimeLeft {
    pub days: u64,
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
}

impl TimeLeft {
    pub const ZERO: TimeLeft = TimeLeft {
        days: 0,
        hours: 0,
        minutes: 0,
        seconds: 0,
    };

    /// Terminal state: the all-zero tuple. Once terminal, bid submission is
    /// disabled and polling stops.
    pub fn is_ended(&self) -> bool {
        *self == Self::ZERO
    }

    pub fn total_seconds(&self) -> u64 {
        self.days * 86_400 + self.hours * 3_600 + self.minutes * 60 + self.seconds
    }
}

impl fmt::Display for TimeLeft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}d {:02}:{:02}:{:02}",
            self.days, self.hours, self.minutes, self.seconds
        )
    }
}

/// Truncated floor decomposition of the time remaining until `end_time`.
///
/// Not calendar-aware: plain integer division of the millisecond difference.
/// Returns the zero tuple for any `now >= end_time`. A remainder under one
/// second also truncates to the zero tuple.
pub fn compute_time_left(end_time: DateTime<Utc>, now: DateTime<Utc>) -> TimeLeft {
    let diff_ms = end_time.signed_duration_since(now).num_milliseconds();
    if diff_ms <= 0 {
        return TimeLeft::ZERO;
    }
    let total_secs = (diff_ms / 1000) as u64;
    TimeLeft {
        days: total_secs / 86_400,
        hours: total_secs % 86_400 / 3_600,
        minutes: total_secs % 3_600 / 60,
        seconds: total_secs % 60,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn at(ms: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp_millis(ms).unwrap()
    }

    #[test]
    fn test_decomposition() {
        // 1h 1m 1s ahead
        let left = compute_time_left(at(3_661_000), at(0));
        assert_eq!(
            left,
            TimeLeft {
                days: 0,
                hours: 1,
                minutes: 1,
                seconds: 1
            }
        );

        let left = compute_time_left(at(2 * 86_400_000 + 3_600_000 + 59_000), at(0));
        assert_eq!(
            left,
            TimeLeft {
                days: 2,
                hours: 1,
                minutes: 0,
                seconds: 59
            }
        );
    }

    #[test]
    fn test_terminal_at_and_after_end() {
        let end = at(10_000);
        assert_eq!(compute_time_left(end, end), TimeLeft::ZERO);
        assert_eq!(compute_time_left(end, at(20_000)), TimeLeft::ZERO);
        assert!(compute_time_left(end, at(20_000)).is_ended());
    }

    #[test]
    fn test_subsecond_remainder_truncates_to_terminal() {
        assert_eq!(compute_time_left(at(500), at(0)), TimeLeft::ZERO);
    }

    #[test]
    fn test_monotonic_non_increasing() {
        let end = at(90_061_000); // 1d 1h 1m 1s
        let mut previous = u64::MAX;
        for step in 0..=91 {
            let now = at(0) + Duration::seconds(step * 1_000);
            let total = compute_time_left(end, now).total_seconds();
            assert!(total <= previous);
            previous = total;
        }
        assert_eq!(previous, 0);
    }
}
