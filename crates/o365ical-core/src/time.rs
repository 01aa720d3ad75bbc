//! Event times and the query windows the feed is built from.
//!
//! Graph returns naive wall-clock timestamps for the calendar's zone, and the
//! feed asks for UTC, so no conversion ever happens here. A feed is made of
//! two windows: the live business week ([`week_window`]) and the cached
//! horizon that follows it ([`cache_window`]).

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

/// Format used for window bounds in calendar view queries (UTC implied).
pub const WINDOW_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Format of the naive timestamps the provider returns for event start/end,
/// with seven fractional digits.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.7f";

/// Start or end of an event: a UTC instant, or a bare date for all-day events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum EventTime {
    DateTime(DateTime<Utc>),
    AllDay(NaiveDate),
}

impl EventTime {
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self::DateTime(dt)
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self::AllDay(date)
    }

    /// Builds an event time from a naive provider timestamp.
    ///
    /// The wall-clock value is taken as UTC without conversion. When
    /// `all_day` is set only the date portion is kept.
    pub fn from_naive(naive: NaiveDateTime, all_day: bool) -> Self {
        if all_day {
            Self::AllDay(naive.date())
        } else {
            Self::DateTime(naive.and_utc())
        }
    }

    pub fn is_all_day(&self) -> bool {
        matches!(self, Self::AllDay(_))
    }
}

/// Parses a naive provider timestamp such as `2025-02-05T10:30:00.0000000`.
///
/// The fractional part is optional.
pub fn parse_provider_timestamp(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(value, WINDOW_FORMAT))
        .ok()
}

/// A `[start, end)` range of UTC instants, as sent to the calendar view.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Creates a window. `start` must not be after `end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        debug_assert!(start <= end, "window start must be <= end");
        Self { start, end }
    }

    /// Window start formatted for a calendar view query.
    pub fn start_param(&self) -> String {
        self.start.format(WINDOW_FORMAT).to_string()
    }

    /// Window end formatted for a calendar view query.
    pub fn end_param(&self) -> String {
        self.end.format(WINDOW_FORMAT).to_string()
    }
}

/// Returns the current business week for `now`: Monday 00:00 UTC through the
/// following Saturday 00:00 UTC.
///
/// On Saturday and Sunday the window rolls forward to the coming week.
pub fn week_window(now: DateTime<Utc>) -> TimeWindow {
    let today = now.date_naive();
    let offset = match today.weekday() {
        Weekday::Sat => 2,
        Weekday::Sun => 1,
        day => -i64::from(day.num_days_from_monday()),
    };
    let start = (today + Duration::days(offset))
        .and_time(NaiveTime::MIN)
        .and_utc();
    TimeWindow::new(start, start + Duration::days(5))
}

/// Returns the cached horizon for `now`: from the end of the current business
/// week through one calendar month later.
///
/// Stable for a whole week, so the cache key only moves weekly.
pub fn cache_window(now: DateTime<Utc>) -> TimeWindow {
    let start = week_window(now).end;
    let end = start
        .checked_add_months(Months::new(1))
        .unwrap_or(start + Duration::weeks(4));
    TimeWindow::new(start, end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    mod event_time {
        use super::*;

        #[test]
        fn allday_from_naive() {
            let naive = date(2025, 2, 5).and_hms_opt(0, 0, 0).unwrap();
            let et = EventTime::from_naive(naive, true);
            assert!(et.is_all_day());
            assert_eq!(et, EventTime::from_date(date(2025, 2, 5)));
        }

        #[test]
        fn datetime_from_naive_keeps_wall_clock() {
            let naive = date(2025, 2, 5).and_hms_opt(10, 30, 0).unwrap();
            let et = EventTime::from_naive(naive, false);
            assert!(!et.is_all_day());
            assert_eq!(et, EventTime::from_utc(utc(2025, 2, 5, 10, 30, 0)));
        }

        #[test]
        fn tagged_json() {
            let json = serde_json::to_value(EventTime::from_date(date(2025, 2, 5))).unwrap();
            assert_eq!(json["type"], "AllDay");
            assert_eq!(json["value"], "2025-02-05");
        }
    }

    mod timestamps {
        use super::*;

        #[test]
        fn parses_seven_digit_fraction() {
            let parsed = parse_provider_timestamp("2025-02-05T10:30:00.0000000").unwrap();
            assert_eq!(parsed, date(2025, 2, 5).and_hms_opt(10, 30, 0).unwrap());
        }

        #[test]
        fn parses_without_fraction() {
            let parsed = parse_provider_timestamp("2025-02-05T10:30:00").unwrap();
            assert_eq!(parsed, date(2025, 2, 5).and_hms_opt(10, 30, 0).unwrap());
        }

        #[test]
        fn rejects_garbage() {
            assert!(parse_provider_timestamp("next tuesday").is_none());
        }

        #[test]
        fn formats_window_params() {
            let window = TimeWindow::new(utc(2025, 2, 3, 0, 0, 0), utc(2025, 2, 8, 0, 0, 0));
            assert_eq!(window.start_param(), "2025-02-03T00:00:00");
            assert_eq!(window.end_param(), "2025-02-08T00:00:00");
        }

        #[test]
        fn timestamp_format_has_seven_digits() {
            let formatted = utc(2025, 2, 5, 10, 30, 0).format(TIMESTAMP_FORMAT).to_string();
            assert_eq!(formatted, "2025-02-05T10:30:00.0000000");
        }
    }

    mod time_window {
        use super::*;

        #[test]
        #[cfg(debug_assertions)]
        #[should_panic(expected = "start must be <= end")]
        fn reversed_window_is_a_bug() {
            TimeWindow::new(utc(2025, 2, 5, 17, 0, 0), utc(2025, 2, 5, 9, 0, 0));
        }
    }

    mod week {
        use super::*;

        #[test]
        fn wednesday_maps_to_monday_through_saturday() {
            // 2025-02-05 is a Wednesday
            for hour in [0, 9, 23] {
                let window = week_window(utc(2025, 2, 5, hour, 42, 17));
                assert_eq!(window.start, utc(2025, 2, 3, 0, 0, 0));
                assert_eq!(window.end, utc(2025, 2, 8, 0, 0, 0));
            }
        }

        #[test]
        fn monday_is_its_own_start() {
            let window = week_window(utc(2025, 2, 3, 8, 0, 0));
            assert_eq!(window.start, utc(2025, 2, 3, 0, 0, 0));
        }

        #[test]
        fn friday_goes_back_to_monday() {
            let window = week_window(utc(2025, 2, 7, 18, 0, 0));
            assert_eq!(window.start, utc(2025, 2, 3, 0, 0, 0));
        }

        #[test]
        fn weekend_rolls_forward() {
            let saturday = week_window(utc(2025, 2, 8, 12, 0, 0));
            let sunday = week_window(utc(2025, 2, 9, 12, 0, 0));
            assert_eq!(saturday.start, utc(2025, 2, 10, 0, 0, 0));
            assert_eq!(sunday.start, utc(2025, 2, 10, 0, 0, 0));
            assert_eq!(sunday.end, utc(2025, 2, 15, 0, 0, 0));
        }

        #[test]
        fn cache_window_follows_week() {
            let window = cache_window(utc(2025, 2, 5, 12, 0, 0));
            assert_eq!(window.start, utc(2025, 2, 8, 0, 0, 0));
            assert_eq!(window.end, utc(2025, 3, 8, 0, 0, 0));
        }

        #[test]
        fn cache_window_is_stable_within_week() {
            let monday = cache_window(utc(2025, 2, 3, 0, 0, 0));
            let friday = cache_window(utc(2025, 2, 7, 23, 59, 59));
            assert_eq!(monday, friday);
        }
    }
}
