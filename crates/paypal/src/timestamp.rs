//! Timestamp parsing and formatting
//!
//! PayPal reports times like `2020-09-21T05:03:45+0000` (offset without a
//! colon). Bookmarks are stored as RFC 3339 UTC strings.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};

/// Parse an absolute timestamp in any of the formats PayPal or a config file uses
///
/// Accepts RFC 3339, `%Y-%m-%dT%H:%M:%S%z` with optional fractional
/// seconds, naive date-times (taken as UTC), and bare dates (midnight UTC).
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%z", "%Y-%m-%dT%H:%M:%S%.f%z"] {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Format as RFC 3339 UTC with second precision, e.g. `2020-09-21T05:03:45Z`
pub fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Truncate to midnight UTC
pub fn floor_to_day(dt: DateTime<Utc>) -> DateTime<Utc> {
    let midnight = dt.date_naive().and_hms_opt(0, 0, 0).unwrap_or_default();
    Utc.from_utc_datetime(&midnight)
}

/// Whole days as a chrono duration
pub fn days(n: u32) -> Duration {
    Duration::days(i64::from(n))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_parse_paypal_offset_format() {
        assert_eq!(
            parse_timestamp("2020-09-21T05:03:45+0000"),
            Some(utc(2020, 9, 21, 5, 3, 45))
        );
        assert_eq!(
            parse_timestamp("2020-09-21T01:00:00-0700"),
            Some(utc(2020, 9, 21, 8, 0, 0))
        );
    }

    #[test]
    fn test_parse_rfc3339_and_dates() {
        assert_eq!(
            parse_timestamp("2020-09-21T05:03:45Z"),
            Some(utc(2020, 9, 21, 5, 3, 45))
        );
        assert_eq!(
            parse_timestamp("2020-09-21T05:03:45.250+02:00"),
            Some(utc(2020, 9, 21, 3, 3, 45) + Duration::milliseconds(250))
        );
        assert_eq!(parse_timestamp("2020-09-21"), Some(utc(2020, 9, 21, 0, 0, 0)));
        assert_eq!(
            parse_timestamp("2020-09-21T05:03:45"),
            Some(utc(2020, 9, 21, 5, 3, 45))
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp(""), None);
    }

    #[test]
    fn test_format_round_trip_and_floor() {
        let dt = utc(2021, 1, 2, 13, 14, 15);
        assert_eq!(format_timestamp(dt), "2021-01-02T13:14:15Z");
        assert_eq!(floor_to_day(dt), utc(2021, 1, 2, 0, 0, 0));
    }
}
