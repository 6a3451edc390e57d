//! Form date helpers
//!
//! Report forms submit plain `YYYY-MM-DD` strings. A start date covers the
//! whole day from midnight, an end date runs until the last microsecond.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::{BillingError, Result};

/// Which end of the day a form date should be pinned to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayBound {
    Start,
    End,
}

/// Parse a form date in `YYYY-MM-DD` format
pub fn parse_form_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| BillingError::InvalidDate(format!("{s} (expected YYYY-MM-DD)")))
}

/// Pin a date to the start (00:00:00) or end (23:59:59.999999) of the day
pub fn pin_to_day(date: NaiveDate, bound: DayBound) -> NaiveDateTime {
    match bound {
        DayBound::Start => date.and_time(NaiveTime::MIN),
        // 23:59:59.999999 is always valid
        DayBound::End => date
            .and_hms_micro_opt(23, 59, 59, 999_999)
            .unwrap_or_else(|| date.and_time(NaiveTime::MIN)),
    }
}

/// Parse a form date and pin it to one end of the day
pub fn ceil_strdate(s: &str, bound: DayBound) -> Result<NaiveDateTime> {
    parse_form_date(s).map(|date| pin_to_day(date, bound))
}

/// Start and end of a single day
pub fn day_range(date: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
    (pin_to_day(date, DayBound::Start), pin_to_day(date, DayBound::End))
}

/// Format a datetime the way pipeline documents and report contexts carry it
pub fn format_datetime(dt: &NaiveDateTime) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

/// Parse the datetime representations found in analytic documents
///
/// Accepts RFC 3339 (offset dropped after conversion to UTC), naive ISO
/// datetimes with or without fractions, and bare dates.
pub fn parse_document_datetime(s: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_ceil_strdate_start_and_end() {
        let start = ceil_strdate("2013-03-01", DayBound::Start).unwrap();
        assert_eq!(format_datetime(&start), "2013-03-01T00:00:00.000000");

        let end = ceil_strdate("2013-03-01", DayBound::End).unwrap();
        assert_eq!(end.hour(), 23);
        assert_eq!(end.nanosecond(), 999_999_000);
        assert_eq!(format_datetime(&end), "2013-03-01T23:59:59.999999");
    }

    #[test]
    fn test_parse_form_date_rejects_garbage() {
        assert!(parse_form_date("01/03/2013").is_err());
        assert!(parse_form_date("").is_err());
        assert!(parse_form_date(" 2013-03-01 ").is_ok());
    }

    #[test]
    fn test_parse_document_datetime_formats() {
        let expected = NaiveDate::from_ymd_opt(2013, 3, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        assert_eq!(parse_document_datetime("2013-03-01T10:00:00"), Some(expected));
        assert_eq!(parse_document_datetime("2013-03-01T10:00:00.000000"), Some(expected));
        assert_eq!(parse_document_datetime("2013-03-01 10:00:00"), Some(expected));
        assert_eq!(parse_document_datetime("2013-03-01T10:00:00Z"), Some(expected));
        assert!(parse_document_datetime("2013-03-01").is_some());
        assert!(parse_document_datetime("yesterday").is_none());
    }
}
