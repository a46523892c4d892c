//! Tolerant parsing of header date/time fragments.
//!
//! Scanner headers carry acquisition dates and times-of-day in separate
//! fields and in several renditions: bare DICOM `YYYYMMDD`/`HHMMSS`
//! values, dashed and colon-delimited variants, the GE ctime-style stamp,
//! and occasionally a raw epoch-seconds count.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};

const DATE_FORMATS: &[&str] = &["%Y%m%d", "%Y-%m-%d", "%Y.%m.%d", "%m/%d/%Y"];
const TIME_FORMATS: &[&str] = &["%H%M%S", "%H:%M:%S", "%H%M", "%H:%M"];
const STAMP_FORMATS: &[&str] = &[
    // ctime-style, as printed by the GE header tool.
    "%a %b %e %H:%M:%S %Y",
    "%a %b %d %H:%M:%S %Y",
    "%Y-%m-%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
];

/// Parses a date fragment such as `20061130`.
pub fn parse_date(fragment: &str) -> Option<NaiveDate> {
    let fragment = fragment.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(fragment, format).ok())
}

/// Parses a time-of-day fragment such as `102710` or `102710.000000`;
/// fractional seconds are dropped.
pub fn parse_time(fragment: &str) -> Option<NaiveTime> {
    let fragment = fragment.trim();
    let fragment = fragment.split('.').next().unwrap_or(fragment);
    TIME_FORMATS
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(fragment, format).ok())
}

/// Combines separate date and time fragments into one timestamp. Both
/// must resolve; a date without a readable time is not a usable
/// acquisition timestamp.
pub fn combine(date: &str, time: &str) -> Option<NaiveDateTime> {
    Some(parse_date(date)?.and_time(parse_time(time)?))
}

/// Parses a complete stamp as found in GE binary headers, including the
/// epoch-seconds form some revisions emit.
pub fn parse_stamp(fragment: &str) -> Option<NaiveDateTime> {
    let fragment = fragment.trim();
    for format in STAMP_FORMATS {
        if let Ok(stamp) = NaiveDateTime::parse_from_str(fragment, format) {
            return Some(stamp);
        }
    }
    if !fragment.is_empty() && fragment.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(seconds) = fragment.parse::<i64>() {
            return DateTime::from_timestamp(seconds, 0).map(|dt| dt.naive_utc());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dicom_date_and_time_combine() {
        let stamp = combine("20061130", "102710").expect("combined stamp");
        assert_eq!(stamp.to_string(), "2006-11-30 10:27:10");
        let fractional = combine("2006-11-30", "102710.000000").expect("fractional stamp");
        assert_eq!(fractional, stamp);
    }

    #[test]
    fn combine_requires_both_fragments() {
        assert!(combine("20061130", "").is_none());
        assert!(combine("", "102710").is_none());
        assert!(combine("not a date", "102710").is_none());
    }

    #[test]
    fn ge_ctime_stamp() {
        let stamp = parse_stamp("Thu Nov 30 10:27:10 2006").expect("ctime stamp");
        assert_eq!(stamp.to_string(), "2006-11-30 10:27:10");
    }

    #[test]
    fn epoch_seconds_stamp() {
        let stamp = parse_stamp("1164882430").expect("epoch stamp");
        assert_eq!(stamp.to_string(), "2006-11-30 10:27:10");
    }
}
