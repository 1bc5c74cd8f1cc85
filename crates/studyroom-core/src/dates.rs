//! Date parsing and display helpers.
//!
//! Users type dates as `dd/mm/yyyy`; everything is displayed back the same
//! way. Stored dates are ISO `YYYY-MM-DD` (see [`crate::storage`]).

use chrono::{DateTime, Local, NaiveDate, NaiveTime, TimeZone, Utc};

use crate::error::ValidationError;

/// Parse a `dd/mm/yyyy` date.
///
/// Day and month accept one or two digits, the year exactly four. Anything
/// that is not a real calendar date (`31/02/2026`, `00/01/2026`) is rejected.
pub fn parse_date(input: &str) -> Result<NaiveDate, ValidationError> {
    let invalid = || ValidationError::InvalidDate {
        input: input.to_string(),
    };

    let parts: Vec<&str> = input.trim().split('/').collect();
    let [day, month, year] = parts.as_slice() else {
        return Err(invalid());
    };

    let field = |s: &str, min_len: usize, max_len: usize| -> Option<u32> {
        if s.len() < min_len || s.len() > max_len || !s.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        s.parse().ok()
    };

    let day = field(day, 1, 2).ok_or_else(invalid)?;
    let month = field(month, 1, 2).ok_or_else(invalid)?;
    let year = field(year, 4, 4).ok_or_else(invalid)?;

    NaiveDate::from_ymd_opt(year as i32, month, day).ok_or_else(invalid)
}

/// Format a date as `dd/mm/yyyy`.
pub fn format_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

/// The instant a test or deadline happens: the given local date at `hour:00`.
///
/// Falls back to interpreting the wall-clock time as UTC when the local
/// time does not exist (DST gap).
pub fn event_instant(date: NaiveDate, hour: u32) -> DateTime<Utc> {
    let time = NaiveTime::from_hms_opt(hour.min(23), 0, 0).unwrap_or(NaiveTime::MIN);
    let naive = date.and_time(time);
    match Local.from_local_datetime(&naive).earliest() {
        Some(local) => local.with_timezone(&Utc),
        None => Utc.from_utc_datetime(&naive),
    }
}

/// `45` -> `"45 minutes"`, `90` -> `"1h 30m"`, `120` -> `"2h"`.
pub fn format_minutes(total: u64) -> String {
    if total < 60 {
        return format!("{total} minutes");
    }
    let (hours, minutes) = (total / 60, total % 60);
    if minutes == 0 {
        format!("{hours}h")
    } else {
        format!("{hours}h {minutes}m")
    }
}

/// `MM:SS` for a countdown. Minutes are not capped at 59.
pub fn format_countdown(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;
    use proptest::prelude::*;

    #[test]
    fn parses_padded_and_unpadded() {
        let d = parse_date("05/03/2027").unwrap();
        assert_eq!((d.day(), d.month(), d.year()), (5, 3, 2027));
        let d = parse_date("5/3/2027").unwrap();
        assert_eq!((d.day(), d.month(), d.year()), (5, 3, 2027));
    }

    #[test]
    fn rejects_malformed_dates() {
        for input in [
            "",
            "2027-03-05",
            "05/03",
            "05/03/27",
            "05/03/2027/1",
            "aa/03/2027",
            "31/02/2027",
            "00/01/2027",
            "12/13/2027",
            "+5/03/2027",
            "005/03/2027",
        ] {
            assert!(
                matches!(parse_date(input), Err(ValidationError::InvalidDate { .. })),
                "expected {input:?} to be rejected"
            );
        }
    }

    #[test]
    fn format_roundtrips_display() {
        let d = parse_date("09/11/2026").unwrap();
        assert_eq!(format_date(d), "09/11/2026");
    }

    #[test]
    fn minutes_formatting() {
        assert_eq!(format_minutes(25), "25 minutes");
        assert_eq!(format_minutes(60), "1h");
        assert_eq!(format_minutes(100), "1h 40m");
    }

    #[test]
    fn countdown_formatting() {
        assert_eq!(format_countdown(0), "00:00");
        assert_eq!(format_countdown(59), "00:59");
        assert_eq!(format_countdown(25 * 60), "25:00");
    }

    proptest! {
        #[test]
        fn valid_dates_parse_to_same_fields(
            year in 1900i32..2200,
            month in 1u32..=12,
            day in 1u32..=28,
        ) {
            let input = format!("{day:02}/{month:02}/{year}");
            let d = parse_date(&input).unwrap();
            prop_assert_eq!((d.day(), d.month(), d.year()), (day, month, year));
        }

        #[test]
        fn garbage_never_parses(s in "[^/]{0,12}") {
            prop_assert!(parse_date(&s).is_err());
        }
    }
}
