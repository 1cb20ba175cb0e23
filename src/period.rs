//! Month rollover arithmetic for persisted `DD/MM/YYYY` dates.
//!
//! Stored dates always name the last day of the most recently published
//! month. Advancing means "look for the following month" and, once that month
//! is confirmed, storing its last calendar day.

use crate::error::{Result, WatchError};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// `chrono` format string for persisted dates.
pub const DATE_FORMAT: &str = "%d/%m/%Y";

/// Largest year representable in `DD/MM/YYYY`.
const MAX_YEAR: i32 = 9999;

/// A (year, month) pair identifying one instance of a periodic file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Period {
    year: i32,
    month: u32,
}

impl Period {
    /// Returns `None` unless `month` is in `1..=12`.
    #[must_use]
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    pub fn year(self) -> i32 {
        self.year
    }

    /// Month number, 1-based.
    pub fn month(self) -> u32 {
        self.month
    }

    /// The period immediately after this one, or `None` once the year would
    /// no longer fit the four-digit `DD/MM/YYYY` form.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        let next = if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        };
        (next.year <= MAX_YEAR).then_some(next)
    }

    /// Number of days in this month.
    pub fn days(self) -> u32 {
        match self.month {
            4 | 6 | 9 | 11 => 30,
            2 if is_leap_year(self.year) => 29,
            2 => 28,
            _ => 31,
        }
    }

    /// Last calendar day of this month as `DD/MM/YYYY`.
    pub fn end_of_month(self) -> String {
        format!("{:02}/{:02}/{:04}", self.days(), self.month, self.year)
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// Parse a persisted date, requiring exactly two-digit day and month and a
/// four-digit year. Surrounding whitespace is ignored.
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    let invalid = || WatchError::InvalidDateFormat {
        value: value.to_owned(),
    };

    let trimmed = value.trim();
    let bytes = trimmed.as_bytes();
    let shape_ok = bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            2 | 5 => *b == b'/',
            _ => b.is_ascii_digit(),
        });
    if !shape_ok {
        return Err(invalid());
    }

    NaiveDate::parse_from_str(trimmed, DATE_FORMAT).map_err(|_| invalid())
}

/// Period following the month of `last_date`.
///
/// # Errors
///
/// Returns [`WatchError::InvalidDateFormat`] when `last_date` is not a valid
/// `DD/MM/YYYY` date, or when the following month would fall past year 9999.
pub fn next_period(last_date: &str) -> Result<Period> {
    let date = parse_date(last_date)?;
    let current = Period {
        year: date.year(),
        month: date.month(),
    };
    current.next().ok_or_else(|| WatchError::InvalidDateFormat {
        value: last_date.to_owned(),
    })
}

/// Last day of `month`/`year` formatted as `DD/MM/YYYY`.
///
/// Returns `None` for a month outside `1..=12`.
pub fn end_of_month(year: i32, month: u32) -> Option<String> {
    Period::new(year, month).map(Period::end_of_month)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn january_rolls_into_leap_february() {
        let next = next_period("31/01/2024").unwrap();
        assert_eq!(next, Period::new(2024, 2).unwrap());
        assert_eq!(next.end_of_month(), "29/02/2024");
    }

    #[test]
    fn december_wraps_to_next_year() {
        let next = next_period("31/12/2024").unwrap();
        assert_eq!((next.year(), next.month()), (2025, 1));
        assert_eq!(next.end_of_month(), "31/01/2025");
    }

    #[test]
    fn non_leap_february_has_28_days() {
        assert_eq!(end_of_month(2023, 2).as_deref(), Some("28/02/2023"));
        assert_eq!(end_of_month(1900, 2).as_deref(), Some("28/02/1900"));
        assert_eq!(end_of_month(2000, 2).as_deref(), Some("29/02/2000"));
    }

    #[test]
    fn thirty_day_months() {
        for month in [4, 6, 9, 11] {
            let s = end_of_month(2025, month).unwrap();
            assert!(s.starts_with("30/"), "{s}");
        }
    }

    #[test]
    fn end_of_month_rejects_bad_month() {
        assert!(end_of_month(2024, 0).is_none());
        assert!(end_of_month(2024, 13).is_none());
    }

    #[test]
    fn mid_month_dates_advance_by_month_not_day() {
        let next = next_period("15/03/2024").unwrap();
        assert_eq!(next.end_of_month(), "30/04/2024");
    }

    #[test]
    fn surrounding_whitespace_is_tolerated() {
        assert!(next_period(" 31/01/2024 ").is_ok());
    }

    #[test]
    fn malformed_dates_are_rejected() {
        for raw in [
            "",
            "2024-01-31",
            "1/2/2024",
            "31/1/2024",
            "31/01/24",
            "31/02/2024",
            "00/01/2024",
            "31-01-2024",
            "Sin archivos disponibles",
            "31/01/2024x",
        ] {
            let err = next_period(raw).unwrap_err();
            assert!(
                matches!(err, WatchError::InvalidDateFormat { .. }),
                "{raw:?} gave {err}"
            );
        }
    }

    #[test]
    fn advanced_date_is_strictly_later_and_month_end() {
        let mut day = NaiveDate::from_ymd_opt(2019, 1, 1).unwrap();
        let stop = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        while day < stop {
            let input = day.format(DATE_FORMAT).to_string();
            let next = next_period(&input).unwrap();
            let advanced = parse_date(&next.end_of_month()).unwrap();

            assert!(advanced > day, "{input} -> {advanced}");
            assert!(advanced.year() - day.year() <= 1);
            let following = advanced.succ_opt().unwrap();
            assert_eq!(following.day(), 1, "{advanced} is not a month end");

            day = day.succ_opt().unwrap();
        }
    }

    #[test]
    fn last_representable_month_does_not_advance() {
        assert!(matches!(
            next_period("31/12/9999"),
            Err(WatchError::InvalidDateFormat { value }) if value == "31/12/9999"
        ));
        let november = next_period("30/11/9999").unwrap();
        assert_eq!(november.end_of_month(), "31/12/9999");
        assert!(Period::new(9999, 12).unwrap().next().is_none());
    }

    #[test]
    fn period_display_is_iso_like() {
        assert_eq!(Period::new(2024, 2).unwrap().to_string(), "2024-02");
    }
}
