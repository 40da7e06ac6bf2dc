//! Period parsing helpers
//!
//! The statistics API reports each observation with a `periodName` (an
//! English month name) and a `year` string. Canonical periods are
//! first-of-month dates.

use chrono::NaiveDate;

/// Map an English month name to its 1-based month number (case-insensitive)
fn month_number(name: &str) -> Option<u32> {
    let month = match name.to_ascii_lowercase().as_str() {
        "january" => 1,
        "february" => 2,
        "march" => 3,
        "april" => 4,
        "may" => 5,
        "june" => 6,
        "july" => 7,
        "august" => 8,
        "september" => 9,
        "october" => 10,
        "november" => 11,
        "december" => 12,
        _ => return None,
    };
    Some(month)
}

/// Parse a `periodName` + `year` pair into a first-of-month date.
///
/// Returns `None` for non-monthly periods (e.g. the API's annual-average
/// rows, whose period name is not a month) and for unparseable years.
pub fn parse_period(period_name: &str, year: &str) -> Option<NaiveDate> {
    let month = month_number(period_name.trim())?;
    let year: i32 = year.trim().parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, 1)
}
