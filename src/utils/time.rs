//! Time helpers
//!
//! Calendar math for month-keyed payroll records. Timestamps are unix
//! milliseconds throughout; calendar dates are `YYYY-MM-DD` strings.

use chrono::{Datelike, NaiveDate, Utc};

/// Current UTC timestamp in milliseconds
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Current calendar (month, year) in UTC
pub fn current_month_year() -> (u32, i32) {
    let today = Utc::now().date_naive();
    (today.month(), today.year())
}

/// Today's date as `YYYY-MM-DD`
pub fn today_string() -> String {
    Utc::now().date_naive().format("%Y-%m-%d").to_string()
}

/// Number of days in a calendar month
pub fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .map(|last| last.day())
        .unwrap_or(31)
}

/// Calendar date for a 1-based day of a month, `None` when out of range
pub fn day_date(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
}

/// The calendar month immediately before (month, year)
pub fn previous_month(month: u32, year: i32) -> (u32, i32) {
    if month == 1 {
        (12, year - 1)
    } else {
        (month - 1, year)
    }
}
