//! Business-day arithmetic and date parsing.
//!
//! A business day is Monday through Friday. There is no holiday calendar:
//! the archive's holidays are exactly the gaps the resolver has to correct for.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use thiserror::Error;

/// Accepted input formats, tried in order.
const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%Y%m%d"];

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid {field} '{input}': expected YYYY-MM-DD or YYYYMMDD")]
pub struct DateParseError {
    pub field: String,
    pub input: String,
}

/// Monday through Friday.
pub fn is_business_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Signed count of business days between two dates.
///
/// For `from <= to` this is the number of business days in `[from, to)`.
/// For `from > to` it is the negated count of `[to, from)`, so the function is
/// antisymmetric and `business_days_between(d, d) == 0`.
pub fn business_days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    if from <= to {
        count_forward(from, to)
    } else {
        -count_forward(to, from)
    }
}

/// Business days in `[start, end)`, with `start <= end`.
fn count_forward(start: NaiveDate, end: NaiveDate) -> i64 {
    let days = (end - start).num_days();
    let full_weeks = days / 7;
    let mut count = full_weeks * 5;

    let mut cursor = start + Duration::days(full_weeks * 7);
    while cursor < end {
        if is_business_day(cursor) {
            count += 1;
        }
        cursor += Duration::days(1);
    }
    count
}

/// The calendar day before `date`.
pub fn previous_day(date: NaiveDate) -> Option<NaiveDate> {
    date.pred_opt()
}

/// Parse a user-supplied date in either `YYYY-MM-DD` or `YYYYMMDD` form.
pub fn parse_date(input: &str, field: &str) -> Result<NaiveDate, DateParseError> {
    let trimmed = input.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
        .ok_or_else(|| DateParseError {
            field: field.to_string(),
            input: input.to_string(),
        })
}
