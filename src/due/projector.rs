//! Re-anchors a repeating note's stored due date onto the present.
//!
//! Dates that do not exist in the target month (Feb 29 outside a leap year,
//! the 31st of a 30-day month) are clamped to the last day of that month.

use time::util::days_in_year_month;
use time::{Date, Month, OffsetDateTime, UtcOffset};

use super::clock::Clock;

/// UTC month and day of a stored due date. The year is discarded.
pub fn decompose(complete_by: i64) -> Option<(Month, u8)> {
    let at = OffsetDateTime::from_unix_timestamp(complete_by).ok()?;
    Some((at.month(), at.day()))
}

/// UTC day of month of a stored due date. Year and month are discarded.
pub fn decompose_day(complete_by: i64) -> Option<u8> {
    decompose(complete_by).map(|(_, day)| day)
}

/// Midnight UTC of `day`-`month` in the clock's current year.
pub fn project_to_current_year(clock: &dyn Clock, month: Month, day: u8) -> Option<i64> {
    let now = clock.now().to_offset(UtcOffset::UTC);
    midnight_utc(now.year(), month, day)
}

/// Midnight UTC of `day` in the clock's current year and month.
pub fn project_to_current_year_month(clock: &dyn Clock, day: u8) -> Option<i64> {
    let now = clock.now().to_offset(UtcOffset::UTC);
    midnight_utc(now.year(), now.month(), day)
}

fn midnight_utc(year: i32, month: Month, day: u8) -> Option<i64> {
    let day = day.clamp(1, days_in_year_month(year, month));
    let date = Date::from_calendar_date(year, month, day).ok()?;
    Some(date.midnight().assume_utc().unix_timestamp())
}
