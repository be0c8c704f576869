//! Week helpers for the calendar view. Weeks run Sunday to Saturday.

use chrono::{Datelike, Duration, NaiveDate};

/// Display format used by the calendar view.
pub const WEEK_DATE_FORMAT: &str = "%m/%d/%y";

/// The seven dates of the week containing `today`, starting on Sunday.
pub fn current_week(today: NaiveDate) -> [NaiveDate; 7] {
    let offset = today.weekday().num_days_from_sunday() as i64;
    week_from(today - Duration::days(offset))
}

/// The week before (`prev`) or after the week starting on `sunday`.
pub fn adjacent_week(sunday: NaiveDate, prev: bool) -> [NaiveDate; 7] {
    let shift = if prev { -7 } else { 7 };
    week_from(sunday + Duration::days(shift))
}

fn week_from(sunday: NaiveDate) -> [NaiveDate; 7] {
    std::array::from_fn(|i| sunday + Duration::days(i as i64))
}

/// Parse a date in [`WEEK_DATE_FORMAT`].
pub fn parse_week_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, WEEK_DATE_FORMAT).ok()
}
