//! Repeat increments and due-date series for recurring tasks.

use chrono::{Duration, NaiveDate};

use crate::error::{AppError, ErrorCode};
use crate::types::RepeatFrequency;

/// How far ahead an open-ended series is generated (about one semester).
pub const DEFAULT_OPEN_ENDED_HORIZON_DAYS: i64 = 112;

/// Longest series generated in one go. A daily task over two and a half years fits.
pub const MAX_SERIES_ITERATIONS: usize = 1000;

/// Fixed step between successive due dates.
///
/// Monthly is four weeks, not a calendar month. Tasks that do not repeat and
/// irregular series have no fixed step.
pub fn increment(freq: RepeatFrequency) -> Option<Duration> {
    match freq {
        RepeatFrequency::Daily => Some(Duration::days(1)),
        RepeatFrequency::Weekly => Some(Duration::days(7)),
        RepeatFrequency::Biweekly => Some(Duration::days(14)),
        RepeatFrequency::Monthly => Some(Duration::days(28)),
        RepeatFrequency::None | RepeatFrequency::Irregular => None,
    }
}

/// Step in days, 0 when the frequency has no fixed step.
pub fn increment_days(freq: RepeatFrequency) -> i64 {
    increment(freq).map(|d| d.num_days()).unwrap_or(0)
}

/// Due dates of a series starting at `start`.
///
/// Dates advance by the frequency's increment while they are on or before
/// `repeat_end`. Without a repeat end the series runs `horizon_days` past
/// `start`. Frequencies without an increment produce the single date `start`.
/// The series stops at the last representable date and is rejected when it
/// would exceed [`MAX_SERIES_ITERATIONS`].
pub fn series_dates(
    start: NaiveDate,
    freq: RepeatFrequency,
    repeat_end: Option<NaiveDate>,
    horizon_days: i64,
) -> Result<Vec<NaiveDate>, AppError> {
    let Some(step) = increment(freq) else {
        return Ok(vec![start]);
    };

    let end = match repeat_end {
        Some(end) if end < start => return Err(AppError::invalid_range(start, end)),
        Some(end) => end,
        None => start
            .checked_add_signed(Duration::days(horizon_days.max(0)))
            .ok_or_else(|| {
                AppError::invalid_value(
                    "due_date",
                    format!("{} is too far in the future for an open-ended series", start),
                )
            })?,
    };

    let mut dates = Vec::new();
    let mut next = Some(start);
    while let Some(date) = next.filter(|d| *d <= end) {
        if dates.len() == MAX_SERIES_ITERATIONS {
            return Err(AppError::new(
                ErrorCode::InvalidRange,
                format!(
                    "Series from {} to {} has more than {} iterations",
                    start, end, MAX_SERIES_ITERATIONS
                ),
            )
            .with_field("repeat_end"));
        }
        dates.push(date);
        next = date.checked_add_signed(step);
    }
    Ok(dates)
}
