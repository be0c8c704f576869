//! Completion time prediction from a task's history.
//!
//! The prediction is a two-tier weighted mean: once a task has more than
//! [`WEIGHTED_WINDOW`] + 1 timed iterations, the most recent ones count for
//! [`RECENT_WEIGHT`] of the result and everything older for [`OLDER_WEIGHT`].
//! With less history it is the plain mean of the completed actual times.

use crate::types::HistoryEntry;

/// Number of most recent iterations that receive the heavier weight.
pub const WEIGHTED_WINDOW: usize = 3;

/// Share of the prediction taken by the recent iterations.
pub const RECENT_WEIGHT: f64 = 0.60;

/// Share of the prediction taken by the older iterations.
pub const OLDER_WEIGHT: f64 = 0.40;

/// Predict the time the next iteration will take, in hours.
///
/// `history` must be ordered by iteration and contain only iterations with a
/// recorded actual time. An empty history falls back to `fallback_estimate`
/// (the first iteration's estimate), or 0 when there is none.
pub fn predict_next(history: &[HistoryEntry], fallback_estimate: Option<f64>) -> f64 {
    if history.is_empty() {
        return fallback_estimate.unwrap_or(0.0);
    }

    let n = history.len();
    if n - 1 > WEIGHTED_WINDOW {
        let weighted_start = n - WEIGHTED_WINDOW;
        let mut older = Mean::default();
        let mut recent = Mean::default();

        for (idx, entry) in history.iter().enumerate() {
            if !entry.completed {
                continue;
            }
            if idx + 1 < weighted_start {
                older.add(entry.actual_time);
            } else {
                recent.add(entry.actual_time);
            }
        }

        let weighted = match (older.value(), recent.value()) {
            (Some(o), Some(r)) => o * OLDER_WEIGHT + r * RECENT_WEIGHT,
            (Some(only), None) | (None, Some(only)) => only,
            (None, None) => 0.0,
        };
        return round_to_tenth(weighted);
    }

    let mut all = Mean::default();
    for entry in history.iter().filter(|e| e.completed) {
        all.add(entry.actual_time);
    }
    round_to_tenth(all.value().unwrap_or(0.0))
}

/// Round to the nearest 0.1, halves away from zero.
///
/// The value is first snapped to four decimals so that sums such as
/// `1.6 + 3.15` (stored as 4.7499999...) round like the decimal they represent.
pub fn round_to_tenth(value: f64) -> f64 {
    let tenths = (value * 1e4).round() / 1e3;
    tenths.round() / 10.0
}

#[derive(Default)]
struct Mean {
    sum: f64,
    count: usize,
}

impl Mean {
    fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn value(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}
