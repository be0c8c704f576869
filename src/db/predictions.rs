//! Completion history, actual times and predicted times.

use super::Database;
use super::iterations::{require_iteration, set_actual_time};
use super::tasks::require_task;
use crate::predict::predict_next;
use crate::types::{GraphSeries, HistoryEntry, TaskId};
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, params};

/// Iterations of a task with a recorded actual time, in iteration order.
pub(crate) fn fetch_history_internal(
    conn: &Connection,
    username: &str,
    task_id: TaskId,
) -> Result<Vec<HistoryEntry>> {
    let mut stmt = conn.prepare(
        "SELECT iteration, est_time, actual_time, timely_pred, completed
         FROM task_iterations
         WHERE username = ?1 AND task_id = ?2 AND actual_time IS NOT NULL
         ORDER BY iteration",
    )?;
    let history = stmt
        .query_map(params![username, task_id], |row| {
            Ok(HistoryEntry {
                iteration: row.get(0)?,
                est_time: row.get(1)?,
                actual_time: row.get(2)?,
                timely_pred: row.get(3)?,
                completed: row.get(4)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(history)
}

/// Estimated time of the task's first iteration.
fn first_estimate(conn: &Connection, username: &str, task_id: TaskId) -> Result<Option<f64>> {
    let estimate: Option<Option<f64>> = conn
        .query_row(
            "SELECT est_time FROM task_iterations
             WHERE username = ?1 AND task_id = ?2
             ORDER BY iteration LIMIT 1",
            params![username, task_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(estimate.flatten())
}

/// Prediction for the task's next iteration from its current history.
pub(crate) fn predict_internal(conn: &Connection, username: &str, task_id: TaskId) -> Result<f64> {
    let history = fetch_history_internal(conn, username, task_id)?;
    let fallback = first_estimate(conn, username, task_id)?;
    Ok(predict_next(&history, fallback))
}

/// Recompute the prediction and write it into every iteration after `after`.
pub(crate) fn propagate_prediction_internal(
    conn: &Connection,
    username: &str,
    task_id: TaskId,
    after: i64,
) -> Result<f64> {
    let predicted = predict_internal(conn, username, task_id)?;
    let updated = conn.execute(
        "UPDATE task_iterations SET timely_pred = ?1
         WHERE username = ?2 AND task_id = ?3 AND iteration > ?4",
        params![predicted, username, task_id, after],
    )?;
    tracing::debug!(task_id, after, predicted, updated, "Propagated prediction");
    Ok(predicted)
}

impl Database {
    /// Every iteration of a task that has a recorded actual time.
    pub fn fetch_history(&self, username: &str, task_id: TaskId) -> Result<Vec<HistoryEntry>> {
        self.with_conn(|conn| {
            require_task(conn, username, task_id)?;
            fetch_history_internal(conn, username, task_id)
        })
    }

    /// Predicted hours for the task's next iteration.
    pub fn predict_time(&self, username: &str, task_id: TaskId) -> Result<f64> {
        self.with_conn(|conn| {
            require_task(conn, username, task_id)?;
            predict_internal(conn, username, task_id)
        })
    }

    /// Set (or clear) an iteration's actual time without touching predictions.
    pub fn record_actual_time(
        &self,
        username: &str,
        task_id: TaskId,
        iteration: i64,
        actual_time: Option<f64>,
    ) -> Result<()> {
        self.with_conn(|conn| set_actual_time(conn, username, task_id, iteration, actual_time))
    }

    /// Recompute the prediction from the history and write it into all iterations after `iteration`.
    pub fn propagate_prediction(&self, username: &str, task_id: TaskId, iteration: i64) -> Result<f64> {
        self.with_transaction(|conn| {
            require_iteration(conn, username, task_id, iteration)?;
            propagate_prediction_internal(conn, username, task_id, iteration)
        })
    }

    /// Actual and predicted times of the completed iterations before `iteration`,
    /// followed by `iteration` itself when it is completed.
    pub fn graph_series(&self, username: &str, task_id: TaskId, iteration: i64) -> Result<GraphSeries> {
        self.with_conn(|conn| {
            let current = require_iteration(conn, username, task_id, iteration)?;

            let mut stmt = conn.prepare(
                "SELECT actual_time, timely_pred, est_time FROM task_iterations
                 WHERE username = ?1 AND task_id = ?2 AND completed = 1 AND iteration < ?3
                 ORDER BY iteration",
            )?;
            let previous = stmt
                .query_map(params![username, task_id, iteration], |row| {
                    Ok((
                        row.get::<_, Option<f64>>(0)?,
                        row.get::<_, Option<f64>>(1)?,
                        row.get::<_, Option<f64>>(2)?,
                    ))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            let mut series = GraphSeries::default();
            for (actual, predicted, estimate) in previous {
                let Some(actual) = actual else { continue };
                series.push(actual, predicted.or(estimate).unwrap_or(0.0));
            }

            if current.completed {
                series.push(
                    current.actual_time.unwrap_or(0.0),
                    current.timely_pred.or(current.est_time).unwrap_or(0.0),
                );
            }
            Ok(series)
        })
    }
}

impl GraphSeries {
    fn push(&mut self, actual: f64, predicted: f64) {
        self.labels.push(self.labels.len() + 1);
        self.actual_times.push(actual);
        self.predicted_times.push(predicted);
    }
}
