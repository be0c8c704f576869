//! Iteration generation, series regeneration, completion and deletion.
//!
//! A task's iterations are numbered `1..=n` without gaps. Every function here
//! that adds, removes or moves iterations runs inside one transaction and
//! leaves the numbering contiguous.

use super::Database;
use super::predictions::propagate_prediction_internal;
use super::tasks::{delete_task_internal, require_task};
use crate::error::AppError;
use crate::schedule::{increment, series_dates};
use crate::types::{RepeatFrequency, Task, TaskDetails, TaskId, TaskIteration};
use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, Row, params};

pub(crate) fn parse_iteration_row(row: &Row) -> rusqlite::Result<TaskIteration> {
    Ok(TaskIteration {
        username: row.get("username")?,
        task_id: row.get("task_id")?,
        class_id: row.get("class_id")?,
        iteration: row.get("iteration")?,
        iteration_title: row.get("iteration_title")?,
        priority: row.get("priority")?,
        link: row.get("link")?,
        notes: row.get("notes")?,
        due_date: row.get("due_date")?,
        due_time: row.get("due_time")?,
        est_time: row.get("est_time")?,
        actual_time: row.get("actual_time")?,
        timely_pred: row.get("timely_pred")?,
        completed: row.get("completed")?,
        external_id: row.get("external_id")?,
    })
}

/// Internal helper to get an iteration using an existing connection (avoids deadlock).
pub(crate) fn get_iteration_internal(
    conn: &Connection,
    username: &str,
    task_id: TaskId,
    iteration: i64,
) -> Result<Option<TaskIteration>> {
    let found = conn
        .query_row(
            "SELECT * FROM task_iterations
             WHERE username = ?1 AND task_id = ?2 AND iteration = ?3",
            params![username, task_id, iteration],
            parse_iteration_row,
        )
        .optional()?;
    Ok(found)
}

/// Fetch an iteration, or fail with IterationNotFound.
pub(crate) fn require_iteration(
    conn: &Connection,
    username: &str,
    task_id: TaskId,
    iteration: i64,
) -> Result<TaskIteration> {
    get_iteration_internal(conn, username, task_id, iteration)?
        .ok_or_else(|| AppError::iteration_not_found(task_id, iteration).into())
}

/// All iterations of a task ordered by iteration number.
pub(crate) fn list_iterations_internal(
    conn: &Connection,
    username: &str,
    task_id: TaskId,
) -> Result<Vec<TaskIteration>> {
    let mut stmt = conn.prepare(
        "SELECT * FROM task_iterations
         WHERE username = ?1 AND task_id = ?2
         ORDER BY iteration",
    )?;
    let iterations = stmt
        .query_map(params![username, task_id], parse_iteration_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(iterations)
}

/// The next free iteration number for a task.
pub(crate) fn next_iteration_number(conn: &Connection, username: &str, task_id: TaskId) -> Result<i64> {
    let max: i64 = conn.query_row(
        "SELECT COALESCE(MAX(iteration), 0) FROM task_iterations
         WHERE username = ?1 AND task_id = ?2",
        params![username, task_id],
        |row| row.get(0),
    )?;
    Ok(max + 1)
}

pub(crate) fn count_iterations(conn: &Connection, username: &str, task_id: TaskId) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM task_iterations WHERE username = ?1 AND task_id = ?2",
        params![username, task_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

fn insert_iteration(conn: &Connection, it: &TaskIteration) -> Result<()> {
    conn.execute(
        "INSERT INTO task_iterations (
            username, task_id, class_id, iteration, iteration_title, priority, link, notes,
            due_date, due_time, est_time, actual_time, timely_pred, completed, external_id
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            it.username,
            it.task_id,
            it.class_id,
            it.iteration,
            it.iteration_title,
            it.priority,
            it.link,
            it.notes,
            it.due_date,
            it.due_time,
            it.est_time,
            it.actual_time,
            it.timely_pred,
            it.completed,
            it.external_id,
        ],
    )?;
    Ok(())
}

/// Renumber a task's iterations to `1..=n`, keeping their order.
///
/// Rows are visited in ascending order and only ever move down, so the
/// unique (username, task_id, iteration) key is never violated midway.
pub(crate) fn compact_iterations(conn: &Connection, username: &str, task_id: TaskId) -> Result<()> {
    let mut stmt = conn.prepare(
        "SELECT id, iteration FROM task_iterations
         WHERE username = ?1 AND task_id = ?2
         ORDER BY iteration",
    )?;
    let rows = stmt
        .query_map(params![username, task_id], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    for (position, (id, iteration)) in rows.into_iter().enumerate() {
        let expected = position as i64 + 1;
        if iteration != expected {
            conn.execute(
                "UPDATE task_iterations SET iteration = ?1 WHERE id = ?2",
                params![expected, id],
            )?;
        }
    }
    Ok(())
}

/// Materialize a task's iterations from `start_date`, numbering from `start_iteration`.
///
/// Non-repeating and irregular tasks get one iteration. Repeating tasks get one
/// per increment up to the repeat end (or `horizon_days` when open-ended).
/// Each new iteration's prediction is seeded with the estimated time.
pub(crate) fn generate_series(
    conn: &Connection,
    task: &Task,
    start_iteration: i64,
    start_date: NaiveDate,
    details: &TaskDetails,
    horizon_days: i64,
) -> Result<Vec<TaskIteration>> {
    let freq = if task.is_repeating {
        task.repeat_freq
    } else {
        RepeatFrequency::None
    };
    let dates = series_dates(start_date, freq, task.repeat_end, horizon_days)?;

    let mut created = Vec::with_capacity(dates.len());
    for (offset, due_date) in dates.into_iter().enumerate() {
        let it = TaskIteration {
            username: task.username.clone(),
            task_id: task.task_id,
            class_id: task.class_id,
            iteration: start_iteration + offset as i64,
            iteration_title: details.iteration_title.clone(),
            priority: details.priority,
            link: details.link.clone(),
            notes: details.notes.clone(),
            due_date,
            due_time: details.due_time,
            est_time: details.est_time,
            actual_time: None,
            timely_pred: details.est_time,
            completed: false,
            external_id: details.external_id,
        };
        insert_iteration(conn, &it)?;
        created.push(it);
    }

    tracing::debug!(
        task_id = task.task_id,
        from = start_iteration,
        count = created.len(),
        "Generated iterations"
    );
    Ok(created)
}

/// Delete the task's uncompleted iterations numbered after `after`.
///
/// Completed iterations are history and stay; the survivors are renumbered.
pub(crate) fn truncate_after(
    conn: &Connection,
    username: &str,
    task_id: TaskId,
    after: i64,
) -> Result<usize> {
    let deleted = conn.execute(
        "DELETE FROM task_iterations
         WHERE username = ?1 AND task_id = ?2 AND iteration > ?3 AND completed = 0",
        params![username, task_id, after],
    )?;
    compact_iterations(conn, username, task_id)?;
    Ok(deleted)
}

/// Regenerate everything after `edited` under the task's (new) repeat rule.
///
/// `task` must already carry the new frequency and repeat end, and `edited`
/// the edited iteration's new due date. Iterations up to and including the
/// edited one are untouched. Returns the newly generated iterations.
pub(crate) fn regenerate_after(
    conn: &Connection,
    task: &Task,
    edited: &TaskIteration,
    details: &TaskDetails,
    horizon_days: i64,
) -> Result<Vec<TaskIteration>> {
    if edited.completed {
        return Err(AppError::invalid_state(format!(
            "Iteration {} of task {} is completed; edit the repeat rule from an open iteration",
            edited.iteration, task.task_id
        ))
        .into());
    }

    let freq = if task.is_repeating {
        task.repeat_freq
    } else {
        RepeatFrequency::None
    };
    if freq == RepeatFrequency::Irregular {
        // Irregular series keep their individually entered dates.
        return Ok(Vec::new());
    }
    if let Some(end) = task.repeat_end {
        if freq.is_repeating() && end < edited.due_date {
            return Err(AppError::invalid_range(edited.due_date, end).into());
        }
    }

    let removed = truncate_after(conn, &task.username, task.task_id, edited.iteration)?;

    let Some(step) = increment(freq) else {
        tracing::info!(task_id = task.task_id, removed, "Series truncated, task no longer repeats");
        return Ok(Vec::new());
    };

    let Some(resume) = edited
        .due_date
        .checked_add_signed(step)
        .filter(|resume| task.repeat_end.is_none_or(|end| *resume <= end))
    else {
        return Ok(Vec::new());
    };

    let start = next_iteration_number(conn, &task.username, task.task_id)?;
    let created = generate_series(conn, task, start, resume, details, horizon_days)?;
    tracing::info!(
        task_id = task.task_id,
        freq = %freq,
        removed,
        created = created.len(),
        "Regenerated series after repeat rule change"
    );
    Ok(created)
}

impl Database {
    /// Get one iteration.
    pub fn get_iteration(&self, username: &str, task_id: TaskId, iteration: i64) -> Result<TaskIteration> {
        self.with_conn(|conn| require_iteration(conn, username, task_id, iteration))
    }

    /// All iterations of a task, in order.
    pub fn list_iterations(&self, username: &str, task_id: TaskId) -> Result<Vec<TaskIteration>> {
        self.with_conn(|conn| {
            require_task(conn, username, task_id)?;
            list_iterations_internal(conn, username, task_id)
        })
    }

    /// Mark an iteration complete, recording how long it took when known.
    ///
    /// A recorded time updates the prediction of every later iteration.
    pub fn complete_iteration(
        &self,
        username: &str,
        task_id: TaskId,
        iteration: i64,
        actual_time: Option<f64>,
    ) -> Result<TaskIteration> {
        if let Some(time) = actual_time {
            if !time.is_finite() || time < 0.0 {
                return Err(AppError::invalid_value("time", "Time must be a non-negative number").into());
            }
        }

        self.with_transaction(|conn| {
            require_iteration(conn, username, task_id, iteration)?;
            conn.execute(
                "UPDATE task_iterations SET completed = 1
                 WHERE username = ?1 AND task_id = ?2 AND iteration = ?3",
                params![username, task_id, iteration],
            )?;

            if let Some(time) = actual_time {
                set_actual_time(conn, username, task_id, iteration, Some(time))?;
                propagate_prediction_internal(conn, username, task_id, iteration)?;
            }

            tracing::info!(user = %username, task_id, iteration, ?actual_time, "Completed iteration");
            require_iteration(conn, username, task_id, iteration)
        })
    }

    /// Reopen a completed iteration and forget its recorded time.
    pub fn uncomplete_iteration(
        &self,
        username: &str,
        task_id: TaskId,
        iteration: i64,
    ) -> Result<TaskIteration> {
        self.with_transaction(|conn| {
            require_iteration(conn, username, task_id, iteration)?;
            conn.execute(
                "UPDATE task_iterations SET completed = 0
                 WHERE username = ?1 AND task_id = ?2 AND iteration = ?3",
                params![username, task_id, iteration],
            )?;
            set_actual_time(conn, username, task_id, iteration, None)?;

            // The first iteration has no earlier history to predict from.
            if iteration >= 2 {
                propagate_prediction_internal(conn, username, task_id, iteration)?;
            }

            tracing::info!(user = %username, task_id, iteration, "Reopened iteration");
            require_iteration(conn, username, task_id, iteration)
        })
    }

    /// Delete one iteration and renumber the later ones down by one.
    ///
    /// Deleting the only remaining iteration deletes the task too.
    pub fn delete_iteration(&self, username: &str, task_id: TaskId, iteration: i64) -> Result<()> {
        self.with_transaction(|conn| {
            require_iteration(conn, username, task_id, iteration)?;
            conn.execute(
                "DELETE FROM task_iterations
                 WHERE username = ?1 AND task_id = ?2 AND iteration = ?3",
                params![username, task_id, iteration],
            )?;
            compact_iterations(conn, username, task_id)?;

            if count_iterations(conn, username, task_id)? == 0 {
                delete_task_internal(conn, username, task_id)?;
                tracing::info!(user = %username, task_id, "Deleted task with its last iteration");
            } else {
                tracing::info!(user = %username, task_id, iteration, "Deleted iteration");
            }
            Ok(())
        })
    }
}

/// Set or clear an iteration's actual time.
pub(crate) fn set_actual_time(
    conn: &Connection,
    username: &str,
    task_id: TaskId,
    iteration: i64,
    actual_time: Option<f64>,
) -> Result<()> {
    let updated = conn.execute(
        "UPDATE task_iterations SET actual_time = ?1
         WHERE username = ?2 AND task_id = ?3 AND iteration = ?4",
        params![actual_time, username, task_id, iteration],
    )?;
    if updated == 0 {
        return Err(AppError::iteration_not_found(task_id, iteration).into());
    }
    Ok(())
}
