//! Task creation, editing, deletion and the task views.

use super::Database;
use super::classes::require_class;
use super::iterations::{
    generate_series, list_iterations_internal, regenerate_after, require_iteration,
};
use crate::error::AppError;
use crate::schedule::{increment, series_dates};
use crate::types::{
    ClassId, RepeatFrequency, Task, TaskDetailView, TaskDetails, TaskGroupRef, TaskId,
    TaskListEntry, TaskSort, TaskSummary, TaskWithIterations,
};
use anyhow::Result;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::cmp::Reverse;

impl ToSql for RepeatFrequency {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for RepeatFrequency {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

pub fn parse_task_row(row: &Row) -> rusqlite::Result<Task> {
    Ok(Task {
        task_id: row.get("task_id")?,
        username: row.get("username")?,
        class_id: row.get("class_id")?,
        title: row.get("title")?,
        is_repeating: row.get("is_repeating")?,
        repeat_freq: row.get("repeat_freq")?,
        repeat_end: row.get("repeat_end")?,
        grouped: row.get("grouped")?,
    })
}

/// Internal helper to get a task using an existing connection (avoids deadlock).
pub(crate) fn get_task_internal(
    conn: &Connection,
    username: &str,
    task_id: TaskId,
) -> Result<Option<Task>> {
    let task = conn
        .query_row(
            "SELECT * FROM tasks WHERE username = ?1 AND task_id = ?2",
            params![username, task_id],
            parse_task_row,
        )
        .optional()?;
    Ok(task)
}

/// Fetch a task owned by `username`, or fail with TaskNotFound.
pub(crate) fn require_task(conn: &Connection, username: &str, task_id: TaskId) -> Result<Task> {
    get_task_internal(conn, username, task_id)?
        .ok_or_else(|| AppError::task_not_found(task_id).into())
}

/// Delete a task row; its iterations go with it.
pub(crate) fn delete_task_internal(conn: &Connection, username: &str, task_id: TaskId) -> Result<()> {
    let deleted = conn.execute(
        "DELETE FROM tasks WHERE username = ?1 AND task_id = ?2",
        params![username, task_id],
    )?;
    if deleted == 0 {
        return Err(AppError::task_not_found(task_id).into());
    }
    Ok(())
}

/// Insert a task row and return it.
pub(crate) fn insert_task(
    conn: &Connection,
    username: &str,
    class_id: ClassId,
    title: &str,
    freq: RepeatFrequency,
    repeat_end: Option<chrono::NaiveDate>,
) -> Result<Task> {
    conn.execute(
        "INSERT INTO tasks (username, class_id, title, is_repeating, repeat_freq, repeat_end, grouped)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0)",
        params![username, class_id, title, freq.is_repeating(), freq, repeat_end],
    )?;
    require_task(conn, username, conn.last_insert_rowid())
}

/// Repeat end as stored: only repeating tasks keep one.
fn effective_repeat_end(details: &TaskDetails) -> Option<chrono::NaiveDate> {
    if details.repeat_freq.is_repeating() {
        details.repeat_end
    } else {
        None
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

fn parse_list_row(row: &Row) -> rusqlite::Result<TaskListEntry> {
    let repeat: bool = row.get("is_repeating")?;
    let repeat_freq: RepeatFrequency = row.get("repeat_freq")?;
    let timely_pred: Option<f64> = row.get("timely_pred")?;
    Ok(TaskListEntry {
        task_id: row.get("task_id")?,
        group_title: row.get("group_title")?,
        iteration_title: row.get("iteration_title")?,
        class_title: row.get("class_title")?,
        color: row.get("color")?,
        iteration: row.get("iteration")?,
        priority: row.get("priority")?,
        repeat,
        repeat_freq: repeat.then_some(repeat_freq),
        repeat_end: if repeat { row.get("repeat_end")? } else { None },
        est_time: row.get("est_time")?,
        timely_pred: timely_pred.unwrap_or(0.0),
        actual_time: row.get("actual_time")?,
        link: row.get("link")?,
        notes: row.get("notes")?,
        due_date: row.get("due_date")?,
        completed: row.get("completed")?,
    })
}

const LIST_COLUMNS: &str = "
    SELECT t.task_id, t.title AS group_title, t.is_repeating, t.repeat_freq, t.repeat_end,
           c.title AS class_title, c.color,
           i.iteration, i.iteration_title, i.priority, i.est_time, i.timely_pred,
           i.actual_time, i.link, i.notes, i.due_date, i.completed
    FROM tasks t
    JOIN classes c ON c.class_id = t.class_id
    JOIN task_iterations i ON i.username = t.username AND i.task_id = t.task_id";

/// Order list entries for the task list view.
pub fn sort_task_list(entries: &mut [TaskListEntry], sort: TaskSort) {
    match sort {
        TaskSort::DueDate => entries.sort_by(|a, b| {
            a.completed.cmp(&b.completed).then_with(|| {
                if a.completed {
                    b.due_date.cmp(&a.due_date)
                } else {
                    a.due_date.cmp(&b.due_date)
                }
            })
        }),
        TaskSort::Priority => entries.sort_by_key(|e| Reverse(e.priority)),
        TaskSort::Class => entries.sort_by(|a, b| b.class_title.cmp(&a.class_title)),
        TaskSort::Title => entries.sort_by(|a, b| {
            let a_title = a.iteration_title.as_deref().unwrap_or(&a.group_title);
            let b_title = b.iteration_title.as_deref().unwrap_or(&b.group_title);
            a_title.cmp(b_title)
        }),
    }
}

impl Database {
    /// Create a task and generate its iterations from the submitted due date.
    pub fn create_task(&self, username: &str, details: &TaskDetails) -> Result<TaskWithIterations> {
        let class_id = details
            .class_id
            .ok_or_else(|| AppError::missing_field("class_id"))?;
        let due_date = details
            .due_date
            .ok_or_else(|| AppError::missing_field("due_date"))?;
        let title = non_empty(details.group_title.as_deref())
            .or_else(|| non_empty(details.iteration_title.as_deref()))
            .ok_or_else(|| AppError::missing_field("title"))?
            .to_string();

        let freq = details.repeat_freq;
        let repeat_end = effective_repeat_end(details);
        let horizon = self.open_ended_horizon();

        // Reject an empty series before anything is written.
        series_dates(due_date, freq, repeat_end, horizon)?;

        let mut generation = details.clone();
        if non_empty(generation.iteration_title.as_deref()).is_none() {
            generation.iteration_title = Some(title.clone());
        }

        self.with_transaction(|conn| {
            require_class(conn, username, class_id)?;
            let task = insert_task(conn, username, class_id, &title, freq, repeat_end)?;
            let iterations = generate_series(conn, &task, 1, due_date, &generation, horizon)?;

            tracing::info!(
                user = %username,
                task_id = task.task_id,
                freq = %freq,
                iterations = iterations.len(),
                "Created task"
            );
            Ok(TaskWithIterations { task, iterations })
        })
    }

    /// Apply the edit form to a task and one of its iterations.
    ///
    /// A changed repeat frequency or repeat end regenerates every open
    /// iteration after the edited one; nothing is regenerated otherwise.
    pub fn update_task_details(
        &self,
        username: &str,
        task_id: TaskId,
        iteration: i64,
        details: &TaskDetails,
    ) -> Result<TaskDetailView> {
        let horizon = self.open_ended_horizon();

        self.with_transaction(|conn| {
            let task = require_task(conn, username, task_id)?;
            let edited = require_iteration(conn, username, task_id, iteration)?;

            let freq = details.repeat_freq;
            let repeat_end = effective_repeat_end(details);
            let due_date = details.due_date.unwrap_or(edited.due_date);

            if let (Some(_), Some(end)) = (increment(freq), repeat_end) {
                if end < due_date {
                    return Err(AppError::invalid_range(due_date, end).into());
                }
            }

            let rule_changed = task.repeat_freq != freq || task.repeat_end != repeat_end;

            let title = non_empty(details.group_title.as_deref()).unwrap_or(task.title.as_str());
            conn.execute(
                "UPDATE tasks SET title = ?1, is_repeating = ?2, repeat_freq = ?3, repeat_end = ?4
                 WHERE username = ?5 AND task_id = ?6",
                params![title, freq.is_repeating(), freq, repeat_end, username, task_id],
            )?;

            let iteration_title = non_empty(details.iteration_title.as_deref())
                .map(str::to_string)
                .or(edited.iteration_title.clone());
            conn.execute(
                "UPDATE task_iterations
                 SET priority = ?1, link = ?2, notes = ?3, due_date = ?4, due_time = ?5,
                     est_time = ?6, iteration_title = ?7
                 WHERE username = ?8 AND task_id = ?9 AND iteration = ?10",
                params![
                    details.priority,
                    details.link,
                    details.notes,
                    due_date,
                    details.due_time,
                    details.est_time,
                    iteration_title,
                    username,
                    task_id,
                    iteration,
                ],
            )?;

            // The first iteration has no history, so its prediction is the estimate.
            if iteration == 1 {
                conn.execute(
                    "UPDATE task_iterations SET timely_pred = ?1
                     WHERE username = ?2 AND task_id = ?3 AND iteration = 1",
                    params![details.est_time, username, task_id],
                )?;
            }

            if rule_changed {
                let task = require_task(conn, username, task_id)?;
                let edited = require_iteration(conn, username, task_id, iteration)?;
                let mut generation = details.clone();
                generation.iteration_title = edited.iteration_title.clone();
                regenerate_after(conn, &task, &edited, &generation, horizon)?;
            }

            tracing::info!(user = %username, task_id, iteration, rule_changed, "Updated task details");
            task_detail_internal(conn, username, task_id, iteration)
        })
    }

    /// Delete a task and all of its iterations.
    pub fn delete_task(&self, username: &str, task_id: TaskId) -> Result<()> {
        self.with_conn(|conn| {
            delete_task_internal(conn, username, task_id)?;
            tracing::info!(user = %username, task_id, "Deleted task");
            Ok(())
        })
    }

    /// Get a task.
    pub fn get_task(&self, username: &str, task_id: TaskId) -> Result<Task> {
        self.with_conn(|conn| require_task(conn, username, task_id))
    }

    /// Get a task together with all its iterations.
    pub fn get_task_with_iterations(&self, username: &str, task_id: TaskId) -> Result<TaskWithIterations> {
        self.with_conn(|conn| {
            let task = require_task(conn, username, task_id)?;
            let iterations = list_iterations_internal(conn, username, task_id)?;
            Ok(TaskWithIterations { task, iterations })
        })
    }

    /// Task, class title and iteration for the details dialog.
    pub fn get_task_details(&self, username: &str, task_id: TaskId, iteration: i64) -> Result<TaskDetailView> {
        self.with_conn(|conn| task_detail_internal(conn, username, task_id, iteration))
    }

    /// The task list: each task's current (earliest open) iteration plus all completed ones.
    pub fn list_tasks(&self, username: &str, sort: TaskSort) -> Result<Vec<TaskListEntry>> {
        let mut entries = self.with_conn(|conn| {
            let sql = format!(
                "{LIST_COLUMNS}
                 WHERE t.username = ?1
                   AND (i.completed = 1 OR i.iteration = (
                        SELECT MIN(o.iteration) FROM task_iterations o
                        WHERE o.username = i.username AND o.task_id = i.task_id AND o.completed = 0))
                 ORDER BY t.task_id, i.iteration"
            );
            let mut stmt = conn.prepare(&sql)?;
            let entries = stmt
                .query_map(params![username], parse_list_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(entries)
        })?;

        sort_task_list(&mut entries, sort);
        Ok(entries)
    }

    /// Every iteration of every task, for the calendar view.
    pub fn calendar_tasks(&self, username: &str) -> Result<Vec<TaskListEntry>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{LIST_COLUMNS}
                 WHERE t.username = ?1
                 ORDER BY i.due_date, t.task_id, i.iteration"
            );
            let mut stmt = conn.prepare(&sql)?;
            let entries = stmt
                .query_map(params![username], parse_list_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(entries)
        })
    }

    /// Summaries of a class's tasks, skipping tasks without iterations.
    pub fn tasks_for_class(&self, username: &str, class_id: ClassId) -> Result<Vec<TaskSummary>> {
        self.with_conn(|conn| {
            let class = require_class(conn, username, class_id)?;
            let mut stmt = conn.prepare(
                "SELECT t.task_id, t.title, t.is_repeating,
                        COUNT(i.id) AS num_iterations,
                        MIN(i.due_date) AS due_date,
                        MIN(i.iteration_title) AS iteration_title
                 FROM tasks t
                 LEFT JOIN task_iterations i ON i.username = t.username AND i.task_id = t.task_id
                 WHERE t.username = ?1 AND t.class_id = ?2
                 GROUP BY t.task_id
                 HAVING COUNT(i.id) > 0
                 ORDER BY t.task_id",
            )?;
            let summaries = stmt
                .query_map(params![username, class_id], |row| {
                    let num_iterations: i64 = row.get("num_iterations")?;
                    let single = num_iterations == 1;
                    Ok(TaskSummary {
                        task_id: row.get("task_id")?,
                        title: row.get("title")?,
                        repeat: row.get("is_repeating")?,
                        class_title: class.title.clone(),
                        color: class.color.clone(),
                        num_iterations,
                        due_date: if single { row.get("due_date")? } else { None },
                        iteration_title: if single { row.get("iteration_title")? } else { None },
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(summaries)
        })
    }

    /// Repeating tasks of a class that one-off tasks can be grouped into.
    pub fn task_groups(&self, username: &str, class_id: ClassId) -> Result<Vec<TaskGroupRef>> {
        self.with_conn(|conn| {
            require_class(conn, username, class_id)?;
            let mut stmt = conn.prepare(
                "SELECT task_id, title FROM tasks
                 WHERE username = ?1 AND class_id = ?2 AND is_repeating = 1
                 ORDER BY task_id",
            )?;
            let groups = stmt
                .query_map(params![username, class_id], |row| {
                    Ok(TaskGroupRef {
                        task_id: row.get(0)?,
                        title: row.get(1)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(groups)
        })
    }
}

fn task_detail_internal(
    conn: &Connection,
    username: &str,
    task_id: TaskId,
    iteration: i64,
) -> Result<TaskDetailView> {
    let task = require_task(conn, username, task_id)?;
    let iteration = require_iteration(conn, username, task_id, iteration)?;
    let class = require_class(conn, username, task.class_id)?;
    Ok(TaskDetailView {
        task,
        class_title: class.title,
        iteration,
    })
}
