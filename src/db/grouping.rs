//! Merging one-off tasks into an irregular series.

use super::Database;
use super::iterations::{count_iterations, next_iteration_number};
use super::tasks::{delete_task_internal, get_task_internal, require_task};
use crate::error::AppError;
use crate::types::{RepeatFrequency, Task, TaskId};
use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::{Connection, params};
use std::collections::HashSet;

struct Candidate {
    task: Task,
    iterations: i64,
    earliest_due: NaiveDate,
}

fn load_candidate(conn: &Connection, username: &str, task_id: TaskId) -> Result<Candidate> {
    let task = get_task_internal(conn, username, task_id)?.ok_or_else(|| {
        AppError::group_state(format!("Task {} does not exist or belongs to another user", task_id))
    })?;
    let iterations = count_iterations(conn, username, task_id)?;
    let earliest_due: Option<NaiveDate> = conn.query_row(
        "SELECT MIN(due_date) FROM task_iterations WHERE username = ?1 AND task_id = ?2",
        params![username, task_id],
        |row| row.get(0),
    )?;
    let earliest_due = earliest_due
        .ok_or_else(|| AppError::group_state(format!("Task {} has no iterations", task_id)))?;
    Ok(Candidate {
        task,
        iterations,
        earliest_due,
    })
}

/// Reject a title already used by a grouped task outside the candidates.
fn check_title_free(conn: &Connection, username: &str, title: &str, ids: &[TaskId]) -> Result<()> {
    let mut stmt = conn.prepare(
        "SELECT task_id FROM tasks WHERE username = ?1 AND grouped = 1 AND title = ?2",
    )?;
    let clashing = stmt
        .query_map(params![username, title], |row| row.get::<_, TaskId>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?
        .into_iter()
        .find(|id| !ids.contains(id));
    if let Some(other) = clashing {
        return Err(AppError::group_state(format!(
            "Group title '{}' is already used by task {}",
            title, other
        ))
        .with_field("title")
        .into());
    }
    Ok(())
}

impl Database {
    /// Merge the given tasks into one irregular repeating task titled `title`.
    ///
    /// When one candidate is already a series it stays the anchor and the
    /// others are appended to it. Otherwise the earliest-due task becomes the
    /// anchor. Moved iterations are numbered in due-date order and the emptied
    /// tasks are deleted.
    pub fn group_tasks(&self, username: &str, task_ids: &[TaskId], title: &str) -> Result<Task> {
        let title = title.trim();
        if title.is_empty() {
            return Err(AppError::missing_field("title").into());
        }

        let mut seen = HashSet::new();
        let ids: Vec<TaskId> = task_ids.iter().copied().filter(|id| seen.insert(*id)).collect();
        if ids.len() < 2 {
            return Err(AppError::group_state("Select at least two tasks to group").into());
        }

        self.with_transaction(|conn| {
            let mut candidates = ids
                .iter()
                .map(|&id| load_candidate(conn, username, id))
                .collect::<Result<Vec<_>>>()?;

            let series: Vec<TaskId> = candidates
                .iter()
                .filter(|c| c.iterations > 1)
                .map(|c| c.task.task_id)
                .collect();
            if series.len() > 1 {
                return Err(AppError::group_state(format!(
                    "Tasks {:?} are already series and cannot be merged",
                    series
                ))
                .into());
            }

            check_title_free(conn, username, title, &ids)?;

            // Stable, so equal due dates keep the submitted order.
            candidates.sort_by_key(|c| c.earliest_due);

            let anchor_id = series
                .first()
                .copied()
                .unwrap_or(candidates[0].task.task_id);
            let anchor = candidates
                .iter()
                .find(|c| c.task.task_id == anchor_id)
                .map(|c| c.task.clone())
                .ok_or_else(|| AppError::internal("group anchor missing from candidates"))?;

            conn.execute(
                "UPDATE tasks SET is_repeating = 1, repeat_freq = ?1, repeat_end = NULL, grouped = 1, title = ?2
                 WHERE username = ?3 AND task_id = ?4",
                params![RepeatFrequency::Irregular, title, username, anchor_id],
            )?;

            for candidate in candidates.iter().filter(|c| c.task.task_id != anchor_id) {
                let next = next_iteration_number(conn, username, anchor_id)?;
                conn.execute(
                    "UPDATE task_iterations
                     SET task_id = ?1, class_id = ?2, iteration = ?3,
                         iteration_title = COALESCE(iteration_title, ?4)
                     WHERE username = ?5 AND task_id = ?6",
                    params![
                        anchor_id,
                        anchor.class_id,
                        next,
                        candidate.task.title,
                        username,
                        candidate.task.task_id,
                    ],
                )?;
                delete_task_internal(conn, username, candidate.task.task_id)?;
            }

            tracing::info!(
                user = %username,
                task_id = anchor_id,
                merged = candidates.len() - 1,
                title = %title,
                "Grouped tasks"
            );
            require_task(conn, username, anchor_id)
        })
    }
}
