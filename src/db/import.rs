//! Course import: assignments keyed by their external id.

use super::Database;
use super::classes::require_class;
use super::iterations::generate_series;
use super::tasks::insert_task;
use super::users::ensure_user_internal;
use crate::error::AppError;
use crate::types::{ImportRecord, ImportSummary, RepeatFrequency, TaskDetails, TaskId};
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, params};

/// Task and iteration number previously imported under `external_id`.
fn find_imported(conn: &Connection, username: &str, external_id: i64) -> Result<Option<(TaskId, i64)>> {
    let found = conn
        .query_row(
            "SELECT task_id, iteration FROM task_iterations
             WHERE username = ?1 AND external_id = ?2
             ORDER BY id LIMIT 1",
            params![username, external_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    Ok(found)
}

fn update_imported(
    conn: &Connection,
    username: &str,
    task_id: TaskId,
    iteration: i64,
    record: &ImportRecord,
) -> Result<()> {
    conn.execute(
        "UPDATE tasks SET title = ?1 WHERE username = ?2 AND task_id = ?3",
        params![record.title, username, task_id],
    )?;
    conn.execute(
        "UPDATE task_iterations SET link = ?1, due_date = ?2, completed = ?3
         WHERE username = ?4 AND task_id = ?5 AND iteration = ?6",
        params![record.link, record.due_date, record.completed, username, task_id, iteration],
    )?;
    Ok(())
}

fn create_imported(conn: &Connection, username: &str, record: &ImportRecord, horizon: i64) -> Result<()> {
    let task = insert_task(
        conn,
        username,
        record.class_id,
        &record.title,
        RepeatFrequency::None,
        None,
    )?;
    let details = TaskDetails {
        iteration_title: Some(record.title.clone()),
        class_id: Some(record.class_id),
        link: record.link.clone(),
        due_date: Some(record.due_date),
        due_time: record.due_time,
        external_id: Some(record.external_id),
        ..TaskDetails::default()
    };
    generate_series(conn, &task, 1, record.due_date, &details, horizon)?;

    if record.completed {
        conn.execute(
            "UPDATE task_iterations SET completed = 1 WHERE username = ?1 AND task_id = ?2",
            params![username, task.task_id],
        )?;
    }
    Ok(())
}

impl Database {
    /// Insert new assignments and refresh previously imported ones.
    ///
    /// Either every record is applied or none is.
    pub fn import_records(&self, username: &str, records: &[ImportRecord]) -> Result<ImportSummary> {
        if let Some(blank) = records.iter().find(|r| r.title.trim().is_empty()) {
            return Err(AppError::missing_field("title")
                .with_details(format!("record with external id {}", blank.external_id))
                .into());
        }

        let horizon = self.open_ended_horizon();
        self.with_transaction(|conn| {
            ensure_user_internal(conn, username)?;
            let mut summary = ImportSummary::default();

            for record in records {
                require_class(conn, username, record.class_id)?;
                match find_imported(conn, username, record.external_id)? {
                    Some((task_id, iteration)) => {
                        update_imported(conn, username, task_id, iteration, record)?;
                        summary.updated += 1;
                    }
                    None => {
                        create_imported(conn, username, record, horizon)?;
                        summary.created += 1;
                    }
                }
            }

            tracing::info!(
                user = %username,
                created = summary.created,
                updated = summary.updated,
                "Imported course records"
            );
            Ok(summary)
        })
    }
}
