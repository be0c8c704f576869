//! Class CRUD.

use super::Database;
use super::users::ensure_user_internal;
use crate::error::{AppError, ErrorCode};
use crate::types::{CLASS_COLORS, Class, ClassId, ClassInput};
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};

pub(crate) fn parse_class_row(row: &Row) -> rusqlite::Result<Class> {
    Ok(Class {
        class_id: row.get("class_id")?,
        username: row.get("username")?,
        title: row.get("title")?,
        dept: row.get("dept")?,
        num: row.get("num")?,
        color: row.get("color")?,
        active: row.get("active")?,
        external_id: row.get("external_id")?,
    })
}

/// Fetch a class owned by `username`, or fail with ClassNotFound.
pub(crate) fn require_class(conn: &Connection, username: &str, class_id: ClassId) -> Result<Class> {
    let class = conn
        .query_row(
            "SELECT * FROM classes WHERE username = ?1 AND class_id = ?2",
            params![username, class_id],
            parse_class_row,
        )
        .optional()?;
    class.ok_or_else(|| AppError::class_not_found(class_id).into())
}

/// Check that `color` is in the palette and not taken by another of the user's classes.
fn validate_color(
    conn: &Connection,
    username: &str,
    color: &str,
    except: Option<ClassId>,
) -> Result<()> {
    if !CLASS_COLORS.contains(&color) {
        return Err(AppError::invalid_value(
            "color",
            format!("Unknown color '{}'; choose one of {}", color, CLASS_COLORS.join(", ")),
        )
        .into());
    }
    let taken: i64 = conn.query_row(
        "SELECT COUNT(*) FROM classes
         WHERE username = ?1 AND color = ?2 AND class_id != COALESCE(?3, -1)",
        params![username, color, except],
        |row| row.get(0),
    )?;
    if taken > 0 {
        return Err(AppError::new(
            ErrorCode::AlreadyExists,
            format!("Color '{}' is already used by another class", color),
        )
        .with_field("color")
        .into());
    }
    Ok(())
}

fn validate_input(input: &ClassInput) -> Result<()> {
    if input.title.trim().is_empty() {
        return Err(AppError::missing_field("title").into());
    }
    Ok(())
}

impl Database {
    /// Create a class for the user.
    pub fn create_class(&self, username: &str, input: &ClassInput) -> Result<Class> {
        validate_input(input)?;
        self.with_transaction(|conn| {
            ensure_user_internal(conn, username)?;
            validate_color(conn, username, &input.color, None)?;

            conn.execute(
                "INSERT INTO classes (username, title, dept, num, color, active, external_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6)",
                params![
                    username,
                    input.title.trim(),
                    input.dept,
                    input.num,
                    input.color,
                    input.external_id,
                ],
            )?;
            let class_id = conn.last_insert_rowid();
            tracing::info!(user = %username, class_id, title = %input.title, "Created class");
            require_class(conn, username, class_id)
        })
    }

    /// Overwrite a class's title, department, number and color.
    pub fn update_class(&self, username: &str, class_id: ClassId, input: &ClassInput) -> Result<Class> {
        validate_input(input)?;
        self.with_transaction(|conn| {
            require_class(conn, username, class_id)?;
            validate_color(conn, username, &input.color, Some(class_id))?;

            conn.execute(
                "UPDATE classes SET title = ?1, dept = ?2, num = ?3, color = ?4
                 WHERE username = ?5 AND class_id = ?6",
                params![input.title.trim(), input.dept, input.num, input.color, username, class_id],
            )?;
            require_class(conn, username, class_id)
        })
    }

    /// Delete a class together with its tasks and iterations.
    pub fn delete_class(&self, username: &str, class_id: ClassId) -> Result<()> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM classes WHERE username = ?1 AND class_id = ?2",
                params![username, class_id],
            )?;
            if deleted == 0 {
                return Err(AppError::class_not_found(class_id).into());
            }
            tracing::info!(user = %username, class_id, "Deleted class");
            Ok(())
        })
    }

    /// Get one class.
    pub fn get_class(&self, username: &str, class_id: ClassId) -> Result<Class> {
        self.with_conn(|conn| require_class(conn, username, class_id))
    }

    /// All of the user's classes, ordered by department and number.
    pub fn list_classes(&self, username: &str) -> Result<Vec<Class>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM classes WHERE username = ?1 ORDER BY dept, num, class_id",
            )?;
            let classes = stmt
                .query_map(params![username], parse_class_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(classes)
        })
    }

    /// Palette colors not yet used by the user's classes.
    pub fn available_colors(&self, username: &str) -> Result<Vec<&'static str>> {
        let used: Vec<String> = self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT color FROM classes WHERE username = ?1")?;
            let colors = stmt
                .query_map(params![username], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<String>>>()?;
            Ok(colors)
        })?;

        Ok(CLASS_COLORS
            .iter()
            .copied()
            .filter(|c| !used.iter().any(|u| u == c))
            .collect())
    }

    /// Find the user's class imported from the given course id.
    pub fn find_class_by_external_id(&self, username: &str, external_id: i64) -> Result<Option<Class>> {
        self.with_conn(|conn| {
            let class = conn
                .query_row(
                    "SELECT * FROM classes WHERE username = ?1 AND external_id = ?2",
                    params![username, external_id],
                    parse_class_row,
                )
                .optional()?;
            Ok(class)
        })
    }
}
