//! Users, created on first authenticated request.

use super::{Database, now_ms};
use crate::error::AppError;
use crate::types::User;
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};

fn parse_user_row(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        username: row.get("username")?,
        api_key: row.get("api_key")?,
        created_at: row.get("created_at")?,
    })
}

/// Insert the user if missing (uses an existing connection to avoid deadlock).
pub(crate) fn ensure_user_internal(conn: &Connection, username: &str) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO users (username, api_key, created_at) VALUES (?1, NULL, ?2)",
        params![username, now_ms()],
    )?;
    Ok(())
}

impl Database {
    /// Make sure a row exists for the authenticated user and return it.
    pub fn ensure_user(&self, username: &str) -> Result<User> {
        if username.trim().is_empty() {
            return Err(AppError::unauthenticated().into());
        }
        self.with_conn(|conn| {
            ensure_user_internal(conn, username)?;
            let user = conn.query_row(
                "SELECT username, api_key, created_at FROM users WHERE username = ?1",
                params![username],
                parse_user_row,
            )?;
            Ok(user)
        })
    }

    /// Get a user if one exists.
    pub fn get_user(&self, username: &str) -> Result<Option<User>> {
        self.with_conn(|conn| {
            let user = conn
                .query_row(
                    "SELECT username, api_key, created_at FROM users WHERE username = ?1",
                    params![username],
                    parse_user_row,
                )
                .optional()?;
            Ok(user)
        })
    }

    /// Store the user's course-import API key.
    pub fn set_api_key(&self, username: &str, api_key: &str) -> Result<()> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(AppError::missing_field("api_key").into());
        }
        self.with_conn(|conn| {
            ensure_user_internal(conn, username)?;
            conn.execute(
                "UPDATE users SET api_key = ?1 WHERE username = ?2",
                params![api_key, username],
            )?;
            tracing::info!(user = %username, "Stored import API key");
            Ok(())
        })
    }
}
