//! Structured error types for API responses.

use serde::Serialize;
use std::fmt;

use crate::types::{ClassId, TaskId};

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (4xx-like)
    MissingRequiredField,
    InvalidFieldValue,
    InvalidRange,
    InvalidState,
    Unauthenticated,

    // Not found errors
    TaskNotFound,
    IterationNotFound,
    ClassNotFound,

    // Conflict errors
    InconsistentGroupState,
    AlreadyExists,

    // Internal errors
    DatabaseError,
    InternalError,
}

impl ErrorCode {
    /// HTTP status code the API responds with.
    pub fn http_status(self) -> u16 {
        match self {
            ErrorCode::MissingRequiredField
            | ErrorCode::InvalidFieldValue
            | ErrorCode::InvalidRange => 400,
            ErrorCode::Unauthenticated => 401,
            ErrorCode::TaskNotFound | ErrorCode::IterationNotFound | ErrorCode::ClassNotFound => {
                404
            }
            ErrorCode::InvalidState
            | ErrorCode::InconsistentGroupState
            | ErrorCode::AlreadyExists => 409,
            ErrorCode::DatabaseError | ErrorCode::InternalError => 500,
        }
    }
}

/// Structured error returned by every operation.
#[derive(Debug, Serialize)]
pub struct AppError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            field: None,
            details: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    // Convenience constructors

    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ErrorCode::MissingRequiredField,
            format!("{} is required", field),
        )
        .with_field(field)
    }

    pub fn invalid_value(field: &str, reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidFieldValue, reason).with_field(field)
    }

    pub fn invalid_range(start: impl fmt::Display, end: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::InvalidRange,
            format!("Repeat end {} is before the first due date {}", end, start),
        )
        .with_field("repeat_end")
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidState, message)
    }

    pub fn unauthenticated() -> Self {
        Self::new(ErrorCode::Unauthenticated, "No authenticated user")
    }

    pub fn task_not_found(task_id: TaskId) -> Self {
        Self::new(
            ErrorCode::TaskNotFound,
            format!("Task not found: {}", task_id),
        )
    }

    pub fn iteration_not_found(task_id: TaskId, iteration: i64) -> Self {
        Self::new(
            ErrorCode::IterationNotFound,
            format!("Iteration {} of task {} not found", iteration, task_id),
        )
    }

    pub fn class_not_found(class_id: ClassId) -> Self {
        Self::new(
            ErrorCode::ClassNotFound,
            format!("Class not found: {}", class_id),
        )
    }

    pub fn group_state(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InconsistentGroupState, message)
    }

    pub fn database(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::DatabaseError, err.to_string())
    }

    pub fn internal(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::InternalError, err.to_string())
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

// Store functions return anyhow errors; recover the structured error when there is one.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<AppError>() {
            Ok(app_err) => app_err,
            Err(err) => match err.downcast::<rusqlite::Error>() {
                Ok(sql_err) => AppError::database(sql_err),
                Err(err) => AppError::internal(err),
            },
        }
    }
}

/// Result type for API operations.
pub type AppResult<T> = std::result::Result<T, AppError>;
