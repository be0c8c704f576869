//! Form and query payloads accepted by the HTTP API.
//!
//! HTML forms submit every field as a string and send empty strings for
//! blank inputs; both are normalized here so the store only sees typed,
//! optional values.

use crate::error::AppError;
use crate::types::{ClassInput, RepeatFrequency, TaskDetails, TaskId, TaskSort};
use chrono::{Datelike, NaiveDate, NaiveTime};
use serde::Deserialize;
use std::str::FromStr;

/// Form date format (`<input type="date">`).
pub const FORM_DATE_FORMAT: &str = "%Y-%m-%d";

/// Latest year a form date may carry, the four-digit limit of `<input type="date">`.
const MAX_FORM_YEAR: i32 = 9999;

fn text(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn owned_text(value: &Option<String>) -> Option<String> {
    text(value).map(str::to_string)
}

fn parse_number<T: FromStr>(field: &str, value: &Option<String>) -> Result<Option<T>, AppError> {
    text(value)
        .map(|v| {
            v.parse()
                .map_err(|_| AppError::invalid_value(field, format!("'{}' is not a number", v)))
        })
        .transpose()
}

pub fn parse_date(field: &str, value: &Option<String>) -> Result<Option<NaiveDate>, AppError> {
    text(value)
        .map(|v| {
            NaiveDate::parse_from_str(v, FORM_DATE_FORMAT)
                .ok()
                .filter(|d| (1..=MAX_FORM_YEAR).contains(&d.year()))
                .ok_or_else(|| {
                    AppError::invalid_value(field, format!("'{}' is not a date (YYYY-MM-DD)", v))
                })
        })
        .transpose()
}

fn parse_time(field: &str, value: &Option<String>) -> Result<Option<NaiveTime>, AppError> {
    text(value)
        .map(|v| {
            NaiveTime::parse_from_str(v, "%H:%M")
                .or_else(|_| NaiveTime::parse_from_str(v, "%H:%M:%S"))
                .map_err(|_| AppError::invalid_value(field, format!("'{}' is not a time (HH:MM)", v)))
        })
        .transpose()
}

/// Create and edit task form.
#[derive(Debug, Default, Deserialize)]
pub struct TaskForm {
    pub task_title: Option<String>,
    pub group_title: Option<String>,
    pub iteration_title: Option<String>,
    pub class_id: Option<String>,
    pub priority: Option<String>,
    pub est_time: Option<String>,
    pub link: Option<String>,
    pub notes: Option<String>,
    pub due_date: Option<String>,
    pub due_time: Option<String>,
    pub repeat_freq: Option<String>,
    pub repeat_end: Option<String>,
}

impl TryFrom<TaskForm> for TaskDetails {
    type Error = AppError;

    fn try_from(form: TaskForm) -> Result<Self, Self::Error> {
        let repeat_freq = match text(&form.repeat_freq) {
            Some(freq) => RepeatFrequency::from_str(freq)
                .map_err(|e| AppError::invalid_value("repeat_freq", e.to_string()))?,
            None => RepeatFrequency::None,
        };
        let est_time: Option<f64> = parse_number("est_time", &form.est_time)?;
        if est_time.is_some_and(|t| !t.is_finite() || t < 0.0) {
            return Err(AppError::invalid_value("est_time", "Estimated time must be a non-negative number"));
        }

        Ok(TaskDetails {
            // The create form calls the series title `task_title`.
            group_title: owned_text(&form.group_title).or_else(|| owned_text(&form.task_title)),
            iteration_title: owned_text(&form.iteration_title),
            class_id: parse_number("class_id", &form.class_id)?,
            priority: parse_number("priority", &form.priority)?,
            est_time,
            link: owned_text(&form.link),
            notes: owned_text(&form.notes),
            due_date: parse_date("due_date", &form.due_date)?,
            due_time: parse_time("due_time", &form.due_time)?,
            repeat_freq,
            repeat_end: parse_date("repeat_end", &form.repeat_end)?,
            external_id: None,
        })
    }
}

/// Create and edit class form.
#[derive(Debug, Default, Deserialize)]
pub struct ClassForm {
    pub title: Option<String>,
    pub dept: Option<String>,
    pub num: Option<String>,
    pub color: Option<String>,
}

impl TryFrom<ClassForm> for ClassInput {
    type Error = AppError;

    fn try_from(form: ClassForm) -> Result<Self, Self::Error> {
        Ok(ClassInput {
            title: owned_text(&form.title).ok_or_else(|| AppError::missing_field("title"))?,
            dept: owned_text(&form.dept).unwrap_or_default(),
            num: parse_number("num", &form.num)?,
            color: owned_text(&form.color).ok_or_else(|| AppError::missing_field("color"))?,
            external_id: None,
        })
    }
}

/// Completion form: hours the iteration took.
#[derive(Debug, Default, Deserialize)]
pub struct CompleteForm {
    pub time: Option<String>,
}

impl CompleteForm {
    pub fn actual_time(&self) -> Result<Option<f64>, AppError> {
        parse_number("time", &self.time)
    }
}

#[derive(Debug, Deserialize)]
pub struct ApiKeyForm {
    pub api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GroupRequest {
    pub title: String,
    pub task_ids: Vec<TaskId>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TaskListQuery {
    pub sort: Option<String>,
}

impl TaskListQuery {
    pub fn sort(&self) -> Result<TaskSort, AppError> {
        match text(&self.sort) {
            Some(sort) => sort.parse().map_err(|e: String| AppError::invalid_value("sort", e)),
            None => Ok(TaskSort::default()),
        }
    }
}

/// Week navigation: `date` is the Sunday of the shown week (`MM/DD/YY`).
#[derive(Debug, Default, Deserialize)]
pub struct WeekQuery {
    pub date: Option<String>,
    pub direction: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct IterationPath {
    pub task_id: TaskId,
    pub iteration: i64,
}
