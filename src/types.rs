//! Core types for the Timely task tracker.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Task identifier. Autoincrementing, so unique per owner as well.
pub type TaskId = i64;

/// Class identifier.
pub type ClassId = i64;

/// Colors a class may be displayed with. Each color is used at most once per user.
pub const CLASS_COLORS: [&str; 8] = [
    "red", "green", "purple", "orange", "pink", "blue", "yellow", "white",
];

/// How often a task repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatFrequency {
    #[default]
    None,
    Daily,
    Weekly,
    Biweekly,
    Monthly,
    /// Due dates come from individually entered iterations (ad-hoc groups).
    Irregular,
}

impl RepeatFrequency {
    pub fn as_str(self) -> &'static str {
        match self {
            RepeatFrequency::None => "none",
            RepeatFrequency::Daily => "daily",
            RepeatFrequency::Weekly => "weekly",
            RepeatFrequency::Biweekly => "biweekly",
            RepeatFrequency::Monthly => "monthly",
            RepeatFrequency::Irregular => "irregular",
        }
    }

    /// Whether a task with this frequency is a repeating task.
    pub fn is_repeating(self) -> bool {
        self != RepeatFrequency::None
    }
}

impl fmt::Display for RepeatFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown repeat frequency '{0}' (expected none, daily, weekly, biweekly, monthly or irregular)")]
pub struct ParseFrequencyError(pub String);

impl FromStr for RepeatFrequency {
    type Err = ParseFrequencyError;

    /// Empty input and "None" (as sent by the edit form) both mean not repeating.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "none" => Ok(RepeatFrequency::None),
            "daily" => Ok(RepeatFrequency::Daily),
            "weekly" => Ok(RepeatFrequency::Weekly),
            "biweekly" => Ok(RepeatFrequency::Biweekly),
            "monthly" => Ok(RepeatFrequency::Monthly),
            "irregular" => Ok(RepeatFrequency::Irregular),
            _ => Err(ParseFrequencyError(s.to_string())),
        }
    }
}

/// An authenticated user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    /// Credential for the course-import integration.
    pub api_key: Option<String>,
    pub created_at: i64,
}

/// A course or category that tasks belong to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Class {
    pub class_id: ClassId,
    pub username: String,
    pub title: String,
    pub dept: String,
    pub num: Option<i64>,
    pub color: String,
    pub active: bool,
    /// Course id in the import source, if the class was imported.
    pub external_id: Option<i64>,
}

/// Fields submitted when creating or editing a class.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassInput {
    pub title: String,
    #[serde(default)]
    pub dept: String,
    pub num: Option<i64>,
    pub color: String,
    pub external_id: Option<i64>,
}

/// A named unit of work, possibly repeating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub task_id: TaskId,
    pub username: String,
    pub class_id: ClassId,
    /// Group title shown for the whole series.
    pub title: String,
    pub is_repeating: bool,
    pub repeat_freq: RepeatFrequency,
    /// Last due date of the series; `None` repeats open-ended.
    pub repeat_end: Option<NaiveDate>,
    /// Set when the task was assembled from one-off tasks by grouping.
    pub grouped: bool,
}

/// One dated occurrence of a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskIteration {
    pub username: String,
    pub task_id: TaskId,
    pub class_id: ClassId,
    /// 1-based position in the series.
    pub iteration: i64,
    pub iteration_title: Option<String>,
    pub priority: Option<i64>,
    pub link: Option<String>,
    pub notes: Option<String>,
    pub due_date: NaiveDate,
    pub due_time: Option<NaiveTime>,
    /// Hours the user expects the iteration to take.
    pub est_time: Option<f64>,
    /// Hours it actually took; set on completion.
    pub actual_time: Option<f64>,
    /// Predicted hours from the user's history.
    pub timely_pred: Option<f64>,
    pub completed: bool,
    /// Assignment id in the import source, if imported.
    pub external_id: Option<i64>,
}

/// Details bundle submitted by the task forms.
///
/// Every field is optional; absent form keys stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskDetails {
    /// Title of the whole series (task title).
    pub group_title: Option<String>,
    /// Display title of the individual iteration(s).
    pub iteration_title: Option<String>,
    pub class_id: Option<ClassId>,
    pub priority: Option<i64>,
    pub est_time: Option<f64>,
    pub link: Option<String>,
    pub notes: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub due_time: Option<NaiveTime>,
    #[serde(default)]
    pub repeat_freq: RepeatFrequency,
    pub repeat_end: Option<NaiveDate>,
    pub external_id: Option<i64>,
}

/// A past iteration with a recorded actual time, as used by the predictor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub iteration: i64,
    pub est_time: Option<f64>,
    pub actual_time: f64,
    pub timely_pred: Option<f64>,
    pub completed: bool,
}

/// Actual versus predicted times for the completion chart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSeries {
    pub labels: Vec<usize>,
    pub actual_times: Vec<f64>,
    pub predicted_times: Vec<f64>,
}

/// Row of the task list and calendar views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskListEntry {
    pub task_id: TaskId,
    pub group_title: String,
    pub iteration_title: Option<String>,
    pub class_title: String,
    pub color: String,
    pub iteration: i64,
    pub priority: Option<i64>,
    pub repeat: bool,
    pub repeat_freq: Option<RepeatFrequency>,
    pub repeat_end: Option<NaiveDate>,
    pub est_time: Option<f64>,
    /// Zero when no prediction exists yet.
    pub timely_pred: f64,
    pub actual_time: Option<f64>,
    pub link: Option<String>,
    pub notes: Option<String>,
    pub due_date: NaiveDate,
    pub completed: bool,
}

/// Ordering for the task list view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskSort {
    /// Active tasks soonest first, then completed tasks most recent first.
    #[default]
    DueDate,
    Priority,
    Class,
    Title,
}

impl FromStr for TaskSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "due_date" => Ok(TaskSort::DueDate),
            "priority" => Ok(TaskSort::Priority),
            "class" => Ok(TaskSort::Class),
            "title" => Ok(TaskSort::Title),
            other => Err(format!("unknown sort '{}'", other)),
        }
    }
}

/// Full details of one iteration for the edit dialog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDetailView {
    pub task: Task,
    pub class_title: String,
    pub iteration: TaskIteration,
}

/// A task with its whole series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskWithIterations {
    pub task: Task,
    pub iterations: Vec<TaskIteration>,
}

/// Task summary shown when browsing a class (e.g. in the grouping dialog).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSummary {
    pub task_id: TaskId,
    pub title: String,
    pub repeat: bool,
    pub class_title: String,
    pub color: String,
    pub num_iterations: i64,
    /// Only set for single-iteration tasks.
    pub due_date: Option<NaiveDate>,
    pub iteration_title: Option<String>,
}

/// A repeating task a one-off task may be grouped into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskGroupRef {
    pub task_id: TaskId,
    pub title: String,
}

/// One assignment from the external course-import source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportRecord {
    pub title: String,
    pub class_id: ClassId,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub due_time: Option<NaiveTime>,
    #[serde(default)]
    pub link: Option<String>,
    pub external_id: i64,
    #[serde(default)]
    pub completed: bool,
}

/// Outcome of an import run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub created: usize,
    pub updated: usize,
}
