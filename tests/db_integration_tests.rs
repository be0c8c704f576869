//! Integration tests for the database layer.
//!
//! These tests verify the core database operations using an in-memory SQLite database.
//! Tests are organized by module and functionality.

use chrono::NaiveDate;
use timely::db::Database;
use timely::error::{AppError, ErrorCode};
use timely::types::{ClassId, ClassInput, RepeatFrequency, TaskDetails, TaskId, TaskSort};

const USER: &str = "jdoe";

/// Helper to create a fresh in-memory database for testing.
fn setup_db() -> Database {
    Database::open_in_memory().expect("Failed to create in-memory database")
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn code_of(err: anyhow::Error) -> ErrorCode {
    AppError::from(err).code
}

fn setup_class(db: &Database, user: &str, color: &str) -> ClassId {
    db.create_class(
        user,
        &ClassInput {
            title: "Advanced Programming Techniques".to_string(),
            dept: "COS".to_string(),
            num: Some(333),
            color: color.to_string(),
            external_id: None,
        },
    )
    .expect("Failed to create class")
    .class_id
}

fn details(
    class_id: ClassId,
    title: &str,
    due: NaiveDate,
    freq: RepeatFrequency,
    end: Option<NaiveDate>,
) -> TaskDetails {
    TaskDetails {
        group_title: Some(title.to_string()),
        class_id: Some(class_id),
        est_time: Some(1.0),
        due_date: Some(due),
        repeat_freq: freq,
        repeat_end: end,
        ..TaskDetails::default()
    }
}

/// Weekly problem sets from 10/18 through 11/22 (six iterations).
fn weekly_task(db: &Database, class_id: ClassId) -> TaskId {
    db.create_task(
        USER,
        &details(
            class_id,
            "Problem set",
            date(2020, 10, 18),
            RepeatFrequency::Weekly,
            Some(date(2020, 11, 22)),
        ),
    )
    .expect("Failed to create task")
    .task
    .task_id
}

fn assert_contiguous(db: &Database, task_id: TaskId) {
    let numbers: Vec<i64> = db
        .list_iterations(USER, task_id)
        .unwrap()
        .iter()
        .map(|it| it.iteration)
        .collect();
    let expected: Vec<i64> = (1..=numbers.len() as i64).collect();
    assert_eq!(numbers, expected);
}

mod generator_tests {
    use super::*;

    #[test]
    fn weekly_series_runs_through_repeat_end() {
        let db = setup_db();
        let class_id = setup_class(&db, USER, "blue");

        let created = db
            .create_task(
                USER,
                &details(
                    class_id,
                    "Reading response",
                    date(2020, 10, 18),
                    RepeatFrequency::Weekly,
                    Some(date(2020, 11, 1)),
                ),
            )
            .unwrap();

        assert!(created.task.is_repeating);
        assert_eq!(created.task.repeat_freq, RepeatFrequency::Weekly);
        let dates: Vec<NaiveDate> = created.iterations.iter().map(|it| it.due_date).collect();
        assert_eq!(
            dates,
            vec![date(2020, 10, 18), date(2020, 10, 25), date(2020, 11, 1)]
        );
        assert!(created.iterations.iter().all(|it| it.timely_pred == Some(1.0)));
        assert!(
            created
                .iterations
                .iter()
                .all(|it| it.iteration_title.as_deref() == Some("Reading response"))
        );
        assert_contiguous(&db, created.task.task_id);
    }

    #[test]
    fn non_repeating_task_has_one_iteration() {
        let db = setup_db();
        let class_id = setup_class(&db, USER, "blue");

        let created = db
            .create_task(
                USER,
                &details(
                    class_id,
                    "Midterm",
                    date(2020, 10, 18),
                    RepeatFrequency::None,
                    Some(date(2020, 12, 1)),
                ),
            )
            .unwrap();

        assert!(!created.task.is_repeating);
        assert_eq!(created.task.repeat_end, None);
        assert_eq!(created.iterations.len(), 1);
        assert_eq!(created.iterations[0].iteration, 1);
        assert_eq!(created.iterations[0].due_date, date(2020, 10, 18));
    }

    #[test]
    fn open_ended_series_stops_at_horizon() {
        let db = setup_db().with_open_ended_horizon(14);
        let class_id = setup_class(&db, USER, "blue");

        let created = db
            .create_task(
                USER,
                &details(class_id, "Journal", date(2020, 10, 18), RepeatFrequency::Daily, None),
            )
            .unwrap();

        assert_eq!(created.iterations.len(), 15);
        assert_eq!(created.iterations.last().unwrap().due_date, date(2020, 11, 1));
    }

    #[test]
    fn repeat_end_before_start_is_rejected_without_writes() {
        let db = setup_db();
        let class_id = setup_class(&db, USER, "blue");

        let err = db
            .create_task(
                USER,
                &details(
                    class_id,
                    "Backwards",
                    date(2020, 10, 18),
                    RepeatFrequency::Weekly,
                    Some(date(2020, 10, 1)),
                ),
            )
            .unwrap_err();

        assert_eq!(code_of(err), ErrorCode::InvalidRange);
        assert!(db.list_tasks(USER, TaskSort::DueDate).unwrap().is_empty());
        assert!(db.tasks_for_class(USER, class_id).unwrap().is_empty());
    }

    #[test]
    fn overlong_series_is_rejected_without_writes() {
        let db = setup_db();
        let class_id = setup_class(&db, USER, "red");

        let err = db
            .create_task(
                USER,
                &details(
                    class_id,
                    "Daily reading",
                    date(2020, 1, 1),
                    RepeatFrequency::Daily,
                    Some(date(9999, 12, 31)),
                ),
            )
            .unwrap_err();

        assert_eq!(code_of(err), ErrorCode::InvalidRange);
        assert!(db.list_tasks(USER, TaskSort::DueDate).unwrap().is_empty());
    }

    #[test]
    fn missing_due_date_is_rejected() {
        let db = setup_db();
        let class_id = setup_class(&db, USER, "blue");
        let mut form = details(class_id, "Essay", date(2020, 10, 18), RepeatFrequency::None, None);
        form.due_date = None;

        let err = db.create_task(USER, &form).unwrap_err();
        let err = AppError::from(err);
        assert_eq!(err.code, ErrorCode::MissingRequiredField);
        assert_eq!(err.field.as_deref(), Some("due_date"));
    }

    #[test]
    fn task_in_another_users_class_is_rejected() {
        let db = setup_db();
        let foreign_class = setup_class(&db, "someone-else", "red");

        let err = db
            .create_task(
                USER,
                &details(foreign_class, "Essay", date(2020, 10, 18), RepeatFrequency::None, None),
            )
            .unwrap_err();
        assert_eq!(code_of(err), ErrorCode::ClassNotFound);
    }
}

mod iteration_tests {
    use super::*;

    #[test]
    fn deleting_interior_iteration_renumbers_later_ones() {
        let db = setup_db();
        let class_id = setup_class(&db, USER, "blue");
        let task_id = weekly_task(&db, class_id);

        db.delete_iteration(USER, task_id, 2).unwrap();

        let iterations = db.list_iterations(USER, task_id).unwrap();
        assert_eq!(iterations.len(), 5);
        assert_eq!(iterations[1].iteration, 2);
        assert_eq!(iterations[1].due_date, date(2020, 11, 1));
        assert_contiguous(&db, task_id);
    }

    #[test]
    fn deleting_only_iteration_deletes_task() {
        let db = setup_db();
        let class_id = setup_class(&db, USER, "blue");
        let task_id = db
            .create_task(
                USER,
                &details(class_id, "Quiz", date(2020, 10, 18), RepeatFrequency::None, None),
            )
            .unwrap()
            .task
            .task_id;

        db.delete_iteration(USER, task_id, 1).unwrap();

        let err = db.get_task(USER, task_id).unwrap_err();
        assert_eq!(code_of(err), ErrorCode::TaskNotFound);
    }

    #[test]
    fn complete_then_uncomplete_restores_iteration() {
        let db = setup_db();
        let class_id = setup_class(&db, USER, "blue");
        let task_id = weekly_task(&db, class_id);

        let done = db.complete_iteration(USER, task_id, 1, Some(2.0)).unwrap();
        assert!(done.completed);
        assert_eq!(done.actual_time, Some(2.0));

        let reopened = db.uncomplete_iteration(USER, task_id, 1).unwrap();
        assert!(!reopened.completed);
        assert_eq!(reopened.actual_time, None);
        assert!(db.fetch_history(USER, task_id).unwrap().is_empty());
    }

    #[test]
    fn complete_without_time_keeps_predictions() {
        let db = setup_db();
        let class_id = setup_class(&db, USER, "blue");
        let task_id = weekly_task(&db, class_id);

        db.complete_iteration(USER, task_id, 1, None).unwrap();

        let iterations = db.list_iterations(USER, task_id).unwrap();
        assert!(iterations[0].completed);
        assert_eq!(iterations[0].actual_time, None);
        assert!(iterations.iter().all(|it| it.timely_pred == Some(1.0)));
    }

    #[test]
    fn completing_missing_iteration_is_not_found() {
        let db = setup_db();
        let class_id = setup_class(&db, USER, "blue");
        let task_id = weekly_task(&db, class_id);

        let err = db.complete_iteration(USER, task_id, 42, Some(1.0)).unwrap_err();
        assert_eq!(code_of(err), ErrorCode::IterationNotFound);
    }

    #[test]
    fn negative_time_is_rejected() {
        let db = setup_db();
        let class_id = setup_class(&db, USER, "blue");
        let task_id = weekly_task(&db, class_id);

        let err = db.complete_iteration(USER, task_id, 1, Some(-1.0)).unwrap_err();
        assert_eq!(code_of(err), ErrorCode::InvalidFieldValue);
        assert!(!db.get_iteration(USER, task_id, 1).unwrap().completed);
    }

    #[test]
    fn other_users_cannot_see_iterations() {
        let db = setup_db();
        let class_id = setup_class(&db, USER, "blue");
        let task_id = weekly_task(&db, class_id);

        let err = db.get_task_details("intruder", task_id, 1).unwrap_err();
        assert_eq!(code_of(err), ErrorCode::TaskNotFound);
        let err = db.get_iteration("intruder", task_id, 1).unwrap_err();
        assert_eq!(code_of(err), ErrorCode::IterationNotFound);
    }
}

mod prediction_tests {
    use super::*;

    fn predictions(db: &Database, task_id: TaskId) -> Vec<Option<f64>> {
        db.list_iterations(USER, task_id)
            .unwrap()
            .iter()
            .map(|it| it.timely_pred)
            .collect()
    }

    #[test]
    fn empty_history_falls_back_to_first_estimate() {
        let db = setup_db();
        let class_id = setup_class(&db, USER, "blue");
        let task_id = weekly_task(&db, class_id);

        assert_eq!(db.predict_time(USER, task_id).unwrap(), 1.0);
    }

    #[test]
    fn short_history_predicts_the_mean() {
        let db = setup_db();
        let class_id = setup_class(&db, USER, "blue");
        let task_id = weekly_task(&db, class_id);

        db.complete_iteration(USER, task_id, 1, Some(3.0)).unwrap();
        db.complete_iteration(USER, task_id, 2, Some(5.0)).unwrap();

        assert_eq!(db.predict_time(USER, task_id).unwrap(), 4.0);
        let preds = predictions(&db, task_id);
        assert_eq!(preds[0], Some(1.0));
        assert_eq!(preds[1], Some(3.0));
        assert!(preds[2..].iter().all(|p| *p == Some(4.0)));
    }

    #[test]
    fn long_history_weights_recent_iterations() {
        let db = setup_db();
        let class_id = setup_class(&db, USER, "blue");
        let task_id = weekly_task(&db, class_id);

        for (iteration, time) in [(1, 4.0), (2, 5.0), (3, 6.0), (4, 3.0), (5, 7.0)] {
            db.complete_iteration(USER, task_id, iteration, Some(time)).unwrap();
        }

        assert_eq!(db.predict_time(USER, task_id).unwrap(), 4.8);
        assert_eq!(db.get_iteration(USER, task_id, 6).unwrap().timely_pred, Some(4.8));
    }

    #[test]
    fn uncompleting_repropagates_from_remaining_history() {
        let db = setup_db();
        let class_id = setup_class(&db, USER, "blue");
        let task_id = weekly_task(&db, class_id);

        db.complete_iteration(USER, task_id, 1, Some(3.0)).unwrap();
        db.complete_iteration(USER, task_id, 2, Some(5.0)).unwrap();
        db.uncomplete_iteration(USER, task_id, 2).unwrap();

        let preds = predictions(&db, task_id);
        assert!(preds[2..].iter().all(|p| *p == Some(3.0)));
    }

    #[test]
    fn recorded_time_without_completion_is_ignored() {
        let db = setup_db();
        let class_id = setup_class(&db, USER, "blue");
        let task_id = weekly_task(&db, class_id);

        db.complete_iteration(USER, task_id, 1, Some(2.0)).unwrap();
        db.record_actual_time(USER, task_id, 2, Some(10.0)).unwrap();

        assert_eq!(db.fetch_history(USER, task_id).unwrap().len(), 2);
        assert_eq!(db.propagate_prediction(USER, task_id, 2).unwrap(), 2.0);
    }

    #[test]
    fn graph_series_covers_completed_iterations() {
        let db = setup_db();
        let class_id = setup_class(&db, USER, "blue");
        let task_id = weekly_task(&db, class_id);

        db.complete_iteration(USER, task_id, 1, Some(3.0)).unwrap();
        db.complete_iteration(USER, task_id, 2, Some(5.0)).unwrap();

        let series = db.graph_series(USER, task_id, 2).unwrap();
        assert_eq!(series.labels, vec![1, 2]);
        assert_eq!(series.actual_times, vec![3.0, 5.0]);
        assert_eq!(series.predicted_times, vec![1.0, 3.0]);

        // An open iteration only shows the history before it.
        let series = db.graph_series(USER, task_id, 3).unwrap();
        assert_eq!(series.labels, vec![1, 2]);
    }
}

mod regeneration_tests {
    use super::*;

    fn due_dates(db: &Database, task_id: TaskId) -> Vec<NaiveDate> {
        db.list_iterations(USER, task_id)
            .unwrap()
            .iter()
            .map(|it| it.due_date)
            .collect()
    }

    #[test]
    fn frequency_change_preserves_past_iterations() {
        let db = setup_db();
        let class_id = setup_class(&db, USER, "blue");
        let task_id = weekly_task(&db, class_id);
        db.complete_iteration(USER, task_id, 1, Some(2.0)).unwrap();
        db.complete_iteration(USER, task_id, 2, Some(4.0)).unwrap();

        let mut edit = TaskDetails {
            repeat_freq: RepeatFrequency::Biweekly,
            repeat_end: Some(date(2020, 12, 20)),
            est_time: Some(1.0),
            ..TaskDetails::default()
        };
        edit.iteration_title = Some("Problem set 3".to_string());
        db.update_task_details(USER, task_id, 3, &edit).unwrap();

        let iterations = db.list_iterations(USER, task_id).unwrap();
        assert!(iterations[0].completed && iterations[1].completed);
        assert_eq!(iterations[0].actual_time, Some(2.0));
        assert_eq!(
            due_dates(&db, task_id),
            vec![
                date(2020, 10, 18),
                date(2020, 10, 25),
                date(2020, 11, 1),
                date(2020, 11, 15),
                date(2020, 11, 29),
                date(2020, 12, 13),
            ]
        );
        assert_eq!(iterations[2].iteration_title.as_deref(), Some("Problem set 3"));
        assert_contiguous(&db, task_id);

        let task = db.get_task(USER, task_id).unwrap();
        assert_eq!(task.repeat_freq, RepeatFrequency::Biweekly);
        assert_eq!(task.repeat_end, Some(date(2020, 12, 20)));
    }

    #[test]
    fn unchanged_rule_only_edits_one_iteration() {
        let db = setup_db();
        let class_id = setup_class(&db, USER, "blue");
        let task_id = weekly_task(&db, class_id);

        let edit = TaskDetails {
            due_date: Some(date(2020, 10, 27)),
            repeat_freq: RepeatFrequency::Weekly,
            repeat_end: Some(date(2020, 11, 22)),
            notes: Some("moved".to_string()),
            ..TaskDetails::default()
        };
        let view = db.update_task_details(USER, task_id, 2, &edit).unwrap();
        assert_eq!(view.iteration.due_date, date(2020, 10, 27));
        assert_eq!(view.iteration.notes.as_deref(), Some("moved"));

        let dates = due_dates(&db, task_id);
        assert_eq!(dates.len(), 6);
        assert_eq!(dates[1], date(2020, 10, 27));
        assert_eq!(dates[2], date(2020, 11, 1));
    }

    #[test]
    fn switching_to_none_truncates_the_series() {
        let db = setup_db();
        let class_id = setup_class(&db, USER, "blue");
        let task_id = weekly_task(&db, class_id);

        let edit = TaskDetails {
            repeat_freq: RepeatFrequency::None,
            ..TaskDetails::default()
        };
        db.update_task_details(USER, task_id, 2, &edit).unwrap();

        assert_eq!(due_dates(&db, task_id), vec![date(2020, 10, 18), date(2020, 10, 25)]);
        let task = db.get_task(USER, task_id).unwrap();
        assert!(!task.is_repeating);
        assert_eq!(task.repeat_end, None);
    }

    #[test]
    fn rule_change_on_completed_iteration_is_rejected() {
        let db = setup_db();
        let class_id = setup_class(&db, USER, "blue");
        let task_id = weekly_task(&db, class_id);
        db.complete_iteration(USER, task_id, 1, Some(2.0)).unwrap();

        let edit = TaskDetails {
            repeat_freq: RepeatFrequency::Daily,
            repeat_end: Some(date(2020, 11, 22)),
            ..TaskDetails::default()
        };
        let err = db.update_task_details(USER, task_id, 1, &edit).unwrap_err();

        assert_eq!(code_of(err), ErrorCode::InvalidState);
        assert_eq!(due_dates(&db, task_id).len(), 6);
        assert_eq!(db.get_task(USER, task_id).unwrap().repeat_freq, RepeatFrequency::Weekly);
    }

    #[test]
    fn repeat_end_before_edited_due_date_is_rejected() {
        let db = setup_db();
        let class_id = setup_class(&db, USER, "blue");
        let task_id = weekly_task(&db, class_id);

        let edit = TaskDetails {
            repeat_freq: RepeatFrequency::Weekly,
            repeat_end: Some(date(2020, 10, 20)),
            ..TaskDetails::default()
        };
        let err = db.update_task_details(USER, task_id, 3, &edit).unwrap_err();

        assert_eq!(code_of(err), ErrorCode::InvalidRange);
        assert_eq!(due_dates(&db, task_id).len(), 6);
    }

    #[test]
    fn completed_iterations_after_the_edit_survive_regeneration() {
        let db = setup_db();
        let class_id = setup_class(&db, USER, "blue");
        let task_id = weekly_task(&db, class_id);
        db.complete_iteration(USER, task_id, 4, Some(3.0)).unwrap();

        let edit = TaskDetails {
            repeat_freq: RepeatFrequency::Biweekly,
            repeat_end: Some(date(2020, 11, 22)),
            ..TaskDetails::default()
        };
        db.update_task_details(USER, task_id, 2, &edit).unwrap();

        assert_contiguous(&db, task_id);
        assert_eq!(
            due_dates(&db, task_id),
            vec![
                date(2020, 10, 18),
                date(2020, 10, 25),
                date(2020, 11, 8),
                date(2020, 11, 8),
                date(2020, 11, 22),
            ]
        );
        let iterations = db.list_iterations(USER, task_id).unwrap();
        assert!(iterations[2].completed);
        assert_eq!(iterations[2].actual_time, Some(3.0));
        assert!(!iterations[3].completed);
        assert!(!iterations[4].completed);
    }

    #[test]
    fn rule_change_past_the_last_date_fails_cleanly() {
        let db = setup_db();
        let class_id = setup_class(&db, USER, "blue");
        let far = NaiveDate::from_ymd_opt(262142, 12, 1).unwrap();
        let task_id = db
            .create_task(USER, &details(class_id, "Far away", far, RepeatFrequency::None, None))
            .unwrap()
            .task
            .task_id;

        let edit = TaskDetails {
            repeat_freq: RepeatFrequency::Weekly,
            ..TaskDetails::default()
        };
        let err = db.update_task_details(USER, task_id, 1, &edit).unwrap_err();
        assert_eq!(code_of(err), ErrorCode::InvalidFieldValue);

        let task = db.get_task(USER, task_id).unwrap();
        assert!(!task.is_repeating);
        assert_eq!(due_dates(&db, task_id), vec![far]);

        let other_class = setup_class(&db, "someone-else", "blue");
        let reading = details(other_class, "Reading", date(2020, 10, 18), RepeatFrequency::None, None);
        db.create_task("someone-else", &reading)
            .expect("database stays usable after a failed edit");
    }

    #[test]
    fn editing_first_iteration_reseeds_prediction() {
        let db = setup_db();
        let class_id = setup_class(&db, USER, "blue");
        let task_id = weekly_task(&db, class_id);

        let edit = TaskDetails {
            est_time: Some(2.5),
            repeat_freq: RepeatFrequency::Weekly,
            repeat_end: Some(date(2020, 11, 22)),
            ..TaskDetails::default()
        };
        let view = db.update_task_details(USER, task_id, 1, &edit).unwrap();

        assert_eq!(view.iteration.est_time, Some(2.5));
        assert_eq!(view.iteration.timely_pred, Some(2.5));
        assert_eq!(view.class_title, "Advanced Programming Techniques");
    }
}

mod view_tests {
    use super::*;

    #[test]
    fn list_shows_current_and_completed_iterations() {
        let db = setup_db();
        let class_id = setup_class(&db, USER, "blue");
        let task_id = weekly_task(&db, class_id);
        db.complete_iteration(USER, task_id, 1, Some(2.0)).unwrap();

        let list = db.list_tasks(USER, TaskSort::DueDate).unwrap();
        let rows: Vec<(i64, bool)> = list.iter().map(|e| (e.iteration, e.completed)).collect();
        assert_eq!(rows, vec![(2, false), (1, true)]);
        assert_eq!(list[0].repeat_freq, Some(RepeatFrequency::Weekly));
        assert_eq!(list[0].color, "blue");
    }

    #[test]
    fn list_sorts_by_priority_descending() {
        let db = setup_db();
        let class_id = setup_class(&db, USER, "blue");
        for (title, priority) in [("Low", 1), ("High", 3), ("Medium", 2)] {
            let mut form = details(class_id, title, date(2020, 10, 18), RepeatFrequency::None, None);
            form.priority = Some(priority);
            db.create_task(USER, &form).unwrap();
        }

        let titles: Vec<String> = db
            .list_tasks(USER, TaskSort::Priority)
            .unwrap()
            .into_iter()
            .map(|e| e.group_title)
            .collect();
        assert_eq!(titles, vec!["High", "Medium", "Low"]);
    }

    #[test]
    fn calendar_contains_every_iteration() {
        let db = setup_db();
        let class_id = setup_class(&db, USER, "blue");
        weekly_task(&db, class_id);

        let calendar = db.calendar_tasks(USER).unwrap();
        assert_eq!(calendar.len(), 6);
        assert!(calendar.windows(2).all(|w| w[0].due_date <= w[1].due_date));
    }

    #[test]
    fn class_views_summarize_tasks_and_groups() {
        let db = setup_db();
        let class_id = setup_class(&db, USER, "blue");
        let series_id = weekly_task(&db, class_id);
        let single = db
            .create_task(
                USER,
                &details(class_id, "Final paper", date(2020, 12, 10), RepeatFrequency::None, None),
            )
            .unwrap()
            .task;

        let summaries = db.tasks_for_class(USER, class_id).unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].task_id, series_id);
        assert_eq!(summaries[0].num_iterations, 6);
        assert_eq!(summaries[0].due_date, None);
        assert_eq!(summaries[1].task_id, single.task_id);
        assert_eq!(summaries[1].due_date, Some(date(2020, 12, 10)));
        assert_eq!(summaries[1].iteration_title.as_deref(), Some("Final paper"));

        let groups = db.task_groups(USER, class_id).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].task_id, series_id);
    }

    #[test]
    fn deleting_task_removes_iterations() {
        let db = setup_db();
        let class_id = setup_class(&db, USER, "blue");
        let task_id = weekly_task(&db, class_id);

        db.delete_task(USER, task_id).unwrap();

        assert!(db.calendar_tasks(USER).unwrap().is_empty());
        let err = db.delete_task(USER, task_id).unwrap_err();
        assert_eq!(code_of(err), ErrorCode::TaskNotFound);
    }
}

mod class_tests {
    use super::*;

    #[test]
    fn colors_are_unique_per_user() {
        let db = setup_db();
        setup_class(&db, USER, "blue");

        let err = db
            .create_class(
                USER,
                &ClassInput {
                    title: "Linear Algebra".to_string(),
                    color: "blue".to_string(),
                    ..ClassInput::default()
                },
            )
            .unwrap_err();
        assert_eq!(code_of(err), ErrorCode::AlreadyExists);

        // Another user may pick the same color.
        setup_class(&db, "someone-else", "blue");

        let available = db.available_colors(USER).unwrap();
        assert_eq!(available.len(), 7);
        assert!(!available.contains(&"blue"));
    }

    #[test]
    fn unknown_color_is_rejected() {
        let db = setup_db();
        let err = db
            .create_class(
                USER,
                &ClassInput {
                    title: "Linear Algebra".to_string(),
                    color: "teal".to_string(),
                    ..ClassInput::default()
                },
            )
            .unwrap_err();
        assert_eq!(code_of(err), ErrorCode::InvalidFieldValue);
    }

    #[test]
    fn classes_list_by_department_and_number() {
        let db = setup_db();
        for (dept, num, color) in [("MAT", 202, "red"), ("COS", 333, "blue"), ("COS", 126, "green")] {
            db.create_class(
                USER,
                &ClassInput {
                    title: format!("{} {}", dept, num),
                    dept: dept.to_string(),
                    num: Some(num),
                    color: color.to_string(),
                    external_id: None,
                },
            )
            .unwrap();
        }

        let titles: Vec<String> = db
            .list_classes(USER)
            .unwrap()
            .into_iter()
            .map(|c| c.title)
            .collect();
        assert_eq!(titles, vec!["COS 126", "COS 333", "MAT 202"]);
    }

    #[test]
    fn updating_class_keeps_its_own_color() {
        let db = setup_db();
        let class_id = setup_class(&db, USER, "blue");

        let updated = db
            .update_class(
                USER,
                class_id,
                &ClassInput {
                    title: "COS 333: APT".to_string(),
                    dept: "COS".to_string(),
                    num: Some(333),
                    color: "blue".to_string(),
                    external_id: None,
                },
            )
            .unwrap();
        assert_eq!(updated.title, "COS 333: APT");
    }

    #[test]
    fn deleting_class_cascades_to_tasks() {
        let db = setup_db();
        let class_id = setup_class(&db, USER, "blue");
        let task_id = weekly_task(&db, class_id);

        db.delete_class(USER, class_id).unwrap();

        let err = db.get_task(USER, task_id).unwrap_err();
        assert_eq!(code_of(err), ErrorCode::TaskNotFound);
        assert!(db.calendar_tasks(USER).unwrap().is_empty());
    }

    #[test]
    fn api_key_must_not_be_blank() {
        let db = setup_db();
        let err = db.set_api_key(USER, "  ").unwrap_err();
        assert_eq!(code_of(err), ErrorCode::MissingRequiredField);

        db.set_api_key(USER, "secret").unwrap();
        let user = db.get_user(USER).unwrap().unwrap();
        assert_eq!(user.api_key.as_deref(), Some("secret"));
    }
}
