mod common;

use cadence_core::error::{CoreError, Diagnostic, KeyViolation};
use cadence_core::models::{columns, sheets, CellValue, SchedulerConfig};
use cadence_core::store::{write_cell, TabularStore};
use chrono::Duration;
use common::*;
use rstest::rstest;

#[tokio::test]
async fn test_initialize_creates_sheets_and_headers() {
    let h = setup(SchedulerConfig::default()).await;

    let mut names = h.store.sheet_names().await.unwrap();
    names.sort();
    assert_eq!(names, vec!["Active", "Debug Log", "Main", "Recurring"]);
    assert_eq!(h.store.frozen_rows(sheets::ACTIVE).await.unwrap(), 3);
    assert!(h.store.filter(sheets::ACTIVE).await.unwrap().is_some());

    let reprocessing = column_of(&h.store, sheets::MAIN, columns::REPROCESSING).await;
    assert_eq!(h.store.hidden_columns(sheets::MAIN).await.unwrap(), vec![reprocessing]);

    // A second run creates nothing new.
    assert!(h.scheduler.initialize().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_duplicate_suppression() {
    let h = setup(quiet_config()).await;
    h.scheduler
        .add_recurring(definition("Laundry", "laundry", 1.0, false, Some(now() - Duration::days(10))))
        .await
        .unwrap();

    let first = h.scheduler.update_todays_tasks_at(now()).await.unwrap();
    let second = h.scheduler.update_todays_tasks_at(now()).await.unwrap();

    assert_eq!(first.materialization.created.len(), 1);
    assert!(second.materialization.created.is_empty());
    assert_eq!(active_tasks(&h.store).await.len(), 1);
}

#[tokio::test]
async fn test_duplicate_key_aborts_before_any_write() {
    let h = setup(quiet_config()).await;
    for key in ["A", "B", "A"] {
        h.store
            .append_rows(
                sheets::RECURRING,
                &[vec![
                    CellValue::text(format!("Task {}", key)),
                    CellValue::text(key),
                    CellValue::Number(1.0),
                ]],
            )
            .await
            .unwrap();
    }
    let active_before = h.store.snapshot(sheets::ACTIVE).unwrap();
    let recurring_before = h.store.snapshot(sheets::RECURRING).unwrap();

    let err = h.scheduler.update_todays_tasks_at(now()).await.unwrap_err();

    assert!(matches!(
        err,
        CoreError::InvalidRecurringKey(KeyViolation::Duplicate { ref key }) if key == "A"
    ));
    assert_eq!(h.store.snapshot(sheets::ACTIVE).unwrap(), active_before);
    assert_eq!(h.store.snapshot(sheets::RECURRING).unwrap(), recurring_before);
}

#[rstest]
#[case(0.1, true)]
#[case(0.3, false)]
#[case(-2.0, true)]
#[tokio::test]
async fn test_grace_window(#[case] offset_days: f64, #[case] materialized: bool) {
    let h = setup(quiet_config()).await;
    let next = now() + Duration::milliseconds((offset_days * 86_400_000.0) as i64);
    h.scheduler
        .add_recurring(definition("Water plants", "water", 2.0, false, Some(next)))
        .await
        .unwrap();

    let report = h.scheduler.update_todays_tasks_at(now()).await.unwrap();

    assert_eq!(report.materialization.created.len() == 1, materialized);
}

#[tokio::test]
async fn test_empty_next_date_is_due_now() {
    let h = setup(quiet_config()).await;
    h.scheduler
        .add_recurring(definition("Dishes", "dishes", 1.0, false, None))
        .await
        .unwrap();

    h.scheduler.update_todays_tasks_at(now()).await.unwrap();

    let def = recurring_definition(&h.store, "dishes").await;
    assert_eq!(def.next_scheduled_date, Some(now() + Duration::days(1)));
}

#[tokio::test]
async fn test_fixed_offset_rescheduling_ignores_completion() {
    let h = setup(quiet_config()).await;
    let scheduled = now() - Duration::hours(1);
    h.scheduler
        .add_recurring(definition("Bins", "bins", 3.0, false, Some(scheduled)))
        .await
        .unwrap();

    h.scheduler.update_todays_tasks_at(now()).await.unwrap();
    assert_eq!(
        recurring_definition(&h.store, "bins").await.next_scheduled_date,
        Some(scheduled + Duration::days(3))
    );

    let task = active_tasks(&h.store).await.remove(0);
    set_active_cell(&h.store, task.row, columns::COMPLETED, CellValue::Bool(true)).await;
    h.scheduler
        .update_active_sheet_at(now() + Duration::hours(5))
        .await
        .unwrap();

    assert_eq!(
        recurring_definition(&h.store, "bins").await.next_scheduled_date,
        Some(scheduled + Duration::days(3))
    );
}

#[tokio::test]
async fn test_completion_linked_rescheduling_through_active() {
    let h = setup(quiet_config()).await;
    h.scheduler
        .add_recurring(definition("Change filter", "filter", 7.0, true, None))
        .await
        .unwrap();

    let report = h.scheduler.update_todays_tasks_at(now()).await.unwrap();
    assert_eq!(report.materialization.created.len(), 1);
    assert_eq!(recurring_definition(&h.store, "filter").await.next_scheduled_date, None);

    let task = active_tasks(&h.store).await.remove(0);
    set_active_cell(&h.store, task.row, columns::COMPLETED, CellValue::Bool(true)).await;
    let completed_at = now() + Duration::days(2);
    let maintenance = h.scheduler.update_active_sheet_at(completed_at).await.unwrap();

    assert_eq!(maintenance.stamped, 1);
    assert_eq!(
        recurring_definition(&h.store, "filter").await.next_scheduled_date,
        Some(completed_at + Duration::days(7))
    );
    let task = active_tasks(&h.store).await.remove(0);
    assert_eq!(task.completed_date, Some(completed_at));
}

#[tokio::test]
async fn test_completed_instance_allows_next_spawn() {
    let h = setup(quiet_config()).await;
    h.scheduler
        .add_recurring(definition("Dishes", "dishes", 1.0, false, None))
        .await
        .unwrap();
    h.scheduler.update_todays_tasks_at(now()).await.unwrap();

    let task = active_tasks(&h.store).await.remove(0);
    set_active_cell(&h.store, task.row, columns::COMPLETED, CellValue::Bool(true)).await;
    let report = h
        .scheduler
        .update_todays_tasks_at(now() + Duration::days(1))
        .await
        .unwrap();

    assert_eq!(report.materialization.created.len(), 1);
    let tasks = active_tasks(&h.store).await;
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks.iter().filter(|t| t.is_incomplete()).count(), 1);
}

#[tokio::test]
async fn test_invalid_days_yields_diagnostic_without_spawning() {
    let h = setup(quiet_config()).await;
    h.store
        .append_rows(
            sheets::RECURRING,
            &[vec![
                CellValue::text("Mystery"),
                CellValue::text("mystery"),
                CellValue::text("often"),
            ]],
        )
        .await
        .unwrap();

    let report = h.scheduler.update_todays_tasks_at(now()).await.unwrap();

    assert!(report.materialization.created.is_empty());
    assert_eq!(
        report.materialization.diagnostics,
        vec![Diagnostic::InvalidCadence { key: "mystery".to_string(), row: 2 }]
    );
}

#[tokio::test]
async fn test_cadence_beyond_the_calendar_is_rejected() {
    let h = setup(quiet_config()).await;
    let err = h
        .scheduler
        .add_recurring(definition("Someday", "someday", 1e9, false, None))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidInput(_)));

    // A huge cadence typed straight into the sheet is reported, not applied.
    h.scheduler
        .add_recurring(definition("Change filter", "filter", 7.0, true, None))
        .await
        .unwrap();
    h.scheduler.update_todays_tasks_at(now()).await.unwrap();
    let days = column_of(&h.store, sheets::RECURRING, columns::DAYS).await;
    write_cell(h.store.as_ref(), sheets::RECURRING, 2, days, CellValue::Number(1e9))
        .await
        .unwrap();
    let task = active_tasks(&h.store).await.remove(0);
    set_active_cell(&h.store, task.row, columns::COMPLETED, CellValue::Bool(true)).await;

    let maintenance = h.scheduler.update_active_sheet_at(now()).await.unwrap();

    assert_eq!(maintenance.stamped, 1);
    assert!(maintenance.rescheduled.is_empty());
    assert_eq!(
        maintenance.diagnostics,
        vec![Diagnostic::InvalidCadence { key: "filter".to_string(), row: 2 }]
    );
    assert_eq!(recurring_definition(&h.store, "filter").await.next_scheduled_date, None);
}

#[tokio::test]
async fn test_one_off_intake_is_idempotent() {
    let h = setup(quiet_config()).await;
    h.scheduler.request_one_off("Call plumber", Some("Bob")).await.unwrap();

    let first = h.scheduler.update_active_sheet_at(now()).await.unwrap();
    let second = h.scheduler.update_active_sheet_at(now()).await.unwrap();

    let intake = first.intake.expect("intake task");
    assert_eq!(intake.task_name, "Call plumber");
    assert_eq!(intake.owner, "Bob");
    assert!(second.intake.is_none());

    let tasks = active_tasks(&h.store).await;
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].recurring_key, None);
    assert_eq!(tasks[0].owner.as_deref(), Some("Bob"));
    assert_eq!(h.store.snapshot(sheets::ACTIVE).unwrap()[1].iter().filter(|c| !c.is_blank()).count(), 0);
}

#[tokio::test]
async fn test_one_off_without_owner_is_shared() {
    let h = setup(quiet_config()).await;
    h.scheduler.request_one_off("Buy milk", None).await.unwrap();

    let report = h.scheduler.update_active_sheet_at(now()).await.unwrap();

    assert_eq!(report.intake.map(|t| t.owner), Some("Shared".to_string()));
}

#[tokio::test]
async fn test_owner_backfill_and_sort() {
    let h = setup(quiet_config()).await;
    for (task, key) in [("Mop", "mop"), ("Dust", "dust"), ("Iron", "iron")] {
        h.scheduler
            .add_recurring(definition(task, key, 1.0, false, None))
            .await
            .unwrap();
    }
    h.scheduler.update_todays_tasks_at(now()).await.unwrap();

    let tasks = active_tasks(&h.store).await;
    set_active_cell(&h.store, tasks[0].row, columns::OWNER, CellValue::text("Zed")).await;
    set_active_cell(&h.store, tasks[1].row, columns::OWNER, CellValue::Empty).await;
    set_active_cell(&h.store, tasks[2].row, columns::OWNER, CellValue::text("Alice")).await;

    let report = h.scheduler.update_active_sheet_at(now()).await.unwrap();

    assert_eq!(report.backfilled, 1);
    let owners: Vec<_> = active_tasks(&h.store)
        .await
        .into_iter()
        .map(|t| t.owner.unwrap_or_default())
        .collect();
    assert_eq!(owners, vec!["Alice", "Shared", "Zed"]);
}

#[tokio::test]
async fn test_dangling_key_does_not_abort_stamping() {
    let h = setup(quiet_config()).await;
    h.scheduler
        .add_recurring(definition("Dishes", "dishes", 1.0, true, None))
        .await
        .unwrap();
    h.scheduler
        .add_recurring(definition("Bins", "bins", 1.0, true, None))
        .await
        .unwrap();
    h.scheduler.update_todays_tasks_at(now()).await.unwrap();

    let tasks = active_tasks(&h.store).await;
    for task in &tasks {
        set_active_cell(&h.store, task.row, columns::COMPLETED, CellValue::Bool(true)).await;
    }
    let dishes = tasks.iter().find(|t| t.task_name == "Dishes").unwrap();
    set_active_cell(&h.store, dishes.row, columns::RECURRING_KEY, CellValue::text("ghost")).await;

    let report = h.scheduler.update_active_sheet_at(now()).await.unwrap();

    assert_eq!(report.stamped, 2);
    assert_eq!(
        report.diagnostics,
        vec![Diagnostic::DanglingRecurringKey { key: "ghost".to_string() }]
    );
    assert_eq!(report.rescheduled.len(), 1);
    assert_eq!(report.rescheduled[0].recurring_key, "bins");
}

#[tokio::test]
async fn test_review_view_lists_live_tasks() {
    let h = setup(quiet_config()).await;
    h.scheduler
        .add_recurring(definition("Dishes", "dishes", 1.0, false, None))
        .await
        .unwrap();
    h.scheduler.request_one_off("Call plumber", None).await.unwrap();

    let report = h.scheduler.update_todays_tasks_at(now()).await.unwrap();

    assert_eq!(report.maintenance.review_rows, 2);
    let task = active_tasks(&h.store).await.remove(0);
    let row = main_row_of(&h.store, &task).await;
    assert_eq!(main_cell(&h.store, row, columns::COMPLETE).await, CellValue::Bool(false));
    assert!(h.store.is_checkbox(sheets::MAIN, row, 1));
}

#[tokio::test]
async fn test_filter_toggle() {
    let h = setup(quiet_config()).await;
    h.scheduler.remove_filter().await.unwrap();
    assert!(h.store.filter(sheets::ACTIVE).await.unwrap().is_none());

    // Maintenance re-applies an installed filter but does not install one.
    h.scheduler.update_active_sheet_at(now()).await.unwrap();
    assert!(h.store.filter(sheets::ACTIVE).await.unwrap().is_none());

    h.scheduler.add_filter().await.unwrap();
    let filter = h.store.filter(sheets::ACTIVE).await.unwrap().unwrap();
    assert_eq!(filter.column, column_of(&h.store, sheets::ACTIVE, columns::COMPLETED).await);
    assert_eq!(filter.hidden_values, vec![CellValue::Bool(true)]);
}

#[tokio::test]
async fn test_completed_rows_are_filtered_from_active_view() {
    let h = setup(quiet_config()).await;
    h.scheduler
        .add_recurring(definition("Dishes", "dishes", 1.0, false, None))
        .await
        .unwrap();
    h.scheduler.update_todays_tasks_at(now()).await.unwrap();
    let task = active_tasks(&h.store).await.remove(0);
    set_active_cell(&h.store, task.row, columns::COMPLETED, CellValue::Bool(true)).await;

    h.scheduler.update_active_sheet_at(now()).await.unwrap();

    assert_eq!(h.store.hidden_rows(sheets::ACTIVE).await.unwrap(), vec![task.row]);
}

#[tokio::test]
async fn test_add_recurring_rejects_duplicate_key() {
    let h = setup(quiet_config()).await;
    h.scheduler
        .add_recurring(definition("Dishes", "dishes", 1.0, false, None))
        .await
        .unwrap();

    let err = h
        .scheduler
        .add_recurring(definition("Dishes again", "dishes", 2.0, false, None))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidRecurringKey(KeyViolation::Duplicate { .. })));
}

#[tokio::test]
async fn test_debug_log_records_steps() {
    let h = setup(SchedulerConfig::default()).await;
    h.scheduler
        .add_recurring(definition("Dishes", "dishes", 1.0, false, None))
        .await
        .unwrap();
    h.scheduler.update_todays_tasks_at(now()).await.unwrap();

    let log = h.store.snapshot(sheets::DEBUG_LOG).unwrap();
    assert!(log.len() > 2);
    assert!(log
        .iter()
        .any(|row| row.get(1).and_then(|c| c.as_text()).is_some_and(|m| m.contains("dishes"))));
}

#[tokio::test]
async fn test_missing_column_is_fatal() {
    let h = setup(quiet_config()).await;
    let days = column_of(&h.store, sheets::RECURRING, columns::DAYS).await;
    write_cell(h.store.as_ref(), sheets::RECURRING, 1, days, CellValue::text("Cadence"))
        .await
        .unwrap();

    let err = h.scheduler.update_todays_tasks_at(now()).await.unwrap_err();
    assert!(matches!(err, CoreError::MissingColumn { ref column, .. } if column == "Days"));
}
