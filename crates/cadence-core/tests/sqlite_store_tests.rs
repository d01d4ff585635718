use std::sync::Arc;

use cadence_core::coordinator::EditOutcome;
use cadence_core::db::establish_connection;
use cadence_core::error::CoreError;
use cadence_core::models::{
    columns, sheets, CellValue, CoordinationState, EditEvent, NewRecurringDefinition, Phase,
    SchedulerConfig,
};
use cadence_core::scheduler::Scheduler;
use cadence_core::schema::HeaderLookup;
use cadence_core::store::sqlite::{SqliteCoordination, SqliteWorkbook};
use cadence_core::store::{read_cell, read_header_row, write_cell, CoordinationStore, SheetFilter, TabularStore};
use cadence_core::tables::{load_active, load_recurring};
use chrono::{Duration, TimeZone, Utc};
use tempfile::TempDir;

/// Helper function to create a test workbook
async fn setup_test_db() -> (Arc<SqliteWorkbook>, Arc<SqliteCoordination>, TempDir) {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let db_path = temp_dir.path().join("workbook.db");

    let pool = establish_connection(&db_path.to_string_lossy())
        .await
        .expect("Failed to establish test database connection");

    (
        Arc::new(SqliteWorkbook::new(pool.clone())),
        Arc::new(SqliteCoordination::new(pool)),
        temp_dir,
    )
}

fn config() -> SchedulerConfig {
    SchedulerConfig {
        debounce: std::time::Duration::ZERO,
        ..Default::default()
    }
}

async fn column_of(store: &SqliteWorkbook, sheet: &str, name: &str) -> usize {
    HeaderLookup::from_row(&read_header_row(store, sheet).await.unwrap())
        .column(name)
        .expect("column not found")
}

#[tokio::test]
async fn test_cells_round_trip_through_json() {
    let (store, _, _temp_dir) = setup_test_db().await;
    assert!(store.ensure_sheet("Scratch").await.unwrap());
    assert!(!store.ensure_sheet("Scratch").await.unwrap());

    let when = Utc.with_ymd_and_hms(2025, 5, 1, 12, 30, 0).unwrap();
    let row = vec![
        CellValue::text("Laundry"),
        CellValue::Number(2.5),
        CellValue::Bool(false),
        CellValue::Date(when),
    ];
    store.write_range("Scratch", 2, 2, &[row.clone()]).await.unwrap();

    let block = store.read_range("Scratch", 1, 1, 2, 5).await.unwrap();
    assert_eq!(block[0], vec![CellValue::Empty; 5]);
    assert_eq!(block[1][1..], row[..]);
    assert_eq!(store.last_row("Scratch").await.unwrap(), 2);
    assert_eq!(store.last_column("Scratch").await.unwrap(), 5);
}

#[tokio::test]
async fn test_blank_writes_delete_cells() {
    let (store, _, _temp_dir) = setup_test_db().await;
    store.ensure_sheet("Scratch").await.unwrap();
    write_cell(store.as_ref(), "Scratch", 3, 1, CellValue::text("x")).await.unwrap();
    write_cell(store.as_ref(), "Scratch", 3, 1, CellValue::text("")).await.unwrap();

    assert_eq!(store.last_row("Scratch").await.unwrap(), 0);
}

#[tokio::test]
async fn test_missing_sheet_is_reported() {
    let (store, _, _temp_dir) = setup_test_db().await;
    let err = store.last_row("Nowhere").await.unwrap_err();
    assert!(matches!(err, CoreError::SheetNotFound(ref name) if name == "Nowhere"));
}

#[tokio::test]
async fn test_sort_filter_and_checkboxes() {
    let (store, _, _temp_dir) = setup_test_db().await;
    store.ensure_sheet("Scratch").await.unwrap();
    let rows = vec![
        vec![CellValue::text("header")],
        vec![CellValue::text("pinned")],
        vec![CellValue::text("Zed"), CellValue::Bool(true)],
        vec![CellValue::Empty, CellValue::Bool(false)],
        vec![CellValue::text("alice"), CellValue::Bool(false)],
    ];
    store.write_range("Scratch", 1, 1, &rows).await.unwrap();

    store.sort_rows("Scratch", 3, 1, true).await.unwrap();
    let sorted = store.read_range("Scratch", 2, 1, 4, 1).await.unwrap();
    assert_eq!(
        sorted,
        vec![
            vec![CellValue::text("pinned")],
            vec![CellValue::text("alice")],
            vec![CellValue::text("Zed")],
            vec![CellValue::Empty],
        ]
    );

    store
        .set_filter(
            "Scratch",
            SheetFilter {
                header_row: 1,
                column: 2,
                hidden_values: vec![CellValue::Bool(true)],
            },
        )
        .await
        .unwrap();
    store.hide_rows("Scratch", 2, 1).await.unwrap();
    assert_eq!(store.hidden_rows("Scratch").await.unwrap(), vec![2, 4]);
    store.show_rows("Scratch", 2, 1).await.unwrap();
    assert_eq!(store.hidden_rows("Scratch").await.unwrap(), vec![4]);
    store.hide_rows("Scratch", 2, 1).await.unwrap();

    store.insert_checkboxes("Scratch", 2, 3, 2, 1).await.unwrap();
    assert_eq!(read_cell(store.as_ref(), "Scratch", 3, 3).await.unwrap(), CellValue::Bool(false));

    store.hide_columns("Scratch", 2, 2).await.unwrap();
    store.show_columns("Scratch", 3, 1).await.unwrap();
    assert_eq!(store.hidden_columns("Scratch").await.unwrap(), vec![2]);
}

#[tokio::test]
async fn test_coordination_row_uses_versions() {
    let (_, coordination, _temp_dir) = setup_test_db().await;
    let initial = coordination.load().await.unwrap();
    assert_eq!(initial, CoordinationState::default());

    let debouncing = CoordinationState {
        phase: Phase::Debouncing(1),
        edit_instance: 1,
        version: 0,
    };
    assert!(coordination.compare_and_swap(0, debouncing).await.unwrap());
    assert!(!coordination.compare_and_swap(0, debouncing).await.unwrap());

    let stored = coordination.load().await.unwrap();
    assert_eq!(stored.phase, Phase::Debouncing(1));
    assert_eq!(stored.version, 1);

    coordination.reset().await.unwrap();
    let reset = coordination.load().await.unwrap();
    assert_eq!(reset.phase, Phase::Idle);
    assert_eq!(reset.edit_instance, 0);
    assert_eq!(reset.version, 2);
}

#[tokio::test]
async fn test_full_cycle_on_sqlite() {
    let (store, coordination, _temp_dir) = setup_test_db().await;
    let scheduler = Scheduler::new(store.clone(), coordination, config());
    scheduler.initialize().await.unwrap();

    let now = Utc.with_ymd_and_hms(2025, 3, 10, 8, 0, 0).unwrap();
    scheduler
        .add_recurring(NewRecurringDefinition {
            task_name: "Change filter".to_string(),
            recurring_key: "filter".to_string(),
            days: 7.0,
            schedule_from_completion: true,
            next_scheduled_date: None,
            owner: Some("Alice".to_string()),
        })
        .await
        .unwrap();

    let report = scheduler.update_todays_tasks_at(now).await.unwrap();
    assert_eq!(report.materialization.created.len(), 1);
    assert_eq!(report.maintenance.review_rows, 1);

    let active = load_active(store.as_ref()).await.unwrap();
    assert_eq!(active.tasks[0].owner.as_deref(), Some("Alice"));

    let complete = column_of(&store, sheets::MAIN, columns::COMPLETE).await;
    write_cell(store.as_ref(), sheets::MAIN, 4, complete, CellValue::Bool(true))
        .await
        .unwrap();
    let before = Utc::now();
    let outcome = scheduler
        .on_edit(EditEvent::single(sheets::MAIN, 4, complete, CellValue::Bool(false)))
        .await
        .unwrap();

    let EditOutcome::Processed(pass) = outcome else {
        panic!("expected a processed pass, got {:?}", outcome);
    };
    assert_eq!(pass.completed, 1);

    let recurring = load_recurring(store.as_ref()).await.unwrap();
    let next = recurring.find("filter").and_then(|d| d.next_scheduled_date).unwrap();
    assert!(next >= before + Duration::days(7));
    assert_eq!(store.last_row(sheets::MAIN).await.unwrap(), 1);
    assert_eq!(scheduler.coordination_state().await.unwrap().phase, Phase::Idle);

    let log_rows = store.last_row(sheets::DEBUG_LOG).await.unwrap();
    assert!(log_rows > 1);
}
