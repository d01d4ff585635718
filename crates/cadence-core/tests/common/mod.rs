#![allow(dead_code)]

use std::sync::Arc;

use cadence_core::models::{
    columns, sheets, ActiveTask, CellValue, NewRecurringDefinition, RecurringDefinition,
    SchedulerConfig,
};
use cadence_core::scheduler::Scheduler;
use cadence_core::schema::HeaderLookup;
use cadence_core::store::memory::{MemoryCoordination, MemoryWorkbook};
use cadence_core::store::{read_cell, read_header_row, write_cell, TabularStore};
use cadence_core::tables::{load_active, load_recurring};
use chrono::{DateTime, TimeZone, Utc};

pub type MemoryScheduler = Scheduler<MemoryWorkbook, MemoryCoordination>;

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 10, 8, 0, 0).unwrap()
}

/// No sheet log and no settle window.
pub fn quiet_config() -> SchedulerConfig {
    SchedulerConfig {
        debug_log: false,
        debounce: std::time::Duration::ZERO,
        ..Default::default()
    }
}

pub struct Harness {
    pub scheduler: Arc<MemoryScheduler>,
    pub store: Arc<MemoryWorkbook>,
    pub coordination: Arc<MemoryCoordination>,
}

pub async fn setup(config: SchedulerConfig) -> Harness {
    let store = Arc::new(MemoryWorkbook::new());
    let coordination = Arc::new(MemoryCoordination::new());
    let scheduler = Arc::new(Scheduler::new(store.clone(), coordination.clone(), config));
    scheduler.initialize().await.expect("Failed to initialize workbook");
    Harness {
        scheduler,
        store,
        coordination,
    }
}

pub fn definition(
    task: &str,
    key: &str,
    days: f64,
    schedule_from_completion: bool,
    next: Option<DateTime<Utc>>,
) -> NewRecurringDefinition {
    NewRecurringDefinition {
        task_name: task.to_string(),
        recurring_key: key.to_string(),
        days,
        schedule_from_completion,
        next_scheduled_date: next,
        owner: None,
    }
}

pub async fn active_tasks(store: &MemoryWorkbook) -> Vec<ActiveTask> {
    load_active(store).await.expect("Failed to load Active").tasks
}

pub async fn recurring_definition(store: &MemoryWorkbook, key: &str) -> RecurringDefinition {
    load_recurring(store)
        .await
        .expect("Failed to load Recurring")
        .find(key)
        .cloned()
        .expect("definition not found")
}

pub async fn column_of(store: &MemoryWorkbook, sheet: &str, name: &str) -> usize {
    let headers = HeaderLookup::from_row(&read_header_row(store, sheet).await.unwrap());
    headers.column(name).expect("column not found")
}

pub async fn main_cell(store: &MemoryWorkbook, row: usize, name: &str) -> CellValue {
    let column = column_of(store, sheets::MAIN, name).await;
    read_cell(store, sheets::MAIN, row, column).await.unwrap()
}

pub async fn set_main_cell(store: &MemoryWorkbook, row: usize, name: &str, value: CellValue) {
    let column = column_of(store, sheets::MAIN, name).await;
    write_cell(store, sheets::MAIN, row, column, value).await.unwrap();
}

pub async fn set_active_cell(store: &MemoryWorkbook, row: usize, name: &str, value: CellValue) {
    let column = column_of(store, sheets::ACTIVE, name).await;
    write_cell(store, sheets::ACTIVE, row, column, value).await.unwrap();
}

/// Main row currently showing the given task.
pub async fn main_row_of(store: &MemoryWorkbook, task: &ActiveTask) -> usize {
    let column = column_of(store, sheets::MAIN, columns::TASK_ID).await;
    let last = store.last_row(sheets::MAIN).await.unwrap();
    let id = task.task_id.expect("task has no id").to_string();
    for row in 4..=last {
        if read_cell(store, sheets::MAIN, row, column).await.unwrap() == CellValue::text(id.as_str()) {
            return row;
        }
    }
    panic!("task {} not shown in Main", id);
}
