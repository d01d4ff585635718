//! Post-processing of the Active queue after every materialization and on
//! every manual resort. Each step is idempotent.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::debug_log::{log_debug, log_diagnostic, DebugSink};
use crate::error::{CoreError, Diagnostic};
use crate::materialize::Reschedule;
use crate::models::{add_days, layout, sheets, CellValue, SchedulerConfig};
use crate::review::refresh_review;
use crate::schema::ActiveSchema;
use crate::store::{append_data_rows, SheetFilter, TabularStore};
use crate::tables::{ensure_active_headers, load_active, load_recurring, write_field, RecurringTable};

/// A one-off task taken from the Active intake cells.
#[derive(Debug, Clone, PartialEq)]
pub struct OneOffTask {
    pub row: usize,
    pub task_id: Uuid,
    pub task_name: String,
    pub owner: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaintenanceReport {
    pub intake: Option<OneOffTask>,
    /// Tasks that received a completion date
    pub stamped: usize,
    pub rescheduled: Vec<Reschedule>,
    /// Tasks whose empty owner was set to the default
    pub backfilled: usize,
    /// Rows now shown in the review view
    pub review_rows: usize,
    pub diagnostics: Vec<Diagnostic>,
}

/// The Active filter: hide every row whose `Completed` cell is checked.
pub fn completed_filter(schema: &ActiveSchema) -> SheetFilter {
    SheetFilter {
        header_row: layout::HEADER_ROW,
        column: schema.completed + 1,
        hidden_values: vec![CellValue::Bool(true)],
    }
}

/// Next date for a completion-anchored definition, or the diagnostic that
/// explains why there is none.
pub(crate) fn reschedule_on_completion(
    recurring: &RecurringTable,
    key: &str,
    completed_at: DateTime<Utc>,
) -> Result<Option<Reschedule>, Diagnostic> {
    let Some(definition) = recurring.find(key) else {
        return Err(Diagnostic::DanglingRecurringKey { key: key.to_string() });
    };
    if !definition.schedule_from_completion {
        return Ok(None);
    }
    let Some(next) = definition.days.and_then(|days| add_days(completed_at, days)) else {
        return Err(Diagnostic::InvalidCadence {
            key: key.to_string(),
            row: definition.row,
        });
    };
    Ok(Some(Reschedule {
        recurring_key: key.to_string(),
        row: definition.row,
        next_scheduled_date: Some(next),
    }))
}

async fn take_intake<S: TabularStore + ?Sized>(
    store: &S,
    schema: &ActiveSchema,
    config: &SchedulerConfig,
    now: DateTime<Utc>,
) -> Result<Option<OneOffTask>, CoreError> {
    let row = layout::ACTIVE_INTAKE_ROW;
    let mut cells = store
        .read_range(sheets::ACTIVE, row, 1, 1, schema.width())
        .await?
        .pop()
        .unwrap_or_default();
    cells.resize(schema.width(), CellValue::Empty);

    let Some(task_name) = cells[schema.task].to_trimmed_string() else {
        return Ok(None);
    };
    let owner = cells[schema.owner]
        .to_trimmed_string()
        .unwrap_or_else(|| config.default_owner.clone());
    let task_id = Uuid::now_v7();

    let mut task = vec![CellValue::Empty; schema.width()];
    task[schema.task] = CellValue::text(task_name.as_str());
    task[schema.date_added] = CellValue::Date(now);
    task[schema.completed] = CellValue::Bool(false);
    task[schema.task_id] = CellValue::text(task_id.to_string());
    task[schema.owner] = CellValue::text(owner.as_str());

    let appended = append_data_rows(store, sheets::ACTIVE, layout::ACTIVE_DATA_ROW, &[task]).await?;
    write_field(store, sheets::ACTIVE, row, schema.task, CellValue::Empty).await?;
    write_field(store, sheets::ACTIVE, row, schema.owner, CellValue::Empty).await?;

    Ok(Some(OneOffTask {
        row: appended,
        task_id,
        task_name,
        owner,
    }))
}

/// Re-applies the Active view rules: the filter (when one is installed),
/// owner order and the frozen header block.
pub async fn refresh_active_view<S: TabularStore + ?Sized>(
    store: &S,
    schema: &ActiveSchema,
) -> Result<(), CoreError> {
    if store.filter(sheets::ACTIVE).await?.is_some() {
        store.remove_filter(sheets::ACTIVE).await?;
        store.set_filter(sheets::ACTIVE, completed_filter(schema)).await?;
    }
    store
        .sort_rows(sheets::ACTIVE, layout::ACTIVE_DATA_ROW, schema.owner + 1, true)
        .await?;
    store
        .set_frozen_rows(sheets::ACTIVE, layout::ACTIVE_FROZEN_ROWS)
        .await
}

/// Runs intake, completion stamping and owner backfill, then refreshes the
/// Active and Main views.
pub async fn maintain<S: TabularStore + ?Sized>(
    store: &S,
    sink: &dyn DebugSink,
    config: &SchedulerConfig,
    now: DateTime<Utc>,
) -> Result<MaintenanceReport, CoreError> {
    let recurring = load_recurring(store).await?;
    let schema = ActiveSchema::decode(ensure_active_headers(store, &recurring.schema.headers).await?)?;
    let mut report = MaintenanceReport::default();

    report.intake = take_intake(store, &schema, config, now).await?;
    if let Some(task) = &report.intake {
        log_debug(
            sink,
            &format!("Added one-off task '{}' for {} at row {}", task.task_name, task.owner, task.row),
        )
        .await;
    }

    let active = load_active(store).await?;
    for task in active.tasks.iter().filter(|t| t.awaiting_completion_stamp()) {
        write_field(store, sheets::ACTIVE, task.row, schema.completed_date, now).await?;
        report.stamped += 1;
        log_debug(sink, &format!("Stamped completion of '{}' at row {}", task.task_name, task.row)).await;

        let Some(key) = task.recurring_key.as_deref() else {
            continue;
        };
        match reschedule_on_completion(&recurring, key, now) {
            Ok(Some(reschedule)) => {
                write_field(
                    store,
                    sheets::RECURRING,
                    reschedule.row,
                    recurring.schema.next_scheduled_date,
                    reschedule.next_scheduled_date,
                )
                .await?;
                report.rescheduled.push(reschedule);
            }
            Ok(None) => {}
            Err(diagnostic) => {
                log_diagnostic(sink, &diagnostic).await;
                report.diagnostics.push(diagnostic);
            }
        }
    }

    for task in active.tasks.iter().filter(|t| t.owner.is_none()) {
        write_field(
            store,
            sheets::ACTIVE,
            task.row,
            schema.owner,
            CellValue::text(config.default_owner.as_str()),
        )
        .await?;
        report.backfilled += 1;
    }

    refresh_active_view(store, &schema).await?;
    report.review_rows = refresh_review(store).await?;

    tracing::info!(
        intake = report.intake.is_some(),
        stamped = report.stamped,
        rescheduled = report.rescheduled.len(),
        backfilled = report.backfilled,
        "active queue maintained"
    );
    Ok(report)
}
