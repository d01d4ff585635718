//! Turns due recurring definitions into Active task instances.
//!
//! Planning is pure: it takes typed snapshots of both tables and returns the
//! rows to append and the `Next scheduled date` values to write back. The
//! async entry point wraps it with the store reads and writes.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::debug_log::{log_debug, log_diagnostic, DebugSink};
use crate::error::{CoreError, Diagnostic};
use crate::models::{add_days, layout, sheets, CellValue, RecurringDefinition, SchedulerConfig};
use crate::store::{append_data_rows, TabularStore};
use crate::tables::{
    ensure_active_headers, load_active, load_recurring, write_field, ActiveTable, RecurringTable,
};
use crate::validate::validate_recurring_keys;

/// A task instance the plan wants appended to Active.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedTask {
    pub task_id: Uuid,
    pub task_name: String,
    pub recurring_key: String,
    /// Full Active row, laid out by the Active schema
    pub cells: Vec<CellValue>,
}

/// A new `Next scheduled date` for one definition. `None` clears the cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Reschedule {
    pub recurring_key: String,
    /// Recurring sheet row of the definition
    pub row: usize,
    pub next_scheduled_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaterializationPlan {
    pub tasks: Vec<PlannedTask>,
    pub reschedules: Vec<Reschedule>,
    pub diagnostics: Vec<Diagnostic>,
}

/// A task instance that was written to Active.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterializedTask {
    pub row: usize,
    pub task_id: Uuid,
    pub task_name: String,
    pub recurring_key: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaterializationReport {
    pub created: Vec<MaterializedTask>,
    pub rescheduled: Vec<Reschedule>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Whether a definition is due at `now`, allowing for the grace window.
/// An empty next date means due now.
pub fn is_due(definition: &RecurringDefinition, now: DateTime<Utc>, config: &SchedulerConfig) -> bool {
    let anchor = definition.next_scheduled_date.unwrap_or(now);
    anchor
        .checked_sub_signed(config.grace_window())
        .map_or(true, |opens| now >= opens)
}

/// Next date for a definition that was just materialized. `Ok(None)` leaves
/// the date empty until completion.
fn next_date_after_spawn(
    definition: &RecurringDefinition,
    days: f64,
    now: DateTime<Utc>,
) -> Result<Option<DateTime<Utc>>, Diagnostic> {
    if definition.schedule_from_completion {
        return Ok(None);
    }
    add_days(definition.next_scheduled_date.unwrap_or(now), days)
        .map(Some)
        .ok_or_else(|| Diagnostic::InvalidCadence {
            key: definition.recurring_key.clone(),
            row: definition.row,
        })
}

fn build_row(
    definition: &RecurringDefinition,
    recurring: &RecurringTable,
    active: &ActiveTable,
    task_id: Uuid,
    now: DateTime<Utc>,
    config: &SchedulerConfig,
) -> Vec<CellValue> {
    let schema = &active.schema;
    let mut cells: Vec<CellValue> = schema
        .headers
        .names()
        .iter()
        .map(|name| {
            recurring
                .schema
                .headers
                .position(name)
                .and_then(|p| definition.cells.get(p))
                .cloned()
                .unwrap_or_default()
        })
        .collect();

    let owner = cells[schema.owner]
        .to_trimmed_string()
        .unwrap_or_else(|| config.default_owner.clone());

    cells[schema.date_added] = CellValue::Date(now);
    cells[schema.completed] = CellValue::Bool(false);
    cells[schema.completed_date] = CellValue::Empty;
    cells[schema.task_id] = CellValue::text(task_id.to_string());
    cells[schema.owner] = CellValue::text(owner);
    cells[schema.recurring_key] = CellValue::text(definition.recurring_key.as_str());
    cells
}

/// Decides which definitions spawn an instance at `now` and how each of them
/// is rescheduled. Definitions are visited in table order.
pub fn plan_materialization(
    recurring: &RecurringTable,
    active: &ActiveTable,
    now: DateTime<Utc>,
    config: &SchedulerConfig,
) -> MaterializationPlan {
    let mut plan = MaterializationPlan::default();
    let mut planned_keys: HashSet<&str> = HashSet::new();

    for definition in &recurring.definitions {
        if definition.task_name.is_empty() || !is_due(definition, now, config) {
            continue;
        }
        let key = definition.recurring_key.as_str();
        if active.has_incomplete(key) || planned_keys.contains(key) {
            continue;
        }
        let Some(days) = definition.days else {
            plan.diagnostics.push(Diagnostic::InvalidCadence {
                key: key.to_string(),
                row: definition.row,
            });
            continue;
        };
        let next_scheduled_date = match next_date_after_spawn(definition, days, now) {
            Ok(next) => next,
            Err(diagnostic) => {
                plan.diagnostics.push(diagnostic);
                continue;
            }
        };

        let task_id = Uuid::now_v7();
        plan.tasks.push(PlannedTask {
            task_id,
            task_name: definition.task_name.clone(),
            recurring_key: key.to_string(),
            cells: build_row(definition, recurring, active, task_id, now, config),
        });
        plan.reschedules.push(Reschedule {
            recurring_key: key.to_string(),
            row: definition.row,
            next_scheduled_date,
        });
        planned_keys.insert(key);
    }
    plan
}

/// Validates the Recurring table, appends every due instance to Active in one
/// batch and then writes the rescheduled dates back.
///
/// A key violation aborts before anything is written.
pub async fn materialize<S: TabularStore + ?Sized>(
    store: &S,
    sink: &dyn DebugSink,
    config: &SchedulerConfig,
    now: DateTime<Utc>,
) -> Result<MaterializationReport, CoreError> {
    let recurring = load_recurring(store).await?;
    if let Err(violation) = validate_recurring_keys(&recurring.definitions) {
        tracing::error!(%violation, "recurring table rejected");
        log_debug(sink, &format!("Materialization aborted: {}", violation)).await;
        return Err(violation.into());
    }

    ensure_active_headers(store, &recurring.schema.headers).await?;
    let active = load_active(store).await?;
    let plan = plan_materialization(&recurring, &active, now, config);

    let mut report = MaterializationReport::default();
    if !plan.tasks.is_empty() {
        let rows: Vec<Vec<CellValue>> = plan.tasks.iter().map(|t| t.cells.clone()).collect();
        let first = append_data_rows(store, sheets::ACTIVE, layout::ACTIVE_DATA_ROW, &rows).await?;
        for (offset, task) in plan.tasks.into_iter().enumerate() {
            log_debug(
                sink,
                &format!("Added '{}' ({}) to Active row {}", task.task_name, task.recurring_key, first + offset),
            )
            .await;
            report.created.push(MaterializedTask {
                row: first + offset,
                task_id: task.task_id,
                task_name: task.task_name,
                recurring_key: task.recurring_key,
            });
        }
    }

    for reschedule in &plan.reschedules {
        write_field(
            store,
            sheets::RECURRING,
            reschedule.row,
            recurring.schema.next_scheduled_date,
            reschedule.next_scheduled_date,
        )
        .await?;
    }
    report.rescheduled = plan.reschedules;

    for diagnostic in &plan.diagnostics {
        log_diagnostic(sink, diagnostic).await;
    }
    report.diagnostics = plan.diagnostics;

    tracing::info!(
        created = report.created.len(),
        rescheduled = report.rescheduled.len(),
        diagnostics = report.diagnostics.len(),
        "materialization complete"
    );
    Ok(report)
}
