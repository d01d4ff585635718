//! Applies the complete/reassign commands typed into the Main view.
//!
//! The command cells are read once when the pass starts and processed bottom
//! to top. Whatever happens in between, the pass ends by clearing every
//! command cell and restoring column visibility.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::debug_log::{log_debug, log_diagnostic, DebugSink};
use crate::error::{CoreError, Diagnostic};
use crate::maintain::reschedule_on_completion;
use crate::materialize::Reschedule;
use crate::models::{layout, sheets, CellValue, ReassignCommand, ReviewRow};
use crate::review::refresh_review;
use crate::schema::{ActiveSchema, MainSchema};
use crate::store::{read_rows_from, TabularStore};
use crate::tables::{load_active, load_recurring, load_review, write_field};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconciliationReport {
    pub completed: usize,
    pub reassigned: usize,
    pub unassigned: usize,
    pub rescheduled: Vec<Reschedule>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ReconciliationReport {
    pub fn changes(&self) -> usize {
        self.completed + self.reassigned + self.unassigned
    }
}

/// Active row holding `task_id` right now. Rows can move while a pass runs.
async fn current_row<S: TabularStore + ?Sized>(
    store: &S,
    schema: &ActiveSchema,
    task_id: Uuid,
) -> Result<Option<usize>, CoreError> {
    let rows = read_rows_from(store, sheets::ACTIVE, layout::ACTIVE_DATA_ROW, schema.task_id + 1).await?;
    Ok(rows
        .iter()
        .position(|cells| cells.get(schema.task_id).and_then(CellValue::as_uuid) == Some(task_id))
        .map(|offset| layout::ACTIVE_DATA_ROW + offset))
}

/// Writes one field of a task, wherever it sits at the time of the write.
/// Returns the row written, or `None` when the task has left the sheet.
async fn write_task_field<S: TabularStore + ?Sized>(
    store: &S,
    schema: &ActiveSchema,
    task_id: Uuid,
    position: usize,
    value: impl Into<CellValue>,
) -> Result<Option<usize>, CoreError> {
    let Some(row) = current_row(store, schema, task_id).await? else {
        return Ok(None);
    };
    write_field(store, sheets::ACTIVE, row, position, value).await?;
    Ok(Some(row))
}

async fn apply_commands<S: TabularStore + ?Sized>(
    store: &S,
    sink: &dyn DebugSink,
    snapshot: &[ReviewRow],
    now: DateTime<Utc>,
) -> Result<ReconciliationReport, CoreError> {
    let active = load_active(store).await?;
    let recurring = load_recurring(store).await?;
    let schema = &active.schema;
    let mut report = ReconciliationReport::default();

    let total = snapshot.len();
    for (reverse_index, _) in snapshot.iter().rev().enumerate() {
        let index = total - reverse_index - 1;
        let command = &snapshot[index];
        if layout::MAIN_RESERVED_ROWS.contains(&command.row) || !command.has_command() {
            continue;
        }

        let target = command
            .task_id
            .and_then(|id| active.find_by_id(id).map(|task| (id, task)));
        let Some((task_id, target)) = target else {
            let diagnostic = Diagnostic::unknown_task(command.row, command.task_id, &command.task_ref);
            log_diagnostic(sink, &diagnostic).await;
            report.diagnostics.push(diagnostic);
            continue;
        };
        log_debug(
            sink,
            &format!("Processing Main row {} for Active row {}", command.row, target.row),
        )
        .await;
        let vanished = Diagnostic::unknown_task(command.row, Some(task_id), &command.task_ref);

        if command.complete {
            if let Some(key) = command.recurring_key.as_deref() {
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
            let Some(row) = write_task_field(store, schema, task_id, schema.completed, true).await? else {
                log_diagnostic(sink, &vanished).await;
                report.diagnostics.push(vanished);
                continue;
            };
            write_task_field(store, schema, task_id, schema.completed_date, now).await?;
            report.completed += 1;
            log_debug(sink, &format!("Marked Active row {} complete", row)).await;
        }

        let written = match command.reassign_command() {
            Some(ReassignCommand::Unassign) => {
                let written = write_task_field(store, schema, task_id, schema.owner, CellValue::Empty).await?;
                if let Some(row) = written {
                    report.unassigned += 1;
                    log_debug(sink, &format!("Unassigned owner of Active row {}", row)).await;
                }
                written
            }
            Some(ReassignCommand::Owner(owner)) => {
                let written = write_task_field(store, schema, task_id, schema.owner, owner.as_str()).await?;
                if let Some(row) = written {
                    report.reassigned += 1;
                    log_debug(sink, &format!("Reassigned Active row {} to '{}'", row, owner)).await;
                }
                written
            }
            None => Some(target.row),
        };
        if written.is_none() {
            log_diagnostic(sink, &vanished).await;
            report.diagnostics.push(vanished);
        }
    }
    Ok(report)
}

/// Unchecks every `Complete` box and empties every `Reassign` cell in the data
/// region, then shows the command columns and hides the indicator again.
pub async fn clear_review_commands<S: TabularStore + ?Sized>(
    store: &S,
    schema: &MainSchema,
) -> Result<(), CoreError> {
    let last = store.last_row(sheets::MAIN).await?;
    if last >= layout::MAIN_DATA_ROW {
        let rows = last - layout::MAIN_DATA_ROW + 1;
        store
            .write_range(
                sheets::MAIN,
                layout::MAIN_DATA_ROW,
                schema.complete + 1,
                &vec![vec![CellValue::Bool(false)]; rows],
            )
            .await?;
        store
            .write_range(
                sheets::MAIN,
                layout::MAIN_DATA_ROW,
                schema.reassign + 1,
                &vec![vec![CellValue::Empty]; rows],
            )
            .await?;
    }

    store.show_columns(sheets::MAIN, schema.complete + 1, 1).await?;
    store.show_columns(sheets::MAIN, schema.reassign + 1, 1).await?;
    if let Some(reprocessing) = schema.reprocessing {
        store.hide_columns(sheets::MAIN, reprocessing + 1, 1).await?;
    }
    Ok(())
}

async fn show_reprocessing<S: TabularStore + ?Sized>(store: &S, schema: &MainSchema) -> Result<(), CoreError> {
    store.hide_columns(sheets::MAIN, schema.complete + 1, 1).await?;
    store.hide_columns(sheets::MAIN, schema.reassign + 1, 1).await?;
    if let Some(reprocessing) = schema.reprocessing {
        store.show_columns(sheets::MAIN, reprocessing + 1, 1).await?;
    }
    Ok(())
}

/// Runs one reconciliation pass over the Main view.
pub async fn reconcile<S: TabularStore + ?Sized>(
    store: &S,
    sink: &dyn DebugSink,
    now: DateTime<Utc>,
) -> Result<ReconciliationReport, CoreError> {
    let review = load_review(store).await?;
    let schema = &review.schema;
    log_debug(sink, "Starting processing.").await;

    let result = match show_reprocessing(store, schema).await {
        Ok(()) => apply_commands(store, sink, &review.rows, now).await,
        Err(e) => Err(e),
    };

    let cleanup = clear_review_commands(store, schema).await;
    let report = match (result, cleanup) {
        (Ok(report), Ok(())) => report,
        (Ok(_), Err(e)) => return Err(e),
        (Err(e), cleanup) => {
            if let Err(cleanup_error) = cleanup {
                tracing::error!(error = %cleanup_error, "review cleanup failed");
            }
            log_debug(sink, &format!("Error occurred: {}", e)).await;
            return Err(e);
        }
    };

    refresh_review(store).await?;
    log_debug(sink, &format!("Processed {} changes", report.changes())).await;
    tracing::info!(
        completed = report.completed,
        reassigned = report.reassigned,
        unassigned = report.unassigned,
        diagnostics = report.diagnostics.len(),
        "reconciliation complete"
    );
    Ok(report)
}
