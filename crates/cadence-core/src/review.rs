//! The Main review view: one row per live Active task, with a checkbox and a
//! reassign cell in front of it.

use std::cmp::Ordering;
use std::collections::HashMap;

use uuid::Uuid;

use crate::error::CoreError;
use crate::models::{columns, layout, sheets, ActiveTask, CellValue, REPROCESSING_NOTICE};
use crate::schema::MainSchema;
use crate::store::{read_rows_from, TabularStore};
use crate::tables::{ensure_main_headers, load_active};

/// `Complete` and `Reassign` cells typed into a review row but not yet
/// reconciled.
#[derive(Debug, Clone)]
struct PendingCommand {
    complete: CellValue,
    reassign: CellValue,
}

/// Reads the pending commands of the current data region, keyed by task id.
async fn pending_commands<S: TabularStore + ?Sized>(
    store: &S,
    schema: &MainSchema,
) -> Result<HashMap<Uuid, PendingCommand>, CoreError> {
    let rows = read_rows_from(store, sheets::MAIN, layout::MAIN_DATA_ROW, schema.width()).await?;
    let pending = rows
        .iter()
        .filter_map(|cells| {
            let row = schema.review_row(0, cells);
            if !row.has_command() {
                return None;
            }
            let task_id = row.task_id?;
            let command = PendingCommand {
                complete: cells.get(schema.complete).cloned().unwrap_or_default(),
                reassign: cells.get(schema.reassign).cloned().unwrap_or_default(),
            };
            Some((task_id, command))
        })
        .collect();
    Ok(pending)
}

fn review_order(a: &ActiveTask, b: &ActiveTask) -> Ordering {
    let owner = |t: &ActiveTask| t.owner.clone().map(CellValue::Text).unwrap_or_default();
    let added = |t: &ActiveTask| CellValue::from(t.date_added);
    owner(a)
        .sort_cmp(&owner(b))
        .then_with(|| added(a).sort_cmp(&added(b)))
}

/// Rebuilds the Main data region from the Active sheet and re-creates the
/// Main filter, if any, with its current criteria. Returns the number of
/// projected rows.
///
/// Commands already typed against a task that is still live follow that task
/// to its new row. Header and reserved intake rows are left untouched.
pub async fn refresh_review<S: TabularStore + ?Sized>(store: &S) -> Result<usize, CoreError> {
    let schema = MainSchema::decode(ensure_main_headers(store).await?)?;
    let pending = pending_commands(store, &schema).await?;
    let active = load_active(store).await?;

    let mut live: Vec<&ActiveTask> = active.tasks.iter().filter(|t| t.is_incomplete()).collect();
    live.sort_by(|a, b| review_order(a, b));

    let rows: Vec<Vec<CellValue>> = live
        .iter()
        .map(|task| {
            let command = task.task_id.and_then(|id| pending.get(&id));
            schema
                .headers
                .names()
                .iter()
                .enumerate()
                .map(|(position, name)| {
                    if position == schema.complete {
                        command
                            .map(|c| c.complete.clone())
                            .filter(|c| !c.is_blank())
                            .unwrap_or(CellValue::Bool(false))
                    } else if position == schema.reassign {
                        command.map(|c| c.reassign.clone()).unwrap_or_default()
                    } else if name == columns::REPROCESSING {
                        CellValue::text(REPROCESSING_NOTICE)
                    } else {
                        active
                            .schema
                            .headers
                            .position(name)
                            .and_then(|p| task.cells.get(p))
                            .cloned()
                            .unwrap_or_default()
                    }
                })
                .collect()
        })
        .collect();

    let last = store.last_row(sheets::MAIN).await?;
    if last >= layout::MAIN_DATA_ROW {
        let width = store.last_column(sheets::MAIN).await?.max(schema.width());
        let blank = vec![vec![CellValue::Empty; width]; last - layout::MAIN_DATA_ROW + 1];
        store
            .write_range(sheets::MAIN, layout::MAIN_DATA_ROW, 1, &blank)
            .await?;
    }
    if !rows.is_empty() {
        store
            .write_range(sheets::MAIN, layout::MAIN_DATA_ROW, 1, &rows)
            .await?;
        store
            .insert_checkboxes(sheets::MAIN, layout::MAIN_DATA_ROW, schema.complete + 1, rows.len(), 1)
            .await?;
    }

    if let Some(filter) = store.filter(sheets::MAIN).await? {
        store.remove_filter(sheets::MAIN).await?;
        store.set_filter(sheets::MAIN, filter).await?;
    }
    store
        .set_frozen_rows(sheets::MAIN, layout::MAIN_FROZEN_ROWS)
        .await?;

    tracing::debug!(rows = rows.len(), "review view refreshed");
    Ok(rows.len())
}
