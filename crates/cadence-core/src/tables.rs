//! Typed snapshots of the three sheets.
//!
//! A loader reads the header row once, decodes the schema and then reads the
//! data region in a single block. Engines work on these snapshots and write
//! individual cells back by position.

use uuid::Uuid;

use crate::error::CoreError;
use crate::models::{layout, sheets, ActiveTask, CellValue, RecurringDefinition, ReviewRow};
use crate::schema::{ActiveSchema, HeaderLookup, MainSchema, RecurringSchema, MAIN_HEADERS};
use crate::store::{read_header_row, read_rows_from, write_cell, TabularStore};

#[derive(Debug, Clone)]
pub struct RecurringTable {
    pub schema: RecurringSchema,
    /// Every data row, blank ones included, in sheet order
    pub definitions: Vec<RecurringDefinition>,
}

impl RecurringTable {
    pub fn find(&self, key: &str) -> Option<&RecurringDefinition> {
        self.definitions.iter().find(|d| d.recurring_key == key)
    }
}

#[derive(Debug, Clone)]
pub struct ActiveTable {
    pub schema: ActiveSchema,
    /// Non-blank rows from the first data row down
    pub tasks: Vec<ActiveTask>,
}

impl ActiveTable {
    pub fn find_by_id(&self, id: Uuid) -> Option<&ActiveTask> {
        self.tasks.iter().find(|t| t.task_id == Some(id))
    }

    pub fn has_incomplete(&self, key: &str) -> bool {
        self.tasks
            .iter()
            .any(|t| t.is_incomplete() && t.recurring_key.as_deref() == Some(key))
    }
}

#[derive(Debug, Clone)]
pub struct ReviewTable {
    pub schema: MainSchema,
    /// Every row under the header, reserved intake rows included
    pub rows: Vec<ReviewRow>,
}

fn is_blank_row(cells: &[CellValue]) -> bool {
    cells.iter().all(CellValue::is_blank)
}

pub async fn load_recurring<S: TabularStore + ?Sized>(store: &S) -> Result<RecurringTable, CoreError> {
    let headers = HeaderLookup::from_row(&read_header_row(store, sheets::RECURRING).await?);
    let schema = RecurringSchema::decode(headers)?;
    let rows = read_rows_from(store, sheets::RECURRING, layout::RECURRING_DATA_ROW, schema.width()).await?;

    let definitions = rows
        .into_iter()
        .enumerate()
        .map(|(i, cells)| schema.definition(layout::RECURRING_DATA_ROW + i, cells))
        .collect();
    Ok(RecurringTable { schema, definitions })
}

/// Writes the Active header row from the Recurring headers when the sheet has
/// none yet, and returns whatever header row is in place afterwards.
pub async fn ensure_active_headers<S: TabularStore + ?Sized>(
    store: &S,
    recurring: &HeaderLookup,
) -> Result<HeaderLookup, CoreError> {
    let existing = HeaderLookup::from_row(&read_header_row(store, sheets::ACTIVE).await?);
    if !existing.is_empty() {
        return Ok(existing);
    }

    let headers = ActiveSchema::headers_for(recurring);
    tracing::info!(columns = headers.len(), "creating Active header row");
    store
        .write_range(sheets::ACTIVE, layout::HEADER_ROW, 1, &[headers.to_cells()])
        .await?;
    Ok(headers)
}

pub async fn load_active<S: TabularStore + ?Sized>(store: &S) -> Result<ActiveTable, CoreError> {
    let headers = HeaderLookup::from_row(&read_header_row(store, sheets::ACTIVE).await?);
    let schema = ActiveSchema::decode(headers)?;
    let rows = read_rows_from(store, sheets::ACTIVE, layout::ACTIVE_DATA_ROW, schema.width()).await?;

    let tasks = rows
        .into_iter()
        .enumerate()
        .filter(|(_, cells)| !is_blank_row(cells))
        .map(|(i, cells)| schema.task(layout::ACTIVE_DATA_ROW + i, cells))
        .collect();
    Ok(ActiveTable { schema, tasks })
}

/// Writes the default Main header row when the sheet has none yet.
pub async fn ensure_main_headers<S: TabularStore + ?Sized>(store: &S) -> Result<HeaderLookup, CoreError> {
    let existing = HeaderLookup::from_row(&read_header_row(store, sheets::MAIN).await?);
    if !existing.is_empty() {
        return Ok(existing);
    }
    let headers = HeaderLookup::from_names(MAIN_HEADERS);
    store
        .write_range(sheets::MAIN, layout::HEADER_ROW, 1, &[headers.to_cells()])
        .await?;
    Ok(headers)
}

pub async fn load_review<S: TabularStore + ?Sized>(store: &S) -> Result<ReviewTable, CoreError> {
    let headers = HeaderLookup::from_row(&read_header_row(store, sheets::MAIN).await?);
    let schema = MainSchema::decode(headers)?;
    let first = layout::HEADER_ROW + 1;
    let rows = read_rows_from(store, sheets::MAIN, first, schema.width()).await?;

    let rows = rows
        .iter()
        .enumerate()
        .map(|(i, cells)| schema.review_row(first + i, cells))
        .collect();
    Ok(ReviewTable { schema, rows })
}

/// Writes one cell addressed by sheet row and 0-based schema position.
pub async fn write_field<S: TabularStore + ?Sized>(
    store: &S,
    sheet: &str,
    row: usize,
    position: usize,
    value: impl Into<CellValue>,
) -> Result<(), CoreError> {
    write_cell(store, sheet, row, position + 1, value.into()).await
}
