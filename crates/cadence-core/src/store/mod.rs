use crate::error::CoreError;
use crate::models::{CellValue, CoordinationState};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod memory;
pub mod sqlite;

/// A column filter over a sheet's data rows. Rows below `header_row` whose
/// cell in `column` equals one of `hidden_values` are hidden from view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetFilter {
    pub header_row: usize,
    /// 1-based column the criteria apply to
    pub column: usize,
    pub hidden_values: Vec<CellValue>,
}

impl SheetFilter {
    pub fn hides(&self, value: &CellValue) -> bool {
        self.hidden_values.iter().any(|hidden| hidden == value)
    }
}

/// Cell-level access to a spreadsheet-like backend.
///
/// Rows and columns are 1-based. Implementations provide single-operation
/// durability only; callers must not assume that two calls are atomic.
#[async_trait]
pub trait TabularStore: Send + Sync {
    /// Creates the sheet if it is missing. Returns true when it was created.
    async fn ensure_sheet(&self, sheet: &str) -> Result<bool, CoreError>;
    async fn sheet_names(&self) -> Result<Vec<String>, CoreError>;

    /// Reads a `rows` x `cols` block, padding unset cells with `Empty`.
    async fn read_range(
        &self,
        sheet: &str,
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    ) -> Result<Vec<Vec<CellValue>>, CoreError>;
    async fn write_range(
        &self,
        sheet: &str,
        row: usize,
        col: usize,
        values: &[Vec<CellValue>],
    ) -> Result<(), CoreError>;
    /// Appends rows after the last used row. Returns the first row written.
    async fn append_rows(&self, sheet: &str, rows: &[Vec<CellValue>]) -> Result<usize, CoreError>;

    /// Last row holding a non-blank cell, 0 for an empty sheet.
    async fn last_row(&self, sheet: &str) -> Result<usize, CoreError>;
    /// Last column holding a non-blank cell, 0 for an empty sheet.
    async fn last_column(&self, sheet: &str) -> Result<usize, CoreError>;

    async fn filter(&self, sheet: &str) -> Result<Option<SheetFilter>, CoreError>;
    async fn set_filter(&self, sheet: &str, filter: SheetFilter) -> Result<(), CoreError>;
    async fn remove_filter(&self, sheet: &str) -> Result<(), CoreError>;
    /// Stable sort of every row from `from_row` down by one column.
    async fn sort_rows(
        &self,
        sheet: &str,
        from_row: usize,
        column: usize,
        ascending: bool,
    ) -> Result<(), CoreError>;

    async fn hide_columns(&self, sheet: &str, column: usize, count: usize) -> Result<(), CoreError>;
    async fn show_columns(&self, sheet: &str, column: usize, count: usize) -> Result<(), CoreError>;
    async fn hidden_columns(&self, sheet: &str) -> Result<Vec<usize>, CoreError>;
    async fn hide_rows(&self, sheet: &str, row: usize, count: usize) -> Result<(), CoreError>;
    async fn show_rows(&self, sheet: &str, row: usize, count: usize) -> Result<(), CoreError>;
    /// Rows hidden by hand or by the sheet's filter.
    async fn hidden_rows(&self, sheet: &str) -> Result<Vec<usize>, CoreError>;

    async fn set_frozen_rows(&self, sheet: &str, rows: usize) -> Result<(), CoreError>;
    async fn frozen_rows(&self, sheet: &str) -> Result<usize, CoreError>;
    /// Turns a block into checkbox controls; blank cells become `false`.
    async fn insert_checkboxes(
        &self,
        sheet: &str,
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    ) -> Result<(), CoreError>;
}

/// Persistence for the edit coordinator's state machine.
///
/// Every update is a compare-and-swap on `version`; a successful swap bumps
/// the stored version by one.
#[async_trait]
pub trait CoordinationStore: Send + Sync {
    async fn load(&self) -> Result<CoordinationState, CoreError>;
    /// Stores `next` if the stored version still equals `expected_version`.
    async fn compare_and_swap(
        &self,
        expected_version: u64,
        next: CoordinationState,
    ) -> Result<bool, CoreError>;
    /// Unconditionally returns to idle and clears the edit-instance marker.
    async fn reset(&self) -> Result<(), CoreError>;
}

// ============================================================================
// Helpers shared by the engines
// ============================================================================

pub async fn read_cell<S: TabularStore + ?Sized>(
    store: &S,
    sheet: &str,
    row: usize,
    col: usize,
) -> Result<CellValue, CoreError> {
    let mut block = store.read_range(sheet, row, col, 1, 1).await?;
    Ok(block
        .pop()
        .and_then(|mut r| r.pop())
        .unwrap_or_default())
}

pub async fn write_cell<S: TabularStore + ?Sized>(
    store: &S,
    sheet: &str,
    row: usize,
    col: usize,
    value: CellValue,
) -> Result<(), CoreError> {
    store.write_range(sheet, row, col, &[vec![value]]).await
}

/// Header row of a sheet, as far as the store has one.
pub async fn read_header_row<S: TabularStore + ?Sized>(
    store: &S,
    sheet: &str,
) -> Result<Vec<CellValue>, CoreError> {
    let width = store.last_column(sheet).await?;
    if width == 0 {
        return Ok(Vec::new());
    }
    let mut rows = store.read_range(sheet, 1, 1, 1, width).await?;
    Ok(rows.pop().unwrap_or_default())
}

/// Every row from `from_row` to the last used row, `width` cells wide.
pub async fn read_rows_from<S: TabularStore + ?Sized>(
    store: &S,
    sheet: &str,
    from_row: usize,
    width: usize,
) -> Result<Vec<Vec<CellValue>>, CoreError> {
    let last = store.last_row(sheet).await?;
    if last < from_row || width == 0 {
        return Ok(Vec::new());
    }
    store
        .read_range(sheet, from_row, 1, last - from_row + 1, width)
        .await
}

/// Appends rows but never above `first_data_row`, so reserved rows under
/// the header stay reserved even on an empty sheet.
pub async fn append_data_rows<S: TabularStore + ?Sized>(
    store: &S,
    sheet: &str,
    first_data_row: usize,
    rows: &[Vec<CellValue>],
) -> Result<usize, CoreError> {
    let start = (store.last_row(sheet).await? + 1).max(first_data_row);
    if !rows.is_empty() {
        store.write_range(sheet, start, 1, rows).await?;
    }
    Ok(start)
}
