//! In-memory implementations of the store traits, used by tests and by
//! embedders that keep their own persistence.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{CoordinationStore, SheetFilter, TabularStore};
use crate::error::CoreError;
use crate::models::{CellValue, CoordinationState, Phase};

#[derive(Debug, Default, Clone)]
struct Sheet {
    /// Row-major, 0-based; ragged rows are padded on read
    grid: Vec<Vec<CellValue>>,
    filter: Option<SheetFilter>,
    hidden_columns: BTreeSet<usize>,
    hidden_rows: BTreeSet<usize>,
    frozen_rows: usize,
    checkboxes: BTreeSet<(usize, usize)>,
}

impl Sheet {
    fn get(&self, row: usize, col: usize) -> CellValue {
        self.grid
            .get(row - 1)
            .and_then(|r| r.get(col - 1))
            .cloned()
            .unwrap_or_default()
    }

    fn set(&mut self, row: usize, col: usize, value: CellValue) {
        if self.grid.len() < row {
            self.grid.resize_with(row, Vec::new);
        }
        let cells = &mut self.grid[row - 1];
        if cells.len() < col {
            cells.resize(col, CellValue::Empty);
        }
        cells[col - 1] = value;
    }

    fn last_row(&self) -> usize {
        self.grid
            .iter()
            .rposition(|r| r.iter().any(|c| !c.is_blank()))
            .map(|i| i + 1)
            .unwrap_or(0)
    }

    fn last_column(&self) -> usize {
        self.grid
            .iter()
            .filter_map(|r| r.iter().rposition(|c| !c.is_blank()))
            .max()
            .map(|i| i + 1)
            .unwrap_or(0)
    }

    fn filtered_rows(&self) -> Vec<usize> {
        let Some(filter) = &self.filter else {
            return Vec::new();
        };
        ((filter.header_row + 1)..=self.last_row())
            .filter(|&row| filter.hides(&self.get(row, filter.column)))
            .collect()
    }
}

fn check_position(row: usize, col: usize) -> Result<(), CoreError> {
    if row == 0 || col == 0 {
        return Err(CoreError::InvalidInput(format!(
            "cell positions are 1-based, got row {} column {}",
            row, col
        )));
    }
    Ok(())
}

/// A workbook held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryWorkbook {
    sheets: Mutex<BTreeMap<String, Sheet>>,
}

impl MemoryWorkbook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a workbook from literal sheet contents, starting at A1.
    pub fn with_sheets<I>(sheets: I) -> Self
    where
        I: IntoIterator<Item = (String, Vec<Vec<CellValue>>)>,
    {
        let map = sheets
            .into_iter()
            .map(|(name, grid)| {
                (
                    name,
                    Sheet {
                        grid,
                        ..Default::default()
                    },
                )
            })
            .collect();
        Self {
            sheets: Mutex::new(map),
        }
    }

    /// Whether a checkbox control covers the cell.
    pub fn is_checkbox(&self, sheet: &str, row: usize, col: usize) -> bool {
        self.with_sheet(sheet, |s| s.checkboxes.contains(&(row, col)))
            .unwrap_or(false)
    }

    /// A copy of every populated row of a sheet.
    pub fn snapshot(&self, sheet: &str) -> Result<Vec<Vec<CellValue>>, CoreError> {
        self.with_sheet(sheet, |s| s.grid[..s.last_row()].to_vec())
    }

    fn with_sheet<R>(&self, sheet: &str, f: impl FnOnce(&mut Sheet) -> R) -> Result<R, CoreError> {
        let mut sheets = self
            .sheets
            .lock()
            .map_err(|_| CoreError::Store("workbook lock poisoned".to_string()))?;
        let entry = sheets
            .get_mut(sheet)
            .ok_or_else(|| CoreError::SheetNotFound(sheet.to_string()))?;
        Ok(f(entry))
    }
}

#[async_trait]
impl TabularStore for MemoryWorkbook {
    async fn ensure_sheet(&self, sheet: &str) -> Result<bool, CoreError> {
        let mut sheets = self
            .sheets
            .lock()
            .map_err(|_| CoreError::Store("workbook lock poisoned".to_string()))?;
        if sheets.contains_key(sheet) {
            return Ok(false);
        }
        sheets.insert(sheet.to_string(), Sheet::default());
        Ok(true)
    }

    async fn sheet_names(&self) -> Result<Vec<String>, CoreError> {
        let sheets = self
            .sheets
            .lock()
            .map_err(|_| CoreError::Store("workbook lock poisoned".to_string()))?;
        Ok(sheets.keys().cloned().collect())
    }

    async fn read_range(
        &self,
        sheet: &str,
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    ) -> Result<Vec<Vec<CellValue>>, CoreError> {
        check_position(row, col)?;
        self.with_sheet(sheet, |s| {
            (row..row + rows)
                .map(|r| (col..col + cols).map(|c| s.get(r, c)).collect())
                .collect()
        })
    }

    async fn write_range(
        &self,
        sheet: &str,
        row: usize,
        col: usize,
        values: &[Vec<CellValue>],
    ) -> Result<(), CoreError> {
        check_position(row, col)?;
        self.with_sheet(sheet, |s| {
            for (dr, cells) in values.iter().enumerate() {
                for (dc, value) in cells.iter().enumerate() {
                    s.set(row + dr, col + dc, value.clone());
                }
            }
        })
    }

    async fn append_rows(&self, sheet: &str, rows: &[Vec<CellValue>]) -> Result<usize, CoreError> {
        self.with_sheet(sheet, |s| {
            let start = s.last_row() + 1;
            for (dr, cells) in rows.iter().enumerate() {
                for (dc, value) in cells.iter().enumerate() {
                    s.set(start + dr, 1 + dc, value.clone());
                }
            }
            start
        })
    }

    async fn last_row(&self, sheet: &str) -> Result<usize, CoreError> {
        self.with_sheet(sheet, |s| s.last_row())
    }

    async fn last_column(&self, sheet: &str) -> Result<usize, CoreError> {
        self.with_sheet(sheet, |s| s.last_column())
    }

    async fn filter(&self, sheet: &str) -> Result<Option<SheetFilter>, CoreError> {
        self.with_sheet(sheet, |s| s.filter.clone())
    }

    async fn set_filter(&self, sheet: &str, filter: SheetFilter) -> Result<(), CoreError> {
        self.with_sheet(sheet, |s| s.filter = Some(filter))
    }

    async fn remove_filter(&self, sheet: &str) -> Result<(), CoreError> {
        self.with_sheet(sheet, |s| s.filter = None)
    }

    async fn sort_rows(
        &self,
        sheet: &str,
        from_row: usize,
        column: usize,
        ascending: bool,
    ) -> Result<(), CoreError> {
        check_position(from_row, column)?;
        self.with_sheet(sheet, |s| {
            let last = s.last_row();
            if last < from_row {
                return;
            }
            let mut block: Vec<Vec<CellValue>> = s.grid.drain(from_row - 1..last).collect();
            block.sort_by(|a, b| {
                let left = a.get(column - 1).cloned().unwrap_or_default();
                let right = b.get(column - 1).cloned().unwrap_or_default();
                let ordering = left.sort_cmp(&right);
                if ascending || left.is_blank() || right.is_blank() {
                    ordering
                } else {
                    ordering.reverse()
                }
            });
            let tail = s.grid.split_off(from_row - 1);
            s.grid.extend(block);
            s.grid.extend(tail);
        })
    }

    async fn hide_columns(&self, sheet: &str, column: usize, count: usize) -> Result<(), CoreError> {
        self.with_sheet(sheet, |s| s.hidden_columns.extend(column..column + count))
    }

    async fn show_columns(&self, sheet: &str, column: usize, count: usize) -> Result<(), CoreError> {
        self.with_sheet(sheet, |s| {
            for c in column..column + count {
                s.hidden_columns.remove(&c);
            }
        })
    }

    async fn hidden_columns(&self, sheet: &str) -> Result<Vec<usize>, CoreError> {
        self.with_sheet(sheet, |s| s.hidden_columns.iter().copied().collect())
    }

    async fn hide_rows(&self, sheet: &str, row: usize, count: usize) -> Result<(), CoreError> {
        self.with_sheet(sheet, |s| s.hidden_rows.extend(row..row + count))
    }

    async fn show_rows(&self, sheet: &str, row: usize, count: usize) -> Result<(), CoreError> {
        self.with_sheet(sheet, |s| {
            for r in row..row + count {
                s.hidden_rows.remove(&r);
            }
        })
    }

    async fn hidden_rows(&self, sheet: &str) -> Result<Vec<usize>, CoreError> {
        self.with_sheet(sheet, |s| {
            let mut rows: BTreeSet<usize> = s.hidden_rows.clone();
            rows.extend(s.filtered_rows());
            rows.into_iter().collect()
        })
    }

    async fn set_frozen_rows(&self, sheet: &str, rows: usize) -> Result<(), CoreError> {
        self.with_sheet(sheet, |s| s.frozen_rows = rows)
    }

    async fn frozen_rows(&self, sheet: &str) -> Result<usize, CoreError> {
        self.with_sheet(sheet, |s| s.frozen_rows)
    }

    async fn insert_checkboxes(
        &self,
        sheet: &str,
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    ) -> Result<(), CoreError> {
        check_position(row, col)?;
        self.with_sheet(sheet, |s| {
            for r in row..row + rows {
                for c in col..col + cols {
                    s.checkboxes.insert((r, c));
                    if s.get(r, c).is_blank() {
                        s.set(r, c, CellValue::Bool(false));
                    }
                }
            }
        })
    }
}

/// Coordination state held in process memory.
#[derive(Debug, Default)]
pub struct MemoryCoordination {
    state: Mutex<CoordinationState>,
}

impl MemoryCoordination {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CoordinationStore for MemoryCoordination {
    async fn load(&self) -> Result<CoordinationState, CoreError> {
        self.state
            .lock()
            .map(|s| *s)
            .map_err(|_| CoreError::Store("coordination lock poisoned".to_string()))
    }

    async fn compare_and_swap(
        &self,
        expected_version: u64,
        next: CoordinationState,
    ) -> Result<bool, CoreError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| CoreError::Store("coordination lock poisoned".to_string()))?;
        if state.version != expected_version {
            return Ok(false);
        }
        *state = CoordinationState {
            version: expected_version + 1,
            ..next
        };
        Ok(true)
    }

    async fn reset(&self) -> Result<(), CoreError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| CoreError::Store("coordination lock poisoned".to_string()))?;
        *state = CoordinationState {
            phase: Phase::Idle,
            edit_instance: 0,
            version: state.version + 1,
        };
        Ok(())
    }
}
