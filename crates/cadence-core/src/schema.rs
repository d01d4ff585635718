//! Row/header addressing and the typed schemas decoded from it.
//!
//! Business logic never assumes a physical column order. Each pass reads a
//! sheet's header row once, resolves the columns it needs into a schema, and
//! from then on works with plain positions.

use std::collections::HashMap;

use crate::error::CoreError;
use crate::models::{
    columns, sheets, ActiveTask, CellValue, RecurringDefinition, ReviewRow,
};

/// Default header row written into an empty Recurring sheet.
pub const RECURRING_HEADERS: [&str; 6] = [
    columns::TASK,
    columns::RECURRING_KEY,
    columns::DAYS,
    columns::SCHEDULE_FROM_COMPLETION,
    columns::NEXT_SCHEDULED_DATE,
    columns::OWNER,
];

/// Columns the Active sheet carries on top of the inherited Recurring ones.
pub const ACTIVE_ADDITIONAL_COLUMNS: [&str; 6] = [
    columns::DATE_ADDED,
    columns::COMPLETED,
    columns::COMPLETED_DATE,
    columns::TASK_ID,
    columns::OWNER,
    columns::RECURRING_KEY,
];

pub const MAIN_HEADERS: [&str; 8] = [
    columns::COMPLETE,
    columns::REASSIGN,
    columns::TASK,
    columns::OWNER,
    columns::DATE_ADDED,
    columns::TASK_ID,
    columns::RECURRING_KEY,
    columns::REPROCESSING,
];

pub const DEBUG_LOG_HEADERS: [&str; 2] = [columns::TIMESTAMP, columns::MESSAGE];

/// Two-way lookup between header names and 0-based positions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeaderLookup {
    names: Vec<String>,
    positions: HashMap<String, usize>,
}

impl HeaderLookup {
    /// Builds the lookup from a header row, stopping at the first blank cell
    /// so scratch columns to the right of the table are ignored.
    pub fn from_row(row: &[CellValue]) -> Self {
        let names: Vec<String> = row
            .iter()
            .take_while(|cell| !cell.is_blank())
            .map(|cell| cell.to_string().trim().to_string())
            .collect();
        Self::from_names(names)
    }

    pub fn from_names<I, T>(names: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        let mut positions = HashMap::with_capacity(names.len());
        for (index, name) in names.iter().enumerate() {
            // First occurrence wins, like a left-to-right header scan.
            positions.entry(name.clone()).or_insert(index);
        }
        Self { names, positions }
    }

    /// 0-based position of a column.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    /// 1-based sheet column of a column.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.position(name).map(|p| p + 1)
    }

    pub fn name(&self, position: usize) -> Option<&str> {
        self.names.get(position).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.positions.contains_key(name)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn require(&self, sheet: &str, name: &str) -> Result<usize, CoreError> {
        self.position(name).ok_or_else(|| CoreError::MissingColumn {
            sheet: sheet.to_string(),
            column: name.to_string(),
        })
    }

    pub fn to_cells(&self) -> Vec<CellValue> {
        self.names.iter().map(|n| CellValue::text(n.as_str())).collect()
    }
}

fn cell(cells: &[CellValue], position: usize) -> &CellValue {
    static EMPTY: CellValue = CellValue::Empty;
    cells.get(position).unwrap_or(&EMPTY)
}

/// Resolved columns of the Recurring sheet.
#[derive(Debug, Clone)]
pub struct RecurringSchema {
    pub headers: HeaderLookup,
    pub task: usize,
    pub recurring_key: usize,
    pub days: usize,
    pub schedule_from_completion: usize,
    pub next_scheduled_date: usize,
}

impl RecurringSchema {
    pub fn decode(headers: HeaderLookup) -> Result<Self, CoreError> {
        let sheet = sheets::RECURRING;
        Ok(Self {
            task: headers.require(sheet, columns::TASK)?,
            recurring_key: headers.require(sheet, columns::RECURRING_KEY)?,
            days: headers.require(sheet, columns::DAYS)?,
            schedule_from_completion: headers.require(sheet, columns::SCHEDULE_FROM_COMPLETION)?,
            next_scheduled_date: headers.require(sheet, columns::NEXT_SCHEDULED_DATE)?,
            headers,
        })
    }

    pub fn width(&self) -> usize {
        self.headers.len()
    }

    pub fn definition(&self, row: usize, mut cells: Vec<CellValue>) -> RecurringDefinition {
        cells.resize(self.width(), CellValue::Empty);
        let days = cell(&cells, self.days)
            .as_number()
            .filter(|d| d.is_finite() && *d >= 0.0);
        RecurringDefinition {
            row,
            task_name: cell(&cells, self.task).to_trimmed_string().unwrap_or_default(),
            recurring_key: cell(&cells, self.recurring_key)
                .to_trimmed_string()
                .unwrap_or_default(),
            days,
            schedule_from_completion: cell(&cells, self.schedule_from_completion).is_truthy(),
            next_scheduled_date: cell(&cells, self.next_scheduled_date).as_date(),
            cells,
        }
    }
}

/// Resolved columns of the Active sheet.
#[derive(Debug, Clone)]
pub struct ActiveSchema {
    pub headers: HeaderLookup,
    pub task: usize,
    pub date_added: usize,
    pub completed: usize,
    pub completed_date: usize,
    pub task_id: usize,
    pub owner: usize,
    pub recurring_key: usize,
}

impl ActiveSchema {
    pub fn decode(headers: HeaderLookup) -> Result<Self, CoreError> {
        let sheet = sheets::ACTIVE;
        Ok(Self {
            task: headers.require(sheet, columns::TASK)?,
            date_added: headers.require(sheet, columns::DATE_ADDED)?,
            completed: headers.require(sheet, columns::COMPLETED)?,
            completed_date: headers.require(sheet, columns::COMPLETED_DATE)?,
            task_id: headers.require(sheet, columns::TASK_ID)?,
            owner: headers.require(sheet, columns::OWNER)?,
            recurring_key: headers.require(sheet, columns::RECURRING_KEY)?,
            headers,
        })
    }

    pub fn width(&self) -> usize {
        self.headers.len()
    }

    pub fn task(&self, row: usize, mut cells: Vec<CellValue>) -> ActiveTask {
        cells.resize(self.width(), CellValue::Empty);
        ActiveTask {
            row,
            task_name: cell(&cells, self.task).to_trimmed_string().unwrap_or_default(),
            date_added: cell(&cells, self.date_added).as_date(),
            completed: cell(&cells, self.completed).is_truthy(),
            completed_date: cell(&cells, self.completed_date).as_date(),
            task_id: cell(&cells, self.task_id).as_uuid(),
            owner: cell(&cells, self.owner).to_trimmed_string(),
            recurring_key: cell(&cells, self.recurring_key).to_trimmed_string(),
            cells,
        }
    }

    /// Header row for a fresh Active sheet: every Recurring column followed
    /// by the queue's own columns, without repeats.
    pub fn headers_for(recurring: &HeaderLookup) -> HeaderLookup {
        let mut names: Vec<String> = recurring.names().to_vec();
        for extra in ACTIVE_ADDITIONAL_COLUMNS {
            if !names.iter().any(|n| n == extra) {
                names.push(extra.to_string());
            }
        }
        HeaderLookup::from_names(names)
    }
}

/// Resolved columns of the Main review sheet.
#[derive(Debug, Clone)]
pub struct MainSchema {
    pub headers: HeaderLookup,
    pub complete: usize,
    pub reassign: usize,
    pub task_id: usize,
    pub recurring_key: usize,
    pub reprocessing: Option<usize>,
    pub task: Option<usize>,
    pub owner: Option<usize>,
    pub date_added: Option<usize>,
}

impl MainSchema {
    pub fn decode(headers: HeaderLookup) -> Result<Self, CoreError> {
        let sheet = sheets::MAIN;
        Ok(Self {
            complete: headers.require(sheet, columns::COMPLETE)?,
            reassign: headers.require(sheet, columns::REASSIGN)?,
            task_id: headers.require(sheet, columns::TASK_ID)?,
            recurring_key: headers.require(sheet, columns::RECURRING_KEY)?,
            reprocessing: headers.position(columns::REPROCESSING),
            task: headers.position(columns::TASK),
            owner: headers.position(columns::OWNER),
            date_added: headers.position(columns::DATE_ADDED),
            headers,
        })
    }

    pub fn width(&self) -> usize {
        self.headers.len()
    }

    pub fn review_row(&self, row: usize, cells: &[CellValue]) -> ReviewRow {
        let reference = cell(cells, self.task_id);
        ReviewRow {
            row,
            complete: cell(cells, self.complete).is_truthy(),
            reassign: cell(cells, self.reassign).to_trimmed_string(),
            task_id: reference.as_uuid(),
            task_ref: reference.to_string(),
            recurring_key: cell(cells, self.recurring_key).to_trimmed_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_row(names: &[&str]) -> Vec<CellValue> {
        names.iter().map(|n| CellValue::text(*n)).collect()
    }

    #[test]
    fn test_lookup_is_bidirectional() {
        let lookup = HeaderLookup::from_row(&header_row(&["Task", "Days", "Owner"]));
        assert_eq!(lookup.position("Days"), Some(1));
        assert_eq!(lookup.column("Owner"), Some(3));
        assert_eq!(lookup.name(0), Some("Task"));
        assert_eq!(lookup.position("Missing"), None);
        assert_eq!(lookup.name(9), None);
    }

    #[test]
    fn test_lookup_truncates_at_first_blank() {
        let mut row = header_row(&["Task", "Days"]);
        row.push(CellValue::Empty);
        row.push(CellValue::text("scratch"));
        let lookup = HeaderLookup::from_row(&row);
        assert_eq!(lookup.len(), 2);
        assert!(!lookup.contains("scratch"));
    }

    #[test]
    fn test_recurring_schema_reports_missing_column() {
        let lookup = HeaderLookup::from_row(&header_row(&["Task", "Recurring key"]));
        let err = RecurringSchema::decode(lookup).unwrap_err();
        assert!(matches!(
            err,
            CoreError::MissingColumn { ref column, .. } if column == columns::DAYS
        ));
    }

    #[test]
    fn test_recurring_definition_decode() {
        let schema = RecurringSchema::decode(HeaderLookup::from_names(RECURRING_HEADERS)).unwrap();
        let def = schema.definition(
            2,
            vec![
                CellValue::text("Water plants"),
                CellValue::text("water"),
                CellValue::Number(3.0),
                CellValue::Bool(true),
            ],
        );
        assert_eq!(def.task_name, "Water plants");
        assert_eq!(def.recurring_key, "water");
        assert_eq!(def.days, Some(3.0));
        assert!(def.schedule_from_completion);
        assert_eq!(def.next_scheduled_date, None);
        assert_eq!(def.cells.len(), RECURRING_HEADERS.len());
    }

    #[test]
    fn test_negative_days_are_not_a_cadence() {
        let schema = RecurringSchema::decode(HeaderLookup::from_names(RECURRING_HEADERS)).unwrap();
        let def = schema.definition(
            2,
            vec![CellValue::text("x"), CellValue::text("k"), CellValue::Number(-1.0)],
        );
        assert_eq!(def.days, None);
    }

    #[test]
    fn test_active_headers_extend_recurring_without_repeats() {
        let recurring = HeaderLookup::from_names(RECURRING_HEADERS);
        let active = ActiveSchema::headers_for(&recurring);
        assert_eq!(
            active.names().iter().filter(|n| n.as_str() == columns::OWNER).count(),
            1
        );
        assert_eq!(
            active.names().iter().filter(|n| n.as_str() == columns::RECURRING_KEY).count(),
            1
        );
        assert!(ActiveSchema::decode(active).is_ok());
    }
}
