use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::Utc;

use super::{CoordinationStore, SheetFilter, TabularStore};
use crate::db::DbPool;
use crate::error::CoreError;
use crate::models::{CellValue, CoordinationState, Phase};

fn encode(value: &CellValue) -> Result<String, CoreError> {
    Ok(serde_json::to_string(value)?)
}

fn decode(raw: &str) -> Result<CellValue, CoreError> {
    Ok(serde_json::from_str(raw)?)
}

fn to_index(value: i64) -> usize {
    usize::try_from(value).unwrap_or(0)
}

/// SQLite implementation of the tabular store: one row per non-blank cell.
pub struct SqliteWorkbook {
    pool: DbPool,
}

impl SqliteWorkbook {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the database pool for internal use across modules
    pub(crate) fn pool(&self) -> &DbPool {
        &self.pool
    }

    async fn require_sheet(&self, sheet: &str) -> Result<(), CoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sheets WHERE name = $1")
            .bind(sheet)
            .fetch_one(self.pool())
            .await?;
        if count == 0 {
            return Err(CoreError::SheetNotFound(sheet.to_string()));
        }
        Ok(())
    }

    async fn cells_in(
        &self,
        sheet: &str,
        rows: (usize, usize),
        cols: (usize, usize),
    ) -> Result<Vec<(usize, usize, CellValue)>, CoreError> {
        let raw: Vec<(i64, i64, String)> = sqlx::query_as(
            r#"SELECT row, col, value FROM cells
            WHERE sheet = $1 AND row BETWEEN $2 AND $3 AND col BETWEEN $4 AND $5"#,
        )
        .bind(sheet)
        .bind(rows.0 as i64)
        .bind(rows.1 as i64)
        .bind(cols.0 as i64)
        .bind(cols.1 as i64)
        .fetch_all(self.pool())
        .await?;

        raw.into_iter()
            .map(|(row, col, value)| Ok((to_index(row), to_index(col), decode(&value)?)))
            .collect()
    }
}

#[async_trait]
impl TabularStore for SqliteWorkbook {
    async fn ensure_sheet(&self, sheet: &str) -> Result<bool, CoreError> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO sheets (name, frozen_rows, filter, created_at) VALUES ($1, 0, NULL, $2)",
        )
        .bind(sheet)
        .bind(Utc::now())
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn sheet_names(&self) -> Result<Vec<String>, CoreError> {
        let names = sqlx::query_scalar("SELECT name FROM sheets ORDER BY name")
            .fetch_all(self.pool())
            .await?;
        Ok(names)
    }

    async fn read_range(
        &self,
        sheet: &str,
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    ) -> Result<Vec<Vec<CellValue>>, CoreError> {
        self.require_sheet(sheet).await?;
        let mut block = vec![vec![CellValue::Empty; cols]; rows];
        if rows == 0 || cols == 0 {
            return Ok(block);
        }
        let cells = self
            .cells_in(sheet, (row, row + rows - 1), (col, col + cols - 1))
            .await?;
        for (r, c, value) in cells {
            block[r - row][c - col] = value;
        }
        Ok(block)
    }

    async fn write_range(
        &self,
        sheet: &str,
        row: usize,
        col: usize,
        values: &[Vec<CellValue>],
    ) -> Result<(), CoreError> {
        self.require_sheet(sheet).await?;
        let mut tx = self.pool().begin().await?;
        for (dr, cells) in values.iter().enumerate() {
            for (dc, value) in cells.iter().enumerate() {
                let (r, c) = ((row + dr) as i64, (col + dc) as i64);
                if value.is_blank() {
                    sqlx::query("DELETE FROM cells WHERE sheet = $1 AND row = $2 AND col = $3")
                        .bind(sheet)
                        .bind(r)
                        .bind(c)
                        .execute(&mut *tx)
                        .await?;
                } else {
                    sqlx::query(
                        r#"INSERT INTO cells (sheet, row, col, value) VALUES ($1, $2, $3, $4)
                        ON CONFLICT(sheet, row, col) DO UPDATE SET value = excluded.value"#,
                    )
                    .bind(sheet)
                    .bind(r)
                    .bind(c)
                    .bind(encode(value)?)
                    .execute(&mut *tx)
                    .await?;
                }
            }
        }
        tx.commit().await?;
        Ok(())
    }

    async fn append_rows(&self, sheet: &str, rows: &[Vec<CellValue>]) -> Result<usize, CoreError> {
        let start = self.last_row(sheet).await? + 1;
        self.write_range(sheet, start, 1, rows).await?;
        Ok(start)
    }

    async fn last_row(&self, sheet: &str) -> Result<usize, CoreError> {
        self.require_sheet(sheet).await?;
        let last: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(row), 0) FROM cells WHERE sheet = $1")
            .bind(sheet)
            .fetch_one(self.pool())
            .await?;
        Ok(to_index(last))
    }

    async fn last_column(&self, sheet: &str) -> Result<usize, CoreError> {
        self.require_sheet(sheet).await?;
        let last: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(col), 0) FROM cells WHERE sheet = $1")
            .bind(sheet)
            .fetch_one(self.pool())
            .await?;
        Ok(to_index(last))
    }

    async fn filter(&self, sheet: &str) -> Result<Option<SheetFilter>, CoreError> {
        self.require_sheet(sheet).await?;
        let raw: Option<String> = sqlx::query_scalar("SELECT filter FROM sheets WHERE name = $1")
            .bind(sheet)
            .fetch_one(self.pool())
            .await?;
        Ok(raw.map(|r| serde_json::from_str(&r)).transpose()?)
    }

    async fn set_filter(&self, sheet: &str, filter: SheetFilter) -> Result<(), CoreError> {
        self.require_sheet(sheet).await?;
        sqlx::query("UPDATE sheets SET filter = $1 WHERE name = $2")
            .bind(serde_json::to_string(&filter)?)
            .bind(sheet)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    async fn remove_filter(&self, sheet: &str) -> Result<(), CoreError> {
        self.require_sheet(sheet).await?;
        sqlx::query("UPDATE sheets SET filter = NULL WHERE name = $1")
            .bind(sheet)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    async fn sort_rows(
        &self,
        sheet: &str,
        from_row: usize,
        column: usize,
        ascending: bool,
    ) -> Result<(), CoreError> {
        let last = self.last_row(sheet).await?;
        if last < from_row || column == 0 {
            return Ok(());
        }

        let cells = self.cells_in(sheet, (from_row, last), (1, usize::MAX >> 1)).await?;
        let mut by_row: BTreeMap<usize, Vec<(usize, CellValue)>> =
            (from_row..=last).map(|r| (r, Vec::new())).collect();
        for (r, c, value) in cells {
            by_row.entry(r).or_default().push((c, value));
        }

        let key_of = |cells: &[(usize, CellValue)]| {
            cells
                .iter()
                .find(|(c, _)| *c == column)
                .map(|(_, v)| v.clone())
                .unwrap_or_default()
        };
        let mut rows: Vec<Vec<(usize, CellValue)>> = by_row.into_values().collect();
        rows.sort_by(|a, b| {
            let (left, right) = (key_of(a), key_of(b));
            let ordering = left.sort_cmp(&right);
            if ascending || left.is_blank() || right.is_blank() {
                ordering
            } else {
                ordering.reverse()
            }
        });

        let mut tx = self.pool().begin().await?;
        sqlx::query("DELETE FROM cells WHERE sheet = $1 AND row >= $2")
            .bind(sheet)
            .bind(from_row as i64)
            .execute(&mut *tx)
            .await?;
        for (offset, cells) in rows.iter().enumerate() {
            for (c, value) in cells {
                sqlx::query("INSERT INTO cells (sheet, row, col, value) VALUES ($1, $2, $3, $4)")
                    .bind(sheet)
                    .bind((from_row + offset) as i64)
                    .bind(*c as i64)
                    .bind(encode(value)?)
                    .execute(&mut *tx)
                    .await?;
            }
        }
        tx.commit().await?;
        Ok(())
    }

    async fn hide_columns(&self, sheet: &str, column: usize, count: usize) -> Result<(), CoreError> {
        self.require_sheet(sheet).await?;
        for c in column..column + count {
            sqlx::query("INSERT OR IGNORE INTO hidden_columns (sheet, col) VALUES ($1, $2)")
                .bind(sheet)
                .bind(c as i64)
                .execute(self.pool())
                .await?;
        }
        Ok(())
    }

    async fn show_columns(&self, sheet: &str, column: usize, count: usize) -> Result<(), CoreError> {
        self.require_sheet(sheet).await?;
        sqlx::query("DELETE FROM hidden_columns WHERE sheet = $1 AND col BETWEEN $2 AND $3")
            .bind(sheet)
            .bind(column as i64)
            .bind((column + count).saturating_sub(1) as i64)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    async fn hidden_columns(&self, sheet: &str) -> Result<Vec<usize>, CoreError> {
        self.require_sheet(sheet).await?;
        let cols: Vec<i64> =
            sqlx::query_scalar("SELECT col FROM hidden_columns WHERE sheet = $1 ORDER BY col")
                .bind(sheet)
                .fetch_all(self.pool())
                .await?;
        Ok(cols.into_iter().map(to_index).collect())
    }

    async fn hide_rows(&self, sheet: &str, row: usize, count: usize) -> Result<(), CoreError> {
        self.require_sheet(sheet).await?;
        for r in row..row + count {
            sqlx::query("INSERT OR IGNORE INTO hidden_rows (sheet, row) VALUES ($1, $2)")
                .bind(sheet)
                .bind(r as i64)
                .execute(self.pool())
                .await?;
        }
        Ok(())
    }

    async fn show_rows(&self, sheet: &str, row: usize, count: usize) -> Result<(), CoreError> {
        self.require_sheet(sheet).await?;
        sqlx::query("DELETE FROM hidden_rows WHERE sheet = $1 AND row BETWEEN $2 AND $3")
            .bind(sheet)
            .bind(row as i64)
            .bind((row + count).saturating_sub(1) as i64)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    async fn hidden_rows(&self, sheet: &str) -> Result<Vec<usize>, CoreError> {
        self.require_sheet(sheet).await?;
        let manual: Vec<i64> = sqlx::query_scalar("SELECT row FROM hidden_rows WHERE sheet = $1")
            .bind(sheet)
            .fetch_all(self.pool())
            .await?;
        let mut rows: BTreeSet<usize> = manual.into_iter().map(to_index).collect();

        if let Some(filter) = self.filter(sheet).await? {
            let last = self.last_row(sheet).await?;
            if last > filter.header_row {
                let values: BTreeMap<usize, CellValue> = self
                    .cells_in(sheet, (filter.header_row + 1, last), (filter.column, filter.column))
                    .await?
                    .into_iter()
                    .map(|(r, _, v)| (r, v))
                    .collect();
                for r in (filter.header_row + 1)..=last {
                    let value = values.get(&r).cloned().unwrap_or_default();
                    if filter.hides(&value) {
                        rows.insert(r);
                    }
                }
            }
        }
        Ok(rows.into_iter().collect())
    }

    async fn set_frozen_rows(&self, sheet: &str, rows: usize) -> Result<(), CoreError> {
        self.require_sheet(sheet).await?;
        sqlx::query("UPDATE sheets SET frozen_rows = $1 WHERE name = $2")
            .bind(rows as i64)
            .bind(sheet)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    async fn frozen_rows(&self, sheet: &str) -> Result<usize, CoreError> {
        self.require_sheet(sheet).await?;
        let frozen: i64 = sqlx::query_scalar("SELECT frozen_rows FROM sheets WHERE name = $1")
            .bind(sheet)
            .fetch_one(self.pool())
            .await?;
        Ok(to_index(frozen))
    }

    async fn insert_checkboxes(
        &self,
        sheet: &str,
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    ) -> Result<(), CoreError> {
        self.require_sheet(sheet).await?;
        let unchecked = encode(&CellValue::Bool(false))?;
        let mut tx = self.pool().begin().await?;
        for r in row..row + rows {
            for c in col..col + cols {
                sqlx::query("INSERT OR IGNORE INTO checkboxes (sheet, row, col) VALUES ($1, $2, $3)")
                    .bind(sheet)
                    .bind(r as i64)
                    .bind(c as i64)
                    .execute(&mut *tx)
                    .await?;
                sqlx::query("INSERT OR IGNORE INTO cells (sheet, row, col, value) VALUES ($1, $2, $3, $4)")
                    .bind(sheet)
                    .bind(r as i64)
                    .bind(c as i64)
                    .bind(&unchecked)
                    .execute(&mut *tx)
                    .await?;
            }
        }
        tx.commit().await?;
        Ok(())
    }
}

/// Coordination state kept in the single `coordination` row.
pub struct SqliteCoordination {
    pool: DbPool,
}

impl SqliteCoordination {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CoordinationStore for SqliteCoordination {
    async fn load(&self) -> Result<CoordinationState, CoreError> {
        let (phase, debounce_instance, edit_instance, version): (String, Option<i64>, i64, i64) =
            sqlx::query_as(
                "SELECT phase, debounce_instance, edit_instance, version FROM coordination WHERE id = 1",
            )
            .fetch_one(&self.pool)
            .await?;

        let phase = Phase::from_parts(&phase, debounce_instance.map(|i| i as u64))
            .map_err(|e| CoreError::Store(e.to_string()))?;
        Ok(CoordinationState {
            phase,
            edit_instance: edit_instance as u64,
            version: version as u64,
        })
    }

    async fn compare_and_swap(
        &self,
        expected_version: u64,
        next: CoordinationState,
    ) -> Result<bool, CoreError> {
        let result = sqlx::query(
            r#"UPDATE coordination
            SET phase = $1, debounce_instance = $2, edit_instance = $3, version = version + 1
            WHERE id = 1 AND version = $4"#,
        )
        .bind(next.phase.label())
        .bind(next.phase.instance().map(|i| i as i64))
        .bind(next.edit_instance as i64)
        .bind(expected_version as i64)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn reset(&self) -> Result<(), CoreError> {
        sqlx::query(
            r#"UPDATE coordination
            SET phase = 'idle', debounce_instance = NULL, edit_instance = 0, version = version + 1
            WHERE id = 1"#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
