use anyhow::Result;
use cadence_core::models::{layout, sheets, SheetKind};
use cadence_core::store::{read_rows_from, TabularStore};

use crate::cli::{LogCommand, ShowCommand};
use crate::commands::AppScheduler;
use crate::views::table::{display_log, display_sheet, ViewLogEntry, ViewSheet};

pub async fn show_sheet(scheduler: &AppScheduler, command: ShowCommand) -> Result<()> {
    let kind: SheetKind = command.sheet.parse()?;
    let store = scheduler.store().as_ref();
    let name = kind.name();

    let width = store.last_column(name).await?;
    let view = ViewSheet {
        name: name.to_string(),
        rows: read_rows_from(store, name, layout::HEADER_ROW, width).await?,
        hidden_rows: store.hidden_rows(name).await?,
        hidden_columns: store.hidden_columns(name).await?,
        frozen_rows: store.frozen_rows(name).await?,
    };
    display_sheet(&view, command.all);
    Ok(())
}

pub async fn show_log(scheduler: &AppScheduler, command: LogCommand) -> Result<()> {
    let store = scheduler.store().as_ref();
    let rows = read_rows_from(store, sheets::DEBUG_LOG, 2, 2).await?;
    let skip = rows.len().saturating_sub(command.limit);
    let entries: Vec<ViewLogEntry> = rows
        .into_iter()
        .skip(skip)
        .map(|mut row| {
            row.resize(2, Default::default());
            ViewLogEntry {
                message: row[1].to_string(),
                timestamp: row.swap_remove(0),
            }
        })
        .collect();
    display_log(&entries);
    Ok(())
}
