use cadence_core::models::CellValue;
use chrono::Utc;
use chrono_humanize::Humanize;
use comfy_table::{Attribute, Cell, Color, Row, Table};

use crate::parser::column_letters;

/// A sheet as read from the workbook, with its view state.
#[derive(Debug, Clone)]
pub struct ViewSheet {
    pub name: String,
    /// Every used row, starting at row 1
    pub rows: Vec<Vec<CellValue>>,
    pub hidden_rows: Vec<usize>,
    pub hidden_columns: Vec<usize>,
    pub frozen_rows: usize,
}

#[derive(Debug, Clone)]
pub struct ViewLogEntry {
    pub timestamp: CellValue,
    pub message: String,
}

fn value_cell(value: &CellValue) -> Cell {
    match value {
        CellValue::Empty => Cell::new(""),
        CellValue::Bool(true) => Cell::new("[x]").fg(Color::Green),
        CellValue::Bool(false) => Cell::new("[ ]"),
        CellValue::Date(date) => {
            let cell = Cell::new(format!("{} ({})", date.format("%Y-%m-%d"), date.humanize()));
            if *date < Utc::now() {
                cell
            } else {
                cell.fg(Color::Cyan)
            }
        }
        other => Cell::new(other.to_string()),
    }
}

pub fn display_sheet(sheet: &ViewSheet, show_hidden: bool) {
    if sheet.rows.is_empty() {
        println!("Sheet '{}' is empty.", sheet.name);
        return;
    }

    let width = sheet.rows.iter().map(Vec::len).max().unwrap_or(0);
    let columns: Vec<usize> = (1..=width)
        .filter(|c| show_hidden || !sheet.hidden_columns.contains(c))
        .collect();

    let mut table = Table::new();
    let mut header = vec![Cell::new("#")];
    for &column in &columns {
        let title = sheet.rows[0]
            .get(column - 1)
            .map(CellValue::to_string)
            .unwrap_or_default();
        let mut cell = Cell::new(format!("{} {}", column_letters(column), title))
            .add_attribute(Attribute::Bold);
        if sheet.hidden_columns.contains(&column) {
            cell = cell.fg(Color::DarkGrey);
        }
        header.push(cell);
    }
    table.set_header(header);

    let mut shown = 0;
    for (index, cells) in sheet.rows.iter().enumerate().skip(1) {
        let row_number = index + 1;
        let hidden = sheet.hidden_rows.contains(&row_number);
        if hidden && !show_hidden {
            continue;
        }

        let mut row = Row::new();
        let mut number = Cell::new(row_number);
        if row_number <= sheet.frozen_rows {
            number = number.add_attribute(Attribute::Italic);
        }
        row.add_cell(number);
        for &column in &columns {
            let value = cells.get(column - 1).cloned().unwrap_or_default();
            let mut cell = value_cell(&value);
            if hidden {
                cell = cell.fg(Color::DarkGrey).add_attribute(Attribute::CrossedOut);
            }
            row.add_cell(cell);
        }
        table.add_row(row);
        shown += 1;
    }

    println!("{}", sheet.name);
    println!("{table}");
    let hidden_count = sheet.hidden_rows.len();
    if shown == 0 {
        println!("No rows to show.");
    }
    if hidden_count > 0 && !show_hidden {
        println!("{} hidden row(s) not shown; use --all to include them.", hidden_count);
    }
}

pub fn display_log(entries: &[ViewLogEntry]) {
    if entries.is_empty() {
        println!("No log entries found.");
        return;
    }

    let mut table = Table::new();
    table.set_header(vec!["When", "Message"]);
    for entry in entries {
        let when = match &entry.timestamp {
            CellValue::Date(date) => date.humanize(),
            other => other.to_string(),
        };
        table.add_row(vec![Cell::new(when), Cell::new(&entry.message)]);
    }
    println!("{table}");
}
