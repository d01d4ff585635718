use anyhow::{anyhow, Result};
use cadence_core::coordinator::EditOutcome;
use cadence_core::models::{CellValue, EditEvent, SheetKind};
use cadence_core::store::{read_cell, write_cell};
use owo_colors::{OwoColorize, Style};

use crate::cli::EditCommand;
use crate::commands::update::{print_diagnostics, print_reschedules};
use crate::commands::AppScheduler;
use crate::parser::{column_letters, parse_cell_ref};

pub async fn edit_cell(scheduler: &AppScheduler, command: EditCommand) -> Result<()> {
    let sheet: SheetKind = command.sheet.parse()?;
    let (row, column) = parse_cell_ref(&command.cell)?;
    if row == 1 {
        return Err(anyhow!("Header cells cannot be edited from the command line"));
    }
    let value = CellValue::parse_input(&command.value);

    let store = scheduler.store().as_ref();
    let old_value = read_cell(store, sheet.name(), row, column).await?;
    write_cell(store, sheet.name(), row, column, value).await?;

    let event = EditEvent::single(sheet.name(), row, column, old_value);
    let outcome = scheduler.on_edit(event).await?;

    let cell = format!("{}!{}{}", sheet.name(), column_letters(column), row);
    let success_style = Style::new().green().bold();
    let error_style = Style::new().red().bold();
    match outcome {
        EditOutcome::Ignored => println!("Updated {}.", cell),
        EditOutcome::Refreshed => println!("Updated {}; review view refreshed.", cell),
        EditOutcome::Superseded => println!("Updated {}; a newer edit will be processed.", cell),
        EditOutcome::Rejected => {
            println!(
                "{} A review pass is running; {} was restored. Try again shortly.",
                "!".style(error_style),
                cell
            );
        }
        EditOutcome::Processed(report) => {
            println!(
                "{} Processed review: {} completed, {} reassigned, {} unassigned",
                "✓".style(success_style),
                report.completed,
                report.reassigned,
                report.unassigned
            );
            print_reschedules(&report.rescheduled);
            print_diagnostics(&report.diagnostics);
        }
        EditOutcome::Failed(message) => {
            return Err(anyhow!("Review processing failed: {}", message));
        }
    }
    Ok(())
}
