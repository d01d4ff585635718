use anyhow::Result;
use cadence_core::models::NewRecurringDefinition;
use chrono::Utc;
use owo_colors::{OwoColorize, Style};

use crate::cli::{AddRecurringCommand, RecurringAction};
use crate::commands::AppScheduler;
use crate::parser::parse_when;

pub async fn recurring(scheduler: &AppScheduler, action: RecurringAction) -> Result<()> {
    match action {
        RecurringAction::Add(command) => add_recurring(scheduler, command).await,
    }
}

async fn add_recurring(scheduler: &AppScheduler, command: AddRecurringCommand) -> Result<()> {
    let next_scheduled_date = command
        .next
        .as_deref()
        .map(|next| parse_when(next, Utc::now()))
        .transpose()?;

    let definition = NewRecurringDefinition {
        task_name: command.task,
        recurring_key: command.key,
        days: command.days,
        schedule_from_completion: command.from_completion,
        next_scheduled_date,
        owner: command.owner,
    };
    let row = scheduler.add_recurring(definition.clone()).await?;

    let success_style = Style::new().green().bold();
    let info_style = Style::new().blue();
    println!(
        "{} Added recurring task: {}",
        "✓".style(success_style),
        definition.task_name.bright_white().bold()
    );
    println!(
        "  {} Key {} on row {}, every {} day(s)",
        "→".style(info_style),
        definition.recurring_key.trim().yellow(),
        row,
        definition.days
    );
    match next_scheduled_date {
        Some(next) => println!("  {} First due {}", "→".style(info_style), next.format("%Y-%m-%d %H:%M")),
        None => println!("  {} Due on the next update", "→".style(info_style)),
    }
    if definition.schedule_from_completion {
        println!("  {} Rescheduled from each completion", "→".style(info_style));
    }
    Ok(())
}
