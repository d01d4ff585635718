use anyhow::{anyhow, Result};
use owo_colors::{OwoColorize, Style};

use crate::cli::IntakeCommand;
use crate::commands::AppScheduler;

/// Types the task into the intake cells, then runs a resort so it lands in
/// the queue right away.
pub async fn intake(scheduler: &AppScheduler, command: IntakeCommand) -> Result<()> {
    scheduler
        .request_one_off(&command.task, command.owner.as_deref())
        .await?;
    let report = scheduler.update_active_sheet().await?;
    let task = report
        .intake
        .ok_or_else(|| anyhow!("The intake cells were empty when the queue was updated"))?;

    let success_style = Style::new().green().bold();
    let info_style = Style::new().blue();
    println!(
        "{} Added one-off task: {}",
        "✓".style(success_style),
        task.task_name.bright_white().bold()
    );
    println!("  {} Owner: {}", "→".style(info_style), task.owner);
    println!("  {} Task ID: {}", "→".style(info_style), task.task_id.to_string().yellow());
    Ok(())
}
