use anyhow::Result;
use owo_colors::{OwoColorize, Style};

use crate::cli::FilterAction;
use crate::commands::AppScheduler;

pub async fn init(scheduler: &AppScheduler) -> Result<()> {
    let created = scheduler.initialize().await?;
    let success_style = Style::new().green().bold();
    if created.is_empty() {
        println!("Workbook already initialized.");
    }
    for sheet in created {
        println!("{} Created sheet {}", "✓".style(success_style), sheet.bright_white().bold());
    }
    Ok(())
}

pub async fn filter(scheduler: &AppScheduler, action: FilterAction) -> Result<()> {
    match action {
        FilterAction::Add => {
            scheduler.add_filter().await?;
            println!("Completed tasks are now hidden on the Active sheet.");
        }
        FilterAction::Remove => {
            scheduler.remove_filter().await?;
            println!("All tasks are now shown on the Active sheet.");
        }
    }
    Ok(())
}
