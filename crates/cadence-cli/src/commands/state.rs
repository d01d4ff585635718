use anyhow::Result;
use cadence_core::models::Phase;
use dialoguer::Confirm;
use owo_colors::{OwoColorize, Style};

use crate::cli::ResetCommand;
use crate::commands::AppScheduler;

pub async fn status(scheduler: &AppScheduler) -> Result<()> {
    let state = scheduler.coordination_state().await?;
    let phase = state.phase.to_string();
    let phase = match state.phase {
        Phase::Idle => phase.green().to_string(),
        Phase::Debouncing(_) => phase.yellow().to_string(),
        Phase::Processing => phase.red().bold().to_string(),
    };
    println!("Phase: {}", phase);
    println!("Last edit instance: {}", state.edit_instance);
    Ok(())
}

pub async fn reset(scheduler: &AppScheduler, command: ResetCommand) -> Result<()> {
    if !command.force {
        let confirmation = Confirm::new()
            .with_prompt("Reset the processing state? A pass that is still running will not be stopped")
            .default(false)
            .interact()
            .unwrap_or(false);

        if !confirmation {
            println!("Reset cancelled.");
            return Ok(());
        }
    }

    scheduler.reset_processing_state().await?;
    let success_style = Style::new().green().bold();
    println!("{} Processing state has been reset.", "✓".style(success_style));
    Ok(())
}
