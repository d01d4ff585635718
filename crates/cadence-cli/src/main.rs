use std::sync::Arc;

use cadence_core::db;
use cadence_core::error::CoreError;
use cadence_core::scheduler::Scheduler;
use cadence_core::store::sqlite::{SqliteCoordination, SqliteWorkbook};
use clap::Parser;
use owo_colors::{OwoColorize, Style};
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod config;
mod parser;
mod views;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cadence=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = cli::Cli::parse();

    let config = match config::Config::new() {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(error = %e, "invalid configuration, using defaults");
            config::Config::default()
        }
    };
    let db_pool = match db::establish_connection(&config.database_path).await {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    };
    let scheduler = Scheduler::new(
        Arc::new(SqliteWorkbook::new(db_pool.clone())),
        Arc::new(SqliteCoordination::new(db_pool)),
        config.to_scheduler_config(),
    );

    let result = match cli.command {
        cli::Commands::Init => commands::setup::init(&scheduler).await,
        cli::Commands::Update(command) => commands::update::update_tasks(&scheduler, command).await,
        cli::Commands::Resort(command) => commands::update::resort(&scheduler, command).await,
        cli::Commands::Filter(command) => commands::setup::filter(&scheduler, command.action).await,
        cli::Commands::Reset(command) => commands::state::reset(&scheduler, command).await,
        cli::Commands::Status => commands::state::status(&scheduler).await,
        cli::Commands::Edit(command) => commands::edit::edit_cell(&scheduler, command).await,
        cli::Commands::Recurring(command) => {
            commands::recurring::recurring(&scheduler, command.action).await
        }
        cli::Commands::Intake(command) => commands::intake::intake(&scheduler, command).await,
        cli::Commands::Show(command) => commands::show::show_sheet(&scheduler, command).await,
        cli::Commands::Log(command) => commands::show::show_log(&scheduler, command).await,
    };

    if let Err(e) = result {
        handle_error(e);
        std::process::exit(1);
    }
}

fn handle_error(err: anyhow::Error) {
    let error_style = Style::new().red().bold();

    if let Some(core_error) = err.chain().find_map(|e| e.downcast_ref::<CoreError>()) {
        match core_error {
            CoreError::SheetNotFound(sheet) => {
                eprintln!("{} Sheet '{}' does not exist.", "Error:".style(error_style), sheet);
                eprintln!("Run {} to create the workbook.", "cadence init".yellow());
            }
            CoreError::MissingColumn { sheet, column } => {
                eprintln!(
                    "{} Sheet '{}' is missing its '{}' column.",
                    "Error:".style(error_style),
                    sheet,
                    column.yellow()
                );
            }
            CoreError::InvalidRecurringKey(violation) => {
                eprintln!("{} Recurring sheet is invalid: {}", "Error:".style(error_style), violation);
                eprintln!("No tasks were changed.");
            }
            CoreError::CoordinationContention(s) => {
                eprintln!("{} {}", "Error:".style(error_style), s);
                eprintln!(
                    "If no review pass is running, clear the state with {}.",
                    "cadence reset".yellow()
                );
            }
            CoreError::InvalidInput(s) => {
                eprintln!("{} Invalid input: {}", "Error:".style(error_style), s);
            }
            _ => eprintln!("{} {:#}", "Error:".style(error_style), err),
        }
    } else {
        eprintln!("{} {:#}", "Error:".style(error_style), err);
    }
}
