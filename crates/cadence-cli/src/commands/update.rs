use anyhow::Result;
use cadence_core::error::Diagnostic;
use cadence_core::maintain::MaintenanceReport;
use cadence_core::materialize::Reschedule;
use chrono::Utc;
use owo_colors::{OwoColorize, Style};

use crate::cli::ClockCommand;
use crate::commands::AppScheduler;
use crate::parser::parse_when;

pub(crate) fn print_diagnostics(diagnostics: &[Diagnostic]) {
    let warn_style = Style::new().yellow().bold();
    for diagnostic in diagnostics {
        println!("{} {}", "!".style(warn_style), diagnostic);
    }
}

pub(crate) fn print_reschedules(reschedules: &[Reschedule]) {
    let info_style = Style::new().blue();
    for reschedule in reschedules {
        match reschedule.next_scheduled_date {
            Some(next) => println!(
                "  {} '{}' next due {}",
                "→".style(info_style),
                reschedule.recurring_key,
                next.format("%Y-%m-%d %H:%M")
            ),
            None => println!(
                "  {} '{}' waits for completion",
                "→".style(info_style),
                reschedule.recurring_key
            ),
        }
    }
}

fn print_maintenance(report: &MaintenanceReport) {
    let success_style = Style::new().green().bold();
    if let Some(task) = &report.intake {
        println!(
            "{} Added one-off task: {} ({})",
            "✓".style(success_style),
            task.task_name.bright_white().bold(),
            task.owner
        );
    }
    if report.stamped > 0 {
        println!("{} Stamped {} completion(s)", "✓".style(success_style), report.stamped);
    }
    print_reschedules(&report.rescheduled);
    if report.backfilled > 0 {
        println!("  Assigned {} unowned task(s) to the default owner", report.backfilled);
    }
    print_diagnostics(&report.diagnostics);
    println!("{} task(s) open for review", report.review_rows);
}

pub async fn update_tasks(scheduler: &AppScheduler, command: ClockCommand) -> Result<()> {
    let now = match command.at {
        Some(at) => parse_when(&at, Utc::now())?,
        None => Utc::now(),
    };
    let report = scheduler.update_todays_tasks_at(now).await?;

    let success_style = Style::new().green().bold();
    let materialization = &report.materialization;
    if materialization.created.is_empty() {
        println!("No recurring tasks due.");
    }
    for task in &materialization.created {
        println!(
            "{} Spawned {} [{}]",
            "✓".style(success_style),
            task.task_name.bright_white().bold(),
            task.recurring_key.bright_black()
        );
    }
    print_reschedules(&materialization.rescheduled);
    print_diagnostics(&materialization.diagnostics);
    print_maintenance(&report.maintenance);
    Ok(())
}

pub async fn resort(scheduler: &AppScheduler, command: ClockCommand) -> Result<()> {
    let now = match command.at {
        Some(at) => parse_when(&at, Utc::now())?,
        None => Utc::now(),
    };
    let report = scheduler.update_active_sheet_at(now).await?;
    print_maintenance(&report);
    Ok(())
}
