use clap::{Parser, Subcommand};

/// Recurring chores, materialized on schedule and reviewed in bulk
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Create the workbook sheets and their header rows
    Init,
    /// Spawn due recurring tasks, then tidy the queue and the review view
    Update(ClockCommand),
    /// Tidy the Active queue and rebuild the review view without spawning
    Resort(ClockCommand),
    /// Show or hide completed rows of the Active sheet
    Filter(FilterCommand),
    /// Force the edit coordinator back to idle
    Reset(ResetCommand),
    /// Show the edit coordinator state
    Status,
    /// Write a cell and notify the scheduler, as a spreadsheet user would
    Edit(EditCommand),
    /// Manage recurring definitions
    Recurring(RecurringCommand),
    /// Add a one-off task to the Active queue
    Intake(IntakeCommand),
    /// Print a sheet
    Show(ShowCommand),
    /// Print the most recent debug log entries
    Log(LogCommand),
}

#[derive(Parser, Debug, Clone)]
pub struct ClockCommand {
    /// Run as if the clock read this instead of now (e.g. '2025-03-10', 'tomorrow 9am')
    #[arg(long)]
    pub at: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct FilterCommand {
    #[command(subcommand)]
    pub action: FilterAction,
}

#[derive(Subcommand, Debug, Clone)]
pub enum FilterAction {
    /// Hide completed tasks on the Active sheet
    Add,
    /// Show every task on the Active sheet
    Remove,
}

#[derive(Parser, Debug, Clone)]
pub struct ResetCommand {
    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct EditCommand {
    /// The sheet to edit (recurring, active, main)
    pub sheet: String,
    /// The cell in A1 notation, e.g. 'A4'
    pub cell: String,
    /// The new value; numbers, TRUE/FALSE and ISO dates are typed accordingly
    pub value: String,
}

#[derive(Parser, Debug, Clone)]
pub struct RecurringCommand {
    #[command(subcommand)]
    pub action: RecurringAction,
}

#[derive(Subcommand, Debug, Clone)]
pub enum RecurringAction {
    /// Append a recurring definition
    Add(AddRecurringCommand),
}

#[derive(Parser, Debug, Clone)]
pub struct AddRecurringCommand {
    /// The task name
    pub task: String,
    /// Unique key that links spawned tasks back to this definition
    #[arg(short, long)]
    pub key: String,
    /// Cadence in days; fractions are allowed
    #[arg(short, long)]
    pub days: f64,
    /// Schedule the next occurrence from the completion time instead of a fixed offset
    #[arg(long)]
    pub from_completion: bool,
    /// First due date; leave out to make the task due immediately
    #[arg(short, long)]
    pub next: Option<String>,
    /// Owner copied onto each spawned task
    #[arg(short, long)]
    pub owner: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct IntakeCommand {
    /// The task name
    pub task: String,
    /// Who the task is for; defaults to the shared owner
    #[arg(short, long)]
    pub owner: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct ShowCommand {
    /// The sheet to print (recurring, active, main, log)
    pub sheet: String,
    /// Include rows and columns the view rules hide
    #[arg(short, long)]
    pub all: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct LogCommand {
    /// How many entries to print
    #[arg(short = 'n', long, default_value_t = 20)]
    pub limit: usize,
}
