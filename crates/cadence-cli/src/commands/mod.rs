use cadence_core::scheduler::Scheduler;
use cadence_core::store::sqlite::{SqliteCoordination, SqliteWorkbook};

pub mod edit;
pub mod intake;
pub mod recurring;
pub mod setup;
pub mod show;
pub mod state;
pub mod update;

pub type AppScheduler = Scheduler<SqliteWorkbook, SqliteCoordination>;
