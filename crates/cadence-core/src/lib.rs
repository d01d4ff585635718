//! # Cadence Core Library
//!
//! A recurring-task scheduler layered over a tabular, spreadsheet-like store.
//! Three sheets are kept consistent as users edit cells and as time advances:
//! the **Recurring** definitions, the **Active** task queue and the **Main**
//! review view.
//!
//! ## Features
//!
//! - **Materialization**: due recurring definitions spawn exactly one live
//!   instance each, with a grace window that absorbs run-time jitter
//! - **Completion-linked cadence**: definitions can reschedule from the moment
//!   the work was actually finished instead of a fixed calendar offset
//! - **Review reconciliation**: bulk complete/reassign commands typed into the
//!   review view are applied back to the queue and then cleared
//! - **Edit coordination**: rapid edits are debounced into one pass and edits
//!   landing mid-pass are reverted
//! - **Pluggable storage**: in-memory and SQLite workbooks behind one trait
//!
//! ## Core Modules
//!
//! - [`db`]: SQLite connection and migration management
//! - [`models`]: Cell values, sheet layout and domain records
//! - [`schema`]: Header addressing and typed table schemas
//! - [`store`]: Tabular and coordination store traits with implementations
//! - [`validate`]: Recurring key validation
//! - [`materialize`]: Due-task materialization and next-date computation
//! - [`maintain`]: Active queue post-processing
//! - [`reconcile`]: Review command reconciliation
//! - [`review`]: Review view projection
//! - [`coordinator`]: Edit debounce and mutual exclusion
//! - [`scheduler`]: The named operations exposed to a command surface
//! - [`error`]: Fatal errors and recoverable diagnostics
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use cadence_core::{
//!     models::SchedulerConfig,
//!     scheduler::Scheduler,
//!     store::memory::{MemoryCoordination, MemoryWorkbook},
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), cadence_core::error::CoreError> {
//!     let scheduler = Scheduler::new(
//!         Arc::new(MemoryWorkbook::new()),
//!         Arc::new(MemoryCoordination::new()),
//!         SchedulerConfig::default(),
//!     );
//!     scheduler.initialize().await?;
//!
//!     let report = scheduler.update_todays_tasks().await?;
//!     println!("Spawned {} tasks", report.materialization.created.len());
//!     Ok(())
//! }
//! ```

pub mod coordinator;
pub mod db;
pub mod debug_log;
pub mod error;
pub mod maintain;
pub mod materialize;
pub mod models;
pub mod reconcile;
pub mod review;
pub mod scheduler;
pub mod schema;
pub mod store;
pub mod tables;
pub mod validate;
