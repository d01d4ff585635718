//! Debouncing and mutual exclusion for edits to the Main view.
//!
//! The coordinator is a state machine over a persisted [`CoordinationState`]:
//!
//! ```text
//! Idle --edit--> Debouncing(n) --settled, marker still n--> Processing --done--> Idle
//!                     |                                          |
//!                     +--newer edit bumps marker--> (superseded) +--edit--> reverted
//! ```
//!
//! Every state update is a compare-and-swap against the stored version,
//! retried until the lock timeout runs out. Nothing is held across the
//! reconciliation pass itself.

use std::sync::Arc;

use chrono::Utc;
use tokio::time::{sleep, Duration, Instant};

use crate::debug_log::{log_debug, DebugSink};
use crate::error::CoreError;
use crate::models::{columns, layout, sheets, CoordinationState, EditEvent, Phase, SchedulerConfig};
use crate::reconcile::{reconcile, ReconciliationReport};
use crate::review::refresh_review;
use crate::schema::HeaderLookup;
use crate::store::{read_header_row, CoordinationStore, TabularStore};

const RETRY_BACKOFF: Duration = Duration::from_millis(25);

/// What handling one edit event amounted to.
#[derive(Debug, Clone, PartialEq)]
pub enum EditOutcome {
    /// A Main edit outside the command columns or inside reserved rows
    Ignored,
    /// An edit on another sheet; the review view was rebuilt
    Refreshed,
    /// A pass was running, so the edit was reverted
    Rejected,
    /// A newer edit arrived during the settle window
    Superseded,
    Processed(ReconciliationReport),
    /// The pass failed; the coordinator is back to idle regardless
    Failed(String),
}

enum Admission {
    Rejected,
    Debounce(u64),
}

pub struct EditCoordinator<S: TabularStore + ?Sized, C: CoordinationStore + ?Sized> {
    store: Arc<S>,
    coordination: Arc<C>,
    sink: Arc<dyn DebugSink>,
    config: SchedulerConfig,
}

impl<S, C> EditCoordinator<S, C>
where
    S: TabularStore + ?Sized,
    C: CoordinationStore + ?Sized,
{
    pub fn new(store: Arc<S>, coordination: Arc<C>, sink: Arc<dyn DebugSink>, config: SchedulerConfig) -> Self {
        Self {
            store,
            coordination,
            sink,
            config,
        }
    }

    pub async fn state(&self) -> Result<CoordinationState, CoreError> {
        self.coordination.load().await
    }

    pub async fn phase(&self) -> Result<Phase, CoreError> {
        Ok(self.coordination.load().await?.phase)
    }

    /// Forces the machine back to idle and clears the edit marker.
    pub async fn reset(&self) -> Result<(), CoreError> {
        self.coordination.reset().await?;
        tracing::warn!("coordination state reset");
        log_debug(self.sink.as_ref(), "Processing state has been reset.").await;
        Ok(())
    }

    /// Reads, updates and swaps the state until the swap wins or the lock
    /// timeout expires. `step` returns the state to store, if any, and the
    /// value to hand back once it is stored.
    async fn transition<T, F>(&self, step: F) -> Result<T, CoreError>
    where
        F: Fn(&CoordinationState) -> (Option<CoordinationState>, T),
    {
        let deadline = Instant::now() + self.config.lock_timeout;
        loop {
            let current = self.coordination.load().await?;
            let (next, value) = step(&current);
            let Some(next) = next else {
                return Ok(value);
            };
            if self.coordination.compare_and_swap(current.version, next).await? {
                return Ok(value);
            }
            if Instant::now() >= deadline {
                return Err(CoreError::CoordinationContention(format!(
                    "state update lost every race for {:?}",
                    self.config.lock_timeout
                )));
            }
            tracing::debug!(version = current.version, "coordination swap lost, retrying");
            sleep(RETRY_BACKOFF).await;
        }
    }

    async fn is_command_edit(&self, event: &EditEvent) -> Result<bool, CoreError> {
        if event.last_row() < layout::MAIN_DATA_ROW {
            return Ok(false);
        }
        let headers = HeaderLookup::from_row(&read_header_row(self.store.as_ref(), sheets::MAIN).await?);
        let touches = |name: &str| headers.column(name).is_some_and(|c| event.touches_column(c));
        Ok(touches(columns::COMPLETE) || touches(columns::REASSIGN))
    }

    async fn revert(&self, event: &EditEvent) -> Result<(), CoreError> {
        let Some(old_value) = &event.old_value else {
            tracing::warn!(sheet = %event.sheet, row = event.row, "multi-cell edit during processing left as is");
            return Ok(());
        };
        let block = vec![vec![old_value.clone(); event.columns.max(1)]; event.rows.max(1)];
        self.store
            .write_range(&event.sheet, event.row, event.column, &block)
            .await
    }

    /// Handles one edit notification. The returned future suspends for the
    /// settle window, so concurrent submissions coalesce into one pass.
    pub async fn submit_edit(&self, event: EditEvent) -> Result<EditOutcome, CoreError> {
        let sink = self.sink.as_ref();
        log_debug(sink, &format!("onEdit triggered. Sheet: {}", event.sheet)).await;

        if event.sheet != sheets::MAIN {
            refresh_review(self.store.as_ref()).await?;
            return Ok(EditOutcome::Refreshed);
        }
        if !self.is_command_edit(&event).await? {
            return Ok(EditOutcome::Ignored);
        }

        let admission = self
            .transition(|state| {
                if state.is_processing() {
                    return (None, Admission::Rejected);
                }
                let instance = state.edit_instance + 1;
                let next = CoordinationState {
                    phase: Phase::Debouncing(instance),
                    edit_instance: instance,
                    version: state.version,
                };
                (Some(next), Admission::Debounce(instance))
            })
            .await?;

        let instance = match admission {
            Admission::Rejected => {
                log_debug(sink, "Edit attempted while processing. Undoing edit.").await;
                self.revert(&event).await?;
                return Ok(EditOutcome::Rejected);
            }
            Admission::Debounce(instance) => instance,
        };
        log_debug(sink, &format!("Edit instance: {}", instance)).await;

        sleep(self.config.debounce).await;

        let claimed = self
            .transition(|state| {
                if state.edit_instance != instance || state.is_processing() {
                    return (None, false);
                }
                let next = CoordinationState {
                    phase: Phase::Processing,
                    ..*state
                };
                (Some(next), true)
            })
            .await?;
        if !claimed {
            log_debug(sink, "Another edit occurred. Deferring to newer instance.").await;
            return Ok(EditOutcome::Superseded);
        }

        let result = reconcile(self.store.as_ref(), sink, Utc::now()).await;

        self.transition(|state| {
            let next = CoordinationState {
                phase: Phase::Idle,
                ..*state
            };
            (Some(next), ())
        })
        .await?;
        log_debug(sink, "Processing complete. Reset processing flag.").await;

        Ok(match result {
            Ok(report) => EditOutcome::Processed(report),
            Err(e) => {
                tracing::error!(error = %e, "reconciliation failed");
                EditOutcome::Failed(e.to_string())
            }
        })
    }
}
