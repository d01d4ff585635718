//! The named operations a command surface invokes.
//!
//! [`Scheduler`] owns the shared store, the coordination store and the debug
//! sink, and wires them into the engines. Every time-dependent operation has
//! an `_at` variant that takes the clock reading explicitly.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::coordinator::{EditCoordinator, EditOutcome};
use crate::debug_log::{log_debug, DebugSink, NullDebugSink, SheetDebugLog};
use crate::error::{CoreError, KeyViolation};
use crate::maintain::{completed_filter, maintain, MaintenanceReport};
use crate::materialize::{materialize, MaterializationReport};
use crate::models::{
    add_days, columns, layout, sheets, CellValue, CoordinationState, EditEvent, NewRecurringDefinition,
    SchedulerConfig,
};
use crate::review::refresh_review;
use crate::schema::{ActiveSchema, HeaderLookup, MainSchema, RecurringSchema, RECURRING_HEADERS};
use crate::store::{append_data_rows, read_header_row, CoordinationStore, TabularStore};
use crate::tables::{ensure_active_headers, ensure_main_headers, load_recurring, write_field};

/// Outcome of a full "update today's tasks" run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateReport {
    pub materialization: MaterializationReport,
    pub maintenance: MaintenanceReport,
}

pub struct Scheduler<S: TabularStore + ?Sized, C: CoordinationStore + ?Sized> {
    store: Arc<S>,
    sink: Arc<dyn DebugSink>,
    config: SchedulerConfig,
    coordinator: EditCoordinator<S, C>,
}

impl<S, C> Scheduler<S, C>
where
    S: TabularStore + ?Sized + 'static,
    C: CoordinationStore + ?Sized,
{
    pub fn new(store: Arc<S>, coordination: Arc<C>, config: SchedulerConfig) -> Self {
        let sink: Arc<dyn DebugSink> = if config.debug_log {
            Arc::new(SheetDebugLog::new(store.clone()))
        } else {
            Arc::new(NullDebugSink)
        };
        Self::with_sink(store, coordination, sink, config)
    }

    pub fn with_sink(
        store: Arc<S>,
        coordination: Arc<C>,
        sink: Arc<dyn DebugSink>,
        config: SchedulerConfig,
    ) -> Self {
        let coordinator = EditCoordinator::new(store.clone(), coordination, sink.clone(), config.clone());
        Self {
            store,
            sink,
            config,
            coordinator,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Creates missing sheets and header rows and applies the default view
    /// rules. Existing content is left alone. Returns the sheets created.
    pub async fn initialize(&self) -> Result<Vec<String>, CoreError> {
        let store = self.store.as_ref();
        let mut created = Vec::new();
        let mut wanted = vec![sheets::RECURRING, sheets::ACTIVE, sheets::MAIN];
        if self.config.debug_log {
            wanted.push(sheets::DEBUG_LOG);
        }
        for sheet in wanted {
            if store.ensure_sheet(sheet).await? {
                created.push(sheet.to_string());
            }
        }

        let mut recurring = HeaderLookup::from_row(&read_header_row(store, sheets::RECURRING).await?);
        if recurring.is_empty() {
            recurring = HeaderLookup::from_names(RECURRING_HEADERS);
            store
                .write_range(sheets::RECURRING, layout::HEADER_ROW, 1, &[recurring.to_cells()])
                .await?;
        }
        RecurringSchema::decode(recurring.clone())?;
        store.set_frozen_rows(sheets::RECURRING, layout::HEADER_ROW).await?;

        let active = ActiveSchema::decode(ensure_active_headers(store, &recurring).await?)?;
        if store.filter(sheets::ACTIVE).await?.is_none() {
            store.set_filter(sheets::ACTIVE, completed_filter(&active)).await?;
        }
        store
            .set_frozen_rows(sheets::ACTIVE, layout::ACTIVE_FROZEN_ROWS)
            .await?;

        let main = MainSchema::decode(ensure_main_headers(store).await?)?;
        if let Some(reprocessing) = main.reprocessing {
            store.hide_columns(sheets::MAIN, reprocessing + 1, 1).await?;
        }
        store.set_frozen_rows(sheets::MAIN, layout::MAIN_FROZEN_ROWS).await?;

        if self.config.debug_log {
            SheetDebugLog::new(self.store.clone()).ensure().await?;
            store.set_frozen_rows(sheets::DEBUG_LOG, layout::HEADER_ROW).await?;
        }

        tracing::info!(created = ?created, "workbook initialized");
        Ok(created)
    }

    pub async fn update_todays_tasks(&self) -> Result<UpdateReport, CoreError> {
        self.update_todays_tasks_at(Utc::now()).await
    }

    /// Validate, materialize due tasks, then maintain the queue and views.
    pub async fn update_todays_tasks_at(&self, now: DateTime<Utc>) -> Result<UpdateReport, CoreError> {
        let store = self.store.as_ref();
        let sink = self.sink.as_ref();
        log_debug(sink, "Updating today's tasks").await;

        let materialization = materialize(store, sink, &self.config, now).await?;
        let maintenance = maintain(store, sink, &self.config, now).await?;
        Ok(UpdateReport {
            materialization,
            maintenance,
        })
    }

    /// The manual resort trigger.
    pub async fn update_active_sheet(&self) -> Result<MaintenanceReport, CoreError> {
        self.update_active_sheet_at(Utc::now()).await
    }

    pub async fn update_active_sheet_at(&self, now: DateTime<Utc>) -> Result<MaintenanceReport, CoreError> {
        maintain(self.store.as_ref(), self.sink.as_ref(), &self.config, now).await
    }

    /// Hides completed rows of the Active sheet.
    pub async fn add_filter(&self) -> Result<(), CoreError> {
        let recurring = load_recurring(self.store.as_ref()).await?;
        let headers = ensure_active_headers(self.store.as_ref(), &recurring.schema.headers).await?;
        let schema = ActiveSchema::decode(headers)?;
        self.store
            .set_filter(sheets::ACTIVE, completed_filter(&schema))
            .await?;
        log_debug(self.sink.as_ref(), "Active filter added").await;
        Ok(())
    }

    pub async fn remove_filter(&self) -> Result<(), CoreError> {
        self.store.remove_filter(sheets::ACTIVE).await?;
        log_debug(self.sink.as_ref(), "Active filter removed").await;
        Ok(())
    }

    /// Rebuilds the Main view from Active. Returns the number of rows shown.
    pub async fn refresh_review(&self) -> Result<usize, CoreError> {
        refresh_review(self.store.as_ref()).await
    }

    pub async fn reset_processing_state(&self) -> Result<(), CoreError> {
        self.coordinator.reset().await
    }

    pub async fn coordination_state(&self) -> Result<CoordinationState, CoreError> {
        self.coordinator.state().await
    }

    pub async fn on_edit(&self, event: EditEvent) -> Result<EditOutcome, CoreError> {
        self.coordinator.submit_edit(event).await
    }

    /// Appends a definition to the Recurring sheet. The key must be new.
    pub async fn add_recurring(&self, definition: NewRecurringDefinition) -> Result<usize, CoreError> {
        let store = self.store.as_ref();
        let recurring = load_recurring(store).await?;
        let key = definition.recurring_key.trim();
        if key.is_empty() {
            let row = (store.last_row(sheets::RECURRING).await? + 1).max(layout::RECURRING_DATA_ROW);
            return Err(KeyViolation::Missing { row }.into());
        }
        if recurring.find(key).is_some() {
            return Err(KeyViolation::Duplicate { key: key.to_string() }.into());
        }
        if !definition.days.is_finite() || definition.days < 0.0 {
            return Err(CoreError::InvalidInput(format!(
                "days must be a non-negative number, got {}",
                definition.days
            )));
        }
        let anchor = definition.next_scheduled_date.unwrap_or_else(Utc::now);
        if add_days(anchor, definition.days).is_none() {
            return Err(CoreError::InvalidInput(format!(
                "days is too large to schedule, got {}",
                definition.days
            )));
        }

        let headers = &recurring.schema.headers;
        let cells: Vec<CellValue> = headers
            .names()
            .iter()
            .map(|name| match name.as_str() {
                columns::TASK => CellValue::text(definition.task_name.as_str()),
                columns::RECURRING_KEY => CellValue::text(key),
                columns::DAYS => CellValue::Number(definition.days),
                columns::SCHEDULE_FROM_COMPLETION => CellValue::Bool(definition.schedule_from_completion),
                columns::NEXT_SCHEDULED_DATE => definition.next_scheduled_date.into(),
                columns::OWNER => definition
                    .owner
                    .as_deref()
                    .map(CellValue::text)
                    .unwrap_or_default(),
                _ => CellValue::Empty,
            })
            .collect();

        let row = append_data_rows(store, sheets::RECURRING, layout::RECURRING_DATA_ROW, &[cells]).await?;
        log_debug(
            self.sink.as_ref(),
            &format!("Added recurring definition '{}' at row {}", key, row),
        )
        .await;
        Ok(row)
    }

    /// Types a one-off task into the Active intake cells. The next
    /// maintenance pass picks it up.
    pub async fn request_one_off(&self, task_name: &str, owner: Option<&str>) -> Result<(), CoreError> {
        let task_name = task_name.trim();
        if task_name.is_empty() {
            return Err(CoreError::InvalidInput("task name cannot be empty".to_string()));
        }
        let store = self.store.as_ref();
        let recurring = load_recurring(store).await?;
        let schema = ActiveSchema::decode(ensure_active_headers(store, &recurring.schema.headers).await?)?;

        let row = layout::ACTIVE_INTAKE_ROW;
        write_field(store, sheets::ACTIVE, row, schema.task, CellValue::text(task_name)).await?;
        let owner = owner.map(str::trim).filter(|o| !o.is_empty());
        write_field(
            store,
            sheets::ACTIVE,
            row,
            schema.owner,
            owner.map(CellValue::text).unwrap_or_default(),
        )
        .await
    }
}
