//! Append-only diagnostic trail kept next to the data it describes.
//!
//! Every message is emitted as a `tracing` event first. The sink is a
//! second copy aimed at people who only ever look at the workbook.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{CoreError, Diagnostic};
use crate::models::{layout, sheets, CellValue};
use crate::schema::{HeaderLookup, DEBUG_LOG_HEADERS};
use crate::store::{append_data_rows, read_header_row, TabularStore};

#[async_trait]
pub trait DebugSink: Send + Sync {
    async fn append(&self, at: DateTime<Utc>, message: &str) -> Result<(), CoreError>;
}

/// Writes `(Timestamp, Message)` rows into the `Debug Log` sheet.
pub struct SheetDebugLog<S: TabularStore + ?Sized> {
    store: Arc<S>,
}

impl<S: TabularStore + ?Sized> SheetDebugLog<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Creates the sheet and its header row when missing.
    pub async fn ensure(&self) -> Result<(), CoreError> {
        self.store.ensure_sheet(sheets::DEBUG_LOG).await?;
        let headers = HeaderLookup::from_row(&read_header_row(self.store.as_ref(), sheets::DEBUG_LOG).await?);
        if headers.is_empty() {
            let row = HeaderLookup::from_names(DEBUG_LOG_HEADERS).to_cells();
            self.store
                .write_range(sheets::DEBUG_LOG, layout::HEADER_ROW, 1, &[row])
                .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl<S: TabularStore + ?Sized> DebugSink for SheetDebugLog<S> {
    async fn append(&self, at: DateTime<Utc>, message: &str) -> Result<(), CoreError> {
        self.ensure().await?;
        append_data_rows(
            self.store.as_ref(),
            sheets::DEBUG_LOG,
            layout::HEADER_ROW + 1,
            &[vec![CellValue::Date(at), CellValue::text(message)]],
        )
        .await?;
        Ok(())
    }
}

/// Discards everything. Used when the sheet log is switched off.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDebugSink;

#[async_trait]
impl DebugSink for NullDebugSink {
    async fn append(&self, _at: DateTime<Utc>, _message: &str) -> Result<(), CoreError> {
        Ok(())
    }
}

/// Logs a step at debug level and mirrors it into the sink.
///
/// A failing sink never fails the caller; the failure is reported as a warning.
pub async fn log_debug(sink: &dyn DebugSink, message: &str) {
    tracing::debug!(target: "cadence::debug_log", "{}", message);
    if let Err(e) = sink.append(Utc::now(), message).await {
        tracing::warn!(error = %e, "failed to append to debug log");
    }
}

/// Logs a recoverable inconsistency at warn level and mirrors it into the sink.
pub async fn log_diagnostic(sink: &dyn DebugSink, diagnostic: &Diagnostic) {
    tracing::warn!(target: "cadence::debug_log", "{}", diagnostic);
    if let Err(e) = sink.append(Utc::now(), &diagnostic.to_string()).await {
        tracing::warn!(error = %e, "failed to append to debug log");
    }
}
