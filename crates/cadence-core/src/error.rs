use std::fmt;

use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Database error")]
    Database(#[from] sqlx::Error),

    #[error("Migration error")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("IO error")]
    Io(#[from] std::io::Error),

    #[error("Cell encoding error")]
    Encoding(#[from] serde_json::Error),

    #[error("Sheet not found: {0}")]
    SheetNotFound(String),

    #[error("Sheet '{sheet}' has no '{column}' column")]
    MissingColumn { sheet: String, column: String },

    #[error("Invalid recurring table: {0}")]
    InvalidRecurringKey(#[from] KeyViolation),

    #[error("Coordination state is busy: {0}")]
    CoordinationContention(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// The first structural problem found in the recurring key space.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyViolation {
    #[error("recurring definition on row {row} has no recurring key")]
    Missing { row: usize },

    #[error("duplicate recurring key '{key}'")]
    Duplicate { key: String },
}

/// A recoverable data inconsistency. Diagnostics are collected into pass
/// reports and logged; they never abort the batch they were found in.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// A completion referenced a recurring key that no definition carries.
    DanglingRecurringKey { key: String },
    /// A review row pointed at a task id that is not in the Active sheet.
    UnknownTask { row: usize, task_id: String },
    /// A due definition has no usable `Days` value.
    InvalidCadence { key: String, row: usize },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::DanglingRecurringKey { key } => {
                write!(f, "no recurring definition with key '{}'", key)
            }
            Diagnostic::UnknownTask { row, task_id } => {
                write!(f, "review row {} refers to unknown task '{}'", row, task_id)
            }
            Diagnostic::InvalidCadence { key, row } => {
                write!(f, "recurring definition '{}' on row {} has no valid day count", key, row)
            }
        }
    }
}

impl Diagnostic {
    pub fn unknown_task(row: usize, task_id: Option<Uuid>, raw: &str) -> Self {
        Diagnostic::UnknownTask {
            row,
            task_id: task_id.map(|id| id.to_string()).unwrap_or_else(|| raw.to_string()),
        }
    }
}
