use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// Sheet Layout
// ============================================================================

/// Sheet names.
pub mod sheets {
    pub const RECURRING: &str = "Recurring";
    pub const ACTIVE: &str = "Active";
    pub const MAIN: &str = "Main";
    pub const DEBUG_LOG: &str = "Debug Log";
}

/// Header text of every column the engines address by name.
pub mod columns {
    pub const TASK: &str = "Task";
    pub const RECURRING_KEY: &str = "Recurring key";
    pub const DAYS: &str = "Days";
    pub const SCHEDULE_FROM_COMPLETION: &str = "Schedule from completion";
    pub const NEXT_SCHEDULED_DATE: &str = "Next scheduled date";

    pub const DATE_ADDED: &str = "Date Added";
    pub const COMPLETED: &str = "Completed";
    pub const COMPLETED_DATE: &str = "Completed date";
    pub const TASK_ID: &str = "Task ID";
    pub const OWNER: &str = "Owner";

    pub const COMPLETE: &str = "Complete";
    pub const REASSIGN: &str = "Reassign";
    pub const REPROCESSING: &str = "Reprocessing";

    pub const TIMESTAMP: &str = "Timestamp";
    pub const MESSAGE: &str = "Message";
}

/// 1-based row positions shared by all sheets.
pub mod layout {
    pub const HEADER_ROW: usize = 1;
    pub const RECURRING_DATA_ROW: usize = 2;
    /// Active row holding the one-off intake cells (under `Task` and `Owner`).
    pub const ACTIVE_INTAKE_ROW: usize = 2;
    /// Header, intake row and a controls row stay above the Active data.
    pub const ACTIVE_DATA_ROW: usize = 4;
    pub const ACTIVE_FROZEN_ROWS: usize = 3;
    /// Main rows reserved as intake slots; never reconciled.
    pub const MAIN_RESERVED_ROWS: [usize; 2] = [2, 3];
    pub const MAIN_DATA_ROW: usize = 4;
    pub const MAIN_FROZEN_ROWS: usize = 3;
}

pub const DEFAULT_OWNER: &str = "Shared";
pub const UNASSIGN_COMMAND: &str = "unassign";
pub const REPROCESSING_NOTICE: &str = "Reprocessing…";

// ============================================================================
// Cell Values
// ============================================================================

/// A single scalar cell, as the tabular store hands it over.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    Date(DateTime<Utc>),
}

impl CellValue {
    pub fn text(value: impl Into<String>) -> Self {
        CellValue::Text(value.into())
    }

    /// Empty cells and empty strings are both blank.
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Spreadsheet truthiness: blanks, `false`, `0` and `""` are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            CellValue::Empty => false,
            CellValue::Text(s) => !s.is_empty(),
            CellValue::Number(n) => *n != 0.0 && !n.is_nan(),
            CellValue::Bool(b) => *b,
            CellValue::Date(_) => true,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Trimmed string form of the cell; `None` when blank.
    pub fn to_trimmed_string(&self) -> Option<String> {
        if self.is_blank() {
            return None;
        }
        let rendered = self.to_string();
        let trimmed = rendered.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            CellValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            CellValue::Date(d) => Some(*d),
            CellValue::Text(s) => parse_date_text(s.trim()),
            _ => None,
        }
    }

    pub fn as_uuid(&self) -> Option<Uuid> {
        self.as_text().and_then(|s| Uuid::parse_str(s.trim()).ok())
    }

    /// Parses raw user input into the most specific cell type.
    pub fn parse_input(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return CellValue::Empty;
        }
        if trimmed.eq_ignore_ascii_case("true") {
            return CellValue::Bool(true);
        }
        if trimmed.eq_ignore_ascii_case("false") {
            return CellValue::Bool(false);
        }
        if let Ok(n) = trimmed.parse::<f64>() {
            if n.is_finite() {
                return CellValue::Number(n);
            }
        }
        if let Some(date) = parse_date_text(trimmed) {
            return CellValue::Date(date);
        }
        CellValue::Text(raw.to_string())
    }

    fn sort_rank(&self) -> u8 {
        match self {
            CellValue::Number(_) | CellValue::Date(_) => 0,
            CellValue::Text(s) if !s.is_empty() => 1,
            CellValue::Bool(_) => 2,
            _ => 3,
        }
    }

    /// Ascending spreadsheet order: numbers and dates, text, booleans, blanks.
    pub fn sort_cmp(&self, other: &Self) -> Ordering {
        let rank = self.sort_rank().cmp(&other.sort_rank());
        if rank != Ordering::Equal {
            return rank;
        }
        match (self, other) {
            (CellValue::Text(a), CellValue::Text(b)) => a.to_lowercase().cmp(&b.to_lowercase()),
            (CellValue::Bool(a), CellValue::Bool(b)) => a.cmp(b),
            _ => match (self.numeric_key(), other.numeric_key()) {
                (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
                _ => Ordering::Equal,
            },
        }
    }

    fn numeric_key(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            CellValue::Date(d) => Some(d.timestamp_millis() as f64),
            _ => None,
        }
    }
}

fn parse_date_text(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(d) = DateTime::parse_from_rfc3339(text) {
        return Some(d.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|d| d.and_utc())
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Text(s) => write!(f, "{}", s),
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Bool(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            CellValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d %H:%M")),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Bool(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<DateTime<Utc>> for CellValue {
    fn from(value: DateTime<Utc>) -> Self {
        CellValue::Date(value)
    }
}

impl From<Option<DateTime<Utc>>> for CellValue {
    fn from(value: Option<DateTime<Utc>>) -> Self {
        value.map(CellValue::Date).unwrap_or_default()
    }
}

// ============================================================================
// Domain Records
// ============================================================================

/// A row of the Recurring sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct RecurringDefinition {
    /// Sheet row this definition was read from
    pub row: usize,
    pub task_name: String,
    pub recurring_key: String,
    /// Cadence in days; `None` when the cell is blank or not a usable number
    pub days: Option<f64>,
    pub schedule_from_completion: bool,
    /// Empty means "due now"
    pub next_scheduled_date: Option<DateTime<Utc>>,
    /// The raw row, copied verbatim into spawned tasks
    pub cells: Vec<CellValue>,
}

/// `days` as a duration, or `None` when it is negative, not finite or
/// outside the range a duration can hold.
pub fn days_to_duration(days: f64) -> Option<Duration> {
    if !days.is_finite() || days < 0.0 {
        return None;
    }
    let millis = (days * 86_400_000.0).round();
    if millis >= i64::MAX as f64 {
        return None;
    }
    Duration::try_milliseconds(millis as i64)
}

/// `days` after `at`, or `None` when the date would leave the calendar.
pub fn add_days(at: DateTime<Utc>, days: f64) -> Option<DateTime<Utc>> {
    at.checked_add_signed(days_to_duration(days)?)
}

/// A row of the Active sheet: one trackable occurrence of a task.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveTask {
    pub row: usize,
    pub task_name: String,
    pub date_added: Option<DateTime<Utc>>,
    pub completed: bool,
    pub completed_date: Option<DateTime<Utc>>,
    /// Stable surrogate key; row positions shift under sorting
    pub task_id: Option<Uuid>,
    pub owner: Option<String>,
    /// Absent for one-off tasks
    pub recurring_key: Option<String>,
    pub cells: Vec<CellValue>,
}

impl ActiveTask {
    /// A task still counts as live until it is checked off or stamped.
    pub fn is_incomplete(&self) -> bool {
        !self.completed && self.completed_date.is_none()
    }

    /// Checked off by hand but not yet stamped by the maintainer.
    pub fn awaiting_completion_stamp(&self) -> bool {
        self.completed && self.completed_date.is_none()
    }
}

/// A row of the Main review view, read as a pending command.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewRow {
    pub row: usize,
    pub complete: bool,
    pub reassign: Option<String>,
    pub task_id: Option<Uuid>,
    /// Raw back-reference text, kept for diagnostics when it is not a UUID
    pub task_ref: String,
    pub recurring_key: Option<String>,
}

impl ReviewRow {
    pub fn has_command(&self) -> bool {
        self.complete || self.reassign.is_some()
    }

    pub fn reassign_command(&self) -> Option<ReassignCommand> {
        self.reassign.as_deref().map(ReassignCommand::parse)
    }
}

/// What a non-empty `Reassign` cell asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReassignCommand {
    Unassign,
    Owner(String),
}

impl ReassignCommand {
    pub fn parse(text: &str) -> Self {
        if text.trim().eq_ignore_ascii_case(UNASSIGN_COMMAND) {
            ReassignCommand::Unassign
        } else {
            ReassignCommand::Owner(text.to_string())
        }
    }
}

/// Data a human would type into a new Recurring row.
#[derive(Debug, Clone, Default)]
pub struct NewRecurringDefinition {
    pub task_name: String,
    pub recurring_key: String,
    pub days: f64,
    pub schedule_from_completion: bool,
    pub next_scheduled_date: Option<DateTime<Utc>>,
    pub owner: Option<String>,
}

/// A user-driven cell change, as delivered by the edit notification source.
#[derive(Debug, Clone, PartialEq)]
pub struct EditEvent {
    pub sheet: String,
    pub row: usize,
    pub column: usize,
    pub rows: usize,
    pub columns: usize,
    /// The cell's value before the edit; `None` for multi-cell edits
    pub old_value: Option<CellValue>,
}

impl EditEvent {
    pub fn single(sheet: impl Into<String>, row: usize, column: usize, old_value: CellValue) -> Self {
        Self {
            sheet: sheet.into(),
            row,
            column,
            rows: 1,
            columns: 1,
            old_value: Some(old_value),
        }
    }

    pub fn last_row(&self) -> usize {
        self.row + self.rows.max(1) - 1
    }

    pub fn last_column(&self) -> usize {
        self.column + self.columns.max(1) - 1
    }

    pub fn touches_column(&self, column: usize) -> bool {
        self.column <= column && column <= self.last_column()
    }
}

// ============================================================================
// Coordination State
// ============================================================================

/// Where the edit coordinator currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Idle,
    Debouncing(u64),
    Processing,
}

impl Phase {
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Debouncing(_) => "debouncing",
            Phase::Processing => "processing",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Debouncing(instance) => write!(f, "debouncing({})", instance),
            other => write!(f, "{}", other.label()),
        }
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid coordination phase: {0}")]
pub struct ParsePhaseError(String);

impl Phase {
    pub fn from_parts(label: &str, instance: Option<u64>) -> Result<Self, ParsePhaseError> {
        match (label.to_lowercase().as_str(), instance) {
            ("idle", _) => Ok(Phase::Idle),
            ("processing", _) => Ok(Phase::Processing),
            ("debouncing", Some(id)) => Ok(Phase::Debouncing(id)),
            _ => Err(ParsePhaseError(label.to_string())),
        }
    }

    pub fn instance(&self) -> Option<u64> {
        match self {
            Phase::Debouncing(id) => Some(*id),
            _ => None,
        }
    }
}

/// The persisted coordination record. `version` guards every update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinationState {
    pub phase: Phase,
    pub edit_instance: u64,
    pub version: u64,
}

impl Default for CoordinationState {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            edit_instance: 0,
            version: 0,
        }
    }
}

impl CoordinationState {
    pub fn is_processing(&self) -> bool {
        self.phase == Phase::Processing
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Tunables for the scheduler - core version
/// This is separate from the CLI config so the core stays format-agnostic
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Tasks due within this many days of now count as due
    pub grace_days: f64,
    /// Settle window after an edit before reconciliation runs
    pub debounce: std::time::Duration,
    /// Upper bound for one coordination state update
    pub lock_timeout: std::time::Duration,
    /// Owner given to tasks that have none
    pub default_owner: String,
    /// Whether to mirror debug messages into the Debug Log sheet
    pub debug_log: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            grace_days: 0.2,
            debounce: std::time::Duration::from_secs(3),
            lock_timeout: std::time::Duration::from_secs(10),
            default_owner: DEFAULT_OWNER.to_string(),
            debug_log: true,
        }
    }
}

impl SchedulerConfig {
    /// An unusable `grace_days` counts as no grace at all.
    pub fn grace_window(&self) -> Duration {
        days_to_duration(self.grace_days).unwrap_or_else(Duration::zero)
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid sheet name: {0}")]
pub struct ParseSheetError(String);

/// The sheets a command surface may address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetKind {
    Recurring,
    Active,
    Main,
    DebugLog,
}

impl SheetKind {
    pub fn name(&self) -> &'static str {
        match self {
            SheetKind::Recurring => sheets::RECURRING,
            SheetKind::Active => sheets::ACTIVE,
            SheetKind::Main => sheets::MAIN,
            SheetKind::DebugLog => sheets::DEBUG_LOG,
        }
    }
}

impl FromStr for SheetKind {
    type Err = ParseSheetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "recurring" => Ok(SheetKind::Recurring),
            "active" => Ok(SheetKind::Active),
            "main" | "review" => Ok(SheetKind::Main),
            "debug" | "debug log" | "log" => Ok(SheetKind::DebugLog),
            _ => Err(ParseSheetError(s.to_string())),
        }
    }
}
