use std::time::Duration;

use cadence_core::models::{SchedulerConfig, DEFAULT_OWNER};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;

pub const CONFIG_FILE: &str = "cadence.toml";

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Path to the SQLite workbook
    pub database_path: String,
    /// Tasks due within this many days count as due now
    pub grace_days: f64,
    /// Settle window after a review edit, in milliseconds
    pub debounce_ms: u64,
    /// Upper bound for one coordination state update, in milliseconds
    pub lock_timeout_ms: u64,
    pub default_owner: String,
    /// Mirror debug messages into the Debug Log sheet
    pub debug_log: bool,
}

impl Default for Config {
    fn default() -> Self {
        let core = SchedulerConfig::default();
        Self {
            database_path: "cadence.db".to_string(),
            grace_days: core.grace_days,
            debounce_ms: core.debounce.as_millis() as u64,
            lock_timeout_ms: core.lock_timeout.as_millis() as u64,
            default_owner: DEFAULT_OWNER.to_string(),
            debug_log: core.debug_log,
        }
    }
}

impl Config {
    pub fn new() -> Result<Self, figment::Error> {
        Self::figment().extract()
    }

    fn figment() -> Figment {
        Figment::new()
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed("CADENCE_"))
    }

    pub fn to_scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            grace_days: self.grace_days,
            debounce: Duration::from_millis(self.debounce_ms),
            lock_timeout: Duration::from_millis(self.lock_timeout_ms),
            default_owner: self.default_owner.clone(),
            debug_log: self.debug_log,
        }
    }
}
