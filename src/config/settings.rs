//! User settings for Ledgerbook
//!
//! Controls the audit writer queue, history query limits and logging.

use serde::{Deserialize, Serialize};

use super::paths::LedgerPaths;
use crate::error::LedgerError;

/// Longest daily-activity window accepted from configuration
pub const MAX_STATS_WINDOW_DAYS: i64 = 3650;

/// Change-tracking settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditSettings {
    /// When false, mutations pass through without being recorded
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Capacity of the bounded persistence queue; entries beyond it are dropped
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            queue_capacity: default_queue_capacity(),
        }
    }
}

/// History query limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuerySettings {
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,

    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,

    /// Number of days covered by the daily activity breakdown
    #[serde(default = "default_stats_window_days")]
    pub stats_window_days: i64,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            stats_window_days: default_stats_window_days(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Filter directive, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// "pretty" or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Settings for Ledgerbook
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Schema version for migration support
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    #[serde(default)]
    pub audit: AuditSettings,

    #[serde(default)]
    pub query: QuerySettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

fn default_schema_version() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_page_size() -> usize {
    20
}

fn default_max_page_size() -> usize {
    100
}

fn default_stats_window_days() -> i64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            audit: AuditSettings::default(),
            query: QuerySettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from disk, or fall back to defaults if the file doesn't exist
    pub fn load_or_create(paths: &LedgerPaths) -> Result<Self, LedgerError> {
        let settings_path = paths.settings_file();

        if !settings_path.exists() {
            return Ok(Settings::default());
        }

        let contents = std::fs::read_to_string(&settings_path)
            .map_err(|e| LedgerError::Io(format!("Failed to read settings file: {}", e)))?;

        let settings: Settings = serde_json::from_str(&contents)
            .map_err(|e| LedgerError::Config(format!("Failed to parse settings file: {}", e)))?;

        settings.validate()?;
        Ok(settings)
    }

    /// Save settings to disk
    pub fn save(&self, paths: &LedgerPaths) -> Result<(), LedgerError> {
        paths.ensure_directories()?;

        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| LedgerError::Config(format!("Failed to serialize settings: {}", e)))?;

        std::fs::write(paths.settings_file(), contents)
            .map_err(|e| LedgerError::Io(format!("Failed to write settings file: {}", e)))?;

        Ok(())
    }

    /// Reject values the writer and query layers cannot work with
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.audit.queue_capacity == 0 {
            return Err(LedgerError::Config(
                "audit.queue_capacity must be at least 1".into(),
            ));
        }
        if self.query.default_page_size == 0 || self.query.max_page_size == 0 {
            return Err(LedgerError::Config("page sizes must be at least 1".into()));
        }
        if self.query.default_page_size > self.query.max_page_size {
            return Err(LedgerError::Config(
                "query.default_page_size cannot exceed query.max_page_size".into(),
            ));
        }
        if !(1..=MAX_STATS_WINDOW_DAYS).contains(&self.query.stats_window_days) {
            return Err(LedgerError::Config(format!(
                "query.stats_window_days must be between 1 and {}",
                MAX_STATS_WINDOW_DAYS
            )));
        }
        Ok(())
    }
}
