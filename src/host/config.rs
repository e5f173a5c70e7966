// Configuration module for the draw wheel

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use super::hotkey::KeyBindings;
use crate::core::rate_schedule::TimingsError;
use crate::core::session::DrawSettings;
use crate::core::types::ParticipantTable;

// =============================================================================
// CONFIGURATION STRUCTURES
// =============================================================================

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Write logs to stdout
    #[serde(default)]
    pub console: bool,
    /// Log file path (relative to the config directory or absolute). Empty = no file logging.
    #[serde(default)]
    pub log_file: String,
    /// Default filter directive; RUST_LOG overrides it
    #[serde(default = "default_filter")]
    pub filter: String,
}

fn default_filter() -> String {
    "info".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            console: false,
            log_file: String::new(),
            filter: default_filter(),
        }
    }
}

/// Participant table settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSettings {
    /// Header names tried, in order, as the display column
    #[serde(default = "default_preferred_display_columns")]
    pub preferred_display_columns: Vec<String>,
}

fn default_preferred_display_columns() -> Vec<String> {
    vec!["Full Name".to_string(), "Name".to_string()]
}

impl Default for TableSettings {
    fn default() -> Self {
        Self {
            preferred_display_columns: default_preferred_display_columns(),
        }
    }
}

impl TableSettings {
    /// Display column for `table`: the first preferred header present,
    /// else the table's first column
    pub fn display_column_for(&self, table: &ParticipantTable) -> Option<String> {
        table
            .resolve_column(&self.preferred_display_columns)
            .map(str::to_string)
            .or_else(|| table.headers().first().cloned())
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingSettings,
    #[serde(default)]
    pub table: TableSettings,
    #[serde(default)]
    pub draw: DrawSettings,
    #[serde(default)]
    pub keybindings: KeyBindings,
}

// =============================================================================
// CONFIG LOADING
// =============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
    #[error("Invalid draw.timings: {0}")]
    Timings(#[from] TimingsError),
}

impl Config {
    pub const CONFIG_FILENAME: &'static str = "draw_wheel.toml";

    /// Load configuration from `dir`, falling back to defaults when the
    /// file does not exist
    pub fn load(dir: &Path) -> Result<Self, ConfigError> {
        let config_path = dir.join(Self::CONFIG_FILENAME);

        debug!(
            path = %config_path.display(),
            "[config] Looking for config"
        );

        if !config_path.exists() {
            debug!("[config] No config found, using defaults");
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(&config_path)?;
        let config = Self::from_toml_str(&contents)?;
        info!(
            path = %config_path.display(),
            prizes = config.draw.prizes.len(),
            "[config] Loaded config"
        );
        Ok(config)
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(reserved) = &self.draw.reserved {
            if reserved.name.is_empty() {
                return Err(ConfigError::Invalid(
                    "draw.reserved.name must not be empty".to_string(),
                ));
            }
            if !self.draw.prizes.contains(&reserved.prize) {
                return Err(ConfigError::Invalid(format!(
                    "draw.reserved.prize {:?} is not listed in draw.prizes",
                    reserved.prize
                )));
            }
        }
        self.draw.timings.validate()?;
        Ok(())
    }

    /// Resolved log file path, or None when file logging is off
    pub fn log_file_path(&self, base_dir: &Path) -> Option<PathBuf> {
        if self.logging.log_file.is_empty() {
            return None;
        }
        let path = PathBuf::from(&self.logging.log_file);
        Some(if path.is_absolute() {
            path
        } else {
            base_dir.join(path)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rate_schedule::PatternChoice;
    use crate::core::types::Prize;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert!(!config.logging.console);
        assert_eq!(config.logging.filter, "info");
        assert!(config.draw.prizes.is_empty());
        assert_eq!(config.draw.pattern, PatternChoice::Auto);
        assert_eq!(config.draw.timings.stop_threshold_ms, 500);
        assert_eq!(config.keybindings.accept.name(), "enter");
    }

    #[test]
    fn test_full_config() {
        let config = Config::from_toml_str(
            r#"
            [logging]
            console = true
            log_file = "draw.log"

            [table]
            preferred_display_columns = ["Nickname"]

            [draw]
            prizes = ["grand", "second", "third"]
            pattern = "bounce"

            [draw.reserved]
            name = "Dana"
            prize = "third"

            [draw.timings]
            settle_ms = 100

            [keybindings]
            skip = "x"
            "#,
        )
        .unwrap();
        assert!(config.logging.console);
        assert_eq!(config.draw.prizes, vec![Prize::Grand, Prize::Second, Prize::Third]);
        assert_eq!(config.draw.pattern, PatternChoice::Bounce);
        let reserved = config.draw.reserved.as_ref().unwrap();
        assert_eq!(reserved.name, "Dana");
        assert_eq!(reserved.prize, Prize::Third);
        assert_eq!(config.draw.timings.settle_ms, 100);
        assert_eq!(config.draw.timings.normal_start_ms, 50);
        assert_eq!(config.keybindings.skip.name(), "x");
        assert_eq!(config.table.preferred_display_columns, vec!["Nickname"]);
    }

    #[test]
    fn test_reserved_prize_must_be_listed() {
        let err = Config::from_toml_str(
            r#"
            [draw]
            prizes = ["grand"]
            [draw.reserved]
            name = "Dana"
            prize = "second"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_bad_timings_rejected() {
        let err = Config::from_toml_str("[draw.timings]\ngrowth_factor = 0.9").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Timings(TimingsError::GrowthFactor { .. })
        ));
        assert!(err.to_string().contains("growth_factor"));

        let err = Config::from_toml_str("[draw.timings]\ngrowth_factor = 1e30").unwrap_err();
        assert!(matches!(err, ConfigError::Timings(_)));
        let err =
            Config::from_toml_str("[draw.timings]\nstop_threshold_ms = 86400000").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Timings(TimingsError::StopThreshold { .. })
        ));
    }

    #[test]
    fn test_unknown_prize_is_parse_error() {
        let err = Config::from_toml_str("[draw]\nprizes = [\"fourth\"]").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_log_file_path() {
        let mut config = Config::default();
        assert_eq!(config.log_file_path(Path::new("/base")), None);
        config.logging.log_file = "logs/draw.log".to_string();
        assert_eq!(
            config.log_file_path(Path::new("/base")),
            Some(PathBuf::from("/base/logs/draw.log"))
        );
    }

    #[test]
    fn test_display_column_resolution() {
        let settings = TableSettings::default();
        let table = ParticipantTable::from_records(
            vec!["Email".to_string(), "Name".to_string()],
            vec![vec!["a@x".to_string(), "Ann".to_string()]],
        )
        .unwrap();
        assert_eq!(settings.display_column_for(&table), Some("Name".to_string()));

        let table = ParticipantTable::from_records(
            vec!["Email".to_string()],
            vec![vec!["a@x".to_string()]],
        )
        .unwrap();
        assert_eq!(settings.display_column_for(&table), Some("Email".to_string()));
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = std::env::temp_dir().join("draw_wheel_config_missing");
        let config = Config::load(&dir).unwrap();
        assert!(config.draw.prizes.is_empty());
    }

    #[test]
    fn test_load_from_directory() {
        let dir = std::env::temp_dir().join(format!("draw_wheel_config_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(Config::CONFIG_FILENAME), "[draw]\nprizes = [\"grand\"]").unwrap();
        let config = Config::load(&dir).unwrap();
        assert_eq!(config.draw.prizes, vec![Prize::Grand]);
        let _ = fs::remove_dir_all(&dir);
    }
}
