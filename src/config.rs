//src/config.rs
use comfy_table::Color;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use strum_macros::EnumString;
use thiserror::Error;
use tracing::warn;

use crate::calories::DEFAULT_CALORIES_PER_MINUTE;
use crate::storage::DEFAULT_HISTORY_LIMIT;

const CONFIG_FILE_NAME: &str = "config.toml";
const APP_CONFIG_DIR: &str = "workout-session";
const CONFIG_ENV_VAR: &str = "WORKOUT_SESSION_CONFIG_DIR"; // Environment variable name

#[derive(Error, Debug)]
pub enum Error {
    #[error("Could not determine configuration directory.")]
    CannotDetermineConfigDir,
    #[error("I/O error accessing config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file (TOML): {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Failed to serialize config data (TOML): {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("Invalid color name: {0}")]
    InvalidColor(String),
    #[error("History limit must be at least 1.")]
    InvalidHistoryLimit,
    #[error("Calories per minute must be a positive number, got {0}.")]
    InvalidCalorieRate(f64),
}

// Table colours the CLI understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum StandardColor {
    Black,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
    DarkGrey,
    DarkRed,
    DarkGreen,
    DarkYellow,
    DarkBlue,
    DarkMagenta,
    DarkCyan,
    Grey,
}

impl From<StandardColor> for Color {
    fn from(value: StandardColor) -> Self {
        match value {
            StandardColor::Black => Self::Black,
            StandardColor::Red => Self::Red,
            StandardColor::Green => Self::Green,
            StandardColor::Yellow => Self::Yellow,
            StandardColor::Blue => Self::Blue,
            StandardColor::Magenta => Self::Magenta,
            StandardColor::Cyan => Self::Cyan,
            StandardColor::White => Self::White,
            StandardColor::DarkGrey => Self::DarkGrey,
            StandardColor::DarkRed => Self::DarkRed,
            StandardColor::DarkGreen => Self::DarkGreen,
            StandardColor::DarkYellow => Self::DarkYellow,
            StandardColor::DarkBlue => Self::DarkBlue,
            StandardColor::DarkMagenta => Self::DarkMagenta,
            StandardColor::DarkCyan => Self::DarkCyan,
            StandardColor::Grey => Self::Grey,
        }
    }
}

pub fn parse_color(color_str: &str) -> Result<StandardColor, Error> {
    StandardColor::from_str(color_str.trim()).map_err(|_| Error::InvalidColor(color_str.to_string()))
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Theme {
    pub header_color: String,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            header_color: "Green".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)] // Missing fields take their defaults
pub struct Config {
    /// Completed workouts kept in history; older ones are dropped.
    pub history_limit: usize,
    /// Base rate of the calorie estimate.
    pub calories_per_minute: f64,
    /// Default tracing filter when `RUST_LOG` is not set.
    pub log_level: String,
    pub theme: Theme,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            calories_per_minute: DEFAULT_CALORIES_PER_MINUTE,
            log_level: "warn".to_string(),
            theme: Theme::default(),
        }
    }
}

impl Config {
    /// Rejects values the service cannot work with.
    pub fn validate(&self) -> Result<(), Error> {
        if self.history_limit == 0 {
            return Err(Error::InvalidHistoryLimit);
        }
        if !(self.calories_per_minute.is_finite() && self.calories_per_minute > 0.0) {
            return Err(Error::InvalidCalorieRate(self.calories_per_minute));
        }
        Ok(())
    }

    /// Replaces values `validate` would reject with their defaults.
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        if self.history_limit == 0 {
            self.history_limit = DEFAULT_HISTORY_LIMIT;
        }
        if !(self.calories_per_minute.is_finite() && self.calories_per_minute > 0.0) {
            self.calories_per_minute = DEFAULT_CALORIES_PER_MINUTE;
        }
        self
    }
}

/// Determines the path to the configuration file.
/// Exposed at crate root as `get_config_path_util`
pub fn get_config_path() -> Result<PathBuf, Error> {
    let config_dir_override = std::env::var(CONFIG_ENV_VAR).ok();

    let config_dir_path = if let Some(path_str) = config_dir_override {
        let path = PathBuf::from(path_str);
        if !path.is_dir() {
            warn!(
                env = CONFIG_ENV_VAR,
                path = %path.display(),
                "Config directory override is not a directory, creating it"
            );
            fs::create_dir_all(&path)?;
        }
        path
    } else {
        let base_config_dir = dirs::config_dir().ok_or(Error::CannotDetermineConfigDir)?;
        base_config_dir.join(APP_CONFIG_DIR)
    };

    if !config_dir_path.exists() {
        fs::create_dir_all(&config_dir_path)?;
    }

    Ok(config_dir_path.join(CONFIG_FILE_NAME))
}

/// Loads the configuration, writing the defaults first if the file is missing.
/// Exposed at crate root as `load_config_util`
pub fn load(config_path: &Path) -> Result<Config, Error> {
    if config_path.exists() {
        let config_content = fs::read_to_string(config_path)?;
        let config: Config = toml::from_str(&config_content).map_err(Error::TomlParse)?;
        config.validate()?;
        Ok(config)
    } else {
        let default_config = Config::default();
        save(config_path, &default_config)?;
        Ok(default_config)
    }
}

/// Saves the configuration to the TOML file.
/// Exposed at crate root as `save_config_util`
pub fn save(config_path: &Path, config: &Config) -> Result<(), Error> {
    if let Some(parent_dir) = config_path.parent() {
        if !parent_dir.exists() {
            fs::create_dir_all(parent_dir)?;
        }
    }
    let config_content = toml::to_string_pretty(config).map_err(Error::TomlSerialize)?;
    fs::write(config_path, config_content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitized_replaces_only_invalid_values() {
        let config = Config {
            history_limit: 0,
            calories_per_minute: f64::NAN,
            log_level: "debug".to_string(),
            ..Config::default()
        }
        .sanitized();
        assert!(config.validate().is_ok());
        assert_eq!(config.history_limit, DEFAULT_HISTORY_LIMIT);
        assert_eq!(config.log_level, "debug");

        let valid = Config {
            history_limit: 7,
            calories_per_minute: 12.5,
            ..Config::default()
        };
        assert_eq!(valid.clone().sanitized(), valid);
    }

    #[test]
    fn missing_file_writes_defaults() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);
        let config = load(&path)?;
        assert_eq!(config, Config::default());
        assert!(path.exists());
        Ok(())
    }

    #[test]
    fn partial_file_fills_defaults() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "history_limit = 10\n[theme]\nheader_color = \"cyan\"\n")?;
        let config = load(&path)?;
        assert_eq!(config.history_limit, 10);
        assert_eq!(config.calories_per_minute, DEFAULT_CALORIES_PER_MINUTE);
        assert_eq!(parse_color(&config.theme.header_color)?, StandardColor::Cyan);
        Ok(())
    }

    #[test]
    fn invalid_values_rejected() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "history_limit = 0\n")?;
        assert!(matches!(load(&path), Err(Error::InvalidHistoryLimit)));
        assert!(matches!(parse_color("mauve"), Err(Error::InvalidColor(_))));
        Ok(())
    }
}
