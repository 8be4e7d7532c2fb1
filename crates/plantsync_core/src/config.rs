//! Core runtime configuration.
//!
//! # Responsibility
//! - Resolve the application home, log level and rotation, and the
//!   block/route palette from the environment with stable fallbacks.
//! - Derive the data and log directory layout from the application home.
//!
//! # Invariants
//! - Blank environment values are treated as unset.
//! - The palette is never empty and holds only `#RRGGBB` colors.

use crate::logging::{LogLevel, LogRotation};
use crate::model::layout::Scale;
use crate::model::property::Color;
use crate::persistence::file_store::DATA_DIR_NAME;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub const HOME_ENV: &str = "PLANTSYNC_HOME";
pub const LOG_LEVEL_ENV: &str = "PLANTSYNC_LOG_LEVEL";
pub const LOG_MAX_BYTES_ENV: &str = "PLANTSYNC_LOG_MAX_BYTES";
pub const LOG_MAX_FILES_ENV: &str = "PLANTSYNC_LOG_MAX_FILES";
/// Comma-separated `#RRGGBB` list.
pub const PALETTE_ENV: &str = "PLANTSYNC_PALETTE";

const LOG_DIR_NAME: &str = "log";

/// Palette used for blocks and static routes without an explicit color.
pub const DEFAULT_PALETTE: [&str; 10] = [
    "#3366CC", "#DC3912", "#FF9900", "#109618", "#990099", "#0099C6", "#DD4477", "#66AA00",
    "#B82E2E", "#316395",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidLogLevel(String),
    /// A numeric variable that is not a positive integer.
    InvalidNumber {
        name: &'static str,
        value: String,
    },
    InvalidPaletteEntry(String),
    EmptyPalette,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidLogLevel(value) => write!(
                f,
                "unsupported log level `{value}`; expected trace|debug|info|warn|error"
            ),
            Self::InvalidNumber { name, value } => {
                write!(f, "{name} must be a positive integer, got `{value}`")
            }
            Self::InvalidPaletteEntry(value) => {
                write!(f, "palette entry `{value}` is not a #RRGGBB color")
            }
            Self::EmptyPalette => write!(f, "palette must contain at least one color"),
        }
    }
}

impl Error for ConfigError {}

/// Resolved core configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct CoreConfig {
    pub application_home: PathBuf,
    pub log_level: LogLevel,
    pub log_rotation: LogRotation,
    pub palette: Vec<Color>,
    pub default_scale: Scale,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            application_home: current_dir_or_dot(),
            log_level: LogLevel::for_build(),
            log_rotation: LogRotation::default(),
            palette: default_palette(),
            default_scale: Scale::default(),
        }
    }
}

impl CoreConfig {
    /// Configuration rooted at `application_home` with default settings.
    pub fn with_home(application_home: impl Into<PathBuf>) -> Self {
        Self {
            application_home: application_home.into(),
            ..Self::default()
        }
    }

    /// Reads `PLANTSYNC_HOME`, `PLANTSYNC_LOG_LEVEL`, `PLANTSYNC_LOG_MAX_BYTES`,
    /// `PLANTSYNC_LOG_MAX_FILES` and `PLANTSYNC_PALETTE`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as `from_env` over an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |name: &str| {
            lookup(name)
                .map(|raw| raw.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let mut config = Self::default();
        if let Some(home) = read(HOME_ENV) {
            config.application_home = PathBuf::from(home);
        }
        if let Some(level) = read(LOG_LEVEL_ENV) {
            config.log_level =
                LogLevel::parse(&level).ok_or(ConfigError::InvalidLogLevel(level))?;
        }
        if let Some(bytes) = read(LOG_MAX_BYTES_ENV) {
            config.log_rotation.max_file_bytes = parse_positive(LOG_MAX_BYTES_ENV, bytes)?;
        }
        if let Some(files) = read(LOG_MAX_FILES_ENV) {
            config.log_rotation.max_files = parse_positive(LOG_MAX_FILES_ENV, files)?;
        }
        if let Some(palette) = read(PALETTE_ENV) {
            config.palette = parse_palette(palette.split(','))?;
        }
        Ok(config)
    }

    /// Replaces the palette; every entry must be `#RRGGBB`.
    pub fn with_palette<'a>(
        mut self,
        entries: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, ConfigError> {
        self.palette = parse_palette(entries)?;
        Ok(self)
    }

    pub fn data_dir(&self) -> PathBuf {
        self.application_home.join(DATA_DIR_NAME)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.application_home.join(LOG_DIR_NAME)
    }

    pub fn application_home(&self) -> &Path {
        &self.application_home
    }
}

pub fn default_palette() -> Vec<Color> {
    DEFAULT_PALETTE
        .iter()
        .filter_map(|entry| Color::parse_hex(entry))
        .collect()
}

fn parse_palette<'a>(entries: impl IntoIterator<Item = &'a str>) -> Result<Vec<Color>, ConfigError> {
    let palette = entries
        .into_iter()
        .map(|entry| {
            Color::parse_hex(entry)
                .ok_or_else(|| ConfigError::InvalidPaletteEntry(entry.trim().to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    if palette.is_empty() {
        return Err(ConfigError::EmptyPalette);
    }
    Ok(palette)
}

fn parse_positive<T>(name: &'static str, value: String) -> Result<T, ConfigError>
where
    T: std::str::FromStr + Default + PartialEq,
{
    match value.parse::<T>() {
        Ok(number) if number != T::default() => Ok(number),
        _ => Err(ConfigError::InvalidNumber { name, value }),
    }
}

fn current_dir_or_dot() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::{
        ConfigError, CoreConfig, DEFAULT_PALETTE, HOME_ENV, LOG_LEVEL_ENV, LOG_MAX_BYTES_ENV,
        LOG_MAX_FILES_ENV, PALETTE_ENV,
    };
    use crate::logging::{LogLevel, LogRotation};
    use crate::model::property::Color;
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let values: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |name| values.get(name).cloned()
    }

    #[test]
    fn default_palette_is_fully_valid() {
        assert_eq!(CoreConfig::default().palette.len(), DEFAULT_PALETTE.len());
    }

    #[test]
    fn env_values_override_defaults_and_blanks_are_ignored() {
        let config = CoreConfig::from_lookup(lookup_from(&[
            (HOME_ENV, " /srv/plant "),
            (LOG_LEVEL_ENV, "   "),
            (PALETTE_ENV, "#FF0000, #00ff00"),
        ]))
        .unwrap();

        assert_eq!(config.application_home, PathBuf::from("/srv/plant"));
        assert_eq!(config.data_dir(), PathBuf::from("/srv/plant/data"));
        assert_eq!(config.log_dir(), PathBuf::from("/srv/plant/log"));
        assert_eq!(config.log_level, LogLevel::for_build());
        assert_eq!(config.log_rotation, LogRotation::default());
        assert_eq!(
            config.palette,
            vec![Color::rgb(255, 0, 0), Color::rgb(0, 255, 0)]
        );
    }

    #[test]
    fn invalid_palette_entry_is_rejected() {
        let err = CoreConfig::from_lookup(lookup_from(&[(PALETTE_ENV, "#FF0000,red")]))
            .unwrap_err();
        assert_eq!(err, ConfigError::InvalidPaletteEntry("red".to_string()));

        let err = CoreConfig::default()
            .with_palette(Vec::<&str>::new())
            .unwrap_err();
        assert_eq!(err, ConfigError::EmptyPalette);
    }

    #[test]
    fn log_level_and_rotation_come_from_env() {
        let config = CoreConfig::from_lookup(lookup_from(&[
            (LOG_LEVEL_ENV, "WARNING"),
            (LOG_MAX_BYTES_ENV, "65536"),
            (LOG_MAX_FILES_ENV, " 3 "),
        ]))
        .unwrap();

        assert_eq!(config.log_level, LogLevel::Warn);
        assert_eq!(
            config.log_rotation,
            LogRotation {
                max_file_bytes: 65536,
                max_files: 3,
            }
        );
    }

    #[test]
    fn invalid_log_settings_are_rejected() {
        let err = CoreConfig::from_lookup(lookup_from(&[(LOG_LEVEL_ENV, "verbose")])).unwrap_err();
        assert_eq!(err, ConfigError::InvalidLogLevel("verbose".to_string()));

        for (name, value) in [(LOG_MAX_BYTES_ENV, "0"), (LOG_MAX_FILES_ENV, "many")] {
            let err = CoreConfig::from_lookup(lookup_from(&[(name, value)])).unwrap_err();
            assert_eq!(
                err,
                ConfigError::InvalidNumber {
                    name,
                    value: value.to_string(),
                }
            );
        }
    }
}
