//! Engine configuration.
//!
//! # Responsibility
//! - Parse the JSON configuration file into [`EngineConfig`].
//! - Supply defaults for every missing field.
//!
//! # Invariants
//! - A missing configuration file yields defaults, not an error.
//! - `log_level` is validated against the levels `init_logging` accepts.

use crate::logging::{default_log_level, normalize_level};
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// How much the injection pipeline reports about its own progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verbosity {
    /// Warnings and errors only.
    Quiet,
    #[default]
    Normal,
    /// Per-kind detail on top of phase progress.
    Verbose,
}

impl Verbosity {
    pub fn normal(self) -> bool {
        self >= Self::Normal
    }

    pub fn verbose(self) -> bool {
        self == Self::Verbose
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub verbosity: Verbosity,
    pub log_level: String,
    pub log_dir: Option<PathBuf>,
    /// Target directory for appearance asset export.
    pub appearance_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            verbosity: Verbosity::default(),
            log_level: default_log_level().to_string(),
            log_dir: None,
            appearance_dir: None,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(raw).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path`; a missing file yields [`EngineConfig::default`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(raw) => Self::from_json_str(&raw),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                message: err.to_string(),
            }),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        normalize_level(&self.log_level).map_err(ConfigError::Invalid)?;
        if self
            .appearance_dir
            .as_ref()
            .is_some_and(|dir| dir.as_os_str().is_empty())
        {
            return Err(ConfigError::Invalid(
                "appearance_dir must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Io { path: PathBuf, message: String },
    Parse(String),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, message } => {
                write!(f, "failed to read config {}: {message}", path.display())
            }
            Self::Parse(message) => write!(f, "invalid config JSON: {message}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::{ConfigError, EngineConfig, Verbosity};

    #[test]
    fn empty_object_yields_defaults() {
        let config = EngineConfig::from_json_str("{}").expect("defaults");
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.verbosity, Verbosity::Normal);
    }

    #[test]
    fn fields_are_parsed() {
        let config = EngineConfig::from_json_str(
            r#"{"verbosity":"verbose","log_level":"debug","appearance_dir":"/srv/models"}"#,
        )
        .expect("config");
        assert!(config.verbosity.verbose());
        assert_eq!(config.log_level, "debug");
        assert!(config.appearance_dir.is_some());
    }

    #[test]
    fn unknown_level_and_fields_are_rejected() {
        assert!(matches!(
            EngineConfig::from_json_str(r#"{"log_level":"loud"}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            EngineConfig::from_json_str(r#"{"hot_reload":true}"#),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn quiet_is_below_normal() {
        assert!(!Verbosity::Quiet.normal());
        assert!(Verbosity::Normal.normal());
        assert!(!Verbosity::Normal.verbose());
    }
}
