#![forbid(unsafe_code)]

//! Engine configuration.
//!
//! [`EngineConfig`] collects the engine's tunables so they can be loaded
//! from TOML at startup instead of being set call by call.
//!
//! # Loading
//!
//! ```toml
//! # draftcmd.toml
//! undo_limit = 250
//! echo = false
//! macro_dir = "/home/me/.local/share/draftcmd/macros"
//! ```
//!
//! ```
//! use draft_engine::EngineConfig;
//!
//! let config = EngineConfig::from_toml_str("undo_limit = 250").unwrap();
//! assert_eq!(config.undo_limit, 250);
//! assert!(config.echo);
//! ```
//!
//! Every field is optional; missing fields take the [`Default`] values.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::history::{DEFAULT_UNDO_LIMIT, HistoryConfig};

/// Engine tunables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum undo depth. Values below 1 fail validation.
    pub undo_limit: usize,
    /// Emit a "command executed" event for every successful line.
    pub echo: bool,
    /// Directory for persisted macros. `None` keeps macros in memory only.
    pub macro_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            undo_limit: DEFAULT_UNDO_LIMIT,
            echo: true,
            macro_dir: None,
        }
    }
}

impl EngineConfig {
    /// Parse from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Parse from a TOML file on disk.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Parse a file and reject it unless it validates clean.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config = Self::from_toml_file(path)?;
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Serialize back to TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string(self)?)
    }

    /// Check that every value is usable.
    ///
    /// Returns a list of problems. An empty list means the config is valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.undo_limit == 0 {
            errors.push("undo_limit must be at least 1".to_string());
        }
        if let Some(dir) = &self.macro_dir {
            if dir.as_os_str().is_empty() {
                errors.push("macro_dir must not be empty".to_string());
            } else if dir.is_file() {
                errors.push(format!("macro_dir {} is a file", dir.display()));
            }
        }
        errors
    }

    /// History settings derived from this config.
    #[must_use]
    pub fn to_history_config(&self) -> HistoryConfig {
        HistoryConfig::new(self.undo_limit)
    }
}

/// Errors that can occur when loading an engine configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("validation errors: {}", .0.join("; "))]
    Validation(Vec<String>),
}
