use std::io;
use std::path::PathBuf;

use draft_engine::{ConfigError, EngineError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("{path}: {failed} line(s) failed")]
    ScriptFailed { path: PathBuf, failed: usize },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("{message}")]
    Exit { code: i32, message: String },
}

impl CliError {
    pub fn exit(code: i32, message: impl Into<String>) -> Self {
        Self::Exit {
            code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 3,
            Self::Engine(_) | Self::ScriptFailed { .. } => 1,
            Self::Io(_) => 4,
            Self::Exit { code, .. } => *code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes() {
        assert_eq!(CliError::exit(7, "seven").exit_code(), 7);
        assert_eq!(
            CliError::Engine(EngineError::MacroNotFound("m".into())).exit_code(),
            1
        );
        assert_eq!(
            CliError::Config(ConfigError::Validation(vec!["bad".into()])).exit_code(),
            3
        );
    }

    #[test]
    fn display_is_human_readable() {
        let err = CliError::ScriptFailed {
            path: PathBuf::from("a.scr"),
            failed: 2,
        };
        assert_eq!(err.to_string(), "a.scr: 2 line(s) failed");
        let err = CliError::Engine(EngineError::MacroNotFound("m".into()));
        assert_eq!(err.to_string(), "macro not found: m");
    }
}
