#![forbid(unsafe_code)]

//! Engine-level error taxonomy.
//!
//! Every failure the engine can hit while dispatching, undoing, grouping, or
//! replaying is one of these variants. None of them escape as a panic: the
//! engine reports them through [`EngineEvent::CommandFailed`] (errors) or a
//! `tracing` warning (soft warnings) and hands them back as a `Result`.
//!
//! [`EngineEvent::CommandFailed`]: crate::EngineEvent::CommandFailed

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::command::CommandError;

/// Convenience alias for engine results.
pub type EngineResult<T = ()> = std::result::Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    /// The input line held no tokens.
    #[error("empty command line")]
    ParseEmpty,

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// The factory rejected its arguments or panicked.
    #[error("failed to create command '{name}': {source}")]
    ConstructionFailed {
        name: String,
        #[source]
        source: CommandError,
    },

    #[error("command '{name}' failed: {source}")]
    ExecutionFailed {
        name: String,
        #[source]
        source: CommandError,
    },

    #[error("undo of '{name}' failed: {source}")]
    UndoFailed {
        name: String,
        #[source]
        source: CommandError,
    },

    #[error("redo of '{name}' failed: {source}")]
    RedoFailed {
        name: String,
        #[source]
        source: CommandError,
    },

    #[error("nothing to undo")]
    NothingToUndo,

    #[error("nothing to redo")]
    NothingToRedo,

    #[error("no previous command to repeat")]
    NothingToRepeat,

    #[error("no command group is open")]
    NotGrouping,

    /// A group was opened while another one was still open.
    #[error("command group '{0}' was still open and has been ended")]
    AlreadyGrouping(String),

    #[error("not recording a macro")]
    NotRecording,

    #[error("macro not found: {0}")]
    MacroNotFound(String),

    #[error("invalid macro name '{0}'")]
    InvalidMacroName(String),

    #[error("failed to read script {path}: {source}")]
    ScriptRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl EngineError {
    /// Soft warnings are logged but never surfaced as a failure event.
    #[must_use]
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            Self::ParseEmpty
                | Self::NothingToUndo
                | Self::NothingToRedo
                | Self::NothingToRepeat
                | Self::NotGrouping
                | Self::AlreadyGrouping(_)
                | Self::NotRecording
        )
    }

    /// The underlying command error, when there is one.
    #[must_use]
    pub fn command_error(&self) -> Option<&CommandError> {
        match self {
            Self::ConstructionFailed { source, .. }
            | Self::ExecutionFailed { source, .. }
            | Self::UndoFailed { source, .. }
            | Self::RedoFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}
