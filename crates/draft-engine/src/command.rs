#![forbid(unsafe_code)]

//! Reversible command infrastructure.
//!
//! This module provides the [`Command`] trait for reversible operations on a
//! document of type `D`, the metadata every command carries, and
//! [`FnCommand`], the closure-backed atomic command that registered factories
//! usually return.
//!
//! # Invariants
//!
//! - `execute()` followed by `undo()` restores the prior document state
//! - `undo()` followed by `redo()` restores the executed state
//! - A command whose `can_undo()` is false is never recorded in history
//!
//! # Failure Modes
//!
//! - **Bad arguments**: factories reject them before a command exists
//! - **State drift**: the document changed underneath a recorded command;
//!   `undo()` reports [`CommandError::InvalidState`] and history is left as is
//! - **Panics**: caught at the engine boundary and reported as
//!   [`CommandError::Panicked`]

use std::any::Any;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};

use thiserror::Error;
use web_time::Instant;

use crate::cancellation::CancelToken;

/// Source of a command - who/what triggered it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommandSource {
    /// Typed or clicked by the user.
    #[default]
    User,
    /// Built and executed directly by application code.
    Programmatic,
    /// Replayed from a recorded macro.
    Macro,
    /// Read from a script.
    Script,
}

/// Metadata attached to every command for tracing and history display.
#[derive(Debug, Clone)]
pub struct CommandMetadata {
    /// Canonical command name (e.g., "line").
    pub name: String,
    /// Human-readable description for history listings.
    pub description: String,
    /// When the command was created.
    pub timestamp: Instant,
    /// Who/what triggered the command.
    pub source: CommandSource,
}

impl CommandMetadata {
    /// Create new metadata; the description defaults to the name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            description: name.clone(),
            name,
            timestamp: Instant::now(),
            source: CommandSource::User,
        }
    }

    /// Set the description shown in history listings.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the command source.
    #[must_use]
    pub fn with_source(mut self, source: CommandSource) -> Self {
        self.source = source;
        self
    }
}

/// Result of command execution, undo, or redo.
pub type CommandResult = Result<(), CommandError>;

/// Errors raised by individual commands and their factories.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// An argument could not be interpreted.
    #[error("invalid argument '{name}': {reason}")]
    InvalidArgument { name: String, reason: String },
    /// A required argument was not supplied.
    #[error("missing argument: {0}")]
    MissingArgument(String),
    /// The command cannot run against the document in its current state.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// The command observed a cancellation request and stopped.
    #[error("cancelled")]
    Cancelled,
    /// The command or its factory panicked.
    #[error("panicked: {0}")]
    Panicked(String),
    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}

impl CommandError {
    /// Create an invalid argument error.
    pub fn invalid_arg(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a generic error.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

/// Per-invocation context handed to `execute` and `redo`.
///
/// Long-running commands poll [`is_cancelled`](Self::is_cancelled) to honor
/// a cooperative cancellation request from the surrounding UI.
#[derive(Debug, Clone)]
pub struct ExecContext {
    token: CancelToken,
    source: CommandSource,
}

impl ExecContext {
    pub(crate) fn new(token: CancelToken, source: CommandSource) -> Self {
        Self { token, source }
    }

    /// A context that is never cancelled. Handy for driving commands by hand.
    #[must_use]
    pub fn detached() -> Self {
        Self {
            token: CancelToken::never(),
            source: CommandSource::Programmatic,
        }
    }

    /// Returns `true` if cancellation of the running command was requested.
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// `Err(CommandError::Cancelled)` once cancellation was requested.
    pub fn check_cancelled(&self) -> CommandResult {
        if self.is_cancelled() {
            Err(CommandError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// The cancellation token itself, for commands that block on it.
    #[must_use]
    pub fn token(&self) -> &CancelToken {
        &self.token
    }

    /// Where the running command came from.
    #[must_use]
    pub fn source(&self) -> CommandSource {
        self.source
    }
}

/// A reversible unit of work against a document of type `D`.
///
/// Commands are owned by exactly one place at a time: the engine while
/// executing, then the undo stack, the redo stack, or an open group.
pub trait Command<D>: Send {
    /// Execute the command, applying its effect.
    fn execute(&mut self, doc: &mut D, ctx: &ExecContext) -> CommandResult;

    /// Undo the command, reverting its effect.
    fn undo(&mut self, doc: &mut D) -> CommandResult;

    /// Redo the command after it was undone.
    fn redo(&mut self, doc: &mut D, ctx: &ExecContext) -> CommandResult {
        self.execute(doc, ctx)
    }

    /// Get the command metadata.
    fn metadata(&self) -> &CommandMetadata;

    /// Mutable access to the metadata; the engine stamps the source.
    fn metadata_mut(&mut self) -> &mut CommandMetadata;

    /// Canonical command name.
    fn name(&self) -> &str {
        &self.metadata().name
    }

    /// Human-readable description for history listings.
    fn description(&self) -> String {
        self.metadata().description.clone()
    }

    /// Whether the command can be reverted. Fire-and-forget actions return
    /// false and never enter history.
    fn can_undo(&self) -> bool {
        true
    }

    /// Whether the command can be re-applied after an undo.
    fn can_redo(&self) -> bool {
        true
    }

    /// Debug description of the command.
    fn debug_name(&self) -> &'static str {
        "Command"
    }
}

impl<D> fmt::Debug for dyn Command<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(self.debug_name())
            .field("name", &self.name())
            .field("description", &self.description())
            .field("can_undo", &self.can_undo())
            .finish()
    }
}

// ============================================================================
// Closure-backed atomic command
// ============================================================================

/// Callback type for applying an effect.
pub type ApplyFn<D> = Box<dyn FnMut(&mut D, &ExecContext) -> CommandResult + Send>;
/// Callback type for reverting an effect.
pub type RevertFn<D> = Box<dyn FnMut(&mut D) -> CommandResult + Send>;

/// An atomic command whose effect is supplied as closures.
///
/// Without an undo callback the command is fire-and-forget: it runs but is
/// never recorded in history.
pub struct FnCommand<D> {
    metadata: CommandMetadata,
    apply: ApplyFn<D>,
    revert: Option<RevertFn<D>>,
    reapply: Option<ApplyFn<D>>,
}

impl<D> fmt::Debug for FnCommand<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCommand")
            .field("metadata", &self.metadata)
            .field("has_revert", &self.revert.is_some())
            .field("has_reapply", &self.reapply.is_some())
            .finish()
    }
}

impl<D> FnCommand<D> {
    /// Create a command named `name` that applies `apply` on execute.
    pub fn new<F>(name: impl Into<String>, apply: F) -> Self
    where
        F: FnMut(&mut D, &ExecContext) -> CommandResult + Send + 'static,
    {
        Self {
            metadata: CommandMetadata::new(name),
            apply: Box::new(apply),
            revert: None,
            reapply: None,
        }
    }

    /// Set the description shown in history listings.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.metadata.description = description.into();
        self
    }

    /// Set the undo callback.
    #[must_use]
    pub fn with_undo<F>(mut self, f: F) -> Self
    where
        F: FnMut(&mut D) -> CommandResult + Send + 'static,
    {
        self.revert = Some(Box::new(f));
        self
    }

    /// Set a dedicated redo callback. Without one, redo re-runs execute.
    #[must_use]
    pub fn with_redo<F>(mut self, f: F) -> Self
    where
        F: FnMut(&mut D, &ExecContext) -> CommandResult + Send + 'static,
    {
        self.reapply = Some(Box::new(f));
        self
    }
}

impl<D> Command<D> for FnCommand<D> {
    fn execute(&mut self, doc: &mut D, ctx: &ExecContext) -> CommandResult {
        (self.apply)(doc, ctx)
    }

    fn undo(&mut self, doc: &mut D) -> CommandResult {
        match self.revert.as_mut() {
            Some(revert) => revert(doc),
            None => Err(CommandError::InvalidState(format!(
                "'{}' cannot be undone",
                self.metadata.name
            ))),
        }
    }

    fn redo(&mut self, doc: &mut D, ctx: &ExecContext) -> CommandResult {
        match self.reapply.as_mut() {
            Some(reapply) => reapply(doc, ctx),
            None => (self.apply)(doc, ctx),
        }
    }

    fn metadata(&self) -> &CommandMetadata {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut CommandMetadata {
        &mut self.metadata
    }

    fn can_undo(&self) -> bool {
        self.revert.is_some()
    }

    fn debug_name(&self) -> &'static str {
        "FnCommand"
    }
}

// ============================================================================
// Panic boundary
// ============================================================================

/// Run `f`, converting a panic into [`CommandError::Panicked`].
pub(crate) fn guarded<T>(f: impl FnOnce() -> Result<T, CommandError>) -> Result<T, CommandError> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(CommandError::Panicked(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
