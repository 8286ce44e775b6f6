#![forbid(unsafe_code)]

//! The per-document command engine.
//!
//! [`Engine`] owns the document, the command registry, the undo/redo
//! history, the open command group, and the macro state. Everything that
//! mutates the document goes through it.
//!
//! # State machine
//!
//! ```text
//!            begin_group              end_group
//!   Idle ─────────────────► Grouping ─────────► Idle
//!    │  ▲                      │  ▲
//!    │  │ finish               │  │ finish
//!    ▼  │                      ▼  │
//!  Executing              Executing (result joins the group)
//! ```
//!
//! Executing is only observable from outside through a [`CancelHandle`].
//!
//! # Failure Modes
//!
//! - A failed `execute` leaves both stacks untouched.
//! - A failed `undo`/`redo` leaves the command on the stack it came from.
//! - Panics in commands and factories are caught and reported as failures.

use std::fmt;

use tracing::{debug, info, warn};

use crate::cancellation::CancelHandle;
use crate::command::{Command, CommandError, CommandSource, ExecContext, guarded};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::events::{EngineEvent, Observers, SubscriberId};
use crate::group::CommandGroup;
use crate::history::{HistoryConfig, HistoryManager, HistoryStep};
use crate::macros::{MacroStore, Recording};
use crate::registry::CommandRegistry;

/// Command engine for one open document of type `D`.
pub struct Engine<D> {
    pub(crate) document: D,
    pub(crate) registry: CommandRegistry<D>,
    pub(crate) history: HistoryManager<D>,
    pub(crate) current_group: Option<CommandGroup<D>>,
    pub(crate) recorder: Option<Recording>,
    pub(crate) macros: MacroStore,
    pub(crate) last_command: Option<String>,
    pub(crate) cancel: CancelHandle,
    pub(crate) observers: Observers,
    pub(crate) echo: bool,
    /// Source stamped on commands executed right now.
    pub(crate) source: CommandSource,
    /// Last announced (can_undo, can_redo).
    availability: (bool, bool),
}

impl<D> fmt::Debug for Engine<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("registry", &self.registry)
            .field("history", &self.history)
            .field("current_group", &self.current_group)
            .field("recording", &self.recorder.as_ref().map(Recording::name))
            .field("last_command", &self.last_command)
            .field("echo", &self.echo)
            .field("observers", &self.observers)
            .finish_non_exhaustive()
    }
}

impl<D: 'static> Engine<D> {
    /// Create an engine with default settings around `document`.
    pub fn new(document: D) -> Self {
        Self::with_config(document, &EngineConfig::default())
    }

    /// Create an engine configured by `config`.
    pub fn with_config(document: D, config: &EngineConfig) -> Self {
        Self {
            document,
            registry: CommandRegistry::new(),
            history: HistoryManager::new(HistoryConfig::new(config.undo_limit)),
            current_group: None,
            recorder: None,
            macros: MacroStore::new(config.macro_dir.clone()),
            last_command: None,
            cancel: CancelHandle::new(),
            observers: Observers::default(),
            echo: config.echo,
            source: CommandSource::User,
            availability: (false, false),
        }
    }

    // ========================================================================
    // Document
    // ========================================================================

    pub fn document(&self) -> &D {
        &self.document
    }

    /// Mutable access that bypasses history. Recorded commands may stop
    /// matching the document if it is edited this way.
    pub fn document_mut(&mut self) -> &mut D {
        &mut self.document
    }

    pub fn into_document(self) -> D {
        self.document
    }

    // ========================================================================
    // Registry
    // ========================================================================

    pub fn registry(&self) -> &CommandRegistry<D> {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut CommandRegistry<D> {
        &mut self.registry
    }

    /// Register a command factory. See [`CommandRegistry::register`].
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&[String]) -> Result<Box<dyn Command<D>>, CommandError> + Send + Sync + 'static,
    {
        self.registry.register(name, factory);
    }

    pub fn register_with_help<F>(&mut self, name: &str, help: &str, factory: F)
    where
        F: Fn(&[String]) -> Result<Box<dyn Command<D>>, CommandError> + Send + Sync + 'static,
    {
        self.registry.register_with_help(name, help, factory);
    }

    pub fn register_alias(&mut self, alias: &str, target: &str) {
        self.registry.register_alias(alias, target);
    }

    pub fn unregister(&mut self, name: &str) -> bool {
        self.registry.unregister(name)
    }

    pub fn unregister_alias(&mut self, alias: &str) -> bool {
        self.registry.unregister_alias(alias)
    }

    pub fn resolve(&self, name: &str) -> String {
        self.registry.resolve(name)
    }

    /// Registered command names, sorted.
    pub fn available_commands(&self) -> Vec<String> {
        self.registry.names()
    }

    pub fn completions(&self, partial: &str) -> Vec<String> {
        self.registry.completions(partial)
    }

    pub fn help(&self, name: &str) -> String {
        self.registry.help(name)
    }

    // ========================================================================
    // Execution
    // ========================================================================

    /// Execute a pre-built command and record it.
    ///
    /// Inside an open group the command joins the group; otherwise it goes
    /// onto the undo stack and the redo stack is cleared.
    pub fn execute(&mut self, cmd: Box<dyn Command<D>>) -> EngineResult {
        let input = cmd.name().to_string();
        let result = self.execute_inner(cmd);
        self.report(&input, result)
    }

    pub(crate) fn execute_inner(&mut self, mut cmd: Box<dyn Command<D>>) -> EngineResult {
        cmd.metadata_mut().source = self.source;
        let name = cmd.name().to_string();
        debug!(command = %name, source = ?self.source, "executing command");

        let ctx = ExecContext::new(self.cancel.token(), self.source);
        self.cancel.begin();
        let document = &mut self.document;
        let result = guarded(|| cmd.execute(document, &ctx));
        self.cancel.finish();

        result.map_err(|source| EngineError::ExecutionFailed { name, source })?;
        self.commit(cmd);
        Ok(())
    }

    /// Route an executed command into the open group or the history.
    fn commit(&mut self, cmd: Box<dyn Command<D>>) {
        if !cmd.can_undo() {
            debug!(command = cmd.name(), "command is not undoable; not recorded");
            return;
        }
        match self.current_group.as_mut() {
            Some(group) => group.push_executed(cmd),
            None => {
                self.history.push(cmd);
                self.notify_history();
            }
        }
    }

    /// Undo the most recent history entry.
    pub fn undo(&mut self) -> EngineResult<HistoryStep> {
        let result = self.undo_inner();
        self.report("undo", result)
    }

    pub(crate) fn undo_inner(&mut self) -> EngineResult<HistoryStep> {
        match self.history.undo(&mut self.document) {
            None => Err(EngineError::NothingToUndo),
            Some(Ok(step)) => {
                debug!(command = %step.name, "undone");
                self.notify_history();
                Ok(step)
            }
            Some(Err(failure)) => Err(EngineError::UndoFailed {
                name: failure.name,
                source: failure.error,
            }),
        }
    }

    /// Redo the most recently undone entry.
    pub fn redo(&mut self) -> EngineResult<HistoryStep> {
        let result = self.redo_inner();
        self.report("redo", result)
    }

    pub(crate) fn redo_inner(&mut self) -> EngineResult<HistoryStep> {
        let ctx = ExecContext::new(self.cancel.token(), self.source);
        self.cancel.begin();
        let outcome = self.history.redo(&mut self.document, &ctx);
        self.cancel.finish();
        match outcome {
            None => Err(EngineError::NothingToRedo),
            Some(Ok(step)) => {
                debug!(command = %step.name, "redone");
                self.notify_history();
                Ok(step)
            }
            Some(Err(failure)) => Err(EngineError::RedoFailed {
                name: failure.name,
                source: failure.error,
            }),
        }
    }

    // ========================================================================
    // Grouping
    // ========================================================================

    /// Open a command group. An already-open group is ended first.
    pub fn begin_group(&mut self, name: &str) {
        if let Some(open) = self.current_group.as_ref() {
            let err = EngineError::AlreadyGrouping(open.group_name().to_string());
            warn!(group = name, error = %err, "group opened while another was open");
            let _ = self.end_group_inner();
        }
        debug!(group = name, "begin group");
        self.current_group = Some(CommandGroup::new(name));
        self.observers.emit(&EngineEvent::GroupingChanged(true));
    }

    /// Close the open group, recording it as a single history entry.
    ///
    /// Empty groups are dropped without a history entry.
    pub fn end_group(&mut self) -> EngineResult {
        let result = self.end_group_inner();
        self.report("end group", result)
    }

    pub(crate) fn end_group_inner(&mut self) -> EngineResult {
        let group = self.current_group.take().ok_or(EngineError::NotGrouping)?;
        debug!(group = group.group_name(), commands = group.len(), "end group");
        if !group.is_empty() {
            self.commit(Box::new(group));
        }
        self.observers.emit(&EngineEvent::GroupingChanged(false));
        Ok(())
    }

    pub fn is_grouping(&self) -> bool {
        self.current_group.is_some()
    }

    pub fn current_group_name(&self) -> Option<&str> {
        self.current_group.as_ref().map(CommandGroup::group_name)
    }

    // ========================================================================
    // History
    // ========================================================================

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Undo entry descriptions, oldest first.
    pub fn undo_history(&self) -> Vec<String> {
        self.history.undo_history()
    }

    /// Redo entry descriptions, next to redo first.
    pub fn redo_history(&self) -> Vec<String> {
        self.history.redo_history()
    }

    /// Description of the entry the next undo would revert.
    pub fn next_undo_description(&self) -> Option<String> {
        self.history.next_undo_description()
    }

    /// Description of the entry the next redo would re-apply.
    pub fn next_redo_description(&self) -> Option<String> {
        self.history.next_redo_description()
    }

    pub fn undo_depth(&self) -> usize {
        self.history.undo_depth()
    }

    pub fn redo_depth(&self) -> usize {
        self.history.redo_depth()
    }

    pub fn undo_limit(&self) -> usize {
        self.history.config().max_depth
    }

    /// Set the maximum undo depth (at least 1), evicting the oldest entries.
    pub fn set_undo_limit(&mut self, limit: usize) {
        let evicted = self.history.set_max_depth(limit);
        debug!(limit = self.undo_limit(), evicted, "undo limit changed");
        if evicted > 0 {
            self.notify_history();
        }
    }

    /// Drop both stacks.
    pub fn clear_history(&mut self) {
        self.history.clear();
        self.notify_history();
    }

    /// The last successfully dispatched line, used by `repeat`.
    pub fn last_command(&self) -> Option<&str> {
        self.last_command.as_deref()
    }

    // ========================================================================
    // Echo, observers, cancellation
    // ========================================================================

    /// Enable or disable "command executed" events.
    pub fn set_command_echo(&mut self, echo: bool) {
        self.echo = echo;
    }

    pub fn command_echo(&self) -> bool {
        self.echo
    }

    /// Register an observer. It is called synchronously for every event.
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriberId
    where
        F: FnMut(&EngineEvent) + Send + 'static,
    {
        self.observers.subscribe(Box::new(callback))
    }

    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        self.observers.unsubscribe(id)
    }

    /// A handle the UI can use to cancel the running command.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Request cancellation of the command in progress. No-op when idle.
    pub fn cancel_current(&self) -> bool {
        let requested = self.cancel.cancel();
        if requested {
            info!("cancellation requested for running command");
        }
        requested
    }

    pub fn is_command_in_progress(&self) -> bool {
        self.cancel.is_in_progress()
    }

    // ========================================================================
    // Internals
    // ========================================================================

    pub(crate) fn emit(&mut self, event: EngineEvent) {
        self.observers.emit(&event);
    }

    /// Announce a history change plus any availability flips.
    pub(crate) fn notify_history(&mut self) {
        self.observers.emit(&EngineEvent::HistoryChanged);
        let now = (self.history.can_undo(), self.history.can_redo());
        if now.0 != self.availability.0 {
            self.observers.emit(&EngineEvent::UndoAvailabilityChanged(now.0));
        }
        if now.1 != self.availability.1 {
            self.observers.emit(&EngineEvent::RedoAvailabilityChanged(now.1));
        }
        self.availability = now;
    }

    /// Log warnings, publish errors, and hand the result back unchanged.
    pub(crate) fn report<T>(&mut self, input: &str, result: EngineResult<T>) -> EngineResult<T> {
        if let Err(err) = &result {
            if matches!(err, EngineError::ParseEmpty) {
                debug!(input, "empty input ignored");
            } else if err.is_warning() {
                warn!(input, error = %err, "command warning");
            } else {
                warn!(input, error = %err, "command failed");
                self.emit(EngineEvent::CommandFailed {
                    input: input.to_string(),
                    message: err.to_string(),
                });
            }
        }
        result
    }
}
