#![forbid(unsafe_code)]

//! Ordered command aggregates that undo and redo as one history entry.

use std::fmt;

use tracing::{debug, warn};

use crate::command::{Command, CommandMetadata, CommandResult, ExecContext, guarded};

/// A group of commands that execute, undo, and redo together.
///
/// Members undo in strict reverse order of execution. When a member fails
/// or panics part-way through, the members already processed are rolled back
/// so the document ends where it started and the group can be retried.
pub struct CommandGroup<D> {
    /// Commands in execution order.
    commands: Vec<Box<dyn Command<D>>>,
    /// Group metadata; the name is the group name.
    metadata: CommandMetadata,
    /// Whether the members are currently applied to the document.
    executed: bool,
}

impl<D> fmt::Debug for CommandGroup<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandGroup")
            .field("name", &self.metadata.name)
            .field("commands_count", &self.commands.len())
            .field("executed", &self.executed)
            .finish()
    }
}

impl<D> CommandGroup<D> {
    /// Create a new, empty group.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            commands: Vec::new(),
            metadata: CommandMetadata::new(name),
            executed: false,
        }
    }

    /// Add a command that has not run yet; it runs when the group executes.
    pub fn push(&mut self, cmd: Box<dyn Command<D>>) {
        self.commands.push(cmd);
    }

    /// Add a command that has already been executed against the document.
    pub fn push_executed(&mut self, cmd: Box<dyn Command<D>>) {
        self.commands.push(cmd);
        self.executed = true;
    }

    /// Group name.
    #[must_use]
    pub fn group_name(&self) -> &str {
        &self.metadata.name
    }

    /// Number of commands in the group.
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Check if the group is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Whether the members are currently applied.
    #[must_use]
    pub fn is_executed(&self) -> bool {
        self.executed
    }

    /// Drop every member without touching the document.
    pub fn clear(&mut self) {
        self.commands.clear();
        self.executed = false;
    }

    /// Undo members `0..end` in reverse, logging rather than returning errors.
    fn roll_back(&mut self, doc: &mut D, end: usize) {
        for cmd in self.commands[..end].iter_mut().rev() {
            if let Err(e) = guarded(|| cmd.undo(doc)) {
                warn!(group = %self.metadata.name, command = cmd.name(), error = %e, "rollback step failed");
            }
        }
    }

    /// Redo members `start..` in order, logging rather than returning errors.
    fn roll_forward(&mut self, doc: &mut D, start: usize, ctx: &ExecContext) {
        for cmd in self.commands[start..].iter_mut() {
            if let Err(e) = guarded(|| cmd.redo(doc, ctx)) {
                warn!(group = %self.metadata.name, command = cmd.name(), error = %e, "roll-forward step failed");
            }
        }
    }
}

impl<D> Command<D> for CommandGroup<D> {
    fn execute(&mut self, doc: &mut D, ctx: &ExecContext) -> CommandResult {
        debug!(group = %self.metadata.name, commands = self.commands.len(), "executing command group");
        for i in 0..self.commands.len() {
            if let Err(e) = guarded(|| self.commands[i].execute(doc, ctx)) {
                self.roll_back(doc, i);
                return Err(e);
            }
        }
        self.executed = true;
        Ok(())
    }

    fn undo(&mut self, doc: &mut D) -> CommandResult {
        debug!(group = %self.metadata.name, "undoing command group");
        for i in (0..self.commands.len()).rev() {
            if let Err(e) = guarded(|| self.commands[i].undo(doc)) {
                // Re-apply what was already undone so the group stays executed.
                self.roll_forward(doc, i + 1, &ExecContext::detached());
                return Err(e);
            }
        }
        self.executed = false;
        Ok(())
    }

    fn redo(&mut self, doc: &mut D, ctx: &ExecContext) -> CommandResult {
        debug!(group = %self.metadata.name, "redoing command group");
        for i in 0..self.commands.len() {
            if let Err(e) = guarded(|| self.commands[i].redo(doc, ctx)) {
                self.roll_back(doc, i);
                return Err(e);
            }
        }
        self.executed = true;
        Ok(())
    }

    fn metadata(&self) -> &CommandMetadata {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut CommandMetadata {
        &mut self.metadata
    }

    fn description(&self) -> String {
        format!("{} ({} commands)", self.metadata.name, self.commands.len())
    }

    fn can_undo(&self) -> bool {
        self.commands.iter().all(|c| c.can_undo())
    }

    fn can_redo(&self) -> bool {
        self.commands.iter().all(|c| c.can_redo())
    }

    fn debug_name(&self) -> &'static str {
        "CommandGroup"
    }
}
