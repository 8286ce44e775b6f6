#![forbid(unsafe_code)]

//! History stacks for undo/redo operations.
//!
//! [`HistoryManager`] maintains dual stacks of owned commands:
//!
//! - **Depth limit**: oldest commands evicted when the limit is exceeded
//! - **Branch handling**: new commands clear the redo stack
//! - **Failure safety**: a failed undo/redo puts the command back where it was
//!
//! # Invariants
//!
//! 1. `undo_stack.len() <= config.max_depth` (after any operation)
//! 2. `config.max_depth >= 1`
//! 3. Redo stack is cleared whenever a new command is pushed
//! 4. No command with `can_undo() == false` is ever on the undo stack
//!
//! ```text
//! push(cmd5)
//! ┌───────────────────────────────────────────────┐
//! │ Undo Stack: [cmd1, cmd2, cmd3, cmd4, cmd5]    │
//! │ Redo Stack: []                                 │
//! └───────────────────────────────────────────────┘
//!
//! undo() x2
//! ┌───────────────────────────────────────────────┐
//! │ Undo Stack: [cmd1, cmd2, cmd3]                │
//! │ Redo Stack: [cmd5, cmd4]                       │
//! └───────────────────────────────────────────────┘
//!
//! push(cmd6)  <-- new branch, clears redo
//! ┌───────────────────────────────────────────────┐
//! │ Undo Stack: [cmd1, cmd2, cmd3, cmd6]          │
//! │ Redo Stack: []                                 │
//! └───────────────────────────────────────────────┘
//! ```

use std::collections::VecDeque;
use std::fmt;

use crate::command::{Command, CommandError, ExecContext, guarded};

/// Default maximum undo depth.
pub const DEFAULT_UNDO_LIMIT: usize = 100;

/// Configuration for the history manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryConfig {
    /// Maximum number of commands to keep in undo history (at least 1).
    pub max_depth: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_UNDO_LIMIT,
        }
    }
}

impl HistoryConfig {
    /// Create a configuration with the given depth, clamped to at least 1.
    #[must_use]
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth: max_depth.max(1),
        }
    }
}

/// Outcome of a successful undo or redo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryStep {
    /// Name of the command that moved.
    pub name: String,
    /// Its history description.
    pub description: String,
}

/// A failed undo or redo. The command is back on the stack it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryFailure {
    /// Name of the command that failed.
    pub name: String,
    /// The command's error.
    pub error: CommandError,
}

/// Manager for undo/redo history.
pub struct HistoryManager<D> {
    /// Commands available for undo (newest at back).
    undo_stack: VecDeque<Box<dyn Command<D>>>,
    /// Commands available for redo (newest at back).
    redo_stack: VecDeque<Box<dyn Command<D>>>,
    /// Configuration for limits.
    config: HistoryConfig,
}

impl<D> fmt::Debug for HistoryManager<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HistoryManager")
            .field("undo_depth", &self.undo_stack.len())
            .field("redo_depth", &self.redo_stack.len())
            .field("config", &self.config)
            .finish()
    }
}

impl<D> Default for HistoryManager<D> {
    fn default() -> Self {
        Self::new(HistoryConfig::default())
    }
}

impl<D> HistoryManager<D> {
    /// Create a new history manager with the given configuration.
    #[must_use]
    pub fn new(config: HistoryConfig) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            config: HistoryConfig::new(config.max_depth),
        }
    }

    // ========================================================================
    // Core Operations
    // ========================================================================

    /// Push an already-executed command onto the undo stack.
    ///
    /// Clears the redo stack (new branch) and enforces the depth limit.
    /// Commands that cannot be undone are dropped; returns whether the
    /// command was recorded.
    pub fn push(&mut self, cmd: Box<dyn Command<D>>) -> bool {
        if !cmd.can_undo() {
            return false;
        }
        self.redo_stack.clear();
        self.undo_stack.push_back(cmd);
        self.enforce_limits();
        true
    }

    /// Undo the most recent command.
    ///
    /// - `None` if there is nothing to undo
    /// - `Some(Ok(step))` if the command moved to the redo stack
    /// - `Some(Err(failure))` if undo failed (command remains on undo stack)
    pub fn undo(&mut self, doc: &mut D) -> Option<Result<HistoryStep, HistoryFailure>> {
        let mut cmd = self.undo_stack.pop_back()?;
        let name = cmd.name().to_string();

        let outcome = match guarded(|| cmd.undo(doc)) {
            Ok(()) => {
                let description = cmd.description();
                self.redo_stack.push_back(cmd);
                Ok(HistoryStep { name, description })
            }
            Err(error) => {
                self.undo_stack.push_back(cmd);
                Err(HistoryFailure { name, error })
            }
        };
        self.check_invariants();
        Some(outcome)
    }

    /// Redo the most recently undone command.
    ///
    /// - `None` if there is nothing to redo
    /// - `Some(Ok(step))` if the command moved back to the undo stack
    /// - `Some(Err(failure))` if redo failed (command remains on redo stack)
    pub fn redo(
        &mut self,
        doc: &mut D,
        ctx: &ExecContext,
    ) -> Option<Result<HistoryStep, HistoryFailure>> {
        let mut cmd = self.redo_stack.pop_back()?;
        let name = cmd.name().to_string();

        let result = if cmd.can_redo() {
            guarded(|| cmd.redo(doc, ctx))
        } else {
            Err(CommandError::InvalidState(format!(
                "'{name}' cannot be redone"
            )))
        };

        let outcome = match result {
            Ok(()) => {
                let description = cmd.description();
                self.undo_stack.push_back(cmd);
                // Redo never grows history past its pre-undo depth, but the
                // limit may have shrunk while the command sat on the redo stack.
                self.enforce_limits();
                Ok(HistoryStep { name, description })
            }
            Err(error) => {
                self.redo_stack.push_back(cmd);
                Err(HistoryFailure { name, error })
            }
        };
        self.check_invariants();
        Some(outcome)
    }

    /// Check if undo is available.
    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    /// Check if redo is available.
    #[must_use]
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    // ========================================================================
    // Info
    // ========================================================================

    /// Get the undo stack depth.
    #[must_use]
    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    /// Get the redo stack depth.
    #[must_use]
    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    /// Undo descriptions, oldest first.
    pub fn undo_history(&self) -> Vec<String> {
        self.undo_stack.iter().map(|c| c.description()).collect()
    }

    /// Redo descriptions, next-to-redo first.
    pub fn redo_history(&self) -> Vec<String> {
        self.redo_stack.iter().rev().map(|c| c.description()).collect()
    }

    /// Get the description of the next undo command.
    #[must_use]
    pub fn next_undo_description(&self) -> Option<String> {
        self.undo_stack.back().map(|c| c.description())
    }

    /// Get the description of the next redo command.
    #[must_use]
    pub fn next_redo_description(&self) -> Option<String> {
        self.redo_stack.back().map(|c| c.description())
    }

    /// Get the current configuration.
    #[must_use]
    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Change the depth limit (clamped to at least 1), evicting the oldest
    /// commands as needed. Returns the number evicted.
    pub fn set_max_depth(&mut self, max_depth: usize) -> usize {
        self.config.max_depth = max_depth.max(1);
        self.enforce_limits()
    }

    /// Clear all history (both undo and redo).
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    /// Evict oldest commands until the depth limit holds.
    fn enforce_limits(&mut self) -> usize {
        let mut evicted = 0;
        while self.undo_stack.len() > self.config.max_depth {
            self.undo_stack.pop_front();
            evicted += 1;
        }
        self.check_invariants();
        evicted
    }

    fn check_invariants(&self) {
        assert!(
            self.undo_stack.len() <= self.config.max_depth,
            "undo stack depth {} exceeds limit {}",
            self.undo_stack.len(),
            self.config.max_depth
        );
        assert!(self.config.max_depth >= 1, "undo limit must be at least 1");
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::FnCommand;

    /// A pre-executed command that appended `value` to the document.
    fn make_push_cmd(value: i32) -> Box<dyn Command<Vec<i32>>> {
        Box::new(
            FnCommand::new(format!("push{value}"), move |doc: &mut Vec<i32>, _| {
                doc.push(value);
                Ok(())
            })
            .with_undo(move |doc: &mut Vec<i32>| match doc.pop() {
                Some(v) if v == value => Ok(()),
                _ => Err(CommandError::InvalidState("document drifted".into())),
            }),
        )
    }

    fn executed(doc: &mut Vec<i32>, value: i32) -> Box<dyn Command<Vec<i32>>> {
        let mut cmd = make_push_cmd(value);
        cmd.execute(doc, &ExecContext::detached())
            .expect("test command should execute");
        cmd
    }

    #[test]
    fn test_new_manager() {
        let mgr: HistoryManager<Vec<i32>> = HistoryManager::default();
        assert!(!mgr.can_undo());
        assert!(!mgr.can_redo());
        assert_eq!(mgr.undo_depth(), 0);
        assert_eq!(mgr.redo_depth(), 0);
    }

    #[test]
    fn test_push_enables_undo() {
        let mut doc = Vec::new();
        let mut mgr = HistoryManager::default();
        assert!(mgr.push(executed(&mut doc, 1)));
        assert!(mgr.can_undo());
        assert!(!mgr.can_redo());
    }

    #[test]
    fn test_push_rejects_non_undoable() {
        let mut mgr: HistoryManager<Vec<i32>> = HistoryManager::default();
        let cmd = Box::new(FnCommand::new("list", |_: &mut Vec<i32>, _| Ok(())));
        assert!(!mgr.push(cmd));
        assert_eq!(mgr.undo_depth(), 0);
    }

    #[test]
    fn test_undo_then_redo() {
        let mut doc = Vec::new();
        let mut mgr = HistoryManager::default();
        mgr.push(executed(&mut doc, 1));

        let step = mgr.undo(&mut doc).unwrap().unwrap();
        assert_eq!(step.name, "push1");
        assert!(doc.is_empty());
        assert!(mgr.can_redo());

        mgr.redo(&mut doc, &ExecContext::detached()).unwrap().unwrap();
        assert_eq!(doc, vec![1]);
        assert!(mgr.can_undo());
        assert!(!mgr.can_redo());
    }

    #[test]
    fn test_push_clears_redo() {
        let mut doc = Vec::new();
        let mut mgr = HistoryManager::default();
        mgr.push(executed(&mut doc, 1));
        mgr.undo(&mut doc);
        assert!(mgr.can_redo());

        mgr.push(executed(&mut doc, 2));
        assert!(!mgr.can_redo());
        assert_eq!(mgr.redo_depth(), 0);
    }

    #[test]
    fn test_failed_undo_keeps_command() {
        let mut doc = Vec::new();
        let mut mgr = HistoryManager::default();
        mgr.push(executed(&mut doc, 1));
        doc.push(99); // drift

        let failure = mgr.undo(&mut doc).unwrap().unwrap_err();
        assert_eq!(failure.name, "push1");
        assert_eq!(mgr.undo_depth(), 1);
        assert_eq!(mgr.redo_depth(), 0);
    }

    #[test]
    fn test_panicking_undo_is_contained() {
        let mut mgr: HistoryManager<Vec<i32>> = HistoryManager::default();
        mgr.push(Box::new(
            FnCommand::new("boom", |_: &mut Vec<i32>, _| Ok(()))
                .with_undo(|_: &mut Vec<i32>| panic!("undo exploded")),
        ));
        let failure = mgr.undo(&mut Vec::new()).unwrap().unwrap_err();
        assert_eq!(failure.error, CommandError::Panicked("undo exploded".into()));
        assert_eq!(mgr.undo_depth(), 1);
    }

    #[test]
    fn test_failed_redo_keeps_command() {
        let mut doc = Vec::new();
        let mut mgr = HistoryManager::default();
        mgr.push(Box::new(
            FnCommand::new("once", |_: &mut Vec<i32>, _| Ok(()))
                .with_undo(|_: &mut Vec<i32>| Ok(()))
                .with_redo(|_: &mut Vec<i32>, _| Err(CommandError::other("no"))),
        ));
        mgr.undo(&mut doc).unwrap().unwrap();
        assert!(mgr.redo(&mut doc, &ExecContext::detached()).unwrap().is_err());
        assert_eq!(mgr.redo_depth(), 1);
        assert_eq!(mgr.undo_depth(), 0);
    }

    #[test]
    fn test_max_depth_enforced() {
        let mut doc = Vec::new();
        let mut mgr = HistoryManager::new(HistoryConfig::new(3));
        for i in 0..5 {
            mgr.push(executed(&mut doc, i));
        }
        assert_eq!(mgr.undo_depth(), 3);
        assert_eq!(mgr.undo_history(), vec!["push2", "push3", "push4"]);
    }

    #[test]
    fn test_set_max_depth_evicts_oldest() {
        let mut doc = Vec::new();
        let mut mgr = HistoryManager::default();
        for i in 0..5 {
            mgr.push(executed(&mut doc, i));
        }
        assert_eq!(mgr.set_max_depth(2), 3);
        assert_eq!(mgr.undo_history(), vec!["push3", "push4"]);
    }

    #[test]
    fn test_set_max_depth_clamps_to_one() {
        let mut doc = Vec::new();
        let mut mgr = HistoryManager::default();
        mgr.push(executed(&mut doc, 1));
        mgr.push(executed(&mut doc, 2));
        mgr.set_max_depth(0);
        assert_eq!(mgr.config().max_depth, 1);
        assert_eq!(mgr.undo_history(), vec!["push2"]);
    }

    #[test]
    fn test_histories_order() {
        let mut doc = Vec::new();
        let mut mgr = HistoryManager::default();
        for i in 0..4 {
            mgr.push(executed(&mut doc, i));
        }
        mgr.undo(&mut doc);
        mgr.undo(&mut doc);
        assert_eq!(mgr.undo_history(), vec!["push0", "push1"]);
        assert_eq!(mgr.redo_history(), vec!["push2", "push3"]);
        assert_eq!(mgr.next_undo_description().as_deref(), Some("push1"));
        assert_eq!(mgr.next_redo_description().as_deref(), Some("push2"));
    }

    #[test]
    fn test_clear() {
        let mut doc = Vec::new();
        let mut mgr = HistoryManager::default();
        mgr.push(executed(&mut doc, 1));
        mgr.push(executed(&mut doc, 2));
        mgr.undo(&mut doc);
        mgr.clear();
        assert!(!mgr.can_undo());
        assert!(!mgr.can_redo());
    }

    #[test]
    fn test_undo_redo_without_commands() {
        let mut mgr: HistoryManager<Vec<i32>> = HistoryManager::default();
        assert!(mgr.undo(&mut Vec::new()).is_none());
        assert!(mgr.redo(&mut Vec::new(), &ExecContext::detached()).is_none());
    }

    #[test]
    fn test_config_default_and_clamp() {
        assert_eq!(HistoryConfig::default().max_depth, DEFAULT_UNDO_LIMIT);
        assert_eq!(HistoryConfig::new(0).max_depth, 1);
    }

    #[test]
    fn test_debug_impl() {
        let mgr: HistoryManager<Vec<i32>> = HistoryManager::default();
        let debug_str = format!("{:?}", mgr);
        assert!(debug_str.contains("HistoryManager"));
        assert!(debug_str.contains("undo_depth"));
    }
}
