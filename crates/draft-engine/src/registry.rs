#![forbid(unsafe_code)]

//! Command registry and alias table.
//!
//! Names and aliases are stored lowercased, so every lookup is
//! case-insensitive. Aliases bind late (the target need not exist yet) and
//! resolve a single hop: the target of an alias is never itself resolved.

use std::fmt;

use ahash::AHashMap;

use crate::command::{Command, CommandError, guarded};
use crate::error::{EngineError, EngineResult};

/// Builds a command from its parsed arguments.
pub type Factory<D> =
    Box<dyn Fn(&[String]) -> Result<Box<dyn Command<D>>, CommandError> + Send + Sync>;

struct Entry<D> {
    help: String,
    factory: Factory<D>,
}

/// Name → factory map plus alias → name map.
pub struct CommandRegistry<D> {
    commands: AHashMap<String, Entry<D>>,
    aliases: AHashMap<String, String>,
}

impl<D> fmt::Debug for CommandRegistry<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("commands", &self.names())
            .field("aliases", &self.aliases)
            .finish()
    }
}

impl<D> Default for CommandRegistry<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D> CommandRegistry<D> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            commands: AHashMap::new(),
            aliases: AHashMap::new(),
        }
    }

    /// Register `factory` under `name`, replacing any previous entry.
    ///
    /// Commands already built by a replaced factory are unaffected.
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&[String]) -> Result<Box<dyn Command<D>>, CommandError> + Send + Sync + 'static,
    {
        self.register_with_help(name, "", factory);
    }

    /// Register `factory` under `name` together with a help string.
    pub fn register_with_help<F>(&mut self, name: &str, help: &str, factory: F)
    where
        F: Fn(&[String]) -> Result<Box<dyn Command<D>>, CommandError> + Send + Sync + 'static,
    {
        self.commands.insert(
            name.to_lowercase(),
            Entry {
                help: help.to_string(),
                factory: Box::new(factory),
            },
        );
    }

    /// Remove a command. Aliases pointing at it are left in place.
    pub fn unregister(&mut self, name: &str) -> bool {
        self.commands.remove(&name.to_lowercase()).is_some()
    }

    /// Map `alias` to `target`. The target is not checked.
    pub fn register_alias(&mut self, alias: &str, target: &str) {
        self.aliases
            .insert(alias.to_lowercase(), target.to_lowercase());
    }

    pub fn unregister_alias(&mut self, alias: &str) -> bool {
        self.aliases.remove(&alias.to_lowercase()).is_some()
    }

    /// Resolve an alias to its target, or return the lowercased input.
    pub fn resolve(&self, name: &str) -> String {
        let lower = name.to_lowercase();
        match self.aliases.get(&lower) {
            Some(target) => target.clone(),
            None => lower,
        }
    }

    /// Whether `name` is a registered command (aliases excluded).
    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(&name.to_lowercase())
    }

    pub fn is_alias(&self, name: &str) -> bool {
        self.aliases.contains_key(&name.to_lowercase())
    }

    /// Build the command registered under `name`.
    ///
    /// `name` is looked up as given (lowercased); resolve aliases first.
    /// Factory errors and panics become [`EngineError::ConstructionFailed`].
    pub fn create_command(&self, name: &str, args: &[String]) -> EngineResult<Box<dyn Command<D>>> {
        let name = name.to_lowercase();
        let entry = self
            .commands
            .get(&name)
            .ok_or_else(|| EngineError::UnknownCommand(name.clone()))?;
        guarded(|| (entry.factory)(args))
            .map_err(|source| EngineError::ConstructionFailed { name, source })
    }

    /// Registered command names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.commands.keys().cloned().collect();
        names.sort();
        names
    }

    /// Command names and aliases starting with the lowercased `partial`, sorted.
    pub fn completions(&self, partial: &str) -> Vec<String> {
        let prefix = partial.to_lowercase();
        let mut out: Vec<String> = self
            .commands
            .keys()
            .chain(self.aliases.keys())
            .filter(|k| k.starts_with(&prefix))
            .cloned()
            .collect();
        out.sort();
        out
    }

    /// Help text for a command or alias.
    pub fn help(&self, name: &str) -> String {
        let lower = name.to_lowercase();
        if let Some(entry) = self.commands.get(&lower) {
            return entry.help.clone();
        }
        if let Some(target) = self.aliases.get(&lower) {
            if let Some(entry) = self.commands.get(target) {
                return format!("Alias for {target}: {}", entry.help);
            }
        }
        format!("No help available for command: {name}")
    }

    /// Number of registered commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
