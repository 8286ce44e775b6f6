#![forbid(unsafe_code)]

//! Textual command dispatch.
//!
//! A line is tokenized, its first token lowercased into the command name,
//! and the name checked against the reserved words before alias resolution
//! and registry lookup:
//!
//! | Name             | Action                                  |
//! |------------------|-----------------------------------------|
//! | `u`, `undo`      | undo the last history entry             |
//! | `redo`           | redo the last undone entry              |
//! | `""`, `repeat`   | dispatch the last successful line again |
//!
//! An alias may point at a reserved word. Reserved lines never become the
//! "last command".

use tracing::debug;

use crate::engine::Engine;
use crate::error::{EngineError, EngineResult};
use crate::events::EngineEvent;
use crate::tokenizer::split_command;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reserved {
    Undo,
    Redo,
    Repeat,
}

impl Reserved {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "u" | "undo" => Some(Self::Undo),
            "redo" => Some(Self::Redo),
            "" | "repeat" => Some(Self::Repeat),
            _ => None,
        }
    }
}

impl<D: 'static> Engine<D> {
    /// Dispatch one line of input. Returns whether it succeeded.
    ///
    /// Failures are reported through events and logging; use
    /// [`try_submit`](Self::try_submit) to get the error itself.
    pub fn submit(&mut self, line: &str) -> bool {
        self.try_submit(line).is_ok()
    }

    /// Dispatch one line of input.
    ///
    /// Blank lines are rejected with [`EngineError::ParseEmpty`]. While a
    /// macro is being recorded, every non-blank line is captured verbatim,
    /// whether or not it then succeeds.
    pub fn try_submit(&mut self, line: &str) -> EngineResult {
        if line.trim().is_empty() {
            return self.report(line, Err(EngineError::ParseEmpty));
        }
        if let Some(recording) = self.recorder.as_mut() {
            recording.push(line);
        }
        let result = self.dispatch_line(line, true);
        self.report(line, result)
    }

    /// Dispatch the last successful line again.
    pub fn repeat_last(&mut self) -> EngineResult {
        let result = self.repeat_inner();
        self.report("repeat", result)
    }

    fn repeat_inner(&mut self) -> EngineResult {
        let line = self
            .last_command
            .clone()
            .ok_or(EngineError::NothingToRepeat)?;
        debug!(line = %line, "repeating last command");
        self.dispatch_line(&line, false)
    }

    /// `allow_repeat` is false while repeating, so an alias rebound to
    /// `repeat` cannot recurse.
    fn dispatch_line(&mut self, line: &str, allow_repeat: bool) -> EngineResult {
        let (name, args) = split_command(line).ok_or(EngineError::ParseEmpty)?;

        let target = if Reserved::from_name(&name).is_some() {
            name
        } else {
            self.registry.resolve(&name)
        };
        debug!(line, command = %target, args = args.len(), "dispatching");

        match Reserved::from_name(&target) {
            Some(Reserved::Undo) => {
                self.undo_inner()?;
            }
            Some(Reserved::Redo) => {
                self.redo_inner()?;
            }
            Some(Reserved::Repeat) if allow_repeat => return self.repeat_inner(),
            Some(Reserved::Repeat) => return Err(EngineError::NothingToRepeat),
            None => {
                let cmd = self.registry.create_command(&target, &args)?;
                self.execute_inner(cmd)?;
                self.last_command = Some(line.to_string());
            }
        }

        if self.echo {
            self.emit(EngineEvent::CommandExecuted {
                line: line.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::command::{Command, CommandError, FnCommand};
    use crate::engine::Engine;
    use crate::error::EngineError;
    use crate::events::EngineEvent;
    use std::sync::{Arc, Mutex};

    type Doc = Vec<String>;

    fn drawing_engine() -> Engine<Doc> {
        let mut engine = Engine::new(Doc::new());
        for name in ["line", "circle"] {
            engine.register(name, move |args: &[String]| {
                let entry = format!("{name}{}", args.iter().map(|a| format!(" {a}")).collect::<String>());
                Ok(Box::new(
                    FnCommand::new(name, move |doc: &mut Doc, _| {
                        doc.push(entry.clone());
                        Ok(())
                    })
                    .with_undo(|doc: &mut Doc| {
                        doc.pop();
                        Ok(())
                    }),
                ) as Box<dyn Command<Doc>>)
            });
        }
        engine.register_alias("l", "line");
        engine.register_alias("c", "circle");
        engine
    }

    fn events(engine: &mut Engine<Doc>) -> Arc<Mutex<Vec<EngineEvent>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        engine.subscribe(move |e| sink.lock().unwrap().push(e.clone()));
        seen
    }

    #[test]
    fn uppercase_name_dispatches_lowercased() {
        let mut engine = drawing_engine();
        assert!(engine.submit("LINE"));
        assert_eq!(engine.document(), &["line"]);
        assert_eq!(engine.undo_depth(), 1);
        assert_eq!(engine.last_command(), Some("LINE"));
    }

    #[test]
    fn arguments_keep_quoting_and_case() {
        let mut engine = drawing_engine();
        assert!(engine.submit(r#"l 0,0 "Ten Ten""#));
        assert_eq!(engine.document(), &["line 0,0 Ten Ten"]);
    }

    #[test]
    fn blank_line_is_noop() {
        let mut engine = drawing_engine();
        let seen = events(&mut engine);
        assert!(!engine.submit("   "));
        assert!(matches!(engine.try_submit(""), Err(EngineError::ParseEmpty)));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn undo_with_empty_history_is_silent() {
        let mut engine = drawing_engine();
        let seen = events(&mut engine);
        assert!(!engine.submit("undo"));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn reserved_words_drive_history() {
        let mut engine = drawing_engine();
        engine.submit("line");
        engine.submit("circle");
        assert!(engine.submit("u"));
        assert_eq!(engine.document(), &["line"]);
        assert!(engine.submit("REDO"));
        assert_eq!(engine.document(), &["line", "circle"]);
        assert_eq!(engine.last_command(), Some("circle"));
    }

    #[test]
    fn repeat_reruns_last_line() {
        let mut engine = drawing_engine();
        assert!(!engine.submit("repeat"));
        engine.submit("c 5");
        engine.submit("undo");
        assert!(engine.submit("repeat"));
        assert_eq!(engine.document(), &["circle 5"]);
        assert!(engine.repeat_last().is_ok());
        assert_eq!(engine.document(), &["circle 5", "circle 5"]);
    }

    #[test]
    fn alias_to_reserved_word() {
        let mut engine = drawing_engine();
        engine.register_alias("z", "undo");
        engine.submit("line");
        assert!(engine.submit("z"));
        assert!(engine.document().is_empty());
    }

    #[test]
    fn repeat_cannot_recurse_through_alias() {
        let mut engine = drawing_engine();
        engine.register("again", |_: &[String]| {
            Ok(Box::new(FnCommand::new("again", |_: &mut Doc, _| Ok(()))) as Box<dyn Command<Doc>>)
        });
        engine.submit("again");
        engine.register_alias("again", "repeat");
        assert!(matches!(
            engine.try_submit("again"),
            Err(EngineError::NothingToRepeat)
        ));
    }

    #[test]
    fn unknown_and_construction_failures_are_distinct() {
        let mut engine = drawing_engine();
        engine.register("rectangle", |_: &[String]| {
            Err(CommandError::MissingArgument("corner".into()))
        });
        let seen = events(&mut engine);

        assert!(matches!(
            engine.try_submit("frobnicate"),
            Err(EngineError::UnknownCommand(name)) if name == "frobnicate"
        ));
        assert!(matches!(
            engine.try_submit("rectangle"),
            Err(EngineError::ConstructionFailed { .. })
        ));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(matches!(
            &seen[0],
            EngineEvent::CommandFailed { input, message }
                if input == "frobnicate" && message.contains("unknown command")
        ));
        assert!(matches!(&seen[1], EngineEvent::CommandFailed { input, .. } if input == "rectangle"));
    }

    #[test]
    fn echo_emits_executed_event() {
        let mut engine = drawing_engine();
        let seen = events(&mut engine);
        engine.submit("l");
        assert!(seen
            .lock()
            .unwrap()
            .contains(&EngineEvent::CommandExecuted { line: "l".into() }));

        seen.lock().unwrap().clear();
        engine.set_command_echo(false);
        engine.submit("l");
        assert!(!seen
            .lock()
            .unwrap()
            .iter()
            .any(|e| matches!(e, EngineEvent::CommandExecuted { .. })));
    }

    #[test]
    fn failed_line_does_not_become_last_command() {
        let mut engine = drawing_engine();
        engine.submit("line");
        engine.submit("nope");
        assert_eq!(engine.last_command(), Some("line"));
    }
}
