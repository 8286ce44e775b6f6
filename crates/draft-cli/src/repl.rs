#![forbid(unsafe_code)]

//! Line-oriented interactive session.
//!
//! Plain lines go to the engine's dispatcher. Lines starting with `:` are
//! session commands that reach the parts of the engine that have no textual
//! form (recording, groups, history listings). An empty line repeats the
//! last command.

use std::io::{self, BufRead, Write};
use std::sync::{Arc, Mutex};

use draft_engine::tokenizer::tokenize;
use draft_engine::{Engine, EngineError, EngineEvent, EngineResult};

use crate::drawing::Drawing;

const META_HELP: &[(&str, &str)] = &[
    (":record NAME", "start recording a macro"),
    (":stop", "stop recording and save the macro"),
    (":play NAME", "replay a macro as one undo step"),
    (":macros", "list macros"),
    (":script PATH", "run a script file as one undo step"),
    (":begin NAME", "open a command group"),
    (":end", "close the command group"),
    (":history", "show undo and redo history"),
    (":clear", "forget all history"),
    (":limit [N]", "show or set the undo limit"),
    (":echo on|off", "toggle command echo"),
    (":complete PREFIX", "complete a command name"),
    (":help [NAME]", "list commands or show help for one"),
    (":quit", "leave"),
];

/// What the caller should do after a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// An engine plus an output sink.
pub struct Session<W: Write> {
    engine: Engine<Drawing>,
    events: Arc<Mutex<Vec<EngineEvent>>>,
    out: W,
}

impl<W: Write> Session<W> {
    pub fn new(mut engine: Engine<Drawing>, out: W) -> Self {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        engine.subscribe(move |event| {
            sink.lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(event.clone());
        });
        Self {
            engine,
            events,
            out,
        }
    }

    pub fn engine(&self) -> &Engine<Drawing> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine<Drawing> {
        &mut self.engine
    }

    pub fn into_output(self) -> W {
        self.out
    }

    /// Read lines until `:quit` or end of input.
    pub fn run<R: BufRead>(&mut self, mut input: R, prompt: bool) -> io::Result<()> {
        let mut line = String::new();
        loop {
            if prompt {
                write!(self.out, "draft> ")?;
                self.out.flush()?;
            }
            line.clear();
            if input.read_line(&mut line)? == 0 {
                break;
            }
            if self.handle_line(line.trim_end_matches(['\r', '\n']))? == Flow::Quit {
                break;
            }
        }
        if let Some(name) = self.engine.recording_name().map(str::to_string) {
            let result = self.engine.stop_recording();
            self.show(result.map(|n| format!("saved macro '{name}' ({n} lines)")))?;
        }
        Ok(())
    }

    /// Handle one line of input.
    pub fn handle_line(&mut self, line: &str) -> io::Result<Flow> {
        let flow = if line.trim().is_empty() {
            let result = self.engine.repeat_last();
            self.show(result.map(|()| String::new()))?;
            Flow::Continue
        } else if let Some(meta) = line.trim_start().strip_prefix(':') {
            self.meta(meta)?
        } else {
            let result = self.engine.try_submit(line);
            self.show(result.map(|()| String::new()))?;
            Flow::Continue
        };
        self.flush_output()?;
        Ok(flow)
    }

    fn meta(&mut self, text: &str) -> io::Result<Flow> {
        let mut tokens = tokenize(text).into_iter();
        let Some(cmd) = tokens.next() else {
            return Ok(Flow::Continue);
        };
        let args: Vec<String> = tokens.collect();
        let first = args.first().map(String::as_str);

        match (cmd.to_lowercase().as_str(), first) {
            ("quit" | "q" | "exit", _) => return Ok(Flow::Quit),
            ("record", Some(name)) => {
                let result = self.engine.start_recording(name);
                self.show(result.map(|()| format!("recording '{name}'")))?;
            }
            ("stop", _) => {
                let name = self.engine.recording_name().map(str::to_string);
                let result = self.engine.stop_recording();
                self.show(result.map(|n| match name {
                    Some(name) if n > 0 => format!("saved macro '{name}' ({n} lines)"),
                    _ => "recording discarded (no lines)".to_string(),
                }))?;
            }
            ("play", Some(name)) => {
                let result = self.engine.play_macro(name);
                self.show(result.map(|report| format!("macro '{name}': {report}")))?;
            }
            ("macros", _) => {
                let names = self.engine.available_macros();
                if names.is_empty() {
                    writeln!(self.out, "(no macros)")?;
                }
                for name in names {
                    writeln!(self.out, "{name}")?;
                }
            }
            ("script", Some(path)) => {
                let result = self.engine.execute_script(path);
                self.show(result.map(|report| format!("script {path}: {report}")))?;
            }
            ("begin", Some(_)) => {
                let name = args.join(" ");
                self.engine.begin_group(&name);
                writeln!(self.out, "group '{name}' open")?;
            }
            ("end", _) => {
                let result = self.engine.end_group();
                self.show(result.map(|()| "group closed".to_string()))?;
            }
            ("history", _) => self.print_history()?,
            ("clear", _) => {
                self.engine.clear_history();
                writeln!(self.out, "history cleared")?;
            }
            ("limit", None) => writeln!(self.out, "undo limit: {}", self.engine.undo_limit())?,
            ("limit", Some(n)) => match n.parse::<usize>() {
                Ok(n) => {
                    self.engine.set_undo_limit(n);
                    writeln!(self.out, "undo limit: {}", self.engine.undo_limit())?;
                }
                Err(_) => writeln!(self.out, "warning: '{n}' is not a number")?,
            },
            ("echo", Some(state)) => {
                let on = matches!(state, "on" | "true" | "1");
                self.engine.set_command_echo(on);
                writeln!(self.out, "echo {}", if on { "on" } else { "off" })?;
            }
            ("complete", prefix) => {
                let completions = self.engine.completions(prefix.unwrap_or(""));
                writeln!(self.out, "{}", completions.join(" "))?;
            }
            ("help", Some(name)) => {
                let help = self.engine.help(name);
                writeln!(self.out, "{help}")?;
            }
            ("help", None) => self.print_help()?,
            (other, _) => {
                writeln!(self.out, "warning: unknown or incomplete session command ':{other}'")?;
            }
        }
        Ok(Flow::Continue)
    }

    fn print_history(&mut self) -> io::Result<()> {
        let undo = self.engine.undo_history();
        let redo = self.engine.redo_history();
        writeln!(self.out, "undo ({}/{}):", undo.len(), self.engine.undo_limit())?;
        for (i, entry) in undo.iter().enumerate().rev() {
            writeln!(self.out, "  {:>3}  {entry}", i + 1)?;
        }
        writeln!(self.out, "redo ({}):", redo.len())?;
        for entry in &redo {
            writeln!(self.out, "       {entry}")?;
        }
        if let Some(next) = self.engine.next_undo_description() {
            writeln!(self.out, "next undo: {next}")?;
        }
        if let Some(next) = self.engine.next_redo_description() {
            writeln!(self.out, "next redo: {next}")?;
        }
        Ok(())
    }

    fn print_help(&mut self) -> io::Result<()> {
        writeln!(self.out, "commands:")?;
        for name in self.engine.available_commands() {
            writeln!(self.out, "  {}", self.engine.help(&name))?;
        }
        writeln!(self.out, "  u, undo | redo | repeat (or an empty line)")?;
        writeln!(self.out, "session:")?;
        for (usage, text) in META_HELP {
            writeln!(self.out, "  {usage:<18} {text}")?;
        }
        Ok(())
    }

    /// Print a success message, or a warning for soft failures. Hard
    /// failures arrive as events and are printed by `flush_output`.
    fn show(&mut self, result: EngineResult<String>) -> io::Result<()> {
        match result {
            Ok(message) if message.is_empty() => Ok(()),
            Ok(message) => writeln!(self.out, "{message}"),
            Err(EngineError::ParseEmpty) => Ok(()),
            Err(e) if e.is_warning() => writeln!(self.out, "warning: {e}"),
            Err(_) => Ok(()),
        }
    }

    fn flush_output(&mut self) -> io::Result<()> {
        for message in self.engine.document_mut().drain_messages() {
            writeln!(self.out, "{message}")?;
        }
        let events = std::mem::take(&mut *self.events.lock().unwrap_or_else(|e| e.into_inner()));
        for event in events {
            match event {
                EngineEvent::CommandExecuted { line } => writeln!(self.out, "ok: {line}")?,
                EngineEvent::CommandFailed { input, message } => {
                    writeln!(self.out, "error: {input}: {message}")?;
                }
                _ => {}
            }
        }
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drawing::register_builtins;

    fn session() -> Session<Vec<u8>> {
        let mut engine = Engine::new(Drawing::new());
        register_builtins(&mut engine);
        engine.set_command_echo(false);
        Session::new(engine, Vec::new())
    }

    fn output(session: Session<Vec<u8>>) -> String {
        String::from_utf8(session.into_output()).unwrap()
    }

    #[test]
    fn runs_commands_and_prints_messages() {
        let mut s = session();
        s.run("line 0,0 1,1\nlist\n".as_bytes(), false).unwrap();
        let out = output(s);
        assert!(out.contains("added #1 line 0,0 -> 1,1"), "{out}");
        assert!(out.contains("#1 line 0,0 -> 1,1\n"), "{out}");
    }

    #[test]
    fn errors_are_printed_once() {
        let mut s = session();
        s.run("bogus\n".as_bytes(), false).unwrap();
        let out = output(s);
        assert_eq!(out.matches("unknown command").count(), 1, "{out}");
        assert!(out.starts_with("error: bogus:"), "{out}");
    }

    #[test]
    fn warnings_are_printed() {
        let mut s = session();
        s.run("undo\n:end\n".as_bytes(), false).unwrap();
        let out = output(s);
        assert!(out.contains("warning: nothing to undo"), "{out}");
        assert!(out.contains("warning: no command group is open"), "{out}");
    }

    #[test]
    fn empty_line_repeats() {
        let mut s = session();
        s.run("circle 0,0 1\n\n".as_bytes(), false).unwrap();
        assert_eq!(s.engine().document().len(), 2);
    }

    #[test]
    fn groups_via_session_commands() {
        let mut s = session();
        s.run(
            ":begin two lines\nl 0,0 1,0\nl 1,0 1,1\n:end\n:history\n".as_bytes(),
            false,
        )
        .unwrap();
        assert_eq!(s.engine().undo_depth(), 1);
        let out = output(s);
        assert!(out.contains("two lines (2 commands)"), "{out}");
    }

    #[test]
    fn history_names_next_undo_and_redo() {
        let mut s = session();
        s.run(
            "circle 0,0 1\nline 0,0 1,1\nundo\n:history\n".as_bytes(),
            false,
        )
        .unwrap();
        let out = output(s);
        assert!(out.contains("next undo: circle at 0,0 r=1"), "{out}");
        assert!(out.contains("next redo: line 0,0 -> 1,1"), "{out}");
    }

    #[test]
    fn record_stop_play() {
        let mut s = session();
        s.run(
            ":record tri\nl 0,0 1,0\nl 1,0 0,1\n:stop\n:play tri\n".as_bytes(),
            false,
        )
        .unwrap();
        assert_eq!(s.engine().document().len(), 4);
        let out = output(s);
        assert!(out.contains("saved macro 'tri' (2 lines)"), "{out}");
        assert!(out.contains("macro 'tri': 2 executed, 0 skipped, 0 failed"), "{out}");
    }

    #[test]
    fn recording_is_saved_at_end_of_input() {
        let mut s = session();
        s.run(":record open\ncircle 0,0 2\n".as_bytes(), false).unwrap();
        assert!(!s.engine().is_recording());
        assert_eq!(s.engine().available_macros(), ["open"]);
    }

    #[test]
    fn quit_stops_reading() {
        let mut s = session();
        s.run(":quit\ncircle 0,0 1\n".as_bytes(), false).unwrap();
        assert!(s.engine().document().is_empty());
    }

    #[test]
    fn limit_and_complete() {
        let mut s = session();
        s.run(":limit 0\n:limit\n:complete re\n".as_bytes(), false).unwrap();
        let out = output(s);
        assert!(out.contains("undo limit: 1"), "{out}");
        assert!(out.contains("rec rect rectangle"), "{out}");
    }

    #[test]
    fn help_lists_commands_and_session_commands() {
        let mut s = session();
        s.run(":help\n:help c\n".as_bytes(), false).unwrap();
        let out = output(s);
        assert!(out.contains("circle CX,CY R - draw a circle"), "{out}");
        assert!(out.contains(":record NAME"), "{out}");
        assert!(out.contains("Alias for circle:"), "{out}");
    }

    #[test]
    fn echo_prints_ok_lines() {
        let mut s = session();
        s.run(":echo on\nc 0,0 1\n".as_bytes(), false).unwrap();
        assert!(output(s).contains("ok: c 0,0 1"));
    }

    #[test]
    fn prompt_is_written_when_interactive() {
        let mut s = session();
        s.run("".as_bytes(), true).unwrap();
        assert_eq!(output(s), "draft> ");
    }
}
