#![forbid(unsafe_code)]

//! Macro recording, macro playback, and script execution.
//!
//! A macro is a named list of raw command lines. While recording, every
//! non-blank line handed to [`Engine::try_submit`] is captured verbatim.
//! Stopping stores the lines in memory and, when a macro directory is
//! configured, writes them to `<dir>/<name>.scr`, one line per line.
//!
//! Playback and scripts both feed their lines back through the dispatcher
//! inside one implicit command group, so a whole macro or script undoes as
//! a single history entry. Scripts are best effort: a failing line is
//! reported and the remaining lines still run.
//!
//! # Script format
//!
//! ```text
//! ; comment
//! # also a comment
//! line 0,0 10,10
//!
//! circle 5,5 3
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::command::CommandSource;
use crate::engine::Engine;
use crate::error::{EngineError, EngineResult};

/// Extension of persisted macro and script files.
pub const MACRO_EXTENSION: &str = "scr";

/// Group name used for script execution.
pub const SCRIPT_GROUP_NAME: &str = "Script Execution";

/// An in-progress recording.
#[derive(Debug, Clone)]
pub(crate) struct Recording {
    name: String,
    lines: Vec<String>,
}

impl Recording {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            lines: Vec::new(),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn push(&mut self, line: &str) {
        self.lines.push(line.to_string());
    }
}

/// In-memory macros plus their optional on-disk home.
#[derive(Debug, Default, Clone)]
pub struct MacroStore {
    dir: Option<PathBuf>,
    macros: BTreeMap<String, Vec<String>>,
}

impl MacroStore {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self {
            dir,
            macros: BTreeMap::new(),
        }
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    pub fn set_dir(&mut self, dir: Option<PathBuf>) {
        self.dir = dir;
    }

    /// Lines of an in-memory macro.
    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.macros.get(name).map(Vec::as_slice)
    }

    pub fn insert(&mut self, name: &str, lines: Vec<String>) {
        self.macros.insert(name.to_string(), lines);
    }

    /// File a macro named `name` lives in, if there is a macro directory.
    pub fn path_for(&self, name: &str) -> Option<PathBuf> {
        self.dir
            .as_ref()
            .map(|dir| dir.join(format!("{name}.{MACRO_EXTENSION}")))
    }

    /// Write `lines` to the macro file. Returns `None` without a directory.
    pub fn persist(&self, name: &str, lines: &[String]) -> io::Result<Option<PathBuf>> {
        let Some(path) = self.path_for(name) else {
            return Ok(None);
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut text = String::new();
        for line in lines {
            text.push_str(line);
            text.push('\n');
        }
        fs::write(&path, text)?;
        Ok(Some(path))
    }

    /// Read the macro file, if there is one.
    pub fn load(&self, name: &str) -> io::Result<Option<String>> {
        match self.path_for(name) {
            Some(path) if path.is_file() => fs::read_to_string(path).map(Some),
            _ => Ok(None),
        }
    }

    /// Names of every macro in memory or on disk, deduplicated and sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.macros.keys().cloned().collect();
        if let Some(dir) = &self.dir {
            match fs::read_dir(dir) {
                Ok(entries) => {
                    for entry in entries.flatten() {
                        let path = entry.path();
                        if !path.is_file()
                            || path.extension().and_then(|e| e.to_str()) != Some(MACRO_EXTENSION)
                        {
                            continue;
                        }
                        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                            names.push(stem.to_string());
                        }
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!(dir = %dir.display(), error = %e, "cannot list macro directory"),
            }
        }
        names.sort();
        names.dedup();
        names
    }
}

/// Reject names that are empty or would escape the macro directory.
pub fn validate_macro_name(name: &str) -> EngineResult {
    let bad = name.trim().is_empty()
        || name != name.trim()
        || name.starts_with('.')
        || name.contains(['/', '\\'])
        || name.contains("..");
    if bad {
        Err(EngineError::InvalidMacroName(name.to_string()))
    } else {
        Ok(())
    }
}

/// A line that failed during script or macro execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptFailure {
    /// 1-based line number in the script text.
    pub line_number: usize,
    pub line: String,
    pub message: String,
}

/// Outcome of a script or macro run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptReport {
    /// Lines that dispatched successfully.
    pub executed: usize,
    /// Blank and comment lines.
    pub skipped: usize,
    pub failures: Vec<ScriptFailure>,
}

impl ScriptReport {
    /// True when no line failed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

impl fmt::Display for ScriptReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} executed, {} skipped, {} failed",
            self.executed,
            self.skipped,
            self.failures.len()
        )
    }
}

fn is_comment_or_blank(line: &str) -> bool {
    line.is_empty() || line.starts_with(';') || line.starts_with('#')
}

impl<D: 'static> Engine<D> {
    // ========================================================================
    // Recording
    // ========================================================================

    /// Begin recording a macro named `name`.
    ///
    /// A recording already in progress is stopped and saved first.
    pub fn start_recording(&mut self, name: &str) -> EngineResult {
        let result = validate_macro_name(name);
        self.report(name, result)?;
        if self.recorder.is_some() {
            if let Err(e) = self.stop_recording() {
                warn!(error = %e, "previous recording could not be saved");
            }
        }
        info!(macro_event = "recorder_start", name = %name);
        self.recorder = Some(Recording::new(name));
        Ok(())
    }

    /// Stop recording and save the macro. Returns the number of lines kept.
    ///
    /// Empty recordings are discarded. The recording state is cleared even
    /// when writing the macro file fails.
    pub fn stop_recording(&mut self) -> EngineResult<usize> {
        let result = self.stop_recording_inner();
        self.report("stop recording", result)
    }

    fn stop_recording_inner(&mut self) -> EngineResult<usize> {
        let recording = self.recorder.take().ok_or(EngineError::NotRecording)?;
        let lines = recording.lines.len();
        info!(macro_event = "recorder_stop", name = %recording.name, lines);
        if lines == 0 {
            return Ok(0);
        }
        let persisted = self.macros.persist(&recording.name, &recording.lines);
        self.macros.insert(&recording.name, recording.lines);
        if let Some(path) = persisted? {
            debug!(path = %path.display(), "macro saved");
        }
        Ok(lines)
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_some()
    }

    pub fn recording_name(&self) -> Option<&str> {
        self.recorder.as_ref().map(Recording::name)
    }

    // ========================================================================
    // Playback
    // ========================================================================

    /// Replay a macro as one undoable group named `Macro: <name>`.
    ///
    /// In-memory macros win; otherwise `<dir>/<name>.scr` is run as a script.
    pub fn play_macro(&mut self, name: &str) -> EngineResult<ScriptReport> {
        let result = self.play_macro_inner(name);
        self.report(name, result)
    }

    fn play_macro_inner(&mut self, name: &str) -> EngineResult<ScriptReport> {
        validate_macro_name(name)?;
        let group = format!("Macro: {name}");
        let report = if let Some(lines) = self.macros.get(name) {
            let lines: Vec<(usize, String)> = lines
                .iter()
                .enumerate()
                .map(|(i, l)| (i + 1, l.clone()))
                .collect();
            info!(macro_event = "playback_start", name = %name, lines = lines.len());
            self.run_batch(&group, CommandSource::Macro, lines)
        } else if let Some(text) = self.macros.load(name)? {
            info!(macro_event = "playback_start", name = %name, source = "file");
            self.run_script(&group, CommandSource::Macro, &text)
        } else {
            return Err(EngineError::MacroNotFound(name.to_string()));
        };
        info!(
            macro_event = "playback_stop",
            name = %name,
            executed = report.executed,
            failed = report.failures.len(),
        );
        Ok(report)
    }

    /// Every macro in memory or in the macro directory, sorted.
    pub fn available_macros(&self) -> Vec<String> {
        self.macros.names()
    }

    pub fn macro_lines(&self, name: &str) -> Option<&[String]> {
        self.macros.get(name)
    }

    pub fn macro_dir(&self) -> Option<&Path> {
        self.macros.dir()
    }

    pub fn set_macro_dir(&mut self, dir: Option<PathBuf>) {
        self.macros.set_dir(dir);
    }

    // ========================================================================
    // Scripts
    // ========================================================================

    /// Run script text as one undoable group.
    pub fn execute_script_text(&mut self, text: &str) -> ScriptReport {
        self.run_script(SCRIPT_GROUP_NAME, CommandSource::Script, text)
    }

    /// Read and run a script file.
    pub fn execute_script(&mut self, path: impl AsRef<Path>) -> EngineResult<ScriptReport> {
        let path = path.as_ref();
        let result = fs::read_to_string(path).map_err(|source| EngineError::ScriptRead {
            path: path.to_path_buf(),
            source,
        });
        let text = self.report(&path.display().to_string(), result)?;
        debug!(path = %path.display(), "executing script");
        Ok(self.execute_script_text(&text))
    }

    fn run_script(&mut self, group: &str, source: CommandSource, text: &str) -> ScriptReport {
        let mut skipped = 0;
        let mut lines = Vec::new();
        for (i, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if is_comment_or_blank(line) {
                skipped += 1;
            } else {
                lines.push((i + 1, line.to_string()));
            }
        }
        let mut report = self.run_batch(group, source, lines);
        report.skipped = skipped;
        report
    }

    /// Submit numbered lines inside one group, continuing past failures.
    fn run_batch(
        &mut self,
        group: &str,
        source: CommandSource,
        lines: Vec<(usize, String)>,
    ) -> ScriptReport {
        let previous = std::mem::replace(&mut self.source, source);
        self.begin_group(group);

        let mut report = ScriptReport::default();
        for (line_number, line) in lines {
            match self.try_submit(&line) {
                Ok(()) => report.executed += 1,
                Err(e) => report.failures.push(ScriptFailure {
                    line_number,
                    line,
                    message: e.to_string(),
                }),
            }
        }

        if let Err(e) = self.end_group_inner() {
            warn!(group, error = %e, "batch group was closed early");
        }
        self.source = previous;
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn macro_names_are_validated() {
        assert!(validate_macro_name("m1").is_ok());
        assert!(validate_macro_name("draw box").is_ok());
        for bad in ["", "  ", "../x", "a/b", "a\\b", ".hidden", " padded"] {
            assert!(
                matches!(validate_macro_name(bad), Err(EngineError::InvalidMacroName(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn store_without_dir_is_memory_only() {
        let mut store = MacroStore::new(None);
        store.insert("m", vec!["line".into()]);
        assert_eq!(store.persist("m", &["line".to_string()]).unwrap(), None);
        assert_eq!(store.load("m").unwrap(), None);
        assert_eq!(store.names(), ["m"]);
    }

    #[test]
    fn store_persists_newline_terminated_lines() {
        let dir = tempfile::tempdir().unwrap();
        let store = MacroStore::new(Some(dir.path().join("macros")));
        let path = store
            .persist("box", &["line 0,0 1,0".to_string(), "line 1,0 1,1".to_string()])
            .unwrap()
            .unwrap();
        assert_eq!(path.file_name().unwrap(), "box.scr");
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "line 0,0 1,0\nline 1,0 1,1\n"
        );
        assert_eq!(
            store.load("box").unwrap().as_deref(),
            Some("line 0,0 1,0\nline 1,0 1,1\n")
        );
    }

    #[test]
    fn names_merge_memory_and_disk() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.scr"), "line\n").unwrap();
        fs::write(dir.path().join("a.scr"), "line\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        let mut store = MacroStore::new(Some(dir.path().to_path_buf()));
        store.insert("b", vec!["circle".into()]);
        store.insert("c", vec!["circle".into()]);
        assert_eq!(store.names(), ["a", "b", "c"]);
    }

    #[test]
    fn names_tolerate_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = MacroStore::new(Some(dir.path().join("absent")));
        assert!(store.names().is_empty());
    }

    #[test]
    fn comment_and_blank_detection() {
        assert!(is_comment_or_blank(""));
        assert!(is_comment_or_blank("; note"));
        assert!(is_comment_or_blank("# note"));
        assert!(!is_comment_or_blank("line"));
    }

    #[test]
    fn report_display_and_success() {
        let mut report = ScriptReport {
            executed: 2,
            skipped: 1,
            failures: Vec::new(),
        };
        assert!(report.is_success());
        report.failures.push(ScriptFailure {
            line_number: 3,
            line: "bogus".into(),
            message: "unknown command: bogus".into(),
        });
        assert!(!report.is_success());
        assert_eq!(report.to_string(), "2 executed, 1 skipped, 1 failed");
    }
}
