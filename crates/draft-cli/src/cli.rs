use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use draft_engine::{ConfigError, Engine, EngineConfig, ScriptReport};
use tracing::debug;

use crate::drawing::{Drawing, register_builtins};
use crate::error::{CliError, Result};
use crate::logging::init_logging;
use crate::repl::Session;

#[derive(Debug, Parser)]
#[command(
    name = "draftcmd",
    about = "Drafting command line with undo/redo, macros, and scripts",
    version
)]
pub struct Cli {
    #[command(flatten)]
    pub engine: EngineArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Clone, Default, Args)]
pub struct EngineArgs {
    /// TOML config file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Maximum undo depth.
    #[arg(long, global = true)]
    pub undo_limit: Option<usize>,

    /// Directory holding `<name>.scr` macro files.
    #[arg(long, global = true)]
    pub macro_dir: Option<PathBuf>,

    /// Do not print executed commands.
    #[arg(long, global = true)]
    pub no_echo: bool,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Interactive session (the default).
    Repl,

    /// Run script files, each as one undo step, then print the drawing.
    Run(RunArgs),

    /// Replay a saved macro, then print the drawing.
    Play {
        /// Macro name.
        name: String,
    },

    /// List saved macros.
    Macros,
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Script files to execute in order.
    #[arg(required = true)]
    pub scripts: Vec<PathBuf>,

    /// Keep running later scripts after one reports failures.
    #[arg(long)]
    pub keep_going: bool,
}

impl EngineArgs {
    /// File config (if any), then flags, then the default macro directory.
    pub fn resolve(&self) -> Result<EngineConfig> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::load(path)?,
            None => EngineConfig::default(),
        };
        if let Some(limit) = self.undo_limit {
            config.undo_limit = limit;
        }
        if self.macro_dir.is_some() {
            config.macro_dir = self.macro_dir.clone();
        }
        if self.no_echo {
            config.echo = false;
        }
        if config.macro_dir.is_none() {
            config.macro_dir = default_macro_dir();
        }

        let errors = config.validate();
        if !errors.is_empty() {
            return Err(ConfigError::Validation(errors).into());
        }
        Ok(config)
    }
}

/// `<data dir>/draftcmd/macros`, when the platform has a data dir.
pub fn default_macro_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("draftcmd").join("macros"))
}

pub fn build_engine(config: &EngineConfig) -> Engine<Drawing> {
    let mut engine = Engine::with_config(Drawing::new(), config);
    register_builtins(&mut engine);
    engine
}

pub fn run_from_env() -> Result<()> {
    let cli = Cli::parse();
    init_logging();
    run(cli)
}

pub fn run(cli: Cli) -> Result<()> {
    let config = cli.engine.resolve()?;
    debug!(?config, "engine configured");
    let engine = build_engine(&config);
    let stdout = io::stdout();

    match cli.command.unwrap_or(Commands::Repl) {
        Commands::Repl => {
            let stdin = io::stdin();
            let interactive = stdin.is_terminal();
            let mut session = Session::new(engine, stdout.lock());
            session.run(stdin.lock(), interactive)?;
            Ok(())
        }
        Commands::Run(args) => run_scripts(engine, &args, &mut stdout.lock()),
        Commands::Play { name } => play_macro(engine, &name, &mut stdout.lock()),
        Commands::Macros => list_macros(&engine, &mut stdout.lock()),
    }
}

/// Runs each script as its own undo step and prints the final drawing.
/// The first script with failing lines decides the error.
pub fn run_scripts<W: Write>(
    mut engine: Engine<Drawing>,
    args: &RunArgs,
    out: &mut W,
) -> Result<()> {
    let mut first_failure = None;
    for path in &args.scripts {
        let report = engine.execute_script(path)?;
        writeln!(out, "{}: {report}", path.display())?;
        print_failures(out, &report)?;
        if !report.is_success() && first_failure.is_none() {
            first_failure = Some(CliError::ScriptFailed {
                path: path.clone(),
                failed: report.failures.len(),
            });
            if !args.keep_going {
                break;
            }
        }
    }
    print_drawing(out, engine.document())?;
    first_failure.map_or(Ok(()), Err)
}

pub fn play_macro<W: Write>(mut engine: Engine<Drawing>, name: &str, out: &mut W) -> Result<()> {
    let report = engine.play_macro(name)?;
    writeln!(out, "macro '{name}': {report}")?;
    print_failures(out, &report)?;
    print_drawing(out, engine.document())?;
    if report.is_success() {
        Ok(())
    } else {
        Err(CliError::exit(
            1,
            format!("macro '{name}': {} line(s) failed", report.failures.len()),
        ))
    }
}

pub fn list_macros<W: Write>(engine: &Engine<Drawing>, out: &mut W) -> Result<()> {
    for name in engine.available_macros() {
        writeln!(out, "{name}")?;
    }
    Ok(())
}

fn print_failures<W: Write>(out: &mut W, report: &ScriptReport) -> io::Result<()> {
    for failure in &report.failures {
        writeln!(
            out,
            "  line {}: {}: {}",
            failure.line_number, failure.line, failure.message
        )?;
    }
    Ok(())
}

fn print_drawing<W: Write>(out: &mut W, drawing: &Drawing) -> io::Result<()> {
    for line in drawing.listing() {
        writeln!(out, "{line}")?;
    }
    Ok(())
}
