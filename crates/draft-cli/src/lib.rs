#![forbid(unsafe_code)]

//! `draftcmd`: a small drafting command line built on `draft-engine`.

pub mod cli;
pub mod drawing;
pub mod error;
pub mod logging;
pub mod repl;

pub use cli::run_from_env;
pub use error::{CliError, Result};
