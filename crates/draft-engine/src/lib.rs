#![forbid(unsafe_code)]

//! Command execution and undo/redo engine for the drafting application.
//!
//! Commands arrive as text lines or pre-built values, run against a
//! document owned by an [`Engine`], and land in a depth-limited undo
//! history. Commands can be batched into groups that undo as one entry,
//! addressed through case-insensitive aliases, recorded into macros, and
//! replayed from scripts.
//!
//! # Example
//!
//! ```
//! use draft_engine::{Command, Engine, FnCommand};
//!
//! let mut engine = Engine::new(Vec::<String>::new());
//! engine.register("line", |args: &[String]| {
//!     let shape = format!("line {}", args.join(" "));
//!     Ok(Box::new(
//!         FnCommand::new("line", move |doc: &mut Vec<String>, _| {
//!             doc.push(shape.clone());
//!             Ok(())
//!         })
//!         .with_undo(|doc: &mut Vec<String>| {
//!             doc.pop();
//!             Ok(())
//!         }),
//!     ) as Box<dyn Command<Vec<String>>>)
//! });
//! engine.register_alias("l", "line");
//!
//! assert!(engine.submit("L 0,0 10,10"));
//! assert_eq!(engine.document(), &["line 0,0 10,10"]);
//! assert!(engine.submit("undo"));
//! assert!(engine.document().is_empty());
//! ```

pub mod cancellation;
pub mod command;
pub mod config;
mod dispatch;
pub mod engine;
pub mod error;
pub mod events;
pub mod group;
pub mod history;
pub mod macros;
pub mod registry;
pub mod tokenizer;

pub use cancellation::{CancelHandle, CancelToken};
pub use command::{
    Command, CommandError, CommandMetadata, CommandResult, CommandSource, ExecContext, FnCommand,
};
pub use config::{ConfigError, EngineConfig};
pub use engine::Engine;
pub use error::{EngineError, EngineResult};
pub use events::{EngineEvent, SubscriberId};
pub use group::CommandGroup;
pub use history::{DEFAULT_UNDO_LIMIT, HistoryConfig, HistoryManager, HistoryStep};
pub use macros::{MacroStore, ScriptFailure, ScriptReport};
pub use registry::{CommandRegistry, Factory};
