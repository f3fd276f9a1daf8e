//! Command-line interface module.
//!
//! This module provides the CLI structure and command handlers for the chronicle binary.

mod archive;
mod commands;
mod context;
mod session;

pub use archive::run_archive;
pub use commands::{Cli, Commands};
pub use context::AppContext;
pub use session::{import_messages, reset_run, retry_chapter, show_chapters, show_status};
