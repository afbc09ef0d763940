//! Memoir CLI library.
//!
//! Configuration loading, process wiring, command execution and output
//! formatting for the `memoir` binary.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod output;
pub mod repl;
pub mod session;

pub use cli::{Cli, Command};
pub use config::MemoirConfig;
pub use error::{CliError, Result};
pub use output::Formatter;
pub use session::{Session, SessionTelemetry};
