//! CLI command definitions and argument parsing.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Memoir CLI - Feed user records in, read remembered profiles out.
#[derive(Debug, Parser)]
#[command(name = "memoir")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(short, long, value_enum, global = true, default_value = "table")]
    pub format: CliFormat,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Configuration file path
    #[arg(short, long, global = true, env = "MEMOIR_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CliFormat {
    /// Table format (default)
    Table,
    /// JSON format
    Json,
}

/// CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Buffer records from a JSON-lines file
    Ingest(IngestArgs),

    /// Show a user's profile entries
    Profile(ProfileArgs),

    /// Delete one profile entry
    Forget(ForgetArgs),

    /// Enter interactive REPL mode
    Repl,
}

/// Arguments for the ingest command.
#[derive(Debug, Parser)]
pub struct IngestArgs {
    /// Owner of the records
    pub user: String,

    /// File with one `{"blob_type", "blob_data", "fields"}` object per line
    pub file: PathBuf,

    /// Flush whatever is still buffered once the file is read
    #[arg(long)]
    pub flush: bool,
}

/// Arguments for the profile command.
#[derive(Debug, Parser)]
pub struct ProfileArgs {
    /// User whose profile to show
    pub user: String,

    /// Only entries of this topic
    #[arg(short, long)]
    pub topic: Option<String>,
}

/// Arguments for the forget command.
#[derive(Debug, Parser)]
pub struct ForgetArgs {
    /// Owner of the entry
    pub user: String,

    /// Profile entry id
    pub id: String,
}
