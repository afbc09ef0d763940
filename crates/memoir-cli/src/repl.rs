//! Interactive REPL (Read-Eval-Print Loop) mode.
//!
//! Buffers live in process memory, so the REPL is where threshold-driven
//! flushing is actually observable: records accumulate across commands until
//! a buffer goes over its threshold or is flushed by hand.

use crate::error::{CliError, Result};
use crate::output::Formatter;
use crate::session::Session;
use memoir_domain::{BlobCategory, ChatMessage, ProfileId, RawRecord};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::PathBuf;

/// Run the interactive REPL.
pub async fn run_repl(session: &Session, formatter: &Formatter) -> Result<()> {
    println!("{}", formatter.info("Memoir REPL - Type 'help' for commands, 'exit' to quit"));
    println!();

    let mut editor = DefaultEditor::new()?;

    let history_path = get_history_path()?;
    let _ = editor.load_history(&history_path);

    loop {
        match editor.readline("memoir> ") {
            Ok(line) => {
                let line = line.trim();

                if line.is_empty() {
                    continue;
                }

                editor.add_history_entry(line).ok();

                match parse_repl_command(line) {
                    Ok(ReplCommand::Exit) => {
                        println!("{}", formatter.info("Goodbye!"));
                        break;
                    }
                    Ok(ReplCommand::Help) => {
                        print_help(formatter);
                    }
                    Ok(cmd) => {
                        if let Err(e) = execute_repl_command(cmd, session, formatter).await {
                            eprintln!("{}", formatter.error(&e.to_string()));
                        }
                    }
                    Err(e) => {
                        eprintln!("{}", formatter.error(&e.to_string()));
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("{}", formatter.info("Use 'exit' to quit"));
            }
            Err(ReadlineError::Eof) => {
                break;
            }
            Err(err) => {
                eprintln!("{}", formatter.error(&format!("Error: {}", err)));
                break;
            }
        }
    }

    editor.save_history(&history_path).ok();

    Ok(())
}

/// REPL command type.
#[derive(Debug, PartialEq)]
enum ReplCommand {
    Exit,
    Help,
    Insert {
        user: String,
        category: BlobCategory,
        text: String,
    },
    Capacity {
        user: String,
    },
    Flush {
        user: String,
        category: Option<BlobCategory>,
    },
    Profile {
        user: String,
    },
    Forget {
        user: String,
        id: ProfileId,
    },
    Metrics,
}

/// Parse a REPL command line.
fn parse_repl_command(line: &str) -> Result<ReplCommand> {
    let parts: Vec<&str> = line.split_whitespace().collect();

    if parts.is_empty() {
        return Err(CliError::InvalidInput("Empty command".to_string()));
    }

    match parts[0] {
        "exit" | "quit" | "q" => Ok(ReplCommand::Exit),
        "help" | "?" => Ok(ReplCommand::Help),
        "insert" => parse_insert_command(&parts[1..]),
        "capacity" => Ok(ReplCommand::Capacity {
            user: required_user(&parts[1..], "capacity <user>")?,
        }),
        "flush" => parse_flush_command(&parts[1..]),
        "profile" => Ok(ReplCommand::Profile {
            user: required_user(&parts[1..], "profile <user>")?,
        }),
        "forget" => parse_forget_command(&parts[1..]),
        "metrics" => Ok(ReplCommand::Metrics),
        _ => Err(CliError::InvalidInput(format!(
            "Unknown command: {}. Type 'help' for available commands.",
            parts[0]
        ))),
    }
}

/// Execute a REPL command.
async fn execute_repl_command(cmd: ReplCommand, session: &Session, formatter: &Formatter) -> Result<()> {
    let coordinator = &session.coordinator;
    match cmd {
        ReplCommand::Insert { user, category, text } => {
            let record = match category {
                BlobCategory::Document => RawRecord::document(text),
                _ => RawRecord::chat(vec![ChatMessage::user(text)]),
            }
            .map_err(memoir_buffer::FlushError::from)?;
            let threshold = coordinator.config().threshold_for(category);
            let receipt = coordinator.insert(&user, record).await?;
            println!("{}", formatter.format_receipt(&receipt, threshold)?);
        }
        ReplCommand::Capacity { user } => {
            let rows: Vec<_> = BlobCategory::IMPLEMENTED
                .into_iter()
                .map(|category| {
                    (
                        category,
                        coordinator.capacity(&user, category),
                        coordinator.pending(&user, category),
                        coordinator.config().threshold_for(category),
                    )
                })
                .collect();
            println!("{}", formatter.format_capacity(&user, &rows)?);
        }
        ReplCommand::Flush { user, category: Some(category) } => {
            let report = coordinator.flush(&user, category).await?;
            println!("{}", formatter.format_report(&report)?);
        }
        ReplCommand::Flush { user, category: None } => {
            for (category, result) in coordinator.flush_user(&user).await {
                match result {
                    Ok(report) => println!("{}", formatter.format_report(&report)?),
                    Err(e) => eprintln!("{}", formatter.format_flush_error(category, &e)),
                }
            }
        }
        ReplCommand::Profile { user } => {
            let entries = coordinator.profiles(&user).await?;
            println!("{}", formatter.format_profiles(&entries)?);
        }
        ReplCommand::Forget { user, id } => {
            if coordinator.forget_profile(&user, id).await? {
                println!("{}", formatter.success(&format!("Forgot profile entry {}", id)));
            } else {
                println!("{}", formatter.warning(&format!("No profile entry {} for user '{}'", id, user)));
            }
        }
        ReplCommand::Metrics => {
            println!("{}", coordinator.metrics().summary());
            println!("{}", session.telemetry.summary());
        }
        ReplCommand::Exit | ReplCommand::Help => {}
    }

    Ok(())
}

fn required_user(args: &[&str], usage: &str) -> Result<String> {
    args.first()
        .map(|s| s.to_string())
        .ok_or_else(|| CliError::InvalidInput(format!("Usage: {}", usage)))
}

fn parse_category(s: &str) -> Result<BlobCategory> {
    let category: BlobCategory = s.parse().map_err(|e: memoir_domain::RecordError| CliError::InvalidInput(e.to_string()))?;
    if !category.is_implemented() {
        return Err(CliError::InvalidInput(format!("{} records are not supported yet", category)));
    }
    Ok(category)
}

fn parse_insert_command(args: &[&str]) -> Result<ReplCommand> {
    if args.len() < 3 {
        return Err(CliError::InvalidInput(
            "Usage: insert <user> <chat|document> <text>".to_string(),
        ));
    }

    Ok(ReplCommand::Insert {
        user: args[0].to_string(),
        category: parse_category(args[1])?,
        text: args[2..].join(" "),
    })
}

fn parse_flush_command(args: &[&str]) -> Result<ReplCommand> {
    let user = required_user(args, "flush <user> [chat|document]")?;
    let category = args.get(1).map(|s| parse_category(s)).transpose()?;
    Ok(ReplCommand::Flush { user, category })
}

fn parse_forget_command(args: &[&str]) -> Result<ReplCommand> {
    if args.len() < 2 {
        return Err(CliError::InvalidInput("Usage: forget <user> <id>".to_string()));
    }

    let id = ProfileId::from_string(args[1]).map_err(CliError::InvalidInput)?;
    Ok(ReplCommand::Forget {
        user: args[0].to_string(),
        id,
    })
}

fn get_history_path() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| CliError::Config("Could not find home directory".into()))?;
    let memoir_dir = home.join(".memoir");
    std::fs::create_dir_all(&memoir_dir)?;
    Ok(memoir_dir.join("history.txt"))
}

fn print_help(formatter: &Formatter) {
    println!("{}", formatter.info("Available commands:"));
    println!();
    println!("  insert <user> <chat|document> <text>  - Buffer a record");
    println!("  capacity <user>                       - Show buffered tokens and records");
    println!("  flush <user> [chat|document]          - Extract buffered records now");
    println!("  profile <user>                        - Show profile entries");
    println!("  forget <user> <id>                    - Delete a profile entry");
    println!("  metrics                               - Flush and LLM usage counters");
    println!("  help, ?                               - Show this help");
    println!("  exit, quit, q                         - Exit REPL");
    println!();
}
