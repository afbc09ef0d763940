//! Output formatting for the CLI.

use crate::cli::CliFormat;
use crate::error::Result;
use memoir_buffer::{AutoFlush, FlushError, FlushReport, InsertReceipt};
use memoir_domain::{BlobCategory, ProfileEntry};
use colored::*;
use serde_json::{json, Value};
use tabled::{
    builder::Builder,
    settings::{object::Rows, Alignment, Modify, Style},
};

/// Output formatter.
pub struct Formatter {
    format: CliFormat,
    color_enabled: bool,
}

impl Formatter {
    /// Create a new formatter.
    pub fn new(format: CliFormat, color_enabled: bool) -> Self {
        Self { format, color_enabled }
    }

    /// Format a user's profile entries.
    pub fn format_profiles(&self, entries: &[ProfileEntry]) -> Result<String> {
        match self.format {
            CliFormat::Json => {
                let values: Vec<Value> = entries.iter().map(profile_json).collect();
                Ok(serde_json::to_string_pretty(&values)?)
            }
            CliFormat::Table => Ok(self.format_profiles_table(entries)),
        }
    }

    fn format_profiles_table(&self, entries: &[ProfileEntry]) -> String {
        if entries.is_empty() {
            return self.colorize("No profile entries found.", "yellow");
        }

        let mut builder = Builder::default();
        builder.push_record(["ID", "Topic", "Sub-topic", "Content", "Updated"]);
        for entry in entries {
            builder.push_record([
                entry.id.to_string(),
                entry.topic.clone(),
                entry.sub_topic.clone().unwrap_or_else(|| "-".to_string()),
                entry.content.clone(),
                entry.updated_at.to_string(),
            ]);
        }

        let mut table = builder.build();
        table
            .with(Style::rounded())
            .with(Modify::new(Rows::first()).with(Alignment::center()));
        table.to_string()
    }

    /// Format the outcome of one flush cycle.
    pub fn format_report(&self, report: &FlushReport) -> Result<String> {
        match self.format {
            CliFormat::Json => Ok(serde_json::to_string_pretty(&report_json(report))?),
            CliFormat::Table => {
                if report.records == 0 {
                    return Ok(self.info(&format!(
                        "({}, {}) buffer was empty",
                        report.user_id, report.category
                    )));
                }
                let mut line = format!(
                    "Flushed {} record(s) from ({}, {}): {} created, {} updated, {} deleted",
                    report.records, report.user_id, report.category, report.created, report.updated, report.deleted
                );
                if report.skipped_lines > 0 {
                    line.push_str(&format!(", {} line(s) skipped", report.skipped_lines));
                }
                match &report.parse_error {
                    Some(e) => Ok(self.warning(&format!("{} ({})", line, e))),
                    None => Ok(self.success(&line)),
                }
            }
        }
    }

    /// Format a failed flush of one buffer.
    pub fn format_flush_error(&self, category: BlobCategory, err: &FlushError) -> String {
        match err {
            FlushError::AlreadyFlushing { .. } => self.warning(&err.to_string()),
            _ => self.error(&format!("{} flush failed: {}", category, err)),
        }
    }

    /// Format the result of an insert, including any flush it triggered.
    pub fn format_receipt(&self, receipt: &InsertReceipt, threshold: usize) -> Result<String> {
        let buffered = format!(
            "Buffered record {} ({} / {} tokens)",
            receipt.record_id, receipt.capacity, threshold
        );
        let mut lines = vec![self.success(&buffered)];
        match &receipt.auto_flush {
            AutoFlush::NotTriggered => {}
            AutoFlush::AlreadyRunning => lines.push(self.info("Flush already running for this buffer")),
            AutoFlush::Completed(report) => lines.push(self.format_report(report)?),
            AutoFlush::Failed(e) => lines.push(self.error(&format!("Automatic flush failed: {}", e))),
        }
        Ok(lines.join("\n"))
    }

    /// Format buffer occupancy rows: (category, tokens, records, threshold).
    pub fn format_capacity(&self, user_id: &str, rows: &[(BlobCategory, usize, usize, usize)]) -> Result<String> {
        match self.format {
            CliFormat::Json => {
                let values: Vec<Value> = rows
                    .iter()
                    .map(|(category, tokens, records, threshold)| {
                        json!({
                            "user_id": user_id,
                            "category": category.as_str(),
                            "capacity": tokens,
                            "pending": records,
                            "threshold": threshold,
                        })
                    })
                    .collect();
                Ok(serde_json::to_string_pretty(&values)?)
            }
            CliFormat::Table => {
                let mut builder = Builder::default();
                builder.push_record(["Category", "Tokens", "Records", "Threshold"]);
                for (category, tokens, records, threshold) in rows {
                    builder.push_record([
                        category.to_string(),
                        tokens.to_string(),
                        records.to_string(),
                        threshold.to_string(),
                    ]);
                }
                let mut table = builder.build();
                table.with(Style::rounded());
                Ok(table.to_string())
            }
        }
    }

    /// Format a success message.
    pub fn success(&self, message: &str) -> String {
        self.colorize(&format!("✓ {}", message), "green")
    }

    /// Format an error message.
    pub fn error(&self, message: &str) -> String {
        self.colorize(&format!("✗ {}", message), "red")
    }

    /// Format an info message.
    pub fn info(&self, message: &str) -> String {
        self.colorize(&format!("ℹ {}", message), "blue")
    }

    /// Format a warning message.
    pub fn warning(&self, message: &str) -> String {
        self.colorize(&format!("⚠ {}", message), "yellow")
    }

    /// Colorize text if color is enabled.
    fn colorize(&self, text: &str, color: &str) -> String {
        if !self.color_enabled {
            return text.to_string();
        }

        match color {
            "red" => text.red().to_string(),
            "green" => text.green().to_string(),
            "blue" => text.blue().to_string(),
            "yellow" => text.yellow().to_string(),
            _ => text.to_string(),
        }
    }
}

fn profile_json(entry: &ProfileEntry) -> Value {
    json!({
        "id": entry.id.to_string(),
        "user_id": entry.user_id,
        "topic": entry.topic,
        "sub_topic": entry.sub_topic,
        "content": entry.content,
        "created_at": entry.created_at,
        "updated_at": entry.updated_at,
    })
}

fn report_json(report: &FlushReport) -> Value {
    json!({
        "user_id": report.user_id,
        "category": report.category.as_str(),
        "records": report.records,
        "deltas": report.deltas,
        "skipped_lines": report.skipped_lines,
        "parse_error": report.parse_error.as_ref().map(|e| e.to_string()),
        "created": report.created,
        "updated": report.updated,
        "deleted": report.deleted,
        "llm_called": report.llm_called,
    })
}
