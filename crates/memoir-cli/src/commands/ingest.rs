//! Ingest command implementation.

use crate::cli::IngestArgs;
use crate::error::Result;
use crate::output::Formatter;
use crate::session::Session;
use memoir_buffer::FlushError;
use memoir_domain::{BlobCategory, RawRecord};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fs;
use tracing::warn;

/// One line of an ingest file
#[derive(Debug, Deserialize)]
struct IngestLine {
    blob_type: String,
    blob_data: Value,
    #[serde(default)]
    fields: Option<Map<String, Value>>,
}

/// Parse one JSON line into a record.
pub fn parse_ingest_line(line: &str) -> Result<RawRecord> {
    let parsed: IngestLine = serde_json::from_str(line)?;
    let record = parsed
        .blob_type
        .parse::<BlobCategory>()
        .and_then(|category| RawRecord::from_blob(category, parsed.blob_data, parsed.fields))
        .map_err(FlushError::from)?;
    Ok(record)
}

/// Execute the ingest command.
pub async fn execute_ingest(args: IngestArgs, session: &Session, formatter: &Formatter) -> Result<()> {
    let content = fs::read_to_string(&args.file)?;
    let mut accepted = 0;
    let mut rejected = 0;

    for (number, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        let record = match parse_ingest_line(line) {
            Ok(record) => record,
            Err(e) => {
                warn!("Skipping line {} of {}: {}", number + 1, args.file.display(), e);
                eprintln!("{}", formatter.error(&format!("line {}: {}", number + 1, e)));
                rejected += 1;
                continue;
            }
        };

        let threshold = session.coordinator.config().threshold_for(record.category());
        let receipt = session.coordinator.insert(&args.user, record).await?;
        println!("{}", formatter.format_receipt(&receipt, threshold)?);
        accepted += 1;
    }

    if args.flush {
        for (category, result) in session.coordinator.flush_user(&args.user).await {
            match result {
                Ok(report) => println!("{}", formatter.format_report(&report)?),
                Err(e) => eprintln!("{}", formatter.format_flush_error(category, &e)),
            }
        }
    } else if !session.coordinator.pending_keys().is_empty() {
        println!(
            "{}",
            formatter.warning("Records below threshold are dropped at exit; pass --flush to extract them now")
        );
    }

    println!(
        "{}",
        formatter.info(&format!("{} record(s) ingested, {} rejected", accepted, rejected))
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CliError;

    #[test]
    fn test_parse_chat_line() {
        let line = r#"{"blob_type": "chat", "blob_data": {"messages": [{"role": "user", "content": "I'm Gus"}]}, "fields": {"channel": "web"}}"#;
        let record = parse_ingest_line(line).unwrap();
        assert_eq!(record.category(), BlobCategory::Chat);
        assert_eq!(record.fields["channel"], "web");
    }

    #[test]
    fn test_parse_document_line_without_fields() {
        let line = r#"{"blob_type": "doc", "blob_data": {"content": "Gus lives in Lisbon"}}"#;
        let record = parse_ingest_line(line).unwrap();
        assert_eq!(record.category(), BlobCategory::Document);
        assert!(record.fields.is_empty());
    }

    #[test]
    fn test_rejected_lines() {
        assert!(parse_ingest_line("not json").is_err());
        assert!(matches!(
            parse_ingest_line(r#"{"blob_type": "video", "blob_data": {}}"#),
            Err(CliError::Flush(FlushError::InvalidRecord(_)))
        ));
        assert!(matches!(
            parse_ingest_line(r#"{"blob_type": "image", "blob_data": {}}"#),
            Err(CliError::Flush(_))
        ));
        assert!(parse_ingest_line(r#"{"blob_type": "chat", "blob_data": {"messages": "hi"}}"#).is_err());
    }
}
