//! Parse LLM output into profile deltas
//!
//! The line format is one fact per line:
//!
//! ```text
//! - [UPDATE] basic_info::name::Gus::[0,1]
//! ```
//!
//! The bullet, the action marker and the bracketed provenance list are all
//! optional. Lines that do not fit are logged and skipped; they never abort
//! the batch.

use memoir_domain::{DeltaAction, ProfileDelta};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

/// Field separator
pub const FIELD_SEPARATOR: &str = "::";

/// The whole response yielded nothing usable
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Nothing but whitespace
    #[error("LLM response was empty")]
    Empty,

    /// Text was present but no line matched the fact grammar
    #[error("No well-formed facts in {skipped} non-empty lines")]
    NoFacts {
        /// Non-empty lines that were rejected
        skipped: usize,
    },
}

/// Deltas plus the number of rejected lines
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedFacts {
    /// Accepted facts, in output order
    pub deltas: Vec<ProfileDelta>,

    /// Non-empty lines (or JSON entries) that were rejected
    pub skipped: usize,
}

/// Parse the line format. `record_count` bounds provenance indices.
pub fn parse_fact_lines(response: &str, record_count: usize) -> Result<ParsedFacts, ParseError> {
    if response.trim().is_empty() {
        return Err(ParseError::Empty);
    }

    let mut parsed = ParsedFacts::default();
    for (idx, line) in response.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match parse_fact_line(line, record_count) {
            Ok(delta) => parsed.deltas.push(delta),
            Err(reason) => {
                debug!("Skipping line {}: {} ({:?})", idx + 1, reason, line);
                parsed.skipped += 1;
            }
        }
    }

    if parsed.deltas.is_empty() {
        warn!("LLM response had {} lines but no usable facts", parsed.skipped);
        return Err(ParseError::NoFacts {
            skipped: parsed.skipped,
        });
    }
    if parsed.skipped > 0 {
        warn!("Skipped {} malformed fact lines", parsed.skipped);
    }
    Ok(parsed)
}

/// Parse a single fact line (already trimmed, non-empty)
pub fn parse_fact_line(line: &str, record_count: usize) -> Result<ProfileDelta, String> {
    let rest = strip_bullet(line);
    let (action, mut rest) = strip_marker(rest);

    // A bracketed last field is provenance only if a topic precedes it
    let mut provenance = Vec::new();
    if let Some((head, last)) = rest.rsplit_once(FIELD_SEPARATOR) {
        if let Some(list) = bracketed(last.trim()) {
            if head.contains(FIELD_SEPARATOR) {
                provenance = parse_provenance(list, record_count)?;
                rest = head;
            }
        }
    }

    // Anything past the second separator belongs to the content
    let fields: Vec<&str> = rest.splitn(3, FIELD_SEPARATOR).map(str::trim).collect();
    let (topic, sub_topic, content) = match fields.as_slice() {
        [topic, content] => (*topic, None, (*content).to_string()),
        [topic, sub_topic, content] => (*topic, Some(*sub_topic), (*content).to_string()),
        _ => return Err("expected at least topic::content".to_string()),
    };

    if topic.is_empty() {
        return Err("empty topic".to_string());
    }
    if bracketed(&content).is_some() && sub_topic.is_none() {
        return Err("missing content".to_string());
    }
    if content.is_empty() && action != DeltaAction::Delete {
        return Err("empty content".to_string());
    }

    let sub_topic = sub_topic.filter(|s| !s.is_empty());
    Ok(ProfileDelta::add(topic, sub_topic, content)
        .with_action(action)
        .with_provenance(provenance))
}

/// Parse the JSON format: `{"facts": [{"topic", "sub_topic", "content",
/// "action", "provenance"}]}`. A wrong overall shape is an error; individual
/// bad entries are skipped.
pub fn parse_fact_json(value: &Value, record_count: usize) -> Result<ParsedFacts, String> {
    let facts = value
        .get("facts")
        .and_then(Value::as_array)
        .ok_or_else(|| "expected an object with a \"facts\" array".to_string())?;

    let mut parsed = ParsedFacts::default();
    for (idx, fact) in facts.iter().enumerate() {
        match parse_fact_object(fact, record_count) {
            Ok(delta) => parsed.deltas.push(delta),
            Err(e) => {
                warn!("Failed to parse fact {}: {}", idx, e);
                parsed.skipped += 1;
            }
        }
    }
    Ok(parsed)
}

fn parse_fact_object(fact: &Value, record_count: usize) -> Result<ProfileDelta, String> {
    let obj = fact
        .as_object()
        .ok_or_else(|| "Fact is not a JSON object".to_string())?;

    let topic = obj
        .get("topic")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| "Missing or invalid 'topic'".to_string())?;

    let sub_topic = obj
        .get("sub_topic")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let action = match obj.get("action").and_then(Value::as_str) {
        None => DeltaAction::Add,
        Some(s) => parse_action(s).ok_or_else(|| format!("Unknown action '{}'", s))?,
    };

    let content = obj
        .get("content")
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default();
    if content.is_empty() && action != DeltaAction::Delete {
        return Err("Missing or invalid 'content'".to_string());
    }

    let provenance = obj
        .get("provenance")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_u64)
                .map(|i| i as usize)
                .filter(|i| *i < record_count)
                .collect()
        })
        .unwrap_or_default();

    Ok(ProfileDelta::add(topic, sub_topic, content)
        .with_action(action)
        .with_provenance(provenance))
}

fn strip_bullet(line: &str) -> &str {
    line.strip_prefix("- ")
        .or_else(|| line.strip_prefix("* "))
        .map(str::trim_start)
        .unwrap_or(line)
}

fn strip_marker(line: &str) -> (DeltaAction, &str) {
    if let Some(inner) = line.strip_prefix('[') {
        if let Some((marker, rest)) = inner.split_once(']') {
            if let Some(action) = parse_action(marker) {
                return (action, rest.trim_start());
            }
        }
    }
    (DeltaAction::Add, line)
}

fn parse_action(s: &str) -> Option<DeltaAction> {
    match s.trim().to_ascii_uppercase().as_str() {
        "ADD" => Some(DeltaAction::Add),
        "UPDATE" => Some(DeltaAction::Update),
        "DELETE" => Some(DeltaAction::Delete),
        _ => None,
    }
}

fn bracketed(field: &str) -> Option<&str> {
    field.strip_prefix('[')?.strip_suffix(']')
}

fn parse_provenance(list: &str, record_count: usize) -> Result<Vec<usize>, String> {
    let mut indices = Vec::new();
    for item in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let index: usize = item
            .parse()
            .map_err(|_| format!("bad provenance index '{}'", item))?;
        if index < record_count && !indices.contains(&index) {
            indices.push(index);
        }
    }
    Ok(indices)
}
