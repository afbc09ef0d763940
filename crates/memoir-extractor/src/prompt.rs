//! LLM prompt engineering for profile extraction

use crate::config::ExtractionFormat;
use memoir_domain::{ProfileEntry, RawRecord};
use std::fmt::Write;

/// Builds the system and user prompts for one extraction call
pub struct PromptBuilder<'a> {
    records: &'a [RawRecord],
    existing_profiles: &'a [ProfileEntry],
    profiles_limit: usize,
    format: ExtractionFormat,
}

impl<'a> PromptBuilder<'a> {
    /// Create a new prompt builder over the records to analyze
    pub fn new(records: &'a [RawRecord]) -> Self {
        Self {
            records,
            existing_profiles: &[],
            profiles_limit: 50,
            format: ExtractionFormat::Lines,
        }
    }

    /// Show the user's current profile so the model can update instead of duplicate
    pub fn with_existing_profiles(mut self, profiles: &'a [ProfileEntry], limit: usize) -> Self {
        self.existing_profiles = profiles;
        self.profiles_limit = limit;
        self
    }

    /// Output format to ask for
    pub fn with_format(mut self, format: ExtractionFormat) -> Self {
        self.format = format;
        self
    }

    /// The system prompt: task, rules, and output format
    pub fn system_prompt(&self) -> String {
        let format = match self.format {
            ExtractionFormat::Lines => LINE_FORMAT,
            ExtractionFormat::Json => JSON_FORMAT,
        };
        format!("{}\n\n{}", EXTRACTION_INSTRUCTIONS, format)
    }

    /// The user prompt: current profile, then the indexed records
    pub fn user_prompt(&self) -> String {
        let mut prompt = String::new();

        if !self.existing_profiles.is_empty() && self.profiles_limit > 0 {
            prompt.push_str("Current user profile:\n");
            for entry in self.existing_profiles.iter().take(self.profiles_limit) {
                let _ = writeln!(
                    prompt,
                    "- {}::{}::{}",
                    entry.topic,
                    entry.sub_topic.as_deref().unwrap_or_default(),
                    entry.content
                );
            }
            prompt.push('\n');
        }

        prompt.push_str("Records to analyze:\n");
        for (idx, record) in self.records.iter().enumerate() {
            let _ = writeln!(prompt, "[{}] ({})", idx, record.category());
            if !record.fields.is_empty() {
                let fields = serde_json::Value::Object(record.fields.clone());
                let _ = writeln!(prompt, "fields: {}", fields);
            }
            prompt.push_str("---\n");
            prompt.push_str(&record.render());
            prompt.push_str("\n---\n");
        }

        prompt
    }
}

const EXTRACTION_INSTRUCTIONS: &str = r#"You maintain a long-term profile of one user.
Read the records below and extract durable facts about the user.

Rules:
- One fact per line, about the user only
- Group facts by topic (basic_info, contact, education, work, interest, life_event, psychological, ...)
- Use a sub_topic to name the slot inside the topic (name, age, title, sports, ...)
- Use the same topic and sub_topic as an existing profile entry to replace it
- Mark a fact [UPDATE] when it replaces an existing entry and [DELETE] when the user retracted it
- Cite the records a fact came from by their [index]
- Skip small talk, assistant statements, and anything not about the user
- If nothing is worth remembering, output nothing"#;

const LINE_FORMAT: &str = r#"Output format (one fact per line, nothing else):
- [ACTION] topic::sub_topic::content::[record indices]

Example:
- basic_info::name::Gus::[0]
- [UPDATE] work::title::senior engineer::[1,2]"#;

const JSON_FORMAT: &str = r#"Output format (a JSON object only, no additional text):
{"facts": [{"topic": "basic_info", "sub_topic": "name", "content": "Gus", "action": "add", "provenance": [0]}]}

"action" is one of "add", "update", "delete"."#;
