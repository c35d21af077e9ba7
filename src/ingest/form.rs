use anyhow::{Context, Result};
use regex::Regex;

use super::SourceParser;
use crate::error::ParseError;
use crate::model::{Source, UnifiedRecord, non_empty};

/// HTML contact forms: `<input>` values, selected `<option>` texts and the
/// message `<textarea>`.
///
/// Extracts are taken verbatim; entities inside attribute values are not decoded.
pub struct FormParser {
    full_name: Regex,
    email: Regex,
    phone: Regex,
    company: Regex,
    submission_date: Regex,
    service: Regex,
    priority: Regex,
    message: Regex,
}

impl FormParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            full_name: input_value_regex("full_name")?,
            email: input_value_regex("email")?,
            phone: input_value_regex("phone")?,
            company: input_value_regex("company")?,
            submission_date: input_value_regex("submission_date")?,
            service: selected_option_regex("service")?,
            priority: selected_option_regex("priority")?,
            message: Regex::new(r#"(?s)<textarea[^>]*name="message"[^>]*>(.*?)</textarea>"#)
                .context("failed to compile textarea regex")?,
        })
    }
}

impl SourceParser for FormParser {
    fn source(&self) -> Source {
        Source::Form
    }

    fn directory(&self) -> &'static str {
        "forms"
    }

    fn extension(&self) -> &'static str {
        "html"
    }

    fn parse(&self, source_name: &str, raw: &[u8]) -> Result<UnifiedRecord, ParseError> {
        let content = std::str::from_utf8(raw)?;

        let mut record = UnifiedRecord::new(Source::Form, source_name);
        record.customer_name = first_capture(&self.full_name, content);
        record.email = first_capture(&self.email, content);
        record.phone = first_capture(&self.phone, content);
        record.company = first_capture(&self.company, content);
        record.submission_date = first_capture(&self.submission_date, content);
        record.service = first_capture(&self.service, content).and_then(trimmed);
        record.priority = first_capture(&self.priority, content).and_then(trimmed);
        record.message = first_capture(&self.message, content).and_then(trimmed);
        record.notes = Some("extracted from HTML form".to_string());
        Ok(record)
    }
}

fn input_value_regex(field: &str) -> Result<Regex> {
    Regex::new(&format!(
        r#"name="{}"[^>]*value="([^"]+)""#,
        regex::escape(field)
    ))
    .with_context(|| format!("failed to compile input regex for {field}"))
}

fn selected_option_regex(field: &str) -> Result<Regex> {
    Regex::new(&format!(
        r#"(?s)<select[^>]*name="{}"[^>]*>.*?<option[^>]*selected[^>]*>([^<]+)</option>"#,
        regex::escape(field)
    ))
    .with_context(|| format!("failed to compile select regex for {field}"))
}

fn first_capture(pattern: &Regex, content: &str) -> Option<String> {
    pattern
        .captures(content)
        .and_then(|captures| captures.get(1))
        .and_then(|value| non_empty(value.as_str()))
}

fn trimmed(value: String) -> Option<String> {
    non_empty(value.trim())
}
