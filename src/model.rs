use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Form,
    Email,
    Invoice,
}

impl Source {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Form => "form",
            Self::Email => "email",
            Self::Invoice => "invoice",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum RecordStatus {
    #[default]
    PendingReview,
    AutoValid,
    NeedsReview,
    Approved,
    Rejected,
}

impl RecordStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PendingReview => "pending_review",
            Self::AutoValid => "auto_valid",
            Self::NeedsReview => "needs_review",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "pending_review" => Some(Self::PendingReview),
            "auto_valid" => Some(Self::AutoValid),
            "needs_review" => Some(Self::NeedsReview),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    /// Statuses only a human reviewer can assign.
    pub fn is_review_decision(self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized record shared by every source parser and pipeline stage.
///
/// `source` and `source_name` are fixed at construction. Stages never edit a
/// record they received; they clone it and return the updated copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedRecord {
    source: Source,
    source_name: String,
    pub customer_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub service: Option<String>,
    pub message: Option<String>,
    pub priority: Option<String>,
    pub submission_date: Option<String>,
    pub invoice_number: Option<String>,
    pub invoice_date: Option<String>,
    pub net_amount: Option<f64>,
    pub vat_amount: Option<f64>,
    pub total_amount: Option<f64>,
    pub currency: Option<String>,
    pub status: RecordStatus,
    pub notes: Option<String>,
}

impl UnifiedRecord {
    pub fn new(source: Source, source_name: impl Into<String>) -> Self {
        Self {
            source,
            source_name: source_name.into(),
            customer_name: None,
            email: None,
            phone: None,
            company: None,
            service: None,
            message: None,
            priority: None,
            submission_date: None,
            invoice_number: None,
            invoice_date: None,
            net_amount: None,
            vat_amount: None,
            total_amount: None,
            currency: None,
            status: RecordStatus::PendingReview,
            notes: None,
        }
    }

    pub fn source(&self) -> Source {
        self.source
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn with_status(&self, status: RecordStatus) -> Self {
        Self {
            status,
            ..self.clone()
        }
    }

    /// Copy of the record with `note` appended to the annotation trail.
    pub fn with_appended_note(&self, note: &str) -> Self {
        Self {
            notes: append_note(self.notes.as_deref(), note),
            ..self.clone()
        }
    }
}

pub fn append_note(existing: Option<&str>, note: &str) -> Option<String> {
    let merged = format!("{} {}", existing.unwrap_or_default(), note.trim());
    let merged = merged.trim();
    if merged.is_empty() {
        None
    } else {
        Some(merged.to_string())
    }
}

/// Returns `None` for empty or whitespace-only values.
pub fn non_empty(value: impl Into<String>) -> Option<String> {
    let value = value.into();
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFileEntry {
    pub source: Source,
    pub filename: String,
    pub size_bytes: u64,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceInventoryManifest {
    pub manifest_version: u32,
    pub generated_at: String,
    pub data_directory: String,
    pub form_count: usize,
    pub invoice_count: usize,
    pub email_count: usize,
    pub files: Vec<SourceFileEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceCounts {
    pub form: usize,
    pub invoice: usize,
    pub email: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusCounts {
    pub auto_valid: usize,
    pub needs_review: usize,
    pub other: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelinePaths {
    pub data_dir: String,
    pub csv_output: String,
    pub sink_output: Option<String>,
    pub queue_db: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub sink: String,
    pub enrichment_mode: String,
    pub paths: PipelinePaths,
    pub record_count: usize,
    pub sources: SourceCounts,
    pub statuses: StatusCounts,
    pub queue_preserved_decisions: usize,
    pub alerts: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_starts_pending_without_fields() {
        let record = UnifiedRecord::new(Source::Form, "contact.html");
        assert_eq!(record.source(), Source::Form);
        assert_eq!(record.source_name(), "contact.html");
        assert_eq!(record.status, RecordStatus::PendingReview);
        assert!(record.customer_name.is_none());
        assert!(record.currency.is_none());
    }

    #[test]
    fn appended_note_keeps_previous_trail() {
        let record = UnifiedRecord::new(Source::Email, "msg.eml").with_appended_note("first");
        let updated = record.with_appended_note("  second ");

        assert_eq!(record.notes.as_deref(), Some("first"));
        assert_eq!(updated.notes.as_deref(), Some("first second"));
    }

    #[test]
    fn status_round_trips_through_its_label() {
        for status in [
            RecordStatus::PendingReview,
            RecordStatus::AutoValid,
            RecordStatus::NeedsReview,
            RecordStatus::Approved,
            RecordStatus::Rejected,
        ] {
            assert_eq!(RecordStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(RecordStatus::parse("archived"), None);
    }
}
