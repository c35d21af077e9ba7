mod store;

use std::fmt;
use std::str::FromStr;

pub use store::{QueueRefresh, ReviewQueue};

use crate::error::ParseError;
use crate::model::{RecordStatus, UnifiedRecord, append_note, non_empty};
use crate::text::clean_amount;

/// Record fields a reviewer may change. Lineage, status and notes are not
/// editable here; status and notes go through [`mark_status`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum EditableField {
    CustomerName,
    Email,
    Phone,
    Company,
    Service,
    Message,
    Priority,
    SubmissionDate,
    InvoiceNumber,
    InvoiceDate,
    NetAmount,
    VatAmount,
    TotalAmount,
    Currency,
}

const EDITABLE_FIELDS: &[(&str, EditableField)] = &[
    ("customer_name", EditableField::CustomerName),
    ("email", EditableField::Email),
    ("phone", EditableField::Phone),
    ("company", EditableField::Company),
    ("service", EditableField::Service),
    ("message", EditableField::Message),
    ("priority", EditableField::Priority),
    ("submission_date", EditableField::SubmissionDate),
    ("invoice_number", EditableField::InvoiceNumber),
    ("invoice_date", EditableField::InvoiceDate),
    ("net_amount", EditableField::NetAmount),
    ("vat_amount", EditableField::VatAmount),
    ("total_amount", EditableField::TotalAmount),
    ("currency", EditableField::Currency),
];

impl EditableField {
    pub fn as_str(self) -> &'static str {
        EDITABLE_FIELDS
            .iter()
            .find(|(_, field)| *field == self)
            .map(|(name, _)| *name)
            .unwrap_or_default()
    }
}

impl fmt::Display for EditableField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EditableField {
    type Err = ParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        EDITABLE_FIELDS
            .iter()
            .find(|(name, _)| *name == value)
            .map(|(_, field)| *field)
            .ok_or_else(|| ParseError::InvalidField {
                field: "review edit".to_string(),
                value: value.to_string(),
            })
    }
}

/// Copy of `record` with the reviewer's edits applied. `None` values are
/// skipped and empty text clears the field.
pub fn apply_edits(
    record: &UnifiedRecord,
    updates: &[(EditableField, Option<String>)],
) -> Result<UnifiedRecord, ParseError> {
    let mut edited = record.clone();

    for (field, value) in updates {
        let Some(value) = value else {
            continue;
        };
        let text = non_empty(value.trim());

        match field {
            EditableField::CustomerName => edited.customer_name = text,
            EditableField::Email => edited.email = text,
            EditableField::Phone => edited.phone = text,
            EditableField::Company => edited.company = text,
            EditableField::Service => edited.service = text,
            EditableField::Message => edited.message = text,
            EditableField::Priority => edited.priority = text,
            EditableField::SubmissionDate => edited.submission_date = text,
            EditableField::InvoiceNumber => edited.invoice_number = text,
            EditableField::InvoiceDate => edited.invoice_date = text,
            EditableField::Currency => edited.currency = text,
            EditableField::NetAmount => edited.net_amount = parse_amount(text)?,
            EditableField::VatAmount => edited.vat_amount = parse_amount(text)?,
            EditableField::TotalAmount => edited.total_amount = parse_amount(text)?,
        }
    }

    Ok(edited)
}

/// Copy of `record` with a new status and, when given, a trimmed note
/// appended to the trail.
pub fn mark_status(record: &UnifiedRecord, status: RecordStatus, note: Option<&str>) -> UnifiedRecord {
    let mut marked = record.with_status(status);
    if let Some(note) = note.filter(|note| !note.trim().is_empty()) {
        marked.notes = append_note(record.notes.as_deref(), note);
    }
    marked
}

fn parse_amount(text: Option<String>) -> Result<Option<f64>, ParseError> {
    text.map(|value| clean_amount(&value)).transpose()
}
