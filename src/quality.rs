use std::fmt;

use tracing::warn;

use crate::model::{RecordStatus, Source, UnifiedRecord};

const AMOUNT_TOLERANCE: f64 = 0.01;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum QualityIssue {
    MissingCustomerName,
    MissingInvoiceNumber,
    InvalidTotalAmount,
    AmountMismatch,
    ContactInfoMissing,
    EmptyEmailBody,
}

impl QualityIssue {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MissingCustomerName => "missing customer name",
            Self::MissingInvoiceNumber => "missing invoice number",
            Self::InvalidTotalAmount => "invalid total amount",
            Self::AmountMismatch => "net + vat does not match total",
            Self::ContactInfoMissing => "contact info missing",
            Self::EmptyEmailBody => "empty email body",
        }
    }
}

impl fmt::Display for QualityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn validate_record(record: &UnifiedRecord) -> Vec<QualityIssue> {
    let mut issues = Vec::new();

    if is_blank(record.customer_name.as_deref()) {
        issues.push(QualityIssue::MissingCustomerName);
    }

    match record.source() {
        Source::Invoice => {
            if is_blank(record.invoice_number.as_deref()) {
                issues.push(QualityIssue::MissingInvoiceNumber);
            }
            if !record.total_amount.is_some_and(|total| total > 0.0) {
                issues.push(QualityIssue::InvalidTotalAmount);
            }
            if let (Some(net), Some(vat), Some(total)) =
                (record.net_amount, record.vat_amount, record.total_amount)
            {
                if (round_cents(net + vat) - total).abs() > AMOUNT_TOLERANCE {
                    issues.push(QualityIssue::AmountMismatch);
                }
            }
        }
        Source::Form => {
            if is_blank(record.email.as_deref()) && is_blank(record.phone.as_deref()) {
                issues.push(QualityIssue::ContactInfoMissing);
            }
        }
        Source::Email => {
            if is_blank(record.message.as_deref()) {
                issues.push(QualityIssue::EmptyEmailBody);
            }
        }
    }

    issues
}

/// Sets `auto_valid` or `needs_review` and appends a `quality:` note listing
/// the issues. Each call appends again, so run it once per load.
pub fn apply_quality_checks(records: &[UnifiedRecord]) -> Vec<UnifiedRecord> {
    records
        .iter()
        .map(|record| {
            let issues = validate_record(record);
            if issues.is_empty() {
                return record.with_status(RecordStatus::AutoValid);
            }

            let summary = issues
                .iter()
                .map(|issue| issue.as_str())
                .collect::<Vec<&str>>()
                .join("; ");
            warn!(source_name = %record.source_name(), issues = %summary, "quality issues");

            record
                .with_status(RecordStatus::NeedsReview)
                .with_appended_note(&format!("quality: {summary}"))
        })
        .collect()
}

fn is_blank(value: Option<&str>) -> bool {
    value.is_none_or(|text| text.trim().is_empty())
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invoice(net: f64, vat: f64, total: f64) -> UnifiedRecord {
        let mut record = UnifiedRecord::new(Source::Invoice, "invoice.html");
        record.customer_name = Some("Πελάτης Α".to_string());
        record.invoice_number = Some("INV-1".to_string());
        record.net_amount = Some(net);
        record.vat_amount = Some(vat);
        record.total_amount = Some(total);
        record
    }

    #[test]
    fn invoice_totals_must_match_within_tolerance() {
        assert_eq!(
            validate_record(&invoice(100.0, 24.0, 125.0)),
            vec![QualityIssue::AmountMismatch]
        );
        assert!(validate_record(&invoice(100.0, 24.0, 124.0)).is_empty());
        assert!(validate_record(&invoice(1234.0, 296.16, 1530.16)).is_empty());
    }

    #[test]
    fn invoice_without_number_or_positive_total_is_flagged() {
        let mut record = UnifiedRecord::new(Source::Invoice, "empty.html");
        record.total_amount = Some(0.0);

        assert_eq!(
            validate_record(&record),
            vec![
                QualityIssue::MissingCustomerName,
                QualityIssue::MissingInvoiceNumber,
                QualityIssue::InvalidTotalAmount,
            ]
        );
    }

    #[test]
    fn form_needs_email_or_phone() {
        let mut record = UnifiedRecord::new(Source::Form, "form.html");
        record.customer_name = Some("Νίκος".to_string());
        assert_eq!(
            validate_record(&record),
            vec![QualityIssue::ContactInfoMissing]
        );

        record.phone = Some("2101234567".to_string());
        assert!(validate_record(&record).is_empty());
    }

    #[test]
    fn email_needs_a_body() {
        let mut record = UnifiedRecord::new(Source::Email, "mail.eml");
        record.customer_name = Some("Μαρία".to_string());
        assert_eq!(validate_record(&record), vec![QualityIssue::EmptyEmailBody]);
    }

    #[test]
    fn validation_is_deterministic() {
        let record = UnifiedRecord::new(Source::Email, "mail.eml");
        assert_eq!(validate_record(&record), validate_record(&record));
    }

    #[test]
    fn apply_quality_checks_sets_status_and_appends_notes() {
        let mut flagged = UnifiedRecord::new(Source::Form, "form.html");
        flagged.notes = Some("extracted from HTML form".to_string());
        let clean = invoice(100.0, 24.0, 124.0);

        let checked = apply_quality_checks(&[flagged.clone(), clean.clone()]);

        assert_eq!(checked[0].status, RecordStatus::NeedsReview);
        assert_eq!(
            checked[0].notes.as_deref(),
            Some("extracted from HTML form quality: missing customer name; contact info missing")
        );
        assert_eq!(checked[1].status, RecordStatus::AutoValid);
        assert_eq!(checked[1].notes, clean.notes);
        assert_eq!(flagged.status, RecordStatus::PendingReview);
    }

    #[test]
    fn reapplying_checks_appends_a_second_note() {
        let record = UnifiedRecord::new(Source::Email, "mail.eml");

        let once = apply_quality_checks(&[record]);
        let twice = apply_quality_checks(&once);

        assert_eq!(
            twice[0].notes.as_deref(),
            Some(
                "quality: missing customer name; empty email body \
                 quality: missing customer name; empty email body"
            )
        );
    }
}
