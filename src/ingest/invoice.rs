use anyhow::{Context, Result};
use regex::Regex;

use super::SourceParser;
use crate::error::ParseError;
use crate::model::{Source, UnifiedRecord, non_empty};
use crate::text::{HtmlFlattener, clean_amount};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum InvoiceField {
    Number,
    Date,
    Customer,
    Net,
    Vat,
    Total,
}

/// Greek and English labels per field, tried in order.
const INVOICE_LABELS: &[(InvoiceField, &[&str])] = &[
    (InvoiceField::Number, &["Αριθμός", "Invoice"]),
    (InvoiceField::Date, &["Ημερομηνία", "Date"]),
    (InvoiceField::Customer, &["Πελάτης", "Customer"]),
    (InvoiceField::Net, &["Καθαρή Αξία", "Καθ. Αξία", "Net"]),
    (InvoiceField::Vat, &["ΦΠΑ 24%", "VAT"]),
    (InvoiceField::Total, &["ΣΥΝΟΛΟ", "Total"]),
];

pub struct InvoiceParser {
    flattener: HtmlFlattener,
    euro_amount: Regex,
}

impl InvoiceParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            flattener: HtmlFlattener::new()?,
            euro_amount: Regex::new(r"€\s*[\d.,]+").context("failed to compile euro amount regex")?,
        })
    }
}

impl SourceParser for InvoiceParser {
    fn source(&self) -> Source {
        Source::Invoice
    }

    fn directory(&self) -> &'static str {
        "invoices"
    }

    fn extension(&self) -> &'static str {
        "html"
    }

    fn parse(&self, source_name: &str, raw: &[u8]) -> Result<UnifiedRecord, ParseError> {
        let content = std::str::from_utf8(raw)?;
        let text = self.flattener.html_to_text(content).replace('\r', "");
        let lines = text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .collect::<Vec<&str>>();

        let total_raw = value_for(&lines, InvoiceField::Total).or_else(|| {
            self.euro_amount
                .find_iter(&text)
                .last()
                .map(|found| found.as_str().to_string())
        });

        let mut record = UnifiedRecord::new(Source::Invoice, source_name);
        record.invoice_number = value_for(&lines, InvoiceField::Number);
        record.invoice_date = value_for(&lines, InvoiceField::Date);
        record.customer_name = value_for(&lines, InvoiceField::Customer);
        record.net_amount = parse_amount(value_for(&lines, InvoiceField::Net))?;
        record.vat_amount = parse_amount(value_for(&lines, InvoiceField::Vat))?;
        record.total_amount = parse_amount(total_raw)?;
        record.currency = Some("EUR".to_string());
        record.notes = Some("extracted from HTML invoice".to_string());
        Ok(record)
    }
}

fn labels_for(field: InvoiceField) -> &'static [&'static str] {
    INVOICE_LABELS
        .iter()
        .find(|(candidate, _)| *candidate == field)
        .map(|(_, labels)| *labels)
        .unwrap_or(&[])
}

/// Value following the first matching label: the rest of the label's line,
/// or the next line when the label stands alone and that line is not
/// itself a label.
fn value_for(lines: &[&str], field: InvoiceField) -> Option<String> {
    let labels = labels_for(field);

    for label in labels {
        let label_lower = label.to_lowercase();
        for (index, line) in lines.iter().enumerate() {
            let lowered = line.to_lowercase();
            let Some(position) = lowered.find(&label_lower) else {
                continue;
            };

            let skip = lowered[..position].chars().count() + label_lower.chars().count();
            let remainder = line.chars().skip(skip).collect::<String>();
            let mut value = remainder
                .trim_start_matches([':', ' '])
                .to_string();

            if value.is_empty() {
                if let Some(next) = lines.get(index + 1).map(|next| next.trim()) {
                    let next_lower = next.to_lowercase();
                    let is_label = labels
                        .iter()
                        .any(|candidate| next_lower.contains(&candidate.to_lowercase()));
                    if !next.is_empty() && !is_label {
                        value = next.to_string();
                    }
                }
            }

            return non_empty(value.trim_matches([' ', '-']));
        }
    }

    None
}

fn parse_amount(raw: Option<String>) -> Result<Option<f64>, ParseError> {
    raw.map(|value| clean_amount(&value)).transpose()
}
