use crate::model::UnifiedRecord;
use crate::text::{collapse_whitespace, normalize_date};

pub const TEMPLATE_HEADERS: [&str; 14] = [
    "Type",
    "Source",
    "Date",
    "Client_Name",
    "Email",
    "Phone",
    "Company",
    "Service_Interest",
    "Amount",
    "VAT",
    "Total_Amount",
    "Invoice_Number",
    "Priority",
    "Message",
];

/// One output row in `TEMPLATE_HEADERS` order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateRow {
    pub kind: String,
    pub source: String,
    pub date: String,
    pub client_name: String,
    pub email: String,
    pub phone: String,
    pub company: String,
    pub service_interest: String,
    pub amount: String,
    pub vat: String,
    pub total_amount: String,
    pub invoice_number: String,
    pub priority: String,
    pub message: String,
}

impl TemplateRow {
    pub fn cells(&self) -> [&str; 14] {
        [
            &self.kind,
            &self.source,
            &self.date,
            &self.client_name,
            &self.email,
            &self.phone,
            &self.company,
            &self.service_interest,
            &self.amount,
            &self.vat,
            &self.total_amount,
            &self.invoice_number,
            &self.priority,
            &self.message,
        ]
    }
}

pub fn record_to_template_row(record: &UnifiedRecord) -> TemplateRow {
    TemplateRow {
        kind: record.source().as_str().to_uppercase(),
        source: collapse_whitespace(record.source_name()),
        date: collapse_whitespace(&record_date(record)),
        client_name: clean_text(record.customer_name.as_deref()),
        email: record.email.clone().unwrap_or_default(),
        phone: record.phone.clone().unwrap_or_default(),
        company: clean_text(record.company.as_deref()),
        service_interest: clean_text(record.service.as_deref()),
        amount: format_amount(record.net_amount),
        vat: format_amount(record.vat_amount),
        total_amount: format_amount(record.total_amount),
        invoice_number: record.invoice_number.clone().unwrap_or_default(),
        priority: record.priority.clone().unwrap_or_default(),
        message: clean_text(record.message.as_deref()),
    }
}

pub fn records_to_template_rows(records: &[UnifiedRecord]) -> Vec<TemplateRow> {
    records.iter().map(record_to_template_row).collect()
}

fn clean_text(value: Option<&str>) -> String {
    value.map(collapse_whitespace).unwrap_or_default()
}

fn format_amount(value: Option<f64>) -> String {
    value.map(|amount| format!("{amount:.2}")).unwrap_or_default()
}

/// Submission date, else invoice date, normalized; empty when neither is set.
fn record_date(record: &UnifiedRecord) -> String {
    [record.submission_date.as_deref(), record.invoice_date.as_deref()]
        .into_iter()
        .flatten()
        .map(normalize_date)
        .find(|date| !date.is_empty())
        .unwrap_or_default()
}
