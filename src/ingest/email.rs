use anyhow::{Context, Result};
use mailparse::{DispositionType, MailAddr, MailHeaderMap, ParsedMail};
use regex::Regex;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use super::SourceParser;
use crate::error::ParseError;
use crate::model::{Source, UnifiedRecord, non_empty};
use crate::text::{HtmlFlattener, normalize_date};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum ContactField {
    CustomerName,
    Email,
    Phone,
    Company,
}

/// Body labels for `label: value` contact lines. Matched by containment after
/// case folding and accent stripping, first entry wins.
const CONTACT_LABELS: &[(&str, ContactField)] = &[
    ("όνομα", ContactField::CustomerName),
    ("name", ContactField::CustomerName),
    ("email", ContactField::Email),
    ("e-mail", ContactField::Email),
    ("τηλέφωνο", ContactField::Phone),
    ("κινητό", ContactField::Phone),
    ("τηλ", ContactField::Phone),
    ("phone", ContactField::Phone),
    ("εταιρεία", ContactField::Company),
    ("company", ContactField::Company),
    ("προμηθευτής", ContactField::Company),
    ("supplier", ContactField::Company),
];

const BULLET_MARKERS: &[char] = &['-', '•', '*'];

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct ContactDetails {
    pub customer_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
}

impl ContactDetails {
    fn slot(&mut self, field: ContactField) -> &mut Option<String> {
        match field {
            ContactField::CustomerName => &mut self.customer_name,
            ContactField::Email => &mut self.email,
            ContactField::Phone => &mut self.phone,
            ContactField::Company => &mut self.company,
        }
    }
}

pub struct EmailParser {
    flattener: HtmlFlattener,
    labels: Vec<(String, ContactField)>,
    email_address: Regex,
    labeled_phone: Regex,
    phone_noise: Regex,
}

impl EmailParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            flattener: HtmlFlattener::new()?,
            labels: CONTACT_LABELS
                .iter()
                .map(|(label, field)| (fold_label(label), *field))
                .collect(),
            email_address: Regex::new(r"[\w.+-]+@[\w.-]+")
                .context("failed to compile email address regex")?,
            labeled_phone: Regex::new(
                r"(?i)(?:τηλ|τηλέφωνο|κινητό|phone|tel)\s*[:\-]?\s*(\+?\d[\d\s\-]{6,})",
            )
            .context("failed to compile labeled phone regex")?,
            phone_noise: Regex::new(r"[^\d+]").context("failed to compile phone noise regex")?,
        })
    }

    pub(crate) fn extract_contact(&self, text: &str) -> ContactDetails {
        let text = normalize_newlines(text);
        let mut contact = ContactDetails::default();

        for raw_line in text.lines() {
            let Some((label, value)) = raw_line.split_once(':') else {
                continue;
            };
            let label = fold_label(label.trim_start_matches(BULLET_MARKERS).trim());
            let value = value.trim();

            let Some(field) = self
                .labels
                .iter()
                .find(|(token, _)| label.contains(token.as_str()))
                .map(|(_, field)| *field)
            else {
                continue;
            };

            let cleaned = if field == ContactField::Phone {
                value.split_whitespace().collect::<String>()
            } else {
                value.to_string()
            };

            let slot = contact.slot(field);
            if slot.is_none() {
                *slot = non_empty(cleaned);
            }
        }

        if contact.email.is_none() {
            contact.email = self
                .email_address
                .find(&text)
                .map(|found| found.as_str().to_string());
        }

        if contact.phone.is_none() {
            contact.phone = self
                .labeled_phone
                .captures(&text)
                .and_then(|captures| captures.get(1))
                .and_then(|digits| non_empty(self.phone_noise.replace_all(digits.as_str(), "")));
        }

        contact
    }

    fn text_body(&self, mail: &ParsedMail<'_>) -> Result<String, ParseError> {
        if !mail.subparts.is_empty() {
            let preferred =
                find_body_part(mail, "text/plain").or_else(|| find_body_part(mail, "text/html"));
            if let Some(part) = preferred {
                return self.render_text_part(part);
            }
        }

        if mail.ctype.mimetype.starts_with("text/") {
            return self.render_text_part(mail);
        }

        let body = mail.get_body()?;
        Ok(body.replace('\u{FFFD}', "").trim().to_string())
    }

    fn render_text_part(&self, part: &ParsedMail<'_>) -> Result<String, ParseError> {
        let content = part.get_body()?;
        if part.ctype.mimetype == "text/html" {
            Ok(self.flattener.html_to_text(&content))
        } else {
            Ok(content.trim().to_string())
        }
    }
}

impl SourceParser for EmailParser {
    fn source(&self) -> Source {
        Source::Email
    }

    fn directory(&self) -> &'static str {
        "emails"
    }

    fn extension(&self) -> &'static str {
        "eml"
    }

    fn parse(&self, source_name: &str, raw: &[u8]) -> Result<UnifiedRecord, ParseError> {
        let mail = mailparse::parse_mail(raw)?;

        let subject = header_value(&mail, "Subject").unwrap_or_default();
        let from = header_value(&mail, "From").unwrap_or_default();
        let date = header_value(&mail, "Date");

        let body = normalize_newlines(&self.text_body(&mail)?);
        let contact = self.extract_contact(&body);
        let (header_name, header_address) = parse_from_header(&from);

        let mut record = UnifiedRecord::new(Source::Email, source_name);
        record.customer_name = contact.customer_name.or(header_name);
        record.email = contact.email.or(header_address);
        record.phone = contact.phone;
        record.company = contact.company;
        record.message = non_empty(body);
        record.service = non_empty(subject.trim());
        record.submission_date = date.and_then(|value| non_empty(normalize_date(&value)));
        record.notes = Some("parsed from email header and body".to_string());
        Ok(record)
    }
}

/// Case-folds and strips combining accents so `Τηλέφωνο` matches `τηλεφωνο`.
fn fold_label(value: &str) -> String {
    value
        .to_lowercase()
        .nfd()
        .filter(|ch| !is_combining_mark(*ch))
        .map(|ch| if ch == 'ς' { 'σ' } else { ch })
        .collect()
}

fn normalize_newlines(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

fn header_value(mail: &ParsedMail<'_>, name: &str) -> Option<String> {
    mail.headers
        .get_first_header(name)
        .map(|header| header.get_value_utf8().unwrap_or_else(|_| header.get_value()))
        .and_then(non_empty)
}

fn find_body_part<'a>(mail: &'a ParsedMail<'a>, mimetype: &str) -> Option<&'a ParsedMail<'a>> {
    if mail.subparts.is_empty() {
        let is_attachment = matches!(
            mail.get_content_disposition().disposition,
            DispositionType::Attachment
        );
        return (mail.ctype.mimetype == mimetype && !is_attachment).then_some(mail);
    }

    mail.subparts
        .iter()
        .find_map(|part| find_body_part(part, mimetype))
}

fn parse_from_header(from: &str) -> (Option<String>, Option<String>) {
    let Ok(addresses) = mailparse::addrparse(from) else {
        return (None, None);
    };

    let single = addresses.iter().find_map(|address| match address {
        MailAddr::Single(info) => Some(info.clone()),
        MailAddr::Group(group) => group.addrs.first().cloned(),
    });

    match single {
        Some(info) => (
            info.display_name.and_then(non_empty),
            non_empty(info.addr),
        ),
        None => (None, None),
    }
}
