use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;

use crate::error::ParseError;

const CURRENCY_SYMBOLS: &[char] = &['€', '$', '£'];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%d-%m-%Y"];
const MONTH_ABBREVIATIONS: &[&str] = &[
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"];

/// Flattens HTML markup into one normalized text line per block.
///
/// Entities are decoded after tags are stripped, so markup that was only
/// entity-escaped in the source (`&lt;b&gt;`) comes out as literal tags and
/// is removed by a second pass.
#[derive(Debug)]
pub struct HtmlFlattener {
    line_break: Regex,
    block_close: Regex,
    tag: Regex,
}

impl HtmlFlattener {
    pub fn new() -> Result<Self> {
        Ok(Self {
            line_break: Regex::new(r"(?i)<\s*br\s*/?>").context("failed to compile <br> regex")?,
            block_close: Regex::new(r"(?i)</\s*(?:p|div)\s*>")
                .context("failed to compile block-close regex")?,
            tag: Regex::new(r"<[^>]+>").context("failed to compile tag regex")?,
        })
    }

    pub fn html_to_text(&self, raw: &str) -> String {
        let with_breaks = self.line_break.replace_all(raw, "\n");
        let with_breaks = self.block_close.replace_all(&with_breaks, "\n");
        let without_tags = self.tag.replace_all(&with_breaks, " ");
        let unescaped = html_escape::decode_html_entities(&without_tags);

        unescaped
            .lines()
            .map(collapse_whitespace)
            .filter(|line| !line.is_empty())
            .collect::<Vec<String>>()
            .join("\n")
    }
}

pub fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<&str>>().join(" ")
}

/// Parses a currency amount written with either European (`1.234,56`) or
/// US (`1,234.56`) separators.
pub fn clean_amount(raw: &str) -> Result<f64, ParseError> {
    let stripped = raw
        .chars()
        .filter(|ch| !ch.is_whitespace() && !CURRENCY_SYMBOLS.contains(ch))
        .collect::<String>();

    let normalized = if has_comma_decimals(&stripped) {
        stripped.replace('.', "").replace(',', ".")
    } else {
        stripped.replace(',', "")
    };

    normalized
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| ParseError::InvalidAmount {
            raw: raw.to_string(),
        })
}

fn has_comma_decimals(value: &str) -> bool {
    let bytes = value.as_bytes();
    let len = bytes.len();
    len >= 3
        && bytes[len - 3] == b','
        && bytes[len - 2].is_ascii_digit()
        && bytes[len - 1].is_ascii_digit()
}

/// Normalizes a date to `YYYY-MM-DD`; unrecognized input comes back trimmed
/// but otherwise unchanged.
pub fn normalize_date(raw: &str) -> String {
    let text = raw.trim();
    if text.is_empty() {
        return String::new();
    }

    if let Some((date_part, _)) = text.split_once('T') {
        if date_part.chars().count() == 10 {
            if let Ok(date) = NaiveDate::parse_from_str(date_part, "%Y-%m-%d") {
                return iso_date(date);
            }
        }
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return iso_date(date);
        }
    }

    for format in DATETIME_FORMATS {
        if let Ok(timestamp) = NaiveDateTime::parse_from_str(text, format) {
            return iso_date(timestamp.date());
        }
    }

    if let Ok(parsed) = DateTime::parse_from_rfc2822(text) {
        return iso_date(parsed.with_timezone(&Utc).date_naive());
    }

    // chrono rejects a weekday that disagrees with the date; mailparse does not.
    if looks_like_mail_date(text) {
        if let Some(parsed) = mailparse::dateparse(text)
            .ok()
            .filter(|seconds| *seconds != 0)
            .and_then(|seconds| DateTime::<Utc>::from_timestamp(seconds, 0))
        {
            return iso_date(parsed.date_naive());
        }
    }

    text.to_string()
}

/// A day number, an English month name and a four-digit year, as in an
/// RFC 2822 `Date` header.
fn looks_like_mail_date(text: &str) -> bool {
    let tokens = text
        .split(|ch: char| !ch.is_ascii_alphanumeric())
        .filter(|token| !token.is_empty())
        .collect::<Vec<&str>>();

    let has_month = tokens.iter().any(|token| {
        token.len() >= 3
            && MONTH_ABBREVIATIONS.contains(&token[..3].to_ascii_lowercase().as_str())
    });
    let has_day = tokens
        .iter()
        .any(|token| (1..=2).contains(&token.len()) && token.bytes().all(|b| b.is_ascii_digit()));
    let has_year = tokens
        .iter()
        .any(|token| token.len() == 4 && token.bytes().all(|b| b.is_ascii_digit()));

    has_month && has_day && has_year
}

fn iso_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
