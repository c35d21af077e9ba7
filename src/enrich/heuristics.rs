use anyhow::{Context, Result};
use regex::Regex;

use crate::text::collapse_whitespace;
use crate::util::truncate_chars;

const PRIORITY_LEVELS: &[&str] = &["high", "medium", "low"];

const PRIORITY_TRANSLATIONS: &[(&str, &str)] = &[
    ("υψηλή", "high"),
    ("μεσαία", "medium"),
    ("μέτρια", "medium"),
    ("χαμηλή", "low"),
];

const SERVICE_PLACEHOLDERS: &[&str] = &[
    "not specified",
    "unknown",
    "n/a",
    "na",
    "none",
    "no service",
    "χωρίς υπηρεσία",
];

/// Substrings marking text that only says the information is absent.
const MISSING_INFO_MARKERS: &[&str] = &[
    "not specified",
    "not provided",
    "no service",
    "no priority",
    "no specific service",
    "no specific priority",
    "unknown",
    "n/a",
    "none",
    "χωρίς πληροφορίες",
    "χωρίς υπηρεσία",
    "χωρίς προτεραιότητα",
    "δεν παρείχε",
    "δεν αναφέρ",
];

/// Lower-case openers of a "what we need" statement, checked in order.
const NEED_KEYWORDS: &[&str] = &[
    "χρειαζόμαστε",
    "χρειάζομαι",
    "θέλουμε",
    "θέλω",
    "ζητάμε",
    "ζητούμε",
    "αναζητούμε",
    "we need",
    "we want",
];

const TRAILING_CONNECTORS: &[&str] = &[
    "γιατί", "διότι", "επειδή", "because", "since", "ώστε", "so that", "για να",
];

const SENTENCE_END: &[char] = &['.', '!', '?', '…'];

pub const DEFAULT_SUMMARY_CHARS: usize = 240;
pub const FALLBACK_SUMMARY_CHARS: usize = 200;

pub fn normalize_priority(value: Option<&str>) -> Option<String> {
    let lowered = value?.trim().to_lowercase();
    if PRIORITY_LEVELS.contains(&lowered.as_str()) {
        return Some(lowered);
    }
    PRIORITY_TRANSLATIONS
        .iter()
        .find(|(term, _)| *term == lowered)
        .map(|(_, level)| (*level).to_string())
}

/// Collapsed service text, or `None` for blanks and placeholder phrases.
pub fn normalize_service(value: Option<&str>) -> Option<String> {
    let cleaned = collapse_whitespace(value?);
    if cleaned.is_empty() || SERVICE_PLACEHOLDERS.contains(&cleaned.to_lowercase().as_str()) {
        return None;
    }
    Some(cleaned)
}

pub fn indicates_missing_info(text: &str) -> bool {
    let lowered = text.trim().to_lowercase();
    lowered.is_empty()
        || MISSING_INFO_MARKERS
            .iter()
            .any(|marker| lowered.contains(marker))
}

/// Text rules behind need statements and message shortening.
#[derive(Debug)]
pub struct NeedStatementRules {
    sentence_break: Regex,
    fragment_end: Regex,
    list_item: Regex,
    trailing_clauses: Vec<Regex>,
}

impl NeedStatementRules {
    pub fn new() -> Result<Self> {
        Ok(Self {
            sentence_break: Regex::new(r"[.!?]\s+").context("failed to compile sentence regex")?,
            fragment_end: Regex::new(r"[.!?\n]").context("failed to compile fragment regex")?,
            list_item: Regex::new(r"^(\d+[.)]\s*|[-•]\s*)")
                .context("failed to compile list item regex")?,
            trailing_clauses: vec![
                Regex::new(r"(?i)\s+για\s+(?:τον|την|το|τη|τους)\s+[^.?!]*?\b(?:μας|μου)\b.*$")
                    .context("failed to compile greek trailing clause regex")?,
                Regex::new(r"(?i)\s+for\s+our\b.*$")
                    .context("failed to compile english trailing clause regex")?,
            ],
        })
    }

    /// Splits after `.`, `!` or `?` followed by whitespace.
    fn sentences<'a>(&self, text: &'a str) -> Vec<&'a str> {
        let mut parts = Vec::new();
        let mut start = 0;
        for found in self.sentence_break.find_iter(text) {
            parts.push(&text[start..found.start() + 1]);
            start = found.end();
        }
        parts.push(&text[start..]);
        parts
    }

    /// Keeps whole sentences within `max_chars`; a single oversized sentence
    /// is cut and marked with an ellipsis.
    pub fn smart_shorten(&self, message: &str, max_chars: usize) -> String {
        let normalized = collapse_whitespace(message);
        if normalized.chars().count() <= max_chars {
            return normalized;
        }

        let mut kept: Vec<&str> = Vec::new();
        let mut total = 0;
        for sentence in self.sentences(&normalized) {
            let sentence = sentence.trim();
            if sentence.is_empty() {
                continue;
            }
            let projected = total + sentence.chars().count() + usize::from(!kept.is_empty());
            if projected > max_chars {
                break;
            }
            kept.push(sentence);
            total = projected;
        }

        if !kept.is_empty() {
            return kept.join(" ");
        }

        let cut = truncate_chars(&normalized, max_chars.saturating_sub(1)).trim_end();
        format!("{cut}…")
    }

    /// First sentence without a trailing "for our ..." clause or final
    /// punctuation.
    pub fn single_sentence(&self, text: &str) -> String {
        let compact = collapse_whitespace(text);
        if compact.is_empty() {
            return compact;
        }

        let first = self
            .sentences(&compact)
            .first()
            .copied()
            .unwrap_or_default();
        self.trim_trailing_clause(first)
            .trim_end_matches(SENTENCE_END)
            .trim()
            .to_string()
    }

    fn trim_trailing_clause<'a>(&self, text: &'a str) -> &'a str {
        for pattern in &self.trailing_clauses {
            if let Some(found) = pattern.find(text) {
                let trimmed = text[..found.start()].trim();
                if !trimmed.is_empty() {
                    return trimmed;
                }
            }
        }
        text
    }

    fn first_fragment<'a>(&self, text: &'a str) -> &'a str {
        match self.fragment_end.find(text) {
            Some(found) => &text[..found.start()],
            None => text,
        }
    }

    /// Extracts the line expressing what the writer needs. A trigger line
    /// ending in `:` is a heading and is joined with the next plain line.
    pub fn need_statement(&self, text: &str) -> Option<String> {
        let mut pending_heading: Option<String> = None;

        for raw in text.lines() {
            let normalized = raw.trim().trim_start_matches(['-', '•', ' ']).trim();
            if normalized.is_empty() {
                continue;
            }
            let lowered = normalized.to_lowercase();

            let mut matched_keyword = false;
            for keyword in NEED_KEYWORDS {
                if lowered.starts_with(keyword) {
                    matched_keyword = true;
                    let phrase = normalized.trim_end_matches(':');
                    if normalized.ends_with(':') {
                        pending_heading = Some(phrase.to_string());
                        break;
                    }
                    return Some(clean_phrase(phrase));
                }
                if let Some(position) = lowered.find(keyword) {
                    let snippet = slice_from_lowered(normalized, &lowered, position);
                    return Some(clean_phrase(self.first_fragment(&snippet)));
                }
            }

            if matched_keyword {
                continue;
            }

            if let Some(heading) = pending_heading.take() {
                if self.list_item.is_match(normalized) {
                    let phrase = clean_phrase(&heading);
                    if !phrase.is_empty() {
                        return Some(phrase);
                    }
                    continue;
                }
                return Some(clean_phrase(&format!("{heading} {normalized}")));
            }
        }

        if let Some(heading) = pending_heading {
            let phrase = clean_phrase(&heading);
            if !phrase.is_empty() {
                return Some(phrase);
            }
        }

        let flat = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect::<Vec<&str>>()
            .join(" ");
        let lowered_flat = flat.to_lowercase();
        NEED_KEYWORDS.iter().find_map(|keyword| {
            lowered_flat.find(keyword).map(|position| {
                let snippet = slice_from_lowered(&flat, &lowered_flat, position);
                clean_phrase(self.first_fragment(&snippet))
            })
        })
    }
}

/// Collapses whitespace, strips list markers at either end and drops a
/// dangling connector such as "because".
pub fn clean_phrase(text: &str) -> String {
    let collapsed = collapse_whitespace(text);
    let stripped = collapsed.trim_matches([' ', '-', '•', '\n', '\t']).trim();
    strip_trailing_connector(stripped).trim().to_string()
}

fn strip_trailing_connector(text: &str) -> &str {
    let body = text.trim_end_matches(SENTENCE_END).trim_end();
    let lowered = body.to_lowercase();

    for connector in TRAILING_CONNECTORS {
        if !lowered.ends_with(connector) {
            continue;
        }
        let keep = body.chars().count() - connector.chars().count();
        let head = truncate_chars(body, keep);
        if head.is_empty() || head.ends_with(char::is_whitespace) || head.ends_with(',') {
            return head.trim_end_matches([' ', ',', ':', ';', '-']);
        }
    }
    text
}

/// `original` from the character matching byte `position` of its lowercase
/// form.
fn slice_from_lowered(original: &str, lowered: &str, position: usize) -> String {
    let skip = lowered[..position].chars().count();
    original.chars().skip(skip).collect()
}
