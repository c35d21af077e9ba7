mod heuristics;
mod remote;
#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::time::Duration;

use anyhow::Result;
use serde_json::json;
use tracing::{debug, info};

pub use heuristics::{
    DEFAULT_SUMMARY_CHARS, FALLBACK_SUMMARY_CHARS, NeedStatementRules, clean_phrase,
    indicates_missing_info, normalize_priority, normalize_service,
};
pub use remote::{ModelClient, ModelInsights, ModelRequest, OpenAiClient, parse_insights};

use crate::config::EnrichmentConfig;
use crate::model::{Source, UnifiedRecord, non_empty};
use crate::util::{sha256_hex, truncate_chars};

const LONG_MESSAGE_CHARS: usize = 360;
const FINGERPRINT_MESSAGE_CHARS: usize = 500;

/// How missing fields get filled, decided once when the enricher is built.
pub enum EnrichmentMode {
    LocalHeuristic,
    RemoteModel(Box<dyn ModelClient>),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum SummaryOrigin {
    Model,
    Heuristic,
}

/// Candidate values for the fields enrichment owns.
#[derive(Debug, Clone)]
struct Suggestion {
    priority: Option<String>,
    service: Option<String>,
    summary: Option<String>,
    origin: SummaryOrigin,
    company: Option<String>,
}

impl Suggestion {
    fn from_model(insights: &ModelInsights) -> Self {
        Self {
            priority: insights.priority.clone(),
            service: insights.service_interest.clone(),
            summary: insights.message_summary.clone(),
            origin: SummaryOrigin::Model,
            company: insights.missing_company().map(str::to_string),
        }
    }
}

pub struct Enricher {
    mode: EnrichmentMode,
    rules: NeedStatementRules,
    cache: HashMap<String, ModelInsights>,
}

impl Enricher {
    pub fn new(mode: EnrichmentMode) -> Result<Self> {
        Ok(Self {
            mode,
            rules: NeedStatementRules::new()?,
            cache: HashMap::new(),
        })
    }

    pub fn local() -> Result<Self> {
        Self::new(EnrichmentMode::LocalHeuristic)
    }

    /// Remote model when enabled and an API key is present, local heuristics
    /// otherwise.
    pub fn from_config(config: &EnrichmentConfig) -> Result<Self> {
        let mode = match config.api_key.as_deref() {
            Some(api_key) if !config.disabled => {
                let client = OpenAiClient::new(
                    api_key,
                    &config.model,
                    &config.base_url,
                    Duration::from_secs(config.timeout_secs),
                )?;
                EnrichmentMode::RemoteModel(Box::new(client))
            }
            _ => EnrichmentMode::LocalHeuristic,
        };

        let enricher = Self::new(mode)?;
        info!(mode = enricher.mode_label(), model = %config.model, "enrichment configured");
        Ok(enricher)
    }

    pub fn mode_label(&self) -> &'static str {
        match self.mode {
            EnrichmentMode::LocalHeuristic => "local_heuristic",
            EnrichmentMode::RemoteModel(_) => "remote_model",
        }
    }

    pub fn cached_responses(&self) -> usize {
        self.cache.len()
    }

    pub fn enrich_records(&mut self, records: &[UnifiedRecord]) -> Vec<UnifiedRecord> {
        records.iter().map(|record| self.enrich(record)).collect()
    }

    /// Returns an enriched copy of `record`. Model failures fall back to the
    /// local heuristics and are never surfaced.
    pub fn enrich(&mut self, record: &UnifiedRecord) -> UnifiedRecord {
        let insights = match &self.mode {
            EnrichmentMode::RemoteModel(client) if needs_model_call(record) => {
                let key = fingerprint(record);
                if let Some(cached) = self.cache.get(&key).cloned() {
                    debug!(source_name = %record.source_name(), "reusing cached model response");
                    Some(cached)
                } else {
                    match client.complete(&ModelRequest::from_record(record)) {
                        Ok(insights) => {
                            self.cache.insert(key, insights.clone());
                            Some(insights)
                        }
                        Err(err) => {
                            debug!(
                                source_name = %record.source_name(),
                                error = %err,
                                "model enrichment failed, using heuristics"
                            );
                            None
                        }
                    }
                }
            }
            _ => None,
        };

        let suggestion = match insights {
            Some(insights) => Suggestion::from_model(&insights),
            None => self.fallback(record),
        };
        self.apply_updates(record, suggestion)
    }

    fn fallback(&self, record: &UnifiedRecord) -> Suggestion {
        Suggestion {
            priority: normalize_priority(record.priority.as_deref()),
            service: normalize_service(record.service.as_deref()),
            summary: non_empty(
                self.rules
                    .smart_shorten(record.message.as_deref().unwrap_or_default(), DEFAULT_SUMMARY_CHARS),
            ),
            origin: SummaryOrigin::Heuristic,
            company: None,
        }
    }

    fn apply_updates(&self, record: &UnifiedRecord, suggestion: Suggestion) -> UnifiedRecord {
        let mut enriched = record.clone();

        if record.source() != Source::Invoice {
            let priority = normalize_priority(record.priority.as_deref())
                .or_else(|| normalize_priority(suggestion.priority.as_deref()));
            if priority.is_some() {
                enriched.priority = priority;
            }

            enriched.service = normalize_service(record.service.as_deref())
                .or_else(|| normalize_service(suggestion.service.as_deref()));
        }

        let message = self.need_message(
            record,
            suggestion.summary.as_deref(),
            suggestion.origin,
            enriched.service.as_deref(),
        );
        if !message.is_empty() {
            enriched.message = Some(message);
        }

        if record.company.as_deref().is_none_or(|company| company.trim().is_empty()) {
            if let Some(company) = suggestion.company {
                enriched.company = Some(company);
            }
        }

        enriched
    }

    /// Single need statement for the message column, preferring the model's
    /// summary, then trigger phrases, then the shortened original text.
    fn need_message(
        &self,
        record: &UnifiedRecord,
        summary: Option<&str>,
        origin: SummaryOrigin,
        service: Option<&str>,
    ) -> String {
        let summary = summary.filter(|text| !text.trim().is_empty());
        let from_model = origin == SummaryOrigin::Model;

        if let (true, Some(summary)) = (from_model, summary) {
            let candidate = self
                .rules
                .need_statement(summary)
                .unwrap_or_else(|| summary.to_string());
            let candidate = clean_phrase(&candidate);
            if !candidate.is_empty() && !indicates_missing_info(&candidate) {
                return candidate;
            }
        }

        let texts = [(record.message.as_deref(), false), (summary, true)];
        for (text, is_summary) in texts {
            let Some(text) = text.filter(|text| !text.trim().is_empty()) else {
                continue;
            };
            let Some(phrase) = self.rules.need_statement(text) else {
                continue;
            };
            let cleaned = clean_phrase(&phrase);
            if cleaned.is_empty() || indicates_missing_info(&cleaned) {
                continue;
            }
            if from_model && is_summary {
                return cleaned;
            }
            return self.rules.single_sentence(&cleaned);
        }

        let fallback = summary
            .or(record.message.as_deref())
            .unwrap_or_default();
        if !fallback.trim().is_empty() && !indicates_missing_info(fallback) {
            if let (true, Some(summary)) = (from_model, summary) {
                return clean_phrase(summary);
            }
            return self
                .rules
                .single_sentence(&self.rules.smart_shorten(fallback, FALLBACK_SUMMARY_CHARS));
        }

        match service {
            Some(service) => self
                .rules
                .single_sentence(&format!("Χρειαζόμαστε λύση για {service}")),
            None => String::new(),
        }
    }
}

/// Whether a record lacks enough local signal to skip the model. Invoices
/// never qualify.
pub fn needs_model_call(record: &UnifiedRecord) -> bool {
    if record.source() == Source::Invoice {
        return false;
    }

    let message = record.message.as_deref().unwrap_or_default().trim();
    let missing_core_fields = normalize_priority(record.priority.as_deref()).is_none()
        || normalize_service(record.service.as_deref()).is_none();
    let message_missing = message.is_empty() || indicates_missing_info(message);
    let message_long = message.chars().count() > LONG_MESSAGE_CHARS;

    missing_core_fields || message_missing || message_long
}

/// Stable hash of the fields a model response depends on.
pub fn fingerprint(record: &UnifiedRecord) -> String {
    let canonical = json!({
        "company": record.company,
        "message": truncate_chars(
            record.message.as_deref().unwrap_or_default(),
            FINGERPRINT_MESSAGE_CHARS,
        ),
        "priority": record.priority,
        "service": record.service,
    });
    sha256_hex(canonical.to_string().as_bytes())
}
