use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::EnrichmentError;
use crate::model::UnifiedRecord;
use crate::util::truncate_chars;

const PROMPT_MESSAGE_CHARS: usize = 1200;

const SYSTEM_PROMPT: &str = "You extract business metadata. Respond ONLY with a minimal JSON object \
containing 'service_interest', 'priority', 'message_summary', and optionally 'missing_fields'. \
Priority must be exactly high, medium, or low. message_summary must be a single, complete sentence \
(same language as the user) that reflects the core need expressed in the content, without lists, \
numbering, or trailing conjunctions.";

/// Fields sent to the model for one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelRequest {
    pub customer: String,
    pub company: String,
    pub service: String,
    pub priority: String,
    pub message: String,
}

impl ModelRequest {
    pub fn from_record(record: &UnifiedRecord) -> Self {
        Self {
            customer: record.customer_name.clone().unwrap_or_default(),
            company: record.company.clone().unwrap_or_default(),
            service: record.service.clone().unwrap_or_default(),
            priority: record.priority.clone().unwrap_or_default(),
            message: truncate_chars(
                record.message.as_deref().unwrap_or_default(),
                PROMPT_MESSAGE_CHARS,
            )
            .to_string(),
        }
    }

    pub fn to_prompt(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Structured answer expected back from the model. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ModelInsights {
    #[serde(default)]
    pub service_interest: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub message_summary: Option<String>,
    #[serde(default)]
    pub missing_fields: Option<Value>,
}

impl ModelInsights {
    /// `missing_fields.company` when the model supplied one as text.
    pub fn missing_company(&self) -> Option<&str> {
        self.missing_fields
            .as_ref()
            .and_then(|fields| fields.get("company"))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|company| !company.is_empty())
    }
}

/// Remote language model used to fill gaps the local heuristics cannot.
pub trait ModelClient {
    fn complete(&self, request: &ModelRequest) -> Result<ModelInsights, EnrichmentError>;
}

/// OpenAI-compatible `chat/completions` client.
pub struct OpenAiClient {
    http: reqwest::blocking::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(api_key: &str, model: &str, base_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client for model enrichment")?;

        Ok(Self {
            http,
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ModelClient for OpenAiClient {
    fn complete(&self, request: &ModelRequest) -> Result<ModelInsights, EnrichmentError> {
        let payload = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": request.to_prompt() },
            ],
            "temperature": 0.2,
            "max_tokens": 200,
        });

        let response: ChatCompletionResponse = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()?
            .error_for_status()?
            .json()?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(EnrichmentError::EmptyResponse)?;

        parse_insights(&content)
    }
}

/// Parses the model's message content, tolerating a surrounding code fence.
pub fn parse_insights(content: &str) -> Result<ModelInsights, EnrichmentError> {
    let trimmed = content.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|inner| inner.strip_suffix("```"))
        .unwrap_or(trimmed);

    Ok(serde_json::from_str(unfenced.trim())?)
}
