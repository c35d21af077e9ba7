use std::path::PathBuf;

use thiserror::Error;

/// A single source file could not be turned into a record.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("source is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error("malformed MIME message: {0}")]
    Mime(#[from] mailparse::MailParseError),

    #[error("invalid amount '{raw}'")]
    InvalidAmount { raw: String },

    #[error("unsupported value '{value}' for field {field}")]
    InvalidField { field: String, value: String },
}

/// Remote enrichment failed; always recovered by the local heuristics.
#[derive(Debug, Error)]
pub enum EnrichmentError {
    #[error("model request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("model response had no message content")]
    EmptyResponse,

    #[error("model response was not the expected JSON object: {0}")]
    MalformedResponse(#[from] serde_json::Error),
}
