use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Url;
use serde_json::json;
use tracing::{debug, info};

use crate::template::{TEMPLATE_HEADERS, TemplateRow};

const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// Worksheet to replace plus the OAuth bearer token allowed to write it.
#[derive(Clone, PartialEq, Eq)]
pub struct SheetsTarget {
    pub spreadsheet_id: String,
    pub worksheet: String,
    access_token: String,
}

impl SheetsTarget {
    pub fn new(spreadsheet_id: &str, worksheet: &str, access_token: &str) -> Self {
        Self {
            spreadsheet_id: spreadsheet_id.to_string(),
            worksheet: worksheet.to_string(),
            access_token: access_token.to_string(),
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Whole-sheet A1 range, quoted so names with spaces stay valid.
    pub fn range(&self) -> String {
        format!("'{}'", self.worksheet.replace('\'', "''"))
    }
}

impl std::fmt::Debug for SheetsTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SheetsTarget")
            .field("spreadsheet_id", &self.spreadsheet_id)
            .field("worksheet", &self.worksheet)
            .finish_non_exhaustive()
    }
}

/// Replaces a worksheet's contents with the header followed by `rows`.
pub trait SheetsUploader {
    fn upload(&self, rows: &[TemplateRow], target: &SheetsTarget) -> Result<()>;
}

/// Header row followed by one row of cells per record.
pub fn sheet_values(rows: &[TemplateRow]) -> Vec<Vec<String>> {
    let mut values = Vec::with_capacity(rows.len() + 1);
    values.push(TEMPLATE_HEADERS.iter().map(|header| header.to_string()).collect());
    values.extend(
        rows.iter()
            .map(|row| row.cells().iter().map(|cell| cell.to_string()).collect()),
    );
    values
}

/// Google Sheets v4 REST client.
pub struct HttpSheetsUploader {
    http: reqwest::blocking::Client,
    api_base: String,
}

impl HttpSheetsUploader {
    pub fn new(timeout: Duration) -> Result<Self> {
        Self::with_api_base(SHEETS_API_BASE, timeout)
    }

    pub fn with_api_base(api_base: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client for sheets upload")?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    fn values_url(&self, target: &SheetsTarget, action: &str) -> Result<Url> {
        let mut url = Url::parse(&self.api_base)
            .with_context(|| format!("invalid sheets api base url: {}", self.api_base))?;
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("sheets api base url cannot take a path"))?
            .push(&target.spreadsheet_id)
            .push("values")
            .push(&format!("{}:{action}", target.range()));
        Ok(url)
    }
}

impl SheetsUploader for HttpSheetsUploader {
    fn upload(&self, rows: &[TemplateRow], target: &SheetsTarget) -> Result<()> {
        if rows.is_empty() {
            debug!(spreadsheet_id = %target.spreadsheet_id, "no rows, skipping sheets upload");
            return Ok(());
        }

        let clear_url = self.values_url(target, "clear")?;
        self.http
            .post(clear_url)
            .bearer_auth(target.access_token())
            .json(&json!({}))
            .send()
            .and_then(|response| response.error_for_status())
            .with_context(|| format!("failed to clear worksheet {}", target.worksheet))?;

        let mut append_url = self.values_url(target, "append")?;
        append_url
            .query_pairs_mut()
            .append_pair("valueInputOption", "RAW");
        self.http
            .post(append_url)
            .bearer_auth(target.access_token())
            .json(&json!({ "values": sheet_values(rows) }))
            .send()
            .and_then(|response| response.error_for_status())
            .with_context(|| format!("failed to append rows to worksheet {}", target.worksheet))?;

        info!(
            spreadsheet_id = %target.spreadsheet_id,
            worksheet = %target.worksheet,
            rows = rows.len(),
            "pushed rows to google sheets"
        );
        Ok(())
    }
}
