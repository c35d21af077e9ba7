use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use anyhow::{Context, Result, bail};
use tracing::{debug, warn};

use crate::cli::{EnrichArgs, SheetsArgs};
use crate::export::SheetsTarget;

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-5-nano";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_WORKSHEET: &str = "Sheet1";

/// `KEY=value` pairs from a local secrets file. Only consulted for settings
/// that neither a flag nor the environment provided.
#[derive(Debug, Default, Clone)]
pub struct EnvFile {
    values: HashMap<String, String>,
}

impl EnvFile {
    /// A missing file yields an empty set.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "env file not found");
                return Ok(Self::default());
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read env file {}", path.display()));
            }
        };

        Ok(Self::parse(&raw))
    }

    pub fn parse(raw: &str) -> Self {
        let mut values = HashMap::new();
        for line in raw.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            if key.is_empty() || values.contains_key(key) {
                continue;
            }
            let value = value.trim().trim_matches('"').trim_matches('\'');
            values.insert(key.to_string(), value.to_string());
        }
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    fn fill(&self, explicit: Option<&String>, key: &str) -> Option<String> {
        explicit
            .cloned()
            .or_else(|| self.get(key).map(str::to_string))
            .filter(|value| !value.trim().is_empty())
    }

    fn flag(&self, explicit: bool, key: &str) -> bool {
        explicit || self.get(key).is_some_and(|value| value.trim() == "1")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichmentConfig {
    pub disabled: bool,
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl EnrichmentConfig {
    pub fn resolve(args: &EnrichArgs) -> Result<Self> {
        let file = EnvFile::load(&args.ai_secret_file)?;
        Ok(Self::from_sources(args, &file))
    }

    pub fn from_sources(args: &EnrichArgs, file: &EnvFile) -> Self {
        Self {
            disabled: file.flag(args.ai_disabled, "AI_ENRICHMENT_DISABLED"),
            api_key: file.fill(args.openai_api_key.as_ref(), "OPENAI_API_KEY"),
            model: file
                .fill(args.openai_model.as_ref(), "OPENAI_MODEL")
                .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            base_url: file
                .fill(args.openai_base_url.as_ref(), "OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            timeout_secs: args.ai_timeout_secs,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetsConfig {
    pub spreadsheet_id: Option<String>,
    pub worksheet: String,
    pub access_token: Option<String>,
    pub auto_sync: bool,
}

impl SheetsConfig {
    pub fn resolve(args: &SheetsArgs) -> Result<Self> {
        let file = EnvFile::load(&args.sheets_env_file)?;
        Ok(Self::from_sources(args, &file))
    }

    pub fn from_sources(args: &SheetsArgs, file: &EnvFile) -> Self {
        Self {
            spreadsheet_id: file.fill(args.spreadsheet_id.as_ref(), "GOOGLE_SHEETS_SPREADSHEET_ID"),
            worksheet: file
                .fill(args.worksheet.as_ref(), "GOOGLE_SHEETS_WORKSHEET")
                .unwrap_or_else(|| DEFAULT_WORKSHEET.to_string()),
            access_token: file.fill(args.sheets_access_token.as_ref(), "GOOGLE_SHEETS_ACCESS_TOKEN"),
            auto_sync: file.flag(args.auto_sync, "GOOGLE_SHEETS_AUTO_SYNC"),
        }
    }

    /// Target for an explicit `--sink sheets`; incomplete settings are fatal.
    pub fn required_target(&self) -> Result<SheetsTarget> {
        let Some(spreadsheet_id) = self.spreadsheet_id.as_deref() else {
            bail!("--spreadsheet-id (or GOOGLE_SHEETS_SPREADSHEET_ID) is required when --sink sheets");
        };
        let Some(access_token) = self.access_token.as_deref() else {
            bail!(
                "--sheets-access-token (or GOOGLE_SHEETS_ACCESS_TOKEN) is required when --sink sheets"
            );
        };
        Ok(SheetsTarget::new(spreadsheet_id, &self.worksheet, access_token))
    }

    /// Target for auto-sync after a CSV run, or `None` when auto-sync is off
    /// or not fully configured.
    pub fn auto_sync_target(&self) -> Option<SheetsTarget> {
        if !self.auto_sync {
            return None;
        }
        let Some(spreadsheet_id) = self.spreadsheet_id.as_deref() else {
            warn!("sheets auto-sync enabled but GOOGLE_SHEETS_SPREADSHEET_ID is missing");
            return None;
        };
        let Some(access_token) = self.access_token.as_deref() else {
            warn!("sheets auto-sync enabled but GOOGLE_SHEETS_ACCESS_TOKEN is missing");
            return None;
        };
        Some(SheetsTarget::new(spreadsheet_id, &self.worksheet, access_token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_file_skips_comments_and_strips_quotes() {
        let file = EnvFile::parse(
            "# secrets\n\nOPENAI_API_KEY=\"from-file\"\nOPENAI_MODEL = 'gpt-mini'\nnot a pair\n",
        );

        assert_eq!(file.get("OPENAI_API_KEY"), Some("from-file"));
        assert_eq!(file.get("OPENAI_MODEL"), Some("gpt-mini"));
        assert_eq!(file.get("not a pair"), None);
    }

    #[test]
    fn missing_env_file_is_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = EnvFile::load(&dir.path().join("absent.env")).expect("missing file is fine");
        assert_eq!(file.get("OPENAI_API_KEY"), None);
    }

    #[test]
    fn enrichment_settings_come_from_secret_file_when_unset() {
        let dir = tempfile::tempdir().expect("tempdir");
        let secret = dir.path().join("openai.env");
        fs::write(
            &secret,
            "OPENAI_API_KEY=from-file\nOPENAI_MODEL=gpt-mini\nOPENAI_BASE_URL=https://example.com/v1\n",
        )
        .expect("write secret file");

        let args = EnrichArgs {
            ai_secret_file: secret,
            ai_timeout_secs: 30,
            ..EnrichArgs::default()
        };
        let config = EnrichmentConfig::resolve(&args).expect("config resolves");

        assert_eq!(config.api_key.as_deref(), Some("from-file"));
        assert_eq!(config.model, "gpt-mini");
        assert_eq!(config.base_url, "https://example.com/v1");
        assert!(!config.disabled);
    }

    #[test]
    fn explicit_settings_win_over_secret_file() {
        let file = EnvFile::parse("OPENAI_API_KEY=from-file\nAI_ENRICHMENT_DISABLED=1\n");
        let args = EnrichArgs {
            openai_api_key: Some("from-flag".to_string()),
            ai_timeout_secs: 5,
            ..EnrichArgs::default()
        };

        let config = EnrichmentConfig::from_sources(&args, &file);

        assert_eq!(config.api_key.as_deref(), Some("from-flag"));
        assert_eq!(config.model, DEFAULT_OPENAI_MODEL);
        assert_eq!(config.base_url, DEFAULT_OPENAI_BASE_URL);
        assert!(config.disabled);
        assert_eq!(config.timeout_secs, 5);
    }

    #[test]
    fn explicit_sheets_sink_requires_id_and_token() {
        let config = SheetsConfig::from_sources(
            &SheetsArgs {
                spreadsheet_id: Some("sheet-123".to_string()),
                ..SheetsArgs::default()
            },
            &EnvFile::default(),
        );

        assert_eq!(config.worksheet, DEFAULT_WORKSHEET);
        assert!(config.required_target().is_err());
    }

    #[test]
    fn auto_sync_needs_flag_and_complete_settings() {
        let file = EnvFile::parse(
            "GOOGLE_SHEETS_AUTO_SYNC=1\nGOOGLE_SHEETS_SPREADSHEET_ID=sheet-123\nGOOGLE_SHEETS_WORKSHEET=Leads\n",
        );
        let incomplete = SheetsConfig::from_sources(&SheetsArgs::default(), &file);
        assert!(incomplete.auto_sync);
        assert!(incomplete.auto_sync_target().is_none());

        let complete = SheetsConfig::from_sources(
            &SheetsArgs {
                sheets_access_token: Some("token".to_string()),
                ..SheetsArgs::default()
            },
            &file,
        );
        let target = complete.auto_sync_target().expect("target resolves");
        assert_eq!(target.spreadsheet_id, "sheet-123");
        assert_eq!(target.worksheet, "Leads");
    }
}
