use std::path::PathBuf;

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

use crate::model::{RecordStatus, Source};
use crate::review::EditableField;

#[derive(Parser, Debug)]
#[command(
    name = "docintake",
    version,
    about = "Intake pipeline for contact forms, invoices and emails"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Run(RunArgs),
    Inventory(InventoryArgs),
    Status(StatusArgs),
    Review(ReviewArgs),
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, ValueEnum)]
pub enum SinkKind {
    #[default]
    Csv,
    Excel,
    Sheets,
}

impl SinkKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Excel => "excel",
            Self::Sheets => "sheets",
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[arg(long, default_value = ".cache/docintake")]
    pub cache_root: PathBuf,

    #[arg(long, default_value = "dummy_data")]
    pub data_dir: PathBuf,

    #[arg(long, default_value = "output/unified_records.csv")]
    pub output: PathBuf,

    #[arg(long, value_enum, default_value_t = SinkKind::Csv)]
    pub sink: SinkKind,

    /// Workbook path for `--sink excel`; defaults to the CSV path with `.xlsx`.
    #[arg(long)]
    pub excel_output: Option<PathBuf>,

    #[arg(long)]
    pub queue_db: Option<PathBuf>,

    #[command(flatten)]
    pub enrich: EnrichArgs,

    #[command(flatten)]
    pub sheets: SheetsArgs,
}

#[derive(Args, Debug, Clone, Default)]
pub struct EnrichArgs {
    #[arg(
        long = "ai-disabled",
        env = "AI_ENRICHMENT_DISABLED",
        action = ArgAction::SetTrue,
        value_parser = BoolishValueParser::new()
    )]
    pub ai_disabled: bool,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    /// Defaults to gpt-5-nano.
    #[arg(long, env = "OPENAI_MODEL")]
    pub openai_model: Option<String>,

    /// Defaults to https://api.openai.com/v1.
    #[arg(long, env = "OPENAI_BASE_URL")]
    pub openai_base_url: Option<String>,

    #[arg(long, env = "AI_SECRET_FILE", default_value = "secrets/openai.env")]
    pub ai_secret_file: PathBuf,

    #[arg(long, default_value_t = 30)]
    pub ai_timeout_secs: u64,
}

#[derive(Args, Debug, Clone, Default)]
pub struct SheetsArgs {
    #[arg(long, env = "GOOGLE_SHEETS_SPREADSHEET_ID")]
    pub spreadsheet_id: Option<String>,

    /// Defaults to Sheet1.
    #[arg(long, env = "GOOGLE_SHEETS_WORKSHEET")]
    pub worksheet: Option<String>,

    /// OAuth bearer token with the spreadsheets scope.
    #[arg(long, env = "GOOGLE_SHEETS_ACCESS_TOKEN", hide_env_values = true)]
    pub sheets_access_token: Option<String>,

    #[arg(
        long = "sheets-auto-sync",
        env = "GOOGLE_SHEETS_AUTO_SYNC",
        action = ArgAction::SetTrue,
        value_parser = BoolishValueParser::new()
    )]
    pub auto_sync: bool,

    #[arg(long, env = "GOOGLE_SHEETS_ENV_FILE", default_value = "secrets/sheets.env")]
    pub sheets_env_file: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct InventoryArgs {
    #[arg(long, default_value = ".cache/docintake")]
    pub cache_root: PathBuf,

    #[arg(long, default_value = "dummy_data")]
    pub data_dir: PathBuf,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = ".cache/docintake")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub queue_db: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct ReviewArgs {
    #[arg(long, default_value = ".cache/docintake")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub queue_db: Option<PathBuf>,

    #[command(subcommand)]
    pub action: ReviewAction,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ReviewAction {
    List(ReviewListArgs),
    Edit(ReviewEditArgs),
    Mark(ReviewMarkArgs),
    Export(ReviewExportArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ReviewListArgs {
    #[arg(long, value_enum)]
    pub status: Option<RecordStatus>,

    #[arg(long, value_enum)]
    pub source: Option<Source>,
}

#[derive(Args, Debug, Clone)]
pub struct RecordKeyArgs {
    #[arg(long, value_enum)]
    pub source: Source,

    #[arg(long)]
    pub source_name: String,
}

#[derive(Args, Debug, Clone)]
pub struct ReviewEditArgs {
    #[command(flatten)]
    pub key: RecordKeyArgs,

    /// `field=value`, repeatable.
    #[arg(long = "set", value_parser = parse_field_update, required = true)]
    pub updates: Vec<(EditableField, String)>,
}

#[derive(Args, Debug, Clone)]
pub struct ReviewMarkArgs {
    #[command(flatten)]
    pub key: RecordKeyArgs,

    #[arg(long, value_enum)]
    pub status: RecordStatus,

    #[arg(long)]
    pub note: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ReviewExportArgs {
    #[arg(long, value_enum)]
    pub status: Option<RecordStatus>,

    #[arg(long, default_value = "output/reviewed_records.csv")]
    pub output: PathBuf,
}

fn parse_field_update(raw: &str) -> Result<(EditableField, String), String> {
    let (field, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected field=value, got '{raw}'"))?;
    let field = field.trim().parse::<EditableField>().map_err(|err| err.to_string())?;
    Ok((field, value.to_string()))
}
