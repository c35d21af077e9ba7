use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, error, info};

use super::{EmailParser, FormParser, InvoiceParser, SourceParser};
use crate::error::ParseError;
use crate::model::UnifiedRecord;

/// Records parsed from one data root plus one alert per file that failed.
#[derive(Debug, Default)]
pub struct LoadOutcome {
    pub records: Vec<UnifiedRecord>,
    pub alerts: Vec<String>,
}

pub struct RecordLoader {
    parsers: Vec<Box<dyn SourceParser>>,
}

impl RecordLoader {
    /// Forms, then invoices, then emails.
    pub fn new() -> Result<Self> {
        Ok(Self::with_parsers(vec![
            Box::new(FormParser::new()?),
            Box::new(InvoiceParser::new()?),
            Box::new(EmailParser::new()?),
        ]))
    }

    pub fn with_parsers(parsers: Vec<Box<dyn SourceParser>>) -> Self {
        Self { parsers }
    }

    pub fn load_records(&self, data_dir: &Path) -> LoadOutcome {
        info!(data_dir = %data_dir.display(), "loading records");

        let mut outcome = LoadOutcome::default();
        for parser in &self.parsers {
            let directory = data_dir.join(parser.directory());
            let paths = match discover_files(&directory, parser.extension()) {
                Ok(paths) => paths,
                Err(err) => {
                    error!(path = %directory.display(), error = %err, "failed to list source directory");
                    outcome.alerts.push(format!(
                        "Failed to list {} directory {}",
                        parser.source(),
                        directory.display()
                    ));
                    continue;
                }
            };

            for path in paths {
                let filename = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default();

                match parse_file(parser.as_ref(), &path, &filename) {
                    Ok(record) => outcome.records.push(record),
                    Err(err) => {
                        error!(
                            source = %parser.source(),
                            path = %path.display(),
                            error = %err,
                            "failed to parse source file"
                        );
                        outcome
                            .alerts
                            .push(format!("Failed to parse {} {}", parser.source(), filename));
                    }
                }
            }
        }

        info!(
            records = outcome.records.len(),
            alerts = outcome.alerts.len(),
            "loaded records"
        );
        outcome
    }
}

fn parse_file(
    parser: &dyn SourceParser,
    path: &Path,
    filename: &str,
) -> Result<UnifiedRecord, ParseError> {
    let raw = fs::read(path).map_err(|source| ParseError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parser.parse(filename, &raw)
}

/// Files directly under `directory` with `extension`, sorted by path. A
/// missing directory yields nothing.
pub(crate) fn discover_files(directory: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    if !directory.is_dir() {
        debug!(path = %directory.display(), "source directory missing");
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    let entries = fs::read_dir(directory)
        .with_context(|| format!("failed to read {}", directory.display()))?;

    for entry in entries {
        let entry =
            entry.with_context(|| format!("failed to read entry in {}", directory.display()))?;
        let path = entry.path();

        if !entry
            .file_type()
            .with_context(|| format!("failed to inspect file type: {}", path.display()))?
            .is_file()
        {
            continue;
        }

        let matches = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case(extension))
            .unwrap_or(false);

        if matches {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}
