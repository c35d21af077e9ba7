mod sheets;

use std::path::Path;

use anyhow::{Context, Result};
use rust_xlsxwriter::Workbook;
use tracing::{debug, info};

pub use sheets::{HttpSheetsUploader, SheetsTarget, SheetsUploader};

use crate::template::{TEMPLATE_HEADERS, TemplateRow};
use crate::util::ensure_parent_directory;

pub const EXCEL_SHEET_NAME: &str = "unified_records";

/// Writes the header and every row as UTF-8 CSV with `\n` line endings. The
/// header is written even when there are no rows.
pub fn write_csv(rows: &[TemplateRow], path: &Path) -> Result<()> {
    ensure_parent_directory(path)?;

    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_path(path)
        .with_context(|| format!("failed to create csv file: {}", path.display()))?;

    writer
        .write_record(TEMPLATE_HEADERS)
        .with_context(|| format!("failed to write csv header: {}", path.display()))?;
    for row in rows {
        writer
            .write_record(row.cells())
            .with_context(|| format!("failed to write csv row: {}", path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("failed to flush csv file: {}", path.display()))?;

    info!(path = %path.display(), rows = rows.len(), "wrote csv output");
    Ok(())
}

/// Single-sheet workbook with the same header and rows as the CSV. Nothing
/// is written for an empty row set.
pub fn write_excel(rows: &[TemplateRow], path: &Path) -> Result<()> {
    if rows.is_empty() {
        debug!(path = %path.display(), "no rows, skipping excel output");
        return Ok(());
    }
    ensure_parent_directory(path)?;

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet
        .set_name(EXCEL_SHEET_NAME)
        .context("failed to name excel worksheet")?;

    for (col, header) in TEMPLATE_HEADERS.iter().enumerate() {
        sheet
            .write_string(0, excel_column(col)?, *header)
            .context("failed to write excel header")?;
    }

    for (index, row) in rows.iter().enumerate() {
        let row_number = u32::try_from(index + 1).context("too many rows for excel output")?;
        for (col, cell) in row.cells().iter().enumerate() {
            sheet
                .write_string(row_number, excel_column(col)?, *cell)
                .with_context(|| format!("failed to write excel row {row_number}"))?;
        }
    }

    workbook
        .save(path)
        .with_context(|| format!("failed to save excel workbook: {}", path.display()))?;

    info!(path = %path.display(), rows = rows.len(), "wrote excel output");
    Ok(())
}

fn excel_column(index: usize) -> Result<u16> {
    u16::try_from(index).context("column index out of range for excel output")
}
