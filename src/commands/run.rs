use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, bail};
use chrono::Utc;
use tracing::{info, warn};

use super::{RUN_MANIFEST_PREFIX, manifest_dir, queue_db_path};
use crate::cli::{RunArgs, SinkKind};
use crate::config::{EnrichmentConfig, SheetsConfig};
use crate::enrich::Enricher;
use crate::export::{HttpSheetsUploader, SheetsUploader, write_csv, write_excel};
use crate::ingest::RecordLoader;
use crate::model::{
    PipelinePaths, PipelineRunManifest, RecordStatus, Source, SourceCounts, StatusCounts,
    UnifiedRecord,
};
use crate::quality::apply_quality_checks;
use crate::review::ReviewQueue;
use crate::template::records_to_template_rows;
use crate::util::{now_utc_string, utc_compact_string, write_json_pretty};

const SHEETS_TIMEOUT: Duration = Duration::from_secs(30);

pub fn run(args: RunArgs) -> Result<()> {
    let enrichment = EnrichmentConfig::resolve(&args.enrich)?;
    let sheets = SheetsConfig::resolve(&args.sheets)?;
    let mut enricher = Enricher::from_config(&enrichment)?;
    let uploader = HttpSheetsUploader::new(SHEETS_TIMEOUT)?;

    let manifest = run_pipeline(&args, &sheets, &mut enricher, &uploader)?;

    info!(
        run_id = %manifest.run_id,
        records = manifest.record_count,
        auto_valid = manifest.statuses.auto_valid,
        needs_review = manifest.statuses.needs_review,
        alerts = manifest.alerts.len(),
        cached_model_responses = enricher.cached_responses(),
        "pipeline completed"
    );
    Ok(())
}

/// Load, validate, enrich and project every record under the data root, then
/// write the CSV, the selected sink, the review queue and a run manifest.
pub fn run_pipeline(
    args: &RunArgs,
    sheets: &SheetsConfig,
    enricher: &mut Enricher,
    uploader: &dyn SheetsUploader,
) -> Result<PipelineRunManifest> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("run-{}", utc_compact_string(started_ts));

    info!(
        run_id = %run_id,
        data_dir = %args.data_dir.display(),
        sink = args.sink.as_str(),
        enrichment = enricher.mode_label(),
        "starting pipeline"
    );

    let loaded = RecordLoader::new()?.load_records(&args.data_dir);
    for alert in &loaded.alerts {
        warn!(alert = %alert, "loader alert");
    }
    if loaded.records.is_empty() {
        bail!(
            "No records found under {}. Verify the directory exists and includes forms, invoices, or emails.",
            args.data_dir.display()
        );
    }

    let validated = apply_quality_checks(&loaded.records);
    let enriched = enricher.enrich_records(&validated);
    let rows = records_to_template_rows(&enriched);

    write_csv(&rows, &args.output)?;

    let sink_output = match args.sink {
        SinkKind::Csv => {
            if let Some(target) = sheets.auto_sync_target() {
                uploader.upload(&rows, &target)?;
            }
            None
        }
        SinkKind::Excel => {
            let path = excel_path(args);
            write_excel(&rows, &path)?;
            Some(path.display().to_string())
        }
        SinkKind::Sheets => {
            let target = sheets.required_target()?;
            uploader.upload(&rows, &target)?;
            Some(format!("sheets:{}/{}", target.spreadsheet_id, target.worksheet))
        }
    };

    let queue_path = queue_db_path(&args.cache_root, args.queue_db.as_deref());
    let refresh = ReviewQueue::open(&queue_path)?.refresh(&run_id, &enriched)?;
    info!(
        path = %queue_path.display(),
        upserted = refresh.upserted,
        preserved = refresh.preserved_decisions,
        removed = refresh.removed,
        "refreshed review queue"
    );

    let manifest = PipelineRunManifest {
        manifest_version: 1,
        run_id,
        status: "completed".to_string(),
        started_at,
        updated_at: now_utc_string(),
        sink: args.sink.as_str().to_string(),
        enrichment_mode: enricher.mode_label().to_string(),
        paths: PipelinePaths {
            data_dir: args.data_dir.display().to_string(),
            csv_output: args.output.display().to_string(),
            sink_output,
            queue_db: queue_path.display().to_string(),
        },
        record_count: enriched.len(),
        sources: count_sources(&enriched),
        statuses: count_statuses(&enriched),
        queue_preserved_decisions: refresh.preserved_decisions,
        alerts: loaded.alerts,
    };

    let manifest_path = manifest_dir(&args.cache_root).join(format!(
        "{RUN_MANIFEST_PREFIX}{}.json",
        utc_compact_string(started_ts)
    ));
    write_json_pretty(&manifest_path, &manifest)?;
    info!(path = %manifest_path.display(), "wrote run manifest");

    Ok(manifest)
}

fn excel_path(args: &RunArgs) -> PathBuf {
    args.excel_output
        .clone()
        .unwrap_or_else(|| args.output.with_extension("xlsx"))
}

fn count_sources(records: &[UnifiedRecord]) -> SourceCounts {
    let mut counts = SourceCounts::default();
    for record in records {
        match record.source() {
            Source::Form => counts.form += 1,
            Source::Invoice => counts.invoice += 1,
            Source::Email => counts.email += 1,
        }
    }
    counts
}

fn count_statuses(records: &[UnifiedRecord]) -> StatusCounts {
    let mut counts = StatusCounts::default();
    for record in records {
        match record.status {
            RecordStatus::AutoValid => counts.auto_valid += 1,
            RecordStatus::NeedsReview => counts.needs_review += 1,
            _ => counts.other += 1,
        }
    }
    counts
}
