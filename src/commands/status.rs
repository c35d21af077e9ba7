use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

use super::{INVENTORY_MANIFEST_FILE, RUN_MANIFEST_PREFIX, manifest_dir, queue_db_path};
use crate::cli::StatusArgs;
use crate::model::{PipelineRunManifest, SourceInventoryManifest};
use crate::review::ReviewQueue;
use crate::util::read_json;

pub fn run(args: StatusArgs) -> Result<()> {
    let manifests = manifest_dir(&args.cache_root);
    let inventory_path = manifests.join(INVENTORY_MANIFEST_FILE);
    let queue_path = queue_db_path(&args.cache_root, args.queue_db.as_deref());

    info!(cache_root = %args.cache_root.display(), "status requested");

    match latest_run_manifest(&manifests)? {
        Some(path) => {
            let manifest: PipelineRunManifest = read_json(&path)?;
            info!(
                run_id = %manifest.run_id,
                status = %manifest.status,
                started_at = %manifest.started_at,
                updated_at = %manifest.updated_at,
                sink = %manifest.sink,
                enrichment = %manifest.enrichment_mode,
                data_dir = %manifest.paths.data_dir,
                csv_output = %manifest.paths.csv_output,
                sink_output = %manifest.paths.sink_output.unwrap_or_default(),
                records = manifest.record_count,
                forms = manifest.sources.form,
                invoices = manifest.sources.invoice,
                emails = manifest.sources.email,
                auto_valid = manifest.statuses.auto_valid,
                needs_review = manifest.statuses.needs_review,
                alerts = manifest.alerts.len(),
                "loaded latest run manifest"
            );
            for alert in &manifest.alerts {
                warn!(alert = %alert, "run alert");
            }
        }
        None => warn!(path = %manifests.display(), "no run manifest found"),
    }

    if inventory_path.exists() {
        let inventory: SourceInventoryManifest = read_json(&inventory_path)?;
        info!(
            generated_at = %inventory.generated_at,
            forms = inventory.form_count,
            invoices = inventory.invoice_count,
            emails = inventory.email_count,
            "loaded inventory manifest"
        );
    } else {
        warn!(path = %inventory_path.display(), "inventory manifest missing");
    }

    if queue_path.exists() {
        let queue = ReviewQueue::open(&queue_path)?;
        for (status, count) in queue.counts_by_status()? {
            info!(status = %status, count, "review queue");
        }
    } else {
        warn!(path = %queue_path.display(), "review queue missing");
    }

    Ok(())
}

/// Newest `pipeline_run_*.json`; the compact UTC stamp in the name sorts
/// chronologically.
fn latest_run_manifest(manifests: &Path) -> Result<Option<PathBuf>> {
    if !manifests.is_dir() {
        return Ok(None);
    }

    let mut latest: Option<PathBuf> = None;
    let entries = fs::read_dir(manifests)
        .with_context(|| format!("failed to read {}", manifests.display()))?;

    for entry in entries {
        let entry =
            entry.with_context(|| format!("failed to read entry in {}", manifests.display()))?;
        let path = entry.path();
        let is_run_manifest = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.starts_with(RUN_MANIFEST_PREFIX) && name.ends_with(".json"))
            .unwrap_or(false);

        if is_run_manifest && latest.as_ref().is_none_or(|current| path > *current) {
            latest = Some(path);
        }
    }

    Ok(latest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_run_manifest_picks_the_newest_stamp() {
        let dir = tempfile::tempdir().expect("tempdir");
        for name in [
            "pipeline_run_20240101T000000Z.json",
            "pipeline_run_20240301T120000Z.json",
            "source_inventory.json",
        ] {
            fs::write(dir.path().join(name), "{}").expect("write manifest");
        }

        let latest = latest_run_manifest(dir.path())
            .expect("scan")
            .expect("found one");

        assert!(latest.ends_with("pipeline_run_20240301T120000Z.json"));
    }

    #[test]
    fn missing_manifest_dir_yields_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(
            latest_run_manifest(&dir.path().join("absent"))
                .expect("scan")
                .is_none()
        );
    }
}
