use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use tracing::info;

use super::{INVENTORY_MANIFEST_FILE, manifest_dir};
use crate::cli::InventoryArgs;
use crate::ingest::discover_files;
use crate::model::{Source, SourceFileEntry, SourceInventoryManifest};
use crate::util::{now_utc_string, sha256_file, write_json_pretty};

const SOURCE_LAYOUT: [(Source, &str, &str); 3] = [
    (Source::Form, "forms", "html"),
    (Source::Invoice, "invoices", "html"),
    (Source::Email, "emails", "eml"),
];

pub fn run(args: InventoryArgs) -> Result<()> {
    let manifest = build_manifest(&args.data_dir)?;

    if args.dry_run {
        info!(
            forms = manifest.form_count,
            invoices = manifest.invoice_count,
            emails = manifest.email_count,
            data_dir = %manifest.data_directory,
            "inventory dry-run complete"
        );
        return Ok(());
    }

    let manifest_path = args
        .manifest_path
        .unwrap_or_else(|| manifest_dir(&args.cache_root).join(INVENTORY_MANIFEST_FILE));

    write_json_pretty(&manifest_path, &manifest)?;
    info!(path = %manifest_path.display(), "wrote inventory manifest");
    info!(files = manifest.files.len(), "inventory completed");

    Ok(())
}

pub fn build_manifest(data_dir: &Path) -> Result<SourceInventoryManifest> {
    let mut files = Vec::new();

    for (source, directory, extension) in SOURCE_LAYOUT {
        for path in discover_files(&data_dir.join(directory), extension)? {
            let filename = path
                .file_name()
                .and_then(|name| name.to_str())
                .map(ToOwned::to_owned)
                .with_context(|| format!("invalid UTF-8 filename: {}", path.display()))?;
            let size_bytes = fs::metadata(&path)
                .with_context(|| format!("failed to stat {}", path.display()))?
                .len();

            files.push(SourceFileEntry {
                source,
                filename,
                size_bytes,
                sha256: sha256_file(&path)?,
            });
        }
    }

    if files.is_empty() {
        bail!("no source files found in {}", data_dir.display());
    }

    let count = |source: Source| files.iter().filter(|entry| entry.source == source).count();

    Ok(SourceInventoryManifest {
        manifest_version: 1,
        generated_at: now_utc_string(),
        data_directory: data_dir.display().to_string(),
        form_count: count(Source::Form),
        invoice_count: count(Source::Invoice),
        email_count: count(Source::Email),
        files,
    })
}
