use anyhow::{Context, Result};
use tracing::info;

use super::queue_db_path;
use crate::cli::{RecordKeyArgs, ReviewAction, ReviewArgs};
use crate::export::write_csv;
use crate::model::UnifiedRecord;
use crate::review::{ReviewQueue, apply_edits, mark_status};
use crate::template::records_to_template_rows;

pub fn run(args: ReviewArgs) -> Result<()> {
    let queue_path = queue_db_path(&args.cache_root, args.queue_db.as_deref());
    let queue = ReviewQueue::open(&queue_path)?;

    match args.action {
        ReviewAction::List(list) => {
            let records = queue.list(list.status, list.source)?;
            for record in &records {
                info!(
                    source = %record.source(),
                    source_name = record.source_name(),
                    status = %record.status,
                    customer = record.customer_name.as_deref().unwrap_or_default(),
                    company = record.company.as_deref().unwrap_or_default(),
                    notes = record.notes.as_deref().unwrap_or_default(),
                    "queued record"
                );
            }
            info!(count = records.len(), "review list complete");
        }
        ReviewAction::Edit(edit) => {
            let record = load_queued(&queue, &edit.key)?;
            let updates = edit
                .updates
                .into_iter()
                .map(|(field, value)| (field, Some(value)))
                .collect::<Vec<_>>();
            let edited = apply_edits(&record, &updates)
                .with_context(|| format!("failed to edit {}", edit.key.source_name))?;
            queue.save(&edited)?;
            info!(
                source = %edited.source(),
                source_name = edited.source_name(),
                fields = updates.len(),
                "record updated"
            );
        }
        ReviewAction::Mark(mark) => {
            let record = load_queued(&queue, &mark.key)?;
            let marked = mark_status(&record, mark.status, mark.note.as_deref());
            queue.save(&marked)?;
            info!(
                source = %marked.source(),
                source_name = marked.source_name(),
                status = %marked.status,
                "record marked"
            );
        }
        ReviewAction::Export(export) => {
            let records = queue.list(export.status, None)?;
            write_csv(&records_to_template_rows(&records), &export.output)?;
            info!(
                path = %export.output.display(),
                records = records.len(),
                "exported reviewed records"
            );
        }
    }

    Ok(())
}

fn load_queued(queue: &ReviewQueue, key: &RecordKeyArgs) -> Result<UnifiedRecord> {
    queue
        .load(key.source, &key.source_name)?
        .with_context(|| {
            format!(
                "record {} {} is not in the review queue",
                key.source, key.source_name
            )
        })
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use super::*;
    use crate::cli::{ReviewEditArgs, ReviewExportArgs, ReviewMarkArgs};
    use crate::model::{RecordStatus, Source};
    use crate::review::EditableField;

    fn seeded_args(root: &Path, action: ReviewAction) -> ReviewArgs {
        ReviewArgs {
            cache_root: root.to_path_buf(),
            queue_db: None,
            action,
        }
    }

    fn key(name: &str) -> RecordKeyArgs {
        RecordKeyArgs {
            source: Source::Form,
            source_name: name.to_string(),
        }
    }

    fn seed_queue(root: &Path) {
        let mut record = UnifiedRecord::new(Source::Form, "contact_form_1.html");
        record.customer_name = Some("Νίκος".to_string());
        record.status = RecordStatus::NeedsReview;
        ReviewQueue::open(&queue_db_path(root, None))
            .expect("queue opens")
            .refresh("run-1", &[record])
            .expect("seed queue");
    }

    #[test]
    fn edit_then_approve_then_export() {
        let dir = tempfile::tempdir().expect("tempdir");
        seed_queue(dir.path());

        run(seeded_args(
            dir.path(),
            ReviewAction::Edit(ReviewEditArgs {
                key: key("contact_form_1.html"),
                updates: vec![(EditableField::Company, "Acme AE".to_string())],
            }),
        ))
        .expect("edit succeeds");
        run(seeded_args(
            dir.path(),
            ReviewAction::Mark(ReviewMarkArgs {
                key: key("contact_form_1.html"),
                status: RecordStatus::Approved,
                note: Some("checked by phone".to_string()),
            }),
        ))
        .expect("mark succeeds");

        let output = dir.path().join("reviewed.csv");
        run(seeded_args(
            dir.path(),
            ReviewAction::Export(ReviewExportArgs {
                status: Some(RecordStatus::Approved),
                output: output.clone(),
            }),
        ))
        .expect("export succeeds");

        let stored = ReviewQueue::open(&queue_db_path(dir.path(), None))
            .expect("queue opens")
            .load(Source::Form, "contact_form_1.html")
            .expect("load")
            .expect("present");
        assert_eq!(stored.company.as_deref(), Some("Acme AE"));
        assert_eq!(stored.status, RecordStatus::Approved);
        assert_eq!(stored.notes.as_deref(), Some("checked by phone"));

        let csv = fs::read_to_string(&output).expect("read export");
        assert_eq!(csv.lines().count(), 2);
        assert!(csv.contains("Acme AE"));
    }

    #[test]
    fn unknown_record_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        seed_queue(dir.path());

        let error = run(seeded_args(
            dir.path(),
            ReviewAction::Mark(ReviewMarkArgs {
                key: key("missing.html"),
                status: RecordStatus::Rejected,
                note: None,
            }),
        ))
        .expect_err("record missing");

        assert!(error.to_string().contains("missing.html"));
    }
}
