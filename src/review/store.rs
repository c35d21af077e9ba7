use std::path::Path;

use anyhow::{Context, Result, bail};
use rusqlite::{Connection, OptionalExtension, params};

use crate::model::{RecordStatus, Source, UnifiedRecord};
use crate::util::{ensure_parent_directory, now_utc_string};

/// Outcome of syncing one run's records into the queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueRefresh {
    pub upserted: usize,
    pub preserved_decisions: usize,
    pub removed: usize,
}

/// SQLite-backed review queue keyed by `(source, source_name)`.
pub struct ReviewQueue {
    connection: Connection,
}

impl ReviewQueue {
    pub fn open(path: &Path) -> Result<Self> {
        ensure_parent_directory(path)?;
        let connection = Connection::open(path)
            .with_context(|| format!("failed to open review queue {}", path.display()))?;
        configure_connection(&connection)?;
        ensure_schema(&connection)?;
        Ok(Self { connection })
    }

    /// Replaces the queue with `records`. Rows a reviewer already approved or
    /// rejected are kept as they are; undecided rows missing from this run
    /// are dropped.
    pub fn refresh(&mut self, run_id: &str, records: &[UnifiedRecord]) -> Result<QueueRefresh> {
        let updated_at = now_utc_string();
        let tx = self.connection.transaction()?;
        let mut summary = QueueRefresh::default();

        {
            let mut existing_status = tx.prepare(
                "SELECT status FROM review_queue WHERE source = ?1 AND source_name = ?2",
            )?;
            let mut touch = tx.prepare(
                "UPDATE review_queue SET last_seen_run = ?3 WHERE source = ?1 AND source_name = ?2",
            )?;
            let mut upsert = tx.prepare(
                "
                INSERT INTO review_queue(source, source_name, status, record_json, last_seen_run, updated_at)
                VALUES(?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(source, source_name) DO UPDATE SET
                  status=excluded.status,
                  record_json=excluded.record_json,
                  last_seen_run=excluded.last_seen_run,
                  updated_at=excluded.updated_at
                ",
            )?;

            for record in records {
                let source = record.source().as_str();
                let status = existing_status
                    .query_row(params![source, record.source_name()], |row| {
                        row.get::<_, String>(0)
                    })
                    .optional()?
                    .and_then(|value| RecordStatus::parse(&value));

                if status.is_some_and(RecordStatus::is_review_decision) {
                    touch.execute(params![source, record.source_name(), run_id])?;
                    summary.preserved_decisions += 1;
                    continue;
                }

                upsert.execute(params![
                    source,
                    record.source_name(),
                    record.status.as_str(),
                    serde_json::to_string(record).context("failed to serialize queued record")?,
                    run_id,
                    updated_at,
                ])?;
                summary.upserted += 1;
            }
        }

        summary.removed = tx.execute(
            "DELETE FROM review_queue WHERE last_seen_run != ?1 AND status NOT IN ('approved', 'rejected')",
            params![run_id],
        )?;
        tx.commit()?;

        Ok(summary)
    }

    pub fn load(&self, source: Source, source_name: &str) -> Result<Option<UnifiedRecord>> {
        let raw = self
            .connection
            .query_row(
                "SELECT record_json FROM review_queue WHERE source = ?1 AND source_name = ?2",
                params![source.as_str(), source_name],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        raw.map(|json| decode_record(&json)).transpose()
    }

    /// Writes a reviewed record back; it must already be queued.
    pub fn save(&self, record: &UnifiedRecord) -> Result<()> {
        let changed = self.connection.execute(
            "
            UPDATE review_queue
            SET status = ?3, record_json = ?4, updated_at = ?5
            WHERE source = ?1 AND source_name = ?2
            ",
            params![
                record.source().as_str(),
                record.source_name(),
                record.status.as_str(),
                serde_json::to_string(record).context("failed to serialize queued record")?,
                now_utc_string(),
            ],
        )?;

        if changed == 0 {
            bail!(
                "record {} {} is not in the review queue",
                record.source(),
                record.source_name()
            );
        }
        Ok(())
    }

    pub fn list(
        &self,
        status: Option<RecordStatus>,
        source: Option<Source>,
    ) -> Result<Vec<UnifiedRecord>> {
        let mut statement = self.connection.prepare(
            "
            SELECT record_json
            FROM review_queue
            WHERE (?1 IS NULL OR status = ?1)
              AND (?2 IS NULL OR source = ?2)
            ORDER BY source, source_name
            ",
        )?;

        let rows = statement.query_map(
            params![status.map(RecordStatus::as_str), source.map(Source::as_str)],
            |row| row.get::<_, String>(0),
        )?;

        let mut records = Vec::new();
        for raw in rows {
            records.push(decode_record(&raw?)?);
        }
        Ok(records)
    }

    pub fn counts_by_status(&self) -> Result<Vec<(String, i64)>> {
        let mut statement = self.connection.prepare(
            "SELECT status, COUNT(*) FROM review_queue GROUP BY status ORDER BY status",
        )?;
        let rows = statement.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;

        let mut counts = Vec::new();
        for row in rows {
            counts.push(row?);
        }
        Ok(counts)
    }
}

fn configure_connection(connection: &Connection) -> Result<()> {
    connection
        .pragma_update(None, "journal_mode", "WAL")
        .context("failed to set journal_mode=WAL")?;
    connection
        .pragma_update(None, "synchronous", "NORMAL")
        .context("failed to set synchronous=NORMAL")?;
    Ok(())
}

fn ensure_schema(connection: &Connection) -> Result<()> {
    connection
        .execute_batch(
            "
            CREATE TABLE IF NOT EXISTS review_queue (
              source TEXT NOT NULL,
              source_name TEXT NOT NULL,
              status TEXT NOT NULL,
              record_json TEXT NOT NULL,
              last_seen_run TEXT NOT NULL,
              updated_at TEXT NOT NULL,
              PRIMARY KEY (source, source_name)
            );

            CREATE INDEX IF NOT EXISTS idx_review_queue_status ON review_queue(status);
            ",
        )
        .context("failed to create review queue schema")
}

fn decode_record(raw: &str) -> Result<UnifiedRecord> {
    serde_json::from_str(raw).context("failed to decode queued record")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queued(source: Source, name: &str, status: RecordStatus) -> UnifiedRecord {
        UnifiedRecord::new(source, name).with_status(status)
    }

    fn open_queue(dir: &tempfile::TempDir) -> ReviewQueue {
        ReviewQueue::open(&dir.path().join("queue").join("review.sqlite")).expect("queue opens")
    }

    #[test]
    fn refresh_inserts_and_lists_in_key_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut queue = open_queue(&dir);

        let summary = queue
            .refresh(
                "run-1",
                &[
                    queued(Source::Invoice, "b.html", RecordStatus::AutoValid),
                    queued(Source::Form, "a.html", RecordStatus::NeedsReview),
                ],
            )
            .expect("refresh");

        assert_eq!(summary.upserted, 2);
        let all = queue.list(None, None).expect("list");
        assert_eq!(all[0].source_name(), "a.html");
        assert_eq!(all[1].source_name(), "b.html");

        let needs_review = queue
            .list(Some(RecordStatus::NeedsReview), None)
            .expect("filtered list");
        assert_eq!(needs_review.len(), 1);
        assert_eq!(needs_review[0].source(), Source::Form);
    }

    #[test]
    fn refresh_keeps_reviewer_decisions_and_drops_stale_rows() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut queue = open_queue(&dir);
        queue
            .refresh(
                "run-1",
                &[
                    queued(Source::Form, "a.html", RecordStatus::NeedsReview),
                    queued(Source::Email, "gone.eml", RecordStatus::NeedsReview),
                ],
            )
            .expect("first refresh");

        let approved = queued(Source::Form, "a.html", RecordStatus::Approved)
            .with_appended_note("looks fine");
        queue.save(&approved).expect("save decision");

        let summary = queue
            .refresh(
                "run-2",
                &[queued(Source::Form, "a.html", RecordStatus::NeedsReview)],
            )
            .expect("second refresh");

        assert_eq!(summary.preserved_decisions, 1);
        assert_eq!(summary.upserted, 0);
        assert_eq!(summary.removed, 1);
        let kept = queue
            .load(Source::Form, "a.html")
            .expect("load")
            .expect("record present");
        assert_eq!(kept.status, RecordStatus::Approved);
        assert_eq!(kept.notes.as_deref(), Some("looks fine"));
        assert!(queue.load(Source::Email, "gone.eml").expect("load").is_none());
    }

    #[test]
    fn save_requires_a_queued_record() {
        let dir = tempfile::tempdir().expect("tempdir");
        let queue = open_queue(&dir);

        let error = queue
            .save(&queued(Source::Form, "missing.html", RecordStatus::Approved))
            .expect_err("not queued");

        assert!(error.to_string().contains("missing.html"));
    }

    #[test]
    fn counts_group_by_status() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut queue = open_queue(&dir);
        queue
            .refresh(
                "run-1",
                &[
                    queued(Source::Form, "a.html", RecordStatus::AutoValid),
                    queued(Source::Form, "b.html", RecordStatus::AutoValid),
                    queued(Source::Email, "c.eml", RecordStatus::NeedsReview),
                ],
            )
            .expect("refresh");

        assert_eq!(
            queue.counts_by_status().expect("counts"),
            vec![("auto_valid".to_string(), 2), ("needs_review".to_string(), 1)]
        );
    }
}
