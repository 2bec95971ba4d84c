use super::models::*;
use super::sqlite::Database;
use crate::outcome::SkipReason;
use rusqlite::{params, OptionalExtension, Result, Row};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

pub(super) fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn record_from_row(row: &Row<'_>) -> Result<ProcessedFileRecord> {
    let source: String = row.get(0)?;
    let destination: Option<String> = row.get(1)?;
    let skip_reason: Option<String> = row.get(4)?;
    Ok(ProcessedFileRecord {
        source_path: PathBuf::from(source),
        destination_path: destination.map(PathBuf::from),
        canonical_id: row.get(2)?,
        season: row.get(3)?,
        skip_reason: skip_reason.as_deref().map(SkipReason::parse),
    })
}

impl Database {
    // ── Processed files ─────────────────────────────────────────

    /// Insert or replace the record for `record.source_path`.
    pub fn upsert_processed(&self, record: &ProcessedFileRecord) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        self.connection().execute(
            "INSERT INTO processed_file \
             (source_path, destination_path, canonical_id, season, skip_reason, processed_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
             ON CONFLICT(source_path) DO UPDATE SET \
             destination_path = excluded.destination_path, \
             canonical_id = excluded.canonical_id, \
             season = excluded.season, \
             skip_reason = excluded.skip_reason, \
             processed_at = excluded.processed_at",
            params![
                path_str(&record.source_path),
                record.destination_path.as_deref().map(path_str),
                record.canonical_id,
                record.season,
                record.skip_reason.as_ref().map(|r| r.as_str().to_string()),
                now,
            ],
        )?;
        Ok(())
    }

    pub fn get_processed(&self, source: &Path) -> Result<Option<ProcessedFileRecord>> {
        self.connection()
            .query_row(
                "SELECT source_path, destination_path, canonical_id, season, skip_reason \
                 FROM processed_file WHERE source_path = ?1",
                params![path_str(source)],
                record_from_row,
            )
            .optional()
    }

    pub fn get_processed_sources(&self) -> Result<HashSet<PathBuf>> {
        let conn = self.connection();
        let mut stmt = conn.prepare("SELECT source_path FROM processed_file")?;
        let sources = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .map(|r| r.map(PathBuf::from))
            .collect::<Result<HashSet<_>>>()?;
        Ok(sources)
    }

    pub fn get_all_processed(&self) -> Result<Vec<ProcessedFileRecord>> {
        let conn = self.connection();
        let mut stmt = conn.prepare(
            "SELECT source_path, destination_path, canonical_id, season, skip_reason \
             FROM processed_file ORDER BY source_path",
        )?;
        let records = stmt
            .query_map([], record_from_row)?
            .collect::<Result<Vec<_>>>()?;
        Ok(records)
    }

    /// Records whose source, destination or canonical id contains `pattern`.
    pub fn search(&self, pattern: &str) -> Result<Vec<ProcessedFileRecord>> {
        let conn = self.connection();
        let mut stmt = conn.prepare(
            "SELECT source_path, destination_path, canonical_id, season, skip_reason \
             FROM processed_file \
             WHERE source_path LIKE '%' || ?1 || '%' \
                OR destination_path LIKE '%' || ?1 || '%' \
                OR canonical_id LIKE '%' || ?1 || '%' \
             ORDER BY source_path",
        )?;
        let records = stmt
            .query_map(params![pattern], record_from_row)?
            .collect::<Result<Vec<_>>>()?;
        Ok(records)
    }

    pub fn get_records_with_destination(&self) -> Result<Vec<ProcessedFileRecord>> {
        let conn = self.connection();
        let mut stmt = conn.prepare(
            "SELECT source_path, destination_path, canonical_id, season, skip_reason \
             FROM processed_file WHERE destination_path IS NOT NULL \
             ORDER BY source_path",
        )?;
        let records = stmt
            .query_map([], record_from_row)?
            .collect::<Result<Vec<_>>>()?;
        Ok(records)
    }

    pub fn delete_processed(&self, source: &Path) -> Result<()> {
        self.connection().execute(
            "DELETE FROM processed_file WHERE source_path = ?1",
            params![path_str(source)],
        )?;
        Ok(())
    }

    // ── Destination links ───────────────────────────────────────

    pub fn upsert_destination_link(&self, destination: &Path, target: &Path) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        self.connection().execute(
            "INSERT INTO destination_link (destination_path, target_path, updated_at) \
             VALUES (?1, ?2, ?3) \
             ON CONFLICT(destination_path) DO UPDATE SET \
             target_path = excluded.target_path, updated_at = excluded.updated_at",
            params![path_str(destination), path_str(target), now],
        )?;
        Ok(())
    }

    pub fn delete_destination_link(&self, destination: &Path) -> Result<()> {
        self.connection().execute(
            "DELETE FROM destination_link WHERE destination_path = ?1",
            params![path_str(destination)],
        )?;
        Ok(())
    }

    pub fn find_link_by_target(&self, target: &Path) -> Result<Option<PathBuf>> {
        let found: Option<String> = self
            .connection()
            .query_row(
                "SELECT destination_path FROM destination_link \
                 WHERE target_path = ?1 ORDER BY updated_at DESC LIMIT 1",
                params![path_str(target)],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.map(PathBuf::from))
    }

    /// All persisted (destination, target) pairs.
    pub fn get_destination_links(&self) -> Result<Vec<(PathBuf, PathBuf)>> {
        let conn = self.connection();
        let mut stmt =
            conn.prepare("SELECT destination_path, target_path FROM destination_link")?;
        let links = stmt
            .query_map([], |row| {
                let dest: String = row.get(0)?;
                let target: String = row.get(1)?;
                Ok((PathBuf::from(dest), PathBuf::from(target)))
            })?
            .collect::<Result<Vec<_>>>()?;
        Ok(links)
    }

    // ── Stats ───────────────────────────────────────────────────

    pub fn get_stats(&self) -> Result<StateStats> {
        let conn = self.connection();
        let (total_records, linked_records, skipped_records) = conn.query_row(
            "SELECT COUNT(*), \
                    COALESCE(SUM(CASE WHEN destination_path IS NOT NULL THEN 1 ELSE 0 END), 0), \
                    COALESCE(SUM(CASE WHEN skip_reason IS NOT NULL THEN 1 ELSE 0 END), 0) \
             FROM processed_file",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;
        let tracked_links =
            conn.query_row("SELECT COUNT(*) FROM destination_link", [], |row| row.get(0))?;
        Ok(StateStats {
            total_records,
            linked_records,
            skipped_records,
            tracked_links,
        })
    }

    // ── Maintenance ─────────────────────────────────────────────

    /// Delete every record and tracked link.
    pub fn reset(&self) -> Result<()> {
        self.connection().execute_batch(
            "DELETE FROM destination_link;
             DELETE FROM processed_file;",
        )?;
        debug!("State database reset");
        Ok(())
    }

    pub fn vacuum(&self) -> Result<()> {
        self.connection().execute_batch("VACUUM;")
    }

    /// Refresh planner statistics.
    pub fn optimize(&self) -> Result<()> {
        self.connection()
            .execute_batch("ANALYZE; PRAGMA optimize;")
    }

    /// Messages from `PRAGMA integrity_check`; a healthy database yields `["ok"]`.
    pub fn integrity_check(&self) -> Result<Vec<String>> {
        let conn = self.connection();
        let mut stmt = conn.prepare("PRAGMA integrity_check")?;
        let messages = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>>>()?;
        Ok(messages)
    }
}
