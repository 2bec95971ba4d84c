use super::models::ProcessedFileRecord;
use super::queries::path_str;
use super::sqlite::Database;
use crate::error::Error;
use crate::outcome::SkipReason;
use csv::{Reader, Writer};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const HEADER: [&str; 5] = [
    "source_path",
    "destination_path",
    "canonical_id",
    "season",
    "skip_reason",
];

impl Database {
    /// Write every processed record to `file_path`. Absent values become empty fields.
    pub fn export_csv(&self, file_path: &Path) -> Result<usize, Error> {
        let records = self.get_all_processed()?;
        let mut writer = Writer::from_path(file_path)?;

        writer.write_record(HEADER)?;
        for record in &records {
            writer.write_record([
                path_str(&record.source_path),
                record
                    .destination_path
                    .as_deref()
                    .map(path_str)
                    .unwrap_or_default(),
                record.canonical_id.clone().unwrap_or_default(),
                record.season.map(|s| s.to_string()).unwrap_or_default(),
                record
                    .skip_reason
                    .as_ref()
                    .map(|r| r.as_str().to_string())
                    .unwrap_or_default(),
            ])?;
        }
        writer.flush()?;

        debug!("Exported {} records to {}", records.len(), file_path.display());
        Ok(records.len())
    }

    /// Upsert records from a file written by [`Database::export_csv`].
    ///
    /// Linked records also restore their tracked destination link.
    pub fn import_csv(&self, file_path: &Path) -> Result<usize, Error> {
        let mut reader = Reader::from_path(file_path)?;
        let mut imported = 0;

        for row in reader.records() {
            let row = row?;
            let field = |index: usize| row.get(index).map(str::trim).filter(|v| !v.is_empty());

            let Some(source) = field(0) else {
                warn!("Skipping CSV row without a source path: {:?}", row);
                continue;
            };
            let season = match field(3) {
                Some(value) => Some(value.parse::<u32>().map_err(|_| {
                    Error::Other(format!("invalid season '{}' for {}", value, source))
                })?),
                None => None,
            };

            let record = ProcessedFileRecord {
                source_path: PathBuf::from(source),
                destination_path: field(1).map(PathBuf::from),
                canonical_id: field(2).map(String::from),
                season,
                skip_reason: field(4).map(SkipReason::parse),
            };

            self.upsert_processed(&record)?;
            if let Some(destination) = &record.destination_path {
                self.upsert_destination_link(destination, &record.source_path)?;
            }
            imported += 1;
        }

        debug!("Imported {} records from {}", imported, file_path.display());
        Ok(imported)
    }
}
