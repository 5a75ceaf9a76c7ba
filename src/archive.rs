//! CSV archive of emitted summaries.
//!
//! Every period's grouped totals are appended to `summary-<date>.csv` inside
//! the archive directory before the report is sent, so a failed send does not
//! lose the numbers.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use csv::WriterBuilder;
use serde::Serialize;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::summary::SummaryRow;

#[derive(Debug, Serialize)]
struct ArchiveRecord<'a> {
    period_end: NaiveDateTime,
    project: &'a str,
    resource_name: &'a str,
    total_fte: f64,
}

/// Path of the archive file for the period ending at `period_end`.
pub fn archive_path(dir: &Path, period_end: NaiveDateTime) -> PathBuf {
    dir.join(format!("summary-{}.csv", period_end.format("%Y-%m-%d")))
}

/// Appends `rows` to the archive file for `period_end`, creating the
/// directory and the header line as needed. Returns the file written.
pub fn append_summary(
    dir: &Path,
    period_end: NaiveDateTime,
    rows: &[SummaryRow],
) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating archive directory {}", dir.display()))?;

    let path = archive_path(dir, period_end);
    let file_exists = path.exists();
    debug!(path = %path.display(), file_exists, rows = rows.len(), "Archiving summary");

    let file = OpenOptions::new().append(true).create(true).open(&path)?;
    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists)
        .from_writer(file);

    for row in rows {
        writer.serialize(ArchiveRecord {
            period_end,
            project: &row.project,
            resource_name: &row.resource_name,
            total_fte: row.total_fte,
        })?;
    }
    writer.flush()?;

    Ok(path)
}
