//! Spreadsheet extraction.
//!
//! Reads the first sheet of a workbook and pulls the (project, resource, FTE)
//! triple out of fixed column positions, skipping the template's header block.

use calamine::{Data, Range, Reader, open_workbook_auto};
use serde::Serialize;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Errors raised while reading a submitted workbook.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to read spreadsheet: {0}")]
    Read(#[from] calamine::Error),

    #[error("workbook has no sheets")]
    NoSheets,
}

/// Fixed cell positions of the submission template, in absolute 0-based
/// sheet coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SheetLayout {
    pub first_data_row: u32,
    pub project_col: u32,
    pub resource_col: u32,
    pub fte_col: u32,
}

impl Default for SheetLayout {
    /// Header on row 1, four more template rows, data from row 6; columns C, F, G.
    fn default() -> Self {
        Self {
            first_data_row: 5,
            project_col: 2,
            resource_col: 5,
            fte_col: 6,
        }
    }
}

/// One valid line of a submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionRow {
    pub project: String,
    pub resource_name: String,
    pub fte: f64,
}

impl SubmissionRow {
    pub fn new(project: impl Into<String>, resource_name: impl Into<String>, fte: f64) -> Self {
        Self {
            project: project.into(),
            resource_name: resource_name.into(),
            fte,
        }
    }
}

/// All rows extracted from one submitted file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubmissionBatch {
    pub source: String,
    pub rows: Vec<SubmissionRow>,
    pub dropped: usize,
}

impl SubmissionBatch {
    pub fn from_rows(source: impl Into<String>, rows: Vec<SubmissionRow>) -> Self {
        Self {
            source: source.into(),
            rows,
            dropped: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Opens the workbook at `path` and extracts its first sheet.
///
/// # Errors
///
/// Returns [`ExtractError`] if the file is not a readable workbook or has no
/// sheets.
#[tracing::instrument(skip(path, layout), fields(path = %path.display()))]
pub fn extract_path(path: &Path, layout: &SheetLayout) -> Result<SubmissionBatch, ExtractError> {
    let mut workbook = open_workbook_auto(path)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(ExtractError::NoSheets)??;

    let source = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let batch = extract_range(&source, &range, layout);
    debug!(
        rows = batch.rows.len(),
        dropped = batch.dropped,
        "Sheet extracted"
    );
    Ok(batch)
}

/// Extracts submission rows from an already loaded sheet range.
pub fn extract_range(source: &str, range: &Range<Data>, layout: &SheetLayout) -> SubmissionBatch {
    let mut batch = SubmissionBatch {
        source: source.to_string(),
        ..Default::default()
    };

    let Some((last_row, _)) = range.end() else {
        return batch;
    };

    for row in layout.first_data_row..=last_row {
        let project = text_cell(range.get_value((row, layout.project_col)));
        let resource = text_cell(range.get_value((row, layout.resource_col)));
        let fte = numeric_cell(range.get_value((row, layout.fte_col)));

        match (project, resource, fte) {
            (Some(project), Some(resource_name), Some(fte)) => batch.rows.push(SubmissionRow {
                project,
                resource_name,
                fte,
            }),
            (None, None, None) => {}
            _ => batch.dropped += 1,
        }
    }

    batch
}

fn text_cell(cell: Option<&Data>) -> Option<String> {
    let text = match cell? {
        Data::Empty | Data::Error(_) => return None,
        Data::String(s) => s.trim().to_string(),
        other => other.to_string().trim().to_string(),
    };
    (!text.is_empty()).then_some(text)
}

fn numeric_cell(cell: Option<&Data>) -> Option<f64> {
    let value = match cell? {
        Data::Float(f) => *f,
        Data::Int(i) => *i as f64,
        Data::String(s) => parse_decimal(s)?,
        _ => return None,
    };
    value.is_finite().then_some(value)
}

/// Parses a decimal number, accepting either `.` or `,` as the separator.
pub fn parse_decimal(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    s.replace(',', ".").parse::<f64>().ok()
}
