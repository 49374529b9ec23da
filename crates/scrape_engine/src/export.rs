use std::path::{Path, PathBuf};

use scrape_core::{record_columns, Record};
use serde_json::{json, Value};

use crate::persist::{write_atomically, PersistError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    /// Guesses the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "csv" => Some(ExportFormat::Csv),
            "json" => Some(ExportFormat::Json),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub row_count: usize,
    pub column_count: usize,
    pub output_path: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("nothing to export")]
    Empty,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("persist error: {0}")]
    Persist(#[from] PersistError),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Text shown in a table cell: strings verbatim, null empty, everything else compact JSON.
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

pub fn render_csv(records: &[Record]) -> Result<String, ExportError> {
    let columns = record_columns(records);
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&columns)?;
    for record in records {
        writer.write_record(
            columns
                .iter()
                .map(|column| record.get(column).map(cell_text).unwrap_or_default()),
        )?;
    }
    let bytes = writer.into_inner().map_err(|err| err.into_error())?;
    String::from_utf8(bytes).map_err(|err| {
        ExportError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, err))
    })
}

pub fn render_json(records: &[Record], origin_url: Option<&str>) -> Result<String, ExportError> {
    let document = json!({
        "origin_url": origin_url,
        "row_count": records.len(),
        "records": records,
    });
    Ok(serde_json::to_string_pretty(&document)?)
}

pub fn export_records(
    path: &Path,
    format: ExportFormat,
    records: &[Record],
    origin_url: Option<&str>,
) -> Result<ExportSummary, ExportError> {
    if records.is_empty() {
        return Err(ExportError::Empty);
    }
    let content = match format {
        ExportFormat::Csv => render_csv(records)?,
        ExportFormat::Json => render_json(records, origin_url)?,
    };
    let output_path = write_atomically(path, &content)?;
    Ok(ExportSummary {
        row_count: records.len(),
        column_count: record_columns(records).len(),
        output_path,
    })
}
