use crate::{Phase, PreviewData, Record, WorkflowError};

/// Read-only snapshot handed to consumers of the workflow.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WorkflowView {
    pub phase: Phase,
    pub loading: bool,
    pub preview: Option<PreviewData>,
    pub extracted: Option<Vec<Record>>,
    pub scraping: bool,
    pub progress: u8,
    pub error: Option<WorkflowError>,
    pub origin_url: Option<String>,
    pub uses_mock_data: bool,
}

impl WorkflowView {
    /// Only finished or failed workflows offer the way back to the form.
    pub fn can_go_back(&self) -> bool {
        self.phase == Phase::ScrapeComplete || self.error.is_some()
    }

    pub fn columns(&self) -> Vec<String> {
        self.extracted
            .as_deref()
            .map(record_columns)
            .unwrap_or_default()
    }
}

/// Union of record keys in first-seen order.
pub fn record_columns(records: &[Record]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for record in records {
        for key in record.keys() {
            if !columns.iter().any(|c| c == key) {
                columns.push(key.clone());
            }
        }
    }
    columns
}
