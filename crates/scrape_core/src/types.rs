use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One row of extracted data. Shape depends on the scrape target.
pub type Record = Map<String, Value>;

/// Identifies one opened connection or simulated run.
///
/// Allocated monotonically by [`crate::WorkflowState`], never reused within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeRequest {
    pub url: String,
    pub scrape_target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parse_type: Option<String>,
}

impl ScrapeRequest {
    pub fn new(url: impl Into<String>, scrape_target: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            scrape_target: scrape_target.into(),
            parse_type: None,
        }
    }

    pub fn with_parse_type(mut self, parse_type: impl Into<String>) -> Self {
        self.parse_type = Some(parse_type.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    #[default]
    Html,
    Xml,
}

impl ContentType {
    /// Maps the server's reported content type; feeds (`rss`) are treated as XML.
    pub fn from_reported(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "xml" | "rss" => ContentType::Xml,
            _ => ContentType::Html,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ContentType::Html => "html",
            ContentType::Xml => "xml",
        }
    }
}

/// Server-computed sample of what a full scrape would return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewData {
    pub url: String,
    pub content_type: ContentType,
    /// One item or a list of items; shape is target dependent.
    pub sample: Value,
    pub run_id: Option<String>,
    pub resume_link: Option<String>,
    /// Explanation attached to locally synthesized previews.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl PreviewData {
    pub fn sample_items(&self) -> Vec<&Value> {
        match &self.sample {
            Value::Array(items) => items.iter().collect(),
            Value::Null => Vec::new(),
            other => vec![other],
        }
    }
}

/// Key the extraction stream is subscribed under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamKey {
    RunId(String),
    JobId(String),
}

impl StreamKey {
    pub fn query_pair(&self) -> (&'static str, &str) {
        match self {
            StreamKey::RunId(id) => ("run_id", id),
            StreamKey::JobId(id) => ("jobId", id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewDecision {
    Approve,
    Cancel,
}

impl PreviewDecision {
    pub fn as_str(self) -> &'static str {
        match self {
            PreviewDecision::Approve => "approve",
            PreviewDecision::Cancel => "cancel",
        }
    }
}
