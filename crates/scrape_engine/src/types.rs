use scrape_core::ErrorKind;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("api error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("could not decode response: {0}")]
    Decode(String),
}

impl ClientError {
    /// Tag used by the workflow to choose recovery.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Timeout(_) => ErrorKind::Timeout,
            ClientError::Decode(_) => ErrorKind::Malformed,
            ClientError::InvalidUrl(_) | ClientError::Network(_) | ClientError::Api { .. } => {
                ErrorKind::Network
            }
        }
    }
}

pub(crate) fn map_reqwest_error(err: reqwest::Error) -> ClientError {
    if err.is_timeout() {
        return ClientError::Timeout(err.to_string());
    }
    if err.is_decode() {
        return ClientError::Decode(err.to_string());
    }
    ClientError::Network(err.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobTicket {
    pub job_id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScrapeStatus {
    pub status: String,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ScrapeStatus {
    pub fn is_finished(&self) -> bool {
        matches!(
            self.status.to_ascii_lowercase().as_str(),
            "completed" | "complete" | "done" | "success"
        )
    }

    pub fn is_failed(&self) -> bool {
        matches!(
            self.status.to_ascii_lowercase().as_str(),
            "failed" | "error" | "cancelled"
        )
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeResults {
    #[serde(default)]
    pub data: Vec<Value>,
    pub job_id: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UrlList {
    pub status: String,
    #[serde(default)]
    pub data: Vec<UrlEntry>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UrlEntry {
    /// Numeric or string depending on the backing table.
    pub id: Value,
    pub origin_url: String,
}
