use std::fmt;

pub(crate) const PREVIEW_TIMEOUT_MESSAGE: &str =
    "Preview is still processing. Keep waiting or retry.";
pub(crate) const PREVIEW_FALLBACK_MESSAGE: &str =
    "Live preview unavailable, using fallback data.";
pub(crate) const MISSING_RESUME_LINK_MESSAGE: &str =
    "No resume link available to continue the workflow. Submit the form again.";
pub(crate) const EXTRACTION_TIMEOUT_MESSAGE: &str =
    "Scraping did not finish in time. The workflow may have stopped.";
pub(crate) const TRIGGER_REJECTED_MESSAGE: &str = "Could not resume the scraping workflow.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Connection refused, DNS, stream error.
    Network,
    Timeout,
    /// Payload failed to parse or lacked expected fields.
    Malformed,
    /// Missing user-side input such as a resume link.
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowStage {
    Preview,
    Extraction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Shown next to usable data; the workflow continues.
    Advisory,
    Fatal,
}

/// Where a retry re-enters the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryTarget {
    ResubmitForm,
    RestartScraping,
}

/// User-facing error with an internal tag used to pick the retry path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowError {
    pub kind: ErrorKind,
    pub stage: WorkflowStage,
    pub severity: Severity,
    pub message: String,
}

impl WorkflowError {
    pub fn advisory(kind: ErrorKind, stage: WorkflowStage, message: impl Into<String>) -> Self {
        Self {
            kind,
            stage,
            severity: Severity::Advisory,
            message: message.into(),
        }
    }

    pub fn fatal(kind: ErrorKind, stage: WorkflowStage, message: impl Into<String>) -> Self {
        Self {
            kind,
            stage,
            severity: Severity::Fatal,
            message: message.into(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Fatal
    }

    pub fn retry_target(&self) -> RetryTarget {
        match (self.stage, self.kind) {
            (WorkflowStage::Preview, _) => RetryTarget::ResubmitForm,
            // A missing resume link can only be obtained from a fresh preview.
            (WorkflowStage::Extraction, ErrorKind::User) => RetryTarget::ResubmitForm,
            (WorkflowStage::Extraction, _) => RetryTarget::RestartScraping,
        }
    }
}

impl fmt::Display for WorkflowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for WorkflowError {}
