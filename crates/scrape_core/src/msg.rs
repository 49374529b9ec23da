use serde_json::Value;

use crate::{ConnectionId, ErrorKind, ScrapeRequest};

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// User submitted the scrape form.
    FormSubmitted(ScrapeRequest),
    /// User approved the preview. The link may be empty when the server sent none.
    ScrapeApproved { resume_link: String },
    /// User declined the preview.
    PreviewCancelled,
    /// User asked to go back to the start. Valid from any state.
    ResetRequested,
    /// User pressed retry on an error.
    RetryRequested,
    /// Preview stream delivered its `preview` event.
    PreviewReceived { conn: ConnectionId, data: String },
    /// Preview stream errored or ended before delivering a preview.
    PreviewStreamFailed {
        conn: ConnectionId,
        kind: ErrorKind,
        detail: String,
    },
    /// Preview wait ceiling elapsed.
    PreviewTimedOut { conn: ConnectionId },
    /// Outcome of the canned-preview request made after a stream failure.
    FallbackPreviewLoaded {
        conn: ConnectionId,
        result: Result<Value, String>,
    },
    /// Simulated preview delay elapsed.
    MockPreviewElapsed { conn: ConnectionId },
    /// Extraction stream delivered a `scrapedData`/`Scraped` event.
    ExtractionReceived { conn: ConnectionId, data: String },
    /// Extraction stream delivered a generic `message` event.
    ExtractionMessage { conn: ConnectionId, data: String },
    ExtractionStreamFailed {
        conn: ConnectionId,
        kind: ErrorKind,
        detail: String,
    },
    /// Extraction safety ceiling elapsed.
    ExtractionTimedOut { conn: ConnectionId },
    /// The transport refused to trigger the workflow.
    WorkflowTriggerRejected { conn: ConnectionId },
    /// Simulated progress interval elapsed.
    MockProgressTick { conn: ConnectionId },
}
