use serde_json::Value;

use crate::{ConnectionId, PreviewDecision, ScrapeRequest, StreamKey};

/// Side effects requested by [`crate::update`]; executed by the runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Close the live preview stream if there is one. Idempotent.
    ClosePreviewStream,
    OpenPreviewStream {
        conn: ConnectionId,
        request: ScrapeRequest,
    },
    StartPreviewTimeout { conn: ConnectionId },
    FetchFallbackPreview { conn: ConnectionId },
    ScheduleMockPreview { conn: ConnectionId },
    /// Close the live extraction stream if there is one. Idempotent.
    CloseExtractionStream,
    /// Fire-and-forget POST to the resume link.
    TriggerWorkflow {
        conn: ConnectionId,
        resume_link: String,
    },
    OpenExtractionStream { conn: ConnectionId, key: StreamKey },
    StartExtractionTimeout { conn: ConnectionId },
    ScheduleMockProgress { conn: ConnectionId },
    SubmitPreviewDecision {
        decision: PreviewDecision,
        payload: Option<Value>,
    },
}
