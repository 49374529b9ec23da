use scrape_core::{PreviewDecision, ScrapeRequest, StreamKey};
use serde_json::Value;

use crate::{ClientError, EventSourceHandle};

/// Transport seam used by the orchestration runtime.
#[async_trait::async_trait]
pub trait ScrapeApi: Send + Sync {
    /// Canned preview served when the live stream fails.
    async fn fetch_sample_preview(&self) -> Result<Value, ClientError>;

    /// Advances or aborts a paused backend workflow.
    async fn submit_preview_data(
        &self,
        decision: PreviewDecision,
        payload: Option<Value>,
    ) -> Result<Value, ClientError>;

    fn create_preview_event_source(&self, request: &ScrapeRequest) -> EventSourceHandle;

    fn create_scraping_event_source(&self, key: &StreamKey) -> EventSourceHandle;

    /// Fire-and-forget POST to `resume_link`. Returns `false` only for an empty link;
    /// the request outcome is reported through logging, never to the caller.
    fn trigger_workflow(&self, resume_link: &str) -> bool;
}
