//! Scrape engine: HTTP/SSE transport and effect execution for the workflow core.
mod api;
mod client;
mod event_source;
mod export;
mod persist;
mod runtime;
mod sse;
mod types;

pub use api::ScrapeApi;
pub use client::{ClientSettings, ReqwestApiClient};
pub use event_source::{close_event_source, EventSourceHandle, StreamSignal};
pub use export::{
    cell_text, export_records, render_csv, render_json, ExportError, ExportFormat, ExportSummary,
};
pub use persist::{write_atomically, PersistError};
pub use runtime::{RuntimeSettings, ScraperHandle};
pub use sse::{SseDecoder, SseEvent};
pub use types::{ClientError, JobTicket, ScrapeResults, ScrapeStatus, UrlEntry, UrlList};
