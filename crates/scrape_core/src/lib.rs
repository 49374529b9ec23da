//! Scrape core: pure workflow state machine, payload normalization and environment rules.
mod effect;
mod environment;
mod error;
mod mock;
mod msg;
mod payload;
mod state;
mod types;
mod update;
mod view_model;

pub use effect::Effect;
pub use environment::{
    resolve_environment, EnvironmentConfig, EnvironmentKind, EnvironmentSignals, LOCAL_API_BASE,
    LOCAL_MODE,
};
pub use error::{ErrorKind, RetryTarget, Severity, WorkflowError, WorkflowStage};
pub use mock::{fallback_preview, mock_dataset, mock_preview, MOCK_PROGRESS_STEP};
pub use msg::Msg;
pub use payload::{
    extraction_from_value, find_origin_url, no_data_placeholder, normalize_extraction,
    normalize_preview, parse_payload, parse_progress, strip_uuid, ExtractionOutcome,
    NO_DATA_MESSAGE,
};
pub use state::{Phase, WorkflowState};
pub use types::{
    ConnectionId, ContentType, PreviewData, PreviewDecision, Record, ScrapeRequest, StreamKey,
};
pub use update::update;
pub use view_model::{record_columns, WorkflowView};
