use crate::view_model::WorkflowView;
use crate::{ConnectionId, PreviewData, Record, ScrapeRequest, WorkflowError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    PreviewLoading,
    PreviewReady,
    Scraping,
    ScrapeComplete,
}

/// What the live preview connection is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PreviewFlow {
    Streaming(ConnectionId),
    /// Stream failed and was closed; the canned preview request is in flight.
    AwaitingFallback(ConnectionId),
    /// Wait ceiling elapsed; the stream stays open and a late preview is still accepted.
    TimedOut(ConnectionId),
    Mock(ConnectionId),
}

impl PreviewFlow {
    pub(crate) fn connection(self) -> ConnectionId {
        match self {
            PreviewFlow::Streaming(conn)
            | PreviewFlow::AwaitingFallback(conn)
            | PreviewFlow::TimedOut(conn)
            | PreviewFlow::Mock(conn) => conn,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExtractionFlow {
    Streaming(ConnectionId),
    Mock(ConnectionId),
}

/// Workflow state owned exclusively by the orchestration runtime.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WorkflowState {
    pub(crate) use_mock_data: bool,
    pub(crate) phase: Phase,
    pub(crate) loading: bool,
    pub(crate) preview: Option<PreviewData>,
    pub(crate) extracted: Option<Vec<Record>>,
    pub(crate) scraping: bool,
    pub(crate) progress: u8,
    pub(crate) error: Option<WorkflowError>,
    pub(crate) origin_url: Option<String>,
    pub(crate) last_request: Option<ScrapeRequest>,
    pub(crate) last_resume_link: Option<String>,
    pub(crate) preview_flow: Option<PreviewFlow>,
    pub(crate) extraction_flow: Option<ExtractionFlow>,
    next_connection: u64,
    dirty: bool,
}

impl WorkflowState {
    pub fn new() -> Self {
        Self::default()
    }

    /// State that synthesizes previews and results locally instead of using the network.
    pub fn with_mock_data() -> Self {
        Self {
            use_mock_data: true,
            ..Self::default()
        }
    }

    pub fn uses_mock_data(&self) -> bool {
        self.use_mock_data
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn preview(&self) -> Option<&PreviewData> {
        self.preview.as_ref()
    }

    pub fn extracted(&self) -> Option<&[Record]> {
        self.extracted.as_deref()
    }

    pub fn scraping(&self) -> bool {
        self.scraping
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn error(&self) -> Option<&WorkflowError> {
        self.error.as_ref()
    }

    /// Connection currently backing the preview phase, if any.
    pub fn preview_connection(&self) -> Option<ConnectionId> {
        self.preview_flow.map(PreviewFlow::connection)
    }

    /// Connection currently backing the extraction phase, if any.
    pub fn extraction_connection(&self) -> Option<ConnectionId> {
        self.extraction_flow.map(|flow| match flow {
            ExtractionFlow::Streaming(conn) | ExtractionFlow::Mock(conn) => conn,
        })
    }

    pub fn view(&self) -> WorkflowView {
        WorkflowView {
            phase: self.phase,
            loading: self.loading,
            preview: self.preview.clone(),
            extracted: self.extracted.clone(),
            scraping: self.scraping,
            progress: self.progress,
            error: self.error.clone(),
            origin_url: self.origin_url.clone(),
            uses_mock_data: self.use_mock_data,
        }
    }

    /// Returns whether anything changed since the last call and clears the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn allocate_connection(&mut self) -> ConnectionId {
        self.next_connection += 1;
        ConnectionId(self.next_connection)
    }

    /// Back to the initial values, keeping the mode and the id counter so that
    /// messages from torn-down connections can never match a new one.
    pub(crate) fn clear(&mut self) {
        *self = Self {
            use_mock_data: self.use_mock_data,
            next_connection: self.next_connection,
            dirty: true,
            ..Self::default()
        };
    }

    /// Phase to fall back to when an extraction attempt stops without results.
    pub(crate) fn phase_before_scraping(&self) -> Phase {
        if self.preview.is_some() {
            Phase::PreviewReady
        } else {
            Phase::Idle
        }
    }
}
