use serde_json::{json, Map, Value};

use crate::error::{
    EXTRACTION_TIMEOUT_MESSAGE, MISSING_RESUME_LINK_MESSAGE, PREVIEW_FALLBACK_MESSAGE,
    PREVIEW_TIMEOUT_MESSAGE, TRIGGER_REJECTED_MESSAGE,
};
use crate::mock::{fallback_preview, mock_dataset, mock_preview, MOCK_PROGRESS_STEP};
use crate::payload::{normalize_extraction, normalize_preview, parse_payload, parse_progress};
use crate::state::{ExtractionFlow, PreviewFlow};
use crate::{
    ConnectionId, Effect, ErrorKind, Msg, Phase, PreviewData, PreviewDecision, RetryTarget,
    ScrapeRequest, StreamKey, WorkflowError, WorkflowStage, WorkflowState,
};

/// Pure update function: applies a message to state and returns any effects.
///
/// Messages tagged with a connection that is no longer live are dropped here,
/// so a stale stream can never write into newer state.
pub fn update(mut state: WorkflowState, msg: Msg) -> (WorkflowState, Vec<Effect>) {
    let effects = match msg {
        Msg::FormSubmitted(request) => submit_form(&mut state, request),
        Msg::ScrapeApproved { resume_link } => start_scraping(&mut state, resume_link),
        Msg::PreviewCancelled => cancel_preview(&mut state),
        Msg::ResetRequested => reset(&mut state),
        Msg::RetryRequested => retry(&mut state),
        Msg::PreviewReceived { conn, data } => preview_received(&mut state, conn, &data),
        Msg::PreviewStreamFailed { conn, .. } => preview_failed(&mut state, conn),
        Msg::PreviewTimedOut { conn } => {
            if state.preview_flow == Some(PreviewFlow::Streaming(conn)) {
                // Advisory only: the stream stays open and a late preview still lands.
                state.preview_flow = Some(PreviewFlow::TimedOut(conn));
                state.loading = false;
                state.error = Some(WorkflowError::advisory(
                    ErrorKind::Timeout,
                    WorkflowStage::Preview,
                    PREVIEW_TIMEOUT_MESSAGE,
                ));
                state.mark_dirty();
            }
            Vec::new()
        }
        Msg::FallbackPreviewLoaded { conn, result } => {
            if state.preview_flow == Some(PreviewFlow::AwaitingFallback(conn)) {
                let preview = match result {
                    Ok(payload) => normalize_preview(&payload, state.last_request.as_ref()),
                    Err(detail) => {
                        state.error = Some(WorkflowError::advisory(
                            ErrorKind::Network,
                            WorkflowStage::Preview,
                            PREVIEW_FALLBACK_MESSAGE,
                        ));
                        fallback_preview(state.last_request.as_ref(), &detail)
                    }
                };
                settle_preview(&mut state, preview);
            }
            Vec::new()
        }
        Msg::MockPreviewElapsed { conn } => {
            if state.preview_flow == Some(PreviewFlow::Mock(conn)) {
                let preview = mock_preview(state.last_request.as_ref());
                settle_preview(&mut state, preview);
            }
            Vec::new()
        }
        Msg::ExtractionReceived { conn, data } => {
            if state.extraction_flow != Some(ExtractionFlow::Streaming(conn)) {
                return (state, Vec::new());
            }
            let outcome = normalize_extraction(&data);
            if outcome.origin_url.is_some() {
                state.origin_url = outcome.origin_url;
            }
            state.extracted = Some(outcome.records);
            state.scraping = false;
            state.progress = 100;
            state.phase = Phase::ScrapeComplete;
            state.extraction_flow = None;
            state.mark_dirty();
            vec![Effect::CloseExtractionStream]
        }
        Msg::ExtractionMessage { conn, data } => {
            if state.extraction_flow == Some(ExtractionFlow::Streaming(conn)) {
                if let Some(progress) = parse_progress(&data) {
                    if progress > state.progress {
                        state.progress = progress;
                        state.mark_dirty();
                    }
                }
            }
            Vec::new()
        }
        Msg::ExtractionStreamFailed { conn, kind, detail } => fail_extraction(
            &mut state,
            conn,
            kind,
            format!("Lost connection to the scraping stream: {detail}"),
        ),
        Msg::ExtractionTimedOut { conn } => fail_extraction(
            &mut state,
            conn,
            ErrorKind::Timeout,
            EXTRACTION_TIMEOUT_MESSAGE.to_string(),
        ),
        Msg::WorkflowTriggerRejected { conn } => fail_extraction(
            &mut state,
            conn,
            ErrorKind::User,
            TRIGGER_REJECTED_MESSAGE.to_string(),
        ),
        Msg::MockProgressTick { conn } => {
            if state.extraction_flow != Some(ExtractionFlow::Mock(conn)) {
                return (state, Vec::new());
            }
            state.progress = state.progress.saturating_add(MOCK_PROGRESS_STEP).min(100);
            state.mark_dirty();
            if state.progress < 100 {
                vec![Effect::ScheduleMockProgress { conn }]
            } else {
                state.extracted = Some(mock_dataset());
                state.scraping = false;
                state.phase = Phase::ScrapeComplete;
                state.extraction_flow = None;
                Vec::new()
            }
        }
    };

    (state, effects)
}

fn submit_form(state: &mut WorkflowState, request: ScrapeRequest) -> Vec<Effect> {
    let mut effects = vec![Effect::ClosePreviewStream];
    if state.extraction_flow.take().is_some() {
        effects.push(Effect::CloseExtractionStream);
    }

    state.preview = None;
    state.extracted = None;
    state.error = None;
    state.origin_url = None;
    state.scraping = false;
    state.progress = 0;
    state.loading = true;
    state.phase = Phase::PreviewLoading;
    state.last_request = Some(request.clone());
    state.mark_dirty();

    let conn = state.allocate_connection();
    if state.use_mock_data {
        state.preview_flow = Some(PreviewFlow::Mock(conn));
        effects.push(Effect::ScheduleMockPreview { conn });
    } else {
        state.preview_flow = Some(PreviewFlow::Streaming(conn));
        effects.push(Effect::OpenPreviewStream { conn, request });
        effects.push(Effect::StartPreviewTimeout { conn });
    }
    effects
}

fn preview_received(state: &mut WorkflowState, conn: ConnectionId, data: &str) -> Vec<Effect> {
    match state.preview_flow {
        Some(PreviewFlow::Streaming(live) | PreviewFlow::TimedOut(live)) if live == conn => {}
        _ => return Vec::new(),
    }

    match parse_payload(data) {
        Ok(payload) => {
            let preview = normalize_preview(&payload, state.last_request.as_ref());
            // The timeout advisory no longer applies once the preview is here.
            state.error = None;
            settle_preview(state, preview);
            vec![Effect::ClosePreviewStream]
        }
        // Unparseable preview is handled like a stream failure.
        Err(_) => preview_failed(state, conn),
    }
}

fn preview_failed(state: &mut WorkflowState, conn: ConnectionId) -> Vec<Effect> {
    match state.preview_flow {
        Some(PreviewFlow::Streaming(live)) if live == conn => {
            state.preview_flow = Some(PreviewFlow::AwaitingFallback(conn));
            vec![
                Effect::ClosePreviewStream,
                Effect::FetchFallbackPreview { conn },
            ]
        }
        // The wait already settled on the timeout; keep its advisory and just hang up.
        Some(PreviewFlow::TimedOut(live)) if live == conn => {
            state.preview_flow = None;
            vec![Effect::ClosePreviewStream]
        }
        _ => Vec::new(),
    }
}

fn settle_preview(state: &mut WorkflowState, preview: PreviewData) {
    state.preview = Some(preview);
    state.phase = Phase::PreviewReady;
    state.loading = false;
    state.preview_flow = None;
    state.mark_dirty();
}

fn start_scraping(state: &mut WorkflowState, resume_link: String) -> Vec<Effect> {
    let mut effects = vec![Effect::CloseExtractionStream];
    // A preview still in flight must not settle into the run that replaces it.
    if state.preview_flow.take().is_some() {
        state.loading = false;
        effects.push(Effect::ClosePreviewStream);
    }
    state.extraction_flow = None;
    state.extracted = None;
    state.error = None;
    state.scraping = true;
    state.progress = 0;
    state.phase = Phase::Scraping;
    state.last_resume_link = Some(resume_link.clone());
    state.mark_dirty();

    let conn = state.allocate_connection();
    if state.use_mock_data {
        state.extraction_flow = Some(ExtractionFlow::Mock(conn));
        effects.push(Effect::ScheduleMockProgress { conn });
        return effects;
    }

    let resume_link = resume_link.trim();
    if resume_link.is_empty() {
        state.scraping = false;
        state.phase = state.phase_before_scraping();
        state.error = Some(WorkflowError::fatal(
            ErrorKind::User,
            WorkflowStage::Extraction,
            MISSING_RESUME_LINK_MESSAGE,
        ));
        return effects;
    }

    let key = state
        .preview
        .as_ref()
        .and_then(|preview| preview.run_id.clone())
        .map(StreamKey::RunId)
        .unwrap_or_else(|| StreamKey::JobId(format!("job-{}", conn.0)));

    state.extraction_flow = Some(ExtractionFlow::Streaming(conn));
    effects.push(Effect::TriggerWorkflow {
        conn,
        resume_link: resume_link.to_string(),
    });
    effects.push(Effect::OpenExtractionStream { conn, key });
    effects.push(Effect::StartExtractionTimeout { conn });
    effects
}

fn fail_extraction(
    state: &mut WorkflowState,
    conn: ConnectionId,
    kind: ErrorKind,
    message: String,
) -> Vec<Effect> {
    if state.extraction_flow != Some(ExtractionFlow::Streaming(conn)) {
        return Vec::new();
    }
    state.extraction_flow = None;
    state.scraping = false;
    state.phase = state.phase_before_scraping();
    state.error = Some(WorkflowError::fatal(kind, WorkflowStage::Extraction, message));
    state.mark_dirty();
    vec![Effect::CloseExtractionStream]
}

fn cancel_preview(state: &mut WorkflowState) -> Vec<Effect> {
    if !matches!(state.phase, Phase::PreviewLoading | Phase::PreviewReady) {
        return Vec::new();
    }
    let payload = state.preview.as_ref().map(decision_payload);
    let submit = !state.use_mock_data;
    let mut effects = reset(state);
    if submit {
        effects.push(Effect::SubmitPreviewDecision {
            decision: PreviewDecision::Cancel,
            payload,
        });
    }
    effects
}

fn decision_payload(preview: &PreviewData) -> Value {
    let mut payload = Map::new();
    if let Some(run_id) = &preview.run_id {
        payload.insert("run_id".to_string(), json!(run_id));
    }
    if let Some(link) = &preview.resume_link {
        payload.insert("resume_link".to_string(), json!(link));
    }
    Value::Object(payload)
}

fn reset(state: &mut WorkflowState) -> Vec<Effect> {
    state.clear();
    vec![Effect::ClosePreviewStream, Effect::CloseExtractionStream]
}

fn retry(state: &mut WorkflowState) -> Vec<Effect> {
    let Some(target) = state.error.as_ref().map(WorkflowError::retry_target) else {
        return Vec::new();
    };
    match target {
        RetryTarget::ResubmitForm => match state.last_request.clone() {
            Some(request) => submit_form(state, request),
            None => reset(state),
        },
        RetryTarget::RestartScraping => {
            let link = state
                .last_resume_link
                .clone()
                .or_else(|| state.preview.as_ref().and_then(|p| p.resume_link.clone()))
                .unwrap_or_default();
            start_scraping(state, link)
        }
    }
}
