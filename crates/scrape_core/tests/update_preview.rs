use std::sync::Once;

use pretty_assertions::assert_eq;
use scrape_core::{
    update, ConnectionId, ContentType, Effect, ErrorKind, Msg, Phase, ScrapeRequest, Severity,
    WorkflowState,
};
use serde_json::json;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(scrape_logging::initialize_for_tests);
}

fn request() -> ScrapeRequest {
    ScrapeRequest::new("https://example.com", "prices")
}

fn submit(state: WorkflowState) -> (WorkflowState, ConnectionId) {
    let (state, _effects) = update(state, Msg::FormSubmitted(request()));
    let conn = state.preview_connection().expect("preview connection");
    (state, conn)
}

#[test]
fn submit_closes_previous_stream_before_opening_a_new_one() {
    init_logging();
    let (state, effects) = update(WorkflowState::new(), Msg::FormSubmitted(request()));
    let first = state.preview_connection().unwrap();

    assert_eq!(state.phase(), Phase::PreviewLoading);
    assert!(state.loading());
    assert_eq!(
        effects,
        vec![
            Effect::ClosePreviewStream,
            Effect::OpenPreviewStream {
                conn: first,
                request: request(),
            },
            Effect::StartPreviewTimeout { conn: first },
        ]
    );

    let (state, effects) = update(state, Msg::FormSubmitted(request()));
    let second = state.preview_connection().unwrap();
    assert_ne!(first, second);
    assert_eq!(effects[0], Effect::ClosePreviewStream);
    let opens = effects
        .iter()
        .filter(|e| matches!(e, Effect::OpenPreviewStream { .. }))
        .count();
    assert_eq!(opens, 1);
}

#[test]
fn preview_event_is_normalized_and_stream_closed() {
    init_logging();
    let (state, conn) = submit(WorkflowState::new());

    let (mut state, effects) = update(
        state,
        Msg::PreviewReceived {
            conn,
            data: r#"{"content_type": "xml", "data": {"foo": 1}}"#.to_string(),
        },
    );

    let preview = state.preview().expect("preview stored");
    assert_eq!(preview.content_type, ContentType::Xml);
    assert_eq!(preview.sample, json!([{"foo": 1}]));
    assert_eq!(preview.url, "https://example.com");
    assert_eq!(state.phase(), Phase::PreviewReady);
    assert!(!state.loading());
    assert_eq!(state.preview_connection(), None);
    assert_eq!(effects, vec![Effect::ClosePreviewStream]);
    assert!(state.consume_dirty());
}

#[test]
fn stale_preview_event_is_ignored() {
    init_logging();
    let (state, stale) = submit(WorkflowState::new());
    let (state, _live) = submit(state);

    let (next, effects) = update(
        state.clone(),
        Msg::PreviewReceived {
            conn: stale,
            data: r#"{"sample": [{"old": true}]}"#.to_string(),
        },
    );
    assert_eq!(next, state);
    assert!(effects.is_empty());
}

#[test]
fn stream_failure_falls_back_to_canned_preview() {
    init_logging();
    let (state, conn) = submit(WorkflowState::new());

    let (state, effects) = update(
        state,
        Msg::PreviewStreamFailed {
            conn,
            kind: ErrorKind::Network,
            detail: "connection refused".to_string(),
        },
    );
    assert_eq!(
        effects,
        vec![
            Effect::ClosePreviewStream,
            Effect::FetchFallbackPreview { conn }
        ]
    );
    assert!(state.loading());

    let (state, effects) = update(
        state,
        Msg::FallbackPreviewLoaded {
            conn,
            result: Ok(json!({"content_type": "html", "sample": [{"title": "canned"}]})),
        },
    );
    assert!(effects.is_empty());
    assert!(!state.loading());
    assert_eq!(state.error(), None);
    assert_eq!(state.preview().unwrap().sample, json!([{"title": "canned"}]));
}

#[test]
fn double_failure_synthesizes_fallback_with_advisory() {
    init_logging();
    let (state, conn) = submit(WorkflowState::new());
    let (state, _) = update(
        state,
        Msg::PreviewStreamFailed {
            conn,
            kind: ErrorKind::Network,
            detail: "refused".to_string(),
        },
    );
    let (state, _) = update(
        state,
        Msg::FallbackPreviewLoaded {
            conn,
            result: Err("503".to_string()),
        },
    );

    let preview = state.preview().unwrap();
    assert!(preview.note.as_deref().unwrap().contains("503"));
    let error = state.error().unwrap();
    assert_eq!(error.severity, Severity::Advisory);
    assert!(error.message.contains("fallback data"));
    assert_eq!(state.phase(), Phase::PreviewReady);
    assert!(!state.loading());
}

#[test]
fn malformed_preview_takes_the_fallback_path() {
    init_logging();
    let (state, conn) = submit(WorkflowState::new());
    let (_state, effects) = update(
        state,
        Msg::PreviewReceived {
            conn,
            data: "{not json".to_string(),
        },
    );
    assert_eq!(
        effects,
        vec![
            Effect::ClosePreviewStream,
            Effect::FetchFallbackPreview { conn }
        ]
    );
}

#[test]
fn timeout_sets_advisory_without_fallback_data() {
    init_logging();
    let (state, conn) = submit(WorkflowState::new());
    let (state, effects) = update(state, Msg::PreviewTimedOut { conn });

    assert!(effects.is_empty());
    assert_eq!(state.preview(), None);
    assert!(!state.loading());
    let error = state.error().unwrap();
    assert_eq!(error.kind, ErrorKind::Timeout);
    assert_eq!(error.severity, Severity::Advisory);
    assert!(error.message.contains("still processing"));
    // The stream stays open after the timeout.
    assert_eq!(state.preview_connection(), Some(conn));
}

#[test]
fn late_preview_after_timeout_still_lands() {
    init_logging();
    let (state, conn) = submit(WorkflowState::new());
    let (state, _) = update(state, Msg::PreviewTimedOut { conn });
    let (state, effects) = update(
        state,
        Msg::PreviewReceived {
            conn,
            data: r#"{"sample": [{"a": 1}]}"#.to_string(),
        },
    );
    assert_eq!(effects, vec![Effect::ClosePreviewStream]);
    assert!(state.preview().is_some());
    assert_eq!(state.error(), None);
}

#[test]
fn timeout_after_settle_is_ignored() {
    init_logging();
    let (state, conn) = submit(WorkflowState::new());
    let (state, _) = update(
        state,
        Msg::PreviewReceived {
            conn,
            data: r#"{"sample": []}"#.to_string(),
        },
    );
    let (next, effects) = update(state.clone(), Msg::PreviewTimedOut { conn });
    assert_eq!(next, state);
    assert!(effects.is_empty());
}

#[test]
fn mock_submit_produces_deterministic_preview() {
    init_logging();
    let (state, effects) = update(WorkflowState::with_mock_data(), Msg::FormSubmitted(request()));
    let conn = state.preview_connection().unwrap();
    assert_eq!(
        effects,
        vec![
            Effect::ClosePreviewStream,
            Effect::ScheduleMockPreview { conn }
        ]
    );

    let (state, _) = update(state, Msg::MockPreviewElapsed { conn });
    assert_eq!(state.preview().unwrap().url, "https://example.com");
    assert!(!state.loading());
    assert_eq!(state.phase(), Phase::PreviewReady);
}

#[test]
fn cancel_posts_decision_and_returns_to_idle() {
    init_logging();
    let (state, conn) = submit(WorkflowState::new());
    let (state, _) = update(
        state,
        Msg::PreviewReceived {
            conn,
            data: r#"{"run_id": "r-9", "resume_link": "https://hook/9", "sample": []}"#.to_string(),
        },
    );
    let (state, effects) = update(state, Msg::PreviewCancelled);

    assert_eq!(state.phase(), Phase::Idle);
    assert_eq!(state.preview(), None);
    assert_eq!(
        effects,
        vec![
            Effect::ClosePreviewStream,
            Effect::CloseExtractionStream,
            Effect::SubmitPreviewDecision {
                decision: scrape_core::PreviewDecision::Cancel,
                payload: Some(json!({"run_id": "r-9", "resume_link": "https://hook/9"})),
            },
        ]
    );
}
