use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use pretty_assertions::assert_eq;
use scrape_core::{
    mock_dataset, ContentType, ErrorKind, Phase, PreviewDecision, ScrapeRequest, Severity,
    StreamKey, WorkflowView,
};
use scrape_engine::{
    ClientError, EventSourceHandle, RuntimeSettings, ScrapeApi, ScraperHandle, SseEvent,
    StreamSignal,
};
use serde_json::{json, Value};
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(scrape_logging::initialize_for_tests);
}

struct Opened {
    token: CancellationToken,
    tx: UnboundedSender<StreamSignal>,
    key: String,
}

impl Opened {
    fn emit(&self, event: &str, data: Value) {
        let _ = self.tx.send(StreamSignal::Event(SseEvent {
            event: event.to_string(),
            data: data.to_string(),
            id: None,
        }));
    }
}

#[derive(Default)]
struct FakeApi {
    previews: Mutex<Vec<Opened>>,
    extractions: Mutex<Vec<Opened>>,
    triggers: Mutex<Vec<String>>,
    decisions: Mutex<Vec<(PreviewDecision, Option<Value>)>>,
    sample: Mutex<Option<Result<Value, ClientError>>>,
}

impl FakeApi {
    fn preview_count(&self) -> usize {
        self.previews.lock().unwrap().len()
    }

    fn extraction_count(&self) -> usize {
        self.extractions.lock().unwrap().len()
    }

    fn open_previews(&self) -> usize {
        self.previews
            .lock()
            .unwrap()
            .iter()
            .filter(|o| !o.token.is_cancelled())
            .count()
    }
}

#[async_trait::async_trait]
impl ScrapeApi for FakeApi {
    async fn fetch_sample_preview(&self) -> Result<Value, ClientError> {
        self.sample
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Err(ClientError::Network("no sample".into())))
    }

    async fn submit_preview_data(
        &self,
        decision: PreviewDecision,
        payload: Option<Value>,
    ) -> Result<Value, ClientError> {
        self.decisions.lock().unwrap().push((decision, payload));
        Ok(json!({"ok": true}))
    }

    fn create_preview_event_source(&self, request: &ScrapeRequest) -> EventSourceHandle {
        let (handle, tx) = EventSourceHandle::channel("preview");
        self.previews.lock().unwrap().push(Opened {
            token: handle.cancellation(),
            tx,
            key: request.url.clone(),
        });
        handle
    }

    fn create_scraping_event_source(&self, key: &StreamKey) -> EventSourceHandle {
        let (handle, tx) = EventSourceHandle::channel("extraction");
        let (name, value) = key.query_pair();
        self.extractions.lock().unwrap().push(Opened {
            token: handle.cancellation(),
            tx,
            key: format!("{name}={value}"),
        });
        handle
    }

    fn trigger_workflow(&self, resume_link: &str) -> bool {
        self.triggers.lock().unwrap().push(resume_link.to_string());
        !resume_link.trim().is_empty()
    }
}

fn fast_settings() -> RuntimeSettings {
    RuntimeSettings {
        preview_timeout: Duration::from_secs(5),
        extraction_timeout: Duration::from_secs(5),
        mock_preview_delay: Duration::from_millis(20),
        mock_progress_interval: Duration::from_millis(5),
    }
}

fn request() -> ScrapeRequest {
    ScrapeRequest::new("https://example.com", "prices")
}

async fn eventually(mut check: impl FnMut() -> bool) {
    for _ in 0..300 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

async fn view_where(
    handle: &ScraperHandle,
    predicate: impl FnMut(&WorkflowView) -> bool,
) -> WorkflowView {
    tokio::time::timeout(Duration::from_secs(3), handle.wait_for(predicate))
        .await
        .expect("view in time")
        .expect("workflow running")
}

fn spawn(api: &Arc<FakeApi>, settings: RuntimeSettings) -> ScraperHandle {
    ScraperHandle::spawn(api.clone(), settings, false)
}

async fn preview_ready(api: &Arc<FakeApi>, handle: &ScraperHandle, preview: Value) {
    handle.handle_form_submit(request());
    eventually(|| api.preview_count() == 1).await;
    api.previews.lock().unwrap()[0].emit("preview", preview);
    view_where(handle, |v| v.phase == Phase::PreviewReady).await;
}

#[tokio::test]
async fn repeated_submits_keep_one_preview_connection() {
    init_logging();
    let api = Arc::new(FakeApi::default());
    let handle = spawn(&api, fast_settings());

    for expected in 1..=3 {
        handle.handle_form_submit(request());
        eventually(|| api.preview_count() == expected).await;
        assert_eq!(api.open_previews(), 1);
    }
    let previews = api.previews.lock().unwrap();
    assert!(previews[0].token.is_cancelled());
    assert!(previews[1].token.is_cancelled());
    assert!(!previews[2].token.is_cancelled());
    assert_eq!(previews[2].key, "https://example.com");
}

#[tokio::test]
async fn preview_event_is_stored_and_stream_closed() {
    init_logging();
    let api = Arc::new(FakeApi::default());
    let handle = spawn(&api, fast_settings());

    preview_ready(&api, &handle, json!({"content_type": "xml", "data": {"foo": 1}})).await;

    let view = handle.view();
    let preview = view.preview.expect("preview");
    assert_eq!(preview.content_type, ContentType::Xml);
    assert_eq!(preview.sample, json!([{"foo": 1}]));
    assert!(!view.loading);
    eventually(|| api.open_previews() == 0).await;
}

#[tokio::test]
async fn preview_timeout_is_advisory_and_keeps_preview_empty() {
    init_logging();
    let api = Arc::new(FakeApi::default());
    let settings = RuntimeSettings {
        preview_timeout: Duration::from_millis(50),
        ..fast_settings()
    };
    let handle = spawn(&api, settings);

    handle.handle_form_submit(request());
    let view = view_where(&handle, |v| v.error.is_some()).await;

    let error = view.error.unwrap();
    assert_eq!(error.kind, ErrorKind::Timeout);
    assert_eq!(error.severity, Severity::Advisory);
    assert_eq!(view.preview, None);
    assert!(!view.loading);
}

#[tokio::test]
async fn stream_failure_loads_canned_preview() {
    init_logging();
    let api = Arc::new(FakeApi::default());
    *api.sample.lock().unwrap() = Some(Ok(json!({"sample": [{"title": "canned"}]})));
    let handle = spawn(&api, fast_settings());

    handle.handle_form_submit(request());
    eventually(|| api.preview_count() == 1).await;
    let _ = api.previews.lock().unwrap()[0]
        .tx
        .send(StreamSignal::Failed(ClientError::Network("refused".into())));

    let view = view_where(&handle, |v| v.preview.is_some()).await;
    assert_eq!(view.preview.unwrap().sample, json!([{"title": "canned"}]));
    assert_eq!(view.error, None);
    assert!(api.previews.lock().unwrap()[0].token.is_cancelled());
}

#[tokio::test]
async fn double_failure_uses_fallback_preview_with_advisory() {
    init_logging();
    let api = Arc::new(FakeApi::default());
    let handle = spawn(&api, fast_settings());

    handle.handle_form_submit(request());
    eventually(|| api.preview_count() == 1).await;
    let _ = api.previews.lock().unwrap()[0].tx.send(StreamSignal::Ended);

    let view = view_where(&handle, |v| v.preview.is_some()).await;
    assert!(view.preview.unwrap().note.is_some());
    assert!(view.error.unwrap().message.contains("fallback data"));
    assert!(!view.loading);
}

#[tokio::test]
async fn approved_scrape_strips_uuid_and_closes_stream() {
    init_logging();
    let api = Arc::new(FakeApi::default());
    let handle = spawn(&api, fast_settings());
    preview_ready(&api, &handle, json!({"run_id": "run-1", "sample": []})).await;

    handle.start_scraping("https://hook/resume");
    eventually(|| api.extraction_count() == 1).await;
    assert_eq!(*api.triggers.lock().unwrap(), vec!["https://hook/resume"]);
    {
        let extractions = api.extractions.lock().unwrap();
        assert_eq!(extractions[0].key, "run_id=run-1");
        extractions[0].emit("message", json!({"progress": 60}));
    }
    view_where(&handle, |v| v.progress == 60).await;

    api.extractions.lock().unwrap()[0].emit(
        "scrapedData",
        json!({"data": {"extractedData": [{"uuid": "x", "title": "A"}]}}),
    );
    let view = view_where(&handle, |v| v.extracted.is_some()).await;

    assert_eq!(
        view.extracted.unwrap(),
        vec![json!({"title": "A"}).as_object().cloned().unwrap()]
    );
    assert!(!view.scraping);
    assert_eq!(view.progress, 100);
    assert_eq!(view.phase, Phase::ScrapeComplete);
    eventually(|| api.extractions.lock().unwrap()[0].token.is_cancelled()).await;
}

#[tokio::test]
async fn alternate_completion_event_name_is_accepted() {
    init_logging();
    let api = Arc::new(FakeApi::default());
    let handle = spawn(&api, fast_settings());
    preview_ready(&api, &handle, json!({"sample": []})).await;

    handle.start_scraping("https://hook/resume");
    eventually(|| api.extraction_count() == 1).await;
    assert!(api.extractions.lock().unwrap()[0].key.starts_with("jobId=job-"));
    api.extractions.lock().unwrap()[0].emit("Scraped", json!({"data": {}}));

    let view = view_where(&handle, |v| v.extracted.is_some()).await;
    assert_eq!(view.extracted.unwrap()[0]["message"], json!("No Data Found"));
}

#[tokio::test]
async fn empty_resume_link_fails_without_opening_a_stream() {
    init_logging();
    let api = Arc::new(FakeApi::default());
    let handle = spawn(&api, fast_settings());
    preview_ready(&api, &handle, json!({"sample": []})).await;

    handle.start_scraping("");
    let view = view_where(&handle, |v| v.error.is_some()).await;

    assert!(!view.scraping);
    assert_eq!(view.error.unwrap().kind, ErrorKind::User);
    assert_eq!(api.extraction_count(), 0);
    assert!(api.triggers.lock().unwrap().is_empty());
}

#[tokio::test]
async fn extraction_safety_timeout_is_fatal() {
    init_logging();
    let api = Arc::new(FakeApi::default());
    let settings = RuntimeSettings {
        extraction_timeout: Duration::from_millis(50),
        ..fast_settings()
    };
    let handle = spawn(&api, settings);
    preview_ready(&api, &handle, json!({"sample": []})).await;

    handle.start_scraping("https://hook/resume");
    let view = view_where(&handle, |v| v.error.is_some()).await;

    let error = view.error.unwrap();
    assert!(error.is_fatal());
    assert_eq!(error.kind, ErrorKind::Timeout);
    assert!(!view.scraping);
    eventually(|| api.extractions.lock().unwrap()[0].token.is_cancelled()).await;
}

#[tokio::test]
async fn reset_closes_connections_and_returns_to_idle() {
    init_logging();
    let api = Arc::new(FakeApi::default());
    let handle = spawn(&api, fast_settings());

    handle.handle_form_submit(request());
    eventually(|| api.preview_count() == 1).await;
    handle.reset_scraper();
    handle.reset_scraper();

    eventually(|| api.open_previews() == 0).await;
    let view = view_where(&handle, |v| v.phase == Phase::Idle).await;
    assert_eq!(view, WorkflowView::default());

    // A late event on the torn-down stream changes nothing.
    api.previews.lock().unwrap()[0].emit("preview", json!({"sample": []}));
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(handle.view(), WorkflowView::default());
}

#[tokio::test]
async fn cancel_submits_decision() {
    init_logging();
    let api = Arc::new(FakeApi::default());
    let handle = spawn(&api, fast_settings());
    preview_ready(&api, &handle, json!({"run_id": "r-2", "sample": []})).await;

    handle.cancel_preview();
    eventually(|| !api.decisions.lock().unwrap().is_empty()).await;
    let decisions = api.decisions.lock().unwrap();
    assert_eq!(decisions[0].0, PreviewDecision::Cancel);
    assert_eq!(decisions[0].1, Some(json!({"run_id": "r-2"})));
}

#[tokio::test]
async fn dropping_the_last_handle_tears_down_streams() {
    init_logging();
    let api = Arc::new(FakeApi::default());
    let handle = spawn(&api, fast_settings());
    handle.handle_form_submit(request());
    eventually(|| api.preview_count() == 1).await;

    drop(handle);
    eventually(|| api.open_previews() == 0).await;
}

#[tokio::test]
async fn mock_mode_runs_the_whole_workflow_offline() {
    init_logging();
    let api = Arc::new(FakeApi::default());
    let handle = ScraperHandle::spawn(api.clone(), fast_settings(), true);

    handle.handle_form_submit(request());
    let view = view_where(&handle, |v| v.preview.is_some()).await;
    assert_eq!(view.preview.unwrap().url, "https://example.com");
    assert!(!view.loading);

    let mut views = handle.subscribe();
    handle.start_scraping("");
    let mut seen = Vec::new();
    let finished = tokio::time::timeout(Duration::from_secs(3), async {
        loop {
            views.changed().await.expect("workflow running");
            let view = views.borrow_and_update().clone();
            seen.push(view.progress);
            if view.phase == Phase::ScrapeComplete {
                return view;
            }
        }
    })
    .await
    .expect("mock scrape finished");

    assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    assert!(seen.iter().all(|p| *p <= 100));
    assert_eq!(finished.progress, 100);
    assert_eq!(finished.extracted.unwrap(), mock_dataset());
    assert_eq!(api.preview_count(), 0);
    assert!(api.triggers.lock().unwrap().is_empty());
}
