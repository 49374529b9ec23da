use std::sync::Arc;
use std::time::Duration;

use scrape_core::{
    update, ConnectionId, Effect, ErrorKind, Msg, ScrapeRequest, WorkflowState, WorkflowView,
};
use scrape_logging::{scrape_debug, scrape_info, scrape_trace, scrape_warn};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::event_source::{close_event_source, EventSourceHandle, StreamSignal};
use crate::ScrapeApi;

const PREVIEW_EVENT: &str = "preview";
const EXTRACTION_EVENTS: [&str; 2] = ["scrapedData", "Scraped"];
const PROGRESS_EVENT: &str = "message";

#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    /// How long to wait for the preview event before showing the keep-waiting advisory.
    pub preview_timeout: Duration,
    /// Ceiling after which a silent extraction stream is considered dead.
    pub extraction_timeout: Duration,
    pub mock_preview_delay: Duration,
    pub mock_progress_interval: Duration,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            preview_timeout: Duration::from_secs(120),
            extraction_timeout: Duration::from_secs(240),
            mock_preview_delay: Duration::from_millis(1500),
            mock_progress_interval: Duration::from_millis(300),
        }
    }
}

enum Command {
    Dispatch(Msg),
    Shutdown,
}

/// Cloneable access to a running scrape workflow.
///
/// State is read through [`ScraperHandle::view`] or [`ScraperHandle::subscribe`];
/// the only way to change it is through the action methods. When the last handle
/// is dropped the workflow closes its connections and stops.
#[derive(Clone)]
pub struct ScraperHandle {
    cmd_tx: mpsc::UnboundedSender<Command>,
    view_rx: watch::Receiver<WorkflowView>,
}

impl ScraperHandle {
    /// Starts the workflow actor on the current tokio runtime.
    pub fn spawn(api: Arc<dyn ScrapeApi>, settings: RuntimeSettings, use_mock_data: bool) -> Self {
        let state = if use_mock_data {
            WorkflowState::with_mock_data()
        } else {
            WorkflowState::new()
        };
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (view_tx, view_rx) = watch::channel(state.view());
        let runtime = Runtime {
            api,
            settings,
            state,
            preview: None,
            extraction: None,
            cmd_tx: cmd_tx.downgrade(),
            view_tx,
        };
        tokio::spawn(runtime.run(cmd_rx));
        Self { cmd_tx, view_rx }
    }

    pub fn handle_form_submit(&self, request: ScrapeRequest) {
        self.dispatch(Msg::FormSubmitted(request));
    }

    pub fn start_scraping(&self, resume_link: impl Into<String>) {
        self.dispatch(Msg::ScrapeApproved {
            resume_link: resume_link.into(),
        });
    }

    pub fn reset_scraper(&self) {
        self.dispatch(Msg::ResetRequested);
    }

    pub fn cancel_preview(&self) {
        self.dispatch(Msg::PreviewCancelled);
    }

    pub fn retry(&self) {
        self.dispatch(Msg::RetryRequested);
    }

    pub fn dispatch(&self, msg: Msg) {
        // A stopped workflow has nothing left to update.
        let _ = self.cmd_tx.send(Command::Dispatch(msg));
    }

    /// Closes both connections and stops the workflow for every handle.
    pub fn shutdown(&self) {
        let _ = self.cmd_tx.send(Command::Shutdown);
    }

    pub fn view(&self) -> WorkflowView {
        self.view_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<WorkflowView> {
        self.view_rx.clone()
    }

    /// Waits until a published view satisfies `predicate`.
    /// Returns `None` if the workflow stopped first.
    pub async fn wait_for(&self, predicate: impl FnMut(&WorkflowView) -> bool) -> Option<WorkflowView> {
        let mut rx = self.view_rx.clone();
        // Bound so the borrow guard drops before `rx`; a tail-expression temporary would outlive it.
        let view = rx.wait_for(predicate).await.ok().map(|view| view.clone());
        view
    }
}

struct Runtime {
    api: Arc<dyn ScrapeApi>,
    settings: RuntimeSettings,
    state: WorkflowState,
    preview: Option<EventSourceHandle>,
    extraction: Option<EventSourceHandle>,
    cmd_tx: mpsc::WeakUnboundedSender<Command>,
    view_tx: watch::Sender<WorkflowView>,
}

impl Runtime {
    async fn run(mut self, mut cmd_rx: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = cmd_rx.recv().await {
            match command {
                Command::Dispatch(msg) => self.dispatch(msg),
                Command::Shutdown => break,
            }
        }
        close_event_source(&mut self.preview);
        close_event_source(&mut self.extraction);
        scrape_debug!("scrape workflow stopped");
    }

    fn dispatch(&mut self, msg: Msg) {
        scrape_trace!("dispatch {:?}", msg);
        let state = std::mem::take(&mut self.state);
        let (mut state, effects) = update(state, msg);
        let changed = state.consume_dirty();
        self.state = state;
        for effect in effects {
            self.execute(effect);
        }
        if changed {
            self.view_tx.send_replace(self.state.view());
        }
    }

    fn execute(&mut self, effect: Effect) {
        match effect {
            Effect::ClosePreviewStream => close_event_source(&mut self.preview),
            Effect::OpenPreviewStream { conn, request } => {
                close_event_source(&mut self.preview);
                scrape_info!(
                    "opening preview stream {} url={} target={}",
                    conn,
                    request.url,
                    request.scrape_target
                );
                let mut handle = self.api.create_preview_event_source(&request);
                self.forward(&mut handle, move |signal| preview_msg(conn, signal));
                self.preview = Some(handle);
            }
            Effect::StartPreviewTimeout { conn } => {
                self.after(self.settings.preview_timeout, Msg::PreviewTimedOut { conn });
            }
            Effect::FetchFallbackPreview { conn } => {
                let api = self.api.clone();
                let cmd_tx = self.cmd_tx.clone();
                tokio::spawn(async move {
                    let result = api.fetch_sample_preview().await.map_err(|err| {
                        scrape_warn!("fallback preview {} failed: {}", conn, err);
                        err.to_string()
                    });
                    post(&cmd_tx, Msg::FallbackPreviewLoaded { conn, result });
                });
            }
            Effect::ScheduleMockPreview { conn } => {
                self.after(self.settings.mock_preview_delay, Msg::MockPreviewElapsed { conn });
            }
            Effect::CloseExtractionStream => close_event_source(&mut self.extraction),
            Effect::TriggerWorkflow { conn, resume_link } => {
                if !self.api.trigger_workflow(&resume_link) {
                    post(&self.cmd_tx, Msg::WorkflowTriggerRejected { conn });
                }
            }
            Effect::OpenExtractionStream { conn, key } => {
                close_event_source(&mut self.extraction);
                scrape_info!("opening extraction stream {} key={:?}", conn, key);
                let mut handle = self.api.create_scraping_event_source(&key);
                self.forward(&mut handle, move |signal| extraction_msg(conn, signal));
                self.extraction = Some(handle);
            }
            Effect::StartExtractionTimeout { conn } => {
                self.after(self.settings.extraction_timeout, Msg::ExtractionTimedOut { conn });
            }
            Effect::ScheduleMockProgress { conn } => {
                self.after(self.settings.mock_progress_interval, Msg::MockProgressTick { conn });
            }
            Effect::SubmitPreviewDecision { decision, payload } => {
                let api = self.api.clone();
                tokio::spawn(async move {
                    match api.submit_preview_data(decision, payload).await {
                        Ok(_) => scrape_info!("preview decision {} submitted", decision.as_str()),
                        Err(err) => scrape_warn!(
                            "preview decision {} failed: {}",
                            decision.as_str(),
                            err
                        ),
                    }
                });
            }
        }
    }

    /// Relays a connection's signals into the actor until the handle is closed.
    fn forward(
        &self,
        handle: &mut EventSourceHandle,
        to_msg: impl Fn(StreamSignal) -> Option<Msg> + Send + 'static,
    ) {
        let Some(mut signals) = handle.take_signals() else {
            return;
        };
        let closed: CancellationToken = handle.cancellation();
        let cmd_tx = self.cmd_tx.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = closed.cancelled() => break,
                    signal = signals.recv() => {
                        let Some(signal) = signal else { break };
                        if let Some(msg) = to_msg(signal) {
                            if !post(&cmd_tx, msg) {
                                break;
                            }
                        }
                    }
                }
            }
        });
    }

    fn after(&self, delay: Duration, msg: Msg) {
        let cmd_tx = self.cmd_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            post(&cmd_tx, msg);
        });
    }
}

/// Sends into the actor; false once the workflow has stopped.
fn post(cmd_tx: &mpsc::WeakUnboundedSender<Command>, msg: Msg) -> bool {
    match cmd_tx.upgrade() {
        Some(tx) => tx.send(Command::Dispatch(msg)).is_ok(),
        None => false,
    }
}

fn preview_msg(conn: ConnectionId, signal: StreamSignal) -> Option<Msg> {
    match signal {
        StreamSignal::Opened => {
            scrape_debug!("preview stream {} open", conn);
            None
        }
        StreamSignal::Event(event) if event.event == PREVIEW_EVENT => Some(Msg::PreviewReceived {
            conn,
            data: event.data,
        }),
        StreamSignal::Event(event) => {
            scrape_trace!("preview stream {} ignored event {}", conn, event.event);
            None
        }
        StreamSignal::Failed(err) => {
            scrape_warn!("preview stream {} failed: {}", conn, err);
            Some(Msg::PreviewStreamFailed {
                conn,
                kind: err.kind(),
                detail: err.to_string(),
            })
        }
        StreamSignal::Ended => Some(Msg::PreviewStreamFailed {
            conn,
            kind: ErrorKind::Network,
            detail: "stream ended before a preview arrived".to_string(),
        }),
    }
}

fn extraction_msg(conn: ConnectionId, signal: StreamSignal) -> Option<Msg> {
    match signal {
        StreamSignal::Opened => {
            scrape_debug!("extraction stream {} open", conn);
            None
        }
        StreamSignal::Event(event) if EXTRACTION_EVENTS.contains(&event.event.as_str()) => {
            Some(Msg::ExtractionReceived {
                conn,
                data: event.data,
            })
        }
        StreamSignal::Event(event) if event.event == PROGRESS_EVENT => {
            Some(Msg::ExtractionMessage {
                conn,
                data: event.data,
            })
        }
        StreamSignal::Event(event) => {
            scrape_trace!("extraction stream {} ignored event {}", conn, event.event);
            None
        }
        StreamSignal::Failed(err) => {
            scrape_warn!("extraction stream {} failed: {}", conn, err);
            Some(Msg::ExtractionStreamFailed {
                conn,
                kind: err.kind(),
                detail: err.to_string(),
            })
        }
        StreamSignal::Ended => Some(Msg::ExtractionStreamFailed {
            conn,
            kind: ErrorKind::Network,
            detail: "stream ended before results arrived".to_string(),
        }),
    }
}
