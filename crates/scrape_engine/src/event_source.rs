use futures_util::StreamExt;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use scrape_logging::{scrape_debug, scrape_trace};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::client::api_error;
use crate::sse::{SseDecoder, SseEvent};
use crate::types::{map_reqwest_error, ClientError};

/// Lifecycle and data signals of one server-push connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamSignal {
    Opened,
    Event(SseEvent),
    Failed(ClientError),
    /// Server closed the stream.
    Ended,
}

/// Owner of one inbound event stream.
///
/// Closing is idempotent and also happens on drop, so a handle can never
/// outlive its owner with the connection still open.
#[derive(Debug)]
pub struct EventSourceHandle {
    label: String,
    cancel: CancellationToken,
    signals: Option<mpsc::UnboundedReceiver<StreamSignal>>,
}

impl EventSourceHandle {
    /// Creates a handle plus the sender a transport feeds signals into.
    pub fn channel(label: impl Into<String>) -> (Self, mpsc::UnboundedSender<StreamSignal>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = Self {
            label: label.into(),
            cancel: CancellationToken::new(),
            signals: Some(rx),
        };
        (handle, tx)
    }

    /// Handle whose only signal is the given failure.
    pub fn failed(label: impl Into<String>, err: ClientError) -> Self {
        let (handle, tx) = Self::channel(label);
        let _ = tx.send(StreamSignal::Failed(err));
        handle
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Takes the signal receiver; `None` after the first call.
    pub fn take_signals(&mut self) -> Option<mpsc::UnboundedReceiver<StreamSignal>> {
        self.signals.take()
    }

    /// Token cancelled when the handle is closed.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn close(&self) {
        if !self.cancel.is_cancelled() {
            scrape_debug!("closing event source {}", self.label);
            self.cancel.cancel();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for EventSourceHandle {
    fn drop(&mut self) {
        self.close();
    }
}

/// Closes and forgets the handle in `slot`. No-op when empty.
pub fn close_event_source(slot: &mut Option<EventSourceHandle>) {
    if let Some(handle) = slot.take() {
        handle.close();
    }
}

/// Connects to `url` and pumps decoded events until closed or the server hangs up.
pub(crate) fn open_event_source(
    client: reqwest::Client,
    url: Url,
    label: impl Into<String>,
) -> EventSourceHandle {
    let (handle, tx) = EventSourceHandle::channel(label);
    let cancel = handle.cancellation();
    let label = handle.label().to_string();
    tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => {
                scrape_trace!("event source {} cancelled", label);
            }
            _ = pump(client, url, &tx) => {}
        }
    });
    handle
}

async fn pump(client: reqwest::Client, url: Url, tx: &mpsc::UnboundedSender<StreamSignal>) {
    let response = match client
        .get(url)
        .header(ACCEPT, "text/event-stream")
        .header(CACHE_CONTROL, "no-cache")
        .send()
        .await
    {
        Ok(response) => response,
        Err(err) => {
            let _ = tx.send(StreamSignal::Failed(map_reqwest_error(err)));
            return;
        }
    };

    if !response.status().is_success() {
        let _ = tx.send(StreamSignal::Failed(api_error(response).await));
        return;
    }
    if tx.send(StreamSignal::Opened).is_err() {
        return;
    }

    let mut decoder = SseDecoder::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(err) => {
                let _ = tx.send(StreamSignal::Failed(map_reqwest_error(err)));
                return;
            }
        };
        for event in decoder.push(&chunk) {
            if tx.send(StreamSignal::Event(event)).is_err() {
                return;
            }
        }
    }
    if let Some(event) = decoder.finish() {
        let _ = tx.send(StreamSignal::Event(event));
    }
    let _ = tx.send(StreamSignal::Ended);
}
