use std::time::{Duration, Instant};

use chrono::Utc;
use reqwest::StatusCode;
use scrape_core::{PreviewDecision, ScrapeRequest, StreamKey};
use scrape_logging::{scrape_debug, scrape_info, scrape_warn};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use url::Url;

use crate::event_source::open_event_source;
use crate::types::map_reqwest_error;
use crate::{
    ClientError, EventSourceHandle, JobTicket, ScrapeApi, ScrapeResults, ScrapeStatus, UrlList,
};

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub api_base_url: String,
    pub connect_timeout: Duration,
    /// Applies to one-shot requests only; streams stay open as long as the server keeps them.
    pub request_timeout: Duration,
    /// `source` field sent with workflow triggers.
    pub workflow_source: String,
}

impl ClientSettings {
    pub fn new(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            workflow_source: "scrape_app".to_string(),
        }
    }
}

/// HTTP/SSE client for the scrape backend.
#[derive(Debug, Clone)]
pub struct ReqwestApiClient {
    settings: ClientSettings,
    base: Url,
    http: reqwest::Client,
    streaming: reqwest::Client,
    session_token: String,
}

impl ReqwestApiClient {
    pub fn new(settings: ClientSettings) -> Result<Self, ClientError> {
        let base = parse_base(&settings.api_base_url)?;
        let http = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(map_reqwest_error)?;
        let streaming = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .build()
            .map_err(map_reqwest_error)?;
        let session_token = uuid::Uuid::new_v4().simple().to_string();
        scrape_debug!("api client base={} session={}", base, session_token);
        Ok(Self {
            settings,
            base,
            http,
            streaming,
            session_token,
        })
    }

    /// Identifier the server uses to route pushed events to this client.
    pub fn session_token(&self) -> &str {
        &self.session_token
    }

    pub fn preview_events_url(&self, request: &ScrapeRequest) -> Result<Url, ClientError> {
        let mut url = self.endpoint("api/preview/events")?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("url", &request.url);
            query.append_pair("target", &request.scrape_target);
            if let Some(parse_type) = &request.parse_type {
                query.append_pair("parseType", parse_type);
            }
            query.append_pair("sessionToken", &self.session_token);
        }
        Ok(url)
    }

    pub fn scraping_events_url(&self, key: &StreamKey) -> Result<Url, ClientError> {
        let mut url = self.endpoint("api/scraped-data/events")?;
        let (name, value) = key.query_pair();
        url.query_pairs_mut()
            .append_pair(name, value)
            .append_pair("sessionToken", &self.session_token);
        Ok(url)
    }

    pub async fn submit_scrape_request(
        &self,
        request: &ScrapeRequest,
    ) -> Result<JobTicket, ClientError> {
        let url = self.endpoint("api/scrape")?;
        let body = serde_json::to_value(request).map_err(|e| ClientError::Decode(e.to_string()))?;
        self.post_json(url, &body).await
    }

    pub async fn get_scrape_status(&self, job_id: &str) -> Result<ScrapeStatus, ClientError> {
        let url = self.endpoint_with_segment("api/scrape/status/", job_id)?;
        self.get_json(url).await
    }

    pub async fn get_scrape_results(&self, job_id: &str) -> Result<ScrapeResults, ClientError> {
        let url = self.endpoint_with_segment("api/scrape/results/", job_id)?;
        self.get_json(url).await
    }

    pub async fn get_url_list(&self) -> Result<UrlList, ClientError> {
        let url = self.endpoint("api/supabase/url-list")?;
        self.get_json(url).await
    }

    /// Polls the job status until it finishes or fails, or `ceiling` elapses.
    pub async fn wait_for_job(
        &self,
        job_id: &str,
        interval: Duration,
        ceiling: Duration,
    ) -> Result<ScrapeStatus, ClientError> {
        let started = Instant::now();
        loop {
            let status = self.get_scrape_status(job_id).await?;
            scrape_debug!("job {} status={} progress={:?}", job_id, status.status, status.progress);
            if status.is_finished() || status.is_failed() {
                return Ok(status);
            }
            if started.elapsed() >= ceiling {
                return Err(ClientError::Timeout(format!(
                    "job {job_id} still {} after {:?}",
                    status.status, ceiling
                )));
            }
            tokio::time::sleep(interval).await;
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        self.base
            .join(path)
            .map_err(|err| ClientError::InvalidUrl(err.to_string()))
    }

    fn endpoint_with_segment(&self, path: &str, segment: &str) -> Result<Url, ClientError> {
        let mut url = self.endpoint(path)?;
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .push(segment);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ClientError> {
        let response = self.http.get(url).send().await.map_err(map_reqwest_error)?;
        read_json(response).await
    }

    async fn post_json<T: DeserializeOwned>(&self, url: Url, body: &Value) -> Result<T, ClientError> {
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        read_json(response).await
    }
}

#[async_trait::async_trait]
impl ScrapeApi for ReqwestApiClient {
    async fn fetch_sample_preview(&self) -> Result<Value, ClientError> {
        let url = self.endpoint("api/preview/sample_data")?;
        self.get_json(url).await
    }

    async fn submit_preview_data(
        &self,
        decision: PreviewDecision,
        payload: Option<Value>,
    ) -> Result<Value, ClientError> {
        let url = self.endpoint("api/proceed-scrape")?;
        self.post_json(url, &decision_body(decision, payload)).await
    }

    fn create_preview_event_source(&self, request: &ScrapeRequest) -> EventSourceHandle {
        match self.preview_events_url(request) {
            Ok(url) => open_event_source(self.streaming.clone(), url, "preview"),
            Err(err) => EventSourceHandle::failed("preview", err),
        }
    }

    fn create_scraping_event_source(&self, key: &StreamKey) -> EventSourceHandle {
        match self.scraping_events_url(key) {
            Ok(url) => open_event_source(self.streaming.clone(), url, "extraction"),
            Err(err) => EventSourceHandle::failed("extraction", err),
        }
    }

    fn trigger_workflow(&self, resume_link: &str) -> bool {
        let link = resume_link.trim().to_string();
        if link.is_empty() {
            scrape_warn!("workflow trigger skipped: empty resume link");
            return false;
        }
        let client = self.http.clone();
        let body = json!({
            "source": self.settings.workflow_source,
            "timestamp": Utc::now().to_rfc3339(),
        });
        tokio::spawn(async move {
            match client.post(link.as_str()).json(&body).send().await {
                Ok(response) if response.status().is_success() => {
                    scrape_info!(
                        "workflow trigger accepted status={} link={}",
                        response.status().as_u16(),
                        link
                    );
                }
                Ok(response) => {
                    scrape_warn!(
                        "workflow trigger rejected status={} link={}",
                        response.status().as_u16(),
                        link
                    );
                }
                Err(err) => {
                    scrape_warn!("workflow trigger failed link={} error={}", link, err);
                }
            }
        });
        true
    }
}

/// `{action, ...payload}` with the payload's fields flattened next to `action`.
fn decision_body(decision: PreviewDecision, payload: Option<Value>) -> Value {
    let mut body = Map::new();
    match payload {
        Some(Value::Object(fields)) => body.extend(fields),
        Some(Value::Null) | None => {}
        Some(other) => {
            body.insert("payload".to_string(), other);
        }
    }
    body.insert("action".to_string(), json!(decision.as_str()));
    Value::Object(body)
}

fn parse_base(raw: &str) -> Result<Url, ClientError> {
    let mut base = Url::parse(raw.trim()).map_err(|err| ClientError::InvalidUrl(format!("{raw}: {err}")))?;
    if base.cannot_be_a_base() {
        return Err(ClientError::InvalidUrl(raw.to_string()));
    }
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    Ok(base)
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
    if !response.status().is_success() {
        return Err(api_error(response).await);
    }
    let body = response.bytes().await.map_err(map_reqwest_error)?;
    serde_json::from_slice(&body).map_err(|err| ClientError::Decode(err.to_string()))
}

/// Builds [`ClientError::Api`], preferring the body's `error` or `message` field.
pub(crate) async fn api_error(response: reqwest::Response) -> ClientError {
    let status = response.status();
    let body = response.bytes().await.unwrap_or_default();
    ClientError::Api {
        status: status.as_u16(),
        message: error_message(&body, status),
    }
}

fn error_message(body: &[u8], status: StatusCode) -> String {
    serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|value| {
            ["error", "message"]
                .iter()
                .find_map(|key| value.get(*key).and_then(Value::as_str).map(str::to_owned))
        })
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        })
}
