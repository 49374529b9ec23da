use serde_json::{json, Value};

use crate::{ContentType, PreviewData, Record, ScrapeRequest};

/// Progress added per simulated interval.
pub const MOCK_PROGRESS_STEP: u8 = 10;

const MOCK_RUN_ID: &str = "mock-run";
const MOCK_RESUME_LINK: &str = "mock://resume";

/// Deterministic preview for the given request.
pub fn mock_preview(request: Option<&ScrapeRequest>) -> PreviewData {
    let (url, target) = request
        .map(|r| (r.url.clone(), r.scrape_target.clone()))
        .unwrap_or_default();
    PreviewData {
        url,
        content_type: ContentType::Html,
        sample: json!([
            {"title": "Sample product", "price": "19.99", "target": target},
            {"title": "Another product", "price": "5.49", "target": target},
        ]),
        run_id: Some(MOCK_RUN_ID.to_string()),
        resume_link: Some(MOCK_RESUME_LINK.to_string()),
        note: None,
    }
}

/// Minimal preview used when neither the stream nor the canned endpoint answered.
pub fn fallback_preview(request: Option<&ScrapeRequest>, detail: &str) -> PreviewData {
    PreviewData {
        url: request.map(|r| r.url.clone()).unwrap_or_default(),
        content_type: ContentType::Html,
        sample: Value::Array(Vec::new()),
        run_id: None,
        resume_link: None,
        note: Some(format!("Preview service unreachable ({detail}). Showing fallback data.")),
    }
}

pub fn mock_dataset() -> Vec<Record> {
    let rows = json!([
        {"title": "Mechanical keyboard", "price": "89.00", "availability": "in stock"},
        {"title": "Wireless mouse", "price": "24.50", "availability": "in stock"},
        {"title": "USB-C hub", "price": "39.90", "availability": "backorder"},
        {"title": "27in monitor", "price": "229.00", "availability": "in stock"},
        {"title": "Laptop stand", "price": "31.00", "availability": "sold out"},
    ]);
    match rows {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}
