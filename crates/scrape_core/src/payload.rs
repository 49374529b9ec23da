//! Normalization of server payloads into one canonical shape.
//!
//! The backend is not consistent about where it nests the fields we need, so
//! every probe for alternate locations lives here and nowhere else.

use serde_json::{Map, Value};

use crate::{ContentType, PreviewData, Record, ScrapeRequest};

pub const NO_DATA_MESSAGE: &str = "No Data Found";

const UUID_KEY: &str = "uuid";
const ORIGIN_URL_KEY: &str = "origin_url";

pub fn parse_payload(raw: &str) -> Result<Value, String> {
    serde_json::from_str(raw).map_err(|err| err.to_string())
}

/// Builds a [`PreviewData`] from a `preview` event or fallback response.
///
/// `sample` is taken from the root or from `data`; without one, `data` itself
/// (or the whole payload) becomes the sample.
/// `run_id` and `resume_link` are looked up at the root, under `data`, and under
/// `sample` (object or first element), in that order.
pub fn normalize_preview(payload: &Value, request: Option<&ScrapeRequest>) -> PreviewData {
    let data = payload.get("data").filter(|d| !d.is_null());

    let content_type = string_field(payload, &["content_type", "contentType"])
        .or_else(|| data.and_then(|d| string_field(d, &["content_type", "contentType"])))
        .map(|raw| ContentType::from_reported(&raw))
        .unwrap_or_default();

    let nested_sample = data.and_then(|d| d.get("sample"));
    let sample = match payload.get("sample").filter(|s| !s.is_null()).or(nested_sample) {
        Some(sample) if !sample.is_null() => sample.clone(),
        _ => match data {
            Some(Value::Array(items)) => Value::Array(items.clone()),
            Some(other) => Value::Array(vec![other.clone()]),
            None => Value::Array(vec![payload.clone()]),
        },
    };

    let url = string_field(payload, &["url"])
        .or_else(|| data.and_then(|d| string_field(d, &["url"])))
        .or_else(|| request.map(|r| r.url.clone()))
        .unwrap_or_default();

    let candidates = [Some(payload), data, first_sample_item(&sample)];
    let run_id = probe(&candidates, "run_id");
    let resume_link = probe(&candidates, "resume_link");

    PreviewData {
        url,
        content_type,
        sample,
        run_id,
        resume_link,
        note: None,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionOutcome {
    pub records: Vec<Record>,
    pub origin_url: Option<String>,
    /// False when the placeholder was substituted.
    pub located: bool,
}

/// Parses an extraction event. Never fails: unparseable or empty payloads
/// yield the `No Data Found` placeholder.
pub fn normalize_extraction(raw: &str) -> ExtractionOutcome {
    match parse_payload(raw) {
        Ok(value) => extraction_from_value(&value),
        Err(_) => ExtractionOutcome {
            records: no_data_placeholder(),
            origin_url: None,
            located: false,
        },
    }
}

pub fn extraction_from_value(payload: &Value) -> ExtractionOutcome {
    let origin_url = find_origin_url(payload);
    let located = [
        payload.pointer("/data/extractedData"),
        payload.get("extractedData"),
        payload.get("data"),
        Some(payload),
    ]
    .into_iter()
    .flatten()
    .find_map(|candidate| candidate.as_array().filter(|items| !items.is_empty()));

    match located {
        Some(items) => ExtractionOutcome {
            records: items.iter().map(to_clean_record).collect(),
            origin_url,
            located: true,
        },
        None => ExtractionOutcome {
            records: no_data_placeholder(),
            origin_url,
            located: false,
        },
    }
}

pub fn no_data_placeholder() -> Vec<Record> {
    let mut record = Map::new();
    record.insert("message".to_string(), Value::String(NO_DATA_MESSAGE.to_string()));
    vec![record]
}

/// Removes every `uuid` key at any depth; everything else is left as is.
pub fn strip_uuid(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.remove(UUID_KEY);
            map.values_mut().for_each(strip_uuid);
        }
        Value::Array(items) => items.iter_mut().for_each(strip_uuid),
        _ => {}
    }
}

/// First non-empty `origin_url` string found depth-first.
pub fn find_origin_url(value: &Value) -> Option<String> {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(url)) = map.get(ORIGIN_URL_KEY) {
                if !url.is_empty() {
                    return Some(url.clone());
                }
            }
            map.values().find_map(find_origin_url)
        }
        Value::Array(items) => items.iter().find_map(find_origin_url),
        _ => None,
    }
}

/// Reads `{progress}` (or `{data: {progress}}`) from a generic stream message.
pub fn parse_progress(raw: &str) -> Option<u8> {
    let value = parse_payload(raw).ok()?;
    let progress = value
        .get("progress")
        .or_else(|| value.pointer("/data/progress"))?;
    let number = match progress {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !number.is_finite() {
        return None;
    }
    Some(number.clamp(0.0, 100.0).round() as u8)
}

fn to_clean_record(item: &Value) -> Record {
    let mut item = item.clone();
    strip_uuid(&mut item);
    match item {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert("value".to_string(), other);
            map
        }
    }
}

fn first_sample_item(sample: &Value) -> Option<&Value> {
    match sample {
        Value::Array(items) => items.first(),
        Value::Object(_) => Some(sample),
        _ => None,
    }
}

fn probe(candidates: &[Option<&Value>], key: &str) -> Option<String> {
    candidates
        .iter()
        .flatten()
        .find_map(|candidate| string_field(candidate, &[key]))
}

fn string_field(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match value.get(*key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}
