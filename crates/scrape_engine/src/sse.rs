//! Incremental `text/event-stream` decoder.
//!
//! Bytes are buffered until a full line is available, so UTF-8 sequences and
//! lines split across network chunks decode correctly.

const DEFAULT_EVENT: &str = "message";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Event name; `message` when the server sent none.
    pub event: String,
    /// Data lines joined with `\n`.
    pub data: String,
    pub id: Option<String>,
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
    last_id: Option<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk and returns every event completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line).into_owned();
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
        }
        events
    }

    /// Flushes a trailing event when the stream ends without a final blank line.
    pub fn finish(&mut self) -> Option<SseEvent> {
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            let line = String::from_utf8_lossy(&rest).trim_end_matches('\r').to_string();
            if let Some(event) = self.process_line(&line) {
                return Some(event);
            }
        }
        self.dispatch()
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            "id" => self.last_id = Some(value.to_string()),
            // `retry` is meaningless without reconnection.
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseEvent {
            event: event
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| DEFAULT_EVENT.to_string()),
            data,
            id: self.last_id.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_event_with_json_data() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"event: preview\ndata: {\"a\":1}\n\n");
        assert_eq!(
            events,
            vec![SseEvent {
                event: "preview".to_string(),
                data: "{\"a\":1}".to_string(),
                id: None,
            }]
        );
    }

    #[test]
    fn unnamed_event_defaults_to_message_and_joins_lines() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"id: 7\ndata: first\ndata: second\n\n");
        assert_eq!(events[0].event, "message");
        assert_eq!(events[0].data, "first\nsecond");
        assert_eq!(events[0].id.as_deref(), Some("7"));
    }

    #[test]
    fn lines_split_across_chunks_and_crlf() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"event: Scra").is_empty());
        assert!(decoder.push(b"ped\r\ndata: {\"t\":\"caf\xC3").is_empty());
        let events = decoder.push(b"\xA9\"}\r\n\r\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "Scraped");
        assert_eq!(events[0].data, "{\"t\":\"caf\u{e9}\"}");
    }

    #[test]
    fn comments_retry_and_dataless_events_are_skipped() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b": keep-alive\nretry: 1000\n\nevent: ping\n\ndata: x\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "message");
        assert_eq!(events[0].data, "x");
    }

    #[test]
    fn finish_flushes_unterminated_event() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"event: scrapedData\ndata: []").is_empty());
        let event = decoder.finish().expect("trailing event");
        assert_eq!(event.event, "scrapedData");
        assert_eq!(event.data, "[]");
        assert_eq!(decoder.finish(), None);
    }
}
