// crates/client/src/sse.rs
//! Incremental `text/event-stream` decoder.
//!
//! Follows the WHATWG event-stream interpretation rules:
//! - lines end in `\n`, `\r\n` or a lone `\r`; any of them may straddle chunks
//! - `:` starts a comment; a line without `:` is a field with an empty value
//! - one leading space after the colon is dropped
//! - multiple `data:` lines are joined with `\n`
//! - a blank line dispatches; an event with no `data:` is discarded
//! - an unterminated event at end of stream is discarded

use syncwatch_core::transport::{StreamEvent, DEFAULT_EVENT_TYPE};

const BOM: &str = "\u{feff}";

#[derive(Debug, Default)]
pub struct SseDecoder {
    line: Vec<u8>,
    /// Previous chunk ended in `\r`; a leading `\n` belongs to that line end.
    skip_lf: bool,
    started: bool,
    event_type: Option<String>,
    /// Every `data:` value followed by `\n`.
    data: String,
    last_event_id: Option<String>,
    retry_ms: Option<u64>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one network chunk; returns every event it completed, in order.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        for &byte in chunk {
            if std::mem::take(&mut self.skip_lf) && byte == b'\n' {
                continue;
            }
            match byte {
                b'\n' | b'\r' => {
                    self.skip_lf = byte == b'\r';
                    let line = std::mem::take(&mut self.line);
                    if let Some(event) = self.process_line(&line) {
                        events.push(event);
                    }
                }
                _ => self.line.push(byte),
            }
        }
        events
    }

    /// Last `id:` seen on the stream.
    pub fn last_event_id(&self) -> Option<&str> {
        self.last_event_id.as_deref()
    }

    /// Reconnection delay advertised by the server, in milliseconds.
    pub fn retry_ms(&self) -> Option<u64> {
        self.retry_ms
    }

    /// Bytes or fields that have not formed a complete event yet.
    pub fn has_pending(&self) -> bool {
        !self.line.is_empty() || !self.data.is_empty()
    }

    fn process_line(&mut self, raw: &[u8]) -> Option<StreamEvent> {
        let decoded = String::from_utf8_lossy(raw);
        let mut line: &str = &decoded;
        if !self.started {
            self.started = true;
            line = line.strip_prefix(BOM).unwrap_or(line);
        }

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
            "event" => self.event_type = Some(value.to_string()),
            "data" => {
                self.data.push_str(value);
                self.data.push('\n');
            }
            "id" if !value.contains('\0') => self.last_event_id = Some(value.to_string()),
            "retry" => {
                if let Ok(ms) = value.parse::<u64>() {
                    self.retry_ms = Some(ms);
                }
            }
            other => tracing::trace!(field = other, "ignoring unknown event-stream field"),
        }
        None
    }

    fn dispatch(&mut self) -> Option<StreamEvent> {
        let event_type = self.event_type.take();
        if self.data.is_empty() {
            return None;
        }
        let mut data = std::mem::take(&mut self.data);
        data.pop();
        Some(StreamEvent {
            event: event_type
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| DEFAULT_EVENT_TYPE.to_string()),
            data,
            id: self.last_event_id.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn decode_all(input: &str) -> Vec<StreamEvent> {
        SseDecoder::new().feed(input.as_bytes())
    }

    #[test]
    fn unnamed_event_defaults_to_message() {
        let events = decode_all("data: {\"a\":1}\n\n");
        assert_eq!(events, vec![StreamEvent::message("{\"a\":1}")]);
    }

    #[test]
    fn connected_then_data_like_the_backend_sends() {
        let events = decode_all(
            "event: connected\ndata: {\"status\":\"connected\"}\n\ndata: {\"job_id\":\"acc-1\"}\n\n",
        );
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event, "connected");
        assert!(!events[0].is_message());
        assert!(events[1].is_message());
        assert_eq!(events[1].data, "{\"job_id\":\"acc-1\"}");
    }

    #[test]
    fn multi_line_data_is_joined() {
        let events = decode_all("data: first\ndata:second\ndata\n\n");
        assert_eq!(events[0].data, "first\nsecond\n");
    }

    #[test]
    fn comments_and_unknown_fields_are_ignored() {
        let events = decode_all(": keep-alive\nfoo: bar\ndata: x\n\n:\n\n");
        assert_eq!(events, vec![StreamEvent::message("x")]);
    }

    #[test]
    fn event_without_data_is_discarded() {
        let events = decode_all("event: ping\n\ndata: y\n\n");
        assert_eq!(events, vec![StreamEvent::message("y")]);
    }

    #[test]
    fn crlf_and_lone_cr_line_endings() {
        assert_eq!(
            decode_all("data: a\r\n\r\ndata: b\r\rdata: c\n\n"),
            vec![
                StreamEvent::message("a"),
                StreamEvent::message("b"),
                StreamEvent::message("c"),
            ]
        );
    }

    #[test]
    fn crlf_split_across_chunks_is_one_line_end() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"data: a\r").is_empty());
        assert!(decoder.feed(b"\n\r").len() == 1);
        assert!(!decoder.has_pending());
    }

    #[test]
    fn utf8_split_across_chunks() {
        let bytes = "data: Résumé ✓\n\n".as_bytes();
        let mut decoder = SseDecoder::new();
        let mut events = Vec::new();
        for chunk in bytes.chunks(1) {
            events.extend(decoder.feed(chunk));
        }
        assert_eq!(events, vec![StreamEvent::message("Résumé ✓")]);
    }

    #[test]
    fn id_and_retry_are_tracked() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"id: 7\nretry: 3000\ndata: x\n\ndata: y\n\n");
        assert_eq!(events[0].id.as_deref(), Some("7"));
        assert_eq!(events[1].id.as_deref(), Some("7"));
        assert_eq!(decoder.last_event_id(), Some("7"));
        assert_eq!(decoder.retry_ms(), Some(3000));

        decoder.feed(b"retry: soon\n");
        assert_eq!(decoder.retry_ms(), Some(3000));
    }

    #[test]
    fn leading_bom_is_stripped() {
        assert_eq!(
            decode_all("\u{feff}data: x\n\n"),
            vec![StreamEvent::message("x")]
        );
    }

    #[test]
    fn unterminated_event_is_held_back() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"data: partial").is_empty());
        assert!(decoder.has_pending());
        assert!(decoder.feed(b"\n").is_empty());
        assert_eq!(decoder.feed(b"\n"), vec![StreamEvent::message("partial")]);
    }

    proptest! {
        #[test]
        fn chunking_never_changes_the_events(
            payloads in proptest::collection::vec("[a-z0-9 {}:\"]{0,20}", 1..8),
            split in 1usize..16,
        ) {
            let mut wire = String::new();
            for p in &payloads {
                wire.push_str("data: ");
                wire.push_str(p);
                wire.push_str("\r\n\r\n");
            }
            let whole = decode_all(&wire);

            let mut decoder = SseDecoder::new();
            let mut chunked = Vec::new();
            for chunk in wire.as_bytes().chunks(split) {
                chunked.extend(decoder.feed(chunk));
            }
            prop_assert_eq!(&whole, &chunked);
            prop_assert_eq!(whole.len(), payloads.len());
        }
    }
}
