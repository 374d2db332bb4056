// crates/client/src/http.rs
//! Server-sent-events transport over reqwest.

use std::collections::VecDeque;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{self, BoxStream};
use futures_util::StreamExt;
use reqwest::header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE};
use reqwest::StatusCode;
use syncwatch_core::transport::{EventStream, StreamEvent, StreamRequest, Transport};
use syncwatch_core::TransportError;

use crate::sse::SseDecoder;

const EVENT_STREAM_MIME: &str = "text/event-stream";

/// Streams job snapshots from `GET {stream_url}` with `Accept: text/event-stream`.
///
/// No request timeout is set on the client: the stream stays open for the
/// whole job. The handshake is bounded by the monitor's connect timeout.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("syncwatch/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    /// Use a preconfigured client (proxies, custom roots, ...).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn connect(&self, request: StreamRequest) -> Result<EventStream, TransportError> {
        let response = self
            .client
            .get(&request.url)
            .header(ACCEPT, EVENT_STREAM_MIME)
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status();
        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            return Err(TransportError::Unauthorized {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(TransportError::Http {
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !is_event_stream(&content_type) {
            return Err(TransportError::UnexpectedContentType { content_type });
        }

        tracing::debug!(target_url = %request.target, %status, "event stream established");
        Ok(decode_events(response.bytes_stream().boxed()))
    }

    fn name(&self) -> &str {
        "http"
    }
}

fn is_event_stream(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case(EVENT_STREAM_MIME))
}

/// reqwest errors print the request url, which carries the token.
fn network_error(err: reqwest::Error) -> TransportError {
    TransportError::Network(err.without_url().to_string())
}

struct DecodeState {
    body: BoxStream<'static, reqwest::Result<Bytes>>,
    decoder: SseDecoder,
    ready: VecDeque<StreamEvent>,
    failed: bool,
}

fn decode_events(body: BoxStream<'static, reqwest::Result<Bytes>>) -> EventStream {
    let state = DecodeState {
        body,
        decoder: SseDecoder::new(),
        ready: VecDeque::new(),
        failed: false,
    };
    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(event) = state.ready.pop_front() {
                return Some((Ok(event), state));
            }
            if state.failed {
                return None;
            }
            match state.body.next().await {
                Some(Ok(chunk)) => state.ready.extend(state.decoder.feed(&chunk)),
                Some(Err(err)) => {
                    state.failed = true;
                    return Some((Err(network_error(err)), state));
                }
                None => {
                    if state.decoder.has_pending() {
                        tracing::debug!("discarding unterminated event at end of stream");
                    }
                    return None;
                }
            }
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_stream_mime_accepts_parameters() {
        assert!(is_event_stream("text/event-stream"));
        assert!(is_event_stream("text/event-stream; charset=utf-8"));
        assert!(is_event_stream("Text/Event-Stream"));
        assert!(!is_event_stream("application/json"));
        assert!(!is_event_stream(""));
    }

    #[tokio::test]
    async fn decodes_events_across_chunks() {
        let chunks: Vec<reqwest::Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"event: connected\ndata: {}\n\nda")),
            Ok(Bytes::from_static(b"ta: one\n\ndata: two\n")),
            Ok(Bytes::from_static(b"\n")),
        ];
        let events: Vec<_> = decode_events(stream::iter(chunks).boxed())
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].event, "connected");
        assert_eq!(events[1].data, "one");
        assert_eq!(events[2].data, "two");
    }
}
