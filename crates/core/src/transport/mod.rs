// crates/core/src/transport/mod.rs
//! Transport seam between the monitor and the network.
//!
//! Provides:
//! - `Transport` — performs the stream handshake and yields raw events
//! - `StreamRequest` — what to connect to
//! - `StreamEvent` — one dispatched server-sent event
//! - `MemoryTransport` — channel-fed transport for embedding and tests

pub mod memory;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::error::TransportError;

pub use memory::{MemoryConnection, MemoryServer, MemoryTransport};

/// Event type carried by unnamed server-sent events.
pub const DEFAULT_EVENT_TYPE: &str = "message";

/// Events yielded by an open stream, in delivery order.
pub type EventStream = BoxStream<'static, Result<StreamEvent, TransportError>>;

/// Trait for streaming transports that can deliver job snapshots.
///
/// Implementations include:
/// - `HttpTransport` (syncwatch-client) — reqwest + server-sent events
/// - [`MemoryTransport`] — in-process channel
#[async_trait]
pub trait Transport: Send + Sync {
    /// Complete the handshake. `Ok` means the subscription is established;
    /// the returned stream yields events until the server closes it.
    async fn connect(&self, request: StreamRequest) -> Result<EventStream, TransportError>;

    /// Transport name for logging.
    fn name(&self) -> &str;
}

/// Where and how to subscribe.
#[derive(Clone, PartialEq, Eq)]
pub struct StreamRequest {
    pub job_id: String,
    /// Endpoint without the query string; safe to log.
    pub target: String,
    /// Endpoint including `?token=`; never log this.
    pub url: String,
    pub connect_timeout: Duration,
}

impl fmt::Debug for StreamRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamRequest")
            .field("job_id", &self.job_id)
            .field("target", &self.target)
            .field("url", &"<redacted>")
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEvent {
    /// `event:` field, or [`DEFAULT_EVENT_TYPE`] when absent.
    pub event: String,
    pub data: String,
    pub id: Option<String>,
}

impl StreamEvent {
    /// An unnamed event carrying `data`.
    pub fn message(data: impl Into<String>) -> Self {
        Self {
            event: DEFAULT_EVENT_TYPE.to_string(),
            data: data.into(),
            id: None,
        }
    }

    pub fn named(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            data: data.into(),
            id: None,
        }
    }

    /// Only unnamed events carry snapshots; named ones (e.g. the backend's
    /// initial `connected`) are informational.
    pub fn is_message(&self) -> bool {
        self.event == DEFAULT_EVENT_TYPE
    }
}
