// crates/core/src/connection.rs
//! Connection manager: owns the single stream subscription of a session.
//!
//! `open` validates its inputs synchronously, then spawns a reader task that
//! performs the handshake and forwards every transport event into a bounded
//! channel. The session task is the only consumer of that channel, which
//! keeps state mutation single-writer without any re-entrancy guard.

use std::sync::Arc;

use futures_util::StreamExt;
use syncwatch_types::{Snapshot, SnapshotParseError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::MonitorConfig;
use crate::error::{ConnectError, MonitorError, TransportError};
use crate::transport::{StreamEvent, StreamRequest, Transport};

/// Log line appended once the handshake succeeds.
pub const CONNECTED_LINE: &str = "Connected to sync progress stream";

/// Log line appended for every payload that fails to decode.
pub const PARSE_ERROR_LINE: &str = "Error parsing progress data";

/// What the reader task forwards to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Handshake completed.
    Opened,
    Message(StreamEvent),
    /// Handshake or stream failure. Nothing follows it.
    Failed(TransportError),
    /// The server closed the stream. Nothing follows it.
    Ended,
}

/// How the session should react to one transport event.
#[derive(Debug)]
pub enum Dispatch {
    Opened,
    Snapshot(Box<Snapshot>),
    /// Recoverable: log and keep listening.
    Malformed(SnapshotParseError),
    /// Named event with no snapshot payload.
    Skipped { event: String },
    Failed(MonitorError),
    Ended,
}

/// Decode one transport event.
pub fn dispatch(event: TransportEvent) -> Dispatch {
    match event {
        TransportEvent::Opened => Dispatch::Opened,
        TransportEvent::Message(ev) if !ev.is_message() => Dispatch::Skipped { event: ev.event },
        TransportEvent::Message(ev) => match Snapshot::from_json(&ev.data) {
            Ok(snapshot) => Dispatch::Snapshot(Box::new(snapshot)),
            Err(err) => Dispatch::Malformed(err),
        },
        TransportEvent::Failed(err) => {
            tracing::warn!(error = %err, auth = err.is_auth(), "sync progress stream failed");
            Dispatch::Failed(MonitorError::from(&err))
        }
        TransportEvent::Ended => Dispatch::Ended,
    }
}

/// Builds subscriptions against one transport.
#[derive(Clone)]
pub struct ConnectionManager {
    transport: Arc<dyn Transport>,
    config: MonitorConfig,
}

impl ConnectionManager {
    pub fn new(transport: Arc<dyn Transport>, config: MonitorConfig) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Start subscribing to `job_id`'s progress stream.
    ///
    /// Fails without any network attempt when `token` is blank. Otherwise
    /// returns immediately; the handshake outcome arrives on the
    /// subscription as [`TransportEvent::Opened`] or
    /// [`TransportEvent::Failed`]. Must be called inside a tokio runtime.
    pub fn open(&self, job_id: &str, token: &str) -> Result<Subscription, ConnectError> {
        if job_id.trim().is_empty() {
            return Err(ConnectError::BlankJobId);
        }
        if token.trim().is_empty() {
            tracing::warn!(job_id, "no auth token available, not connecting");
            return Err(ConnectError::MissingAuth);
        }

        let request = StreamRequest {
            job_id: job_id.to_string(),
            target: self.config.stream_target(job_id),
            url: self.config.stream_url(job_id, token),
            connect_timeout: self.config.connect_timeout,
        };
        tracing::info!(
            job_id,
            endpoint = %request.target,
            token_len = token.len(),
            transport = self.transport.name(),
            "connecting to sync progress stream"
        );

        let (tx, rx) = mpsc::channel(self.config.channel_capacity.max(1));
        let reader = tokio::spawn(read_stream(Arc::clone(&self.transport), request, tx));
        Ok(Subscription {
            rx,
            reader,
            closed: false,
            ended: false,
        })
    }
}

async fn read_stream(
    transport: Arc<dyn Transport>,
    request: StreamRequest,
    tx: mpsc::Sender<TransportEvent>,
) {
    let timeout = request.connect_timeout;
    let mut stream = match tokio::time::timeout(timeout, transport.connect(request)).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(err)) => {
            let _ = tx.send(TransportEvent::Failed(err)).await;
            return;
        }
        Err(_) => {
            let _ = tx
                .send(TransportEvent::Failed(TransportError::Timeout(timeout)))
                .await;
            return;
        }
    };

    if tx.send(TransportEvent::Opened).await.is_err() {
        return;
    }

    while let Some(item) = stream.next().await {
        let (event, last) = match item {
            Ok(ev) => (TransportEvent::Message(ev), false),
            Err(err) => (TransportEvent::Failed(err), true),
        };
        // Receiver gone means the subscription was closed.
        if tx.send(event).await.is_err() || last {
            return;
        }
    }
    let _ = tx.send(TransportEvent::Ended).await;
}

/// Exactly one active stream subscription.
///
/// Closing aborts the reader task and drops every event still queued, so
/// nothing is dispatched after [`close`](Self::close). Dropping closes too.
pub struct Subscription {
    rx: mpsc::Receiver<TransportEvent>,
    reader: JoinHandle<()>,
    closed: bool,
    ended: bool,
}

impl Subscription {
    /// Next event, or `None` once closed or after the final event.
    pub async fn recv(&mut self) -> Option<TransportEvent> {
        if !self.is_receiving() {
            return None;
        }
        let event = self.rx.recv().await;
        if matches!(
            event,
            None | Some(TransportEvent::Failed(_)) | Some(TransportEvent::Ended)
        ) {
            self.ended = true;
        }
        event
    }

    /// Still expecting events from the transport.
    pub fn is_receiving(&self) -> bool {
        !self.closed && !self.ended
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Tear down the subscription. Idempotent; returns `true` only for the
    /// call that actually closed it.
    pub fn close(&mut self) -> bool {
        if self.closed {
            return false;
        }
        self.closed = true;
        self.reader.abort();
        self.rx.close();
        while self.rx.try_recv().is_ok() {}
        true
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.reader.abort();
    }
}
