// crates/core/src/transport/memory.rs
//! In-process transport: every `connect` hands a [`MemoryConnection`] to the
//! paired [`MemoryServer`], which pushes events into it.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::{EventStream, StreamEvent, StreamRequest, Transport};
use crate::error::TransportError;

type EventTx = mpsc::UnboundedSender<Result<StreamEvent, TransportError>>;

/// Channel-backed [`Transport`].
#[derive(Clone)]
pub struct MemoryTransport {
    accepted: mpsc::UnboundedSender<MemoryConnection>,
    rejections: Arc<Mutex<VecDeque<TransportError>>>,
}

/// Server side of a [`MemoryTransport`].
pub struct MemoryServer {
    incoming: mpsc::UnboundedReceiver<MemoryConnection>,
}

/// One established subscription as seen by the server.
pub struct MemoryConnection {
    pub request: StreamRequest,
    events: EventTx,
}

impl MemoryTransport {
    pub fn pair() -> (Self, MemoryServer) {
        let (accepted, incoming) = mpsc::unbounded_channel();
        (
            Self {
                accepted,
                rejections: Arc::new(Mutex::new(VecDeque::new())),
            },
            MemoryServer { incoming },
        )
    }

    /// Fail the next handshake with `err` instead of accepting it.
    pub fn reject_next(&self, err: TransportError) {
        match self.rejections.lock() {
            Ok(mut queue) => queue.push_back(err),
            Err(e) => tracing::error!("Mutex poisoned queueing rejection: {e}"),
        }
    }

    fn take_rejection(&self) -> Option<TransportError> {
        match self.rejections.lock() {
            Ok(mut queue) => queue.pop_front(),
            Err(e) => {
                tracing::error!("Mutex poisoned reading rejections: {e}");
                None
            }
        }
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn connect(&self, request: StreamRequest) -> Result<EventStream, TransportError> {
        if let Some(err) = self.take_rejection() {
            return Err(err);
        }
        let (events, rx) = mpsc::unbounded_channel();
        self.accepted
            .send(MemoryConnection { request, events })
            .map_err(|_| TransportError::Network("memory server dropped".into()))?;
        Ok(UnboundedReceiverStream::new(rx).boxed())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

impl MemoryServer {
    /// Wait for the next subscription.
    pub async fn accept(&mut self) -> Option<MemoryConnection> {
        self.incoming.recv().await
    }

    pub fn try_accept(&mut self) -> Option<MemoryConnection> {
        self.incoming.try_recv().ok()
    }
}

impl MemoryConnection {
    /// Push an unnamed event. Returns `false` once the client hung up.
    pub fn send_data(&self, data: impl Into<String>) -> bool {
        self.send(StreamEvent::message(data))
    }

    pub fn send(&self, event: StreamEvent) -> bool {
        self.events.send(Ok(event)).is_ok()
    }

    /// Report a transport failure on the open stream.
    pub fn fail(&self, err: TransportError) -> bool {
        self.events.send(Err(err)).is_ok()
    }

    /// Close the stream from the server side.
    pub fn finish(self) {}

    /// The client dropped its end (closed or torn down).
    pub fn is_closed(&self) -> bool {
        self.events.is_closed()
    }

    /// Resolves once the client drops its end.
    pub async fn closed(&self) {
        self.events.closed().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn request() -> StreamRequest {
        StreamRequest {
            job_id: "acc-1".into(),
            target: "mem://acc-1".into(),
            url: "mem://acc-1?token=t".into(),
            connect_timeout: Duration::from_secs(1),
        }
    }

    #[tokio::test]
    async fn delivers_events_in_order() {
        let (transport, mut server) = MemoryTransport::pair();
        let mut stream = transport.connect(request()).await.unwrap();
        let conn = server.accept().await.unwrap();
        assert_eq!(conn.request.job_id, "acc-1");

        assert!(conn.send_data("one"));
        assert!(conn.send(StreamEvent::named("connected", "{}")));
        conn.finish();

        assert_eq!(stream.next().await.unwrap().unwrap().data, "one");
        assert_eq!(stream.next().await.unwrap().unwrap().event, "connected");
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn rejection_fails_handshake_once() {
        let (transport, mut server) = MemoryTransport::pair();
        transport.reject_next(TransportError::Unauthorized { status: 401 });

        let err = transport.connect(request()).await.err().unwrap();
        assert!(err.is_auth());
        assert!(server.try_accept().is_none());

        assert!(transport.connect(request()).await.is_ok());
        assert!(server.try_accept().is_some());
    }

    #[tokio::test]
    async fn dropping_stream_closes_connection() {
        let (transport, mut server) = MemoryTransport::pair();
        let stream = transport.connect(request()).await.unwrap();
        let conn = server.accept().await.unwrap();
        assert!(!conn.is_closed());
        drop(stream);
        assert!(conn.is_closed());
        assert!(!conn.send_data("late"));
    }
}
