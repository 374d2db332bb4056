// crates/core/src/error.rs
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Errors returned synchronously by [`ConnectionManager::open`](crate::ConnectionManager::open).
/// Nothing touches the network when one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    #[error("Authentication token not found")]
    MissingAuth,

    #[error("Job id must not be blank")]
    BlankJobId,
}

/// Failures reported by the streaming transport itself, as opposed to a job
/// failure carried inside a well-formed snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Stream rejected the credentials (HTTP {status})")]
    Unauthorized { status: u16 },

    #[error("Stream request failed with HTTP {status}")]
    Http { status: u16 },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Expected an event stream, server sent {content_type:?}")]
    UnexpectedContentType { content_type: String },

    #[error("Timed out after {0:?} waiting for the stream handshake")]
    Timeout(Duration),

    #[error("Stream ended before the job reached a terminal state")]
    StreamEnded,
}

impl TransportError {
    /// The server refused the token at the transport level.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }
}

/// Connection-level error surfaced to the host on
/// [`MonitorState::error`](crate::MonitorState::error). `Display` renders the
/// banner text shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MonitorError {
    #[error("Authentication token not found")]
    MissingAuth,

    #[error("Authentication failed. Please refresh and try again.")]
    AuthRejected,

    #[error("Connection to sync progress failed")]
    Connection { detail: String },
}

impl MonitorError {
    /// User-facing message for the error banner.
    pub fn message(&self) -> String {
        self.to_string()
    }
}

impl From<&TransportError> for MonitorError {
    fn from(err: &TransportError) -> Self {
        if err.is_auth() {
            Self::AuthRejected
        } else {
            Self::Connection {
                detail: err.to_string(),
            }
        }
    }
}
