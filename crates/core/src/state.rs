// crates/core/src/state.rs
//! Monitor state published to the host after every mutation.

use serde::Serialize;
use syncwatch_types::{Snapshot, SyncStatus};
use tokio::time::Instant;

use crate::error::MonitorError;
use crate::event_log::EventLog;
use crate::metrics::ProgressView;

/// State of the underlying stream subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionPhase {
    Idle,
    Connecting,
    Open,
    Closed,
    Errored,
}

/// Lifecycle as the host sees it:
/// `Idle → Connecting → Streaming → {Completed, Failed} → Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorPhase {
    Idle,
    Connecting,
    Streaming,
    Completed,
    Failed,
    Closed,
}


/// Everything the host needs to render a monitor. Hosts only ever receive
/// clones or shared references; the session task is the single writer.
#[derive(Debug, Clone, Serialize)]
pub struct MonitorState {
    pub job_id: Option<String>,
    pub current: Option<Snapshot>,
    pub connection_phase: ConnectionPhase,
    /// Connection-level error for the blocking banner. Job failures reported
    /// by the server stay on `current.error_message`.
    pub error: Option<MonitorError>,
    pub log: EventLog,
    #[serde(skip)]
    pub auto_close_deadline: Option<Instant>,
}

impl MonitorState {
    pub fn new() -> Self {
        Self {
            job_id: None,
            current: None,
            connection_phase: ConnectionPhase::Idle,
            error: None,
            log: EventLog::new(),
            auto_close_deadline: None,
        }
    }

    /// Reset for a new `open()`: previous snapshot, error and log are dropped.
    pub(crate) fn begin(&mut self, job_id: &str) {
        self.job_id = Some(job_id.to_string());
        self.current = None;
        self.connection_phase = ConnectionPhase::Connecting;
        self.error = None;
        self.log.clear();
        self.auto_close_deadline = None;
    }

    pub fn phase(&self) -> MonitorPhase {
        match self.connection_phase {
            ConnectionPhase::Idle => MonitorPhase::Idle,
            ConnectionPhase::Connecting => MonitorPhase::Connecting,
            ConnectionPhase::Errored => MonitorPhase::Failed,
            ConnectionPhase::Closed => MonitorPhase::Closed,
            ConnectionPhase::Open => match &self.current {
                Some(snap) if snap.is_terminal && snap.status == SyncStatus::Completed => {
                    MonitorPhase::Completed
                }
                Some(snap) if snap.is_terminal => MonitorPhase::Failed,
                _ => MonitorPhase::Streaming,
            },
        }
    }

    /// A terminal snapshot has been accepted in this session.
    pub fn is_terminal(&self) -> bool {
        self.current.as_ref().is_some_and(|snap| snap.is_terminal)
    }

    pub fn progress(&self) -> Option<ProgressView> {
        self.current.as_ref().map(ProgressView::from_snapshot)
    }

    /// Whether the host may offer a close/cancel action: not while the
    /// handshake is pending, and not while the job is mid-flight on a healthy
    /// stream.
    pub fn is_dismissible(&self) -> bool {
        match self.connection_phase {
            ConnectionPhase::Connecting => false,
            ConnectionPhase::Open => self
                .current
                .as_ref()
                .is_none_or(|snap| snap.is_terminal || snap.status.is_terminal()),
            ConnectionPhase::Idle | ConnectionPhase::Closed | ConnectionPhase::Errored => true,
        }
    }
}

impl Default for MonitorState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn snapshot(status: SyncStatus, is_terminal: bool) -> Snapshot {
        let at = Utc.with_ymd_and_hms(2026, 2, 5, 12, 0, 0).unwrap();
        Snapshot {
            job_id: "acc-1".into(),
            status,
            total_units: 10,
            processed_units: 5,
            successful_units: 5,
            failed_units: 0,
            current_item_label: None,
            current_operation: String::new(),
            elapsed_seconds: 3,
            remaining_seconds_estimate: None,
            error_message: None,
            is_terminal,
            last_updated_at: at,
            started_at: at,
            ended_at: None,
        }
    }

    #[test]
    fn phase_follows_connection_and_snapshot() {
        let mut state = MonitorState::new();
        assert_eq!(state.phase(), MonitorPhase::Idle);

        state.begin("acc-1");
        assert_eq!(state.phase(), MonitorPhase::Connecting);

        state.connection_phase = ConnectionPhase::Open;
        assert_eq!(state.phase(), MonitorPhase::Streaming);

        state.current = Some(snapshot(SyncStatus::Processing, false));
        assert_eq!(state.phase(), MonitorPhase::Streaming);

        state.current = Some(snapshot(SyncStatus::Completed, true));
        assert_eq!(state.phase(), MonitorPhase::Completed);

        state.current = Some(snapshot(SyncStatus::Failed, true));
        assert_eq!(state.phase(), MonitorPhase::Failed);

        state.connection_phase = ConnectionPhase::Closed;
        assert_eq!(state.phase(), MonitorPhase::Closed);

        state.connection_phase = ConnectionPhase::Errored;
        assert_eq!(state.phase(), MonitorPhase::Failed);
    }

    #[test]
    fn begin_resets_session_data() {
        let mut state = MonitorState::new();
        state.begin("acc-1");
        state.log.append("hello");
        state.current = Some(snapshot(SyncStatus::Fetching, false));
        state.error = Some(MonitorError::AuthRejected);

        state.begin("acc-2");
        assert_eq!(state.job_id.as_deref(), Some("acc-2"));
        assert!(state.log.is_empty());
        assert!(state.current.is_none());
        assert!(state.error.is_none());
    }

    #[test]
    fn dismissible_only_when_not_mid_flight() {
        let mut state = MonitorState::new();
        state.begin("acc-1");
        assert!(!state.is_dismissible());

        state.connection_phase = ConnectionPhase::Open;
        assert!(state.is_dismissible());

        state.current = Some(snapshot(SyncStatus::Processing, false));
        assert!(!state.is_dismissible());

        state.current = Some(snapshot(SyncStatus::Completed, true));
        assert!(state.is_dismissible());

        state.current = Some(snapshot(SyncStatus::Processing, false));
        state.connection_phase = ConnectionPhase::Errored;
        assert!(state.is_dismissible());
    }
}
