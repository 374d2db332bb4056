// crates/types/src/snapshot.rs
//! Sync job snapshots pushed by the server over the progress stream.
//!
//! Field names follow the snake_case wire schema. The aliases accept the
//! names used by the email backend's `SyncProgress` model (`total_emails`,
//! `is_completed`, ...) so both producers decode into the same type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SnapshotParseError;

/// Coarse phase of a sync job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Connecting,
    Authenticating,
    Fetching,
    Processing,
    Completed,
    Failed,
}

impl SyncStatus {
    /// `completed` or `failed`: the job will not change any further.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// The job is still doing work.
    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Authenticating => "authenticating",
            Self::Fetching => "fetching",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One server-pushed description of job state. Never mutated after decoding;
/// every update replaces the previous snapshot wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(alias = "account_id")]
    pub job_id: String,
    pub status: SyncStatus,
    #[serde(alias = "total_emails")]
    pub total_units: u64,
    #[serde(alias = "processed_emails")]
    pub processed_units: u64,
    #[serde(alias = "successful_emails")]
    pub successful_units: u64,
    #[serde(alias = "failed_emails")]
    pub failed_units: u64,
    /// Label of the item in flight (e.g. an email subject).
    #[serde(
        default,
        alias = "current_email_subject",
        skip_serializing_if = "Option::is_none"
    )]
    pub current_item_label: Option<String>,
    /// Human-readable phase description, mirrored into the activity log.
    pub current_operation: String,
    #[serde(alias = "time_elapsed")]
    pub elapsed_seconds: u64,
    /// Signed: the server sends negative values once processed overtakes total.
    #[serde(
        default,
        alias = "estimated_time_remaining",
        skip_serializing_if = "Option::is_none"
    )]
    pub remaining_seconds_estimate: Option<i64>,
    /// Only meaningful when `status` is `failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(alias = "is_completed")]
    pub is_terminal: bool,
    #[serde(alias = "last_updated")]
    pub last_updated_at: DateTime<Utc>,
    #[serde(alias = "start_time")]
    pub started_at: DateTime<Utc>,
    #[serde(default, alias = "end_time", skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
}

impl Snapshot {
    /// Decode one stream payload.
    ///
    /// Missing required fields, negative counters and unknown status strings
    /// are rejected just like malformed JSON.
    pub fn from_json(data: &str) -> Result<Self, SnapshotParseError> {
        if data.trim().is_empty() {
            return Err(SnapshotParseError::Empty);
        }
        Ok(serde_json::from_str(data)?)
    }

    /// `processed == successful + failed`. The server only promises this
    /// eventually, so callers must not rely on it.
    pub fn is_consistent(&self) -> bool {
        self.successful_units
            .checked_add(self.failed_units)
            .is_some_and(|sum| sum == self.processed_units)
    }

    /// Terminal flag and status agree (`is_terminal` only with
    /// `completed`/`failed`).
    pub fn terminal_flag_matches_status(&self) -> bool {
        !self.is_terminal || self.status.is_terminal()
    }

    /// Remaining-time estimate, only when the server provided a positive one.
    pub fn remaining_estimate(&self) -> Option<u64> {
        self.remaining_seconds_estimate
            .and_then(|secs| u64::try_from(secs).ok())
            .filter(|secs| *secs > 0)
    }
}
