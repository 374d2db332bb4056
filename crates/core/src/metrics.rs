// crates/core/src/metrics.rs
//! Derived progress metrics computed on read from the current snapshot.
//!
//! Everything here is pure: no clock, no state, no I/O.

use serde::Serialize;
use syncwatch_types::{Snapshot, SyncStatus};

/// Percentage of processed units.
///
/// Formula: round_half_up(100 * processed_units / total_units), clamped to [0, 100]
///
/// Returns 0 when `total_units` is 0, whatever `processed_units` says.
pub fn percent_complete(snapshot: &Snapshot) -> u8 {
    percent(snapshot.processed_units, snapshot.total_units)
}

/// Integer form of [`percent_complete`] over raw counters.
pub fn percent(processed: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    // (200p + t) / 2t == floor(100p/t + 0.5); u128 keeps 200p from overflowing.
    let processed = u128::from(processed);
    let total = u128::from(total);
    let rounded = (200 * processed + total) / (2 * total);
    rounded.min(100) as u8
}

/// Render a second count as `"{n}s"` below a minute, `"{m}m {s}s"` otherwise.
pub fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        return format!("{seconds}s");
    }
    format!("{}m {}s", seconds / 60, seconds % 60)
}

/// Color scheme for a status badge / progress bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusColor {
    Blue,
    Yellow,
    Green,
    Red,
}

impl StatusColor {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Blue => "blue",
            Self::Yellow => "yellow",
            Self::Green => "green",
            Self::Red => "red",
        }
    }
}

pub fn status_color_class(status: SyncStatus) -> StatusColor {
    match status {
        SyncStatus::Connecting | SyncStatus::Authenticating | SyncStatus::Fetching => {
            StatusColor::Blue
        }
        SyncStatus::Processing => StatusColor::Yellow,
        SyncStatus::Completed => StatusColor::Green,
        SyncStatus::Failed => StatusColor::Red,
    }
}

/// Icon shown beside the status badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusIcon {
    Spinner,
    Check,
    Cross,
}

pub fn status_icon(status: SyncStatus) -> StatusIcon {
    match status {
        SyncStatus::Completed => StatusIcon::Check,
        SyncStatus::Failed => StatusIcon::Cross,
        _ => StatusIcon::Spinner,
    }
}

/// Display-ready projection of one snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressView {
    pub status: SyncStatus,
    pub percent: u8,
    /// Only draw a bar when the server knows the total.
    pub show_bar: bool,
    pub processed: u64,
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    pub elapsed: String,
    /// `None` when the server sent no estimate or an estimate of zero.
    pub remaining: Option<String>,
    pub color: StatusColor,
    pub icon: StatusIcon,
    pub operation: String,
    pub current_item: Option<String>,
    pub error_message: Option<String>,
}

impl ProgressView {
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        Self {
            status: snapshot.status,
            percent: percent_complete(snapshot),
            show_bar: snapshot.total_units > 0,
            processed: snapshot.processed_units,
            total: snapshot.total_units,
            successful: snapshot.successful_units,
            failed: snapshot.failed_units,
            elapsed: format_duration(snapshot.elapsed_seconds),
            remaining: snapshot.remaining_estimate().map(format_duration),
            color: status_color_class(snapshot.status),
            icon: status_icon(snapshot.status),
            operation: snapshot.current_operation.clone(),
            current_item: snapshot.current_item_label.clone(),
            error_message: snapshot.error_message.clone(),
        }
    }
}
