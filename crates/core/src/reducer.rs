// crates/core/src/reducer.rs
//! Merges decoded snapshots into [`MonitorState`].

use syncwatch_types::{Snapshot, SyncStatus};

use crate::state::MonitorState;

/// Log line used when a failed snapshot carries no message.
pub const UNKNOWN_ERROR: &str = "Unknown error";

/// What applying one snapshot did to the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    /// `current` replaced; the job is still running.
    Applied,
    /// `current` replaced with the first terminal snapshot of the session.
    Terminal { status: SyncStatus },
    /// A terminal snapshot was already accepted; nothing changed.
    Dropped,
}

/// Apply `snapshot` to `state`, calling `notify` after each individual
/// mutation (snapshot replacement, each log append) in the order they happen.
///
/// The terminal condition is absorbing: once a terminal snapshot has been
/// accepted, later snapshots are dropped without touching the state.
pub fn apply_snapshot(
    state: &mut MonitorState,
    snapshot: Snapshot,
    mut notify: impl FnMut(&MonitorState),
) -> Reduction {
    if state.is_terminal() {
        tracing::debug!(
            job_id = %snapshot.job_id,
            status = %snapshot.status,
            "dropping snapshot received after terminal state"
        );
        return Reduction::Dropped;
    }

    if !snapshot.terminal_flag_matches_status() {
        tracing::warn!(
            job_id = %snapshot.job_id,
            status = %snapshot.status,
            "terminal snapshot with non-terminal status; treating as terminal"
        );
    }
    if !snapshot.is_consistent() {
        tracing::debug!(
            processed = snapshot.processed_units,
            successful = snapshot.successful_units,
            failed = snapshot.failed_units,
            "snapshot counters disagree"
        );
    }

    let terminal = snapshot.is_terminal;
    let status = snapshot.status;
    let operation = snapshot.current_operation.clone();
    let summary = terminal.then(|| terminal_summary(&snapshot)).flatten();

    state.current = Some(snapshot);
    notify(state);

    if !operation.is_empty() {
        state.log.append(&operation);
        notify(state);
    }

    if !terminal {
        return Reduction::Applied;
    }

    if let Some(line) = summary {
        state.log.append(line);
        notify(state);
    }
    Reduction::Terminal { status }
}

fn terminal_summary(snapshot: &Snapshot) -> Option<String> {
    match snapshot.status {
        SyncStatus::Completed => Some(format!(
            "Sync completed! {} emails synced successfully",
            snapshot.successful_units
        )),
        SyncStatus::Failed => Some(format!(
            "Sync failed: {}",
            snapshot.error_message.as_deref().unwrap_or(UNKNOWN_ERROR)
        )),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_log::entry_message;
    use crate::state::{ConnectionPhase, MonitorPhase};
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn snapshot(status: SyncStatus, processed: u64, operation: &str) -> Snapshot {
        let at = Utc.with_ymd_and_hms(2026, 2, 5, 12, 0, 0).unwrap();
        Snapshot {
            job_id: "acc-1".into(),
            status,
            total_units: 100,
            processed_units: processed,
            successful_units: processed,
            failed_units: 0,
            current_item_label: None,
            current_operation: operation.into(),
            elapsed_seconds: 1,
            remaining_seconds_estimate: None,
            error_message: None,
            is_terminal: status.is_terminal(),
            last_updated_at: at,
            started_at: at,
            ended_at: None,
        }
    }

    fn open_state() -> MonitorState {
        let mut state = MonitorState::new();
        state.begin("acc-1");
        state.connection_phase = ConnectionPhase::Open;
        state
    }

    fn messages(state: &MonitorState) -> Vec<String> {
        state.log.iter().map(|e| entry_message(e).to_string()).collect()
    }

    #[test]
    fn replaces_current_and_logs_operation() {
        let mut state = open_state();
        let mut notifications = 0;
        let outcome = apply_snapshot(
            &mut state,
            snapshot(SyncStatus::Fetching, 0, "Fetching folders"),
            |_| notifications += 1,
        );
        assert_eq!(outcome, Reduction::Applied);
        assert_eq!(notifications, 2);
        assert_eq!(state.current.as_ref().unwrap().status, SyncStatus::Fetching);
        assert_eq!(messages(&state), vec!["Fetching folders"]);
    }

    #[test]
    fn empty_operation_is_not_logged() {
        let mut state = open_state();
        let mut notifications = 0;
        apply_snapshot(
            &mut state,
            snapshot(SyncStatus::Processing, 10, ""),
            |_| notifications += 1,
        );
        assert_eq!(notifications, 1);
        assert!(state.log.is_empty());
    }

    #[test]
    fn completed_terminal_logs_summary() {
        let mut state = open_state();
        let mut snap = snapshot(SyncStatus::Completed, 100, "Sync completed");
        snap.successful_units = 97;
        let outcome = apply_snapshot(&mut state, snap, |_| {});
        assert_eq!(
            outcome,
            Reduction::Terminal {
                status: SyncStatus::Completed
            }
        );
        assert_eq!(
            messages(&state),
            vec!["Sync completed", "Sync completed! 97 emails synced successfully"]
        );
        assert_eq!(state.phase(), MonitorPhase::Completed);
    }

    #[test]
    fn failed_terminal_logs_error_or_placeholder() {
        let mut state = open_state();
        let mut snap = snapshot(SyncStatus::Failed, 3, "");
        snap.error_message = Some("IMAP login rejected".into());
        apply_snapshot(&mut state, snap, |_| {});
        assert_eq!(messages(&state), vec!["Sync failed: IMAP login rejected"]);

        let mut state = open_state();
        apply_snapshot(&mut state, snapshot(SyncStatus::Failed, 3, ""), |_| {});
        assert_eq!(messages(&state), vec!["Sync failed: Unknown error"]);
    }

    #[test]
    fn terminal_state_is_absorbing() {
        let mut state = open_state();
        apply_snapshot(&mut state, snapshot(SyncStatus::Completed, 100, ""), |_| {});
        let log_len = state.log.len();

        let mut notified = false;
        let outcome = apply_snapshot(
            &mut state,
            snapshot(SyncStatus::Processing, 40, "Processing INBOX"),
            |_| notified = true,
        );
        assert_eq!(outcome, Reduction::Dropped);
        assert!(!notified);
        assert_eq!(state.log.len(), log_len);
        assert_eq!(state.current.as_ref().unwrap().status, SyncStatus::Completed);

        let second_terminal = apply_snapshot(&mut state, snapshot(SyncStatus::Failed, 100, ""), |_| {});
        assert_eq!(second_terminal, Reduction::Dropped);
    }

    #[test]
    fn terminal_flag_with_active_status_is_still_terminal() {
        let mut state = open_state();
        let mut snap = snapshot(SyncStatus::Processing, 50, "Stopping");
        snap.is_terminal = true;
        let outcome = apply_snapshot(&mut state, snap, |_| {});
        assert_eq!(
            outcome,
            Reduction::Terminal {
                status: SyncStatus::Processing
            }
        );
        assert_eq!(messages(&state), vec!["Stopping"]);
    }

    #[test]
    fn inconsistent_counters_do_not_panic() {
        let mut state = open_state();
        let mut snap = snapshot(SyncStatus::Processing, 10, "");
        snap.successful_units = 40;
        snap.failed_units = 3;
        assert_eq!(apply_snapshot(&mut state, snap, |_| {}), Reduction::Applied);
    }

    #[test]
    fn no_ordering_check_before_terminal() {
        let mut state = open_state();
        apply_snapshot(&mut state, snapshot(SyncStatus::Processing, 50, ""), |_| {});
        apply_snapshot(&mut state, snapshot(SyncStatus::Processing, 20, ""), |_| {});
        assert_eq!(state.current.as_ref().unwrap().processed_units, 20);
    }
}
