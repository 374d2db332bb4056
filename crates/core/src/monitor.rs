// crates/core/src/monitor.rs
//! Progress monitor: the only component a host talks to.
//!
//! Each `open()` starts a session task that owns the [`MonitorState`] and is
//! its single writer. The task `select!`s (biased, in this order) over the
//! session's cancellation token, the auto-close deadline and the
//! subscription channel. After every mutation it stores a copy in the shared
//! cell and invokes the subscribers synchronously, in mutation order.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use syncwatch_types::SyncStatus;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::completion::CompletionController;
use crate::config::MonitorConfig;
use crate::connection::{
    dispatch, ConnectionManager, Dispatch, Subscription, CONNECTED_LINE, PARSE_ERROR_LINE,
};
use crate::error::{ConnectError, MonitorError, TransportError};
use crate::metrics::percent_complete;
use crate::reducer::{apply_snapshot, Reduction};
use crate::state::{ConnectionPhase, MonitorState};
use crate::transport::Transport;

/// Callback receiving the state after every mutation.
pub type StateCallback = Arc<dyn Fn(&MonitorState) + Send + Sync>;

/// Callback fired once per session when the job completes successfully.
pub type CompletionCallback = Arc<dyn Fn() + Send + Sync>;

/// Handle returned by [`ProgressMonitor::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

struct Shared {
    state: RwLock<MonitorState>,
    subscribers: RwLock<Vec<(SubscriberId, StateCallback)>>,
    on_completed: RwLock<Vec<CompletionCallback>>,
    next_subscriber: AtomicU64,
    /// `true` while no session task is running.
    finished: watch::Sender<bool>,
}

impl Shared {
    fn new() -> Self {
        let (finished, _) = watch::channel(true);
        Self {
            state: RwLock::new(MonitorState::new()),
            subscribers: RwLock::new(Vec::new()),
            on_completed: RwLock::new(Vec::new()),
            next_subscriber: AtomicU64::new(1),
            finished,
        }
    }

    /// Store `state` as the latest and deliver it to every subscriber.
    fn publish(&self, state: &MonitorState) {
        match self.state.write() {
            Ok(mut guard) => *guard = state.clone(),
            Err(e) => tracing::error!("RwLock poisoned writing monitor state: {e}"),
        }
        // Clone the list so callbacks may (un)subscribe without deadlocking.
        let subscribers: Vec<StateCallback> = match self.subscribers.read() {
            Ok(subs) => subs.iter().map(|(_, cb)| Arc::clone(cb)).collect(),
            Err(e) => {
                tracing::error!("RwLock poisoned reading subscribers: {e}");
                return;
            }
        };
        for callback in subscribers {
            callback(state);
        }
    }

    fn notify_completed(&self) {
        let callbacks: Vec<CompletionCallback> = match self.on_completed.read() {
            Ok(cbs) => cbs.clone(),
            Err(e) => {
                tracing::error!("RwLock poisoned reading completion callbacks: {e}");
                return;
            }
        };
        for callback in callbacks {
            callback();
        }
    }

    fn snapshot(&self) -> MonitorState {
        match self.state.read() {
            Ok(guard) => guard.clone(),
            Err(e) => {
                tracing::error!("RwLock poisoned reading monitor state: {e}");
                MonitorState::new()
            }
        }
    }
}

struct SessionHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Monitors one sync job at a time over a streaming subscription.
///
/// ```no_run
/// # use std::sync::Arc;
/// # use syncwatch_core::{MemoryTransport, MonitorConfig, ProgressMonitor};
/// # async fn demo() {
/// let (transport, _server) = MemoryTransport::pair();
/// let mut monitor = ProgressMonitor::new(Arc::new(transport), MonitorConfig::default());
/// monitor.subscribe(|state| println!("{:?}", state.phase()));
/// monitor.open("account-id", "token").await;
/// monitor.wait_until_finished().await;
/// # }
/// ```
pub struct ProgressMonitor {
    connections: ConnectionManager,
    shared: Arc<Shared>,
    session: Option<SessionHandle>,
}

impl ProgressMonitor {
    pub fn new(transport: Arc<dyn Transport>, config: MonitorConfig) -> Self {
        Self {
            connections: ConnectionManager::new(transport, config),
            shared: Arc::new(Shared::new()),
            session: None,
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        self.connections.config()
    }

    /// Start monitoring `job_id`.
    ///
    /// A running session is fully closed first and the activity log reset;
    /// switching jobs never merges state. A blank job id is ignored. A blank
    /// token surfaces as [`MonitorError::MissingAuth`] on the state without
    /// any connection attempt.
    pub async fn open(&mut self, job_id: &str, token: &str) {
        if job_id.trim().is_empty() {
            warn!("ignoring open() with a blank job id");
            return;
        }
        self.close().await;

        let mut state = self.shared.snapshot();
        state.begin(job_id);

        let subscription = match self.connections.open(job_id, token) {
            Ok(subscription) => subscription,
            Err(ConnectError::MissingAuth) => {
                state.connection_phase = ConnectionPhase::Errored;
                state.error = Some(MonitorError::MissingAuth);
                self.shared.publish(&state);
                return;
            }
            Err(err @ ConnectError::BlankJobId) => {
                warn!(error = %err, "not opening sync progress stream");
                return;
            }
        };

        self.shared.publish(&state);
        self.shared.finished.send_replace(false);

        let cancel = CancellationToken::new();
        let session = Session {
            state,
            shared: Arc::clone(&self.shared),
            subscription,
            completion: CompletionController::new(self.config().auto_close_delay),
            cancel: cancel.clone(),
            completed_notified: false,
        };
        let task = tokio::spawn(session.run());
        self.session = Some(SessionHandle { cancel, task });
    }

    /// Close the subscription and cancel any pending auto-close. Idempotent;
    /// returns once the session task has torn down.
    pub async fn close(&mut self) {
        let Some(handle) = self.session.take() else {
            return;
        };
        handle.cancel.cancel();
        if let Err(e) = handle.task.await {
            if e.is_panic() {
                tracing::error!("sync monitor session panicked: {e}");
            }
            self.shared.finished.send_replace(true);
        }
    }

    /// Register `callback` to receive the state after every mutation.
    pub fn subscribe(&self, callback: impl Fn(&MonitorState) + Send + Sync + 'static) -> SubscriberId {
        let id = SubscriberId(self.shared.next_subscriber.fetch_add(1, Ordering::Relaxed));
        match self.shared.subscribers.write() {
            Ok(mut subs) => subs.push((id, Arc::new(callback))),
            Err(e) => tracing::error!("RwLock poisoned writing subscribers: {e}"),
        }
        id
    }

    /// Returns `true` if `id` was registered.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        match self.shared.subscribers.write() {
            Ok(mut subs) => {
                let before = subs.len();
                subs.retain(|(sid, _)| *sid != id);
                subs.len() != before
            }
            Err(e) => {
                tracing::error!("RwLock poisoned writing subscribers: {e}");
                false
            }
        }
    }

    /// Register `callback` to run once per session when the job completes.
    pub fn on_completed(&self, callback: impl Fn() + Send + Sync + 'static) {
        match self.shared.on_completed.write() {
            Ok(mut cbs) => cbs.push(Arc::new(callback)),
            Err(e) => tracing::error!("RwLock poisoned writing completion callbacks: {e}"),
        }
    }

    /// Copy of the latest published state.
    pub fn state(&self) -> MonitorState {
        self.shared.snapshot()
    }

    /// Resolves once no session task is running: closed, errored or
    /// auto-closed. Resolves immediately before the first `open()`.
    pub fn wait_until_finished(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.shared.finished.subscribe();
        async move {
            // Sender dropped means the monitor is gone.
            let _ = rx.wait_for(|finished| *finished).await;
        }
    }
}

impl Drop for ProgressMonitor {
    fn drop(&mut self) {
        if let Some(handle) = self.session.take() {
            handle.cancel.cancel();
        }
    }
}

/// Why a session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Teardown {
    Host,
    AutoClose,
}

struct Session {
    state: MonitorState,
    shared: Arc<Shared>,
    subscription: Subscription,
    completion: CompletionController,
    cancel: CancellationToken,
    completed_notified: bool,
}

impl Session {
    async fn run(mut self) {
        loop {
            let deadline = self.completion.deadline();
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    self.shut_down(Teardown::Host);
                    break;
                }
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.completion.fire();
                    self.shut_down(Teardown::AutoClose);
                    break;
                }
                event = self.subscription.recv(), if self.subscription.is_receiving() => {
                    // close() may have raced this delivery; the message is dropped.
                    if self.cancel.is_cancelled() {
                        continue;
                    }
                    let Some(event) = event else {
                        if self.on_stream_end() {
                            break;
                        }
                        continue;
                    };
                    if self.handle(dispatch(event)) {
                        break;
                    }
                }
            }
        }
        self.shared.finished.send_replace(true);
    }

    fn publish(&self) {
        self.shared.publish(&self.state);
    }

    /// Returns `true` when the session is over.
    fn handle(&mut self, dispatch: Dispatch) -> bool {
        match dispatch {
            Dispatch::Opened => {
                info!(job_id = ?self.state.job_id, "sync progress stream open");
                self.state.connection_phase = ConnectionPhase::Open;
                self.state.error = None;
                self.publish();
                self.state.log.append(CONNECTED_LINE);
                self.publish();
                false
            }
            Dispatch::Snapshot(snapshot) => {
                self.on_snapshot(*snapshot);
                false
            }
            Dispatch::Malformed(err) => {
                warn!(error = %err, "failed to parse sync progress data");
                self.state.log.append(PARSE_ERROR_LINE);
                self.publish();
                false
            }
            Dispatch::Skipped { event } => {
                debug!(event = %event, "ignoring named stream event");
                false
            }
            Dispatch::Failed(err) => {
                self.fail(err);
                true
            }
            Dispatch::Ended => self.on_stream_end(),
        }
    }

    fn on_snapshot(&mut self, snapshot: syncwatch_types::Snapshot) {
        debug!(
            job_id = %snapshot.job_id,
            status = %snapshot.status,
            percent = percent_complete(&snapshot),
            "sync progress update"
        );
        let shared = Arc::clone(&self.shared);
        let reduction = apply_snapshot(&mut self.state, snapshot, |state| shared.publish(state));

        let Reduction::Terminal { status } = reduction else {
            return;
        };
        if let Some(deadline) = self.completion.arm(Instant::now()) {
            info!(
                status = %status,
                delay_ms = self.completion_delay_ms(deadline),
                "sync finished, auto-closing stream after grace period"
            );
            self.state.auto_close_deadline = Some(deadline);
            self.publish();
        }
        if status == SyncStatus::Completed && !self.completed_notified {
            self.completed_notified = true;
            self.shared.notify_completed();
        }
    }

    fn completion_delay_ms(&self, deadline: Instant) -> u128 {
        deadline.saturating_duration_since(Instant::now()).as_millis()
    }

    /// The server closed the stream. Returns `true` when the session is over.
    fn on_stream_end(&mut self) -> bool {
        if self.state.is_terminal() {
            debug!("stream closed by server after terminal snapshot");
            return false;
        }
        self.fail(MonitorError::from(&TransportError::StreamEnded));
        true
    }

    fn fail(&mut self, err: MonitorError) {
        self.completion.cancel();
        self.subscription.close();
        self.state.connection_phase = ConnectionPhase::Errored;
        self.state.error = Some(err);
        self.state.auto_close_deadline = None;
        self.publish();
    }

    fn shut_down(&mut self, reason: Teardown) {
        let cancelled_timer = self.completion.cancel();
        self.subscription.close();
        debug!(?reason, cancelled_timer, "closing sync progress stream");
        if matches!(
            self.state.connection_phase,
            ConnectionPhase::Errored | ConnectionPhase::Closed
        ) {
            return;
        }
        self.state.connection_phase = ConnectionPhase::Closed;
        self.state.auto_close_deadline = None;
        self.publish();
    }
}
