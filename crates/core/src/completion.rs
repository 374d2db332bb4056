// crates/core/src/completion.rs
//! One-shot auto-close after a terminal snapshot.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Idle,
    Armed { deadline: Instant },
    /// Fired or cancelled. A session reaches the terminal state at most once,
    /// so the controller never leaves this stage.
    Spent,
}

/// Schedules the deferred close that follows the first terminal snapshot.
///
/// The controller only tracks the deadline; the session loop sleeps on
/// [`deadline`](Self::deadline) and performs the close when it elapses.
#[derive(Debug, Clone)]
pub struct CompletionController {
    delay: Duration,
    stage: Stage,
}

impl CompletionController {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            stage: Stage::Idle,
        }
    }

    /// Arm at `now + delay`. Returns the deadline on the first call of the
    /// session and `None` afterwards.
    pub fn arm(&mut self, now: Instant) -> Option<Instant> {
        match self.stage {
            Stage::Idle => {
                let deadline = now + self.delay;
                self.stage = Stage::Armed { deadline };
                Some(deadline)
            }
            Stage::Armed { .. } | Stage::Spent => None,
        }
    }

    /// Pending deadline, if armed.
    pub fn deadline(&self) -> Option<Instant> {
        match self.stage {
            Stage::Armed { deadline } => Some(deadline),
            Stage::Idle | Stage::Spent => None,
        }
    }

    pub fn is_armed(&self) -> bool {
        matches!(self.stage, Stage::Armed { .. })
    }

    /// Record that the deadline elapsed. Returns `false` if nothing was armed.
    pub fn fire(&mut self) -> bool {
        let armed = self.is_armed();
        if armed {
            self.stage = Stage::Spent;
        }
        armed
    }

    /// Cancel a pending deadline. Returns `true` if one was pending.
    pub fn cancel(&mut self) -> bool {
        let armed = self.is_armed();
        self.stage = Stage::Spent;
        armed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_idle() {
        let controller = CompletionController::new(Duration::from_millis(5000));
        assert!(!controller.is_armed());
        assert_eq!(controller.deadline(), None);
    }

    #[test]
    fn arms_once() {
        let mut controller = CompletionController::new(Duration::from_millis(5000));
        let now = Instant::now();
        assert_eq!(controller.arm(now), Some(now + Duration::from_millis(5000)));
        assert_eq!(controller.arm(now + Duration::from_secs(1)), None);
        assert_eq!(controller.deadline(), Some(now + Duration::from_millis(5000)));
    }

    #[test]
    fn cannot_rearm_after_fire() {
        let mut controller = CompletionController::new(Duration::from_millis(10));
        let now = Instant::now();
        controller.arm(now);
        assert!(controller.fire());
        assert!(!controller.fire());
        assert_eq!(controller.arm(now), None);
        assert_eq!(controller.deadline(), None);
    }

    #[test]
    fn cancel_clears_pending_deadline() {
        let mut controller = CompletionController::new(Duration::from_millis(10));
        controller.arm(Instant::now());
        assert!(controller.cancel());
        assert!(!controller.cancel());
        assert!(!controller.fire());
        assert_eq!(controller.arm(Instant::now()), None);
    }
}
