//! One-shot millisecond deadline timer bound to the runtime.
//!
//! Mirrors the original's `SteadyTimer`: idempotent `start`, cancellable
//! `stop`, and an `is_expired` check that treats a cancelled wait as "not
//! expired" so a session that was stopped deliberately doesn't also race
//! its own timeout path.

use std::time::{Duration, Instant};

use crate::error::ErrorCode;

const DEFAULT_DEADLINE_MS: i64 = 1000;

/// Inactivity/attempt-budget timer. Not itself async: `start`/`stop` just
/// record when the deadline was armed; callers race real I/O against
/// [`DeadlineTimer::remaining`] or poll [`DeadlineTimer::is_expired`] from a
/// supervisor task (`Session::check_timeout`).
#[derive(Debug)]
pub struct DeadlineTimer {
    deadline_ms: i64,
    active: bool,
    armed_at: Option<Instant>,
}

impl Default for DeadlineTimer {
    fn default() -> Self {
        Self::new(DEFAULT_DEADLINE_MS)
    }
}

impl DeadlineTimer {
    #[must_use]
    pub const fn new(deadline_ms: i64) -> Self {
        Self {
            deadline_ms,
            active: false,
            armed_at: None,
        }
    }

    #[must_use]
    pub const fn deadline_ms(&self) -> i64 {
        self.deadline_ms
    }

    pub fn set_deadline_ms(&mut self, deadline_ms: i64) {
        self.deadline_ms = deadline_ms;
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Arms the timer. No-op if already active, matching the original's
    /// `Start()` contract.
    pub fn start(&mut self) {
        if self.active {
            return;
        }
        self.active = true;
        self.armed_at = Some(Instant::now());
    }

    /// Cancels the timer and clears `active`.
    pub fn stop(&mut self) {
        self.active = false;
        self.armed_at = None;
    }

    /// Time remaining before expiry, or `Duration::ZERO` if inactive or
    /// already past the deadline.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        let Some(armed_at) = self.armed_at else {
            return Duration::ZERO;
        };
        let budget = Duration::from_millis(self.deadline_ms.max(0) as u64);
        let elapsed = armed_at.elapsed();
        budget.saturating_sub(elapsed)
    }

    /// True iff inactive, or active with no time remaining and
    /// `ignored_err` is not `OperationCanceled`.
    #[must_use]
    pub fn is_expired(&self, ignored_err: Option<ErrorCode>) -> bool {
        if !self.active {
            return true;
        }
        let canceled = matches!(ignored_err, Some(ErrorCode::OperationCanceled));
        self.remaining().is_zero() && !canceled
    }
}
