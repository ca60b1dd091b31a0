//! Per-request deadline.
//!
//! # States
//! ```text
//! Running → Completed: terminal event reached before the timer (complete() or drop)
//! Running → TimedOut:  timer elapsed first, fire callback runs exactly once
//! ```
//!
//! Both transitions go through one compare-and-swap, so a deadline can never be
//! observed as both completed and timed out.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

const RUNNING: u8 = 0;
const COMPLETED: u8 = 1;
const TIMED_OUT: u8 = 2;

/// Observable state of a [`Deadline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadlineState {
    /// Timer armed, no terminal event yet.
    Running,
    /// The unit of work finished (or was abandoned) before the timer.
    Completed,
    /// The timer elapsed before any terminal event.
    TimedOut,
}

/// A cancelable one-shot timer owned by a single unit of work.
///
/// Must be armed from within a Tokio runtime. Dropping the deadline counts as a
/// terminal event and releases the timer.
#[derive(Debug)]
pub struct Deadline {
    state: Arc<AtomicU8>,
    timer: JoinHandle<()>,
}

impl Deadline {
    /// Arm a deadline that runs `on_fire` once `timeout` elapses, unless the
    /// deadline is completed first.
    pub fn arm<F>(timeout: Duration, on_fire: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let state = Arc::new(AtomicU8::new(RUNNING));
        let timer_state = Arc::clone(&state);

        let timer = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if timer_state
                .compare_exchange(RUNNING, TIMED_OUT, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                on_fire();
            }
        });

        Self { state, timer }
    }

    /// Signal the terminal event of the unit of work.
    ///
    /// Returns true if this call moved the deadline to `Completed`. Calling it
    /// again, or after the timer fired, is a no-op returning false.
    pub fn complete(&self) -> bool {
        let won = self
            .state
            .compare_exchange(RUNNING, COMPLETED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        self.timer.abort();
        won
    }

    /// Current state.
    pub fn state(&self) -> DeadlineState {
        match self.state.load(Ordering::Acquire) {
            RUNNING => DeadlineState::Running,
            COMPLETED => DeadlineState::Completed,
            _ => DeadlineState::TimedOut,
        }
    }

    /// True once the timer has fired.
    pub fn has_fired(&self) -> bool {
        self.state() == DeadlineState::TimedOut
    }
}

impl Drop for Deadline {
    fn drop(&mut self) {
        if self.complete() {
            tracing::trace!("Deadline released before expiry");
        }
    }
}
