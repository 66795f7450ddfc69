//! Cancellable settle timer for rapidly-changing inputs.
//!
//! Arms a deadline on every reset; the action runs once the input has
//! been quiet for the full delay. Resetting restarts the timer, it
//! never stacks.

use std::time::{Duration, Instant};

/// Fire-once timer with restart-on-reset semantics.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    /// Creates a timer with the given settle delay.
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    /// Arms (or re-arms) the timer from now.
    pub fn reset(&mut self) {
        self.deadline = Some(Instant::now() + self.delay);
    }

    /// Disarms the timer.
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    /// Returns true while armed, fired or not.
    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Returns true once the armed deadline has passed.
    pub fn fired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Time left until the deadline, if armed.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }
}
