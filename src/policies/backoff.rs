//! # How long the supervisor waits before reconnecting.
//!
//! The dispatcher reconnects on a flat delay (5s unless configured otherwise) and
//! never gives up, which is [`BackoffPolicy::constant`]. A growing schedule is still
//! expressible for deployments that talk to a rate-limited gateway: wait `n` is
//! `first * factor^n`, capped at `max`, and then passed through the jitter policy.
//! Jitter only lengthens a wait and its output is not fed into the next wait.
//!
//! ```rust
//! use std::time::Duration;
//! use remindvisor::{BackoffPolicy, JitterPolicy};
//!
//! let flat = BackoffPolicy::constant(Duration::from_secs(5));
//! assert_eq!(flat.next(0), Duration::from_secs(5));
//! assert_eq!(flat.next(40), Duration::from_secs(5));
//!
//! let doubling = BackoffPolicy {
//!     first: Duration::from_secs(1),
//!     max: Duration::from_secs(60),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//! assert_eq!(doubling.next(3), Duration::from_secs(8));
//! assert_eq!(doubling.next(30), Duration::from_secs(60));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffPolicy {
    pub first: Duration,
    pub max: Duration,
    /// `1.0` keeps every wait equal to `first`.
    pub factor: f64,
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::constant(Duration::from_secs(5))
    }
}

impl BackoffPolicy {
    pub fn constant(delay: Duration) -> Self {
        Self {
            first: delay,
            max: delay,
            factor: 1.0,
            jitter: JitterPolicy::None,
        }
    }

    /// Wait before the next attempt, given how many attempts in a row already failed
    /// beyond the first (`0` right after the first failure).
    pub fn next(&self, failures: u32) -> Duration {
        let base = self.capped(failures);
        self.jitter.apply_decorrelated(base, self.max)
    }

    fn capped(&self, failures: u32) -> Duration {
        if self.factor == 1.0 || failures == 0 {
            return self.first.min(self.max);
        }
        let exp = i32::try_from(failures).unwrap_or(i32::MAX);
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);
        if secs.is_finite() && secs >= 0.0 && secs < self.max.as_secs_f64() {
            Duration::from_secs_f64(secs)
        } else {
            self.max
        }
    }
}
