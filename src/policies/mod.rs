//! Reconnect wait policies used by the connection supervisor.
//!
//! `Config::reconnect` holds a [`BackoffPolicy`]; after each failed connect or lost
//! session the supervisor sleeps for `reconnect.next(failures_in_a_row - 1)`. The
//! default is a flat 5s with no [`JitterPolicy`].

mod backoff;
mod jitter;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
