//! Dispatch: the periodic reminder tick.
//!
//! ## Contents
//! - [`DispatchCycle`] one tick: scan, render, send, classify
//! - [`DispatchTimer`] drives ticks at a fixed interval for one session
//! - [`render_reminder`] reminder text
//! - [`recipient::format`] local address to transport recipient
//!
//! ```text
//! DispatchTimer ──(every interval)──► DispatchCycle::run_tick(&Session)
//!                                        ├─► Scanner::scan()
//!                                        ├─► per result: format ─► render ─► Transport::send
//!                                        └─► TickOutcome
//! ```

mod cycle;
pub mod recipient;
mod render;
mod timer;

pub use cycle::{DispatchCycle, DispatchSettings};
pub use render::{DUE_FORMAT, render_reminder};
pub use timer::DispatchTimer;

/// Counters for one completed tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Outstanding events returned by the scan.
    pub scanned: u32,
    /// Notifications accepted by the transport.
    pub sent: u32,
    /// Message-local failures (rejected, invalid address, timed out) and the send that
    /// observed the session loss.
    pub failed: u32,
    /// Sends never started because the session was lost.
    pub abandoned: u32,
    /// Whether the session was lost during the tick.
    pub session_lost: bool,
}

/// Result of [`DispatchCycle::run_tick`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    Completed(TickReport),
    /// The scan failed; nothing was sent.
    ScanFailed,
    /// Another tick was still running.
    Skipped,
}

impl TickOutcome {
    /// Report of a completed tick.
    pub fn report(&self) -> Option<TickReport> {
        match self {
            TickOutcome::Completed(r) => Some(*r),
            _ => None,
        }
    }
}
