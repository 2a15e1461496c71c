//! # What the dispatcher reports about itself.
//!
//! Three families of [`EventKind`]: session lifecycle from the supervisor, tick and
//! per-reminder outcomes from the dispatch cycle, and shutdown progress from the
//! service. An [`Event`] is a kind plus whichever context fields apply to it.
//!
//! `seq` is process-wide and strictly increasing, so receivers can restore publish
//! order after merging streams.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use remindvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::NotificationFailed)
//!     .with_session(3)
//!     .with_recipient("919876543210")
//!     .with_reason("number not on network");
//!
//! assert_eq!(ev.kind, EventKind::NotificationFailed);
//! assert_eq!(ev.recipient.as_deref(), Some("919876543210"));
//! assert_eq!(ev.session, Some(3));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::dispatch::TickReport;

static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Connection events ===
    /// Supervisor is attempting to open a session.
    ///
    /// Sets: `attempt` (1-based, lifetime counter)
    ConnectAttempt,

    /// Session established.
    ///
    /// Sets: `session`, `attempt`
    Connected,

    /// Connection attempt failed.
    ///
    /// Sets: `attempt`, `reason`
    ConnectFailed,

    /// Current session terminated (disconnect or session-fatal send failure).
    ///
    /// Sets: `session`, `reason`
    SessionLost,

    /// Next connection attempt scheduled.
    ///
    /// Sets: `attempt` (the attempt that just ended), `delay_ms`
    BackoffScheduled,

    // === Dispatch events ===
    /// A tick began.
    ///
    /// Sets: `session`
    TickStarted,

    /// A tick was requested while another was still running.
    ///
    /// Sets: `session`
    TickSkipped,

    /// The outstanding-event scan failed; the tick did nothing.
    ///
    /// Sets: `session`, `reason`
    ScanFailed,

    /// One notification was accepted by the transport.
    ///
    /// Sets: `session`, `recipient`, `subject` (event name)
    NotificationSent,

    /// One notification failed (rejected, invalid address, timeout or session lost).
    ///
    /// Sets: `session`, `recipient`, `subject`, `reason`
    NotificationFailed,

    /// A tick finished.
    ///
    /// Sets: `session`, `report`
    TickCompleted,

    // === Runtime events ===
    /// Shutdown requested (OS signal observed or token cancelled).
    ShutdownRequested,

    /// Supervisor loop has returned.
    SupervisorStopped,

    /// Shutdown finished within the configured grace period.
    AllStoppedWithin,

    /// Grace period exceeded while a tick was in flight.
    GraceExceeded,
}

/// One runtime report. Fields other than `seq`, `at` and `kind` are filled in only
/// where the kind has something to say.
#[derive(Clone, Debug)]
pub struct Event {
    pub seq: u64,
    pub at: SystemTime,
    pub kind: EventKind,

    pub session: Option<u64>,
    /// 1-based connect attempt within the supervisor's lifetime.
    pub attempt: Option<u32>,
    /// Backoff wait, saturated at `u32::MAX` ms.
    pub delay_ms: Option<u32>,
    /// Error text or session termination cause.
    pub reason: Option<Arc<str>>,
    /// Transport address after prefix formatting.
    pub recipient: Option<Arc<str>>,
    /// Reminder name for notification outcomes.
    pub subject: Option<Arc<str>>,
    /// Only on `TickCompleted`.
    pub report: Option<TickReport>,
}

impl Event {
    /// Stamps the kind with the next sequence number and the current wall clock.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            session: None,
            attempt: None,
            delay_ms: None,
            reason: None,
            recipient: None,
            subject: None,
            report: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_session(mut self, id: u64) -> Self {
        self.session = Some(id);
        self
    }

    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(u32::try_from(d.as_millis()).unwrap_or(u32::MAX));
        self
    }

    pub fn with_recipient(mut self, recipient: impl Into<Arc<str>>) -> Self {
        self.recipient = Some(recipient.into());
        self
    }

    pub fn with_subject(mut self, subject: impl Into<Arc<str>>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_report(mut self, report: TickReport) -> Self {
        self.report = Some(report);
        self
    }

    /// `delay_ms` as a [`Duration`].
    pub fn delay(&self) -> Option<Duration> {
        self.delay_ms.map(|ms| Duration::from_millis(u64::from(ms)))
    }
}
