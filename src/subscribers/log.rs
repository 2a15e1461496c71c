//! # LogWriter: runtime events as structured log lines
//!
//! A subscriber that forwards every [`Event`] to `tracing` with structured fields.
//! The service installs it by default.
//!
//! ## Example output
//! ```text
//! INFO  connecting attempt=1
//! INFO  session established session=1 attempt=1
//! WARN  notification failed session=1 recipient="919876543210" event="Dentist" reason="..."
//! INFO  tick completed session=1 scanned=3 sent=2 failed=1 abandoned=0
//! WARN  session lost session=1 reason="gateway status DISCONNECTED"
//! INFO  reconnect scheduled delay_ms=5000 after_attempt=1
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let reason = e.reason.as_deref().unwrap_or("");
        match e.kind {
            EventKind::ConnectAttempt => {
                tracing::info!(attempt = e.attempt, "connecting");
            }
            EventKind::Connected => {
                tracing::info!(session = e.session, attempt = e.attempt, "session established");
            }
            EventKind::ConnectFailed => {
                tracing::error!(attempt = e.attempt, reason, "connect failed");
            }
            EventKind::SessionLost => {
                tracing::warn!(session = e.session, reason, "session lost");
            }
            EventKind::BackoffScheduled => {
                tracing::info!(
                    delay_ms = e.delay_ms,
                    after_attempt = e.attempt,
                    "reconnect scheduled"
                );
            }
            EventKind::TickStarted => {
                tracing::debug!(session = e.session, "tick started");
            }
            EventKind::TickSkipped => {
                tracing::warn!(session = e.session, "tick skipped: previous tick still running");
            }
            EventKind::ScanFailed => {
                tracing::error!(session = e.session, reason, "error checking reminders");
            }
            EventKind::NotificationSent => {
                tracing::info!(
                    session = e.session,
                    recipient = e.recipient.as_deref(),
                    event = e.subject.as_deref(),
                    "reminder sent"
                );
            }
            EventKind::NotificationFailed => {
                tracing::warn!(
                    session = e.session,
                    recipient = e.recipient.as_deref(),
                    event = e.subject.as_deref(),
                    reason,
                    "notification failed"
                );
            }
            EventKind::TickCompleted => {
                let r = e.report.unwrap_or_default();
                tracing::info!(
                    session = e.session,
                    scanned = r.scanned,
                    sent = r.sent,
                    failed = r.failed,
                    abandoned = r.abandoned,
                    "tick completed"
                );
            }
            EventKind::ShutdownRequested => {
                tracing::info!("shutdown requested");
            }
            EventKind::SupervisorStopped => {
                tracing::info!("supervisor stopped");
            }
            EventKind::AllStoppedWithin => {
                tracing::info!("all stopped within grace");
            }
            EventKind::GraceExceeded => {
                tracing::error!("grace exceeded");
            }
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}
