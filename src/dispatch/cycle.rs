//! # One dispatch tick.
//!
//! [`DispatchCycle::run_tick`] reminds every user about every outstanding event through
//! the current session.
//!
//! ## Flow
//! ```text
//! try_begin() ── busy ──► publish TickSkipped ──► Skipped
//!     │
//!     ▼
//! publish TickStarted
//! scanner.scan() ── Err ──► publish ScanFailed ──► ScanFailed
//!     │
//!     ▼
//! stream::iter(results).map(deliver).buffer_unordered(send_concurrency)
//!     deliver:
//!       session dead?            → Abandoned (never started)
//!       recipient::format        → Err InvalidAddress (never reaches the transport)
//!       render_reminder
//!       timeout(send_timeout, transport.send)
//!         Ok                     → publish NotificationSent
//!         Err(message-local)     → publish NotificationFailed, batch continues
//!         Err(SessionLost)       → session.terminate(reason), publish NotificationFailed
//!     │
//!     ▼
//! publish TickCompleted ──► Completed(TickReport)
//! ```
//!
//! ## Rules
//! - Ticks never overlap: a second caller gets `Skipped` without touching the store
//! - No retries within a tick; a failed event is retried by the next tick
//! - The cycle never inspects error text, only [`SendError::is_session_fatal`]
//! - Terminating the session is idempotent, so many session-fatal failures in one
//!   tick still produce exactly one supervisor restart

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::time;

use super::{TickOutcome, TickReport, recipient, render_reminder};
use crate::config::Config;
use crate::error::SendError;
use crate::events::{Bus, Event, EventKind};
use crate::model::{Notification, OutstandingEvent};
use crate::scanner::Scanner;
use crate::transport::{Session, Transport};

/// Tunables of the dispatch cycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DispatchSettings {
    /// Digits prepended to local-format addresses.
    pub country_prefix: String,
    /// Upper bound for one send.
    pub send_timeout: Duration,
    /// Sends in flight within one tick (min 1).
    pub send_concurrency: usize,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for DispatchSettings {
    fn from(cfg: &Config) -> Self {
        Self {
            country_prefix: cfg.country_prefix.clone(),
            send_timeout: cfg.send_timeout,
            send_concurrency: cfg.send_concurrency_clamped(),
        }
    }
}

/// Outcome of one delivery inside a tick.
enum Delivery {
    Sent,
    Failed { lost_session: bool },
    Abandoned,
}

/// Releases the running flag when the tick ends (also on panic or cancellation).
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// The periodic unit of work.
pub struct DispatchCycle {
    scanner: Scanner,
    transport: Arc<dyn Transport>,
    bus: Bus,
    settings: DispatchSettings,
    running: AtomicBool,
}

impl DispatchCycle {
    pub fn new(
        scanner: Scanner,
        transport: Arc<dyn Transport>,
        bus: Bus,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            scanner,
            transport,
            bus,
            settings,
            running: AtomicBool::new(false),
        }
    }

    /// Whether a tick is currently in progress.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn try_begin(&self) -> Option<RunningGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunningGuard(&self.running))
    }

    /// Runs one tick against `session`.
    pub async fn run_tick(&self, session: &Session) -> TickOutcome {
        let Some(_running) = self.try_begin() else {
            self.bus
                .publish(Event::new(EventKind::TickSkipped).with_session(session.id()));
            return TickOutcome::Skipped;
        };
        self.bus
            .publish(Event::new(EventKind::TickStarted).with_session(session.id()));

        let found = match self.scanner.scan().await {
            Ok(found) => found,
            Err(e) => {
                self.bus.publish(
                    Event::new(EventKind::ScanFailed)
                        .with_session(session.id())
                        .with_reason(e.to_string()),
                );
                return TickOutcome::ScanFailed;
            }
        };

        let mut report = TickReport {
            scanned: u32::try_from(found.len()).unwrap_or(u32::MAX),
            ..TickReport::default()
        };

        let mut deliveries = stream::iter(found)
            .map(|item| self.deliver(session, item))
            .buffer_unordered(self.settings.send_concurrency.max(1));

        while let Some(delivery) = deliveries.next().await {
            match delivery {
                Delivery::Sent => report.sent += 1,
                Delivery::Failed { lost_session } => {
                    report.failed += 1;
                    report.session_lost |= lost_session;
                }
                Delivery::Abandoned => report.abandoned += 1,
            }
        }
        report.session_lost |= !session.is_alive();

        self.bus.publish(
            Event::new(EventKind::TickCompleted)
                .with_session(session.id())
                .with_report(report),
        );
        TickOutcome::Completed(report)
    }

    async fn deliver(&self, session: &Session, item: OutstandingEvent) -> Delivery {
        if !session.is_alive() {
            return Delivery::Abandoned;
        }

        let result = match recipient::format(&self.settings.country_prefix, &item.recipient.address)
        {
            Ok(to) => {
                let notification = Notification {
                    recipient: to,
                    text: render_reminder(&item.event),
                };
                match self.send(session, &notification).await {
                    Ok(()) => Ok(notification.recipient),
                    Err(e) => Err((notification.recipient, e)),
                }
            }
            Err(e) => Err((item.recipient.address.clone(), e)),
        };

        match result {
            Ok(to) => {
                self.bus.publish(
                    Event::new(EventKind::NotificationSent)
                        .with_session(session.id())
                        .with_recipient(to)
                        .with_subject(item.event.name.as_str()),
                );
                Delivery::Sent
            }
            Err((to, err)) => {
                let lost_session = err.is_session_fatal();
                if lost_session {
                    session.terminate(err.to_string());
                }
                self.bus.publish(
                    Event::new(EventKind::NotificationFailed)
                        .with_session(session.id())
                        .with_recipient(to)
                        .with_subject(item.event.name.as_str())
                        .with_reason(err.to_string()),
                );
                Delivery::Failed { lost_session }
            }
        }
    }

    async fn send(&self, session: &Session, n: &Notification) -> Result<(), SendError> {
        let send = self.transport.send(session, &n.recipient, &n.text);
        let limit = self.settings.send_timeout;
        match time::timeout(limit, send).await {
            Ok(res) => res,
            Err(_elapsed) => Err(SendError::TimedOut {
                address: n.recipient.clone(),
                timeout: limit,
            }),
        }
    }
}
